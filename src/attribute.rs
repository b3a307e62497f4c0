//! # Attribute Types
//!
//! Allows resource models to declare attributes with default values and
//! type safety. Each declared attribute carries an [`AttributeType`];
//! values are cast through that type whenever they are stored, whether
//! they arrive from caller code or from a decoded response body.
//!
//! Casting is idempotent: `cast(cast(x)) == cast(x)` for every accepted
//! value, and `Null` is the identity for every type.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::error::Error;

/// Capability interface for a casting rule. Implement this to add a
/// custom attribute type beyond the built-ins.
pub trait TypeCast: Send + Sync {
    /// Coerce a raw value into this type's canonical representation.
    fn cast(&self, raw: &Value) -> Result<Value, Error>;

    /// Short tag used in error messages.
    fn name(&self) -> &str {
        "custom"
    }
}

/// The declared type of one attribute: a fixed set of built-ins plus an
/// extension point for custom casting rules.
#[derive(Clone)]
pub enum AttributeType {
    Str,
    Integer,
    Float,
    Boolean,
    List,
    Dict,
    Custom(Arc<dyn TypeCast>),
}

impl fmt::Debug for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl AttributeType {
    pub fn name(&self) -> &str {
        match self {
            AttributeType::Str => "string",
            AttributeType::Integer => "integer",
            AttributeType::Float => "float",
            AttributeType::Boolean => "boolean",
            AttributeType::List => "list",
            AttributeType::Dict => "dict",
            AttributeType::Custom(ty) => ty.name(),
        }
    }

    fn cast_error(&self, raw: &Value) -> Error {
        Error::Cast {
            value: raw.to_string(),
            ty: self.name().to_string(),
        }
    }

    /// Cast a raw value to this type. `Null` passes through unchanged for
    /// every type; unsupported shapes fail with [`Error::Cast`].
    pub fn cast(&self, raw: &Value) -> Result<Value, Error> {
        if raw.is_null() {
            return Ok(Value::Null);
        }
        match self {
            AttributeType::Str => match raw {
                Value::String(_) => Ok(raw.clone()),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                _ => Err(self.cast_error(raw)),
            },
            AttributeType::Integer => match raw {
                Value::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        Ok(Value::from(i))
                    } else if let Some(f) = n.as_f64() {
                        Ok(Value::from(f.trunc() as i64))
                    } else {
                        Err(self.cast_error(raw))
                    }
                }
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| self.cast_error(raw)),
                _ => Err(self.cast_error(raw)),
            },
            AttributeType::Float => match raw {
                Value::Number(n) => n
                    .as_f64()
                    .and_then(|f| serde_json::Number::from_f64(f))
                    .map(Value::Number)
                    .ok_or_else(|| self.cast_error(raw)),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| self.cast_error(raw)),
                _ => Err(self.cast_error(raw)),
            },
            AttributeType::Boolean => match raw {
                Value::Bool(_) => Ok(raw.clone()),
                Value::String(s) => match s.trim() {
                    "true" | "1" => Ok(Value::Bool(true)),
                    "false" | "0" => Ok(Value::Bool(false)),
                    _ => Err(self.cast_error(raw)),
                },
                Value::Number(n) => match n.as_i64() {
                    Some(0) => Ok(Value::Bool(false)),
                    Some(1) => Ok(Value::Bool(true)),
                    _ => Err(self.cast_error(raw)),
                },
                _ => Err(self.cast_error(raw)),
            },
            AttributeType::List => match raw {
                Value::Array(_) => Ok(raw.clone()),
                _ => Err(self.cast_error(raw)),
            },
            AttributeType::Dict => match raw {
                Value::Object(_) => Ok(raw.clone()),
                _ => Err(self.cast_error(raw)),
            },
            AttributeType::Custom(ty) => ty.cast(raw),
        }
    }
}

/// One attribute declaration: its type and default value.
#[derive(Clone, Debug)]
pub struct AttributeSpec {
    pub ty: AttributeType,
    pub default: Value,
}

/// The set of attributes declared by one resource model: an ordered map
/// from attribute name to type and default. Built once per model and
/// immutable afterwards.
#[derive(Clone, Debug, Default)]
pub struct AttributeSet {
    attrs: BTreeMap<String, AttributeSpec>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an attribute with a `Null` default.
    pub fn attr(self, name: &str, ty: AttributeType) -> Self {
        self.attr_default(name, ty, Value::Null)
    }

    /// Declare an attribute with a default value. The default is cast
    /// through the type at declaration time; a default that cannot be
    /// cast is a definition bug and is stored as `Null` with a warning.
    pub fn attr_default(mut self, name: &str, ty: AttributeType, default: Value) -> Self {
        let default = match ty.cast(&default) {
            Ok(v) => v,
            Err(err) => {
                warn!(attribute = name, %err, "uncastable default value");
                Value::Null
            }
        };
        self.attrs.insert(name.to_string(), AttributeSpec { ty, default });
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttributeSpec> {
        self.attrs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeSpec)> {
        self.attrs.iter()
    }

    /// Materialize the default attribute map for a fresh instance.
    pub fn defaults(&self) -> BTreeMap<String, Value> {
        self.attrs
            .iter()
            .map(|(name, spec)| (name.clone(), spec.default.clone()))
            .collect()
    }

    /// Cast one value through its declared type. Undeclared attributes
    /// pass through untouched; only declared attributes re-cast.
    pub fn cast_value(&self, name: &str, raw: &Value) -> Result<Value, Error> {
        match self.attrs.get(name) {
            Some(spec) => spec.ty.cast(raw),
            None => Ok(raw.clone()),
        }
    }

    /// Cast a decoded response payload. Objects cast field by field; a
    /// list of raw records casts element-wise; anything else passes
    /// through unchanged.
    pub fn cast_record(&self, raw: Value) -> Result<Value, Error> {
        match raw {
            Value::Object(fields) => {
                let mut cast = serde_json::Map::with_capacity(fields.len());
                for (name, value) in fields {
                    let value = self.cast_value(&name, &value)?;
                    cast.insert(name, value);
                }
                Ok(Value::Object(cast))
            }
            Value::Array(items) => {
                let mut cast = Vec::with_capacity(items.len());
                for item in items {
                    cast.push(self.cast_record(item)?);
                }
                Ok(Value::Array(cast))
            }
            other => Ok(other),
        }
    }
}

//! # Operations
//!
//! An [`Operation`] represents one pending resource action (read, create,
//! update or delete) bound to a resource model, its request parameters,
//! and composable success/failure callbacks. Operations are created in a
//! pending state when a resource method is invoked, enqueued on a
//! [`Runner`](crate::runner::Runner), and resolved exactly once when the
//! adapter completes the underlying request.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::attribute::AttributeSet;
use crate::error::Error;
use crate::resource::Resource;

/// Request parameters: a mapping of field name to raw value.
pub type Params = BTreeMap<String, Value>;

/// The four resource actions an operation can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        };
        f.write_str(name)
    }
}

type SuccessHandler = Box<dyn FnMut(&Value) + Send>;
type FailureHandler = Box<dyn FnMut(&Error) -> Result<(), Error> + Send>;

/// One pending resource action awaiting resolution.
///
/// # Resolution contract
///
/// An operation resolves exactly once, via [`resolve_success`] or
/// [`resolve_failure`]. A second resolution attempt is a **warned no-op**:
/// it logs through `tracing::warn!` and changes nothing. Callbacks
/// therefore run at most once each, and only after the operation's
/// parameters have been fully determined.
///
/// [`resolve_success`]: Operation::resolve_success
/// [`resolve_failure`]: Operation::resolve_failure
pub struct Operation {
    model: &'static str,
    action: Action,
    params: Params,
    schema: &'static AttributeSet,
    resolved: bool,
    on_success: Vec<SuccessHandler>,
    on_failure: Vec<FailureHandler>,
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("model", &self.model)
            .field("action", &self.action)
            .field("params", &self.params)
            .field("resolved", &self.resolved)
            .finish_non_exhaustive()
    }
}

impl Operation {
    /// Construct a pending operation for resource model `R`. Does not
    /// execute anything.
    pub fn new<R: Resource>(action: Action, params: Params) -> Self {
        Self {
            model: R::kind(),
            action,
            params,
            schema: R::schema(),
            resolved: false,
            on_success: Vec::new(),
            on_failure: Vec::new(),
        }
    }

    pub fn model(&self) -> &'static str {
        self.model
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn schema(&self) -> &'static AttributeSet {
        self.schema
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Register a success callback. Registrations compose: every handler
    /// runs on resolution, none overwrite prior ones. The handler receives
    /// the response payload already cast through the model's schema.
    pub fn on_success(&mut self, handler: impl FnMut(&Value) + Send + 'static) {
        self.on_success.push(Box::new(handler));
    }

    /// Register a failure callback. Returning `Ok(())` marks the failure
    /// as locally recovered; returning `Err` defers the error to the
    /// enclosing flush, which re-raises it after the batch settles.
    pub fn on_failure(
        &mut self,
        handler: impl FnMut(&Error) -> Result<(), Error> + Send + 'static,
    ) {
        self.on_failure.push(Box::new(handler));
    }

    /// Resolve with raw response data. The payload is cast through the
    /// model's attribute set (element-wise for list payloads) before the
    /// success handlers run; a cast failure converts into the failure
    /// path with [`Error::Cast`].
    ///
    /// Returns the error to defer to the flush, if the resolution ended
    /// in an unrecovered failure.
    pub fn resolve_success(&mut self, raw: Value) -> Option<Error> {
        if self.resolved {
            warn!(model = self.model, action = %self.action, "operation already resolved");
            return None;
        }
        match self.schema.cast_record(raw) {
            Ok(data) => {
                self.resolved = true;
                for handler in &mut self.on_success {
                    handler(&data);
                }
                None
            }
            Err(err) => self.resolve_failure(err),
        }
    }

    /// Resolve with a typed error, invoking every failure handler exactly
    /// once. Returns the first unrecovered error so the runner can defer
    /// it; an operation with no failure handler defers the original error.
    pub fn resolve_failure(&mut self, error: Error) -> Option<Error> {
        if self.resolved {
            warn!(model = self.model, action = %self.action, "operation already resolved");
            return None;
        }
        self.resolved = true;
        if self.on_failure.is_empty() {
            return Some(error);
        }
        let mut deferred = None;
        for handler in &mut self.on_failure {
            if let Err(err) = handler(&error) {
                deferred.get_or_insert(err);
            }
        }
        deferred
    }
}

/// Build a [`Params`] map from `key => value` pairs. Values go through
/// [`serde_json::json!`].
#[macro_export]
macro_rules! params {
    () => { $crate::operation::Params::new() };
    ( $( $key:expr => $value:expr ),+ $(,)? ) => {{
        let mut map = $crate::operation::Params::new();
        $( map.insert(($key).to_string(), ::serde_json::json!($value)); )+
        map
    }};
}

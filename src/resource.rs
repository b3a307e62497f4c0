//! # Resource Models
//!
//! The [`Resource`] trait is the contract a resource class exposes to the
//! operation engine: a model name and an [`AttributeSet`] (name, type,
//! default — primary-key convention `"id"`). A [`Handle`] is the live view
//! of one resource instance; resource calls never block, they build an
//! [`Operation`], wire the handle's assignment into its success callback,
//! and enqueue it. A later [`Runner::start`] fills the handle in.
//!
//! [`Runner::start`]: crate::runner::Runner::start

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::warn;

use crate::attribute::AttributeSet;
use crate::error::Error;
use crate::operation::{Action, Operation, Params};
use crate::runner::Runner;

/// Contract a resource model exposes to the engine. The engine only ever
/// calls into it to cast raw response data into attribute values and to
/// read parameters for outgoing requests.
pub trait Resource: Send + Sync + 'static {
    /// Stable model name, used for stub matching and request routing.
    fn kind() -> &'static str;

    /// The declared attributes. Build once, typically behind a
    /// `OnceLock`.
    fn schema() -> &'static AttributeSet;
}

struct HandleState {
    attributes: BTreeMap<String, Value>,
    loaded: bool,
}

/// A shared view of one resource instance.
///
/// Attributes materialize lazily: the handle stores only values that were
/// explicitly set or assigned from a response; [`get`](Handle::get) falls
/// back to the schema's default for everything else. The setter always
/// re-casts through the attribute's declared type, so stored values match
/// the declaration no matter how the caller supplied them.
///
/// Clones share state, which is how a resolution callback populates the
/// handle the caller is holding.
pub struct Handle<R: Resource> {
    state: Arc<Mutex<HandleState>>,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Resource> Clone for Handle<R> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            _marker: PhantomData,
        }
    }
}

impl<R: Resource> fmt::Debug for Handle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("Handle")
            .field("model", &R::kind())
            .field("attributes", &state.attributes)
            .field("loaded", &state.loaded)
            .finish()
    }
}

impl<R: Resource> Default for Handle<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> Handle<R> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HandleState {
                attributes: BTreeMap::new(),
                loaded: false,
            })),
            _marker: PhantomData,
        }
    }

    /// Current value of an attribute, falling back to the declared
    /// default. Undeclared, unset attributes read as `Null`.
    pub fn get(&self, name: &str) -> Value {
        let state = self.state.lock().unwrap();
        if let Some(value) = state.attributes.get(name) {
            return value.clone();
        }
        R::schema()
            .get(name)
            .map(|spec| spec.default.clone())
            .unwrap_or(Value::Null)
    }

    /// Set an attribute, re-casting through its declared type. Casting
    /// errors surface here, synchronously, as validation failures on this
    /// resource — never through the async path.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<(), Error> {
        let cast = R::schema().cast_value(name, &value.into())?;
        self.state
            .lock()
            .unwrap()
            .attributes
            .insert(name.to_string(), cast);
        Ok(())
    }

    /// Primary key, by the `"id"` convention.
    pub fn id(&self) -> Value {
        self.get("id")
    }

    /// Whether a response has populated this handle.
    pub fn loaded(&self) -> bool {
        self.state.lock().unwrap().loaded
    }

    /// The explicitly-set attributes (request parameters for outgoing
    /// operations).
    pub fn attributes(&self) -> BTreeMap<String, Value> {
        self.state.lock().unwrap().attributes.clone()
    }

    fn assign(&self, data: &Value) {
        let mut state = self.state.lock().unwrap();
        if let Value::Object(fields) = data {
            for (name, value) in fields {
                state.attributes.insert(name.clone(), value.clone());
            }
        }
        state.loaded = true;
    }

    /// Enqueue an update carrying the handle's current attributes. The
    /// response payload is assigned back (the service may normalize
    /// fields).
    pub fn save(&self, runner: &Runner) {
        let mut op = Operation::new::<R>(Action::Update, self.attributes());
        let handle = self.clone();
        op.on_success(move |data| handle.assign(data));
        runner.enqueue(op);
    }

    /// Enqueue a delete for this handle's id. On success the handle is
    /// marked unloaded.
    pub fn destroy(&self, runner: &Runner) {
        let mut params = Params::new();
        params.insert("id".to_string(), self.id());
        let mut op = Operation::new::<R>(Action::Delete, params);
        let state = self.state.clone();
        op.on_success(move |_| {
            state.lock().unwrap().loaded = false;
        });
        runner.enqueue(op);
    }
}

/// A shared view of a list result. Populated element-wise (each record
/// cast through the schema) when its read operation resolves.
pub struct ListHandle<R: Resource> {
    state: Arc<Mutex<(Vec<Value>, bool)>>,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Resource> Clone for ListHandle<R> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            _marker: PhantomData,
        }
    }
}

impl<R: Resource> ListHandle<R> {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new((Vec::new(), false))),
            _marker: PhantomData,
        }
    }

    pub fn items(&self) -> Vec<Value> {
        self.state.lock().unwrap().0.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn loaded(&self) -> bool {
        self.state.lock().unwrap().1
    }
}

/// Standard operations every resource model inherits, in the manner of a
/// blanket client trait: `find`, `find_all` and `create` build and
/// enqueue operations without blocking.
pub trait ResourceExt: Resource + Sized {
    /// Enqueue a read by primary key. Returns immediately; the handle is
    /// populated when the flush resolves the operation.
    fn find(runner: &Runner, id: impl Into<Value>) -> Handle<Self> {
        let raw = id.into();
        let id = match Self::schema().cast_value("id", &raw) {
            Ok(v) => v,
            Err(err) => {
                warn!(model = Self::kind(), %err, "uncastable find id kept raw");
                raw
            }
        };
        let mut params = Params::new();
        params.insert("id".to_string(), id);

        let handle = Handle::new();
        let mut op = Operation::new::<Self>(Action::Read, params);
        let target = handle.clone();
        op.on_success(move |data| target.assign(data));
        runner.enqueue(op);
        handle
    }

    /// Enqueue a filtered list read.
    fn find_all(runner: &Runner, params: Params) -> ListHandle<Self> {
        let handle = ListHandle::new();
        let mut op = Operation::new::<Self>(Action::Read, params);
        let state = handle.state.clone();
        op.on_success(move |data| {
            let mut state = state.lock().unwrap();
            if let Value::Array(items) = data {
                state.0 = items.clone();
            }
            state.1 = true;
        });
        runner.enqueue(op);
        handle
    }

    /// Enqueue a create. Parameters cast synchronously through the
    /// schema, so an uncastable value is a local [`Error::Cast`] — the
    /// operation is only enqueued once every parameter stored cleanly.
    fn create(runner: &Runner, params: Params) -> Result<Handle<Self>, Error> {
        let handle = Handle::new();
        for (name, value) in params {
            handle.set(&name, value)?;
        }
        let mut op = Operation::new::<Self>(Action::Create, handle.attributes());
        let target = handle.clone();
        op.on_success(move |data| target.assign(data));
        runner.enqueue(op);
        Ok(handle)
    }
}

impl<R: Resource> ResourceExt for R {}

//! # Stub Subsystem
//!
//! Intercepts operations during tests, matches them against declared
//! expectations, and feeds canned results or synthetic errors back
//! through the same resolution path the real adapter would use.
//!
//! A [`StubRegistry`] holds the expectation table and the enable /
//! allow-requests toggles; a [`StubAdapter`] plugs it into a
//! [`Runner`](crate::runner::Runner). The registry handle is shared
//! explicitly (constructor parameter, not a hidden static), so parallel
//! test binaries each own their table.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use restq::{Action, Runner, StubAdapter, StubRegistry, params};
//! # use serde_json::json;
//! # struct MyUser;
//! # impl restq::Resource for MyUser {
//! #     fn kind() -> &'static str { "my_user" }
//! #     fn schema() -> &'static restq::AttributeSet { unimplemented!() }
//! # }
//! let registry = Arc::new(StubRegistry::new());
//! registry.enable();
//! let runner = Runner::new(Arc::new(StubAdapter::new(registry.clone())));
//!
//! let stub = registry
//!     .expect::<MyUser>(Action::Read)
//!     .with(params! {"id" => 1})
//!     .and_return(json!({"id": 1, "name": "John Smith", "age": 32}));
//! // ... run operations, then:
//! assert!(stub.called());
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::adapter::{Adapter, Completion};
use crate::attribute::AttributeSet;
use crate::error::Error;
use crate::operation::{Action, Operation, Params};
use crate::resource::Resource;

/// How an expectation decides whether it applies to an operation.
pub enum Matcher {
    /// Every given field must equal the operation's parameter of the same
    /// name (value equality after casting). A subset match: extra
    /// operation parameters are ignored. An empty map matches every
    /// operation of the expectation's model and action.
    Fields(Params),
    /// An arbitrary predicate over the operation.
    Predicate(Box<dyn Fn(&Operation) -> bool + Send + Sync>),
}

impl Matcher {
    fn matches(&self, operation: &Operation) -> bool {
        match self {
            Matcher::Fields(fields) => fields
                .iter()
                .all(|(name, value)| operation.params().get(name) == Some(value)),
            Matcher::Predicate(pred) => pred(operation),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Fields(fields) => f.debug_tuple("Fields").field(fields).finish(),
            Matcher::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Symbolic or literal error raised by a stub expectation. Symbolic tags
/// and status codes map through a small fixed table to the corresponding
/// typed [`Error`]; a literal error value passes through unchanged.
#[derive(Clone)]
pub enum ErrorSpec {
    /// Maps to [`Error::NotFound`].
    NotFound,
    /// Maps to [`Error::InvalidResource`] with the given field errors.
    Invalid(BTreeMap<String, Vec<String>>),
    /// A bare status code: 404 maps to [`Error::NotFound`], 422 to
    /// [`Error::InvalidResource`], anything else to [`Error::Transport`].
    Status(u16),
    /// A caller-declared error instance, passed through unchanged.
    Custom(Arc<dyn std::error::Error + Send + Sync>),
}

impl ErrorSpec {
    /// Wrap a literal error value for pass-through.
    pub fn custom(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        ErrorSpec::Custom(Arc::new(err))
    }

    fn to_error(&self, operation: &Operation) -> Error {
        match self {
            ErrorSpec::NotFound | ErrorSpec::Status(404) => Error::NotFound(format!(
                "{} with {:?}",
                operation.model(),
                operation.params()
            )),
            ErrorSpec::Invalid(errors) => Error::InvalidResource {
                errors: errors.clone(),
            },
            ErrorSpec::Status(422) => Error::InvalidResource {
                errors: BTreeMap::new(),
            },
            ErrorSpec::Status(status) => Error::Transport {
                status: Some(*status),
                message: "stubbed transport failure".to_string(),
            },
            ErrorSpec::Custom(err) => Error::Custom(err.clone()),
        }
    }
}

impl From<u16> for ErrorSpec {
    fn from(status: u16) -> Self {
        ErrorSpec::Status(status)
    }
}

impl fmt::Debug for ErrorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSpec::NotFound => f.write_str("NotFound"),
            ErrorSpec::Invalid(errors) => f.debug_tuple("Invalid").field(errors).finish(),
            ErrorSpec::Status(status) => f.debug_tuple("Status").field(status).finish(),
            ErrorSpec::Custom(err) => write!(f, "Custom({err})"),
        }
    }
}

/// What a matched expectation does to the operation.
#[derive(Debug)]
pub enum Outcome {
    Return(Value),
    Raise(ErrorSpec),
}

/// A registered stub rule: model, action, matcher and outcome, plus a
/// call counter incremented on each match.
pub struct Expectation {
    model: &'static str,
    action: Action,
    matcher: Matcher,
    outcome: Outcome,
    calls: AtomicUsize,
}

impl Expectation {
    /// How many operations this expectation has answered.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `true` if the expectation answered at least one operation.
    pub fn called(&self) -> bool {
        self.calls() >= 1
    }

    /// `true` if the expectation answered exactly `n` operations.
    pub fn called_times(&self, n: usize) -> bool {
        self.calls() == n
    }

    fn describe(&self) -> String {
        format!("{} {} {:?}", self.model, self.action, self.matcher)
    }
}

impl fmt::Debug for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expectation")
            .field("model", &self.model)
            .field("action", &self.action)
            .field("matcher", &self.matcher)
            .field("outcome", &self.outcome)
            .field("calls", &self.calls())
            .finish()
    }
}

struct RegistryInner {
    enabled: bool,
    allow_requests: bool,
    expectations: Vec<Arc<Expectation>>,
}

/// The expectation table plus the stub-mode toggles.
///
/// Production code paths never consult the registry unless a test has
/// installed a [`StubAdapter`] and called [`enable`](StubRegistry::enable).
/// Resetting between test cases is the caller's responsibility
/// ([`reset`](StubRegistry::reset)).
pub struct StubRegistry {
    inner: Mutex<RegistryInner>,
}

impl Default for StubRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StubRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                enabled: false,
                allow_requests: false,
                expectations: Vec::new(),
            }),
        }
    }

    /// Start intercepting dispatched operations.
    pub fn enable(&self) {
        self.inner.lock().unwrap().enabled = true;
    }

    /// Stop intercepting; a `StubAdapter` passes everything to its
    /// fallback transport while disabled.
    pub fn disable(&self) {
        self.inner.lock().unwrap().enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.lock().unwrap().enabled
    }

    /// While enabled, decide what happens to an operation no expectation
    /// matches: `true` lets it fall through to the real adapter, `false`
    /// fails it with [`Error::RealRequestsNotAllowed`].
    pub fn set_allow_requests(&self, allow: bool) {
        self.inner.lock().unwrap().allow_requests = allow;
    }

    pub fn allow_requests(&self) -> bool {
        self.inner.lock().unwrap().allow_requests
    }

    /// Drop every registered expectation.
    pub fn reset(&self) {
        self.inner.lock().unwrap().expectations.clear();
    }

    /// Begin registering an expectation for one model and action. Finish
    /// with [`and_return`](ExpectationBuilder::and_return) or
    /// [`and_raise`](ExpectationBuilder::and_raise).
    pub fn expect<R: Resource>(&self, action: Action) -> ExpectationBuilder<'_> {
        ExpectationBuilder {
            registry: self,
            model: R::kind(),
            schema: R::schema(),
            action,
            matcher: Matcher::Fields(Params::new()),
        }
    }

    fn register(&self, expectation: Arc<Expectation>) {
        debug!(stub = %expectation.describe(), "expectation registered");
        self.inner.lock().unwrap().expectations.push(expectation);
    }

    fn find_matches(&self, operation: &Operation) -> Vec<Arc<Expectation>> {
        self.inner
            .lock()
            .unwrap()
            .expectations
            .iter()
            .filter(|exp| {
                exp.model == operation.model()
                    && exp.action == operation.action()
                    && exp.matcher.matches(operation)
            })
            .cloned()
            .collect()
    }
}

/// Fluent builder returned by [`StubRegistry::expect`].
pub struct ExpectationBuilder<'a> {
    registry: &'a StubRegistry,
    model: &'static str,
    schema: &'static AttributeSet,
    action: Action,
    matcher: Matcher,
}

impl<'a> ExpectationBuilder<'a> {
    /// Match operations whose parameters carry every given field. Fields
    /// are cast through the model's schema first, so `"id" => "1"`
    /// matches an operation dispatched with `id: 1`.
    pub fn with(mut self, fields: Params) -> Self {
        let mut cast = Params::new();
        for (name, value) in fields {
            match self.schema.cast_value(&name, &value) {
                Ok(v) => {
                    cast.insert(name, v);
                }
                Err(err) => {
                    warn!(model = self.model, field = %name, %err, "uncastable matcher field kept raw");
                    cast.insert(name, value);
                }
            }
        }
        self.matcher = Matcher::Fields(cast);
        self
    }

    /// Match operations by predicate.
    pub fn matching(mut self, pred: impl Fn(&Operation) -> bool + Send + Sync + 'static) -> Self {
        self.matcher = Matcher::Predicate(Box::new(pred));
        self
    }

    /// Register the expectation with a canned success payload.
    pub fn and_return(self, data: impl Into<Value>) -> Arc<Expectation> {
        self.finish(Outcome::Return(data.into()))
    }

    /// Register the expectation with a synthetic error: a symbolic
    /// [`ErrorSpec`], a bare status code, or a pass-through error value.
    pub fn and_raise(self, spec: impl Into<ErrorSpec>) -> Arc<Expectation> {
        self.finish(Outcome::Raise(spec.into()))
    }

    fn finish(self, outcome: Outcome) -> Arc<Expectation> {
        let expectation = Arc::new(Expectation {
            model: self.model,
            action: self.action,
            matcher: self.matcher,
            outcome,
            calls: AtomicUsize::new(0),
        });
        self.registry.register(expectation.clone());
        expectation
    }
}

/// The stub transport. Installed in place of the real adapter, it answers
/// dispatched operations from the registry's expectation table.
pub struct StubAdapter {
    registry: Arc<StubRegistry>,
    fallback: Option<Arc<dyn Adapter>>,
    ready: Mutex<VecDeque<Completion>>,
}

impl StubAdapter {
    pub fn new(registry: Arc<StubRegistry>) -> Self {
        Self {
            registry,
            fallback: None,
            ready: Mutex::new(VecDeque::new()),
        }
    }

    /// A stub adapter that can fall through to a real transport, either
    /// while the registry is disabled or when an unmatched operation is
    /// allowed out by [`StubRegistry::set_allow_requests`].
    pub fn with_fallback(registry: Arc<StubRegistry>, fallback: Arc<dyn Adapter>) -> Self {
        Self {
            registry,
            fallback: Some(fallback),
            ready: Mutex::new(VecDeque::new()),
        }
    }

    fn complete(&self, operation: Operation, outcome: Result<Value, Error>) {
        self.ready
            .lock()
            .unwrap()
            .push_back(Completion { operation, outcome });
    }
}

#[async_trait]
impl Adapter for StubAdapter {
    fn dispatch(&self, operation: Operation) {
        if !self.registry.is_enabled() {
            match &self.fallback {
                Some(real) => return real.dispatch(operation),
                None => {
                    let err = Error::Transport {
                        status: None,
                        message: "stub mode disabled and no transport adapter installed"
                            .to_string(),
                    };
                    return self.complete(operation, Err(err));
                }
            }
        }

        let matches = self.registry.find_matches(&operation);
        match matches.as_slice() {
            [] => {
                if self.registry.allow_requests() {
                    if let Some(real) = &self.fallback {
                        debug!(model = operation.model(), action = %operation.action(), "no stub matched, falling through");
                        return real.dispatch(operation);
                    }
                }
                warn!(model = operation.model(), action = %operation.action(), "no stub matched");
                let err = Error::RealRequestsNotAllowed {
                    model: operation.model().to_string(),
                    action: operation.action(),
                };
                self.complete(operation, Err(err));
            }
            [expectation] => {
                expectation.calls.fetch_add(1, Ordering::SeqCst);
                debug!(stub = %expectation.describe(), "stub matched");
                let outcome = match &expectation.outcome {
                    Outcome::Return(data) => Ok(data.clone()),
                    Outcome::Raise(spec) => Err(spec.to_error(&operation)),
                };
                self.complete(operation, outcome);
            }
            many => {
                // Ambiguity is a hard error; no call counter increments.
                let candidates: Vec<String> = many.iter().map(|exp| exp.describe()).collect();
                warn!(model = operation.model(), action = %operation.action(), ?candidates, "ambiguous stubs");
                let err = Error::AmbiguousStub {
                    model: operation.model().to_string(),
                    action: operation.action(),
                    candidates,
                };
                self.complete(operation, Err(err));
            }
        }
    }

    async fn drive(&self) -> Option<Completion> {
        let local = self.ready.lock().unwrap().pop_front();
        if local.is_some() {
            return local;
        }
        match &self.fallback {
            Some(real) => real.drive().await,
            None => None,
        }
    }
}

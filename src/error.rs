//! # Crate Errors
//!
//! This module defines the common error types used throughout the crate.
//! By centralizing error definitions, we ensure consistent error handling
//! across operations, the runner, and the stub subsystem.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::operation::Action;

/// Errors surfaced by the operation queue and stub subsystem.
///
/// Casting errors are raised synchronously at assignment time; everything
/// else travels the async path and propagates out of [`Runner::start`]
/// once the batch has settled.
///
/// [`Runner::start`]: crate::runner::Runner::start
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A value could not be coerced to an attribute's declared type.
    #[error("cannot cast {value} to {ty}")]
    Cast { value: String, ty: String },

    /// More than one registered expectation matched a dispatched operation.
    #[error("ambiguous stubs for {model} {action}: {candidates:?}")]
    AmbiguousStub {
        model: String,
        action: Action,
        candidates: Vec<String>,
    },

    /// Stub mode is enabled, no expectation matched, and real requests
    /// are disallowed.
    #[error("real requests are not allowed: {model} {action}")]
    RealRequestsNotAllowed { model: String, action: Action },

    /// The requested resource does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The service rejected the resource, optionally with per-field details.
    #[error("invalid resource: {errors:?}")]
    InvalidResource {
        errors: BTreeMap<String, Vec<String>>,
    },

    /// A transport-level failure reported by the adapter.
    #[error("transport error (status {status:?}): {message}")]
    Transport { status: Option<u16>, message: String },

    /// A caller-declared error passed through a stub expectation unchanged.
    #[error("{0}")]
    Custom(Arc<dyn std::error::Error + Send + Sync>),

    /// The adapter reported no remaining work while operations were still
    /// unresolved. Surfaced instead of hanging the flush.
    #[error("adapter stalled with {0} operations in flight")]
    AdapterStalled(usize),

    /// No process-wide runner has been installed.
    #[error("no runner installed")]
    NoRunner,
}

impl Error {
    /// Wrap an arbitrary caller error for pass-through via a stub outcome.
    pub fn custom(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Custom(Arc::new(err))
    }
}

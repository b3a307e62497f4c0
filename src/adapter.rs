//! # Transport Adapters
//!
//! The [`Adapter`] trait abstracts "send one HTTP-like request, hand back
//! its outcome". It is the seam that lets the stub subsystem replace a
//! real network transport in tests: any conforming adapter substitutes
//! without changing [`Runner`](crate::runner::Runner) or
//! [`Operation`](crate::operation::Operation) code.
//!
//! The real network adapter is an external collaborator; this crate ships
//! the trait and the [`StubAdapter`](crate::stub::StubAdapter).

use async_trait::async_trait;

use serde_json::Value;

use crate::error::Error;
use crate::operation::Operation;

/// One finished request: the operation it belongs to and the decoded
/// outcome. Both the real adapter and the stub adapter complete through
/// this type, so the runner resolves every operation through a single
/// path regardless of transport.
#[derive(Debug)]
pub struct Completion {
    pub operation: Operation,
    pub outcome: Result<Value, Error>,
}

/// A pluggable transport.
///
/// Requests may complete out of dispatch order; the runner tolerates any
/// completion order the adapter reports.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Begin executing one operation asynchronously. Must not block.
    fn dispatch(&self, operation: Operation);

    /// Advance the underlying multiplexer by one step, waiting for the
    /// next finished request. Returns `None` once no dispatched work
    /// remains.
    async fn drive(&self) -> Option<Completion>;
}

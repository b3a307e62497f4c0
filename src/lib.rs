//! # restq
//!
//! An asynchronous REST-resource access layer: application code declares
//! typed resource models, issues read/create/update/delete operations
//! against them, and later flushes a queue of pending operations, which
//! execute concurrently against a remote service — or against a
//! verifiable stub in tests.
//!
//! ## Architecture Overview
//!
//! The crate separates concerns into four layers:
//!
//! 1. **Attribute Layer** ([`AttributeType`], [`AttributeSet`]) — declared
//!    types and defaults; every stored value is cast through its declared
//!    type, including values arriving from decoded response bodies.
//! 2. **Operation Layer** ([`Operation`]) — one pending resource action
//!    with composable success/failure callbacks, resolved exactly once.
//! 3. **Scheduling Layer** ([`Runner`]) — the queue and drain loop.
//!    Resource calls never block; [`Runner::start`] is the single
//!    suspension point and returns only once every reachable operation
//!    (including ones enqueued by callbacks mid-flush) has resolved.
//! 4. **Transport Layer** ([`Adapter`]) — one trait, dispatch/drive,
//!    behind which a real network adapter and the [`StubAdapter`] are
//!    interchangeable without touching call sites.
//!
//! ## Concurrency Model
//!
//! - One logical flush at a time; `start()` suspends the calling task.
//! - The transport may hold many requests in flight; completion order is
//!   not dispatch order, and the runner resolves completions as they
//!   arrive.
//! - Each operation's callbacks run at most once, on the runner's task.
//! - Enqueue is re-entrant from resolution callbacks (chained requests);
//!   concurrent flushes from separate tasks are not supported.
//!
//! ## Stubbing
//!
//! The [`StubRegistry`] holds expectation records (model, action,
//! matcher, outcome). While enabled, a [`StubAdapter`] intercepts every
//! dispatch: exactly one matching expectation answers the operation;
//! zero matches apply the allow-requests policy; two or more matches are
//! a hard [`Error::AmbiguousStub`] naming the conflict.
//!
//! ```rust
//! use std::sync::{Arc, OnceLock};
//! use restq::{
//!     Action, AttributeSet, AttributeType, Resource, ResourceExt, Runner, StubAdapter,
//!     StubRegistry, params,
//! };
//! use serde_json::json;
//!
//! #[derive(Clone, Debug)]
//! struct User;
//!
//! impl Resource for User {
//!     fn kind() -> &'static str {
//!         "user"
//!     }
//!
//!     fn schema() -> &'static AttributeSet {
//!         static SCHEMA: OnceLock<AttributeSet> = OnceLock::new();
//!         SCHEMA.get_or_init(|| {
//!             AttributeSet::new()
//!                 .attr("id", AttributeType::Integer)
//!                 .attr("name", AttributeType::Str)
//!                 .attr("age", AttributeType::Integer)
//!         })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Arc::new(StubRegistry::new());
//!     registry.enable();
//!     let runner = Runner::new(Arc::new(StubAdapter::new(registry.clone())));
//!
//!     registry
//!         .expect::<User>(Action::Read)
//!         .with(params! {"id" => 1})
//!         .and_return(json!({"id": 1, "name": "John Smith", "age": "32"}));
//!
//!     let user = User::find(&runner, 1); // does not block, only enqueues
//!     runner.start().await.unwrap();     // the flush
//!
//!     assert_eq!(user.get("name"), json!("John Smith"));
//!     assert_eq!(user.get("age"), json!(32)); // cast to the declared type
//! }
//! ```

pub mod adapter;
pub mod attribute;
pub mod error;
pub mod global;
pub mod operation;
pub mod resource;
pub mod runner;
pub mod stub;
pub mod trace;

// Re-export core types for convenience
pub use adapter::{Adapter, Completion};
pub use attribute::{AttributeSet, AttributeSpec, AttributeType, TypeCast};
pub use error::Error;
pub use operation::{Action, Operation, Params};
pub use resource::{Handle, ListHandle, Resource, ResourceExt};
pub use runner::Runner;
pub use stub::{ErrorSpec, Expectation, Matcher, Outcome, StubAdapter, StubRegistry};

//! # Runner
//!
//! The [`Runner`] owns the queue of unexecuted operations and drives the
//! active adapter's dispatch/drive cycle until the queue drains. It is
//! the only blocking point in the system: resource calls merely enqueue,
//! and a later [`Runner::start`] suspends the caller until every
//! reachable operation has resolved.
//!
//! # Concurrency model
//!
//! One logical flush at a time. The transport may complete requests out
//! of dispatch order; completions are resolved on the runner's task in
//! whatever order the adapter reports them, which keeps callback
//! ordering deterministic per completion and resolution at-most-once.
//! Re-entrant enqueue from inside a resolution callback is supported and
//! feeds the same flush; concurrent `start()` calls from separate tasks
//! are not supported.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::adapter::{Adapter, Completion};
use crate::error::Error;
use crate::operation::Operation;

/// Schedules and executes pending operations against an adapter.
///
/// Cloning is cheap: clones share the same queue and adapter, which is
/// what lets resolution callbacks enqueue chained operations.
#[derive(Clone)]
pub struct Runner {
    inner: Arc<RunnerInner>,
}

struct RunnerInner {
    adapter: Arc<dyn Adapter>,
    queue: Mutex<VecDeque<Operation>>,
    draining: AtomicBool,
}

impl Runner {
    pub fn new(adapter: Arc<dyn Adapter>) -> Self {
        Self {
            inner: Arc::new(RunnerInner {
                adapter,
                queue: Mutex::new(VecDeque::new()),
                draining: AtomicBool::new(false),
            }),
        }
    }

    /// Append an operation to the pending queue. Never blocks; safe to
    /// call from inside a resolution callback while a flush is draining.
    pub fn enqueue(&self, operation: Operation) {
        debug!(model = operation.model(), action = %operation.action(), "enqueue");
        self.inner.queue.lock().unwrap().push_back(operation);
    }

    /// Number of operations waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().unwrap().len()
    }

    /// Whether a flush is currently in progress.
    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::SeqCst)
    }

    /// Run all queued operations to resolution.
    ///
    /// Dispatch initiation preserves enqueue order; completion order is
    /// whatever the adapter reports. Operations enqueued by callbacks
    /// during the drain are dispatched in the same flush (fixed-point
    /// iteration). If any operation fails without local recovery, the
    /// remainder of the batch settles first and the first such error is
    /// then returned; completed sibling work is never rolled back.
    pub async fn start(&self) -> Result<(), Error> {
        if self.inner.draining.swap(true, Ordering::SeqCst) {
            warn!("start() called while a flush is already draining");
        }
        let result = self.drain().await;
        self.inner.draining.store(false, Ordering::SeqCst);
        result
    }

    async fn drain(&self) -> Result<(), Error> {
        let mut in_flight = 0usize;
        let mut deferred: Option<Error> = None;

        loop {
            while let Some(operation) = self.pop() {
                debug!(model = operation.model(), action = %operation.action(), "dispatch");
                self.inner.adapter.dispatch(operation);
                in_flight += 1;
            }
            if in_flight == 0 {
                break;
            }

            match self.inner.adapter.drive().await {
                Some(completion) => {
                    in_flight -= 1;
                    if let Some(err) = Self::resolve(completion) {
                        warn!(error = %err, "operation failed without local recovery");
                        deferred.get_or_insert(err);
                    }
                }
                None => {
                    // Adapter contract violation. Surface it rather than hang.
                    warn!(in_flight, "adapter reported no remaining work while operations were in flight");
                    deferred.get_or_insert(Error::AdapterStalled(in_flight));
                    break;
                }
            }
        }

        info!(deferred = deferred.is_some(), "flush settled");
        match deferred {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn pop(&self) -> Option<Operation> {
        self.inner.queue.lock().unwrap().pop_front()
    }

    fn resolve(completion: Completion) -> Option<Error> {
        let Completion {
            mut operation,
            outcome,
        } = completion;
        match outcome {
            Ok(raw) => operation.resolve_success(raw),
            Err(err) => operation.resolve_failure(err),
        }
    }
}

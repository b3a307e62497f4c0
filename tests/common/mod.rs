//! Shared fixtures for integration tests: resource models and two test
//! adapters — a deterministic scripted transport and a channel-backed
//! one that completes requests on spawned tasks.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use restq::{
    Adapter, AttributeSet, AttributeType, Completion, Error, Operation, Params, Resource,
};

// --- Resource models ---

#[derive(Clone, Debug)]
pub struct MyUser;

impl Resource for MyUser {
    fn kind() -> &'static str {
        "my_user"
    }

    fn schema() -> &'static AttributeSet {
        static SCHEMA: OnceLock<AttributeSet> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            AttributeSet::new()
                .attr("id", AttributeType::Integer)
                .attr("name", AttributeType::Str)
                .attr("age", AttributeType::Integer)
        })
    }
}

#[derive(Clone, Debug)]
pub struct Session;

impl Resource for Session {
    fn kind() -> &'static str {
        "session"
    }

    fn schema() -> &'static AttributeSet {
        static SCHEMA: OnceLock<AttributeSet> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            AttributeSet::new()
                .attr("id", AttributeType::Str)
                .attr("ident", AttributeType::Str)
                .attr("password", AttributeType::Str)
                .attr("user", AttributeType::Integer)
        })
    }
}

// --- Test adapters ---

pub type Responder = Arc<dyn Fn(&Operation) -> Result<Value, Error> + Send + Sync>;

pub enum CompletionOrder {
    Fifo,
    Lifo,
}

/// Buffers dispatched operations and completes them deterministically
/// when driven, in FIFO or LIFO order, from a responder closure. Records
/// dispatch order for assertions.
pub struct ScriptedAdapter {
    order: CompletionOrder,
    responder: Responder,
    buffered: Mutex<VecDeque<Operation>>,
    dispatched: Mutex<Vec<Params>>,
}

impl ScriptedAdapter {
    pub fn new(
        order: CompletionOrder,
        responder: impl Fn(&Operation) -> Result<Value, Error> + Send + Sync + 'static,
    ) -> Self {
        Self {
            order,
            responder: Arc::new(responder),
            buffered: Mutex::new(VecDeque::new()),
            dispatched: Mutex::new(Vec::new()),
        }
    }

    pub fn dispatch_order(&self) -> Vec<Params> {
        self.dispatched.lock().unwrap().clone()
    }
}

#[async_trait]
impl Adapter for ScriptedAdapter {
    fn dispatch(&self, operation: Operation) {
        self.dispatched.lock().unwrap().push(operation.params().clone());
        self.buffered.lock().unwrap().push_back(operation);
    }

    async fn drive(&self) -> Option<Completion> {
        let operation = match self.order {
            CompletionOrder::Fifo => self.buffered.lock().unwrap().pop_front(),
            CompletionOrder::Lifo => self.buffered.lock().unwrap().pop_back(),
        }?;
        let outcome = (self.responder)(&operation);
        Some(Completion { operation, outcome })
    }
}

/// Completes each request on its own spawned task after a per-operation
/// delay, feeding completions back over an unbounded channel — requests
/// genuinely finish out of dispatch order.
pub struct SpawnAdapter {
    tx: mpsc::UnboundedSender<Completion>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Completion>>,
    in_flight: AtomicUsize,
    responder: Responder,
    delay_ms: Arc<dyn Fn(&Operation) -> u64 + Send + Sync>,
}

impl SpawnAdapter {
    pub fn new(
        responder: impl Fn(&Operation) -> Result<Value, Error> + Send + Sync + 'static,
        delay_ms: impl Fn(&Operation) -> u64 + Send + Sync + 'static,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            in_flight: AtomicUsize::new(0),
            responder: Arc::new(responder),
            delay_ms: Arc::new(delay_ms),
        }
    }
}

#[async_trait]
impl Adapter for SpawnAdapter {
    fn dispatch(&self, operation: Operation) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let tx = self.tx.clone();
        let responder = self.responder.clone();
        let delay = (self.delay_ms)(&operation);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            let outcome = responder(&operation);
            let _ = tx.send(Completion { operation, outcome });
        });
    }

    async fn drive(&self) -> Option<Completion> {
        if self.in_flight.load(Ordering::SeqCst) == 0 {
            return None;
        }
        let completion = self.rx.lock().await.recv().await?;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Some(completion)
    }
}

//! Test doubles for exercising the client and repository without a store.
//!
//! `ScriptedBackend` replays queued outcomes for writes and reads, records
//! every statement it receives, and tracks how many calls overlap.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use propgraph_graph::{
    BackendError, ClientOptions, GraphBackend, GraphClient, GraphRepository, NodeRecord,
    PropertyMap, PropertyValue, ResultValue, Row, Statement,
};

type Outcome = Result<Vec<Row>, BackendError>;

/// Counters and statement log shared between a backend and its test.
#[derive(Default)]
pub struct Calls {
    pub writes: AtomicUsize,
    pub reads: AtomicUsize,
    pub closes: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub statements: Mutex<Vec<Statement>>,
}

impl Calls {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.writes() + self.reads()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn last_statement(&self) -> Option<Statement> {
        self.statements.lock().unwrap().last().cloned()
    }
}

#[derive(Default)]
pub struct ScriptedBackend {
    writes: Mutex<VecDeque<Outcome>>,
    reads: Mutex<VecDeque<Outcome>>,
    delay: Option<Duration>,
    calls: Arc<Calls>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next write attempt.
    pub fn write(self, outcome: Outcome) -> Self {
        self.writes.lock().unwrap().push_back(outcome);
        self
    }

    /// Queue the outcome of the next read.
    pub fn read(self, outcome: Outcome) -> Self {
        self.reads.lock().unwrap().push_back(outcome);
        self
    }

    /// Make every call take this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Arc<Calls> {
        self.calls.clone()
    }

    async fn answer(&self, statement: &Statement, queue: &Mutex<VecDeque<Outcome>>) -> Outcome {
        self.calls.statements.lock().unwrap().push(statement.clone());
        let now = self.calls.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let outcome = queue.lock().unwrap().pop_front().unwrap_or_else(|| Ok(Vec::new()));

        self.calls.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

#[async_trait]
impl GraphBackend for ScriptedBackend {
    async fn run_write(&self, statement: &Statement) -> Outcome {
        self.calls.writes.fetch_add(1, Ordering::SeqCst);
        self.answer(statement, &self.writes).await
    }

    async fn run_read(&self, statement: &Statement) -> Outcome {
        self.calls.reads.fetch_add(1, Ordering::SeqCst);
        self.answer(statement, &self.reads).await
    }

    async fn close(&self) {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Options with millisecond backoff so retry tests stay fast.
pub fn fast_options() -> ClientOptions {
    ClientOptions {
        max_attempts: 3,
        retry_base: Duration::from_millis(1),
        query_timeout: Duration::from_secs(5),
    }
}

pub fn client(backend: ScriptedBackend) -> (GraphClient, Arc<Calls>) {
    let calls = backend.calls();
    (GraphClient::with_backend(backend, fast_options()), calls)
}

pub fn repository(backend: ScriptedBackend) -> (GraphRepository, Arc<Calls>) {
    let (client, calls) = client(backend);
    (GraphRepository::new(client), calls)
}

pub fn node(id: i64, label: &str, properties: PropertyMap) -> NodeRecord {
    NodeRecord {
        id,
        labels: vec![label.to_string()],
        properties,
    }
}

pub fn node_row(column: &str, node: NodeRecord) -> Row {
    Row::new().with(column, ResultValue::Node(node))
}

pub fn count_row(source_matches: i64, target_matches: i64) -> Row {
    Row::new()
        .with("source_matches", ResultValue::Property(PropertyValue::from(source_matches)))
        .with("target_matches", ResultValue::Property(PropertyValue::from(target_matches)))
}

pub fn value_row(value: ResultValue) -> Row {
    Row::new().with("value", value)
}

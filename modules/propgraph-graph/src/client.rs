use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use propgraph_common::{Config, GraphError, Result, Row, StoreMessage};

use crate::builder::Statement;
use crate::neo4j::Neo4jBackend;

/// How a backend call failed, which decides whether it is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The store asked for the transaction to be retried (deadlock, leader switch, ...).
    Transient,
    /// The store could not be reached.
    Unavailable,
    /// The store rejected the statement.
    Rejected,
    /// The store answered with rows the backend could not decode.
    Malformed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Transient => "transient failure",
            FailureKind::Unavailable => "store unavailable",
            FailureKind::Rejected => "statement rejected",
            FailureKind::Malformed => "malformed result",
        };
        f.write_str(name)
    }
}

/// A failed backend call.
///
/// `code` is the store's status code (`Neo.ClientError.Schema...`) when it
/// sent one. `message` is the store's raw text, which may quote property
/// values; `Display` and `Debug` print the code only.
#[derive(Clone)]
pub struct BackendError {
    pub kind: FailureKind,
    pub code: Option<String>,
    pub message: StoreMessage,
}

impl BackendError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: StoreMessage::new(message),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Transient, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unavailable, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Rejected, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Malformed, message)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Status code if the store sent one, otherwise the failure class.
    pub fn summary(&self) -> String {
        self.code.clone().unwrap_or_else(|| self.kind.to_string())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, FailureKind::Transient | FailureKind::Unavailable)
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{}: {code}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl fmt::Debug for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendError")
            .field("kind", &self.kind)
            .field("code", &self.code)
            .finish_non_exhaustive()
    }
}

impl std::error::Error for BackendError {}

/// Transactional execution channel to a graph store.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    /// Run a statement inside a write transaction and return its rows.
    async fn run_write(&self, statement: &Statement) -> std::result::Result<Vec<Row>, BackendError>;

    /// Run a statement as a read and return its rows.
    async fn run_read(&self, statement: &Statement) -> std::result::Result<Vec<Row>, BackendError>;

    /// Release any resources held by the backend.
    async fn close(&self) {}
}

/// Retry and timeout settings for a `GraphClient`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// Total attempts for a write, including the first.
    pub max_attempts: u32,
    /// Backoff before retry `n` (1-based) is `retry_base * 3^(n-1)`.
    pub retry_base: Duration,
    /// Deadline for each individual attempt.
    pub query_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_base: Duration::from_millis(200),
            query_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_attempts,
            retry_base: config.retry_base,
            query_timeout: config.query_timeout,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_base
            .saturating_mul(3u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Owns one session to the graph store.
///
/// Calls are serialized: each `execute_*` holds the session lock until its
/// transaction finishes, so calls on one client complete in the order they
/// acquired it. After `close()` every call fails with `ClientClosed`.
pub struct GraphClient {
    session: Mutex<Option<Box<dyn GraphBackend>>>,
    options: ClientOptions,
}

impl GraphClient {
    /// Connect to Neo4j using the given configuration.
    pub async fn connect(config: &Config) -> Result<Self> {
        let backend = Neo4jBackend::connect(config).await.map_err(|e| match e.kind {
            FailureKind::Transient | FailureKind::Unavailable => GraphError::ServiceUnavailable {
                operation: "connect",
                subject: config.neo4j_database.clone(),
                attempts: 1,
                code: e.summary(),
                message: e.message,
            },
            FailureKind::Rejected | FailureKind::Malformed => GraphError::Connection(e.summary()),
        })?;
        Ok(Self::with_backend(backend, ClientOptions::from_config(config)))
    }

    /// Wrap an already-open backend.
    pub fn with_backend(backend: impl GraphBackend + 'static, options: ClientOptions) -> Self {
        Self {
            session: Mutex::new(Some(Box::new(backend))),
            options,
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub async fn is_closed(&self) -> bool {
        self.session.lock().await.is_none()
    }

    /// Fail with `ClientClosed` if the client has been closed.
    pub async fn ensure_open(&self) -> Result<()> {
        if self.is_closed().await {
            Err(GraphError::ClientClosed)
        } else {
            Ok(())
        }
    }

    /// Run a statement in a write transaction, retrying transient and
    /// connectivity failures with exponential backoff.
    pub async fn execute_write(&self, statement: &Statement) -> Result<Vec<Row>> {
        let session = self.session.lock().await;
        let backend = session.as_deref().ok_or(GraphError::ClientClosed)?;
        let max_attempts = self.options.max_attempts.max(1);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = self.with_timeout(statement, backend.run_write(statement)).await?;
            match outcome {
                Ok(rows) => {
                    debug!(
                        operation = statement.operation,
                        subject = %statement.subject,
                        attempt,
                        rows = rows.len(),
                        "Write committed"
                    );
                    return Ok(rows);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let backoff = self.options.backoff(attempt);
                    warn!(
                        operation = statement.operation,
                        subject = %statement.subject,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Write failed, retrying after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(failure(statement, e, attempt)),
            }
        }
    }

    /// Run a statement as a read. No retries beyond what the driver does itself.
    pub async fn execute_read(&self, statement: &Statement) -> Result<Vec<Row>> {
        let session = self.session.lock().await;
        let backend = session.as_deref().ok_or(GraphError::ClientClosed)?;

        let rows = self
            .with_timeout(statement, backend.run_read(statement))
            .await?
            .map_err(|e| failure(statement, e, 1))?;
        debug!(
            operation = statement.operation,
            subject = %statement.subject,
            rows = rows.len(),
            "Read complete"
        );
        Ok(rows)
    }

    /// Release the session. Safe to call more than once.
    pub async fn close(&self) {
        let mut session = self.session.lock().await;
        if let Some(backend) = session.take() {
            backend.close().await;
            info!("Graph client closed");
        }
    }

    async fn with_timeout<T>(
        &self,
        statement: &Statement,
        call: impl std::future::Future<Output = T>,
    ) -> Result<T> {
        tokio::time::timeout(self.options.query_timeout, call)
            .await
            .map_err(|_| {
                warn!(
                    operation = statement.operation,
                    subject = %statement.subject,
                    timeout_ms = self.options.query_timeout.as_millis() as u64,
                    "Query timed out"
                );
                GraphError::QueryTimeout {
                    operation: statement.operation,
                    subject: statement.subject.clone(),
                    timeout: self.options.query_timeout,
                }
            })
    }
}

/// Map a final backend failure onto the public error taxonomy.
fn failure(statement: &Statement, e: BackendError, attempts: u32) -> GraphError {
    error!(
        operation = statement.operation,
        subject = %statement.subject,
        cypher = %statement.cypher,
        params = %statement.params,
        attempts,
        error = %e,
        "Query failed"
    );
    match e.kind {
        FailureKind::Unavailable => GraphError::ServiceUnavailable {
            operation: statement.operation,
            subject: statement.subject.clone(),
            attempts,
            code: e.summary(),
            message: e.message,
        },
        // Decoder messages name columns and types, never values.
        FailureKind::Malformed => GraphError::Decode(format!(
            "{} on `{}`: {}",
            statement.operation,
            statement.subject,
            e.message.as_str()
        )),
        FailureKind::Transient | FailureKind::Rejected => GraphError::QueryExecution {
            operation: statement.operation,
            subject: statement.subject.clone(),
            cypher: statement.cypher.clone(),
            params: statement.params.clone(),
            code: e.summary(),
            message: e.message,
        },
    }
}

use std::time::Duration;

use thiserror::Error;

use crate::types::{BoundParams, StoreMessage};

pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors surfaced by the graph data-access layer.
///
/// Display and Debug output never carries literal property values. Execution
/// errors keep the bound parameters and the store's raw message for
/// programmatic inspection, but only print parameter names and the store's
/// status code.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Invalid value for property `{property}`: {reason}")]
    InvalidValue { property: String, reason: String },

    #[error("Invalid label `{0}`: expected an identifier")]
    InvalidLabel(String),

    #[error("Invalid relationship type `{0}`: expected an identifier")]
    InvalidRelationshipType(String),

    #[error("Graph client is closed")]
    ClientClosed,

    #[error("{operation} on `{subject}` failed: {code} (query: {cypher}; params: {params})")]
    QueryExecution {
        operation: &'static str,
        subject: String,
        cypher: String,
        params: BoundParams,
        /// Store status code, or the failure class when the store sent none.
        code: String,
        message: StoreMessage,
    },

    #[error("{operation} on `{subject}` timed out after {timeout:?}")]
    QueryTimeout {
        operation: &'static str,
        subject: String,
        timeout: Duration,
    },

    #[error("Graph store unavailable during {operation} on `{subject}` after {attempts} attempt(s): {code}")]
    ServiceUnavailable {
        operation: &'static str,
        subject: String,
        attempts: u32,
        code: String,
        message: StoreMessage,
    },

    #[error("No `{label}` node matched on property `{property}`")]
    NodeNotFound { label: String, property: String },

    #[error("{count} `{label}` entries matched on property `{property}`, expected exactly one")]
    AmbiguousMatch {
        label: String,
        property: String,
        count: usize,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GraphError {
    pub fn invalid_value(property: &str, reason: impl Into<String>) -> Self {
        GraphError::InvalidValue {
            property: property.to_string(),
            reason: reason.into(),
        }
    }

    /// True for the local validation failures that are raised before any
    /// statement is handed to the store.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            GraphError::InvalidValue { .. }
                | GraphError::InvalidLabel(_)
                | GraphError::InvalidRelationshipType(_)
        )
    }
}

use std::env;
use std::time::Duration;

use crate::error::{GraphError, Result};

const DEFAULT_DATABASE: &str = "neo4j";
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE_MS: u64 = 200;
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;
const DEFAULT_FETCH_SIZE: usize = 500;
const DEFAULT_MAX_CONNECTIONS: usize = 10;

/// Connection and execution settings, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Neo4j
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub neo4j_database: String,

    // Driver
    pub fetch_size: usize,
    pub max_connections: usize,

    // Execution
    pub max_attempts: u32,
    pub retry_base: Duration,
    pub query_timeout: Duration,
}

impl Config {
    /// Config with default execution settings for the given endpoint.
    pub fn new(uri: &str, user: &str, password: &str) -> Self {
        Self {
            neo4j_uri: uri.to_string(),
            neo4j_user: user.to_string(),
            neo4j_password: password.to_string(),
            neo4j_database: DEFAULT_DATABASE.to_string(),
            fetch_size: DEFAULT_FETCH_SIZE,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base: Duration::from_millis(DEFAULT_RETRY_BASE_MS),
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        }
    }

    /// Load configuration from the process environment (and `.env`, if present).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| GraphError::Config(format!("{key} environment variable is required")))
        };

        let mut config = Self::new(
            &required("NEO4J_URI")?,
            &required("NEO4J_USER")?,
            &required("NEO4J_PASSWORD")?,
        );

        if let Some(database) = lookup("NEO4J_DATABASE").filter(|v| !v.is_empty()) {
            config.neo4j_database = database;
        }
        config.fetch_size = parse_or(&lookup, "NEO4J_FETCH_SIZE", DEFAULT_FETCH_SIZE)?;
        config.max_connections = parse_or(&lookup, "NEO4J_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        config.max_attempts = parse_or(&lookup, "NEO4J_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        if config.max_attempts == 0 {
            return Err(GraphError::Config(
                "NEO4J_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        config.retry_base = Duration::from_millis(parse_or(
            &lookup,
            "NEO4J_RETRY_BASE_MS",
            DEFAULT_RETRY_BASE_MS,
        )?);
        config.query_timeout = Duration::from_secs(parse_or(
            &lookup,
            "NEO4J_QUERY_TIMEOUT_SECS",
            DEFAULT_QUERY_TIMEOUT_SECS,
        )?);

        Ok(config)
    }

    /// Log the loaded settings with the password masked.
    pub fn log_redacted(&self) {
        fn mask(val: &str) -> String {
            if val.is_empty() {
                "<not set>".to_string()
            } else {
                format!("***({} chars)", val.chars().count())
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  NEO4J_URI: {}", self.neo4j_uri);
        tracing::info!("  NEO4J_USER: {}", self.neo4j_user);
        tracing::info!("  NEO4J_PASSWORD: {}", mask(&self.neo4j_password));
        tracing::info!("  NEO4J_DATABASE: {}", self.neo4j_database);
        tracing::info!(
            max_attempts = self.max_attempts,
            retry_base_ms = self.retry_base.as_millis() as u64,
            query_timeout_secs = self.query_timeout.as_secs(),
            "  execution settings"
        );
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| GraphError::Config(format!("{key} must be a number, got {raw:?}"))),
        None => Ok(default),
    }
}

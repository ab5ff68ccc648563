//! `GraphBackend` over the neo4rs Bolt driver.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use neo4rs::{BoltType, ConfigBuilder, Graph, Neo4jClientErrorKind, Neo4jErrorKind, Query};
use tracing::{info, warn};

use propgraph_common::{Config, NodeRecord, PropertyMap, PropertyValue, RelationshipRecord, ResultValue, Row};

use crate::builder::Statement;
use crate::client::{BackendError, FailureKind, GraphBackend};

/// Neo4j connection pool plus the database it targets.
pub struct Neo4jBackend {
    graph: Graph,
}

impl Neo4jBackend {
    pub async fn connect(config: &Config) -> Result<Self, BackendError> {
        let neo_config = ConfigBuilder::default()
            .uri(config.neo4j_uri.as_str())
            .user(config.neo4j_user.as_str())
            .password(config.neo4j_password.as_str())
            .db(config.neo4j_database.clone())
            .fetch_size(config.fetch_size)
            .max_connections(config.max_connections)
            .build()
            .map_err(classify)?;

        let graph = Graph::connect(neo_config).await.map_err(classify)?;
        info!(uri = %config.neo4j_uri, database = %config.neo4j_database, "Connected to Neo4j");
        Ok(Self { graph })
    }
}

#[async_trait]
impl GraphBackend for Neo4jBackend {
    async fn run_write(&self, statement: &Statement) -> Result<Vec<Row>, BackendError> {
        let mut txn = self.graph.start_txn().await.map_err(classify)?;

        let collected = async {
            let mut stream = txn.execute(to_query(statement)).await.map_err(classify)?;
            let mut rows = Vec::new();
            while let Some(row) = stream.next(txn.handle()).await.map_err(classify)? {
                rows.push(decode_row(&row, &statement.columns)?);
            }
            Ok::<_, BackendError>(rows)
        }
        .await;

        match collected {
            Ok(rows) => {
                txn.commit().await.map_err(classify)?;
                Ok(rows)
            }
            Err(e) => {
                if let Err(rollback) = txn.rollback().await {
                    warn!(operation = statement.operation, error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn run_read(&self, statement: &Statement) -> Result<Vec<Row>, BackendError> {
        let mut stream = self.graph.execute(to_query(statement)).await.map_err(classify)?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await.map_err(classify)? {
            rows.push(decode_row(&row, &statement.columns)?);
        }
        Ok(rows)
    }
}

fn to_query(statement: &Statement) -> Query {
    statement
        .params
        .iter()
        .fold(neo4rs::query(&statement.cypher), |q, (name, value)| {
            q.param(name, to_bolt(value))
        })
}

fn to_bolt(value: &PropertyValue) -> BoltType {
    match value {
        PropertyValue::String(s) => BoltType::from(s.as_str()),
        PropertyValue::Integer(i) => BoltType::from(*i),
        PropertyValue::Float(f) => BoltType::from(*f),
        PropertyValue::Boolean(b) => BoltType::from(*b),
        // Read back through `datetime()` in the template.
        PropertyValue::Timestamp(dt) => BoltType::from(format_datetime(dt)),
        PropertyValue::List(items) => BoltType::from(items.iter().map(to_bolt).collect::<Vec<_>>()),
    }
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Sort a driver error into retryable and terminal failures by its variant
/// and, for server failures, by the status code's class.
fn classify(err: neo4rs::Error) -> BackendError {
    use neo4rs::Error;

    match err {
        Error::IOError { detail } => BackendError::unavailable(detail.to_string())
            .with_code(format!("io error: {:?}", detail.kind())),
        Error::ConnectionError => BackendError::unavailable("connection error").with_code("connection error"),
        Error::Neo4j(e) => BackendError::new(failure_kind(e.kind()), e.message()).with_code(e.code()),
        e @ (Error::UrlParseError(_)
        | Error::UnsupportedScheme(_)
        | Error::InvalidDnsName(_)
        | Error::InvalidConfig
        | Error::AuthenticationError(_)) => {
            let shown = e.to_string();
            BackendError::rejected(shown.clone()).with_code(shown)
        }
        other => BackendError::rejected(other.to_string()),
    }
}

fn failure_kind(kind: Neo4jErrorKind) -> FailureKind {
    match kind {
        Neo4jErrorKind::Transient | Neo4jErrorKind::Client(Neo4jClientErrorKind::SessionExpired) => {
            FailureKind::Transient
        }
        _ => FailureKind::Rejected,
    }
}

fn decode_row(row: &neo4rs::Row, columns: &[&'static str]) -> Result<Row, BackendError> {
    let mut decoded = Row::new();
    for column in columns {
        decoded.push(*column, decode_column(row, column)?);
    }
    Ok(decoded)
}

fn decode_column(row: &neo4rs::Row, column: &str) -> Result<ResultValue, BackendError> {
    let value = row
        .get::<BoltType>(column)
        .map_err(|_| BackendError::malformed(format!("column `{column}` is missing")))?;

    match value {
        BoltType::Node(node) => Ok(ResultValue::Node(decode_node(&neo4rs::Node::new(node)))),
        BoltType::Relation(rel) => Ok(ResultValue::Relationship(decode_relation(&neo4rs::Relation::new(rel)))),
        BoltType::Null(_) => Ok(ResultValue::Null),
        other => decode_value(&other).map(ResultValue::Property).ok_or_else(|| {
            BackendError::malformed(format!("column `{column}` has an unsupported type"))
        }),
    }
}

fn decode_node(node: &neo4rs::Node) -> NodeRecord {
    let mut keys = node.keys();
    keys.sort_unstable();
    NodeRecord {
        id: node.id(),
        labels: node.labels().into_iter().map(String::from).collect(),
        properties: decode_properties(&keys, |key| node.get::<BoltType>(key).ok()),
    }
}

fn decode_relation(rel: &neo4rs::Relation) -> RelationshipRecord {
    let mut keys = rel.keys();
    keys.sort_unstable();
    RelationshipRecord {
        id: rel.id(),
        rel_type: rel.typ().to_string(),
        start_id: rel.start_node_id(),
        end_id: rel.end_node_id(),
        properties: decode_properties(&keys, |key| rel.get::<BoltType>(key).ok()),
    }
}

fn decode_properties(keys: &[&str], read: impl Fn(&str) -> Option<BoltType>) -> PropertyMap {
    let mut properties = PropertyMap::new();
    for key in keys {
        match read(key).as_ref().and_then(decode_value) {
            Some(value) => {
                properties.insert(*key, value);
            }
            None => warn!(property = key, "Skipping property with unsupported type"),
        }
    }
    properties
}

/// Map a Bolt value onto a property value by its wire type. Strings stay
/// strings whatever they look like; only temporal types become timestamps.
fn decode_value(value: &BoltType) -> Option<PropertyValue> {
    match value {
        BoltType::String(s) => Some(PropertyValue::String(s.value.clone())),
        BoltType::Integer(i) => Some(PropertyValue::Integer(i.value)),
        BoltType::Float(f) => Some(PropertyValue::Float(f.value)),
        BoltType::Boolean(b) => Some(PropertyValue::Boolean(b.value)),
        BoltType::DateTime(dt) => DateTime::<FixedOffset>::try_from(dt)
            .ok()
            .map(|dt| PropertyValue::Timestamp(dt.with_timezone(&Utc))),
        BoltType::DateTimeZoneId(dt) => DateTime::<FixedOffset>::try_from(dt)
            .ok()
            .map(|dt| PropertyValue::Timestamp(dt.with_timezone(&Utc))),
        BoltType::LocalDateTime(ldt) => NaiveDateTime::try_from(ldt)
            .ok()
            .map(|ndt| PropertyValue::Timestamp(ndt.and_utc())),
        BoltType::List(items) => items
            .value
            .iter()
            .map(decode_value)
            .collect::<Option<Vec<_>>>()
            .map(PropertyValue::List),
        _ => None,
    }
}

use tracing::info;

use propgraph_common::{
    GraphError, NodeMatcher, NodeRecord, NodeSpec, PropertyMap, PropertyValue, RelationshipSpec,
    RelationshipWrite, Result, ResultValue, Row,
};

use crate::builder::{
    build_create_linked_pair, build_create_node, build_create_relationship,
    build_find_by_property, build_find_field_by_property, build_find_relationship_property,
};
use crate::GraphClient;

/// Relationship type and property read by `find_relationship_rating`.
pub const RATED: &str = "rated";
pub const RATING: &str = "rating";

/// Public data-access surface: builds statements and runs them on the client.
///
/// Errors from the builder and client propagate unchanged. Validation happens
/// before the client is asked to run anything.
pub struct GraphRepository {
    client: GraphClient,
}

impl GraphRepository {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &GraphClient {
        &self.client
    }

    /// Create a node and return it as stored.
    pub async fn create_node(&self, spec: &NodeSpec) -> Result<NodeRecord> {
        self.client.ensure_open().await?;
        let statement = build_create_node(spec)?;
        let rows = self.client.execute_write(&statement).await?;
        let node = node_column(first_row(rows, statement.operation)?, "n")?;
        info!(label = %spec.label, id = node.id, "Created node");
        Ok(node)
    }

    /// Merge `source -[rel_type]-> target` with the given properties.
    ///
    /// Each matcher must identify exactly one node; otherwise nothing is
    /// written and `NodeNotFound` or `AmbiguousMatch` is returned.
    pub async fn create_relationship(
        &self,
        source: &NodeMatcher,
        rel_type: &str,
        props: &PropertyMap,
        target: &NodeMatcher,
    ) -> Result<RelationshipWrite> {
        self.client.ensure_open().await?;
        let statement = build_create_relationship(source, rel_type, props, target)?;
        let rows = self.client.execute_write(&statement).await?;
        let mut row = first_row(rows, statement.operation)?;

        let write = RelationshipWrite {
            source_matches: count_column(&mut row, "source_matches")?,
            target_matches: count_column(&mut row, "target_matches")?,
        };
        require_single(source, write.source_matches)?;
        require_single(target, write.target_matches)?;

        info!(rel_type, source = %source.label, target = %target.label, "Merged relationship");
        Ok(write)
    }

    pub async fn create_relationship_spec(&self, spec: &RelationshipSpec) -> Result<RelationshipWrite> {
        self.create_relationship(&spec.source, &spec.rel_type, &spec.properties, &spec.target)
            .await
    }

    /// All `label` nodes whose `property` equals `value`.
    pub async fn find_node_by_property(
        &self,
        label: &str,
        property: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<Vec<NodeRecord>> {
        self.client.ensure_open().await?;
        let statement = build_find_by_property(label, property, &value.into())?;
        self.client
            .execute_read(&statement)
            .await?
            .into_iter()
            .map(|row| node_column(row, "n"))
            .collect()
    }

    /// `field` of every `label` node whose `property` equals `value`.
    /// Nodes without the field are skipped.
    pub async fn find_field_by_property(
        &self,
        label: &str,
        property: &str,
        value: impl Into<PropertyValue>,
        field: &str,
    ) -> Result<Vec<PropertyValue>> {
        self.client.ensure_open().await?;
        let statement = build_find_field_by_property(label, property, &value.into(), field)?;
        let mut values = Vec::new();
        for row in self.client.execute_read(&statement).await? {
            if let Some(value) = value_column(row)? {
                values.push(value);
            }
        }
        Ok(values)
    }

    /// `property` of the single `source -[rel_type]-> target` relationship.
    ///
    /// `None` when no such relationship exists or it lacks the property;
    /// `AmbiguousMatch` when the matchers connect through more than one.
    pub async fn find_relationship_property(
        &self,
        source: &NodeMatcher,
        rel_type: &str,
        target: &NodeMatcher,
        property: &str,
    ) -> Result<Option<PropertyValue>> {
        self.client.ensure_open().await?;
        let statement = build_find_relationship_property(source, rel_type, target, property)?;
        let rows = self.client.execute_read(&statement).await?;

        match rows.len() {
            0 => Ok(None),
            1 => rows.into_iter().next().map_or(Ok(None), value_column),
            count => Err(GraphError::AmbiguousMatch {
                label: rel_type.to_string(),
                property: property.to_string(),
                count,
            }),
        }
    }

    /// The numeric `rating` on `user -[rated]-> movie`, if present.
    pub async fn find_relationship_rating(
        &self,
        user: &NodeMatcher,
        movie: &NodeMatcher,
    ) -> Result<Option<f64>> {
        match self.find_relationship_property(user, RATED, movie, RATING).await? {
            None => Ok(None),
            Some(value) => value.as_f64().map(Some).ok_or_else(|| {
                GraphError::Decode(format!(
                    "`{RATING}` on `{RATED}` is a {}, expected a number",
                    value.kind()
                ))
            }),
        }
    }

    /// Create two nodes linked by `first -[rel_type]-> second` in one write.
    pub async fn create_linked_pair(
        &self,
        first: &NodeSpec,
        rel_type: &str,
        second: &NodeSpec,
    ) -> Result<(NodeRecord, NodeRecord)> {
        self.client.ensure_open().await?;
        let statement = build_create_linked_pair(first, rel_type, second)?;
        let rows = self.client.execute_write(&statement).await?;
        let mut row = first_row(rows, statement.operation)?;
        let a = take_node(&mut row, "a")?;
        let b = take_node(&mut row, "b")?;
        info!(rel_type, first = %first.label, second = %second.label, "Created linked pair");
        Ok((a, b))
    }

    /// Close the underlying client. Safe to call more than once.
    pub async fn close(&self) {
        self.client.close().await;
    }
}

fn first_row(rows: Vec<Row>, operation: &str) -> Result<Row> {
    rows.into_iter()
        .next()
        .ok_or_else(|| GraphError::Decode(format!("{operation} returned no rows")))
}

fn node_column(mut row: Row, column: &str) -> Result<NodeRecord> {
    take_node(&mut row, column)
}

fn take_node(row: &mut Row, column: &str) -> Result<NodeRecord> {
    match row.take(column) {
        Some(ResultValue::Node(node)) => Ok(node),
        other => Err(GraphError::Decode(format!(
            "expected a node in column `{column}`, got {}",
            describe(other.as_ref())
        ))),
    }
}

fn count_column(row: &mut Row, column: &str) -> Result<usize> {
    match row.take(column) {
        Some(ResultValue::Property(PropertyValue::Integer(n))) if n >= 0 => Ok(n as usize),
        other => Err(GraphError::Decode(format!(
            "expected a count in column `{column}`, got {}",
            describe(other.as_ref())
        ))),
    }
}

fn value_column(mut row: Row) -> Result<Option<PropertyValue>> {
    match row.take("value") {
        Some(ResultValue::Property(value)) => Ok(Some(value)),
        Some(ResultValue::Null) => Ok(None),
        other => Err(GraphError::Decode(format!(
            "expected a property value in column `value`, got {}",
            describe(other.as_ref())
        ))),
    }
}

fn require_single(matcher: &NodeMatcher, count: usize) -> Result<()> {
    match count {
        1 => Ok(()),
        0 => Err(GraphError::NodeNotFound {
            label: matcher.label.clone(),
            property: matcher.property.clone(),
        }),
        count => Err(GraphError::AmbiguousMatch {
            label: matcher.label.clone(),
            property: matcher.property.clone(),
            count,
        }),
    }
}

fn describe(value: Option<&ResultValue>) -> &'static str {
    match value {
        None => "nothing",
        Some(ResultValue::Node(_)) => "a node",
        Some(ResultValue::Relationship(_)) => "a relationship",
        Some(ResultValue::Property(_)) => "a property value",
        Some(ResultValue::Null) => "null",
    }
}

//! Query construction. Every builder is a pure function of its arguments:
//! the same input always yields a byte-identical `Statement`.

use propgraph_common::{BoundParams, NodeMatcher, NodeSpec, PropertyMap, PropertyValue, Result};

use crate::encoder::{quote, validate_label, validate_property_name, validate_relationship_type, ParamEncoder};

/// A parameterized query template, ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Repository-level operation name, for logs and errors.
    pub operation: &'static str,
    /// Label or relationship type the statement is about.
    pub subject: String,
    pub cypher: String,
    pub params: BoundParams,
    /// Columns the template returns, in order.
    pub columns: Vec<&'static str>,
}

/// `CREATE` a single node with one placeholder per property, returning it as `n`.
pub fn build_create_node(spec: &NodeSpec) -> Result<Statement> {
    validate_label(&spec.label)?;

    let mut encoder = ParamEncoder::new();
    let pattern = node_pattern(&mut encoder, "n", &spec.label, "prop", &spec.properties)?;

    Ok(Statement {
        operation: "create_node",
        subject: spec.label.clone(),
        cypher: format!("CREATE {pattern} RETURN n"),
        params: encoder.finish(),
        columns: vec!["n"],
    })
}

/// Upsert a directed relationship between two independently matched nodes.
///
/// Each endpoint is collected on its own, and the relationship is merged only
/// when both matchers hit exactly one node, so ambiguous or missing endpoints
/// never produce a write. `MERGE` keeps re-runs from creating duplicates; the
/// given properties are `SET` on the merged relationship. The template always
/// returns one row with `source_matches` and `target_matches`.
pub fn build_create_relationship(
    source: &NodeMatcher,
    rel_type: &str,
    props: &PropertyMap,
    target: &NodeMatcher,
) -> Result<Statement> {
    validate_relationship_type(rel_type)?;
    validate_label(&source.label)?;
    validate_label(&target.label)?;

    let mut encoder = ParamEncoder::new();
    let source_pattern = matcher_pattern(&mut encoder, "a", source, "source")?;
    let target_pattern = matcher_pattern(&mut encoder, "b", target, "target")?;

    let assignments: Vec<String> = encoder
        .bind_map("rel", props.iter())?
        .into_iter()
        .map(|(key, placeholder)| format!("r.{key} = {placeholder}"))
        .collect();
    let merge = if assignments.is_empty() {
        format!("MERGE (a)-[:{}]->(b)", quote(rel_type))
    } else {
        format!(
            "MERGE (a)-[r:{}]->(b) SET {}",
            quote(rel_type),
            assignments.join(", ")
        )
    };

    let cypher = format!(
        "OPTIONAL MATCH {source_pattern} \
         WITH collect(a) AS sources \
         OPTIONAL MATCH {target_pattern} \
         WITH sources, collect(b) AS targets \
         FOREACH (a IN CASE WHEN size(sources) = 1 AND size(targets) = 1 THEN sources ELSE [] END | \
         FOREACH (b IN targets | {merge})) \
         RETURN size(sources) AS source_matches, size(targets) AS target_matches"
    );

    Ok(Statement {
        operation: "create_relationship",
        subject: rel_type.to_string(),
        cypher,
        params: encoder.finish(),
        columns: vec!["source_matches", "target_matches"],
    })
}

/// Find every `label` node whose `property` equals `value`, returning the nodes as `n`.
pub fn build_find_by_property(label: &str, property: &str, value: &PropertyValue) -> Result<Statement> {
    let (encoder, predicate) = equality_predicate(label, property, value)?;

    Ok(Statement {
        operation: "find_node_by_property",
        subject: label.to_string(),
        cypher: format!("MATCH (n:{}) WHERE {predicate} RETURN n", quote(label)),
        params: encoder.finish(),
        columns: vec!["n"],
    })
}

/// Like `build_find_by_property`, but only returns `field` of each match as `value`.
pub fn build_find_field_by_property(
    label: &str,
    property: &str,
    value: &PropertyValue,
    field: &str,
) -> Result<Statement> {
    validate_property_name(field)?;
    let (encoder, predicate) = equality_predicate(label, property, value)?;

    Ok(Statement {
        operation: "find_field_by_property",
        subject: label.to_string(),
        cypher: format!(
            "MATCH (n:{}) WHERE {predicate} RETURN n.{} AS value",
            quote(label),
            quote(field)
        ),
        params: encoder.finish(),
        columns: vec!["value"],
    })
}

/// Read `property` of every `source -[rel_type]-> target` relationship, as `value`.
pub fn build_find_relationship_property(
    source: &NodeMatcher,
    rel_type: &str,
    target: &NodeMatcher,
    property: &str,
) -> Result<Statement> {
    validate_relationship_type(rel_type)?;
    validate_label(&source.label)?;
    validate_label(&target.label)?;
    validate_property_name(property)?;

    let mut encoder = ParamEncoder::new();
    let source_pattern = matcher_pattern(&mut encoder, "a", source, "source")?;
    let target_pattern = matcher_pattern(&mut encoder, "b", target, "target")?;

    Ok(Statement {
        operation: "find_relationship_property",
        subject: rel_type.to_string(),
        cypher: format!(
            "MATCH {source_pattern}-[r:{}]->{target_pattern} RETURN r.{} AS value",
            quote(rel_type),
            quote(property)
        ),
        params: encoder.finish(),
        columns: vec!["value"],
    })
}

/// Create two nodes and a relationship from the first to the second in one
/// statement, returning both nodes as `a` and `b`.
pub fn build_create_linked_pair(first: &NodeSpec, rel_type: &str, second: &NodeSpec) -> Result<Statement> {
    validate_relationship_type(rel_type)?;
    validate_label(&first.label)?;
    validate_label(&second.label)?;

    let mut encoder = ParamEncoder::new();
    let first_pattern = node_pattern(&mut encoder, "a", &first.label, "first", &first.properties)?;
    let second_pattern = node_pattern(&mut encoder, "b", &second.label, "second", &second.properties)?;

    Ok(Statement {
        operation: "create_linked_pair",
        subject: rel_type.to_string(),
        cypher: format!(
            "CREATE {first_pattern} CREATE {second_pattern} CREATE (a)-[:{}]->(b) RETURN a, b",
            quote(rel_type)
        ),
        params: encoder.finish(),
        columns: vec!["a", "b"],
    })
}

/// `(var:`Label` {`k`: $scope_k, ...})`, braces omitted for an empty map.
fn node_pattern(
    encoder: &mut ParamEncoder,
    var: &str,
    label: &str,
    scope: &str,
    properties: &PropertyMap,
) -> Result<String> {
    let entries = encoder.bind_map(scope, properties.iter())?;
    if entries.is_empty() {
        return Ok(format!("({var}:{})", quote(label)));
    }
    let body: Vec<String> = entries
        .into_iter()
        .map(|(key, placeholder)| format!("{key}: {placeholder}"))
        .collect();
    Ok(format!("({var}:{} {{{}}})", quote(label), body.join(", ")))
}

fn matcher_pattern(encoder: &mut ParamEncoder, var: &str, matcher: &NodeMatcher, scope: &str) -> Result<String> {
    let placeholder = encoder.bind(scope, &matcher.property, &matcher.value)?;
    Ok(format!(
        "({var}:{} {{{}: {placeholder}}})",
        quote(&matcher.label),
        quote(&matcher.property)
    ))
}

fn equality_predicate(label: &str, property: &str, value: &PropertyValue) -> Result<(ParamEncoder, String)> {
    validate_label(label)?;
    let mut encoder = ParamEncoder::new();
    let placeholder = encoder.bind("match", property, value)?;
    let predicate = format!("n.{} = {placeholder}", quote(property));
    Ok((encoder, predicate))
}

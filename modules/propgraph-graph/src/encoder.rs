//! Value encoding: turns typed property values into named placeholders plus
//! bound parameters. Values never enter query text; only validated
//! identifiers (labels, relationship types, property keys) do, and those are
//! backtick-quoted.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use propgraph_common::{BoundParams, GraphError, PropertyValue, Result, ValueKind};

static RE_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

pub fn is_identifier(name: &str) -> bool {
    RE_IDENTIFIER.is_match(name)
}

pub fn validate_label(label: &str) -> Result<()> {
    if is_identifier(label) {
        Ok(())
    } else {
        Err(GraphError::InvalidLabel(label.to_string()))
    }
}

pub fn validate_relationship_type(rel_type: &str) -> Result<()> {
    if is_identifier(rel_type) {
        Ok(())
    } else {
        Err(GraphError::InvalidRelationshipType(rel_type.to_string()))
    }
}

pub fn validate_property_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(GraphError::invalid_value(name, "property name is empty"));
    }
    if !is_identifier(name) {
        return Err(GraphError::invalid_value(
            name,
            "property name must start with a letter or underscore and contain only letters, digits and underscores",
        ));
    }
    Ok(())
}

/// Quote an already-validated identifier for use in a query template.
pub fn quote(identifier: &str) -> String {
    format!("`{identifier}`")
}

/// Check that a value can be bound: finite floats, flat homogeneous lists.
pub fn validate_value(name: &str, value: &PropertyValue) -> Result<()> {
    match value {
        PropertyValue::Float(f) if !f.is_finite() => Err(GraphError::invalid_value(
            name,
            "float must be finite (NaN and Infinity are not storable)",
        )),
        PropertyValue::List(items) => {
            let Some(first) = items.first() else {
                return Ok(());
            };
            let kind = first.kind();
            for item in items {
                if item.kind() == ValueKind::List {
                    return Err(GraphError::invalid_value(name, "nested lists are not storable"));
                }
                if item.kind() != kind {
                    return Err(GraphError::invalid_value(
                        name,
                        format!("list mixes {kind} and {} elements", item.kind()),
                    ));
                }
                validate_value(name, item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// A named placeholder and the template expression that reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    pub expression: String,
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

/// Encode one value under the given parameter name.
///
/// Timestamps are read through `datetime()` so the store keeps a native
/// temporal value; the bound parameter itself stays the typed value.
pub fn encode(name: &str, value: &PropertyValue) -> Result<(Placeholder, PropertyValue)> {
    validate_value(name, value)?;

    let expression = match value {
        PropertyValue::Timestamp(_) => format!("datetime(${name})"),
        PropertyValue::List(items)
            if items.first().map(PropertyValue::kind) == Some(ValueKind::Timestamp) =>
        {
            format!("[t IN ${name} | datetime(t)]")
        }
        _ => format!("${name}"),
    };

    Ok((
        Placeholder {
            name: name.to_string(),
            expression,
        },
        value.clone(),
    ))
}

/// Accumulates bound parameters for a single statement.
#[derive(Debug, Default)]
pub struct ParamEncoder {
    params: BoundParams,
}

impl ParamEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` for `property` under `<scope>_<property>`.
    pub fn bind(&mut self, scope: &str, property: &str, value: &PropertyValue) -> Result<Placeholder> {
        validate_property_name(property)?;
        validate_value(property, value)?;
        let name = format!("{scope}_{property}");
        if self.params.contains(&name) {
            return Err(GraphError::invalid_value(property, "property bound twice in one statement"));
        }

        let (placeholder, bound) = encode(&name, value)?;
        self.params.push(name, bound);
        Ok(placeholder)
    }

    /// Bind every entry of a map, returning `` `key`: <placeholder> `` pairs in map order.
    pub fn bind_map<'a>(
        &mut self,
        scope: &str,
        properties: impl IntoIterator<Item = (&'a str, &'a PropertyValue)>,
    ) -> Result<Vec<(String, Placeholder)>> {
        properties
            .into_iter()
            .map(|(key, value)| {
                let placeholder = self.bind(scope, key, value)?;
                Ok((quote(key), placeholder))
            })
            .collect()
    }

    pub fn finish(self) -> BoundParams {
        self.params
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn identifiers_follow_cypher_name_syntax() {
        assert!(is_identifier("user"));
        assert!(is_identifier("_private"));
        assert!(is_identifier("movieId2"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("2fast"));
        assert!(!is_identifier("rated by"));
        assert!(!is_identifier("user`) DETACH DELETE n //"));
        assert!(!is_identifier("título"));
    }

    #[test]
    fn scalar_placeholder_is_plain_parameter() {
        let (placeholder, bound) = encode("prop_name", &PropertyValue::from("Alice")).unwrap();
        assert_eq!(placeholder.expression, "$prop_name");
        assert_eq!(bound, PropertyValue::from("Alice"));
    }

    #[test]
    fn timestamp_is_read_through_datetime() {
        let ts = Utc.with_ymd_and_hms(2009, 2, 13, 23, 31, 30).unwrap();
        let (placeholder, bound) = encode("rel_ratedAt", &PropertyValue::from(ts)).unwrap();
        assert_eq!(placeholder.to_string(), "datetime($rel_ratedAt)");
        assert_eq!(bound.as_timestamp(), Some(ts));

        let list = PropertyValue::List(vec![PropertyValue::from(ts)]);
        let (placeholder, _) = encode("prop_seen", &list).unwrap();
        assert_eq!(placeholder.expression, "[t IN $prop_seen | datetime(t)]");
    }

    #[test]
    fn non_finite_floats_are_rejected() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = encode("prop_score", &PropertyValue::from(value)).unwrap_err();
            assert!(matches!(err, GraphError::InvalidValue { .. }));
        }

        let list = PropertyValue::from(vec![1.0, f64::NAN]);
        assert!(encode("prop_scores", &list).is_err());
    }

    #[test]
    fn lists_must_be_flat_and_homogeneous() {
        let mixed = PropertyValue::List(vec![PropertyValue::from(1), PropertyValue::from("one")]);
        let err = encode("prop_mixed", &mixed).unwrap_err();
        assert!(err.to_string().contains("integer"));

        let nested = PropertyValue::List(vec![PropertyValue::from(vec![1, 2])]);
        assert!(encode("prop_nested", &nested).is_err());

        let empty = PropertyValue::List(Vec::new());
        assert!(encode("prop_empty", &empty).is_ok());
    }

    #[test]
    fn empty_property_name_is_rejected() {
        let mut encoder = ParamEncoder::new();
        let err = encoder.bind("prop", "", &PropertyValue::from(1)).unwrap_err();
        assert!(matches!(err, GraphError::InvalidValue { ref reason, .. } if reason.contains("empty")));
    }

    #[test]
    fn property_names_cannot_smuggle_cypher() {
        let mut encoder = ParamEncoder::new();
        let err = encoder
            .bind("prop", "name: 1}) DETACH DELETE n //", &PropertyValue::from(1))
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidValue { .. }));
        assert!(encoder.finish().is_empty());
    }

    #[test]
    fn duplicate_binding_is_rejected() {
        let mut encoder = ParamEncoder::new();
        encoder.bind("prop", "name", &PropertyValue::from("a")).unwrap();
        assert!(encoder.bind("prop", "name", &PropertyValue::from("b")).is_err());
        // Same property under another scope is a different parameter.
        assert!(encoder.bind("match", "name", &PropertyValue::from("b")).is_ok());
    }

    #[test]
    fn values_stay_out_of_the_expression() {
        let hostile = PropertyValue::from("'}) MATCH (x) DETACH DELETE x //");
        let mut encoder = ParamEncoder::new();
        let placeholder = encoder.bind("prop", "plot", &hostile).unwrap();

        assert_eq!(placeholder.expression, "$prop_plot");
        assert_eq!(encoder.finish().get("prop_plot"), Some(&hostile));
    }
}

//! Incident Queries
//!
//! A query is an exact partition-key match on `event_id` plus an optional
//! filter expression evaluated by the store against each document.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Filter expression over top-level document attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterExpr {
    /// Every clause must hold
    And(Vec<FilterExpr>),
    /// At least one clause must hold
    Or(Vec<FilterExpr>),
    /// Attribute contains `value`: substring test on strings, membership on lists
    Contains { attribute: String, value: String },
    /// Numeric attribute strictly greater than `value`
    GreaterThan { attribute: String, value: f64 },
}

impl FilterExpr {
    pub fn contains(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        FilterExpr::Contains {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn greater_than(attribute: impl Into<String>, value: f64) -> Self {
        FilterExpr::GreaterThan {
            attribute: attribute.into(),
            value,
        }
    }

    /// Evaluate against a document. Missing or mistyped attributes never match.
    pub fn evaluate(&self, document: &Value) -> bool {
        match self {
            FilterExpr::And(clauses) => clauses.iter().all(|c| c.evaluate(document)),
            FilterExpr::Or(clauses) => clauses.iter().any(|c| c.evaluate(document)),
            FilterExpr::Contains { attribute, value } => match document.get(attribute) {
                Some(Value::String(s)) => s.contains(value.as_str()),
                Some(Value::Array(items)) => items.iter().any(|i| i.as_str() == Some(value.as_str())),
                _ => false,
            },
            FilterExpr::GreaterThan { attribute, value } => document
                .get(attribute)
                .and_then(Value::as_f64)
                .map_or(false, |v| v > *value),
        }
    }

    /// Attribute names referenced anywhere in the expression
    pub fn attributes(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_attributes(&mut names);
        names
    }

    fn collect_attributes<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            FilterExpr::And(clauses) | FilterExpr::Or(clauses) => {
                for clause in clauses {
                    clause.collect_attributes(names);
                }
            }
            FilterExpr::Contains { attribute, .. } | FilterExpr::GreaterThan { attribute, .. } => {
                if !names.contains(&attribute.as_str()) {
                    names.push(attribute);
                }
            }
        }
    }

    /// Render to document-store condition syntax with value placeholders
    pub fn render(&self) -> RenderedExpression {
        let mut renderer = ConditionRenderer::default();
        let expression = self.render_with(&mut renderer);
        RenderedExpression {
            expression,
            values: renderer.values,
        }
    }

    pub(crate) fn render_with<R: ClauseRenderer>(&self, renderer: &mut R) -> String {
        match self {
            FilterExpr::And(clauses) => Self::render_compound(clauses, "AND", true, renderer),
            FilterExpr::Or(clauses) => Self::render_compound(clauses, "OR", false, renderer),
            FilterExpr::Contains { attribute, value } => renderer.contains(attribute, value),
            FilterExpr::GreaterThan { attribute, value } => renderer.greater_than(attribute, *value),
        }
    }

    fn render_compound<R: ClauseRenderer>(
        clauses: &[FilterExpr],
        keyword: &str,
        empty: bool,
        renderer: &mut R,
    ) -> String {
        if clauses.is_empty() {
            return renderer.constant(empty);
        }
        let separator = format!(" {} ", keyword);
        clauses
            .iter()
            .map(|clause| {
                let rendered = clause.render_with(renderer);
                match clause {
                    FilterExpr::And(_) | FilterExpr::Or(_) => format!("({})", rendered),
                    _ => rendered,
                }
            })
            .collect::<Vec<_>>()
            .join(separator.as_str())
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render().expression)
    }
}

/// Backend-specific rendering of leaf clauses
pub(crate) trait ClauseRenderer {
    fn contains(&mut self, attribute: &str, value: &str) -> String;
    fn greater_than(&mut self, attribute: &str, value: f64) -> String;
    fn constant(&mut self, value: bool) -> String;
}

/// Value bound to an expression placeholder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    S(String),
    N(f64),
}

/// Condition expression text and its placeholder values
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderedExpression {
    pub expression: String,
    pub values: BTreeMap<String, AttributeValue>,
}

#[derive(Default)]
struct ConditionRenderer {
    values: BTreeMap<String, AttributeValue>,
}

impl ConditionRenderer {
    fn bind(&mut self, value: AttributeValue) -> String {
        let placeholder = format!(":p{}", self.values.len());
        self.values.insert(placeholder.clone(), value);
        placeholder
    }
}

impl ClauseRenderer for ConditionRenderer {
    fn contains(&mut self, attribute: &str, value: &str) -> String {
        let placeholder = self.bind(AttributeValue::S(value.to_string()));
        format!("contains({}, {})", attribute, placeholder)
    }

    fn greater_than(&mut self, attribute: &str, value: f64) -> String {
        let placeholder = self.bind(AttributeValue::N(value));
        format!("{} > {}", attribute, placeholder)
    }

    fn constant(&mut self, value: bool) -> String {
        value.to_string()
    }
}

/// Incident query: exact match on `event_id`, then optional filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Partition key value
    pub event_id: String,
    /// Filter applied by the store after the key lookup
    pub filter: Option<FilterExpr>,
}

impl QuerySpec {
    /// Unfiltered lookup of every incident of an event
    pub fn for_event(event_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: FilterExpr) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Whether a document passes the filter (key match is the caller's job)
    pub fn accepts(&self, document: &Value) -> bool {
        self.filter.as_ref().map_or(true, |f| f.evaluate(document))
    }
}

impl fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event_id = {:?}", self.event_id)?;
        if let Some(filter) = &self.filter {
            let rendered = filter.render();
            write!(f, " FILTER {}", rendered.expression)?;
            for (placeholder, value) in &rendered.values {
                match value {
                    AttributeValue::S(s) => write!(f, " {}={:?}", placeholder, s)?,
                    AttributeValue::N(n) => write!(f, " {}={}", placeholder, n)?,
                }
            }
        }
        Ok(())
    }
}

/// Attribute names are interpolated into backend syntax, so only plain
/// identifiers are accepted
pub(crate) fn is_plain_attribute(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn type_filter() -> FilterExpr {
        FilterExpr::And(vec![
            FilterExpr::greater_than("confidence_level", 0.8),
            FilterExpr::Or(vec![
                FilterExpr::contains("object_type", "cycle"),
                FilterExpr::contains("object_type", "pedestrian"),
            ]),
        ])
    }

    #[test]
    fn test_render_condition_syntax() {
        let rendered = type_filter().render();
        assert_eq!(
            rendered.expression,
            "confidence_level > :p0 AND (contains(object_type, :p1) OR contains(object_type, :p2))"
        );
        assert_eq!(rendered.values.get(":p0"), Some(&AttributeValue::N(0.8)));
        assert_eq!(
            rendered.values.get(":p2"),
            Some(&AttributeValue::S("pedestrian".to_string()))
        );
    }

    #[test]
    fn test_contains_is_substring_match() {
        let filter = type_filter();
        assert!(filter.evaluate(&json!({"confidence_level": 0.9, "object_type": "cyclist"})));
        assert!(filter.evaluate(&json!({"confidence_level": 0.9, "object_type": "motorcycle"})));
        assert!(!filter.evaluate(&json!({"confidence_level": 0.9, "object_type": "tree"})));
    }

    #[test]
    fn test_contains_on_list_is_membership() {
        let filter = FilterExpr::contains("error_codes", "P300");
        assert!(filter.evaluate(&json!({"error_codes": ["P120", "P300"]})));
        assert!(!filter.evaluate(&json!({"error_codes": ["P3000"]})));
    }

    #[test]
    fn test_greater_than_is_strict() {
        let filter = FilterExpr::greater_than("confidence_level", 0.8);
        assert!(!filter.evaluate(&json!({"confidence_level": 0.8})));
        assert!(filter.evaluate(&json!({"confidence_level": 0.81})));
    }

    #[test]
    fn test_missing_attributes_never_match() {
        let filter = type_filter();
        assert!(!filter.evaluate(&json!({"object_type": "cyclist"})));
        assert!(!filter.evaluate(&json!({"confidence_level": "0.9", "object_type": "cyclist"})));
    }

    #[test]
    fn test_attributes_are_deduplicated() {
        assert_eq!(type_filter().attributes(), vec!["confidence_level", "object_type"]);
    }

    #[test]
    fn test_query_spec_without_filter_accepts_all() {
        let spec = QuerySpec::for_event("event_id_01_00");
        assert!(spec.accepts(&json!({})));
        assert_eq!(spec.to_string(), "event_id = \"event_id_01_00\"");
    }

    #[test]
    fn test_plain_attribute_names() {
        assert!(is_plain_attribute("confidence_level"));
        assert!(!is_plain_attribute("a.b"));
        assert!(!is_plain_attribute("x') OR 1=1 --"));
        assert!(!is_plain_attribute(""));
    }
}

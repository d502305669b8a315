//! Incident Query Builder
//!
//! Translates accepted object types and a confidence threshold into a
//! store query for one event's incidents.

use crate::DetectionError;
use std::collections::BTreeSet;
use storage::{FilterExpr, QuerySpec};

/// Incident attribute compared against the threshold
pub const CONFIDENCE_ATTRIBUTE: &str = "confidence_level";
/// Incident attribute tested for containment of each accepted type
pub const OBJECT_TYPE_ATTRIBUTE: &str = "object_type";
/// Default confidence threshold
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.8;

/// Builds incident queries
pub struct IncidentQueryBuilder;

impl IncidentQueryBuilder {
    /// Build the query for `event_id`.
    ///
    /// The filter is `confidence_level > threshold`, AND-ed with an OR of
    /// `contains(object_type, token)` for every accepted token when the set
    /// is non-empty. Containment is a substring test: `"cycle"` also matches
    /// `"motorcycle"`.
    pub fn build(
        event_id: &str,
        accepted_object_types: &BTreeSet<String>,
        confidence_threshold: f64,
    ) -> Result<QuerySpec, DetectionError> {
        validate_threshold(confidence_threshold)?;

        let confidence = FilterExpr::greater_than(CONFIDENCE_ATTRIBUTE, confidence_threshold);
        let filter = if accepted_object_types.is_empty() {
            confidence
        } else {
            let types = accepted_object_types
                .iter()
                .map(|t| FilterExpr::contains(OBJECT_TYPE_ATTRIBUTE, t.as_str()))
                .collect();
            FilterExpr::And(vec![confidence, FilterExpr::Or(types)])
        };

        Ok(QuerySpec::for_event(event_id).with_filter(filter))
    }
}

/// Reject thresholds outside [0, 1] (NaN included)
pub fn validate_threshold(threshold: f64) -> Result<(), DetectionError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(DetectionError::InvalidThreshold(threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(tokens: &[&str]) -> BTreeSet<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_empty_types_is_confidence_only() {
        let spec = IncidentQueryBuilder::build("event_id_01_00", &BTreeSet::new(), 0.8).unwrap();
        assert_eq!(spec.event_id, "event_id_01_00");
        assert_eq!(
            spec.filter,
            Some(FilterExpr::GreaterThan {
                attribute: "confidence_level".to_string(),
                value: 0.8,
            })
        );
    }

    #[test]
    fn test_types_form_disjunction_of_containment() {
        let spec =
            IncidentQueryBuilder::build("event_id_01_00", &types(&["vehicle", "cyclist"]), 0.7).unwrap();
        assert_eq!(
            spec.filter,
            Some(FilterExpr::And(vec![
                FilterExpr::greater_than("confidence_level", 0.7),
                FilterExpr::Or(vec![
                    FilterExpr::contains("object_type", "cyclist"),
                    FilterExpr::contains("object_type", "vehicle"),
                ]),
            ]))
        );
    }

    #[test]
    fn test_overlapping_tokens_over_match() {
        let spec = IncidentQueryBuilder::build("e", &types(&["cycle"]), 0.5).unwrap();
        let document = serde_json::json!({"confidence_level": 0.9, "object_type": "motorcycle"});
        assert!(spec.accepts(&document));
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(IncidentQueryBuilder::build("e", &BTreeSet::new(), 0.0).is_ok());
        assert!(IncidentQueryBuilder::build("e", &BTreeSet::new(), 1.0).is_ok());
        for bad in [-0.01, 1.01, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                IncidentQueryBuilder::build("e", &BTreeSet::new(), bad),
                Err(DetectionError::InvalidThreshold(_))
            ));
        }
    }
}

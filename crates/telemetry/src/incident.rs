//! Radar incident records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::DocumentKey;

/// Radar detection associated with one event
///
/// `distance` and `confidence_level` are optional because the store is
/// schemaless; a record without them is still returned by key lookups and
/// has to be rejected by whoever consumes it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Incident {
    /// Partition key, references `Event::event_id`
    pub event_id: String,
    /// Sort key, unique within the event
    pub incident_id: String,
    pub timestamp: DateTime<Utc>,
    pub radar_id: String,
    /// Distance to the detected object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    /// Closing velocity
    pub velocity: f64,
    pub azimuth_angle: i32,
    pub elevation_angle: i32,
    pub object_type: String,
    pub object_size: String,
    pub object_class: String,
    /// Detection confidence in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_level: Option<f64>,
}

impl Incident {
    /// Primary key of this incident in the incidents table
    pub fn key(&self) -> DocumentKey {
        DocumentKey::new(&self.event_id, &self.incident_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_measurements_are_omitted() {
        let incident = Incident {
            event_id: "event_id_01_00".to_string(),
            incident_id: "incident_00".to_string(),
            object_type: "pedestrian".to_string(),
            ..Default::default()
        };

        let doc = serde_json::to_value(&incident).unwrap();
        assert!(doc.get("distance").is_none());
        assert!(doc.get("confidence_level").is_none());

        let back: Incident = serde_json::from_value(doc).unwrap();
        assert_eq!(back.distance, None);
        assert_eq!(back.confidence_level, None);
    }

    #[test]
    fn test_measurements_round_trip() {
        let json = r#"{
            "event_id": "event_id_01_00",
            "incident_id": "incident_07",
            "timestamp": "2024-03-01T10:00:00.007Z",
            "radar_id": "RADAR_8",
            "distance": 12.5,
            "velocity": 30.25,
            "azimuth_angle": 120,
            "elevation_angle": 10,
            "object_type": "cyclist",
            "object_size": "small",
            "object_class": "motorcycle",
            "confidence_level": 0.91
        }"#;

        let incident: Incident = serde_json::from_str(json).unwrap();
        assert_eq!(incident.distance, Some(12.5));
        assert_eq!(incident.confidence_level, Some(0.91));
        assert_eq!(incident.key(), DocumentKey::new("event_id_01_00", "incident_07"));
    }
}

//! Accident Classifier
//!
//! Scores each radar incident of a triggered event against a fixed bar. The
//! score is the airbag base plus a distance-band increase for that incident
//! alone; increases are never summed across incidents.

use crate::trigger::SpeedChange;
use crate::DetectionError;
use serde::{Deserialize, Serialize};
use telemetry::{Event, Incident};

/// Base probability when the airbag deployed
pub const AIRBAG_BASE_PROBABILITY: f64 = 0.3;
/// Incidents at or beyond this distance add nothing
pub const PROXIMITY_LIMIT: f64 = 20.0;
/// Width of one distance band
pub const DISTANCE_BAND: f64 = 4.0;
/// Probability lost per distance band
pub const BAND_STEP: f64 = 0.2;
/// Probability an incident must exceed to be reported as the accident
pub const ACCIDENT_PROBABILITY_THRESHOLD: f64 = 0.75;
/// Note attached to triggered events without a qualifying incident
pub const FALSE_POSITIVE_NOTE: &str = "sudden speed change with no qualifying incident";

/// Classifier output for a triggered event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccidentFinding {
    /// Incident judged to be the collision
    Accident { incident: Incident, vehicle_id: String },
    /// Speed change without a qualifying incident
    FalsePositive { event_id: String, note: String },
}

impl AccidentFinding {
    pub fn is_accident(&self) -> bool {
        matches!(self, AccidentFinding::Accident { .. })
    }

    /// Event the finding was produced for
    pub fn event_id(&self) -> &str {
        match self {
            AccidentFinding::Accident { incident, .. } => &incident.event_id,
            AccidentFinding::FalsePositive { event_id, .. } => event_id,
        }
    }
}

/// Base probability from the event alone
pub fn base_probability(event: &Event) -> f64 {
    if event.airbag_deployed {
        AIRBAG_BASE_PROBABILITY
    } else {
        0.0
    }
}

/// Increase contributed by an incident at `distance`: one step lost per
/// 4-unit band, zero from 20 on
pub fn proximity_increase(distance: f64) -> f64 {
    if distance < PROXIMITY_LIMIT {
        1.0 - BAND_STEP * (distance / DISTANCE_BAND).floor()
    } else {
        0.0
    }
}

fn measured_distance(incident: &Incident) -> Result<f64, DetectionError> {
    let malformed = |field| DetectionError::MalformedIncident {
        incident_id: incident.incident_id.clone(),
        field,
    };

    if incident.confidence_level.map_or(true, |c| !c.is_finite()) {
        return Err(malformed("confidence_level"));
    }
    match incident.distance {
        Some(distance) if distance.is_finite() => Ok(distance),
        _ => Err(malformed("distance")),
    }
}

/// Accident classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct AccidentClassifier;

impl AccidentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a triggered event.
    ///
    /// Returns `None` unless `change` is sudden. Incidents are scanned in the
    /// order given and the first one whose probability exceeds the bar is
    /// returned; incidents after it are not inspected.
    pub fn classify(
        &self,
        change: &SpeedChange,
        event: &Event,
        incidents: &[Incident],
    ) -> Result<Option<AccidentFinding>, DetectionError> {
        if !change.is_triggered() {
            return Ok(None);
        }

        let base = base_probability(event);
        for incident in incidents {
            let increase = proximity_increase(measured_distance(incident)?);
            if base + increase > ACCIDENT_PROBABILITY_THRESHOLD {
                return Ok(Some(AccidentFinding::Accident {
                    incident: incident.clone(),
                    vehicle_id: event.vehicle_id.clone(),
                }));
            }
        }

        Ok(Some(AccidentFinding::FalsePositive {
            event_id: event.event_id.clone(),
            note: FALSE_POSITIVE_NOTE.to_string(),
        }))
    }
}

//! Accident Detection
//!
//! Scans a vehicle's events for sudden speed changes and classifies each
//! triggered event using the radar incidents recorded for it:
//! - [`IncidentQueryBuilder`]: confidence + object-type filter per event
//! - [`SpeedChangeTrigger`]: flags changes above 75% of the current speed
//! - [`AccidentClassifier`]: airbag base + distance-band increase per incident
//! - [`AccidentDetector`]: per-vehicle pipeline over injected stores

mod classifier;
mod config;
mod error;
mod pipeline;
mod query;
mod trigger;

pub use classifier::{
    base_probability, proximity_increase, AccidentClassifier, AccidentFinding,
    ACCIDENT_PROBABILITY_THRESHOLD, AIRBAG_BASE_PROBABILITY, FALSE_POSITIVE_NOTE,
};
pub use config::{DetectionConfig, EventOrder};
pub use error::DetectionError;
pub use pipeline::{AccidentDetector, SkippedEvent, VehicleScan};
pub use query::{
    validate_threshold, IncidentQueryBuilder, CONFIDENCE_ATTRIBUTE, DEFAULT_CONFIDENCE_THRESHOLD,
    OBJECT_TYPE_ATTRIBUTE,
};
pub use trigger::{
    speed_change_percentage, SpeedChange, SpeedChangeTrigger, TriggerState,
    SPEED_CHANGE_THRESHOLD_PCT,
};

//! Detection configuration

use crate::query::{validate_threshold, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::DetectionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Order in which a vehicle's events are fed to the trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOrder {
    /// Whatever order the store returns (ascending event id for both backends)
    #[default]
    StoreDefined,
    /// Stable sort by event timestamp before scanning
    Timestamp,
}

/// Detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Object type tokens matched by containment against `object_type`
    pub accepted_object_types: BTreeSet<String>,
    /// Minimum (exclusive) incident confidence
    pub confidence_threshold: f64,
    /// Event ordering for the speed-change scan
    pub event_order: EventOrder,
    /// Vehicles scanned at once by `detect_fleet`
    pub max_concurrent_vehicles: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            accepted_object_types: ["vehicle", "pedestrian", "cyclist"]
                .into_iter()
                .map(String::from)
                .collect(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            event_order: EventOrder::StoreDefined,
            max_concurrent_vehicles: 4,
        }
    }
}

impl DetectionConfig {
    /// Check the threshold range before any scan runs
    pub fn validate(&self) -> Result<(), DetectionError> {
        validate_threshold(self.confidence_threshold)
    }

    /// Concurrency limit, never below one
    pub fn concurrency(&self) -> usize {
        self.max_concurrent_vehicles.max(1)
    }
}

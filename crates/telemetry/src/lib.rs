//! Telemetry Documents
//!
//! Typed documents stored in the two EDR tables:
//! - `events`: vehicle telemetry, partitioned by `vehicle_id`, sorted by `event_id`
//! - `incidents`: radar detections, partitioned by `event_id`, sorted by `incident_id`

mod event;
mod incident;

pub use event::{Acceleration, BrakeStatus, Event, EventType, Location, SeatbeltStatus};
pub use incident::Incident;

/// Partition key attribute of the events table
pub const EVENT_PARTITION_KEY: &str = "vehicle_id";
/// Sort key attribute of the events table
pub const EVENT_SORT_KEY: &str = "event_id";
/// Partition key attribute of the incidents table
pub const INCIDENT_PARTITION_KEY: &str = "event_id";
/// Sort key attribute of the incidents table
pub const INCIDENT_SORT_KEY: &str = "incident_id";

/// Primary key of a stored document (partition key, sort key)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentKey {
    pub partition: String,
    pub sort: String,
}

impl DocumentKey {
    pub fn new(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: sort.into(),
        }
    }
}

//! Vehicle telemetry events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::DocumentKey;

/// Event category recorded by the EDR unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EventType {
    #[default]
    #[serde(rename = "rapid acc")]
    RapidAcceleration,
    #[serde(rename = "rapid dec")]
    RapidDeceleration,
    #[serde(rename = "dtc event")]
    DtcEvent,
}

impl EventType {
    pub const ALL: [EventType; 3] = [
        EventType::RapidAcceleration,
        EventType::RapidDeceleration,
        EventType::DtcEvent,
    ];
}

/// Brake pedal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrakeStatus {
    Applied,
    #[default]
    Released,
}

/// Seatbelt latch state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatbeltStatus {
    #[default]
    Locked,
    Unlocked,
}

/// Three-axis acceleration (m/s²)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// GPS position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Vehicle telemetry event
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Event {
    /// Partition key
    pub vehicle_id: String,
    /// Sort key, unique within the vehicle
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub acceleration: Acceleration,
    pub location: Location,
    /// Speed (km/h)
    pub vehicle_speed: i32,
    /// Fuel level (%)
    pub fuel_level: i32,
    pub engine_rpm: i32,
    /// Throttle position (%)
    pub throttle_position: i32,
    pub brake_status: BrakeStatus,
    pub seatbelt_status: SeatbeltStatus,
    pub airbag_deployed: bool,
    #[serde(default)]
    pub error_codes: Vec<String>,
}

impl Event {
    /// Primary key of this event in the events table
    pub fn key(&self) -> DocumentKey {
        DocumentKey::new(&self.vehicle_id, &self.event_id)
    }
}

//! Synthetic Data Generator

use crate::FixtureError;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storage::StoreWriter;
use telemetry::{
    Acceleration, BrakeStatus, Event, EventType, Incident, Location, SeatbeltStatus,
};
use tracing::{debug, info};

const OBJECT_TYPES: [&str; 5] = ["vehicle", "pedestrian", "cyclist", "tree", "sign"];
const OBJECT_SIZES: [&str; 3] = ["small", "medium", "large"];
const OBJECT_CLASSES: [&str; 3] = ["car", "truck", "motorcycle"];
const BRAKE_STATUSES: [BrakeStatus; 2] = [BrakeStatus::Applied, BrakeStatus::Released];
const SEATBELT_STATUSES: [SeatbeltStatus; 2] = [SeatbeltStatus::Locked, SeatbeltStatus::Unlocked];

/// Seconds between consecutive events of one vehicle
const EVENT_SPACING_SECS: i64 = 10;

fn pick<T: Copy, R: Rng + ?Sized>(rng: &mut R, items: &[T]) -> T {
    items[rng.random_range(0..items.len())]
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Partition key of vehicle number `n`
pub fn vehicle_key(n: u32) -> String {
    format!("vehicle_{:02}", n)
}

/// Per-vehicle baseline the events are jittered around
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleProfile {
    pub base_speed: i32,
    pub base_fuel_level: i32,
    pub base_rpm: i32,
    pub base_throttle_position: i32,
    pub acceleration: Acceleration,
    pub location: Location,
}

impl VehicleProfile {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            base_speed: rng.random_range(50..=100),
            base_fuel_level: rng.random_range(30..=80),
            base_rpm: rng.random_range(1500..=3000),
            base_throttle_position: rng.random_range(30..=70),
            acceleration: Acceleration {
                x: rng.random_range(-2.0..2.0),
                y: rng.random_range(-1.0..1.0),
                z: 9.8,
            },
            location: Location {
                latitude: rng.random_range(37.0..38.0),
                longitude: rng.random_range(-122.5..-122.0),
            },
        }
    }
}

/// Events `start_index..start_index + count` of vehicle `vehicle_no`,
/// spaced 10 s apart going back from `anchor`
pub fn generate_events<R: Rng + ?Sized>(
    vehicle_no: u32,
    profile: &VehicleProfile,
    start_index: usize,
    count: usize,
    anchor: DateTime<Utc>,
    rng: &mut R,
) -> Vec<Event> {
    let anchor = anchor.trunc_subsecs(0);
    (start_index..start_index + count)
        .map(|i| Event {
            vehicle_id: vehicle_key(vehicle_no),
            event_id: format!("event_id_{:02}_{:02}", vehicle_no, i),
            timestamp: anchor - Duration::seconds(EVENT_SPACING_SECS * i as i64),
            event_type: pick(rng, &EventType::ALL),
            acceleration: Acceleration {
                x: round2(profile.acceleration.x + rng.random_range(-0.5..0.5)),
                y: round2(profile.acceleration.y + rng.random_range(-0.2..0.2)),
                z: profile.acceleration.z,
            },
            location: Location {
                latitude: round2(profile.location.latitude + rng.random_range(-0.01..0.01)),
                longitude: round2(profile.location.longitude + rng.random_range(-0.01..0.01)),
            },
            vehicle_speed: profile.base_speed + rng.random_range(-5..=5),
            fuel_level: profile.base_fuel_level + rng.random_range(-3..=3),
            engine_rpm: profile.base_rpm + rng.random_range(-200..=200),
            throttle_position: profile.base_throttle_position + rng.random_range(-5..=5),
            brake_status: pick(rng, &BRAKE_STATUSES),
            seatbelt_status: pick(rng, &SEATBELT_STATUSES),
            airbag_deployed: rng.random_bool(0.5),
            error_codes: (0..2)
                .map(|_| format!("P{}", rng.random_range(100..=999)))
                .collect(),
        })
        .collect()
}

/// `count` radar readings for one event, 1 ms apart from `anchor`
pub fn generate_incidents<R: Rng + ?Sized>(
    event_id: &str,
    count: usize,
    anchor: DateTime<Utc>,
    rng: &mut R,
) -> Vec<Incident> {
    let anchor = anchor.trunc_subsecs(3);
    (0..count)
        .map(|i| Incident {
            event_id: event_id.to_string(),
            incident_id: format!("incident_{:02}", i),
            timestamp: anchor + Duration::milliseconds(i as i64),
            radar_id: format!("RADAR_{}", i + 1),
            distance: Some(round2(rng.random_range(1.0..100.0))),
            velocity: round2(rng.random_range(1.0..50.0)),
            azimuth_angle: rng.random_range(0..=360),
            elevation_angle: rng.random_range(0..=90),
            object_type: pick(rng, &OBJECT_TYPES).to_string(),
            object_size: pick(rng, &OBJECT_SIZES).to_string(),
            object_class: pick(rng, &OBJECT_CLASSES).to_string(),
            confidence_level: Some(round2(rng.random_range(0.5..1.0))),
        })
        .collect()
}

/// What to generate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationPlan {
    /// First vehicle number
    pub start: u32,
    /// Number of vehicles
    pub vehicles: u32,
    /// Event batches per vehicle
    pub event_batches: usize,
    /// Each batch holds between 1 and this many events
    pub max_events_per_batch: usize,
    pub incidents_per_event: usize,
    /// Reference time for the newest event; defaults to now
    pub anchor: Option<DateTime<Utc>>,
}

impl Default for GenerationPlan {
    fn default() -> Self {
        Self {
            start: 1,
            vehicles: 100,
            event_batches: 100,
            max_events_per_batch: 5,
            incidents_per_event: 800,
            anchor: None,
        }
    }
}

/// Documents written by one generation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GenerationSummary {
    pub vehicles: usize,
    pub events: usize,
    pub incidents: usize,
}

/// Writes generated fixtures to a store
pub struct FixtureGenerator<S: StoreWriter + ?Sized> {
    store: Arc<S>,
    rng: StdRng,
}

impl<S: StoreWriter + ?Sized> FixtureGenerator<S> {
    /// Generator seeded from the OS
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Reproducible generator
    pub fn with_seed(store: Arc<S>, seed: u64) -> Self {
        Self {
            store,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generate and store every vehicle in the plan
    pub async fn generate(&mut self, plan: &GenerationPlan) -> Result<GenerationSummary, FixtureError> {
        if plan.max_events_per_batch == 0 {
            return Err(FixtureError::InvalidPlan(
                "max_events_per_batch must be at least 1".to_string(),
            ));
        }

        let anchor = plan.anchor.unwrap_or_else(Utc::now);
        let mut summary = GenerationSummary::default();

        for vehicle_no in plan.start..plan.start.saturating_add(plan.vehicles) {
            info!("Generating data for {}", vehicle_key(vehicle_no));
            let profile = VehicleProfile::random(&mut self.rng);
            let mut next_index = 0;

            for batch in 0..plan.event_batches {
                let batch_anchor = anchor - Duration::seconds(EVENT_SPACING_SECS * batch as i64);
                let count = self.rng.random_range(1..=plan.max_events_per_batch);
                let events = generate_events(
                    vehicle_no,
                    &profile,
                    next_index,
                    count,
                    batch_anchor,
                    &mut self.rng,
                );
                next_index += count;

                let event_ids: Vec<String> = events.iter().map(|e| e.event_id.clone()).collect();
                self.store.put_events(events).await?;
                summary.events += count;

                for event_id in &event_ids {
                    let incidents =
                        generate_incidents(event_id, plan.incidents_per_event, batch_anchor, &mut self.rng);
                    summary.incidents += incidents.len();
                    self.store.put_incidents(incidents).await?;
                }
                debug!("Wrote batch {} of {} ({} events)", batch, vehicle_key(vehicle_no), count);
            }
            summary.vehicles += 1;
        }

        info!(
            "Generated {} vehicles, {} events, {} incidents",
            summary.vehicles, summary.events, summary.incidents
        );
        Ok(summary)
    }
}

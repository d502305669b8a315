//! Test Fixtures
//!
//! Synthetic EDR data for exercising the detection pipeline:
//! - per-vehicle base profiles with jittered events
//! - radar incidents per event
//! - bulk deletion by vehicle id or id range

mod cleanup;
mod generator;

pub use cleanup::{bulk_delete, bulk_delete_range, vehicle_range, DeleteSummary};
pub use generator::{
    generate_events, generate_incidents, vehicle_key, FixtureGenerator, GenerationPlan,
    GenerationSummary, VehicleProfile,
};

use storage::StoreError;
use thiserror::Error;

/// Fixture errors
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Invalid generation plan: {0}")]
    InvalidPlan(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

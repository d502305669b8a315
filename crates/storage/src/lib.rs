//! Storage Layer
//!
//! Two-table document store for EDR telemetry:
//! - events, partitioned by vehicle id
//! - incidents, partitioned by event id, with server-side filter expressions
//!
//! Backends: an in-memory [`Repository`] and a SQLite-backed [`SqliteStore`].

mod query;
mod repository;
mod sqlite;

pub use query::{AttributeValue, FilterExpr, QuerySpec, RenderedExpression};
pub use repository::Repository;
pub use sqlite::{SqliteConfig, SqliteStore};

use async_trait::async_trait;
use telemetry::{DocumentKey, Event, Incident};
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Store timed out: {0}")]
    Timeout(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Read access to the events table
#[async_trait]
pub trait EventStore: Send + Sync {
    /// All events of one vehicle, in store-defined order
    async fn query_by_vehicle(&self, vehicle_id: &str) -> Result<Vec<Event>, StoreError>;
}

/// Read access to the incidents table
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Incidents of `spec.event_id` that pass `spec.filter`, in store-defined order
    async fn query(&self, spec: &QuerySpec) -> Result<Vec<Incident>, StoreError>;
}

/// Batch writes used by fixture generation and bulk deletion
#[async_trait]
pub trait StoreWriter: EventStore + IncidentStore {
    async fn put_events(&self, events: Vec<Event>) -> Result<(), StoreError>;

    async fn put_incidents(&self, incidents: Vec<Incident>) -> Result<(), StoreError>;

    /// Delete events by (vehicle_id, event_id); missing keys are ignored
    async fn delete_events(&self, keys: Vec<DocumentKey>) -> Result<usize, StoreError>;

    /// Delete incidents by (event_id, incident_id); missing keys are ignored
    async fn delete_incidents(&self, keys: Vec<DocumentKey>) -> Result<usize, StoreError>;
}

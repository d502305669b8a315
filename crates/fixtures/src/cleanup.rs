//! Bulk Deletion

use crate::generator::vehicle_key;
use serde::Serialize;
use storage::{QuerySpec, StoreError, StoreWriter};
use telemetry::DocumentKey;
use tracing::info;

/// Documents removed by a bulk delete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeleteSummary {
    pub vehicles: usize,
    pub events: usize,
    pub incidents: usize,
}

/// Delete every event of the given vehicles and every incident of those events.
///
/// Incidents go first so an interrupted run never leaves orphans behind.
pub async fn bulk_delete<S: StoreWriter + ?Sized>(
    store: &S,
    vehicle_ids: &[String],
) -> Result<DeleteSummary, StoreError> {
    let mut summary = DeleteSummary::default();

    for vehicle_id in vehicle_ids {
        let events = store.query_by_vehicle(vehicle_id).await?;

        info!("Deleting incidents for {}", vehicle_id);
        for event in &events {
            let incidents = store.query(&QuerySpec::for_event(event.event_id.clone())).await?;
            let keys: Vec<DocumentKey> = incidents.iter().map(|i| i.key()).collect();
            summary.incidents += store.delete_incidents(keys).await?;
        }

        info!("Deleting events for {}", vehicle_id);
        let keys: Vec<DocumentKey> = events.iter().map(|e| e.key()).collect();
        summary.events += store.delete_events(keys).await?;
        summary.vehicles += 1;
    }

    Ok(summary)
}

/// Vehicle keys for numbers `start..end`
pub fn vehicle_range(start: u32, end: u32) -> Vec<String> {
    (start..end).map(vehicle_key).collect()
}

/// Delete vehicles `start..end`
pub async fn bulk_delete_range<S: StoreWriter + ?Sized>(
    store: &S,
    start: u32,
    end: u32,
) -> Result<DeleteSummary, StoreError> {
    bulk_delete(store, &vehicle_range(start, end)).await
}

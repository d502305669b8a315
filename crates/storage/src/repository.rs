//! In-memory Repository
//!
//! Each table is a map of partitions, each partition ordered by sort key,
//! so queries return documents in ascending sort-key order.

use crate::{EventStore, IncidentStore, QuerySpec, StoreError, StoreWriter};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use telemetry::{DocumentKey, Event, Incident};
use tracing::{debug, info};

type Table<T> = BTreeMap<String, BTreeMap<String, T>>;

/// Repository for EDR documents (in-memory implementation)
pub struct Repository {
    /// Events by vehicle id, then event id
    events: Mutex<Table<Event>>,
    /// Incidents by event id, then incident id
    incidents: Mutex<Table<Incident>>,
}

fn lock<T>(table: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    table
        .lock()
        .map_err(|e| StoreError::Unavailable(format!("Lock error: {}", e)))
}

fn remove_keys<T>(table: &mut Table<T>, keys: &[DocumentKey]) -> usize {
    let mut removed = 0;
    for key in keys {
        if let Some(partition) = table.get_mut(&key.partition) {
            if partition.remove(&key.sort).is_some() {
                removed += 1;
            }
            if partition.is_empty() {
                table.remove(&key.partition);
            }
        }
    }
    removed
}

impl Repository {
    /// Create a new in-memory repository
    pub fn new() -> Self {
        info!("Creating in-memory repository");
        Self {
            events: Mutex::new(BTreeMap::new()),
            incidents: Mutex::new(BTreeMap::new()),
        }
    }

    /// Get total event count
    pub fn event_count(&self) -> usize {
        self.events
            .lock()
            .map(|t| t.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }

    /// Get total incident count
    pub fn incident_count(&self) -> usize {
        self.incidents
            .lock()
            .map(|t| t.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }

    /// Clear all data (for testing)
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
        if let Ok(mut incidents) = self.incidents.lock() {
            incidents.clear();
        }
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for Repository {
    async fn query_by_vehicle(&self, vehicle_id: &str) -> Result<Vec<Event>, StoreError> {
        let events = lock(&self.events)?;
        let found: Vec<Event> = events
            .get(vehicle_id)
            .map(|partition| partition.values().cloned().collect())
            .unwrap_or_default();
        debug!("Found {} events for {}", found.len(), vehicle_id);
        Ok(found)
    }
}

#[async_trait]
impl IncidentStore for Repository {
    async fn query(&self, spec: &QuerySpec) -> Result<Vec<Incident>, StoreError> {
        let incidents = lock(&self.incidents)?;
        let Some(partition) = incidents.get(&spec.event_id) else {
            return Ok(Vec::new());
        };

        let mut found = Vec::new();
        for incident in partition.values() {
            let document = serde_json::to_value(incident)?;
            if spec.accepts(&document) {
                found.push(incident.clone());
            }
        }
        debug!("Found {} incidents for {}", found.len(), spec);
        Ok(found)
    }
}

#[async_trait]
impl StoreWriter for Repository {
    async fn put_events(&self, batch: Vec<Event>) -> Result<(), StoreError> {
        let mut events = lock(&self.events)?;
        for event in batch {
            events
                .entry(event.vehicle_id.clone())
                .or_default()
                .insert(event.event_id.clone(), event);
        }
        Ok(())
    }

    async fn put_incidents(&self, batch: Vec<Incident>) -> Result<(), StoreError> {
        let mut incidents = lock(&self.incidents)?;
        for incident in batch {
            incidents
                .entry(incident.event_id.clone())
                .or_default()
                .insert(incident.incident_id.clone(), incident);
        }
        Ok(())
    }

    async fn delete_events(&self, keys: Vec<DocumentKey>) -> Result<usize, StoreError> {
        let mut events = lock(&self.events)?;
        Ok(remove_keys(&mut events, &keys))
    }

    async fn delete_incidents(&self, keys: Vec<DocumentKey>) -> Result<usize, StoreError> {
        let mut incidents = lock(&self.incidents)?;
        Ok(remove_keys(&mut incidents, &keys))
    }
}

//! Per-vehicle Accident Detection Pipeline

use crate::classifier::{AccidentClassifier, AccidentFinding};
use crate::config::{DetectionConfig, EventOrder};
use crate::query::IncidentQueryBuilder;
use crate::trigger::SpeedChangeTrigger;
use crate::DetectionError;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use storage::{EventStore, IncidentStore};
use telemetry::Event;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Event dropped from a scan because of a local validation failure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedEvent {
    pub event_id: String,
    pub reason: String,
}

/// Result of scanning one vehicle
#[derive(Debug, Clone, Default, Serialize)]
pub struct VehicleScan {
    pub vehicle_id: String,
    /// Events returned by the store
    pub events_scanned: usize,
    /// Events whose speed change exceeded the threshold
    pub triggered: usize,
    /// Findings in scan order
    pub findings: Vec<AccidentFinding>,
    pub skipped: Vec<SkippedEvent>,
}

impl VehicleScan {
    fn new(vehicle_id: &str) -> Self {
        Self {
            vehicle_id: vehicle_id.to_string(),
            ..Default::default()
        }
    }

    pub fn accident_count(&self) -> usize {
        self.findings.iter().filter(|f| f.is_accident()).count()
    }
}

/// Accident detector over injected event and incident stores
#[derive(Clone)]
pub struct AccidentDetector {
    events: Arc<dyn EventStore>,
    incidents: Arc<dyn IncidentStore>,
    classifier: AccidentClassifier,
    config: DetectionConfig,
}

impl AccidentDetector {
    /// Create a detector
    pub fn new(
        events: Arc<dyn EventStore>,
        incidents: Arc<dyn IncidentStore>,
        config: DetectionConfig,
    ) -> Self {
        info!("Creating accident detector with config: {:?}", config);
        Self {
            events,
            incidents,
            classifier: AccidentClassifier::new(),
            config,
        }
    }

    /// Create a detector reading both tables from one store
    pub fn with_store<S>(store: Arc<S>, config: DetectionConfig) -> Self
    where
        S: EventStore + IncidentStore + 'static,
    {
        Self::new(store.clone(), store, config)
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Findings for one vehicle, in scan order
    pub async fn detect_accidents(
        &self,
        vehicle_id: &str,
        accepted_object_types: &BTreeSet<String>,
        confidence_threshold: f64,
    ) -> Result<Vec<AccidentFinding>, DetectionError> {
        let scan = self
            .scan(vehicle_id, accepted_object_types, confidence_threshold)
            .await?;
        Ok(scan.findings)
    }

    /// Findings for one vehicle using the configured types and threshold
    pub async fn detect(&self, vehicle_id: &str) -> Result<Vec<AccidentFinding>, DetectionError> {
        Ok(self.scan_configured(vehicle_id).await?.findings)
    }

    /// Scan one vehicle using the configured types and threshold
    pub async fn scan_configured(&self, vehicle_id: &str) -> Result<VehicleScan, DetectionError> {
        self.scan(
            vehicle_id,
            &self.config.accepted_object_types,
            self.config.confidence_threshold,
        )
        .await
    }

    /// Scan one vehicle.
    ///
    /// Events are processed strictly one after another. A local validation
    /// failure skips its event; a store failure ends the scan.
    pub async fn scan(
        &self,
        vehicle_id: &str,
        accepted_object_types: &BTreeSet<String>,
        confidence_threshold: f64,
    ) -> Result<VehicleScan, DetectionError> {
        let mut events = self.events.query_by_vehicle(vehicle_id).await?;
        info!("Found {} events for {}", events.len(), vehicle_id);

        if self.config.event_order == EventOrder::Timestamp {
            events.sort_by_key(|e| e.timestamp);
        }

        let mut trigger = SpeedChangeTrigger::new();
        let mut scan = VehicleScan::new(vehicle_id);

        for event in &events {
            scan.events_scanned += 1;
            let outcome = self
                .inspect(
                    &mut scan,
                    &mut trigger,
                    event,
                    accepted_object_types,
                    confidence_threshold,
                )
                .await;

            match outcome {
                Ok(Some(finding)) => scan.findings.push(finding),
                Ok(None) => {}
                Err(err) if err.is_local() => {
                    warn!("Skipping event {} of {}: {}", event.event_id, vehicle_id, err);
                    scan.skipped.push(SkippedEvent {
                        event_id: event.event_id.clone(),
                        reason: err.to_string(),
                    });
                }
                Err(err) => {
                    error!("Aborting scan of {} at event {}: {}", vehicle_id, event.event_id, err);
                    return Err(err);
                }
            }
        }

        info!(
            "Scanned {}: {} events, {} triggered, {} findings, {} skipped",
            vehicle_id,
            scan.events_scanned,
            scan.triggered,
            scan.findings.len(),
            scan.skipped.len()
        );
        Ok(scan)
    }

    async fn inspect(
        &self,
        scan: &mut VehicleScan,
        trigger: &mut SpeedChangeTrigger,
        event: &Event,
        accepted_object_types: &BTreeSet<String>,
        confidence_threshold: f64,
    ) -> Result<Option<AccidentFinding>, DetectionError> {
        let change = trigger.observe_event(event)?;
        if !change.is_triggered() {
            return Ok(None);
        }
        scan.triggered += 1;

        let spec = IncidentQueryBuilder::build(&event.event_id, accepted_object_types, confidence_threshold)?;
        let incidents = self.incidents.query(&spec).await?;
        debug!(
            "Event {} changed speed by {:.1}%, {} matching incidents",
            event.event_id,
            change.percentage().unwrap_or_default(),
            incidents.len()
        );

        self.classifier.classify(&change, event, &incidents)
    }

    /// Scan several vehicles concurrently with the configured settings.
    ///
    /// Results come back in input order, one per vehicle. Each vehicle's own
    /// scan is still sequential; a scan task that panics is reported as
    /// `ScanAborted` for its vehicle.
    pub async fn detect_fleet(
        &self,
        vehicle_ids: &[String],
    ) -> Vec<(String, Result<VehicleScan, DetectionError>)> {
        let detector = Arc::new(self.clone());
        let permits = Arc::new(Semaphore::new(self.config.concurrency()));

        let tasks: Vec<_> = vehicle_ids
            .iter()
            .cloned()
            .map(|vehicle_id| {
                let detector = detector.clone();
                let permits = permits.clone();
                tokio::spawn(async move {
                    let _permit = permits.acquire_owned().await;
                    detector.scan_configured(&vehicle_id).await
                })
            })
            .collect();

        let mut results = Vec::with_capacity(vehicle_ids.len());
        for (vehicle_id, task) in vehicle_ids.iter().zip(tasks) {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => {
                    error!("Scan task for {} failed: {}", vehicle_id, e);
                    Err(DetectionError::ScanAborted(e.to_string()))
                }
            };
            results.push((vehicle_id.clone(), result));
        }
        results
    }
}

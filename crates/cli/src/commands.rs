//! Subcommand runners

use anyhow::{Context, Result};
use clap::Args;
use detection::{AccidentDetector, DetectionConfig};
use fixtures::{
    bulk_delete, bulk_delete_range, DeleteSummary, FixtureGenerator, GenerationPlan,
    GenerationSummary,
};
use reporting::{measure, AccidentReport, TimingSummary};
use serde::Serialize;
use std::sync::Arc;
use storage::StoreWriter;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// First vehicle number
    #[arg(long, default_value_t = 1)]
    pub start: u32,
    #[arg(long, default_value_t = 100)]
    pub vehicles: u32,
    /// Event batches per vehicle
    #[arg(long, default_value_t = 100)]
    pub batches: usize,
    /// Upper bound of events per batch
    #[arg(long, default_value_t = 5)]
    pub max_events: usize,
    #[arg(long, default_value_t = 800)]
    pub incidents: usize,
    /// Seed for reproducible data
    #[arg(long)]
    pub seed: Option<u64>,
}

impl GenerateArgs {
    fn plan(&self) -> GenerationPlan {
        GenerationPlan {
            start: self.start,
            vehicles: self.vehicles,
            event_batches: self.batches,
            max_events_per_batch: self.max_events,
            incidents_per_event: self.incidents,
            anchor: None,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AccidentsArgs {
    #[arg(required = true)]
    pub vehicle_ids: Vec<String>,
    /// Accepted object type token, repeatable; replaces the configured set
    #[arg(long = "object-type")]
    pub object_types: Vec<String>,
    /// Minimum (exclusive) incident confidence
    #[arg(long)]
    pub confidence: Option<f64>,
    /// Timed repetitions; the last run is reported
    #[arg(long, default_value_t = 1)]
    pub runs: usize,
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Report plus timing of the detection run
#[derive(Debug, Clone, Serialize)]
pub struct AccidentsOutput {
    pub report: AccidentReport,
    pub timing: TimingSummary,
}

/// Generate fixtures once, timed
pub async fn generate<S: StoreWriter + ?Sized>(
    store: Arc<S>,
    args: &GenerateArgs,
) -> Result<(GenerationSummary, TimingSummary)> {
    let plan = args.plan();
    let plan = &plan;
    let seed = args.seed;
    let (summary, timing) = measure("generate_vehicles_data", 1, move || {
        let store = store.clone();
        async move {
            let mut generator = match seed {
                Some(seed) => FixtureGenerator::with_seed(store, seed),
                None => FixtureGenerator::new(store),
            };
            generator.generate(plan).await
        }
    })
    .await;

    let summary = summary.context("Fixture generation failed")?;
    info!("Generation finished: {:?}", summary);
    Ok((summary, timing))
}

pub async fn delete_vehicles<S: StoreWriter + ?Sized>(
    store: &S,
    vehicle_ids: &[String],
) -> Result<DeleteSummary> {
    let (summary, _) = measure("bulk_delete", 1, move || bulk_delete(store, vehicle_ids)).await;
    summary.context("Bulk delete failed")
}

pub async fn delete_range<S: StoreWriter + ?Sized>(
    store: &S,
    start: u32,
    end: u32,
) -> Result<DeleteSummary> {
    let (summary, _) = measure("bulk_delete_range", 1, move || bulk_delete_range(store, start, end)).await;
    summary.context("Bulk delete failed")
}

/// Run the fleet scan `args.runs` times and report the last run
pub async fn find_accidents<S: StoreWriter + 'static>(
    store: Arc<S>,
    configured: &DetectionConfig,
    args: &AccidentsArgs,
) -> Result<AccidentsOutput> {
    let mut config = configured.clone();
    if !args.object_types.is_empty() {
        config.accepted_object_types = args.object_types.iter().cloned().collect();
    }
    if let Some(confidence) = args.confidence {
        config.confidence_threshold = confidence;
    }
    config.validate()?;

    let detector = AccidentDetector::with_store(store, config);
    let detector = &detector;
    let vehicle_ids = args.vehicle_ids.as_slice();
    let (results, timing) = measure("find_accidents", args.runs, move || {
        detector.detect_fleet(vehicle_ids)
    })
    .await;

    Ok(AccidentsOutput {
        report: AccidentReport::from_fleet(&results),
        timing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use storage::{EventStore, Repository};
    use telemetry::{Event, Incident};

    fn accidents_args(ids: &[&str]) -> AccidentsArgs {
        AccidentsArgs {
            vehicle_ids: ids.iter().map(|s| s.to_string()).collect(),
            object_types: Vec::new(),
            confidence: None,
            runs: 2,
            json: false,
        }
    }

    async fn seed_crash(repo: &Repository) {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let events = [("event_id_01_00", 60, false), ("event_id_01_01", 20, true)]
            .into_iter()
            .enumerate()
            .map(|(i, (id, speed, airbag))| Event {
                vehicle_id: "vehicle_01".to_string(),
                event_id: id.to_string(),
                timestamp: start + Duration::seconds(10 * i as i64),
                vehicle_speed: speed,
                airbag_deployed: airbag,
                ..Default::default()
            })
            .collect();
        repo.put_events(events).await.unwrap();
        repo.put_incidents(vec![Incident {
            event_id: "event_id_01_01".to_string(),
            incident_id: "incident_00".to_string(),
            object_type: "pedestrian".to_string(),
            distance: Some(3.0),
            confidence_level: Some(0.95),
            ..Default::default()
        }])
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_find_accidents_reports_crash() {
        let repo = Arc::new(Repository::new());
        seed_crash(&repo).await;

        let output = find_accidents(
            repo,
            &DetectionConfig::default(),
            &accidents_args(&["vehicle_01", "vehicle_02"]),
        )
        .await
        .unwrap();

        assert_eq!(output.timing.runs, 2);
        assert_eq!(output.report.totals.vehicles, 2);
        assert_eq!(output.report.totals.accidents, 1);
        assert!(output.report.to_string().contains("- IncidentId: incident_00"));
    }

    #[tokio::test]
    async fn test_object_type_override() {
        let repo = Arc::new(Repository::new());
        seed_crash(&repo).await;

        let mut args = accidents_args(&["vehicle_01"]);
        args.object_types = vec!["cyclist".to_string()];
        let output = find_accidents(repo, &DetectionConfig::default(), &args)
            .await
            .unwrap();

        assert_eq!(output.report.totals.accidents, 0);
        assert_eq!(output.report.totals.false_positives, 1);
    }

    #[tokio::test]
    async fn test_invalid_confidence_rejected() {
        let mut args = accidents_args(&["vehicle_01"]);
        args.confidence = Some(2.0);
        let result = find_accidents(Arc::new(Repository::new()), &DetectionConfig::default(), &args).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_generate_then_delete() {
        let repo = Arc::new(Repository::new());
        let args = GenerateArgs {
            start: 1,
            vehicles: 2,
            batches: 2,
            max_events: 2,
            incidents: 2,
            seed: Some(11),
        };

        let (generated, timing) = generate(repo.clone(), &args).await.unwrap();
        assert_eq!(timing.label, "generate_vehicles_data");
        assert_eq!(timing.runs, 1);
        assert_eq!(generated.vehicles, 2);
        assert_eq!(generated.incidents, generated.events * 2);
        assert_eq!(repo.event_count(), generated.events);

        let deleted = delete_vehicles(repo.as_ref(), &["vehicle_01".to_string()])
            .await
            .unwrap();
        let remaining = delete_range(repo.as_ref(), 2, 3).await.unwrap();

        assert_eq!(deleted.events + remaining.events, generated.events);
        assert_eq!(deleted.incidents + remaining.incidents, generated.incidents);
        assert!(repo.query_by_vehicle("vehicle_02").await.unwrap().is_empty());
    }
}

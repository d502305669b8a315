//! Accident Report

use detection::{AccidentFinding, DetectionError, VehicleScan};
use serde::Serialize;
use std::fmt;

const RULE: &str = "=============================================";
const ACCIDENT_HEADER: &str = "==============Found an accident==============";

/// One line item of the report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportEntry {
    Accident {
        incident_id: String,
        vehicle_id: String,
        event_id: String,
        object_size: String,
        object_type: String,
        object_class: String,
        confidence_level: Option<f64>,
    },
    FalsePositive {
        event_id: String,
        note: String,
    },
    /// Event dropped by a validation failure
    Skipped {
        vehicle_id: String,
        event_id: String,
        reason: String,
    },
    /// Vehicle whose scan ended in a store failure or an aborted task
    Failed {
        vehicle_id: String,
        error: String,
    },
}

impl ReportEntry {
    fn from_finding(finding: &AccidentFinding) -> Self {
        match finding {
            AccidentFinding::Accident {
                incident,
                vehicle_id,
            } => ReportEntry::Accident {
                incident_id: incident.incident_id.clone(),
                vehicle_id: vehicle_id.clone(),
                event_id: incident.event_id.clone(),
                object_size: incident.object_size.clone(),
                object_type: incident.object_type.clone(),
                object_class: incident.object_class.clone(),
                confidence_level: incident.confidence_level,
            },
            AccidentFinding::FalsePositive { event_id, note } => ReportEntry::FalsePositive {
                event_id: event_id.clone(),
                note: note.clone(),
            },
        }
    }
}

/// Aggregate counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportTotals {
    pub vehicles: usize,
    pub failed_vehicles: usize,
    pub events_scanned: usize,
    pub triggered: usize,
    pub accidents: usize,
    pub false_positives: usize,
    pub skipped: usize,
}

/// Findings of one or more vehicle scans, ready for presentation
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccidentReport {
    pub totals: ReportTotals,
    pub entries: Vec<ReportEntry>,
}

impl AccidentReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report over completed scans, in the order given
    pub fn from_scans(scans: &[VehicleScan]) -> Self {
        let mut report = Self::new();
        for scan in scans {
            report.add_scan(scan);
        }
        report
    }

    /// Report over fleet results, failures included
    pub fn from_fleet(results: &[(String, Result<VehicleScan, DetectionError>)]) -> Self {
        let mut report = Self::new();
        for (vehicle_id, result) in results {
            match result {
                Ok(scan) => report.add_scan(scan),
                Err(err) => report.add_failure(vehicle_id, err),
            }
        }
        report
    }

    pub fn add_scan(&mut self, scan: &VehicleScan) {
        self.totals.vehicles += 1;
        self.totals.events_scanned += scan.events_scanned;
        self.totals.triggered += scan.triggered;

        for finding in &scan.findings {
            if finding.is_accident() {
                self.totals.accidents += 1;
            } else {
                self.totals.false_positives += 1;
            }
            self.entries.push(ReportEntry::from_finding(finding));
        }

        for skipped in &scan.skipped {
            self.totals.skipped += 1;
            self.entries.push(ReportEntry::Skipped {
                vehicle_id: scan.vehicle_id.clone(),
                event_id: skipped.event_id.clone(),
                reason: skipped.reason.clone(),
            });
        }
    }

    pub fn add_failure(&mut self, vehicle_id: &str, error: &DetectionError) {
        self.totals.vehicles += 1;
        self.totals.failed_vehicles += 1;
        self.entries.push(ReportEntry::Failed {
            vehicle_id: vehicle_id.to_string(),
            error: error.to_string(),
        });
    }
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportEntry::Accident {
                incident_id,
                vehicle_id,
                event_id,
                object_size,
                object_type,
                object_class,
                confidence_level,
            } => {
                writeln!(f, "{}", ACCIDENT_HEADER)?;
                writeln!(f, "- IncidentId: {}", incident_id)?;
                writeln!(f, "- VehicleId: {}", vehicle_id)?;
                writeln!(f, "- EventId: {}", event_id)?;
                writeln!(f, "- Object:")?;
                writeln!(f, "  - Size: {}", object_size)?;
                writeln!(f, "  - Type: {}", object_type)?;
                writeln!(f, "  - Class: {}", object_class)?;
                match confidence_level {
                    Some(level) => write!(f, "  - ConfidenceLevel: {:.2}", level),
                    None => write!(f, "  - ConfidenceLevel: n/a"),
                }
            }
            ReportEntry::FalsePositive { event_id, note } => {
                writeln!(f, "{}", RULE)?;
                write!(f, "False positive: Event {} {}.", event_id, note)
            }
            ReportEntry::Skipped {
                vehicle_id,
                event_id,
                reason,
            } => {
                writeln!(f, "{}", RULE)?;
                write!(f, "Skipped: Event {} of {} ({})", event_id, vehicle_id, reason)
            }
            ReportEntry::Failed { vehicle_id, error } => {
                writeln!(f, "{}", RULE)?;
                write!(f, "Scan failed: {} ({})", vehicle_id, error)
            }
        }
    }
}

impl fmt::Display for AccidentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}", entry)?;
        }
        writeln!(f, "{}", RULE)?;
        let t = &self.totals;
        write!(
            f,
            "{} vehicles ({} failed), {} events, {} triggered: {} accidents, {} false positives, {} skipped",
            t.vehicles, t.failed_vehicles, t.events_scanned, t.triggered, t.accidents, t.false_positives, t.skipped
        )
    }
}

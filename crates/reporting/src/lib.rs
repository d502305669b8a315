//! Reporting
//!
//! Console/JSON accident reports and execution-time measurement.

mod report;
mod timing;

pub use report::{AccidentReport, ReportEntry, ReportTotals};
pub use timing::{measure, TimingSummary, DURATION_METRIC};

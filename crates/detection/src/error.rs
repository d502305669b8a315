//! Detection Error Types

use storage::StoreError;
use thiserror::Error;

/// Errors raised while scanning a vehicle for accidents
#[derive(Debug, Error)]
pub enum DetectionError {
    /// Confidence threshold outside [0, 1]
    #[error("Confidence threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),

    /// Speed change percentage divides by the current speed
    #[error("Speed change undefined: current speed is 0 (previous {previous})")]
    DivisionUndefined { previous: i32 },

    /// Incident document lacks a measurement the classifier needs
    #[error("Incident {incident_id} has no usable {field}")]
    MalformedIncident {
        incident_id: String,
        field: &'static str,
    },

    /// Store failure, passed through unchanged
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Scan task ended without a result (panicked or was cancelled)
    #[error("Scan aborted: {0}")]
    ScanAborted(String),
}

impl DetectionError {
    /// Local validation failures only affect the event they occurred in
    pub fn is_local(&self) -> bool {
        !matches!(
            self,
            DetectionError::Store(_) | DetectionError::ScanAborted(_)
        )
    }
}

//! Error types for the ocean-vectors pipeline.

use thiserror::Error;

/// Result type alias using OceanError.
pub type OceanResult<T> = Result<T, OceanError>;

/// Primary error type for pipeline operations.
#[derive(Debug, Error)]
pub enum OceanError {
    // === Configuration errors (fatal, never retried) ===
    #[error("unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("unknown region: {0}")]
    UnknownRegion(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    // === Acquisition errors (retryable) ===
    #[error("acquisition failed for {key}: {message}")]
    AcquisitionFailed { key: String, message: String },

    #[error("acquisition timed out for {0}")]
    AcquisitionTimeout(String),

    // === Data-shape errors (fatal for the task, not retried) ===
    #[error("missing required coordinate axis: {0}")]
    MissingCoordinate(String),

    #[error("expected a 1- or 2-D field after reduction, got {ndims} dimensions for '{variable}'")]
    InvalidDimensionality { variable: String, ndims: usize },

    #[error("axis mismatch merging '{left}' ({left_len}) with '{right}' ({right_len})")]
    AxisMismatch {
        left: String,
        left_len: usize,
        right: String,
        right_len: usize,
    },

    #[error("malformed grid file: {0}")]
    MalformedFile(String),

    // === Storage errors ===
    #[error("cache error: {0}")]
    CacheError(String),

    #[error("storage error: {0}")]
    StorageError(String),
}

impl OceanError {
    /// Whether a task failing with this error should be retried.
    ///
    /// Only acquisition failures are transient; configuration and
    /// data-shape errors will not be fixed by retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OceanError::AcquisitionFailed { .. } | OceanError::AcquisitionTimeout(_)
        )
    }
}

impl From<std::io::Error> for OceanError {
    fn from(err: std::io::Error) -> Self {
        OceanError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for OceanError {
    fn from(err: serde_json::Error) -> Self {
        OceanError::MalformedFile(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(OceanError::AcquisitionFailed {
            key: "sst/gulf_of_maine/2024-06-01".into(),
            message: "503".into()
        }
        .is_retryable());

        assert!(!OceanError::UnknownDataset("nope".into()).is_retryable());
        assert!(!OceanError::MissingCoordinate("longitude".into()).is_retryable());
    }
}

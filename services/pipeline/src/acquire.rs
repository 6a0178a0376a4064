//! Acquisition collaborator contract and retry wrapper.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use ocean_common::{DatasetSource, OceanError, OceanResult, Region};
use tracing::{info, warn};

use crate::config::RetryConfig;

/// Fetches one raw grid file for a (date, dataset, region) key.
///
/// The pipeline is agnostic to what backs this call; implementations
/// may hit an HTTP API, invoke a vendor toolbox, or read a staged
/// directory. The returned path must stay readable until the task
/// finishes loading it.
#[async_trait]
pub trait Acquire: Send + Sync {
    async fn fetch(
        &self,
        date: NaiveDate,
        source: &DatasetSource,
        region: &Region,
    ) -> OceanResult<PathBuf>;
}

/// Acquisition from a staging directory of pre-fetched files, keyed
/// the same way as the cache.
pub struct LocalDirAcquisition {
    dir: PathBuf,
}

impl LocalDirAcquisition {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Acquire for LocalDirAcquisition {
    async fn fetch(
        &self,
        date: NaiveDate,
        source: &DatasetSource,
        region: &Region,
    ) -> OceanResult<PathBuf> {
        let path = self.dir.join(format!(
            "{}_{}_{}.json",
            source.id,
            region.id,
            date.format("%Y%m%d")
        ));
        if path.exists() {
            Ok(path)
        } else {
            Err(OceanError::AcquisitionFailed {
                key: format!("{}/{}/{}", source.id, region.id, date),
                message: format!("no staged file at {}", path.display()),
            })
        }
    }
}

/// Backoff schedule for acquisition attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Doubles after each failed attempt.
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Per-attempt cancellation point; elapsing counts as a retryable
    /// failure.
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_secs(config.initial_delay_secs),
            max_delay: Duration::from_secs(config.max_delay_secs),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// No waiting between attempts, for tests.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Run an acquisition with timeout, bounded retries, and exponential
/// backoff. Non-retryable errors surface immediately; retrying cannot
/// fix a structurally bad request.
pub async fn fetch_with_retry(
    acquirer: &dyn Acquire,
    policy: &RetryPolicy,
    date: NaiveDate,
    source: &DatasetSource,
    region: &Region,
) -> OceanResult<PathBuf> {
    let key = format!("{}/{}/{}", source.id, region.id, date);
    let mut attempt = 0u32;
    let mut delay = policy.initial_delay;

    loop {
        attempt += 1;
        let result = match tokio::time::timeout(
            policy.timeout,
            acquirer.fetch(date, source, region),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(OceanError::AcquisitionTimeout(key.clone())),
        };

        match result {
            Ok(path) => {
                info!(key = %key, attempt, path = %path.display(), "Acquisition succeeded");
                return Ok(path);
            }
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                if attempt > policy.max_retries {
                    warn!(key = %key, attempts = attempt, error = %e, "Acquisition exhausted retries");
                    return Err(e);
                }
                warn!(
                    key = %key,
                    attempt,
                    max_retries = policy.max_retries,
                    delay_secs = delay.as_secs(),
                    error = %e,
                    "Acquisition failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, policy.max_delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use ocean_common::{BoundingBox, DatasetKind};

    struct FlakyAcquirer {
        failures: u32,
        calls: AtomicU32,
        retryable: bool,
    }

    #[async_trait]
    impl Acquire for FlakyAcquirer {
        async fn fetch(
            &self,
            _date: NaiveDate,
            source: &DatasetSource,
            region: &Region,
        ) -> OceanResult<PathBuf> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                if self.retryable {
                    Err(OceanError::AcquisitionFailed {
                        key: format!("{}/{}", source.id, region.id),
                        message: "transient".to_string(),
                    })
                } else {
                    Err(OceanError::UnknownDataset(source.id.clone()))
                }
            } else {
                Ok(PathBuf::from("/tmp/fetched.json"))
            }
        }
    }

    fn source() -> DatasetSource {
        DatasetSource {
            id: "altimetry".to_string(),
            name: "Altimetry".to_string(),
            kind: DatasetKind::ScalarTemperature,
            variables: vec!["ssh".to_string()],
            lag_days: 1,
            companion: None,
        }
    }

    fn region() -> Region {
        Region {
            id: "gulf_stream".to_string(),
            name: "Gulf Stream".to_string(),
            group: String::new(),
            bounds: BoundingBox::default(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let acquirer = FlakyAcquirer {
            failures: 2,
            calls: AtomicU32::new(0),
            retryable: true,
        };
        let policy = RetryPolicy::immediate(3);
        let path = fetch_with_retry(&acquirer, &policy, date(), &source(), &region())
            .await
            .unwrap();
        assert_eq!(path, PathBuf::from("/tmp/fetched.json"));
        assert_eq!(acquirer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let acquirer = FlakyAcquirer {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
            retryable: true,
        };
        let policy = RetryPolicy::immediate(3);
        let err = fetch_with_retry(&acquirer, &policy, date(), &source(), &region())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        // Initial attempt plus three retries.
        assert_eq!(acquirer.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_fatal_errors_skip_retry() {
        let acquirer = FlakyAcquirer {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
            retryable: false,
        };
        let policy = RetryPolicy::immediate(3);
        let err = fetch_with_retry(&acquirer, &policy, date(), &source(), &region())
            .await
            .unwrap_err();
        assert!(matches!(err, OceanError::UnknownDataset(_)));
        assert_eq!(acquirer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_local_dir_acquisition_missing_file() {
        let acquirer = LocalDirAcquisition::new("/nonexistent/staging");
        let err = acquirer
            .fetch(date(), &source(), &region())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}

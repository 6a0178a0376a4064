//! Batch driver for (date, region, dataset) processing tasks.
//!
//! Each task runs acquire → standardize → mask → detect/contour →
//! write, strictly in that order. Sibling tasks run concurrently up
//! to a fan-out bound, with acquisitions additionally throttled by a
//! semaphore to respect provider rate limits. A task failure is
//! recorded in its report and never cancels or blocks siblings; batch
//! runs always return, they never raise.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use feature_detect::{ContourExtractor, FeatureDetector, LevelPolicy};
use futures::{stream, StreamExt};
use grid_standardize::{LandMasker, StandardizedData, Standardizer};
use grid_store::GridStore;
use ocean_common::{
    DatasetKind, DatasetSource, Feature, FeatureCollection, Grid, OceanError, OceanResult,
    RawDataset, Region, RegionCatalog, SourceCatalog, ValueRange,
};
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::acquire::{fetch_with_retry, Acquire, RetryPolicy};

/// The unit of work: one dataset over one region for one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingTask {
    pub date: NaiveDate,
    pub region_id: String,
    pub dataset_id: String,
}

impl fmt::Display for ProcessingTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.dataset_id, self.region_id, self.date)
    }
}

/// Pipeline stage a task was in when it succeeded or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStage {
    Configuration,
    Acquisition,
    Standardization,
    Detection,
    Output,
}

impl TaskStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStage::Configuration => "configuration",
            TaskStage::Acquisition => "acquisition",
            TaskStage::Standardization => "standardization",
            TaskStage::Detection => "feature extraction",
            TaskStage::Output => "output write",
        }
    }
}

impl fmt::Display for TaskStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a successful task produced.
#[derive(Debug, Clone)]
pub struct TaskArtifacts {
    pub features_path: PathBuf,
    pub feature_count: usize,
    pub value_ranges: BTreeMap<String, ValueRange>,
}

/// Per-task outcome returned from a batch run.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task: ProcessingTask,
    pub outcome: Result<TaskArtifacts, String>,
}

impl TaskReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn error(&self) -> Option<&str> {
        self.outcome.as_ref().err().map(String::as_str)
    }
}

/// Cross-product task list for a batch run.
pub fn build_tasks(
    sources: &SourceCatalog,
    regions: &RegionCatalog,
    dates: &[NaiveDate],
) -> Vec<ProcessingTask> {
    let mut tasks = Vec::new();
    for &date in dates {
        for dataset_id in sources.ids() {
            for region_id in regions.ids() {
                tasks.push(ProcessingTask {
                    date,
                    region_id: region_id.to_string(),
                    dataset_id: dataset_id.to_string(),
                });
            }
        }
    }
    tasks
}

/// Drives the pipeline across many tasks with bounded concurrency.
pub struct Orchestrator {
    sources: SourceCatalog,
    regions: RegionCatalog,
    store: Arc<GridStore>,
    masker: Arc<LandMasker>,
    acquirer: Arc<dyn Acquire>,
    standardizer: Standardizer,
    detector: FeatureDetector,
    extractor: ContourExtractor,
    retry: RetryPolicy,
    max_concurrent: usize,
    acquisition_permits: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn new(
        sources: SourceCatalog,
        regions: RegionCatalog,
        store: Arc<GridStore>,
        masker: Arc<LandMasker>,
        acquirer: Arc<dyn Acquire>,
        retry: RetryPolicy,
        max_concurrent: usize,
    ) -> Self {
        Self {
            sources,
            regions,
            store,
            masker,
            acquirer,
            standardizer: Standardizer::new(),
            detector: FeatureDetector::default(),
            extractor: ContourExtractor::default(),
            retry,
            max_concurrent: max_concurrent.max(1),
            acquisition_permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Run every task, collecting one report per task.
    pub async fn run_batch(&self, tasks: Vec<ProcessingTask>) -> Vec<TaskReport> {
        let total = tasks.len();
        info!(total, "Starting batch run");

        let reports: Vec<TaskReport> = stream::iter(tasks)
            .map(|task| self.execute(task))
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let succeeded = reports.iter().filter(|r| r.is_success()).count();
        info!(
            total,
            succeeded,
            failed = total - succeeded,
            "Batch run complete"
        );
        reports
    }

    async fn execute(&self, task: ProcessingTask) -> TaskReport {
        match self.run_task(&task).await {
            Ok(artifacts) => {
                info!(
                    task = %task,
                    features = artifacts.feature_count,
                    path = %artifacts.features_path.display(),
                    "Task complete"
                );
                TaskReport {
                    task,
                    outcome: Ok(artifacts),
                }
            }
            Err((stage, e)) => {
                let message = format!("task {} failed during {}: {}", task, stage, e);
                error!(task = %task, stage = %stage, error = %e, "Task failed");
                TaskReport {
                    task,
                    outcome: Err(message),
                }
            }
        }
    }

    async fn run_task(
        &self,
        task: &ProcessingTask,
    ) -> Result<TaskArtifacts, (TaskStage, OceanError)> {
        let source = self
            .sources
            .get(&task.dataset_id)
            .map_err(|e| (TaskStage::Configuration, e))?;
        let region = self
            .regions
            .get(&task.region_id)
            .map_err(|e| (TaskStage::Configuration, e))?;

        let (features, value_ranges) = match source.kind {
            DatasetKind::ScalarTemperature | DatasetKind::ScalarChlorophyll => {
                self.process_scalar(task, source, region).await?
            }
            DatasetKind::VectorCurrent => self.process_vector(task, source, region).await?,
            DatasetKind::CombinedAltimetryCurrent => {
                self.process_combined(task, source, region).await?
            }
        };

        let collection = FeatureCollection::new(task.date, features, value_ranges.clone());
        let features_path = self
            .store
            .store_features(&source.id, &region.id, task.date, &collection)
            .await
            .map_err(|e| (TaskStage::Output, e))?;

        Ok(TaskArtifacts {
            features_path,
            feature_count: collection.len(),
            value_ranges,
        })
    }

    async fn process_scalar(
        &self,
        task: &ProcessingTask,
        source: &DatasetSource,
        region: &Region,
    ) -> Result<(Vec<Feature>, BTreeMap<String, ValueRange>), (TaskStage, OceanError)> {
        let raw = self
            .acquire_raw(task.date, source, region)
            .await
            .map_err(|e| (TaskStage::Acquisition, e))?;

        let standardized = self
            .standardizer
            .standardize(&raw, source)
            .map_err(|e| (TaskStage::Standardization, e))?;
        let StandardizedData::Scalar { field } = standardized else {
            return Err((
                TaskStage::Standardization,
                OceanError::ConfigError(format!(
                    "scalar dataset '{}' produced non-scalar output",
                    source.id
                )),
            ));
        };
        let field = self
            .masker
            .mask(&field)
            .map_err(|e| (TaskStage::Standardization, e))?;

        let policy = match source.kind {
            DatasetKind::ScalarTemperature => LevelPolicy::TemperatureLadder,
            _ => LevelPolicy::Percentiles {
                qs: vec![75.0, 90.0, 95.0],
            },
        };
        let features = self.extractor.extract(&field, &policy);

        let mut ranges = BTreeMap::new();
        range_entry(&mut ranges, variable_name(source, 0), &field);
        Ok((features, ranges))
    }

    async fn process_vector(
        &self,
        task: &ProcessingTask,
        source: &DatasetSource,
        region: &Region,
    ) -> Result<(Vec<Feature>, BTreeMap<String, ValueRange>), (TaskStage, OceanError)> {
        let raw = self
            .acquire_raw(task.date, source, region)
            .await
            .map_err(|e| (TaskStage::Acquisition, e))?;

        let standardized = self
            .standardizer
            .standardize(&raw, source)
            .map_err(|e| (TaskStage::Standardization, e))?;
        let StandardizedData::Vector { u, v } = standardized else {
            return Err((
                TaskStage::Standardization,
                OceanError::ConfigError(format!(
                    "vector dataset '{}' produced non-vector output",
                    source.id
                )),
            ));
        };
        let u = self
            .masker
            .mask(&u)
            .map_err(|e| (TaskStage::Standardization, e))?;
        let v = self
            .masker
            .mask(&v)
            .map_err(|e| (TaskStage::Standardization, e))?;

        // Current fields feed rendering and range metadata only; no
        // vector features are derived from them directly.
        let mut ranges = BTreeMap::new();
        range_entry(&mut ranges, variable_name(source, 0), &u);
        range_entry(&mut ranges, variable_name(source, 1), &v);
        Ok((Vec::new(), ranges))
    }

    async fn process_combined(
        &self,
        task: &ProcessingTask,
        source: &DatasetSource,
        region: &Region,
    ) -> Result<(Vec<Feature>, BTreeMap<String, ValueRange>), (TaskStage, OceanError)> {
        let companion_id = source.companion.as_deref().ok_or_else(|| {
            (
                TaskStage::Configuration,
                OceanError::ConfigError(format!(
                    "combined dataset '{}' has no companion",
                    source.id
                )),
            )
        })?;
        let companion = self
            .sources
            .get(companion_id)
            .map_err(|e| (TaskStage::Configuration, e))?;

        // Both halves are required; either failure fails the task
        // before any merge is attempted.
        let altimetry = self
            .acquire_raw(task.date, source, region)
            .await
            .map_err(|e| (TaskStage::Acquisition, e))?;
        let currents = self
            .acquire_raw(task.date, companion, region)
            .await
            .map_err(|e| (TaskStage::Acquisition, e))?;

        let standardized = self
            .standardizer
            .standardize_combined(&altimetry, &currents, source, companion)
            .map_err(|e| (TaskStage::Standardization, e))?;
        let StandardizedData::Combined { ssh, u, v } = standardized else {
            return Err((
                TaskStage::Standardization,
                OceanError::ConfigError(format!(
                    "combined dataset '{}' produced non-combined output",
                    source.id
                )),
            ));
        };
        let ssh = self
            .masker
            .mask(&ssh)
            .map_err(|e| (TaskStage::Standardization, e))?;
        let u = self
            .masker
            .mask(&u)
            .map_err(|e| (TaskStage::Standardization, e))?;
        let v = self
            .masker
            .mask(&v)
            .map_err(|e| (TaskStage::Standardization, e))?;

        let mut features = self
            .detector
            .detect(&ssh, Some((&u, &v)))
            .map_err(|e| (TaskStage::Detection, e))?;
        features.extend(self.extractor.extract(&ssh, &LevelPolicy::SshSpread));

        let mut ranges = BTreeMap::new();
        range_entry(&mut ranges, variable_name(source, 0), &ssh);
        range_entry(&mut ranges, variable_name(companion, 0), &u);
        range_entry(&mut ranges, variable_name(companion, 1), &v);
        Ok((features, ranges))
    }

    /// Cache-first raw acquisition. Misses go through the acquisition
    /// semaphore, the retry wrapper, and finally land in the cache.
    async fn acquire_raw(
        &self,
        date: NaiveDate,
        source: &DatasetSource,
        region: &Region,
    ) -> OceanResult<RawDataset> {
        if let Some(path) = self.store.cached_raw(&source.id, &region.id, date) {
            return self.store.load_raw(&path).await;
        }

        let _permit = self
            .acquisition_permits
            .acquire()
            .await
            .map_err(|_| OceanError::CacheError("acquisition semaphore closed".to_string()))?;
        let path = fetch_with_retry(self.acquirer.as_ref(), &self.retry, date, source, region)
            .await?;
        let raw = self.store.load_raw(&path).await?;
        self.store
            .store_raw(&source.id, &region.id, date, &raw)
            .await?;
        Ok(raw)
    }
}

fn variable_name<'a>(source: &'a DatasetSource, index: usize) -> &'a str {
    source
        .variables
        .get(index)
        .map(String::as_str)
        .unwrap_or(source.id.as_str())
}

fn range_entry(ranges: &mut BTreeMap<String, ValueRange>, name: &str, grid: &Grid) {
    if let Some((min, max)) = grid.value_range() {
        ranges.insert(
            name.to_string(),
            ValueRange {
                min: min as f64,
                max: max as f64,
                unit: grid.unit().label().to_string(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct NeverCalled;

    #[async_trait]
    impl Acquire for NeverCalled {
        async fn fetch(
            &self,
            _date: NaiveDate,
            _source: &DatasetSource,
            _region: &Region,
        ) -> OceanResult<PathBuf> {
            panic!("acquisition must not run for configuration errors");
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_dataset_fails_without_acquisition() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(
            GridStore::with_default_ttls(dir.path().join("data"), dir.path().join("out"))
                .unwrap(),
        );
        let orchestrator = Orchestrator::new(
            SourceCatalog::from_sources(Vec::new()),
            RegionCatalog::from_regions(Vec::new()),
            store,
            Arc::new(LandMasker::all_ocean()),
            Arc::new(NeverCalled),
            RetryPolicy::immediate(0),
            3,
        );

        let reports = orchestrator
            .run_batch(vec![ProcessingTask {
                date: date(),
                region_id: "nowhere".to_string(),
                dataset_id: "nothing".to_string(),
            }])
            .await;

        assert_eq!(reports.len(), 1);
        let error = reports[0].error().unwrap();
        assert!(error.contains("configuration"));
        assert!(error.contains("nothing"));
    }

    #[test]
    fn test_build_tasks_cross_product() {
        let sources = SourceCatalog::from_sources(vec![
            DatasetSource {
                id: "sst".to_string(),
                name: "SST".to_string(),
                kind: DatasetKind::ScalarTemperature,
                variables: vec!["analysed_sst".to_string()],
                lag_days: 1,
                companion: None,
            },
            DatasetSource {
                id: "chl".to_string(),
                name: "Chlorophyll".to_string(),
                kind: DatasetKind::ScalarChlorophyll,
                variables: vec!["chlor_a".to_string()],
                lag_days: 1,
                companion: None,
            },
        ]);
        let regions = RegionCatalog::from_regions(vec![
            Region {
                id: "cape_cod".to_string(),
                name: "Cape Cod".to_string(),
                group: String::new(),
                bounds: Default::default(),
            },
            Region {
                id: "gulf_stream".to_string(),
                name: "Gulf Stream".to_string(),
                group: String::new(),
                bounds: Default::default(),
            },
        ]);

        let tasks = build_tasks(&sources, &regions, &[date()]);
        assert_eq!(tasks.len(), 4);
        assert!(tasks
            .iter()
            .any(|t| t.dataset_id == "sst" && t.region_id == "gulf_stream"));
    }
}

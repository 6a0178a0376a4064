//! File-backed cache keyed by (dataset, region, date).

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use chrono::NaiveDate;
use ocean_common::{FeatureCollection, OceanError, OceanResult, RawDataset};
use tracing::{debug, info};

/// Hit/miss counters for cache observability.
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Disk store for raw grid files and processed feature documents.
///
/// Raw entries are valid for `raw_ttl` from their modification time;
/// processed outputs for `processed_ttl`. Writes go through a
/// temporary sibling file plus rename, so a crashed or failed task
/// never leaves a partial document under a cache key.
pub struct GridStore {
    data_dir: PathBuf,
    output_dir: PathBuf,
    raw_ttl: Duration,
    processed_ttl: Duration,
    stats: Mutex<CacheStats>,
}

impl GridStore {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        raw_ttl: Duration,
        processed_ttl: Duration,
    ) -> OceanResult<Self> {
        let data_dir = data_dir.into();
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self {
            data_dir,
            output_dir,
            raw_ttl,
            processed_ttl,
            stats: Mutex::new(CacheStats::default()),
        })
    }

    /// A store with the operational defaults: 24 hours for raw files,
    /// 5 days for processed outputs.
    pub fn with_default_ttls(
        data_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> OceanResult<Self> {
        Self::new(
            data_dir,
            output_dir,
            Duration::from_secs(24 * 3600),
            Duration::from_secs(5 * 24 * 3600),
        )
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Deterministic path for a raw acquisition.
    pub fn raw_path(&self, dataset: &str, region: &str, date: NaiveDate) -> PathBuf {
        self.data_dir
            .join(format!("{}_{}_{}.json", dataset, region, date.format("%Y%m%d")))
    }

    /// Deterministic path for a task's feature document.
    pub fn features_path(&self, dataset: &str, region: &str, date: NaiveDate) -> PathBuf {
        self.output_dir.join(format!(
            "{}_{}_{}_features.json",
            dataset,
            region,
            date.format("%Y%m%d")
        ))
    }

    /// The cached raw file for a key, if present and within its TTL.
    pub fn cached_raw(&self, dataset: &str, region: &str, date: NaiveDate) -> Option<PathBuf> {
        let path = self.raw_path(dataset, region, date);
        let fresh = is_fresh(&path, self.raw_ttl);
        let mut stats = self
            .stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if fresh {
            stats.hits += 1;
            debug!(path = %path.display(), "Raw cache hit");
            Some(path)
        } else {
            stats.misses += 1;
            None
        }
    }

    /// Whether a fresh processed output already exists for a key.
    pub fn has_features(&self, dataset: &str, region: &str, date: NaiveDate) -> bool {
        is_fresh(&self.features_path(dataset, region, date), self.processed_ttl)
    }

    /// Read and parse a raw dataset file.
    pub async fn load_raw(&self, path: &Path) -> OceanResult<RawDataset> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            OceanError::CacheError(format!("failed to read {}: {}", path.display(), e))
        })?;
        RawDataset::from_json(&bytes)
    }

    /// Persist a raw dataset under its cache key.
    pub async fn store_raw(
        &self,
        dataset: &str,
        region: &str,
        date: NaiveDate,
        raw: &RawDataset,
    ) -> OceanResult<PathBuf> {
        let path = self.raw_path(dataset, region, date);
        let bytes = raw.to_json()?;
        write_atomic(&path, &bytes).await?;
        debug!(path = %path.display(), "Stored raw dataset");
        Ok(path)
    }

    /// Persist a completed feature document.
    ///
    /// Callers invoke this only after all geometry computation has
    /// succeeded; together with the atomic rename this guarantees no
    /// partial output is ever visible for a failed task.
    pub async fn store_features(
        &self,
        dataset: &str,
        region: &str,
        date: NaiveDate,
        collection: &FeatureCollection,
    ) -> OceanResult<PathBuf> {
        let path = self.features_path(dataset, region, date);
        let bytes = serde_json::to_vec_pretty(collection)
            .map_err(|e| OceanError::StorageError(format!("feature serialization: {}", e)))?;
        write_atomic(&path, &bytes).await?;
        info!(
            path = %path.display(),
            features = collection.len(),
            "Stored feature document"
        );
        Ok(path)
    }
}

fn is_fresh(path: &Path, ttl: Duration) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    let Ok(modified) = metadata.modified() else {
        return false;
    };
    match SystemTime::now().duration_since(modified) {
        Ok(age) => age <= ttl,
        // Future mtime: treat as fresh rather than re-acquiring.
        Err(_) => true,
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> OceanResult<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await.map_err(|e| {
        OceanError::StorageError(format!("failed to write {}: {}", tmp.display(), e))
    })?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| {
        OceanError::StorageError(format!("failed to rename {}: {}", tmp.display(), e))
    })?;
    Ok(())
}

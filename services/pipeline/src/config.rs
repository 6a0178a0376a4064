//! Pipeline configuration loaded from a YAML file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

/// Root pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Directory for cached raw acquisitions.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Directory for processed feature documents.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Region catalog YAML.
    #[serde(default = "default_regions_file")]
    pub regions_file: PathBuf,
    /// Dataset source catalog YAML.
    #[serde(default = "default_sources_file")]
    pub sources_file: PathBuf,
    /// Land polygon geometry JSON; omit for an all-ocean mask.
    #[serde(default)]
    pub land_file: Option<PathBuf>,
    /// Concurrently in-flight acquisitions.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Validity window for cached raw files, in hours.
    #[serde(default = "default_raw_ttl_hours")]
    pub raw_ttl_hours: u64,
    /// Rolling retention window for on-disk data, in days.
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Acquisition retry tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Initial delay in seconds; doubles each retry.
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    /// Per-attempt acquisition timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_secs: default_initial_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_regions_file() -> PathBuf {
    PathBuf::from("config/regions.yaml")
}

fn default_sources_file() -> PathBuf {
    PathBuf::from("config/sources.yaml")
}

fn default_max_concurrent() -> usize {
    3
}

fn default_raw_ttl_hours() -> u64 {
    24
}

fn default_retention_days() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_secs() -> u64 {
    2
}

fn default_max_delay_secs() -> u64 {
    120
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            output_dir: default_output_dir(),
            regions_file: default_regions_file(),
            sources_file: default_sources_file(),
            land_file: None,
            max_concurrent: default_max_concurrent(),
            raw_ttl_hours: default_raw_ttl_hours(),
            retention_days: default_retention_days(),
            retry: RetryConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: PipelineConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        info!(
            data_dir = %config.data_dir.display(),
            output_dir = %config.output_dir.display(),
            max_concurrent = config.max_concurrent,
            "Loaded pipeline configuration"
        );
        Ok(config)
    }

    pub fn raw_ttl(&self) -> Duration {
        Duration::from_secs(self.raw_ttl_hours * 3600)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days * 24 * 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "data_dir: /var/ocean/raw\nmax_concurrent: 5").unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/ocean/raw"));
        assert_eq!(config.max_concurrent, 5);
        assert_eq!(config.raw_ttl_hours, 24);
        assert_eq!(config.retention_days, 5);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_retry_section_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "retry:\n  max_retries: 1\n  initial_delay_secs: 0").unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.initial_delay_secs, 0);
        assert_eq!(config.retry.max_delay_secs, 120);
    }
}

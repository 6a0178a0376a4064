//! Dataset source configuration.
//!
//! A [`DatasetSource`] describes one data provider: which variables it
//! carries, what kind of field they are, and how far behind realtime it
//! lags. The [`DatasetKind`] is a closed set; every stage downstream
//! selects behavior with a `match` on it.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{OceanError, OceanResult};

/// Category of a dataset source, driving standardization and detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    /// Sea-surface temperature (scalar).
    ScalarTemperature,
    /// Chlorophyll-a concentration (scalar).
    ScalarChlorophyll,
    /// Current u/v components (vector).
    VectorCurrent,
    /// Altimetry SSH merged with currents, used for eddy detection.
    CombinedAltimetryCurrent,
}

impl DatasetKind {
    /// Whether this kind needs two source acquisitions merged before detection.
    pub fn is_combined(&self) -> bool {
        matches!(self, DatasetKind::CombinedAltimetryCurrent)
    }
}

/// Configuration for a single data provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSource {
    /// Stable identifier used in cache keys and paths.
    pub id: String,
    /// Display name.
    pub name: String,
    pub kind: DatasetKind,
    /// Variable names as they appear in the raw files, in priority order.
    /// Scalar sources list one variable; vector sources list (u, v);
    /// combined sources list (ssh, u, v).
    pub variables: Vec<String>,
    /// Days behind realtime the provider publishes.
    #[serde(default = "default_lag_days")]
    pub lag_days: u32,
    /// Secondary source id for combined datasets (the currents half).
    #[serde(default)]
    pub companion: Option<String>,
}

fn default_lag_days() -> u32 {
    1
}

/// All configured dataset sources, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    sources: BTreeMap<String, DatasetSource>,
}

#[derive(Debug, Deserialize)]
struct SourcesFile {
    sources: Vec<DatasetSource>,
}

impl SourceCatalog {
    /// Load dataset sources from a YAML file.
    pub fn load(path: &Path) -> OceanResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OceanError::ConfigError(format!("failed to read {}: {}", path.display(), e))
        })?;
        let file: SourcesFile = serde_yaml::from_str(&content).map_err(|e| {
            OceanError::ConfigError(format!("failed to parse {}: {}", path.display(), e))
        })?;

        let mut sources = BTreeMap::new();
        for source in file.sources {
            debug!(dataset = %source.id, kind = ?source.kind, "Loaded dataset source");
            sources.insert(source.id.clone(), source);
        }

        // Combined sources must point at a configured companion.
        for source in sources.values() {
            if source.kind.is_combined() {
                match &source.companion {
                    Some(companion) if sources.contains_key(companion) => {}
                    Some(companion) => {
                        return Err(OceanError::ConfigError(format!(
                            "dataset '{}' references unknown companion '{}'",
                            source.id, companion
                        )));
                    }
                    None => {
                        return Err(OceanError::ConfigError(format!(
                            "combined dataset '{}' is missing a companion source",
                            source.id
                        )));
                    }
                }
            }
        }

        info!(count = sources.len(), "Loaded source catalog");
        Ok(Self { sources })
    }

    /// Build a catalog from in-memory sources (used in tests).
    pub fn from_sources(list: Vec<DatasetSource>) -> Self {
        let sources = list.into_iter().map(|s| (s.id.clone(), s)).collect();
        Self { sources }
    }

    /// Look up a source by id.
    pub fn get(&self, id: &str) -> OceanResult<&DatasetSource> {
        self.sources
            .get(id)
            .ok_or_else(|| OceanError::UnknownDataset(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_and_companion_validation() {
        let yaml = r#"
sources:
  - id: blended_sst
    name: "Blended SST"
    kind: scalar_temperature
    variables: [analysed_sst]
    lag_days: 1
  - id: blended_currents
    name: "Blended NRT Currents"
    kind: vector_current
    variables: [u_current, v_current]
  - id: ocean_dynamics
    name: "Ocean Dynamics"
    kind: combined_altimetry_current
    variables: [sea_surface_height, u_current, v_current]
    companion: blended_currents
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let catalog = SourceCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.len(), 3);
        assert!(catalog.get("ocean_dynamics").unwrap().kind.is_combined());
        assert!(matches!(
            catalog.get("missing"),
            Err(OceanError::UnknownDataset(_))
        ));
    }

    #[test]
    fn test_rejects_dangling_companion() {
        let yaml = r#"
sources:
  - id: ocean_dynamics
    name: "Ocean Dynamics"
    kind: combined_altimetry_current
    variables: [sea_surface_height, u_current, v_current]
    companion: nonexistent
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        assert!(SourceCatalog::load(file.path()).is_err());
    }
}

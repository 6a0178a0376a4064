//! Region configuration loaded from YAML.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{BoundingBox, OceanError, OceanResult};

/// A named rectangular processing region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    /// Stable identifier used in cache keys and paths.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Grouping label for front-end menus (e.g. "east_coast").
    #[serde(default)]
    pub group: String,
    pub bounds: BoundingBox,
}

/// All configured regions, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct RegionCatalog {
    regions: BTreeMap<String, Region>,
}

#[derive(Debug, Deserialize)]
struct RegionsFile {
    regions: Vec<Region>,
}

impl RegionCatalog {
    /// Load regions from a YAML file.
    pub fn load(path: &Path) -> OceanResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OceanError::ConfigError(format!("failed to read {}: {}", path.display(), e))
        })?;
        let file: RegionsFile = serde_yaml::from_str(&content).map_err(|e| {
            OceanError::ConfigError(format!("failed to parse {}: {}", path.display(), e))
        })?;

        let mut regions = BTreeMap::new();
        for region in file.regions {
            debug!(region = %region.id, name = %region.name, "Loaded region");
            regions.insert(region.id.clone(), region);
        }
        info!(count = regions.len(), "Loaded region catalog");
        Ok(Self { regions })
    }

    /// Build a catalog from in-memory regions (used in tests).
    pub fn from_regions(list: Vec<Region>) -> Self {
        let regions = list.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self { regions }
    }

    /// Look up a region by id.
    pub fn get(&self, id: &str) -> OceanResult<&Region> {
        self.regions
            .get(id)
            .ok_or_else(|| OceanError::UnknownRegion(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

//! On-disk raw grid format written by acquisition collaborators.
//!
//! A [`RawDataset`] is the JSON document an acquisition service drops into
//! the cache directory: named multi-dimensional variables plus coordinate
//! arrays, before any standardization has happened. Dimension names and
//! unit attributes are carried verbatim from the source so the standardizer
//! can canonicalize them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{OceanError, OceanResult};

/// A single variable in a raw dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawVariable {
    /// Dimension names in storage order, e.g. `["time", "latitude", "longitude"]`.
    pub dims: Vec<String>,
    /// Shape matching `dims`.
    pub shape: Vec<usize>,
    /// Flat row-major data; NaN marks missing cells.
    pub data: Vec<f32>,
    /// Source unit attribute, if present (e.g. `"degree_C"`, `"m s-1"`).
    #[serde(default)]
    pub units: Option<String>,
}

impl RawVariable {
    /// Total number of elements implied by the shape.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate that the data length matches the declared shape.
    pub fn validate(&self, name: &str) -> OceanResult<()> {
        if self.dims.len() != self.shape.len() {
            return Err(OceanError::MalformedFile(format!(
                "variable '{}': {} dims but {} shape entries",
                name,
                self.dims.len(),
                self.shape.len()
            )));
        }
        if self.data.len() != self.len() {
            return Err(OceanError::MalformedFile(format!(
                "variable '{}': data length {} does not match shape {:?}",
                name,
                self.data.len(),
                self.shape
            )));
        }
        Ok(())
    }
}

/// A raw multi-dimensional dataset as delivered by an acquisition service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDataset {
    /// Coordinate axes by name (e.g. "lat", "latitude", "lon", "time").
    pub coords: BTreeMap<String, Vec<f64>>,
    /// Data variables by name.
    pub variables: BTreeMap<String, RawVariable>,
}

impl RawDataset {
    /// Parse a raw dataset from JSON bytes, validating variable shapes.
    pub fn from_json(bytes: &[u8]) -> OceanResult<Self> {
        let ds: RawDataset = serde_json::from_slice(bytes)?;
        for (name, var) in &ds.variables {
            var.validate(name)?;
        }
        Ok(ds)
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> OceanResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Look up a coordinate axis under any of the given names.
    pub fn find_coord(&self, names: &[&str]) -> Option<(&str, &[f64])> {
        for name in names {
            if let Some((key, axis)) = self.coords.get_key_value(*name) {
                return Some((key.as_str(), axis.as_slice()));
            }
        }
        None
    }

    /// Look up a variable by exact name.
    pub fn variable(&self, name: &str) -> Option<&RawVariable> {
        self.variables.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut coords = BTreeMap::new();
        coords.insert("lat".to_string(), vec![41.0, 41.5]);
        coords.insert("lon".to_string(), vec![-71.0, -70.5]);

        let mut variables = BTreeMap::new();
        variables.insert(
            "analysed_sst".to_string(),
            RawVariable {
                dims: vec!["lat".to_string(), "lon".to_string()],
                shape: vec![2, 2],
                data: vec![10.0, 11.0, 12.0, 13.0],
                units: Some("degree_C".to_string()),
            },
        );

        let ds = RawDataset { coords, variables };
        let bytes = ds.to_json().unwrap();
        let back = RawDataset::from_json(&bytes).unwrap();

        assert_eq!(back.variables["analysed_sst"].data, vec![10.0, 11.0, 12.0, 13.0]);
        assert_eq!(back.find_coord(&["latitude", "lat"]).unwrap().0, "lat");
    }

    #[test]
    fn test_rejects_shape_mismatch() {
        let json = r#"{
            "coords": {"lat": [0.0], "lon": [0.0]},
            "variables": {
                "sst": {"dims": ["lat", "lon"], "shape": [1, 1], "data": [1.0, 2.0]}
            }
        }"#;
        assert!(RawDataset::from_json(json.as_bytes()).is_err());
    }
}

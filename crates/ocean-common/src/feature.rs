//! GeoJSON-shaped vector features emitted by the detectors.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Geometry of a feature: a point or a polyline, GeoJSON coordinate order
/// (longitude, latitude).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point([f64; 2]),
    LineString(Vec<[f64; 2]>),
}

/// The kinds of features the pipeline emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    AnticyclonicEddy,
    CyclonicEddy,
    SshMaximum,
    SshMinimum,
    UpwellingZone,
    DownwellingZone,
    Contour,
}

impl FeatureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureType::AnticyclonicEddy => "anticyclonic_eddy",
            FeatureType::CyclonicEddy => "cyclonic_eddy",
            FeatureType::SshMaximum => "ssh_maximum",
            FeatureType::SshMinimum => "ssh_minimum",
            FeatureType::UpwellingZone => "upwelling_zone",
            FeatureType::DownwellingZone => "downwelling_zone",
            FeatureType::Contour => "contour",
        }
    }
}

/// Qualitative strength classification carried on feature properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Strong,
    Moderate,
    Weak,
    None,
}

impl Strength {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strength::Strong => "strong",
            Strength::Moderate => "moderate",
            Strength::Weak => "weak",
            Strength::None => "none",
        }
    }
}

/// A single vector feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    pub geometry: Geometry,
    pub properties: Map<String, Value>,
}

impl Feature {
    /// Build a feature with the mandatory `feature_type` property set.
    pub fn new(feature_type: FeatureType, geometry: Geometry) -> Self {
        let mut properties = Map::new();
        properties.insert(
            "feature_type".to_string(),
            Value::String(feature_type.as_str().to_string()),
        );
        Self {
            kind: "Feature".to_string(),
            geometry,
            properties,
        }
    }

    /// Attach a property, replacing any existing value under the key.
    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// The `feature_type` property as a string, if present.
    pub fn feature_type(&self) -> Option<&str> {
        self.properties.get("feature_type").and_then(Value::as_str)
    }
}

/// Value range metadata for one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
    pub unit: String,
}

/// Collection-level properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionProperties {
    /// Date the source fields are valid for, YYYY-MM-DD.
    pub date: NaiveDate,
    /// Per-variable value ranges over valid cells.
    #[serde(default)]
    pub value_range: BTreeMap<String, ValueRange>,
}

/// A FeatureCollection-shaped output document, one per task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
    pub properties: CollectionProperties,
}

impl FeatureCollection {
    pub fn new(
        date: NaiveDate,
        features: Vec<Feature>,
        value_range: BTreeMap<String, ValueRange>,
    ) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features,
            properties: CollectionProperties { date, value_range },
        }
    }

    /// Empty-but-valid collection for insufficient-signal results.
    pub fn empty(date: NaiveDate) -> Self {
        Self::new(date, Vec::new(), BTreeMap::new())
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_round_trip() {
        let feature = Feature::new(FeatureType::SshMaximum, Geometry::Point([-70.25, 41.75]))
            .with_property("value", 0.42)
            .with_property("strength", "strong")
            .with_property("description", "High SSH: 0.42 m");

        let mut ranges = BTreeMap::new();
        ranges.insert(
            "sea_surface_height".to_string(),
            ValueRange {
                min: -0.3,
                max: 0.42,
                unit: "m".to_string(),
            },
        );

        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let collection = FeatureCollection::new(date, vec![feature], ranges);

        let json = serde_json::to_string(&collection).unwrap();
        let back: FeatureCollection = serde_json::from_str(&json).unwrap();

        assert_eq!(back.kind, "FeatureCollection");
        assert_eq!(back.len(), 1);
        assert_eq!(back.properties.date, date);
        assert_eq!(back.features[0].feature_type(), Some("ssh_maximum"));

        match (&back.features[0].geometry, &collection.features[0].geometry) {
            (Geometry::Point(a), Geometry::Point(b)) => {
                assert!((a[0] - b[0]).abs() < 1e-12);
                assert!((a[1] - b[1]).abs() < 1e-12);
            }
            _ => panic!("geometry type changed in round trip"),
        }

        let range = &back.properties.value_range["sea_surface_height"];
        assert!((range.max - 0.42).abs() < 1e-12);
        assert_eq!(range.unit, "m");
    }

    #[test]
    fn test_linestring_geometry_serialization() {
        let geom = Geometry::LineString(vec![[-70.0, 41.0], [-70.1, 41.1]]);
        let json = serde_json::to_value(&geom).unwrap();
        assert_eq!(json["type"], "LineString");
        assert_eq!(json["coordinates"][1][1], 41.1);
    }

    #[test]
    fn test_empty_collection_is_valid() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let empty = FeatureCollection::empty(date);
        let json = serde_json::to_string(&empty).unwrap();
        let back: FeatureCollection = serde_json::from_str(&json).unwrap();
        assert!(back.is_empty());
    }
}

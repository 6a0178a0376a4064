//! Shared types for the ocean-vectors pipeline.
//!
//! Everything downstream of acquisition speaks in terms of these types:
//! standardized [`Grid`]s over lat/lon axes, [`Region`] bounding boxes,
//! [`DatasetSource`] configuration, and GeoJSON-shaped [`Feature`] output.

pub mod bbox;
pub mod dataset;
pub mod error;
pub mod feature;
pub mod grid;
pub mod raw;
pub mod region;
pub mod unit;

pub use bbox::BoundingBox;
pub use dataset::{DatasetKind, DatasetSource, SourceCatalog};
pub use error::{OceanError, OceanResult};
pub use feature::{
    Feature, FeatureCollection, FeatureType, Geometry, Strength, ValueRange,
};
pub use grid::Grid;
pub use raw::{RawDataset, RawVariable};
pub use region::{Region, RegionCatalog};
pub use unit::Unit;

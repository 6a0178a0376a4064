//! Feature detection and contour extraction over standardized grids.
//!
//! The [`FeatureDetector`] turns an SSH field (optionally with
//! co-registered currents) into labeled point features: eddies, SSH
//! extrema, and upwelling/downwelling zones. The [`ContourExtractor`]
//! produces isoline polylines at policy-derived levels. Both treat
//! insufficient signal as an empty-but-valid result, never an error;
//! all statistics run over non-missing cells only.

pub mod contour;
pub mod detector;
pub mod field;

pub use contour::{ContourConfig, ContourExtractor, LevelPolicy};
pub use detector::{DetectorConfig, FeatureDetector};

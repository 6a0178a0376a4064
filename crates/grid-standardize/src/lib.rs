//! Standardization of raw grids and land masking.
//!
//! Raw datasets arrive with inconsistent coordinate names, extra
//! dimensions (time, depth, altitude), and native units. The
//! [`Standardizer`] collapses them onto a canonical lat/lon [`Grid`]
//! per variable; the [`LandMasker`] then blanks cells that fall over
//! land before detection runs.

pub mod land_mask;
pub mod standardize;

pub use land_mask::{LandMasker, LandPolygons};
pub use standardize::{StandardizedData, Standardizer};

pub use ocean_common::Grid;

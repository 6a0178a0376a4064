//! Standardized 2-D grids over lat/lon axes.

use serde::{Deserialize, Serialize};

use crate::{BoundingBox, OceanError, OceanResult, Unit};

/// An immutable 2-D field keyed by two 1-D coordinate axes.
///
/// Data is row-major with latitude as the row axis: the value at
/// `(lat index j, lon index i)` lives at `data[j * lons.len() + i]`.
/// Missing cells are `f32::NAN`. Axes are strictly monotonic; the
/// constructor rejects anything else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    lons: Vec<f64>,
    lats: Vec<f64>,
    data: Vec<f32>,
    unit: Unit,
}

impl Grid {
    /// Build a grid, validating axis lengths and monotonicity.
    pub fn new(lons: Vec<f64>, lats: Vec<f64>, data: Vec<f32>, unit: Unit) -> OceanResult<Self> {
        if lons.is_empty() {
            return Err(OceanError::MissingCoordinate("longitude".to_string()));
        }
        if lats.is_empty() {
            return Err(OceanError::MissingCoordinate("latitude".to_string()));
        }
        if data.len() != lons.len() * lats.len() {
            return Err(OceanError::MalformedFile(format!(
                "data length {} does not match {}x{} axes",
                data.len(),
                lats.len(),
                lons.len()
            )));
        }
        if !is_strictly_monotonic(&lons) {
            return Err(OceanError::MalformedFile(
                "longitude axis is not strictly monotonic".to_string(),
            ));
        }
        if !is_strictly_monotonic(&lats) {
            return Err(OceanError::MalformedFile(
                "latitude axis is not strictly monotonic".to_string(),
            ));
        }
        Ok(Self {
            lons,
            lats,
            data,
            unit,
        })
    }

    /// Number of longitude points (columns).
    pub fn nx(&self) -> usize {
        self.lons.len()
    }

    /// Number of latitude points (rows).
    pub fn ny(&self) -> usize {
        self.lats.len()
    }

    /// Grid shape as (ny, nx).
    pub fn shape(&self) -> (usize, usize) {
        (self.lats.len(), self.lons.len())
    }

    pub fn lons(&self) -> &[f64] {
        &self.lons
    }

    pub fn lats(&self) -> &[f64] {
        &self.lats
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Value at (row j, column i); NaN marks missing cells.
    pub fn get(&self, j: usize, i: usize) -> Option<f32> {
        if j >= self.lats.len() || i >= self.lons.len() {
            return None;
        }
        self.data.get(j * self.lons.len() + i).copied()
    }

    /// Geographic coordinates at (row j, column i).
    pub fn coords(&self, j: usize, i: usize) -> Option<(f64, f64)> {
        if j >= self.lats.len() || i >= self.lons.len() {
            return None;
        }
        Some((self.lons[i], self.lats[j]))
    }

    /// Geographic extent of the axes.
    pub fn bbox(&self) -> BoundingBox {
        let (lon_min, lon_max) = axis_extent(&self.lons);
        let (lat_min, lat_max) = axis_extent(&self.lats);
        BoundingBox::new(lon_min, lat_min, lon_max, lat_max)
    }

    /// Number of non-NaN cells.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }

    /// Fraction of cells that are missing (NaN).
    pub fn missing_fraction(&self) -> f64 {
        if self.data.is_empty() {
            return 1.0;
        }
        1.0 - self.valid_count() as f64 / self.data.len() as f64
    }

    /// (min, max) over valid cells, or None if the grid is all-missing.
    pub fn value_range(&self) -> Option<(f32, f32)> {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut any = false;
        for &v in &self.data {
            if v.is_nan() {
                continue;
            }
            any = true;
            if v < min {
                min = v;
            }
            if v > max {
                max = v;
            }
        }
        if any {
            Some((min, max))
        } else {
            None
        }
    }

    /// Mean longitude spacing in degrees.
    pub fn lon_spacing(&self) -> f64 {
        mean_spacing(&self.lons)
    }

    /// Mean latitude spacing in degrees.
    pub fn lat_spacing(&self) -> f64 {
        mean_spacing(&self.lats)
    }

    /// Copy of this grid with different data on the same axes.
    ///
    /// Used when a derived field (masked, smoothed, converted) keeps
    /// the coordinate geometry of its parent.
    pub fn with_data(&self, data: Vec<f32>, unit: Unit) -> OceanResult<Self> {
        Grid::new(self.lons.clone(), self.lats.clone(), data, unit)
    }

    /// Whether this grid shares axes with another (same lengths and values).
    pub fn axes_match(&self, other: &Grid) -> bool {
        self.lons.len() == other.lons.len()
            && self.lats.len() == other.lats.len()
            && self
                .lons
                .iter()
                .zip(other.lons.iter())
                .all(|(a, b)| (a - b).abs() < 1e-9)
            && self
                .lats
                .iter()
                .zip(other.lats.iter())
                .all(|(a, b)| (a - b).abs() < 1e-9)
    }
}

fn is_strictly_monotonic(axis: &[f64]) -> bool {
    if axis.len() < 2 {
        return true;
    }
    let increasing = axis[1] > axis[0];
    axis.windows(2).all(|w| {
        if increasing {
            w[1] > w[0]
        } else {
            w[1] < w[0]
        }
    })
}

fn axis_extent(axis: &[f64]) -> (f64, f64) {
    let first = axis[0];
    let last = axis[axis.len() - 1];
    (first.min(last), first.max(last))
}

fn mean_spacing(axis: &[f64]) -> f64 {
    if axis.len() < 2 {
        return 0.0;
    }
    (axis[axis.len() - 1] - axis[0]).abs() / (axis.len() - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_grid() -> Grid {
        Grid::new(
            vec![-71.0, -70.5, -70.0],
            vec![41.0, 41.5],
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            Unit::Meters,
        )
        .unwrap()
    }

    #[test]
    fn test_shape_and_get() {
        let g = small_grid();
        assert_eq!(g.shape(), (2, 3));
        assert_eq!(g.get(0, 0), Some(1.0));
        assert_eq!(g.get(1, 2), Some(6.0));
        assert_eq!(g.get(2, 0), None);
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let err = Grid::new(
            vec![0.0, 1.0],
            vec![0.0, 1.0],
            vec![1.0, 2.0, 3.0],
            Unit::Meters,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_rejects_non_monotonic_axis() {
        let err = Grid::new(
            vec![0.0, 2.0, 1.0],
            vec![0.0],
            vec![1.0, 2.0, 3.0],
            Unit::Meters,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_descending_latitude_is_valid() {
        // Many sources deliver north-to-south latitude axes.
        let g = Grid::new(
            vec![0.0, 1.0],
            vec![45.0, 44.0],
            vec![1.0, 2.0, 3.0, 4.0],
            Unit::Celsius,
        );
        assert!(g.is_ok());
    }

    #[test]
    fn test_missing_fraction() {
        let g = Grid::new(
            vec![0.0, 1.0],
            vec![0.0, 1.0],
            vec![1.0, f32::NAN, f32::NAN, f32::NAN],
            Unit::Meters,
        )
        .unwrap();
        assert!((g.missing_fraction() - 0.75).abs() < 1e-9);
        assert_eq!(g.valid_count(), 1);
    }

    #[test]
    fn test_value_range_skips_nan() {
        let g = Grid::new(
            vec![0.0, 1.0],
            vec![0.0, 1.0],
            vec![1.0, f32::NAN, -2.0, 5.0],
            Unit::Meters,
        )
        .unwrap();
        assert_eq!(g.value_range(), Some((-2.0, 5.0)));
    }

    #[test]
    fn test_bbox() {
        let g = small_grid();
        let bbox = g.bbox();
        assert!((bbox.min_lon - -71.0).abs() < 1e-9);
        assert!((bbox.max_lat - 41.5).abs() < 1e-9);
    }
}

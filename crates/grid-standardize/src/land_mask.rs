//! Land masking with per-grid memoized masks.
//!
//! Computing a mask means a point-in-polygon test per grid cell, which is
//! far too expensive to repeat on every call. Masks are therefore keyed by
//! the grid's (shape, bounds) signature and computed at most once per key
//! for the process lifetime. The cache map sits behind a mutex: concurrent
//! tasks over the same region serialize on first computation instead of
//! duplicating it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ocean_common::{Grid, OceanError, OceanResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Reference land geometry: a set of polygon outer rings in (lon, lat).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LandPolygons {
    pub polygons: Vec<Vec<[f64; 2]>>,
}

impl LandPolygons {
    /// Load land geometry from a JSON file.
    pub fn load(path: &Path) -> OceanResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            OceanError::ConfigError(format!("failed to read {}: {}", path.display(), e))
        })?;
        let polygons: LandPolygons = serde_json::from_slice(&bytes)?;
        info!(
            count = polygons.polygons.len(),
            path = %path.display(),
            "Loaded land geometry"
        );
        Ok(polygons)
    }
}

/// Cache key: grid shape plus bounds quantized to a micro-degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MaskKey {
    nx: usize,
    ny: usize,
    min_lon: i64,
    min_lat: i64,
    max_lon: i64,
    max_lat: i64,
}

impl MaskKey {
    fn for_grid(grid: &Grid) -> Self {
        let bbox = grid.bbox();
        let q = |v: f64| (v * 1e6).round() as i64;
        Self {
            nx: grid.nx(),
            ny: grid.ny(),
            min_lon: q(bbox.min_lon),
            min_lat: q(bbox.min_lat),
            max_lon: q(bbox.max_lon),
            max_lat: q(bbox.max_lat),
        }
    }
}

/// Applies a land/water mask to grids, memoizing per (shape, bounds).
pub struct LandMasker {
    land: LandPolygons,
    // Polygon bounding boxes, precomputed for the coarse rejection pass.
    extents: Vec<(f64, f64, f64, f64)>,
    masks: Mutex<HashMap<MaskKey, Arc<Vec<bool>>>>,
    computed: AtomicUsize,
}

impl LandMasker {
    pub fn new(land: LandPolygons) -> Self {
        let extents = land.polygons.iter().map(|ring| ring_extent(ring)).collect();
        Self {
            land,
            extents,
            masks: Mutex::new(HashMap::new()),
            computed: AtomicUsize::new(0),
        }
    }

    /// A masker with no land geometry: everything is ocean.
    pub fn all_ocean() -> Self {
        Self::new(LandPolygons::default())
    }

    /// Number of distinct masks computed so far (test instrumentation).
    pub fn masks_computed(&self) -> usize {
        self.computed.load(Ordering::Relaxed)
    }

    /// The boolean mask for a grid's geometry: `true` means land.
    pub fn mask_for(&self, grid: &Grid) -> Arc<Vec<bool>> {
        let key = MaskKey::for_grid(grid);
        let mut masks = self
            .masks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(mask) = masks.get(&key) {
            return Arc::clone(mask);
        }

        // Computed under the lock so concurrent callers for the same
        // signature never duplicate the point-in-polygon sweep.
        let mask = Arc::new(self.compute_mask(grid));
        self.computed.fetch_add(1, Ordering::Relaxed);
        debug!(
            nx = grid.nx(),
            ny = grid.ny(),
            land_cells = mask.iter().filter(|&&m| m).count(),
            "Computed land mask"
        );
        masks.insert(key, Arc::clone(&mask));
        mask
    }

    /// Set land cells of a field to NaN, leaving ocean cells untouched.
    pub fn mask(&self, grid: &Grid) -> OceanResult<Grid> {
        let mask = self.mask_for(grid);
        let data: Vec<f32> = grid
            .data()
            .iter()
            .zip(mask.iter())
            .map(|(&v, &is_land)| if is_land { f32::NAN } else { v })
            .collect();
        grid.with_data(data, grid.unit())
    }

    fn compute_mask(&self, grid: &Grid) -> Vec<bool> {
        let (ny, nx) = grid.shape();
        let mut mask = vec![false; ny * nx];
        for (j, &lat) in grid.lats().iter().enumerate() {
            for (i, &lon) in grid.lons().iter().enumerate() {
                if self.is_land(lon, lat) {
                    mask[j * nx + i] = true;
                }
            }
        }
        mask
    }

    fn is_land(&self, lon: f64, lat: f64) -> bool {
        for (ring, &(min_lon, min_lat, max_lon, max_lat)) in
            self.land.polygons.iter().zip(self.extents.iter())
        {
            if lon < min_lon || lon > max_lon || lat < min_lat || lat > max_lat {
                continue;
            }
            if point_in_ring(lon, lat, ring) {
                return true;
            }
        }
        false
    }
}

fn ring_extent(ring: &[[f64; 2]]) -> (f64, f64, f64, f64) {
    let mut min_lon = f64::INFINITY;
    let mut min_lat = f64::INFINITY;
    let mut max_lon = f64::NEG_INFINITY;
    let mut max_lat = f64::NEG_INFINITY;
    for p in ring {
        min_lon = min_lon.min(p[0]);
        max_lon = max_lon.max(p[0]);
        min_lat = min_lat.min(p[1]);
        max_lat = max_lat.max(p[1]);
    }
    (min_lon, min_lat, max_lon, max_lat)
}

/// Ray-casting point-in-polygon over a single ring.
fn point_in_ring(lon: f64, lat: f64, ring: &[[f64; 2]]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut k = n - 1;
    for i in 0..n {
        let (xi, yi) = (ring[i][0], ring[i][1]);
        let (xk, yk) = (ring[k][0], ring[k][1]);
        if ((yi > lat) != (yk > lat))
            && (lon < (xk - xi) * (lat - yi) / (yk - yi) + xi)
        {
            inside = !inside;
        }
        k = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocean_common::Unit;

    fn square_land() -> LandPolygons {
        // Unit square from (0,0) to (1,1).
        LandPolygons {
            polygons: vec![vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]],
        }
    }

    fn grid_3x3() -> Grid {
        Grid::new(
            vec![-0.5, 0.5, 1.5],
            vec![-0.5, 0.5, 1.5],
            vec![1.0; 9],
            Unit::Meters,
        )
        .unwrap()
    }

    #[test]
    fn test_point_in_ring() {
        let ring = vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        assert!(point_in_ring(0.5, 0.5, &ring));
        assert!(!point_in_ring(1.5, 0.5, &ring));
        assert!(!point_in_ring(0.5, -0.5, &ring));
    }

    #[test]
    fn test_mask_blanks_land_cells_only() {
        let masker = LandMasker::new(square_land());
        let masked = masker.mask(&grid_3x3()).unwrap();

        // Only the center cell (0.5, 0.5) sits inside the land square.
        assert!(masked.get(1, 1).unwrap().is_nan());
        assert_eq!(masked.get(0, 0), Some(1.0));
        assert_eq!(masked.get(2, 2), Some(1.0));
    }

    #[test]
    fn test_mask_computed_once_per_signature() {
        let masker = LandMasker::new(square_land());
        let grid = grid_3x3();

        let first = masker.mask_for(&grid);
        let second = masker.mask_for(&grid);
        assert_eq!(masker.masks_computed(), 1);
        assert_eq!(first.as_slice(), second.as_slice());

        // A different shape gets its own mask.
        let other = Grid::new(
            vec![-0.5, 0.5],
            vec![-0.5, 0.5],
            vec![1.0; 4],
            Unit::Meters,
        )
        .unwrap();
        masker.mask_for(&other);
        assert_eq!(masker.masks_computed(), 2);
    }

    #[test]
    fn test_all_ocean_masker_is_identity() {
        let masker = LandMasker::all_ocean();
        let masked = masker.mask(&grid_3x3()).unwrap();
        assert!(masked.data().iter().all(|v| *v == 1.0));
    }
}

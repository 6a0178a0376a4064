//! Isoline extraction via marching squares.
//!
//! Levels come from a [`LevelPolicy`]; geometry is produced per level
//! by classifying each cell's corners against the level, interpolating
//! edge crossings, and chaining the resulting segments into polylines.
//! Short or low-vertex polylines are dropped as noise.

use std::collections::HashMap;

use ocean_common::{Feature, FeatureType, Geometry, Grid, Strength};
use tracing::{debug, info};

use crate::field;

/// Temperatures anglers and forecasters key on, in °F. Contours at
/// these levels are flagged so a renderer can emphasize them.
const KEY_TEMPERATURES: [f64; 9] = [44.0, 48.0, 54.0, 60.0, 65.0, 70.0, 72.0, 74.0, 76.0];

/// How contour levels are chosen for a field.
#[derive(Debug, Clone)]
pub enum LevelPolicy {
    /// Multiples of `step` spanning `[floor(min), ceil(max)]`.
    Interval { step: f64 },
    /// Temperature ladder in °F: every 2° below 50, every 1° from 50
    /// to 75, every 2° above 75.
    TemperatureLadder,
    /// Levels at the given field percentiles, for bloom-style fields
    /// where absolute values vary wildly between regions.
    Percentiles { qs: Vec<f64> },
    /// Five levels spread around the mean: `mean + k·σ` for
    /// `k ∈ {-1, -1/2, 0, 1/2, 1}` with `σ = (max - min) / 4` taken
    /// over the central percentile range. Used for SSH, where a few
    /// physically meaningful levels beat a dense ladder. Contours
    /// under this policy carry gradient-break strength tags.
    SshSpread,
}

/// Shape-validation and strength-tagging thresholds.
#[derive(Debug, Clone)]
pub struct ContourConfig {
    /// Polylines with fewer vertices are discarded.
    pub min_vertices: usize,
    /// Polylines with a shorter coordinate-degree path are discarded.
    pub min_path_length_deg: f64,
    /// Below this many valid cells the field is too sparse to contour.
    pub min_valid_points: usize,
    /// Below this value range the field is too flat to contour.
    pub min_value_range: f32,
    /// Percentile bounds for the SshSpread level window.
    pub spread_low_percentile: f64,
    pub spread_high_percentile: f64,
    /// Gaussian sigma applied to the gradient magnitude before
    /// break-strength sampling.
    pub gradient_sigma: f64,
    /// Mean-gradient percentiles for strong and moderate breaks.
    pub strong_percentile: f64,
    pub moderate_percentile: f64,
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            min_vertices: 5,
            min_path_length_deg: 0.5,
            min_valid_points: 10,
            min_value_range: 0.05,
            spread_low_percentile: 5.0,
            spread_high_percentile: 95.0,
            gradient_sigma: 1.5,
            strong_percentile: 95.0,
            moderate_percentile: 85.0,
        }
    }
}

/// Extracts isoline features from a standardized grid.
pub struct ContourExtractor {
    config: ContourConfig,
}

impl Default for ContourExtractor {
    fn default() -> Self {
        Self::new(ContourConfig::default())
    }
}

impl ContourExtractor {
    pub fn new(config: ContourConfig) -> Self {
        Self { config }
    }

    /// Contour the field at policy-derived levels.
    ///
    /// A field too sparse or too flat to contour yields an empty list.
    pub fn extract(&self, grid: &Grid, policy: &LevelPolicy) -> Vec<Feature> {
        let valid = grid.valid_count();
        if valid < self.config.min_valid_points {
            info!(valid, "Too few valid cells to contour");
            return Vec::new();
        }
        let (min, max) = match grid.value_range() {
            Some(range) => range,
            None => return Vec::new(),
        };
        if max - min < self.config.min_value_range {
            info!(min, max, "Value range too flat to contour");
            return Vec::new();
        }

        let levels = self.levels_for(grid, policy, min as f64, max as f64);
        debug!(count = levels.len(), "Selected contour levels");

        // Gradient break tagging only applies to the SSH-style policy.
        let breaks = match policy {
            LevelPolicy::SshSpread => Some(self.gradient_breaks(grid)),
            _ => None,
        };

        let mut features = Vec::new();
        for level in levels {
            for path in trace_level(grid, level) {
                let length_deg = path_length_deg(&path);
                if path.len() < self.config.min_vertices
                    || length_deg < self.config.min_path_length_deg
                {
                    continue;
                }

                let mut feature =
                    Feature::new(FeatureType::Contour, Geometry::LineString(path.clone()))
                        .with_property("value", level)
                        .with_property("unit", grid.unit().label())
                        .with_property("length_nm", length_deg * 60.0);

                if matches!(policy, LevelPolicy::TemperatureLadder) {
                    let is_key = KEY_TEMPERATURES.iter().any(|&k| (k - level).abs() < 1e-9);
                    feature = feature.with_property("is_key_temp", is_key);
                }
                if let Some(breaks) = &breaks {
                    feature = breaks.tag(grid, &path, feature);
                }
                features.push(feature);
            }
        }
        info!(count = features.len(), "Contour extraction complete");
        features
    }

    fn levels_for(&self, grid: &Grid, policy: &LevelPolicy, min: f64, max: f64) -> Vec<f64> {
        match policy {
            LevelPolicy::Interval { step } => {
                let lo = min.floor();
                let hi = max.ceil();
                let mut levels = Vec::new();
                let mut k = (lo / step).ceil();
                while k * step <= hi {
                    levels.push(k * step);
                    k += 1.0;
                }
                levels
            }
            LevelPolicy::TemperatureLadder => {
                let lo = min.floor();
                let hi = max.ceil();
                let mut levels = Vec::new();
                let mut l = lo;
                while l < 50.0_f64.min(hi + 1.0) {
                    levels.push(l);
                    l += 2.0;
                }
                l = 50.0;
                while l < 75.0 {
                    levels.push(l);
                    l += 1.0;
                }
                l = 75.0;
                while l <= hi + 1.0 {
                    levels.push(l);
                    l += 2.0;
                }
                levels.retain(|&l| l >= lo && l <= hi);
                levels.dedup();
                levels
            }
            LevelPolicy::Percentiles { qs } => {
                let mut levels: Vec<f64> = qs
                    .iter()
                    .map(|&q| field::percentile(grid.data(), q) as f64)
                    .filter(|l| l.is_finite())
                    .collect();
                levels.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                levels.dedup();
                levels
            }
            LevelPolicy::SshSpread => {
                let lo = field::percentile(grid.data(), self.config.spread_low_percentile) as f64;
                let hi = field::percentile(grid.data(), self.config.spread_high_percentile) as f64;
                let mean = field::mean_std(grid.data()).0 as f64;
                let sigma = (hi - lo) / 4.0;
                [-1.0, -0.5, 0.0, 0.5, 1.0]
                    .iter()
                    .map(|k| mean + k * sigma)
                    .collect()
            }
        }
    }

    fn gradient_breaks(&self, grid: &Grid) -> GradientBreaks {
        let (ny, nx) = grid.shape();
        let (gy, gx) = field::gradient(grid.data(), ny, nx);
        let magnitude = field::gaussian_smooth(
            &field::magnitude(&gy, &gx),
            ny,
            nx,
            self.config.gradient_sigma,
        );
        let strong = field::percentile(&magnitude, self.config.strong_percentile);
        let moderate = field::percentile(&magnitude, self.config.moderate_percentile);
        GradientBreaks {
            magnitude,
            strong,
            moderate,
        }
    }
}

/// Smoothed gradient-magnitude field with break thresholds.
struct GradientBreaks {
    magnitude: Vec<f32>,
    strong: f32,
    moderate: f32,
}

impl GradientBreaks {
    /// Sample the gradient under each vertex and attach mean, max, and
    /// a break-strength tag.
    fn tag(&self, grid: &Grid, path: &[[f64; 2]], feature: Feature) -> Feature {
        let nx = grid.nx();
        let mut sum = 0.0f64;
        let mut max = f32::NEG_INFINITY;
        let mut count = 0usize;
        for point in path {
            let i = nearest_index(grid.lons(), point[0]);
            let j = nearest_index(grid.lats(), point[1]);
            let v = self.magnitude[j * nx + i];
            if v.is_nan() {
                continue;
            }
            sum += v as f64;
            max = max.max(v);
            count += 1;
        }
        if count == 0 {
            return feature.with_property("break_strength", Strength::None.as_str());
        }
        let mean = (sum / count as f64) as f32;
        let strength = if mean > self.strong {
            Strength::Strong
        } else if mean > self.moderate {
            Strength::Moderate
        } else {
            Strength::Weak
        };
        feature
            .with_property("gradient", mean as f64)
            .with_property("max_gradient", max as f64)
            .with_property("break_strength", strength.as_str())
    }
}

fn nearest_index(axis: &[f64], value: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (k, &a) in axis.iter().enumerate() {
        let d = (a - value).abs();
        if d < best_dist {
            best_dist = d;
            best = k;
        }
    }
    best
}

fn path_length_deg(path: &[[f64; 2]]) -> f64 {
    path.windows(2)
        .map(|w| {
            let dx = w[1][0] - w[0][0];
            let dy = w[1][1] - w[0][1];
            (dx * dx + dy * dy).sqrt()
        })
        .sum()
}

/// A segment endpoint in fractional index space.
type IndexPoint = (f64, f64);

/// Marching squares over the grid at one level, returning chained
/// polylines in (lon, lat) coordinates.
fn trace_level(grid: &Grid, level: f64) -> Vec<Vec<[f64; 2]>> {
    let (ny, nx) = grid.shape();
    let data = grid.data();
    let mut segments: Vec<(IndexPoint, IndexPoint)> = Vec::new();

    for j in 0..ny.saturating_sub(1) {
        for i in 0..nx.saturating_sub(1) {
            let bl = data[j * nx + i];
            let br = data[j * nx + i + 1];
            let tl = data[(j + 1) * nx + i];
            let tr = data[(j + 1) * nx + i + 1];
            if bl.is_nan() || br.is_nan() || tl.is_nan() || tr.is_nan() {
                continue;
            }
            cell_segments(
                j as f64,
                i as f64,
                bl,
                br,
                tr,
                tl,
                level,
                &mut segments,
            );
        }
    }
    let chains = chain_segments(segments);
    chains
        .into_iter()
        .map(|chain| {
            chain
                .into_iter()
                .map(|(x, y)| [axis_value(grid.lons(), x), axis_value(grid.lats(), y)])
                .collect()
        })
        .collect()
}

/// Emit the crossing segments for one cell.
///
/// Corners are classified inside when `value >= level`; crossings are
/// linearly interpolated along each mixed edge. The two saddle cases
/// disambiguate on the cell-center mean.
#[allow(clippy::too_many_arguments)]
fn cell_segments(
    j: f64,
    i: f64,
    bl: f32,
    br: f32,
    tr: f32,
    tl: f32,
    level: f64,
    out: &mut Vec<(IndexPoint, IndexPoint)>,
) {
    let inside = |v: f32| (v as f64) >= level;
    let mut case = 0u8;
    if inside(bl) {
        case |= 1;
    }
    if inside(br) {
        case |= 2;
    }
    if inside(tr) {
        case |= 4;
    }
    if inside(tl) {
        case |= 8;
    }
    if case == 0 || case == 15 {
        return;
    }

    let t = |v0: f32, v1: f32| -> f64 {
        let span = (v1 - v0) as f64;
        if span.abs() < f64::EPSILON {
            0.5
        } else {
            ((level - v0 as f64) / span).clamp(0.0, 1.0)
        }
    };
    // Crossing points on the four cell edges, fractional index space.
    let bottom = || (i + t(bl, br), j);
    let right = || (i + 1.0, j + t(br, tr));
    let top = || (i + t(tl, tr), j + 1.0);
    let left = || (i, j + t(bl, tl));

    match case {
        1 | 14 => out.push((left(), bottom())),
        2 | 13 => out.push((bottom(), right())),
        3 | 12 => out.push((left(), right())),
        4 | 11 => out.push((right(), top())),
        6 | 9 => out.push((bottom(), top())),
        7 | 8 => out.push((left(), top())),
        5 => {
            let center = (bl + br + tr + tl) / 4.0;
            if inside(center) {
                out.push((bottom(), right()));
                out.push((top(), left()));
            } else {
                out.push((left(), bottom()));
                out.push((right(), top()));
            }
        }
        10 => {
            let center = (bl + br + tr + tl) / 4.0;
            if inside(center) {
                out.push((left(), bottom()));
                out.push((right(), top()));
            } else {
                out.push((bottom(), right()));
                out.push((top(), left()));
            }
        }
        _ => unreachable!(),
    }
}

/// Quantized endpoint key. Crossings on a shared edge are computed
/// from the same corner pair in both cells, so exact-float agreement
/// holds and a micro-index quantum is safe.
fn key(p: IndexPoint) -> (i64, i64) {
    ((p.0 * 1e6).round() as i64, (p.1 * 1e6).round() as i64)
}

/// Chain loose segments into polylines by walking shared endpoints.
fn chain_segments(segments: Vec<(IndexPoint, IndexPoint)>) -> Vec<Vec<IndexPoint>> {
    let mut at_point: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (idx, seg) in segments.iter().enumerate() {
        at_point.entry(key(seg.0)).or_default().push(idx);
        at_point.entry(key(seg.1)).or_default().push(idx);
    }

    let mut used = vec![false; segments.len()];
    let mut chains = Vec::new();

    for start in 0..segments.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let mut chain = vec![segments[start].0, segments[start].1];

        // Extend forward from the tail, then backward from the head.
        for forward in [true, false] {
            loop {
                let end = if forward {
                    *chain.last().unwrap()
                } else {
                    chain[0]
                };
                let next = at_point
                    .get(&key(end))
                    .and_then(|idxs| idxs.iter().find(|&&idx| !used[idx]).copied());
                let Some(idx) = next else { break };
                used[idx] = true;
                let (a, b) = segments[idx];
                let other = if key(a) == key(end) { b } else { a };
                if forward {
                    chain.push(other);
                } else {
                    chain.insert(0, other);
                }
            }
        }
        chains.push(chain);
    }
    chains
}

/// Map a fractional axis index to a coordinate by linear interpolation.
fn axis_value(axis: &[f64], t: f64) -> f64 {
    let k = t.floor() as usize;
    if k + 1 >= axis.len() {
        return axis[axis.len() - 1];
    }
    axis[k] + (axis[k + 1] - axis[k]) * (t - k as f64)
}

//! Point-feature detection over sea-surface height fields.
//!
//! Three independent passes: eddy centers from smoothed vorticity
//! (needs co-registered currents), SSH extrema, and upwelling /
//! downwelling zones. Thresholds are percentile-relative so the
//! detector self-calibrates across regions with very different
//! absolute SSH and vorticity ranges.

use ocean_common::{Feature, FeatureType, Geometry, Grid, OceanError, OceanResult, Strength};
use tracing::{debug, info};

use crate::field;

/// Meters per degree of latitude.
const METERS_PER_DEGREE: f64 = 111_000.0;

/// Tunable detection thresholds.
///
/// The defaults reproduce the operationally tuned values; none of them
/// derive from first principles, so every one is exposed here rather
/// than hard-coded in the passes.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Gaussian sigma applied to the vorticity field before thresholding.
    pub vorticity_sigma: f64,
    /// Sliding-window size for eddy-center local extrema.
    pub eddy_window: usize,
    /// Vorticity percentile an anticyclonic candidate must exceed.
    pub anticyclonic_percentile: f64,
    /// Vorticity percentile a cyclonic candidate must sit below.
    pub cyclonic_percentile: f64,
    /// Percentile the nearby SSH gradient magnitude must exceed for a
    /// candidate to count as having real surface expression.
    pub ssh_gradient_percentile: f64,
    /// Window within which that surface expression is looked for.
    pub ssh_gradient_window: usize,
    /// Cells skipped along each grid edge for eddy candidates.
    pub boundary_margin: usize,
    /// Cap on the outward radius walk, in grid cells.
    pub max_radius_cells: usize,
    /// Fraction of the field standard deviation the box-mean deviation
    /// must exceed for the radius walk to stop.
    pub radius_decay_factor: f32,
    /// Accepted eddy radius range in kilometers.
    pub min_radius_km: f64,
    pub max_radius_km: f64,
    /// Neighborhood size for SSH extremum detection and deduplication.
    pub extrema_window: usize,
    /// SSH percentile bounds for maxima / minima.
    pub maxima_percentile: f64,
    pub minima_percentile: f64,
    /// Standard deviations from the mean separating strong from
    /// moderate extrema.
    pub strong_sigma: f32,
    /// Gaussian sigma for the zone-detection smoothing pass.
    pub zone_sigma: f64,
    /// Smoothed-SSH magnitude a zone cell must exceed (negative for
    /// upwelling, positive for downwelling).
    pub zone_threshold: f32,
    /// Smoothed-SSH magnitude above which a zone is tagged strong.
    pub zone_strong_threshold: f32,
    /// Gradient-magnitude percentile a zone cell must exceed.
    pub zone_gradient_percentile: f64,
    /// Neighborhood size for zone center relocation and deduplication.
    pub zone_window: usize,
    /// Above this missing fraction the detector reports no features.
    pub max_missing_fraction: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            vorticity_sigma: 1.0,
            eddy_window: 3,
            anticyclonic_percentile: 75.0,
            cyclonic_percentile: 25.0,
            ssh_gradient_percentile: 75.0,
            ssh_gradient_window: 5,
            boundary_margin: 3,
            max_radius_cells: 20,
            radius_decay_factor: 0.5,
            min_radius_km: 10.0,
            max_radius_km: 75.0,
            extrema_window: 10,
            maxima_percentile: 95.0,
            minima_percentile: 5.0,
            strong_sigma: 1.5,
            zone_sigma: 2.0,
            zone_threshold: 0.5,
            zone_strong_threshold: 0.8,
            zone_gradient_percentile: 75.0,
            zone_window: 20,
            max_missing_fraction: 0.5,
        }
    }
}

/// Detects eddies, SSH extrema, and upwelling/downwelling zones.
pub struct FeatureDetector {
    config: DetectorConfig,
}

impl Default for FeatureDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl FeatureDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Run all detection passes over an SSH field.
    ///
    /// Eddy detection only runs when co-registered current components
    /// are supplied. A field with too many missing cells yields an
    /// empty list, not an error: that is insufficient signal.
    pub fn detect(
        &self,
        ssh: &Grid,
        currents: Option<(&Grid, &Grid)>,
    ) -> OceanResult<Vec<Feature>> {
        let missing = ssh.missing_fraction();
        if missing > self.config.max_missing_fraction {
            info!(
                missing_fraction = missing,
                "Field mostly missing, skipping feature detection"
            );
            return Ok(Vec::new());
        }

        let mut features = Vec::new();

        if let Some((u, v)) = currents {
            for component in [u, v] {
                if !ssh.axes_match(component) {
                    return Err(OceanError::AxisMismatch {
                        left: "ssh".to_string(),
                        left_len: ssh.lons().len(),
                        right: "current".to_string(),
                        right_len: component.lons().len(),
                    });
                }
            }
            let eddies = self.detect_eddies(ssh, u, v);
            debug!(count = eddies.len(), "Eddy detection pass complete");
            features.extend(eddies);
        }

        let extrema = self.find_extrema(ssh);
        debug!(count = extrema.len(), "Extrema pass complete");
        features.extend(extrema);

        let zones = self.find_zones(ssh);
        debug!(count = zones.len(), "Zone pass complete");
        features.extend(zones);

        info!(total = features.len(), "Feature detection complete");
        Ok(features)
    }

    /// Eddy centers from smoothed relative vorticity plus an SSH
    /// surface-expression check, with a radius estimate per center.
    fn detect_eddies(&self, ssh: &Grid, u: &Grid, v: &Grid) -> Vec<Feature> {
        let (ny, nx) = ssh.shape();
        let cfg = &self.config;

        let mean_lat = ssh.lats().iter().sum::<f64>() / ssh.lats().len() as f64;
        let dx_m = METERS_PER_DEGREE * mean_lat.to_radians().cos() * ssh.lon_spacing();
        let dy_m = METERS_PER_DEGREE * ssh.lat_spacing();

        // Relative vorticity: dv/dx - du/dy.
        let (_, dv_dx) = field::gradient(v.data(), ny, nx);
        let (du_dy, _) = field::gradient(u.data(), ny, nx);
        let vorticity: Vec<f32> = dv_dx
            .iter()
            .zip(du_dy.iter())
            .map(|(&a, &b)| a / dx_m as f32 - b / dy_m as f32)
            .collect();
        let vorticity = field::gaussian_smooth(&vorticity, ny, nx, cfg.vorticity_sigma);

        let vort_max = field::window_max(&vorticity, ny, nx, cfg.eddy_window);
        let vort_min = field::window_min(&vorticity, ny, nx, cfg.eddy_window);
        let high = field::percentile(&vorticity, cfg.anticyclonic_percentile);
        let low = field::percentile(&vorticity, cfg.cyclonic_percentile);

        // Surface-expression gate: the SSH gradient near the candidate
        // must stand out from the field at large.
        let ssh_smooth = field::gaussian_smooth(ssh.data(), ny, nx, cfg.vorticity_sigma);
        let (gy, gx) = field::gradient(&ssh_smooth, ny, nx);
        let grad_mag = field::magnitude(&gy, &gx);
        let grad_near = field::window_max(&grad_mag, ny, nx, cfg.ssh_gradient_window);
        let grad_threshold = field::percentile(&grad_mag, cfg.ssh_gradient_percentile);

        let ssh_std = field::mean_std(&ssh_smooth).1;
        let margin = cfg.boundary_margin;

        let mut features = Vec::new();
        for j in margin..ny.saturating_sub(margin) {
            for i in margin..nx.saturating_sub(margin) {
                let idx = j * nx + i;
                let zeta = vorticity[idx];
                if zeta.is_nan() {
                    continue;
                }

                let anticyclonic = zeta == vort_max[idx] && zeta > high;
                let cyclonic = zeta == vort_min[idx] && zeta < low;
                if !(anticyclonic || cyclonic) {
                    continue;
                }
                if !(grad_near[idx] > grad_threshold) {
                    continue;
                }

                let radius_km = self.estimate_radius_km(&ssh_smooth, ssh, j, i, ssh_std);
                if radius_km < cfg.min_radius_km || radius_km > cfg.max_radius_km {
                    continue;
                }

                let (lon, lat) = match ssh.coords(j, i) {
                    Some(c) => c,
                    None => continue,
                };
                let ssh_value = ssh.get(j, i).unwrap_or(f32::NAN);
                let diameter_km = (radius_km * 2.0).round() as i64;

                let feature = if anticyclonic {
                    Feature::new(FeatureType::AnticyclonicEddy, Geometry::Point([lon, lat]))
                        .with_property("description", "Clockwise rotating eddy")
                        .with_property("display_text", format!("CW\n{}km", diameter_km))
                } else {
                    Feature::new(FeatureType::CyclonicEddy, Geometry::Point([lon, lat]))
                        .with_property("description", "Counter-clockwise rotating eddy")
                        .with_property("display_text", format!("CCW\n{}km", diameter_km))
                };
                features.push(
                    feature
                        .with_property("radius_km", radius_km)
                        .with_property("ssh", ssh_value as f64)
                        .with_property("vorticity", zeta as f64),
                );
            }
        }
        features
    }

    /// Walk outward from a center until the box-mean SSH deviation from
    /// the center value exceeds a fraction of the field spread, then
    /// convert that cell radius to kilometers at the center latitude.
    ///
    /// Returns 0 when the walk never finds a decay edge, which the
    /// caller rejects via the minimum-radius bound.
    fn estimate_radius_km(
        &self,
        ssh_smooth: &[f32],
        grid: &Grid,
        j: usize,
        i: usize,
        ssh_std: f32,
    ) -> f64 {
        let (ny, nx) = grid.shape();
        let center = ssh_smooth[j * nx + i];
        if center.is_nan() || ssh_std.is_nan() {
            return 0.0;
        }

        for r in 2..self.config.max_radius_cells {
            if j < r || j + r >= ny || i < r || i + r >= nx {
                break;
            }
            let mut sum = 0.0f64;
            let mut count = 0usize;
            let mut holed = false;
            for jj in (j - r)..=(j + r) {
                for ii in (i - r)..=(i + r) {
                    let v = ssh_smooth[jj * nx + ii];
                    if v.is_nan() {
                        holed = true;
                    } else {
                        sum += v as f64;
                        count += 1;
                    }
                }
            }
            // A hole in the box means the ring straddles masked land;
            // keep walking rather than trusting a biased mean.
            if holed || count == 0 {
                continue;
            }
            let deviation = (sum / count as f64 - center as f64).abs();
            if deviation > (self.config.radius_decay_factor * ssh_std) as f64 {
                let lat = grid.lats()[j];
                return r as f64 * 111.0 * lat.to_radians().cos() * grid.lon_spacing();
            }
        }
        0.0
    }

    /// SSH local maxima above the high percentile and minima below the
    /// low percentile, spatially deduplicated.
    fn find_extrema(&self, ssh: &Grid) -> Vec<Feature> {
        let (ny, nx) = ssh.shape();
        let cfg = &self.config;
        let data = ssh.data();

        let maxed = field::window_max(data, ny, nx, cfg.extrema_window);
        let minned = field::window_min(data, ny, nx, cfg.extrema_window);
        let high = field::percentile(data, cfg.maxima_percentile);
        let low = field::percentile(data, cfg.minima_percentile);
        let (mean, std) = field::mean_std(data);

        let mut features = Vec::new();
        let mut processed = vec![false; ny * nx];
        let half = cfg.extrema_window / 2;

        for j in 0..ny {
            for i in 0..nx {
                let idx = j * nx + i;
                if processed[idx] {
                    continue;
                }
                let v = data[idx];
                if v.is_nan() {
                    continue;
                }

                let is_max = v == maxed[idx] && v > high;
                let is_min = v == minned[idx] && v < low;
                if !(is_max || is_min) {
                    continue;
                }

                mark_processed(&mut processed, ny, nx, j, i, half);

                let (lon, lat) = match ssh.coords(j, i) {
                    Some(c) => c,
                    None => continue,
                };
                let strength = if (v - mean).abs() > cfg.strong_sigma * std {
                    Strength::Strong
                } else {
                    Strength::Moderate
                };

                let feature = if is_max {
                    Feature::new(FeatureType::SshMaximum, Geometry::Point([lon, lat]))
                        .with_property("description", format!("High SSH: {:.2}m", v))
                        .with_property("display_text", format!("High SSH\n{:.2}m", v))
                } else {
                    Feature::new(FeatureType::SshMinimum, Geometry::Point([lon, lat]))
                        .with_property("description", format!("Low SSH: {:.2}m", v))
                        .with_property("display_text", format!("Low SSH\n{:.2}m", v))
                };
                features.push(
                    feature
                        .with_property("value", v as f64)
                        .with_property("strength", strength.as_str()),
                );
            }
        }
        features
    }

    /// Upwelling and downwelling zones: smoothed SSH beyond a threshold
    /// combined with a strong local gradient. The reported center is
    /// relocated to the smoothed-field extremum inside the neighborhood
    /// so a broad zone lands on its physical core.
    fn find_zones(&self, ssh: &Grid) -> Vec<Feature> {
        let (ny, nx) = ssh.shape();
        let cfg = &self.config;

        let smooth = field::gaussian_smooth(ssh.data(), ny, nx, cfg.zone_sigma);
        let (gy, gx) = field::gradient(ssh.data(), ny, nx);
        let grad_mag = field::magnitude(&gy, &gx);
        let grad_threshold = field::percentile(&grad_mag, cfg.zone_gradient_percentile);

        let mut features = Vec::new();
        for upwelling in [true, false] {
            let mut processed = vec![false; ny * nx];
            for j in 0..ny {
                for i in 0..nx {
                    let idx = j * nx + i;
                    if processed[idx] {
                        continue;
                    }
                    let s = smooth[idx];
                    if s.is_nan() || grad_mag[idx].is_nan() {
                        continue;
                    }
                    let in_zone = if upwelling {
                        s < -cfg.zone_threshold
                    } else {
                        s > cfg.zone_threshold
                    };
                    if !in_zone || !(grad_mag[idx] > grad_threshold) {
                        continue;
                    }

                    let (cj, ci) = relocate_center(&smooth, ny, nx, j, i, cfg.zone_window, upwelling);
                    mark_processed(&mut processed, ny, nx, j, i, cfg.zone_window / 2);

                    let (lon, lat) = match ssh.coords(cj, ci) {
                        Some(c) => c,
                        None => continue,
                    };
                    let ssh_value = ssh.get(cj, ci).unwrap_or(f32::NAN);
                    let strength = if ssh_value.abs() > cfg.zone_strong_threshold {
                        Strength::Strong
                    } else {
                        Strength::Moderate
                    };

                    let feature = if upwelling {
                        Feature::new(FeatureType::UpwellingZone, Geometry::Point([lon, lat]))
                            .with_property("description", format!("Upwelling Zone: {:.2}m", ssh_value))
                            .with_property("display_text", "Upwelling\nZone")
                    } else {
                        Feature::new(FeatureType::DownwellingZone, Geometry::Point([lon, lat]))
                            .with_property("description", format!("Downwelling Zone: {:.2}m", ssh_value))
                            .with_property("display_text", "Downwelling\nZone")
                    };
                    features.push(
                        feature
                            .with_property("ssh", ssh_value as f64)
                            .with_property("strength", strength.as_str()),
                    );
                }
            }
        }
        features
    }
}

/// Flag all cells within `half` of (j, i) as already emitted.
fn mark_processed(processed: &mut [bool], ny: usize, nx: usize, j: usize, i: usize, half: usize) {
    let j_start = j.saturating_sub(half);
    let i_start = i.saturating_sub(half);
    for jj in j_start..(j + half + 1).min(ny) {
        for ii in i_start..(i + half + 1).min(nx) {
            processed[jj * nx + ii] = true;
        }
    }
}

/// Find the smoothed-field extremum inside a window around (j, i).
fn relocate_center(
    smooth: &[f32],
    ny: usize,
    nx: usize,
    j: usize,
    i: usize,
    window: usize,
    minimum: bool,
) -> (usize, usize) {
    let half = window / 2;
    let mut best = (j, i);
    let mut best_value = smooth[j * nx + i];
    for jj in j.saturating_sub(half)..(j + half).min(ny) {
        for ii in i.saturating_sub(half)..(i + half).min(nx) {
            let v = smooth[jj * nx + ii];
            if v.is_nan() {
                continue;
            }
            if (minimum && v < best_value) || (!minimum && v > best_value) {
                best = (jj, ii);
                best_value = v;
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocean_common::Unit;

    fn axes(n: usize) -> Vec<f64> {
        (0..n).map(|k| k as f64 * 0.2).collect()
    }

    /// Radially symmetric SSH peak centered on (cj, ci), falling from
    /// `peak` toward roughly -0.2 at the edges.
    fn bump_field(n: usize, cj: usize, ci: usize, peak: f32) -> Vec<f32> {
        let mut data = Vec::with_capacity(n * n);
        for j in 0..n {
            for i in 0..n {
                let dj = j as f32 - cj as f32;
                let di = i as f32 - ci as f32;
                let r2 = dj * dj + di * di;
                data.push((peak + 0.2) * (-r2 / 8.0).exp() - 0.2);
            }
        }
        data
    }

    fn grid(n: usize, data: Vec<f32>) -> Grid {
        Grid::new(axes(n), axes(n), data, Unit::Meters).unwrap()
    }

    #[test]
    fn test_single_bump_yields_one_extremum() {
        let n = 12;
        let ssh = grid(n, bump_field(n, 6, 6, 1.0));
        let detector = FeatureDetector::default();
        let features = detector.detect(&ssh, None).unwrap();

        let maxima: Vec<_> = features
            .iter()
            .filter(|f| f.feature_type() == Some("ssh_maximum"))
            .collect();
        assert_eq!(maxima.len(), 1);
        match maxima[0].geometry {
            Geometry::Point([lon, lat]) => {
                assert!((lon - 6.0 * 0.2).abs() < 1e-9);
                assert!((lat - 6.0 * 0.2).abs() < 1e-9);
            }
            _ => panic!("extremum must be a point"),
        }
    }

    #[test]
    fn test_well_separated_bumps_yield_two_extrema() {
        let n = 30;
        let mut data = bump_field(n, 6, 6, 1.0);
        let other = bump_field(n, 23, 23, 1.0);
        for (a, b) in data.iter_mut().zip(other.iter()) {
            *a = a.max(*b);
        }
        let ssh = grid(n, data);
        let features = FeatureDetector::default().detect(&ssh, None).unwrap();

        let maxima = features
            .iter()
            .filter(|f| f.feature_type() == Some("ssh_maximum"))
            .count();
        assert_eq!(maxima, 2);
    }

    #[test]
    fn test_close_bumps_deduplicate_to_one() {
        let n = 30;
        let mut data = bump_field(n, 14, 14, 1.0);
        let other = bump_field(n, 14, 17, 0.9);
        for (a, b) in data.iter_mut().zip(other.iter()) {
            *a = a.max(*b);
        }
        let ssh = grid(n, data);
        let features = FeatureDetector::default().detect(&ssh, None).unwrap();

        let maxima = features
            .iter()
            .filter(|f| f.feature_type() == Some("ssh_maximum"))
            .count();
        assert_eq!(maxima, 1);
    }

    #[test]
    fn test_mostly_missing_field_is_empty_not_error() {
        let n = 10;
        let mut data = bump_field(n, 5, 5, 1.0);
        for v in data.iter_mut().take(60) {
            *v = f32::NAN;
        }
        let ssh = grid(n, data);
        let features = FeatureDetector::default().detect(&ssh, None).unwrap();
        assert!(features.is_empty());
    }

    #[test]
    fn test_anticyclonic_eddy_detected_at_rotational_center() {
        let n = 10;
        let (cj, ci) = (5, 5);
        let ssh = grid(n, bump_field(n, cj, ci, 1.0));

        // Solid-body rotation decaying outward: counter-clockwise in
        // index space, vorticity peaked at the center.
        let mut u_data = Vec::with_capacity(n * n);
        let mut v_data = Vec::with_capacity(n * n);
        for j in 0..n {
            for i in 0..n {
                let dj = j as f32 - cj as f32;
                let di = i as f32 - ci as f32;
                let taper = (-(dj * dj + di * di) / 8.0).exp();
                u_data.push(-dj * taper);
                v_data.push(di * taper);
            }
        }
        let u = grid(n, u_data);
        let v = grid(n, v_data);

        let features = FeatureDetector::default()
            .detect(&ssh, Some((&u, &v)))
            .unwrap();

        let eddy = features
            .iter()
            .find(|f| f.feature_type() == Some("anticyclonic_eddy"))
            .expect("anticyclonic eddy at the rotation center");
        match eddy.geometry {
            Geometry::Point([lon, lat]) => {
                assert!((lon - ci as f64 * 0.2).abs() < 1e-9);
                assert!((lat - cj as f64 * 0.2).abs() < 1e-9);
            }
            _ => panic!("eddy must be a point"),
        }
        let radius = eddy.properties["radius_km"].as_f64().unwrap();
        assert!(radius >= 10.0 && radius <= 75.0);
    }

    #[test]
    fn test_axis_mismatch_between_ssh_and_currents() {
        let ssh = grid(10, bump_field(10, 5, 5, 1.0));
        let u = grid(8, vec![0.0; 64]);
        let v = grid(8, vec![0.0; 64]);
        let err = FeatureDetector::default()
            .detect(&ssh, Some((&u, &v)))
            .unwrap_err();
        assert!(matches!(err, OceanError::AxisMismatch { .. }));
    }

    #[test]
    fn test_upwelling_zone_relocated_to_smoothed_minimum() {
        let n = 20;
        // Inverted bump: a deep depression well past the -0.5 threshold.
        let data: Vec<f32> = bump_field(n, 10, 10, 1.3).iter().map(|v| -v).collect();
        let ssh = grid(n, data);
        let features = FeatureDetector::default().detect(&ssh, None).unwrap();

        let zone = features
            .iter()
            .find(|f| f.feature_type() == Some("upwelling_zone"))
            .expect("depression should register as an upwelling zone");
        match zone.geometry {
            Geometry::Point([lon, lat]) => {
                assert!((lon - 10.0 * 0.2).abs() < 1e-9);
                assert!((lat - 10.0 * 0.2).abs() < 1e-9);
            }
            _ => panic!("zone must be a point"),
        }
        let strength = zone.properties["strength"].as_str().unwrap();
        assert_eq!(strength, "strong");
    }
}

//! NaN-aware operations on row-major 2-D fields.
//!
//! All functions treat NaN as a missing cell: statistics skip it,
//! smoothing renormalizes over the valid part of the kernel, and
//! filters propagate NaN only where no valid neighbor exists.

/// Separable Gaussian smoothing with valid-weight renormalization.
///
/// Kernel radius is `ceil(3σ)`. Cells with no valid neighbors stay NaN.
pub fn gaussian_smooth(data: &[f32], ny: usize, nx: usize, sigma: f64) -> Vec<f32> {
    if sigma <= 0.0 {
        return data.to_vec();
    }
    let radius = (3.0 * sigma).ceil() as isize;
    let mut kernel = Vec::with_capacity((2 * radius + 1) as usize);
    for k in -radius..=radius {
        kernel.push((-(k as f64).powi(2) / (2.0 * sigma * sigma)).exp() as f32);
    }

    // Horizontal pass.
    let mut tmp = vec![f32::NAN; ny * nx];
    for j in 0..ny {
        for i in 0..nx {
            let mut sum = 0.0f32;
            let mut weight = 0.0f32;
            for (ki, k) in (-radius..=radius).enumerate() {
                let ii = i as isize + k;
                if ii < 0 || ii >= nx as isize {
                    continue;
                }
                let v = data[j * nx + ii as usize];
                if v.is_nan() {
                    continue;
                }
                sum += v * kernel[ki];
                weight += kernel[ki];
            }
            if weight > 0.0 {
                tmp[j * nx + i] = sum / weight;
            }
        }
    }

    // Vertical pass.
    let mut out = vec![f32::NAN; ny * nx];
    for j in 0..ny {
        for i in 0..nx {
            let mut sum = 0.0f32;
            let mut weight = 0.0f32;
            for (ki, k) in (-radius..=radius).enumerate() {
                let jj = j as isize + k;
                if jj < 0 || jj >= ny as isize {
                    continue;
                }
                let v = tmp[jj as usize * nx + i];
                if v.is_nan() {
                    continue;
                }
                sum += v * kernel[ki];
                weight += kernel[ki];
            }
            if weight > 0.0 {
                out[j * nx + i] = sum / weight;
            }
        }
    }
    out
}

/// Finite-difference gradient along both axes in index space.
///
/// Centered differences in the interior, one-sided at the edges.
/// Returns `(d/drow, d/dcol)`.
pub fn gradient(data: &[f32], ny: usize, nx: usize) -> (Vec<f32>, Vec<f32>) {
    let mut dy = vec![f32::NAN; ny * nx];
    let mut dx = vec![f32::NAN; ny * nx];

    let at = |j: usize, i: usize| data[j * nx + i];

    for j in 0..ny {
        for i in 0..nx {
            // Row derivative.
            dy[j * nx + i] = if ny == 1 {
                0.0
            } else if j == 0 {
                at(1, i) - at(0, i)
            } else if j == ny - 1 {
                at(ny - 1, i) - at(ny - 2, i)
            } else {
                (at(j + 1, i) - at(j - 1, i)) / 2.0
            };

            // Column derivative.
            dx[j * nx + i] = if nx == 1 {
                0.0
            } else if i == 0 {
                at(j, 1) - at(j, 0)
            } else if i == nx - 1 {
                at(j, nx - 1) - at(j, nx - 2)
            } else {
                (at(j, i + 1) - at(j, i - 1)) / 2.0
            };
        }
    }
    (dy, dx)
}

/// Element-wise magnitude of two component fields.
pub fn magnitude(a: &[f32], b: &[f32]) -> Vec<f32> {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x * x + y * y).sqrt())
        .collect()
}

/// Sliding-window maximum filter of the given window size.
///
/// NaN cells are ignored within the window; a cell with no valid
/// neighbors stays NaN.
pub fn window_max(data: &[f32], ny: usize, nx: usize, window: usize) -> Vec<f32> {
    window_filter(data, ny, nx, window, true)
}

/// Sliding-window minimum filter of the given window size.
pub fn window_min(data: &[f32], ny: usize, nx: usize, window: usize) -> Vec<f32> {
    window_filter(data, ny, nx, window, false)
}

fn window_filter(data: &[f32], ny: usize, nx: usize, window: usize, max: bool) -> Vec<f32> {
    let half = (window.max(1) / 2) as isize;
    let mut out = vec![f32::NAN; ny * nx];
    for j in 0..ny {
        for i in 0..nx {
            let mut best = f32::NAN;
            for dj in -half..=half {
                for di in -half..=half {
                    let jj = j as isize + dj;
                    let ii = i as isize + di;
                    if jj < 0 || jj >= ny as isize || ii < 0 || ii >= nx as isize {
                        continue;
                    }
                    let v = data[jj as usize * nx + ii as usize];
                    if v.is_nan() {
                        continue;
                    }
                    if best.is_nan() || (max && v > best) || (!max && v < best) {
                        best = v;
                    }
                }
            }
            out[j * nx + i] = best;
        }
    }
    out
}

/// Percentile (0-100) over valid cells by sorted rank interpolation.
///
/// Returns NaN when no valid cells exist.
pub fn percentile(data: &[f32], q: f64) -> f32 {
    let mut valid: Vec<f32> = data.iter().copied().filter(|v| !v.is_nan()).collect();
    if valid.is_empty() {
        return f32::NAN;
    }
    valid.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = (q / 100.0).clamp(0.0, 1.0) * (valid.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        valid[lo]
    } else {
        let t = (rank - lo as f64) as f32;
        valid[lo] * (1.0 - t) + valid[hi] * t
    }
}

/// Mean and standard deviation over valid cells.
///
/// Returns (NaN, NaN) when no valid cells exist.
pub fn mean_std(data: &[f32]) -> (f32, f32) {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for &v in data {
        if !v.is_nan() {
            sum += v as f64;
            count += 1;
        }
    }
    if count == 0 {
        return (f32::NAN, f32::NAN);
    }
    let mean = sum / count as f64;
    let mut var = 0.0f64;
    for &v in data {
        if !v.is_nan() {
            var += (v as f64 - mean).powi(2);
        }
    }
    ((mean) as f32, (var / count as f64).sqrt() as f32)
}

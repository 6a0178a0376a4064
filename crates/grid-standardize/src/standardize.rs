//! Raw dataset standardization.
//!
//! Canonicalizes coordinate names, reduces non-spatial dimensions to
//! their first index (the single time step already requested from the
//! source), converts units once, and aligns multi-source grids.

use ocean_common::{
    DatasetKind, DatasetSource, Grid, OceanError, OceanResult, RawDataset, RawVariable, Unit,
};
use tracing::{debug, info};

const LON_NAMES: &[&str] = &["longitude", "lon"];
const LAT_NAMES: &[&str] = &["latitude", "lat"];

/// Standardized output of one dataset, ready for masking and detection.
#[derive(Debug, Clone)]
pub enum StandardizedData {
    /// A single scalar field (SST, chlorophyll).
    Scalar { field: Grid },
    /// Current components on a shared grid.
    Vector { u: Grid, v: Grid },
    /// Altimetry SSH merged with co-registered currents.
    Combined { ssh: Grid, u: Grid, v: Grid },
}

impl StandardizedData {
    /// The primary scalar field of this dataset (SSH for combined sources).
    pub fn primary(&self) -> Option<&Grid> {
        match self {
            StandardizedData::Scalar { field } => Some(field),
            StandardizedData::Combined { ssh, .. } => Some(ssh),
            StandardizedData::Vector { .. } => None,
        }
    }
}

/// Converts raw datasets into canonical [`Grid`]s.
#[derive(Debug, Default)]
pub struct Standardizer;

impl Standardizer {
    pub fn new() -> Self {
        Self
    }

    /// Standardize a single-source dataset.
    ///
    /// Combined sources need two raw files; use [`Standardizer::standardize_combined`].
    pub fn standardize(
        &self,
        raw: &RawDataset,
        source: &DatasetSource,
    ) -> OceanResult<StandardizedData> {
        match source.kind {
            DatasetKind::ScalarTemperature => {
                let var = required_variable(source, 0)?;
                let grid = extract_grid(raw, var, Unit::Celsius)?;
                let field = convert_temperature(&grid)?;
                info!(
                    dataset = %source.id,
                    shape = ?field.shape(),
                    "Standardized temperature field"
                );
                Ok(StandardizedData::Scalar { field })
            }
            DatasetKind::ScalarChlorophyll => {
                let var = required_variable(source, 0)?;
                let field = extract_grid(raw, var, Unit::MilligramsPerCubicMeter)?;
                info!(dataset = %source.id, shape = ?field.shape(), "Standardized chlorophyll field");
                Ok(StandardizedData::Scalar { field })
            }
            DatasetKind::VectorCurrent => {
                let u_var = required_variable(source, 0)?;
                let v_var = required_variable(source, 1)?;
                let u = extract_grid(raw, u_var, Unit::MetersPerSecond)?;
                let v = extract_grid(raw, v_var, Unit::MetersPerSecond)?;
                ensure_aligned(&u, u_var, &v, v_var)?;
                info!(dataset = %source.id, shape = ?u.shape(), "Standardized current components");
                Ok(StandardizedData::Vector { u, v })
            }
            DatasetKind::CombinedAltimetryCurrent => Err(OceanError::ConfigError(format!(
                "combined dataset '{}' requires standardize_combined",
                source.id
            ))),
        }
    }

    /// Standardize a combined altimetry + currents dataset.
    ///
    /// Both halves must land on identical coordinate axes; a mismatch is a
    /// hard error rather than a silent interpolation.
    pub fn standardize_combined(
        &self,
        altimetry: &RawDataset,
        currents: &RawDataset,
        source: &DatasetSource,
        companion: &DatasetSource,
    ) -> OceanResult<StandardizedData> {
        let ssh_var = required_variable(source, 0)?;
        let u_var = required_variable(companion, 0)?;
        let v_var = required_variable(companion, 1)?;

        let ssh = extract_grid(altimetry, ssh_var, Unit::Meters)?;
        let u = extract_grid(currents, u_var, Unit::MetersPerSecond)?;
        let v = extract_grid(currents, v_var, Unit::MetersPerSecond)?;

        ensure_aligned(&ssh, ssh_var, &u, u_var)?;
        ensure_aligned(&ssh, ssh_var, &v, v_var)?;

        info!(
            dataset = %source.id,
            companion = %companion.id,
            shape = ?ssh.shape(),
            "Merged altimetry and currents onto shared grid"
        );
        Ok(StandardizedData::Combined { ssh, u, v })
    }
}

fn required_variable<'a>(source: &'a DatasetSource, index: usize) -> OceanResult<&'a str> {
    source
        .variables
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| {
            OceanError::ConfigError(format!(
                "dataset '{}' is missing variable #{}",
                source.id, index
            ))
        })
}

/// Extract one variable as a canonical 2-D grid.
///
/// Non-spatial dimensions (time, depth, altitude, anything that is not the
/// latitude/longitude axis) are reduced by selecting index 0. The default
/// unit applies when the source carries no parseable unit attribute.
pub fn extract_grid(raw: &RawDataset, var_name: &str, default_unit: Unit) -> OceanResult<Grid> {
    let (lon_name, lons) = raw
        .find_coord(LON_NAMES)
        .ok_or_else(|| OceanError::MissingCoordinate("longitude".to_string()))?;
    let (lat_name, lats) = raw
        .find_coord(LAT_NAMES)
        .ok_or_else(|| OceanError::MissingCoordinate("latitude".to_string()))?;

    let var = raw.variable(var_name).ok_or_else(|| {
        OceanError::MalformedFile(format!("variable '{}' not found in raw dataset", var_name))
    })?;

    let data = reduce_to_2d(var, var_name, lat_name, lon_name, lats.len(), lons.len())?;
    let unit = var
        .units
        .as_deref()
        .and_then(Unit::parse)
        .unwrap_or(default_unit);

    Grid::new(lons.to_vec(), lats.to_vec(), data, unit)
}

/// Reduce a raw variable to (lat, lon) row-major data by selecting index 0
/// along every non-spatial dimension.
fn reduce_to_2d(
    var: &RawVariable,
    var_name: &str,
    lat_name: &str,
    lon_name: &str,
    nlat: usize,
    nlon: usize,
) -> OceanResult<Vec<f32>> {
    let lat_pos = var.dims.iter().position(|d| d == lat_name);
    let lon_pos = var.dims.iter().position(|d| d == lon_name);

    let (lat_pos, lon_pos) = match (lat_pos, lon_pos) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(OceanError::InvalidDimensionality {
                variable: var_name.to_string(),
                ndims: var.dims.len(),
            });
        }
    };

    if var.shape[lat_pos] != nlat || var.shape[lon_pos] != nlon {
        return Err(OceanError::AxisMismatch {
            left: format!("{} axes", var_name),
            left_len: var.shape[lat_pos] * var.shape[lon_pos],
            right: "coordinate axes".to_string(),
            right_len: nlat * nlon,
        });
    }

    // Row-major strides over the full raw shape.
    let mut strides = vec![1usize; var.shape.len()];
    for d in (0..var.shape.len().saturating_sub(1)).rev() {
        strides[d] = strides[d + 1] * var.shape[d + 1];
    }

    let reduced_dims = var.shape.len() - 2;
    if reduced_dims > 0 {
        debug!(
            variable = var_name,
            reduced = reduced_dims,
            "Reducing non-spatial dimensions to first index"
        );
    }

    // Index 0 along every non-spatial dimension contributes nothing to the
    // flat offset, so only the lat/lon strides matter.
    let mut out = vec![f32::NAN; nlat * nlon];
    for j in 0..nlat {
        for i in 0..nlon {
            let offset = j * strides[lat_pos] + i * strides[lon_pos];
            out[j * nlon + i] = var.data[offset];
        }
    }
    Ok(out)
}

/// Convert a temperature grid to Fahrenheit.
///
/// Idempotent: a grid already tagged Fahrenheit passes through unchanged.
pub fn convert_temperature(grid: &Grid) -> OceanResult<Grid> {
    if grid.unit() == Unit::Fahrenheit {
        debug!("Field already in °F, skipping conversion");
        return Ok(grid.clone());
    }
    if !grid.unit().is_temperature() {
        return Err(OceanError::ConfigError(format!(
            "cannot convert unit '{}' to °F",
            grid.unit()
        )));
    }

    let unit = grid.unit();
    let converted: Vec<f32> = grid
        .data()
        .iter()
        .map(|&v| {
            if v.is_nan() {
                f32::NAN
            } else {
                // Checked above that the unit is a temperature scale.
                unit.to_fahrenheit(v).unwrap_or(f32::NAN)
            }
        })
        .collect();

    grid.with_data(converted, Unit::Fahrenheit)
}

fn ensure_aligned(left: &Grid, left_name: &str, right: &Grid, right_name: &str) -> OceanResult<()> {
    if !left.axes_match(right) {
        return Err(OceanError::AxisMismatch {
            left: left_name.to_string(),
            left_len: left.nx() * left.ny(),
            right: right_name.to_string(),
            right_len: right.nx() * right.ny(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn raw_with(
        coords: Vec<(&str, Vec<f64>)>,
        variables: Vec<(&str, RawVariable)>,
    ) -> RawDataset {
        RawDataset {
            coords: coords
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<BTreeMap<_, _>>(),
            variables: variables
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn sst_source() -> DatasetSource {
        DatasetSource {
            id: "blended_sst".to_string(),
            name: "Blended SST".to_string(),
            kind: DatasetKind::ScalarTemperature,
            variables: vec!["analysed_sst".to_string()],
            lag_days: 1,
            companion: None,
        }
    }

    #[test]
    fn test_reduces_time_dimension_and_converts() {
        // 1 time step, 2x2 spatial grid, in Celsius.
        let raw = raw_with(
            vec![
                ("time", vec![0.0]),
                ("lat", vec![41.0, 41.5]),
                ("lon", vec![-71.0, -70.5]),
            ],
            vec![(
                "analysed_sst",
                RawVariable {
                    dims: vec!["time".to_string(), "lat".to_string(), "lon".to_string()],
                    shape: vec![1, 2, 2],
                    data: vec![0.0, 10.0, 20.0, 100.0],
                    units: Some("degree_C".to_string()),
                },
            )],
        );

        let out = Standardizer::new().standardize(&raw, &sst_source()).unwrap();
        let field = match out {
            StandardizedData::Scalar { field } => field,
            other => panic!("expected scalar output, got {:?}", other),
        };

        assert_eq!(field.unit(), Unit::Fahrenheit);
        assert_eq!(field.get(0, 0), Some(32.0));
        assert_eq!(field.get(0, 1), Some(50.0));
        assert_eq!(field.get(1, 1), Some(212.0));
    }

    #[test]
    fn test_unit_conversion_is_idempotent() {
        let grid = Grid::new(
            vec![0.0, 1.0],
            vec![0.0, 1.0],
            vec![32.0, 50.0, 68.0, 212.0],
            Unit::Fahrenheit,
        )
        .unwrap();

        let once = convert_temperature(&grid).unwrap();
        let twice = convert_temperature(&once).unwrap();
        assert_eq!(once.data(), twice.data());
        assert_eq!(twice.unit(), Unit::Fahrenheit);
    }

    #[test]
    fn test_missing_longitude_axis() {
        let raw = raw_with(
            vec![("lat", vec![41.0])],
            vec![(
                "analysed_sst",
                RawVariable {
                    dims: vec!["lat".to_string()],
                    shape: vec![1],
                    data: vec![1.0],
                    units: None,
                },
            )],
        );

        match Standardizer::new().standardize(&raw, &sst_source()) {
            Err(OceanError::MissingCoordinate(axis)) => assert_eq!(axis, "longitude"),
            other => panic!("expected MissingCoordinate, got {:?}", other),
        }
    }

    #[test]
    fn test_variable_without_spatial_dims() {
        let raw = raw_with(
            vec![
                ("lat", vec![41.0]),
                ("lon", vec![-71.0]),
                ("time", vec![0.0, 1.0]),
            ],
            vec![(
                "analysed_sst",
                RawVariable {
                    dims: vec!["time".to_string()],
                    shape: vec![2],
                    data: vec![1.0, 2.0],
                    units: None,
                },
            )],
        );

        assert!(matches!(
            Standardizer::new().standardize(&raw, &sst_source()),
            Err(OceanError::InvalidDimensionality { .. })
        ));
    }

    #[test]
    fn test_combined_axis_mismatch_is_hard_error() {
        let altimetry = raw_with(
            vec![("lat", vec![41.0, 41.5]), ("lon", vec![-71.0, -70.5])],
            vec![(
                "sea_surface_height",
                RawVariable {
                    dims: vec!["lat".to_string(), "lon".to_string()],
                    shape: vec![2, 2],
                    data: vec![0.1, 0.2, 0.3, 0.4],
                    units: Some("m".to_string()),
                },
            )],
        );
        // Currents on a 3-wide longitude axis: cannot be merged.
        let currents = raw_with(
            vec![
                ("lat", vec![41.0, 41.5]),
                ("lon", vec![-71.0, -70.5, -70.0]),
            ],
            vec![
                (
                    "u_current",
                    RawVariable {
                        dims: vec!["lat".to_string(), "lon".to_string()],
                        shape: vec![2, 3],
                        data: vec![0.0; 6],
                        units: Some("m s-1".to_string()),
                    },
                ),
                (
                    "v_current",
                    RawVariable {
                        dims: vec!["lat".to_string(), "lon".to_string()],
                        shape: vec![2, 3],
                        data: vec![0.0; 6],
                        units: Some("m s-1".to_string()),
                    },
                ),
            ],
        );

        let source = DatasetSource {
            id: "ocean_dynamics".to_string(),
            name: "Ocean Dynamics".to_string(),
            kind: DatasetKind::CombinedAltimetryCurrent,
            variables: vec!["sea_surface_height".to_string()],
            lag_days: 1,
            companion: Some("blended_currents".to_string()),
        };
        let companion = DatasetSource {
            id: "blended_currents".to_string(),
            name: "Blended Currents".to_string(),
            kind: DatasetKind::VectorCurrent,
            variables: vec!["u_current".to_string(), "v_current".to_string()],
            lag_days: 1,
            companion: None,
        };

        assert!(matches!(
            Standardizer::new().standardize_combined(&altimetry, &currents, &source, &companion),
            Err(OceanError::AxisMismatch { .. })
        ));
    }
}

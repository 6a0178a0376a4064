//! Physical units carried by grid fields.
//!
//! Every [`crate::Grid`] records its unit so conversions happen exactly once:
//! converting a field that is already in the target unit is a no-op.

use serde::{Deserialize, Serialize};

/// Unit tag for a grid field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Celsius,
    Kelvin,
    Fahrenheit,
    /// SSH and other height fields.
    Meters,
    /// Current components.
    MetersPerSecond,
    /// Chlorophyll concentration.
    MilligramsPerCubicMeter,
    Dimensionless,
}

impl Unit {
    /// Short label for display and serialized output.
    pub fn label(&self) -> &'static str {
        match self {
            Unit::Celsius => "°C",
            Unit::Kelvin => "K",
            Unit::Fahrenheit => "°F",
            Unit::Meters => "m",
            Unit::MetersPerSecond => "m/s",
            Unit::MilligramsPerCubicMeter => "mg/m³",
            Unit::Dimensionless => "",
        }
    }

    /// Parse a unit tag from the attribute strings seen in source files.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "c" | "celsius" | "degree_c" | "degrees_c" | "°c" => Some(Unit::Celsius),
            "k" | "kelvin" => Some(Unit::Kelvin),
            "f" | "fahrenheit" | "degree_f" | "°f" => Some(Unit::Fahrenheit),
            "m" | "meter" | "meters" => Some(Unit::Meters),
            "m/s" | "m s-1" | "meters_per_second" => Some(Unit::MetersPerSecond),
            "mg/m3" | "mg m-3" | "mg/m^3" | "mg/m³" => Some(Unit::MilligramsPerCubicMeter),
            "" | "1" | "none" => Some(Unit::Dimensionless),
            _ => None,
        }
    }

    /// Whether this unit is a temperature scale.
    pub fn is_temperature(&self) -> bool {
        matches!(self, Unit::Celsius | Unit::Kelvin | Unit::Fahrenheit)
    }

    /// Convert a single value from this unit to Fahrenheit.
    ///
    /// Returns `None` for non-temperature units.
    pub fn to_fahrenheit(&self, value: f32) -> Option<f32> {
        match self {
            Unit::Celsius => Some(value * 1.8 + 32.0),
            Unit::Kelvin => Some((value - 273.15) * 1.8 + 32.0),
            Unit::Fahrenheit => Some(value),
            _ => None,
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

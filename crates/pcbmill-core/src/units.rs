//! Unit conversion utilities
//!
//! Handles conversion between Metric (mm) and Imperial (inch) systems.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Millimetres per inch.
pub const MM_PER_INCH: f64 = 25.4;

/// Measurement system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementSystem {
    /// Metric system (mm)
    Metric,
    /// Imperial system (inches)
    Imperial,
}

impl Default for MeasurementSystem {
    fn default() -> Self {
        Self::Metric
    }
}

impl fmt::Display for MeasurementSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metric => write!(f, "Metric"),
            Self::Imperial => write!(f, "Imperial"),
        }
    }
}

impl FromStr for MeasurementSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "metric" | "mm" => Ok(Self::Metric),
            "imperial" | "inch" | "in" => Ok(Self::Imperial),
            _ => Err(format!("Unknown measurement system: {}", s)),
        }
    }
}

impl MeasurementSystem {
    /// Pick a system from a metric flag
    pub fn from_metric(metric: bool) -> Self {
        if metric {
            Self::Metric
        } else {
            Self::Imperial
        }
    }

    /// Whether lengths in this system are millimetres
    pub fn is_metric(self) -> bool {
        self == Self::Metric
    }

    /// Length of one unit of this system in millimetres
    pub fn mm_per_unit(self) -> f64 {
        match self {
            Self::Metric => 1.0,
            Self::Imperial => MM_PER_INCH,
        }
    }

    /// Factor that converts a length in `self` into a length in `target`
    pub fn conversion_factor(self, target: MeasurementSystem) -> f64 {
        self.mm_per_unit() / target.mm_per_unit()
    }
}

/*!
 * Memory Units
 * Byte count conversion to the configured display unit
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Display unit for memory columns (binary multiples)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MemoryUnit {
    B,
    KB,
    #[default]
    MB,
    GB,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown memory unit '{0}' (expected B, KB, MB or GB)")]
pub struct UnknownUnit(pub String);

impl MemoryUnit {
    /// Bytes per unit
    pub const fn factor(self) -> u64 {
        match self {
            Self::B => 1,
            Self::KB => 1024,
            Self::MB => 1024 * 1024,
            Self::GB => 1024 * 1024 * 1024,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::B => "B",
            Self::KB => "KB",
            Self::MB => "MB",
            Self::GB => "GB",
        }
    }

    /// Convert a byte count, rounded to two decimals
    pub fn convert(self, bytes: u64) -> f64 {
        if bytes == 0 {
            return 0.0;
        }
        round2(bytes as f64 / self.factor() as f64)
    }

    /// Inverse of [`convert`](Self::convert), up to its rounding
    pub fn to_bytes(self, value: f64) -> f64 {
        value * self.factor() as f64
    }
}

impl fmt::Display for MemoryUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MemoryUnit {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "B" => Ok(Self::B),
            "KB" => Ok(Self::KB),
            "MB" => Ok(Self::MB),
            "GB" => Ok(Self::GB),
            _ => Err(UnknownUnit(s.to_string())),
        }
    }
}

impl TryFrom<String> for MemoryUnit {
    type Error = UnknownUnit;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MemoryUnit> for String {
    fn from(unit: MemoryUnit) -> Self {
        unit.label().to_string()
    }
}

/// Round to two decimal places
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

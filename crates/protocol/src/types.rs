//! Sensor value types
//!
//! This module defines the typed values extracted from the Yocto-Meteo
//! packet stream and the reading aggregate exposed to callers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sensor subtype code carried in the first byte of a stream-3 record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    /// Temperature in degrees Celsius (code 1)
    Temperature,
    /// Barometric pressure in hPa (code 2)
    Pressure,
    /// Relative humidity in percent (code 3)
    Humidity,
}

impl SensorKind {
    /// Map a subtype code to a sensor kind
    ///
    /// Returns `None` for codes the device uses for other functions.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Temperature),
            0x02 => Some(Self::Pressure),
            0x03 => Some(Self::Humidity),
            _ => None,
        }
    }

    /// Wire code of this kind
    pub fn code(self) -> u8 {
        match self {
            Self::Temperature => 0x01,
            Self::Pressure => 0x02,
            Self::Humidity => 0x03,
        }
    }
}

/// A single decoded measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub kind: SensorKind,
    pub value: f64,
}

/// Latest environment values
///
/// Each field is updated independently whenever a record of the matching
/// kind is decoded. Fields stay at `0.0` until their first update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Temperature (°C)
    pub temperature: f64,
    /// Relative humidity (%)
    pub humidity: f64,
    /// Pressure (hPa)
    pub pressure: f64,
}

impl SensorReading {
    /// Store a sample in the field matching its kind
    pub fn apply(&mut self, sample: Sample) {
        match sample.kind {
            SensorKind::Temperature => self.temperature = sample.value,
            SensorKind::Pressure => self.pressure = sample.value,
            SensorKind::Humidity => self.humidity = sample.value,
        }
    }

    /// Value of the field matching `kind`
    pub fn get(&self, kind: SensorKind) -> f64 {
        match kind {
            SensorKind::Temperature => self.temperature,
            SensorKind::Pressure => self.pressure,
            SensorKind::Humidity => self.humidity,
        }
    }
}

/// Formats as `temperature,humidity,pressure` with 1, 0 and 0 decimals
impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.1},{:.0},{:.0}",
            self.temperature, self.humidity, self.pressure
        )
    }
}

//! State shared between the worker thread and its callers
//!
//! The worker is the only writer. Readers take lock-free snapshots at any
//! time; each field is last-writer-wins and nothing ties the three readings
//! together.

use protocol::{Sample, SensorKind, SensorReading};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

/// Connection lifecycle of the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum DriverState {
    /// No worker is running
    Stopped = 0,
    /// Worker running, no initialized device
    Disconnected = 1,
    /// Worker running and reading from the device
    Connected = 2,
}

impl DriverState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Disconnected,
            2 => Self::Connected,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Atomic wrapper for f64 values.
/// Uses AtomicU64 with bit reinterpretation.
#[derive(Debug)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(val: f64) -> Self {
        Self(AtomicU64::new(val.to_bits()))
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    fn store(&self, val: f64) {
        self.0.store(val.to_bits(), Ordering::Release);
    }
}

/// Readings, connectivity and stop flag of one driver
#[derive(Debug)]
pub struct SharedState {
    temperature: AtomicF64,
    humidity: AtomicF64,
    pressure: AtomicF64,
    connected: AtomicBool,
    state: AtomicU8,
    stop: AtomicBool,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            temperature: AtomicF64::new(0.0),
            humidity: AtomicF64::new(0.0),
            pressure: AtomicF64::new(0.0),
            connected: AtomicBool::new(false),
            state: AtomicU8::new(DriverState::Stopped as u8),
            stop: AtomicBool::new(false),
        }
    }

    /// Snapshot of the latest readings
    pub fn reading(&self) -> SensorReading {
        SensorReading {
            temperature: self.temperature.load(),
            humidity: self.humidity.load(),
            pressure: self.pressure.load(),
        }
    }

    /// Publish one decoded sample
    pub fn apply(&self, sample: Sample) {
        let slot = match sample.kind {
            SensorKind::Temperature => &self.temperature,
            SensorKind::Humidity => &self.humidity,
            SensorKind::Pressure => &self.pressure,
        };
        slot.store(sample.value);
    }

    pub fn reset_reading(&self) {
        self.temperature.store(0.0);
        self.humidity.store(0.0);
        self.pressure.store(0.0);
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Update connectivity and the matching running state together
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
        let state = if connected {
            DriverState::Connected
        } else {
            DriverState::Disconnected
        };
        self.set_state(state);
    }

    pub fn state(&self) -> DriverState {
        DriverState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: DriverState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Ask the worker to stop
    ///
    /// Returns `true` only for the request that actually raised the flag.
    pub fn request_stop(&self) -> bool {
        !self.stop.swap(true, Ordering::AcqRel)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let shared = SharedState::new();
        assert_eq!(shared.state(), DriverState::Stopped);
        assert!(!shared.connected());
        assert!(!shared.stop_requested());
        assert_eq!(shared.reading(), SensorReading::default());
    }

    #[test]
    fn test_apply_updates_one_field() {
        let shared = SharedState::new();
        shared.apply(Sample {
            kind: SensorKind::Pressure,
            value: 1013.25,
        });

        let reading = shared.reading();
        assert_eq!(reading.pressure, 1013.25);
        assert_eq!(reading.temperature, 0.0);
        assert_eq!(reading.humidity, 0.0);

        shared.reset_reading();
        assert_eq!(shared.reading(), SensorReading::default());
    }

    #[test]
    fn test_negative_and_fractional_values_survive() {
        let shared = SharedState::new();
        shared.apply(Sample {
            kind: SensorKind::Temperature,
            value: -12.375,
        });
        assert_eq!(shared.reading().temperature, -12.375);
    }

    #[test]
    fn test_set_connected_tracks_state() {
        let shared = SharedState::new();
        shared.set_connected(true);
        assert_eq!(shared.state(), DriverState::Connected);
        shared.set_connected(false);
        assert_eq!(shared.state(), DriverState::Disconnected);
        assert_eq!(shared.state().to_string(), "disconnected");
    }

    #[test]
    fn test_request_stop_reports_first_request() {
        let shared = SharedState::new();
        assert!(shared.request_stop());
        assert!(!shared.request_stop());
        assert!(shared.stop_requested());
    }
}

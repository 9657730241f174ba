//! Driver worker thread
//!
//! Dedicated thread owning the device session. Each iteration either reads
//! one packet (connected) or attempts a connect (disconnected), then pauses
//! for whatever the outcome asks for. Pauses are cut into short slices so a
//! stop request is seen quickly.

use crate::config::DriverSettings;
use crate::driver::state::{DriverState, SharedState};
use crate::error::{MeteoError, Result};
use crate::usb::{ConnectOutcome, SensorSession};
use protocol::{RawPacket, records};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Longest uninterrupted sleep of the worker
pub const PAUSE_SLICE: Duration = Duration::from_millis(50);

/// Connect/read state machine run by the worker thread
pub struct DriverLoop {
    session: Box<dyn SensorSession>,
    shared: Arc<SharedState>,
    settings: DriverSettings,
}

impl DriverLoop {
    pub fn new(
        session: Box<dyn SensorSession>,
        shared: Arc<SharedState>,
        settings: DriverSettings,
    ) -> Self {
        Self {
            session,
            shared,
            settings,
        }
    }

    /// Run one iteration of the loop body
    ///
    /// Returns the pause to take before the next iteration, if any.
    pub fn step(&mut self) -> Option<Duration> {
        if self.shared.connected() {
            self.poll()
        } else {
            self.reconnect()
        }
    }

    fn poll(&mut self) -> Option<Duration> {
        match self.session.read(self.settings.read_timeout) {
            Ok(Some(packet)) => {
                self.process(&packet);
                None
            }
            Ok(None) => {
                trace!("No data within {:?}", self.settings.read_timeout);
                None
            }
            Err(e) => {
                error!("Error reading from device: {}", e);
                self.shared.set_connected(false);
                self.session.release();
                Some(self.settings.connect_backoff)
            }
        }
    }

    fn reconnect(&mut self) -> Option<Duration> {
        match self.session.connect() {
            Ok(ConnectOutcome::Connected) => {
                self.shared.set_connected(true);
                info!("Device connected, streaming sensor data");
                Some(self.settings.connect_settle)
            }
            Ok(ConnectOutcome::NotFound) => {
                self.shared.set_connected(false);
                Some(self.settings.connect_settle)
            }
            Err(e) => {
                // The session already dropped its handle
                error!("Connection to device failed: {}", e);
                self.shared.set_connected(false);
                Some(self.settings.connect_backoff)
            }
        }
    }

    /// Decode one packet and publish its sensor values
    fn process(&self, packet: &RawPacket) {
        for record in records(packet) {
            let Some(result) = record.sample() else {
                if record.is_sensor() {
                    trace!(
                        "Skipping unknown subtype {:?} at offset {}",
                        record.subtype(),
                        record.offset
                    );
                }
                continue;
            };

            match result {
                Ok(sample) => {
                    debug!(
                        pktno = record.packet_no,
                        stream = record.stream,
                        size = record.size,
                        subtype = record.subtype().unwrap_or_default(),
                        value = sample.value,
                        "Decoded {:?}",
                        sample.kind
                    );
                    self.shared.apply(sample);
                }
                Err(e) => {
                    warn!("Dropping record at offset {}: {}", record.offset, e);
                }
            }
        }
    }

    /// Sleep for `duration` unless a stop is requested first
    fn pause(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while !self.shared.stop_requested() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(PAUSE_SLICE.min(deadline - now));
        }
    }

    /// Run until a stop is requested, then clean up
    ///
    /// Cleanup also runs when the stop was requested before the first
    /// iteration.
    pub fn run(mut self) {
        info!("Driver worker started");

        while !self.shared.stop_requested() {
            if let Some(pause) = self.step() {
                self.pause(pause);
            }
        }

        self.shutdown();
        info!("Driver worker stopped");
    }

    fn shutdown(&mut self) {
        self.session.release();
        self.shared.set_connected(false);
        self.shared.reset_reading();
        self.shared.set_state(DriverState::Stopped);
    }

    /// Spawn the worker thread
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("meteo-worker".to_string())
            .spawn(move || self.run())
            .map_err(MeteoError::Spawn)
    }
}

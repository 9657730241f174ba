//! Scoped driver lifecycle
//!
//! [`MeteoGuard`] starts a driver, blocks until the device is connected and
//! stops the driver again when it goes out of scope. [`Driver::run_scoped`]
//! is the closure form of the same thing.

use crate::config::StartupSettings;
use crate::driver::Driver;
use crate::error::{MeteoError, Result};
use std::ops::Deref;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A started driver that is connected to the device
///
/// Dropping the guard requests a stop and waits for the worker to clean up.
/// During a panic it only requests the stop.
pub struct MeteoGuard {
    driver: Driver,
}

impl MeteoGuard {
    /// Start `driver` and wait for its first connection
    ///
    /// Polls every `startup.poll_interval`. When `startup.connect_timeout`
    /// elapses first, the worker is told to stop and
    /// [`MeteoError::StartupTimeout`] is returned without waiting for it.
    /// A stop requested by someone else during the wait yields
    /// [`MeteoError::Cancelled`].
    pub fn start(mut driver: Driver, startup: &StartupSettings) -> Result<Self> {
        driver.start()?;

        let started = Instant::now();
        debug!(
            "Waiting for device connection (timeout: {:?})",
            startup.connect_timeout
        );

        loop {
            if driver.connected() {
                info!("Device connected after {:?}", started.elapsed());
                return Ok(Self { driver });
            }

            if driver.stop_requested() {
                driver.detach_worker();
                return Err(MeteoError::Cancelled);
            }

            if !driver.is_running() {
                // The worker only exits on its own by panicking
                driver.join()?;
                return Err(MeteoError::WorkerPanicked);
            }

            if let Some(timeout) = startup.connect_timeout
                && started.elapsed() >= timeout
            {
                warn!("No device connection within {:?}", timeout);
                driver.request_stop();
                driver.detach_worker();
                return Err(MeteoError::StartupTimeout(timeout));
            }

            std::thread::sleep(startup.poll_interval);
        }
    }

    /// Stop the driver and wait for the worker to finish cleanup
    pub fn finish(mut self) -> Result<()> {
        self.driver.stop()
    }

    /// Stop the driver without waiting for the worker
    pub fn abandon(mut self) {
        self.driver.request_stop();
        self.driver.detach_worker();
    }
}

impl Deref for MeteoGuard {
    type Target = Driver;

    fn deref(&self) -> &Driver {
        &self.driver
    }
}

impl Driver {
    /// Start the driver and wait for the device, see [`MeteoGuard::start`]
    pub fn start_guarded(self, startup: &StartupSettings) -> Result<MeteoGuard> {
        MeteoGuard::start(self, startup)
    }

    /// Run `f` against a connected driver, then stop it
    ///
    /// When `f` succeeds the worker is joined before returning. When it
    /// fails or panics the stop is requested and the error propagates
    /// without waiting for the worker.
    pub fn run_scoped<T, E, F>(self, startup: &StartupSettings, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Driver) -> std::result::Result<T, E>,
        E: From<MeteoError>,
    {
        let guard = self.start_guarded(startup)?;

        match f(&guard) {
            Ok(value) => {
                guard.finish()?;
                Ok(value)
            }
            Err(e) => {
                guard.abandon();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriverSettings;
    use crate::usb::{MockConnect, MockSession};
    use std::time::Duration;

    fn startup(timeout_ms: Option<u64>) -> StartupSettings {
        StartupSettings {
            connect_timeout: timeout_ms.map(Duration::from_millis),
            poll_interval: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_guard_derefs_to_driver() {
        let session = MockSession::new().connect_fallback(MockConnect::Connected);
        let driver = Driver::with_session(session, DriverSettings::default());

        let guard = MeteoGuard::start(driver, &startup(Some(5_000))).unwrap();
        assert!(guard.connected());
        assert_eq!(guard.envstr(), "0.0,0,0");
        guard.finish().unwrap();
    }

    #[test]
    fn test_cancelled_while_waiting() {
        let driver = Driver::with_session(MockSession::new(), DriverSettings::default());
        let monitor = driver.monitor();

        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            monitor.request_stop();
        });

        let err = MeteoGuard::start(driver, &startup(None)).err().unwrap();
        assert!(matches!(err, MeteoError::Cancelled));
        stopper.join().unwrap();
    }
}

//! Driver state machine
//!
//! [`Driver`] owns one device session and, once started, the worker thread
//! that runs the connect/read loop on it. Callers query the latest values
//! through lock-free snapshots while the worker keeps them current.
//!
//! ```text
//!            start()              connect ok
//! Stopped ─────────────▶ Disconnected ─────────▶ Connected
//!    ▲                     ▲     │ not found /       │
//!    │   stop + loop exit  │     │ error (retry)     │ read error
//!    └─────────────────────┴─────┘◀──────────────────┘
//! ```

pub mod state;
pub mod worker;

pub use state::{DriverState, SharedState};
pub use worker::{DriverLoop, PAUSE_SLICE};

use crate::config::DriverSettings;
use crate::error::{MeteoError, Result};
use crate::usb::{SensorSession, UsbSession};
use protocol::SensorReading;
use serde::Serialize;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{info, warn};

/// Snapshot of a driver for reporting
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeteoStatus {
    pub state: DriverState,
    pub connected: bool,
    pub reading: SensorReading,
}

/// Cloneable view of a running driver
///
/// Lets other threads watch the readings or ask for a stop without owning
/// the driver.
#[derive(Debug, Clone)]
pub struct DriverMonitor {
    shared: Arc<SharedState>,
}

impl DriverMonitor {
    pub fn connected(&self) -> bool {
        self.shared.connected()
    }

    pub fn reading(&self) -> SensorReading {
        self.shared.reading()
    }

    pub fn state(&self) -> DriverState {
        self.shared.state()
    }

    pub fn envstr(&self) -> String {
        envstr(&self.shared)
    }

    pub fn status(&self) -> MeteoStatus {
        status(&self.shared)
    }

    /// Ask the worker to stop; `true` if this was the first request
    pub fn request_stop(&self) -> bool {
        request_stop(&self.shared)
    }

    pub fn stop_requested(&self) -> bool {
        self.shared.stop_requested()
    }
}

/// Yocto-Meteo driver
///
/// Dropping a started driver requests a stop and waits for the worker,
/// except while the current thread is panicking.
pub struct Driver {
    shared: Arc<SharedState>,
    /// Handed to the worker on start
    session: Option<Box<dyn SensorSession>>,
    settings: DriverSettings,
    worker: Option<JoinHandle<()>>,
}

impl Driver {
    /// Driver talking to real hardware through libusb
    pub fn new(settings: DriverSettings) -> Self {
        Self::with_session(UsbSession::new(settings.clone()), settings)
    }

    /// Driver over any session implementation
    pub fn with_session<S>(session: S, settings: DriverSettings) -> Self
    where
        S: SensorSession + 'static,
    {
        Self {
            shared: Arc::new(SharedState::new()),
            session: Some(Box::new(session)),
            settings,
            worker: None,
        }
    }

    /// Spawn the worker thread
    ///
    /// A driver runs at most once.
    pub fn start(&mut self) -> Result<()> {
        let session = self.session.take().ok_or(MeteoError::AlreadyStarted)?;
        self.shared.set_state(DriverState::Disconnected);

        let worker = DriverLoop::new(session, Arc::clone(&self.shared), self.settings.clone());
        match worker.spawn() {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.set_state(DriverState::Stopped);
                Err(e)
            }
        }
    }

    pub fn connected(&self) -> bool {
        self.shared.connected()
    }

    /// Readings as `temperature,humidity,pressure`, or `n/a` when disconnected
    pub fn envstr(&self) -> String {
        envstr(&self.shared)
    }

    pub fn reading(&self) -> SensorReading {
        self.shared.reading()
    }

    pub fn state(&self) -> DriverState {
        self.shared.state()
    }

    pub fn status(&self) -> MeteoStatus {
        status(&self.shared)
    }

    pub fn monitor(&self) -> DriverMonitor {
        DriverMonitor {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Ask the worker to stop; `true` if this was the first request
    pub fn request_stop(&self) -> bool {
        request_stop(&self.shared)
    }

    pub fn stop_requested(&self) -> bool {
        self.shared.stop_requested()
    }

    /// Whether the worker thread is alive
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait for the worker thread to exit
    ///
    /// Does not request a stop by itself.
    pub fn join(&mut self) -> Result<()> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };

        if handle.join().is_err() {
            self.shared.set_connected(false);
            self.shared.set_state(DriverState::Stopped);
            return Err(MeteoError::WorkerPanicked);
        }
        Ok(())
    }

    /// Request a stop and wait for the worker
    pub fn stop(&mut self) -> Result<()> {
        self.request_stop();
        self.join()
    }

    /// Let the worker finish on its own
    pub(crate) fn detach_worker(&mut self) {
        // Dropping a JoinHandle detaches the thread
        self.worker.take();
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        if self.worker.is_none() {
            return;
        }

        self.request_stop();
        if std::thread::panicking() {
            self.detach_worker();
            return;
        }
        if let Err(e) = self.join() {
            warn!("Driver worker ended abnormally: {}", e);
        }
    }
}

fn envstr(shared: &SharedState) -> String {
    if !shared.connected() {
        return "n/a".to_string();
    }
    shared.reading().to_string()
}

fn status(shared: &SharedState) -> MeteoStatus {
    MeteoStatus {
        state: shared.state(),
        connected: shared.connected(),
        reading: shared.reading(),
    }
}

fn request_stop(shared: &SharedState) -> bool {
    let first = shared.request_stop();
    if first {
        info!("Driver stop requested");
    }
    first
}

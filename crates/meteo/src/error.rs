//! Driver error types

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the device session and the driver lifecycle
///
/// Transport errors (`Usb`, `ShortWrite`, `NotConnected`) never leave the
/// worker loop; they are mapped to a disconnect and a retry. Only the
/// lifecycle variants reach callers.
#[derive(Debug, Error)]
pub enum MeteoError {
    /// Error reported by libusb
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    /// A command was not written in full
    #[error("Short write on endpoint {endpoint:#04x}: {written} of {expected} bytes")]
    ShortWrite {
        endpoint: u8,
        written: usize,
        expected: usize,
    },

    /// An operation needed an open device handle
    #[error("Device not connected")]
    NotConnected,

    /// The device did not connect within the startup timeout
    #[error("Timeout waiting for USB connection after {0:?}")]
    StartupTimeout(Duration),

    /// Stop was requested while waiting for the first connection
    #[error("Stopped before the device connected")]
    Cancelled,

    /// `start` was called on a driver that already ran
    #[error("Driver already started")]
    AlreadyStarted,

    /// The worker thread could not be spawned
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The worker thread panicked
    #[error("Worker thread panicked")]
    WorkerPanicked,
}

impl MeteoError {
    /// Whether this error comes from the USB transport
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Usb(_) | Self::ShortWrite { .. } | Self::NotConnected
        )
    }
}

/// Type alias for driver results
pub type Result<T> = std::result::Result<T, MeteoError>;

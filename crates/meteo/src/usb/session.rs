//! Device session seam
//!
//! The driver loop only sees this trait. Outcomes the loop must tell apart
//! are explicit values; everything in `Err` breaks the connection.

use crate::error::Result;
use protocol::RawPacket;
use std::time::Duration;

/// Result of a completed connect attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The device was found and initialized
    Connected,
    /// No matching device is plugged in
    NotFound,
}

/// A session owning at most one open device handle
pub trait SensorSession: Send {
    /// Open and initialize the device
    ///
    /// Any handle still held is released first. A missing device is not an
    /// error. On `Err` the session holds no handle.
    fn connect(&mut self) -> Result<ConnectOutcome>;

    /// Read one packet from the sensor stream
    ///
    /// `Ok(None)` means the read timed out with no data.
    fn read(&mut self, timeout: Duration) -> Result<Option<RawPacket>>;

    /// Dispose of the handle and mark the session disconnected
    ///
    /// Safe to call without a handle.
    fn release(&mut self);

    /// Whether the session holds an initialized device
    fn is_connected(&self) -> bool;
}

//! USB subsystem
//!
//! Owns the connection to the Yocto-Meteo.
//!
//! This module implements the transport side of the driver:
//! - The [`SensorSession`] seam the driver loop talks to
//! - [`UsbSession`], the libusb-backed session (enumerate, detach, reset,
//!   drain, initialize, read, release)
//! - [`MockSession`], a scripted session for tests and dry runs
//!
//! All session methods block. They are only ever called from the driver's
//! worker thread.

pub mod device;
pub mod mock;
pub mod session;

pub use device::UsbSession;
pub use mock::{MockConnect, MockRead, MockSession, MockStats};
pub use session::{ConnectOutcome, SensorSession};

//! Yocto-Meteo USB driver
//!
//! Keeps a connection to one Yocto-Meteo sensor on a background thread,
//! reconnecting whenever the device goes away, and exposes the latest
//! temperature, humidity and pressure readings.
//!
//! # Example
//!
//! ```no_run
//! use meteo::{Driver, MeteoConfig};
//!
//! let config = MeteoConfig::load_or_default();
//! let driver = Driver::new(config.driver.clone());
//!
//! let line = driver.run_scoped(&config.startup, |driver| {
//!     std::thread::sleep(std::time::Duration::from_secs(10));
//!     Ok::<_, meteo::MeteoError>(driver.envstr())
//! })?;
//! println!("{line}");
//! # Ok::<(), meteo::MeteoError>(())
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod guard;
pub mod usb;

pub use config::{DriverSettings, MeteoConfig, OutputSettings, StartupSettings};
pub use driver::{Driver, DriverMonitor, DriverState, MeteoStatus};
pub use error::{MeteoError, Result};
pub use guard::MeteoGuard;

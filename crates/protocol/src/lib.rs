//! Packet protocol for the Yocto-Meteo USB sensor
//!
//! This crate describes the wire side of the device: its USB identity, the
//! fixed command messages written on connect, and the decoder for the
//! 64-byte packets it streams on the bulk IN endpoint.
//!
//! # Example
//!
//! ```
//! use protocol::{SensorKind, SensorReading, samples};
//!
//! let mut packet = [0u8; 64];
//! // stream 3, size 5: subtype 1 (temperature) + "21.5"
//! packet[..7].copy_from_slice(&[3 << 3, 5 << 2, 1, b'2', b'1', b'.', b'5']);
//!
//! let mut reading = SensorReading::default();
//! for sample in samples(&packet).flatten() {
//!     reading.apply(sample);
//! }
//! assert_eq!(reading.get(SensorKind::Temperature), 21.5);
//! ```

pub mod codec;
pub mod error;
pub mod messages;
pub mod types;

pub use codec::{
    DecodedRecord, Records, SENSOR_STREAM, parse_ascii_number, records, samples,
};
pub use error::{DecodeError, Result};
pub use messages::{
    CONFIG_COMMAND, ENDPOINT_IN, ENDPOINT_OUT, INTERFACE, PACKET_SIZE, PRODUCT_ID, RawPacket,
    START_COMMAND, VENDOR_ID,
};
pub use types::{Sample, SensorKind, SensorReading};

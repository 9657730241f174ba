//! Test utilities for rust-ypmeteo
//!
//! Provides packet builders and polling helpers for testing across crates.
//!
//! # Example
//!
//! ```
//! use common::test_utils::PacketBuilder;
//! use protocol::{SensorKind, SensorReading, samples};
//!
//! let packet = PacketBuilder::new()
//!     .sensor(SensorKind::Temperature, "21.5")
//!     .build();
//!
//! let mut reading = SensorReading::default();
//! samples(&packet).flatten().for_each(|s| reading.apply(s));
//! assert_eq!(reading.temperature, 21.5);
//! ```

use protocol::{PACKET_SIZE, RawPacket, SENSOR_STREAM, SensorKind};
use std::time::{Duration, Instant};

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Builder for synthetic device packets
///
/// Records are appended back to back. Anything that does not fit in the
/// 64-byte packet is cut off, just as the device would never send it.
#[derive(Debug, Clone)]
pub struct PacketBuilder {
    buf: RawPacket,
    len: usize,
    packet_no: u8,
}

impl Default for PacketBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketBuilder {
    pub fn new() -> Self {
        Self {
            buf: [0u8; PACKET_SIZE],
            len: 0,
            packet_no: 0,
        }
    }

    /// Append a raw record with an explicit stream id and body
    pub fn record(mut self, stream: u8, body: &[u8]) -> Self {
        let size = body.len().min(0x3F) as u8;
        let header = [((stream & 0x1F) << 3) | (self.packet_no & 0x07), size << 2];
        self.packet_no = self.packet_no.wrapping_add(1);

        self.push(&header);
        self.push(&body[..size as usize]);
        self
    }

    /// Append a stream-3 record for `kind` carrying `text`
    pub fn sensor(self, kind: SensorKind, text: &str) -> Self {
        self.sensor_code(kind.code(), text)
    }

    /// Append a stream-3 record with an arbitrary subtype code
    pub fn sensor_code(self, code: u8, text: &str) -> Self {
        let mut body = Vec::with_capacity(text.len() + 1);
        body.push(code);
        body.extend_from_slice(text.as_bytes());
        self.record(SENSOR_STREAM, &body)
    }

    /// Number of bytes written so far
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn build(self) -> RawPacket {
        self.buf
    }

    fn push(&mut self, bytes: &[u8]) {
        let room = PACKET_SIZE - self.len;
        let n = bytes.len().min(room);
        self.buf[self.len..self.len + n].copy_from_slice(&bytes[..n]);
        self.len += n;
    }
}

/// Packet with one record for each of temperature, pressure and humidity
pub fn create_mock_sensor_packet(temperature: &str, pressure: &str, humidity: &str) -> RawPacket {
    PacketBuilder::new()
        .sensor(SensorKind::Temperature, temperature)
        .sensor(SensorKind::Pressure, pressure)
        .sensor(SensorKind::Humidity, humidity)
        .build()
}

/// Error returned when a condition is not met in time
#[derive(Debug)]
pub struct TimeoutError {
    /// The timeout duration that was exceeded
    pub duration: Duration,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Condition not met after {:?}", self.duration)
    }
}

impl std::error::Error for TimeoutError {}

/// Poll `condition` every few milliseconds until it holds or `duration` passes
pub fn wait_until<F>(duration: Duration, mut condition: F) -> Result<(), TimeoutError>
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + duration;
    loop {
        if condition() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(TimeoutError { duration });
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::records;

    #[test]
    fn test_builder_layout() {
        let packet = PacketBuilder::new()
            .sensor(SensorKind::Humidity, "45")
            .build();

        assert_eq!(&packet[..5], &[SENSOR_STREAM << 3, 3 << 2, 3, b'4', b'5']);
        assert!(packet[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_builder_numbers_packets() {
        let packet = PacketBuilder::new()
            .record(1, &[0xAA])
            .record(1, &[0xBB])
            .build();
        let numbers: Vec<u8> = records(&packet).take(2).map(|r| r.packet_no).collect();

        assert_eq!(numbers, vec![0, 1]);
    }

    #[test]
    fn test_builder_truncates_overflow() {
        let long = "9".repeat(40);
        let builder = PacketBuilder::new()
            .sensor(SensorKind::Pressure, &long)
            .sensor(SensorKind::Pressure, &long);

        assert_eq!(builder.len(), PACKET_SIZE);
    }

    #[test]
    fn test_wait_until() {
        let mut calls = 0;
        assert!(
            wait_until(Duration::from_secs(1), || {
                calls += 1;
                calls >= 3
            })
            .is_ok()
        );
        assert!(wait_until(Duration::from_millis(20), || false).is_err());
    }
}

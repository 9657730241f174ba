//! Packet stream decoding
//!
//! Every 64-byte transfer from the device holds a sequence of records laid
//! out back to back:
//!
//! ```text
//! byte 0: [stream id: 5 bits][packet sequence number: 3 bits]
//! byte 1: [size: 6 bits][sub-packet type: 2 bits]
//! byte 2..2+size: record body
//! ```
//!
//! Sensor values travel on stream 3. Their body starts with a subtype code
//! (see [`SensorKind`]) followed by `size - 1` bytes of ASCII decimal text.
//!
//! Decoding never reads past the end of the buffer: a header that does not
//! fit ends the packet and a body that would overrun it is truncated.

use crate::error::{DecodeError, Result};
use crate::types::{Sample, SensorKind};

/// Stream id carrying sensor values
pub const SENSOR_STREAM: u8 = 3;

/// One record of a raw packet
///
/// Borrowed from the packet it was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedRecord<'a> {
    /// Byte offset of the record header within the packet
    pub offset: usize,
    /// Packet sequence number (low 3 bits of the first header byte)
    pub packet_no: u8,
    /// Stream id (high 5 bits of the first header byte)
    pub stream: u8,
    /// Sub-packet type flag (low 2 bits of the second header byte)
    pub packet_type: u8,
    /// Declared body size (high 6 bits of the second header byte)
    pub size: u8,
    /// Record body, truncated at the end of the packet
    pub body: &'a [u8],
}

impl<'a> DecodedRecord<'a> {
    /// Whether this record belongs to the sensor value stream
    pub fn is_sensor(&self) -> bool {
        self.stream == SENSOR_STREAM && self.size > 0
    }

    /// Raw subtype code, if the body holds at least one byte
    pub fn subtype(&self) -> Option<u8> {
        self.body.first().copied()
    }

    /// Sensor kind of a stream-3 record, `None` for unrecognized codes
    pub fn kind(&self) -> Option<SensorKind> {
        if !self.is_sensor() {
            return None;
        }
        self.subtype().and_then(SensorKind::from_code)
    }

    /// Numeric payload bytes following the subtype code
    pub fn payload(&self) -> &'a [u8] {
        self.body.get(1..).unwrap_or(&[])
    }

    /// Parse the payload as an ASCII decimal number
    pub fn value(&self) -> Result<f64> {
        if self.body.is_empty() {
            return Err(DecodeError::MissingSubtype);
        }
        parse_ascii_number(self.payload())
    }

    /// Decode this record into a sample
    ///
    /// Returns `None` for records that carry no recognized sensor value,
    /// and `Some(Err(..))` when the payload is not a valid number.
    pub fn sample(&self) -> Option<Result<Sample>> {
        let kind = self.kind()?;
        Some(self.value().map(|value| Sample { kind, value }))
    }
}

/// Lazy iterator over the records of a packet
///
/// Created by [`records`]. Decoding has no side effects, so calling
/// [`records`] again on the same buffer yields the same records.
#[derive(Debug, Clone)]
pub struct Records<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for Records<'a> {
    type Item = DecodedRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.offset;
        // Both header bytes must lie inside the packet
        if offset + 1 >= self.buf.len() {
            self.offset = self.buf.len();
            return None;
        }

        let b0 = self.buf[offset];
        let b1 = self.buf[offset + 1];
        let size = (b1 >> 2) & 0x3F;

        let start = offset + 2;
        let end = (start + size as usize).min(self.buf.len());
        let body = &self.buf[start.min(end)..end];

        self.offset = offset + size as usize + 2;

        Some(DecodedRecord {
            offset,
            packet_no: b0 & 0x07,
            stream: (b0 >> 3) & 0x1F,
            packet_type: b1 & 0x03,
            size,
            body,
        })
    }
}

impl std::iter::FusedIterator for Records<'_> {}

/// Iterate over every record of a raw packet
///
/// Accepts any slice; the device always sends [`crate::PACKET_SIZE`] bytes.
pub fn records(buf: &[u8]) -> Records<'_> {
    Records { buf, offset: 0 }
}

/// Iterate over the sensor samples of a raw packet
///
/// Yields one item per stream-3 record with a recognized subtype. Records
/// whose payload fails to parse are yielded as errors so the caller can log
/// them; they never stop the scan.
pub fn samples(buf: &[u8]) -> impl Iterator<Item = Result<Sample>> + '_ {
    records(buf).filter_map(|record| record.sample())
}

/// Parse ASCII decimal text
///
/// Non-ASCII bytes are dropped and surrounding whitespace is ignored.
pub fn parse_ascii_number(bytes: &[u8]) -> Result<f64> {
    let text: String = bytes
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect();

    text.trim()
        .parse::<f64>()
        .map_err(|_| DecodeError::InvalidNumber { text })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(stream: u8, packet_no: u8, size: u8) -> [u8; 2] {
        [(stream << 3) | (packet_no & 0x07), size << 2]
    }

    fn sensor_record(code: u8, text: &str) -> Vec<u8> {
        let mut rec = header(SENSOR_STREAM, 0, text.len() as u8 + 1).to_vec();
        rec.push(code);
        rec.extend_from_slice(text.as_bytes());
        rec
    }

    fn packet(parts: &[Vec<u8>]) -> [u8; 64] {
        let mut buf = [0u8; 64];
        let mut at = 0;
        for part in parts {
            buf[at..at + part.len()].copy_from_slice(part);
            at += part.len();
        }
        buf
    }

    #[test]
    fn test_header_fields() {
        let buf = packet(&[vec![(3 << 3) | 5, (4 << 2) | 2, 1, b'1', b'.', b'5']]);
        let rec = records(&buf).next().unwrap();

        assert_eq!(rec.offset, 0);
        assert_eq!(rec.packet_no, 5);
        assert_eq!(rec.stream, 3);
        assert_eq!(rec.packet_type, 2);
        assert_eq!(rec.size, 4);
        assert_eq!(rec.subtype(), Some(1));
        assert_eq!(rec.payload(), b"1.5");
    }

    #[test]
    fn test_zero_packet_advances_by_two() {
        let buf = [0u8; 64];
        let recs: Vec<_> = records(&buf).collect();

        assert_eq!(recs.len(), 32);
        assert!(recs.iter().all(|r| r.size == 0 && r.body.is_empty()));
        assert_eq!(recs.last().unwrap().offset, 62);
    }

    #[test]
    fn test_back_to_back_records() {
        let buf = packet(&[
            sensor_record(1, "20.1"),
            sensor_record(2, "1013"),
            sensor_record(3, "45"),
        ]);
        let values: Vec<Sample> = samples(&buf).map(|s| s.unwrap()).collect();

        assert_eq!(
            values,
            vec![
                Sample {
                    kind: SensorKind::Temperature,
                    value: 20.1
                },
                Sample {
                    kind: SensorKind::Pressure,
                    value: 1013.0
                },
                Sample {
                    kind: SensorKind::Humidity,
                    value: 45.0
                },
            ]
        );
    }

    #[test]
    fn test_unknown_subtype_skipped() {
        let buf = packet(&[sensor_record(7, "99"), sensor_record(1, "18.0")]);
        let values: Vec<_> = samples(&buf).collect();

        assert_eq!(values.len(), 1);
        assert_eq!(values[0].as_ref().unwrap().value, 18.0);
    }

    #[test]
    fn test_other_streams_ignored() {
        let mut rec = header(4, 1, 3).to_vec();
        rec.extend_from_slice(&[1, b'4', b'2']);
        let buf = packet(&[rec]);

        assert_eq!(records(&buf).next().unwrap().stream, 4);
        assert_eq!(samples(&buf).count(), 0);
    }

    #[test]
    fn test_invalid_number_does_not_stop_scan() {
        let buf = packet(&[sensor_record(1, "2x.5"), sensor_record(3, "50")]);
        let values: Vec<_> = samples(&buf).collect();

        assert_eq!(values.len(), 2);
        assert!(matches!(values[0], Err(DecodeError::InvalidNumber { .. })));
        assert_eq!(values[1].as_ref().unwrap().value, 50.0);
    }

    #[test]
    fn test_empty_payload_is_invalid() {
        let buf = packet(&[sensor_record(1, "")]);
        let values: Vec<_> = samples(&buf).collect();

        assert_eq!(values.len(), 1);
        assert!(values[0].is_err());
    }

    #[test]
    fn test_non_ascii_bytes_dropped() {
        let mut rec = header(SENSOR_STREAM, 0, 6).to_vec();
        rec.extend_from_slice(&[1, b'2', 0xC3, b'1', b'.', b'5']);
        let buf = packet(&[rec]);
        let sample = samples(&buf).next().unwrap().unwrap();

        assert_eq!(sample.value, 21.5);
    }

    #[test]
    fn test_body_truncated_at_packet_end() {
        let mut buf = [0u8; 64];
        // Record at offset 60 declares 40 bytes of body
        buf[60] = SENSOR_STREAM << 3;
        buf[61] = 40 << 2;
        buf[62] = 1;
        buf[63] = b'7';
        let last = records(&buf).last().unwrap();

        assert_eq!(last.offset, 60);
        assert_eq!(last.body, &[1, b'7']);
        assert_eq!(last.sample().unwrap().unwrap().value, 7.0);
    }

    #[test]
    fn test_header_at_last_byte_ends_packet() {
        let mut buf = [0u8; 64];
        // Size 61 jumps to offset 63, where only one header byte remains
        buf[1] = 61 << 2;
        buf[63] = 0xFF;
        let recs: Vec<_> = records(&buf).collect();

        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].body.len(), 61);
    }

    #[test]
    fn test_records_restartable() {
        let buf = packet(&[sensor_record(1, "21.5")]);
        let first: Vec<_> = records(&buf).collect();
        let second: Vec<_> = records(&buf).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_parse_ascii_number() {
        assert_eq!(parse_ascii_number(b" 12.25 ").unwrap(), 12.25);
        assert_eq!(parse_ascii_number(b"-3").unwrap(), -3.0);
        assert!(parse_ascii_number(b"").is_err());
        assert!(parse_ascii_number(b"abc").is_err());
    }
}

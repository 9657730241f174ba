//! Device identity and host-to-device command messages
//!
//! The Yocto-Meteo is driven by two fixed 64-byte messages written to the
//! bulk OUT endpoint right after the device has been reset and drained.

/// USB vendor ID of the Yocto-Meteo
pub const VENDOR_ID: u16 = 0x24E0;

/// USB product ID of the Yocto-Meteo
pub const PRODUCT_ID: u16 = 0x0018;

/// Interface carrying both bulk endpoints
pub const INTERFACE: u8 = 0;

/// Bulk OUT endpoint for commands
pub const ENDPOINT_OUT: u8 = 0x01;

/// Bulk IN endpoint for the sensor stream
pub const ENDPOINT_IN: u8 = 0x81;

/// Size of every transfer in either direction
pub const PACKET_SIZE: usize = 64;

/// One raw transfer as received from the device
pub type RawPacket = [u8; PACKET_SIZE];

/// 'start' command: enables streaming
pub static START_COMMAND: RawPacket = command(&[0x00, 0xF9, 0x09, 0x02, 0x01]);

/// 'config' command: sent after start
pub static CONFIG_COMMAND: RawPacket = command(&[0x08, 0xF9, 0x01]);

/// Build a zero-padded command from its leading bytes
const fn command(prefix: &[u8]) -> RawPacket {
    let mut buf = [0u8; PACKET_SIZE];
    let mut i = 0;
    while i < prefix.len() {
        buf[i] = prefix[i];
        i += 1;
    }
    buf
}

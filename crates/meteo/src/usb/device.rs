//! libusb-backed device session
//!
//! This module wraps a `rusb::DeviceHandle` for the Yocto-Meteo and
//! implements the connect sequence the device expects:
//! enumerate, detach kernel driver, reset, claim, drain, start, config.

use crate::config::DriverSettings;
use crate::error::{MeteoError, Result};
use crate::usb::session::{ConnectOutcome, SensorSession};
use protocol::{
    CONFIG_COMMAND, ENDPOINT_IN, ENDPOINT_OUT, INTERFACE, PACKET_SIZE, PRODUCT_ID, RawPacket,
    START_COMMAND, VENDOR_ID,
};
use rusb::{Context, DeviceHandle, UsbContext};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// USB session with the Yocto-Meteo
pub struct UsbSession {
    /// libusb context, created on first connect
    context: Option<Context>,
    /// Device handle (if opened)
    handle: Option<DeviceHandle<Context>>,
    /// Whether we claimed the interface on the current handle
    interface_claimed: bool,
    /// Set once the start and config commands went out
    connected: bool,
    settings: DriverSettings,
}

impl UsbSession {
    /// Create a disconnected session
    pub fn new(settings: DriverSettings) -> Self {
        Self {
            context: None,
            handle: None,
            interface_claimed: false,
            connected: false,
            settings,
        }
    }

    fn context(&mut self) -> Result<&Context> {
        if self.context.is_none() {
            self.context = Some(Context::new()?);
        }
        self.context.as_ref().ok_or(MeteoError::NotConnected)
    }

    /// Find and open the device
    ///
    /// Returns `Ok(None)` when no device with our VID/PID is attached.
    fn open(&mut self) -> Result<Option<DeviceHandle<Context>>> {
        let devices = self.context()?.devices()?;

        for device in devices.iter() {
            let desc = match device.device_descriptor() {
                Ok(desc) => desc,
                Err(_) => continue,
            };

            if desc.vendor_id() == VENDOR_ID && desc.product_id() == PRODUCT_ID {
                let handle = device.open()?;
                debug!(
                    "Opened device {:04x}:{:04x} on bus {:03} address {:03}",
                    VENDOR_ID,
                    PRODUCT_ID,
                    device.bus_number(),
                    device.address()
                );
                return Ok(Some(handle));
            }
        }

        Ok(None)
    }

    /// Bring an opened device into streaming mode
    fn initialize(&mut self) -> Result<()> {
        let handle = self.handle.as_mut().ok_or(MeteoError::NotConnected)?;

        match handle.kernel_driver_active(INTERFACE) {
            Ok(true) => {
                debug!("Detaching kernel driver from interface {}", INTERFACE);
                if let Err(e) = handle.detach_kernel_driver(INTERFACE) {
                    // Claiming below reports the real failure
                    warn!("Failed to detach kernel driver: {}", e);
                }
            }
            Ok(false) => {}
            Err(e) => {
                debug!("Could not check kernel driver status: {}", e);
            }
        }

        handle.reset()?;
        debug!("Reset device");

        handle.claim_interface(INTERFACE)?;
        self.interface_claimed = true;

        // Stale data in the IN pipe keeps the init commands from going out
        let drained = drain(
            handle,
            self.settings.flush_timeout,
            self.settings.max_flush_reads,
        )?;
        debug!("Discarded {} stale packet(s)", drained);

        write_command(handle, "start", &START_COMMAND, self.settings.write_timeout)?;
        write_command(handle, "config", &CONFIG_COMMAND, self.settings.write_timeout)?;
        Ok(())
    }
}

impl SensorSession for UsbSession {
    fn connect(&mut self) -> Result<ConnectOutcome> {
        if self.handle.is_some() {
            self.release();
        }
        self.connected = false;

        let handle = match self.open() {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                debug!("No device {:04x}:{:04x} present", VENDOR_ID, PRODUCT_ID);
                return Ok(ConnectOutcome::NotFound);
            }
            Err(e) => return Err(e),
        };
        self.handle = Some(handle);

        if let Err(e) = self.initialize() {
            self.release();
            return Err(e);
        }

        self.connected = true;
        info!("Connected to Yocto-Meteo {:04x}:{:04x}", VENDOR_ID, PRODUCT_ID);
        Ok(ConnectOutcome::Connected)
    }

    fn read(&mut self, timeout: Duration) -> Result<Option<RawPacket>> {
        let handle = self.handle.as_ref().ok_or(MeteoError::NotConnected)?;
        let mut buf = [0u8; PACKET_SIZE];

        match handle.read_bulk(ENDPOINT_IN, &mut buf, timeout) {
            Ok(len) => {
                trace!("Read {} bytes from {:#04x}: {:02x?}", len, ENDPOINT_IN, &buf[..len]);
                Ok(Some(buf))
            }
            Err(rusb::Error::Timeout) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn release(&mut self) {
        debug!("Close and cleanup connection");
        if let Some(mut handle) = self.handle.take() {
            if self.interface_claimed
                && let Err(e) = handle.release_interface(INTERFACE)
            {
                warn!("Error disposing usb connection resources: {}", e);
            }
            drop(handle);
        }
        self.interface_claimed = false;
        self.connected = false;

        // Give libusb and the kernel time to let go of the device
        std::thread::sleep(self.settings.release_delay);
    }

    fn is_connected(&self) -> bool {
        self.connected && self.handle.is_some()
    }
}

impl Drop for UsbSession {
    fn drop(&mut self) {
        if let Some(mut handle) = self.handle.take()
            && self.interface_claimed
        {
            let _ = handle.release_interface(INTERFACE);
        }
    }
}

/// Read and discard until the device has nothing left to send
///
/// A timeout is the expected way out. Returns the number of packets read.
fn drain(handle: &DeviceHandle<Context>, timeout: Duration, max_reads: u32) -> Result<u32> {
    let mut buf = [0u8; PACKET_SIZE];

    for count in 0..max_reads {
        match handle.read_bulk(ENDPOINT_IN, &mut buf, timeout) {
            Ok(len) => trace!("Read stale junk from command buffer: {} bytes", len),
            Err(rusb::Error::Timeout) => return Ok(count),
            Err(e) => return Err(e.into()),
        }
    }

    warn!("Device still streaming after {} drain reads", max_reads);
    Ok(max_reads)
}

/// Write one full command packet to the OUT endpoint
fn write_command(
    handle: &DeviceHandle<Context>,
    name: &str,
    command: &RawPacket,
    timeout: Duration,
) -> Result<()> {
    let written = handle.write_bulk(ENDPOINT_OUT, command, timeout)?;
    if written != command.len() {
        return Err(MeteoError::ShortWrite {
            endpoint: ENDPOINT_OUT,
            written,
            expected: command.len(),
        });
    }
    debug!("Sent {} command", name);
    Ok(())
}

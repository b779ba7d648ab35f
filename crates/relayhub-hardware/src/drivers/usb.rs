//! Shared libusb helpers for the USB relay card drivers.

use crate::Result;
use relayhub_core::constants::{DEFAULT_USB_TIMEOUT_MS, MAX_SERIAL_LEN};
use rusb::{Device, DeviceDescriptor, DeviceHandle, GlobalContext};
use std::time::Duration;
use tracing::{debug, warn};

/// Bulk OUT endpoint used by both USB card families.
pub(crate) const BULK_OUT_ENDPOINT: u8 = 0x02;

const RELAY_INTERFACE: u8 = 0;
const RELAY_CONFIGURATION: u8 = 1;

/// Timeout applied to every USB transfer.
pub(crate) fn timeout() -> Duration {
    Duration::from_millis(DEFAULT_USB_TIMEOUT_MS)
}

/// Every attached device with the given vendor and product ids, in bus order.
pub(crate) fn matching_devices(
    vendor_id: u16,
    product_id: u16,
) -> Result<Vec<(Device<GlobalContext>, DeviceDescriptor)>> {
    let mut found = Vec::new();
    for device in rusb::devices()?.iter() {
        let descriptor = match device.device_descriptor() {
            Ok(descriptor) => descriptor,
            Err(e) => {
                debug!(error = %e, "Skipping device without descriptor");
                continue;
            }
        };
        if descriptor.vendor_id() == vendor_id && descriptor.product_id() == product_id {
            found.push((device, descriptor));
        }
    }
    Ok(found)
}

/// Open a device, logging and skipping the ones we lack permissions for.
pub(crate) fn try_open(device: &Device<GlobalContext>) -> Option<DeviceHandle<GlobalContext>> {
    match device.open() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(
                bus = device.bus_number(),
                address = device.address(),
                error = %e,
                "Cannot open USB device"
            );
            None
        }
    }
}

/// Clip a serial string to the maximum serial length.
pub(crate) fn clip_serial(serial: &str) -> String {
    serial.trim().chars().take(MAX_SERIAL_LEN).collect()
}

/// Take interface 0 away from any kernel driver and claim it.
pub(crate) fn claim_relay_interface(handle: &mut DeviceHandle<GlobalContext>) -> Result<()> {
    // Not supported on every platform; a failure here is not fatal.
    if let Ok(true) = handle.kernel_driver_active(RELAY_INTERFACE) {
        if let Err(e) = handle.detach_kernel_driver(RELAY_INTERFACE) {
            debug!(error = %e, "Could not detach kernel driver");
        }
    }
    if let Err(e) = handle.set_active_configuration(RELAY_CONFIGURATION) {
        debug!(error = %e, "Could not set USB configuration");
    }
    handle.claim_interface(RELAY_INTERFACE)?;
    Ok(())
}

/// Release interface 0 again.
pub(crate) fn release_relay_interface(handle: &mut DeviceHandle<GlobalContext>) {
    if let Err(e) = handle.release_interface(RELAY_INTERFACE) {
        debug!(error = %e, "Could not release USB interface");
    }
}

/// Write a whole command to the bulk OUT endpoint.
pub(crate) fn write_command(handle: &DeviceHandle<GlobalContext>, command: &[u8]) -> Result<()> {
    let written = handle.write_bulk(BULK_OUT_ENDPOINT, command, timeout())?;
    if written != command.len() {
        return Err(crate::HardwareError::transport(format!(
            "short write: {written} of {} bytes",
            command.len()
        )));
    }
    Ok(())
}

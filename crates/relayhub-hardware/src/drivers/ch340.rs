//! Sainsmart 16-channel relay card (CH340G USB bridge).
//!
//! The card exposes a CH340G USB-serial bridge (`1a86:7523`) wired to a
//! microcontroller that speaks Modbus ASCII. Each relay is a coil written
//! with function `05`:
//!
//! ```text
//! :  FE  05  00 0C  FF 00  F2  \r\n
//! |  |   |   |      |      |
//! |  |   |   |      |      +-- LRC (two's complement of the byte sum)
//! |  |   |   |      +--------- FF00 = on, 0000 = off
//! |  |   |   +---------------- coil address (relay - 1)
//! |  |   +-------------------- write single coil
//! |  +------------------------ station address
//! +--------------------------- frame start
//! ```
//!
//! The bridge has no serial number, so the device is identified by
//! `"1a86:7523:<bus address>"`. The card cannot be read back.

use super::usb;
use crate::{
    HardwareError, Result,
    shadow::ShadowCache,
    traits::{DeviceHandle, RelayDriver, switch_level},
};
use relayhub_core::{DeviceDescriptor, RelayFamily, RelayIndex, RelayState};
use tracing::{debug, info};

/// USB vendor id of the CH340 bridge.
pub const VENDOR_ID: u16 = 0x1a86;

/// USB product id of the CH340 bridge.
pub const PRODUCT_ID: u16 = 0x7523;

/// Length of a coil write frame.
pub const FRAME_LEN: usize = 17;

const STATION: u8 = 0xFE;
const WRITE_SINGLE_COIL: u8 = 0x05;
const PORT_NAME: &str = "CH340G";

/// Longitudinal redundancy check over the binary frame payload.
///
/// ```
/// use relayhub_hardware::drivers::ch340::lrc;
///
/// assert_eq!(lrc(&[0xFE, 0x05, 0x00, 0x00, 0xFF, 0x00]), 0xFE);
/// ```
#[must_use]
pub fn lrc(payload: &[u8]) -> u8 {
    payload
        .iter()
        .fold(0u8, |sum, byte| sum.wrapping_add(*byte))
        .wrapping_neg()
}

/// Build the Modbus ASCII frame switching one relay.
#[must_use]
pub fn coil_frame(relay: RelayIndex, on: bool) -> [u8; FRAME_LEN] {
    let coil = u16::from(relay.as_u8() - 1);
    let [coil_hi, coil_lo] = coil.to_be_bytes();
    let value: u8 = if on { 0xFF } else { 0x00 };
    let payload = [STATION, WRITE_SINGLE_COIL, coil_hi, coil_lo, value, 0x00];

    let text = format!(
        ":{}{:02X}\r\n",
        payload
            .iter()
            .map(|byte| format!("{byte:02X}"))
            .collect::<String>(),
        lrc(&payload)
    );

    let mut frame = [0u8; FRAME_LEN];
    frame.copy_from_slice(text.as_bytes());
    frame
}

/// Serial reported for a CH340 card at the given bus address.
#[must_use]
pub fn device_serial(address: u8) -> String {
    format!("{VENDOR_ID:04x}:{PRODUCT_ID:04x}:{address}")
}

/// Driver for the Sainsmart CH340G 16-channel card.
#[derive(Debug, Clone, Default)]
pub struct Ch340Driver;

impl Ch340Driver {
    pub fn new() -> Self {
        Self
    }

    fn relay_count() -> u8 {
        RelayFamily::Sainsmart16Ch340.default_relay_count()
    }

    fn find(serial: &str) -> Result<rusb::Device<rusb::GlobalContext>> {
        usb::matching_devices(VENDOR_ID, PRODUCT_ID)?
            .into_iter()
            .map(|(device, _)| device)
            .find(|device| device_serial(device.address()) == serial)
            .ok_or_else(|| HardwareError::not_found(Some(serial)))
    }
}

impl RelayDriver for Ch340Driver {
    fn family(&self) -> RelayFamily {
        RelayFamily::Sainsmart16Ch340
    }

    fn enumerate(&self, cache: &ShadowCache) -> Result<Vec<DeviceDescriptor>> {
        let devices = usb::matching_devices(VENDOR_ID, PRODUCT_ID)?
            .into_iter()
            .map(|(device, _)| {
                let serial = device_serial(device.address());
                cache.observe(&serial);
                DeviceDescriptor::new(self.family(), serial, Self::relay_count())
            })
            .collect::<Vec<_>>();

        debug!(count = devices.len(), "Enumerated CH340 relay cards");
        Ok(devices)
    }

    fn detect_one(&self, serial: Option<&str>, cache: &ShadowCache) -> Result<DeviceHandle> {
        let device = match serial {
            Some(serial) => Self::find(serial)?,
            None => usb::matching_devices(VENDOR_ID, PRODUCT_ID)?
                .into_iter()
                .map(|(device, _)| device)
                .next()
                .ok_or_else(|| HardwareError::not_found(None))?,
        };

        let serial = device_serial(device.address());
        cache.observe(&serial);
        Ok(DeviceHandle::new(
            self.family(),
            serial,
            Self::relay_count(),
            PORT_NAME,
        ))
    }

    fn get_relay(&self, device: &DeviceHandle, relay: RelayIndex) -> Result<RelayState> {
        device.check_relay(relay)?;
        Ok(RelayState::Invalid)
    }

    fn set_relay(
        &self,
        device: &DeviceHandle,
        relay: RelayIndex,
        state: RelayState,
        cache: &ShadowCache,
    ) -> Result<()> {
        device.check_relay(relay)?;
        let frame = coil_frame(relay, switch_level(state)?);

        let usb_device = Self::find(&device.serial)?;
        let mut handle = usb_device.open()?;
        usb::claim_relay_interface(&mut handle)?;
        let written = usb::write_command(&handle, &frame);
        usb::release_relay_interface(&mut handle);
        written?;

        cache.set(&device.serial, relay, state);
        info!(serial = %device.serial, relay = %relay, state = %state, "Relay switched");
        Ok(())
    }
}

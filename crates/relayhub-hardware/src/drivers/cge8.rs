//! CGE 8-channel relay card (FTDI FT232R).
//!
//! The card sits behind an FT232R ("R type" chip, `bcdDevice` 6.x) and is
//! identified by the USB serial string burnt into the FTDI EEPROM. Relays
//! are switched with a five byte ASCII command at 9600 8N1:
//!
//! ```text
//! R L Y <'0' + relay> <'0' | '1'>
//! ```
//!
//! The card cannot be read back.

use super::usb;
use crate::{
    HardwareError, Result,
    shadow::ShadowCache,
    traits::{DeviceHandle, RelayDriver, switch_level},
};
use relayhub_core::{DeviceDescriptor, RelayFamily, RelayIndex, RelayState};
use rusb::{Device, DeviceHandle as UsbHandle, Direction, GlobalContext, Recipient, RequestType};
use tracing::{debug, info};

/// USB vendor id of FTDI.
pub const VENDOR_ID: u16 = 0x0403;

/// USB product id of the FT232R.
pub const PRODUCT_ID: u16 = 0x6001;

/// `bcdDevice` major version of R type chips.
const R_TYPE_RELEASE: u8 = 6;

// FTDI vendor requests
const SIO_RESET: u8 = 0x00;
const SIO_SET_BAUDRATE: u8 = 0x03;
const SIO_SET_DATA: u8 = 0x04;
const SIO_READ_EEPROM: u8 = 0x90;

/// Divisor for 9600 baud on the 3 MHz base clock.
const BAUD_9600_DIVISOR: u16 = 0x4138;
/// 8 data bits, no parity, 1 stop bit.
const LINE_8N1: u16 = 0x0008;
/// Interface A.
const FTDI_INDEX: u16 = 1;

const CHIPID_WORDS: [u16; 2] = [0x43, 0x44];

/// Build the ASCII command switching one relay.
///
/// ```
/// use relayhub_core::RelayIndex;
/// use relayhub_hardware::drivers::cge8::relay_command;
///
/// assert_eq!(&relay_command(RelayIndex::new(3).unwrap(), true), b"RLY31");
/// ```
#[must_use]
pub fn relay_command(relay: RelayIndex, on: bool) -> [u8; 5] {
    [b'R', b'L', b'Y', b'0' + relay.as_u8(), if on { b'1' } else { b'0' }]
}

fn chipid_shift(value: u32) -> u32 {
    ((value & 1) << 1)
        | ((value & 2) << 5)
        | ((value & 4) >> 2)
        | ((value & 8) << 4)
        | ((value & 16) >> 1)
        | ((value & 32) >> 1)
        | ((value & 64) >> 4)
        | ((value & 128) >> 2)
}

/// Decode the FTDI chip id from EEPROM words `0x43` and `0x44`.
#[must_use]
pub fn decode_chipid(word_43: u16, word_44: u16) -> u32 {
    let raw = (u32::from(word_43) << 16) | u32::from(word_44);
    let scrambled = chipid_shift(raw)
        | (chipid_shift(raw >> 8) << 8)
        | (chipid_shift(raw >> 16) << 16)
        | (chipid_shift(raw >> 24) << 24);
    scrambled ^ 0xa5f0_f7d1
}

fn vendor_out() -> u8 {
    rusb::request_type(Direction::Out, RequestType::Vendor, Recipient::Device)
}

fn vendor_in() -> u8 {
    rusb::request_type(Direction::In, RequestType::Vendor, Recipient::Device)
}

fn read_chipid(handle: &UsbHandle<GlobalContext>) -> Result<u32> {
    let mut words = [0u16; 2];
    for (word, address) in words.iter_mut().zip(CHIPID_WORDS) {
        let mut buf = [0u8; 2];
        handle.read_control(vendor_in(), SIO_READ_EEPROM, 0, address, &mut buf, usb::timeout())?;
        *word = u16::from_le_bytes(buf);
    }
    Ok(decode_chipid(words[0], words[1]))
}

fn setup_line(handle: &UsbHandle<GlobalContext>) -> Result<()> {
    let timeout = usb::timeout();
    handle.write_control(vendor_out(), SIO_RESET, 0, FTDI_INDEX, &[], timeout)?;
    handle.write_control(vendor_out(), SIO_SET_BAUDRATE, BAUD_9600_DIVISOR, 0, &[], timeout)?;
    handle.write_control(vendor_out(), SIO_SET_DATA, LINE_8N1, FTDI_INDEX, &[], timeout)?;
    Ok(())
}

/// An R type FTDI device together with its serial string.
struct Candidate {
    device: Device<GlobalContext>,
    handle: UsbHandle<GlobalContext>,
    serial: String,
}

/// Driver for the CGE 8-channel card.
#[derive(Debug, Clone, Default)]
pub struct Cge8Driver;

impl Cge8Driver {
    pub fn new() -> Self {
        Self
    }

    fn relay_count() -> u8 {
        RelayFamily::Cge8Usb.default_relay_count()
    }

    /// Every R type FTDI chip we can open and read a serial from.
    fn candidates() -> Result<Vec<Candidate>> {
        let mut found = Vec::new();
        for (device, descriptor) in usb::matching_devices(VENDOR_ID, PRODUCT_ID)? {
            if descriptor.device_version().major() != R_TYPE_RELEASE {
                debug!(address = device.address(), "Skipping non R type FTDI chip");
                continue;
            }
            let Some(handle) = usb::try_open(&device) else {
                continue;
            };
            match handle.read_serial_number_string_ascii(&descriptor) {
                Ok(serial) => found.push(Candidate {
                    device,
                    handle,
                    serial: usb::clip_serial(&serial),
                }),
                Err(e) => debug!(error = %e, "Cannot read FTDI serial string"),
            }
        }
        Ok(found)
    }

    fn find(serial: Option<&str>) -> Result<Candidate> {
        Self::candidates()?
            .into_iter()
            .find(|candidate| serial.is_none_or(|wanted| candidate.serial == wanted))
            .ok_or_else(|| HardwareError::not_found(serial))
    }
}

impl RelayDriver for Cge8Driver {
    fn family(&self) -> RelayFamily {
        RelayFamily::Cge8Usb
    }

    fn enumerate(&self, cache: &ShadowCache) -> Result<Vec<DeviceDescriptor>> {
        let devices = Self::candidates()?
            .into_iter()
            .map(|candidate| {
                cache.observe(&candidate.serial);
                DeviceDescriptor::new(self.family(), candidate.serial, Self::relay_count())
            })
            .collect::<Vec<_>>();

        debug!(count = devices.len(), "Enumerated CGE 8-channel relay cards");
        Ok(devices)
    }

    fn detect_one(&self, serial: Option<&str>, cache: &ShadowCache) -> Result<DeviceHandle> {
        let candidate = Self::find(serial)?;
        let port = match read_chipid(&candidate.handle) {
            Ok(chipid) => format!("FTDI chipid {chipid:X}"),
            Err(e) => {
                debug!(serial = %candidate.serial, error = %e, "Cannot read FTDI chip id");
                format!(
                    "FTDI bus {} address {}",
                    candidate.device.bus_number(),
                    candidate.device.address()
                )
            }
        };

        cache.observe(&candidate.serial);
        Ok(DeviceHandle::new(
            self.family(),
            candidate.serial,
            Self::relay_count(),
            port,
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
        let command = relay_command(relay, switch_level(state)?);

        let mut candidate = Self::find(Some(&device.serial))?;
        setup_line(&candidate.handle)?;
        usb::claim_relay_interface(&mut candidate.handle)?;
        let written = usb::write_command(&candidate.handle, &command);
        usb::release_relay_interface(&mut candidate.handle);
        written?;

        cache.set(&device.serial, relay, state);
        info!(serial = %device.serial, relay = %relay, state = %state, "Relay switched");
        Ok(())
    }
}

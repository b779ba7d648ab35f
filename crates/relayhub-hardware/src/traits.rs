//! Relay driver trait definition.
//!
//! Every supported relay card family implements [`RelayDriver`]. The trait
//! is deliberately synchronous: discovery walks the USB bus or sysfs and
//! blocks, so callers run driver operations on a blocking thread.
//!
//! Drivers do not keep devices open between calls. [`RelayDriver::detect_one`]
//! hands out a [`DeviceHandle`] describing the device, and every later
//! operation re-opens the transport from that description.
//!
//! # Examples
//!
//! ```
//! use relayhub_core::{RelayIndex, RelayState};
//! use relayhub_hardware::mock::MockRelayDriver;
//! use relayhub_hardware::shadow::ShadowCache;
//! use relayhub_hardware::traits::RelayDriver;
//!
//! let cache = ShadowCache::new();
//! let (driver, handle) = MockRelayDriver::new();
//! handle.attach("MOCK-1", 8);
//!
//! let device = driver.detect_one(None, &cache)?;
//! let relay = RelayIndex::new(2).unwrap();
//! driver.set_relay(&device, relay, RelayState::On, &cache)?;
//!
//! assert_eq!(cache.get("MOCK-1", relay), RelayState::On);
//! # Ok::<(), relayhub_hardware::HardwareError>(())
//! ```

use crate::error::{HardwareError, Result};
use crate::shadow::ShadowCache;
use relayhub_core::{DeviceDescriptor, RelayFamily, RelayIndex, RelayState};
use std::fmt;

/// An opened (detected) relay device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    /// Family of the driver that detected the device.
    pub family: RelayFamily,

    /// Device serial, unique across all families.
    pub serial: String,

    /// Number of relays on the device.
    pub relay_count: u8,

    /// Human readable transport description.
    pub port: String,
}

impl DeviceHandle {
    pub fn new(
        family: RelayFamily,
        serial: impl Into<String>,
        relay_count: u8,
        port: impl Into<String>,
    ) -> Self {
        Self {
            family,
            serial: serial.into(),
            relay_count,
            port: port.into(),
        }
    }

    /// Descriptor of the device, as enumeration would report it.
    #[must_use]
    pub fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor::new(self.family, self.serial.clone(), self.relay_count)
    }

    /// Check that `relay` exists on this device.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::RelayOutOfRange` for indices above the relay
    /// count.
    pub fn check_relay(&self, relay: RelayIndex) -> Result<()> {
        if relay.as_u8() > self.relay_count {
            return Err(HardwareError::relay_out_of_range(relay, self.relay_count));
        }
        Ok(())
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} (serial {}, {} relays, {})",
            self.family, self.serial, self.relay_count, self.port
        )
    }
}

/// Map an `On`/`Off` state to the switch level a driver writes.
///
/// # Errors
///
/// Returns `HardwareError::InvalidState` for `Pulse` and `Invalid`, which no
/// card understands natively.
pub fn switch_level(state: RelayState) -> Result<bool> {
    match state {
        RelayState::On => Ok(true),
        RelayState::Off => Ok(false),
        RelayState::Pulse | RelayState::Invalid => Err(HardwareError::invalid_state(state)),
    }
}

/// Trait for relay card drivers.
///
/// All drivers must be thread-safe (`Send + Sync`) as the registry is shared
/// with the HTTP service.
///
/// # Shadow cache contract
///
/// - `enumerate` and `detect_one` register every serial they report with
///   [`ShadowCache::observe`].
/// - A successful `set_relay` records the new state with
///   [`ShadowCache::set`], whether or not the card can be read back.
pub trait RelayDriver: Send + Sync {
    /// Family this driver handles.
    fn family(&self) -> RelayFamily;

    /// List every attached device of this family.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be scanned at all.
    fn enumerate(&self, cache: &ShadowCache) -> Result<Vec<DeviceDescriptor>>;

    /// Open one device: the first one found when `serial` is `None`, or the
    /// one whose serial matches.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::NotFound` when no device matches.
    fn detect_one(&self, serial: Option<&str>, cache: &ShadowCache) -> Result<DeviceHandle>;

    /// Read a relay from the device.
    ///
    /// Returns `RelayState::Invalid` when the card cannot be queried.
    ///
    /// # Errors
    ///
    /// Returns an error on out-of-range relays and transport failures.
    fn get_relay(&self, device: &DeviceHandle, relay: RelayIndex) -> Result<RelayState>;

    /// Switch a relay `On` or `Off`.
    ///
    /// # Errors
    ///
    /// Returns an error on out-of-range relays, states other than `On`/`Off`
    /// and transport failures. The cache is left untouched on error.
    fn set_relay(
        &self,
        device: &DeviceHandle,
        relay: RelayIndex,
        state: RelayState,
        cache: &ShadowCache,
    ) -> Result<()>;

    /// Release any resources held for the device.
    fn release(&self, device: DeviceHandle) {
        drop(device);
    }
}

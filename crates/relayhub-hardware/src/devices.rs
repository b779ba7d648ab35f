//! Enum wrapper for relay driver dispatch.
//!
//! The registry holds a fixed, ordered list of drivers of different concrete
//! types. [`AnyRelayDriver`] gives them a single type so the list is a plain
//! `Vec`, and forwards every [`RelayDriver`] call to the wrapped driver.
//!
//! # Examples
//!
//! ```
//! use relayhub_core::RelayFamily;
//! use relayhub_hardware::devices::AnyRelayDriver;
//! use relayhub_hardware::mock::MockRelayDriver;
//! use relayhub_hardware::traits::RelayDriver;
//!
//! let (driver, _handle) = MockRelayDriver::new();
//! let any_driver = AnyRelayDriver::from(driver);
//!
//! assert_eq!(any_driver.family(), RelayFamily::Mock);
//! ```

#[cfg(feature = "hardware-usb")]
use crate::drivers::{Cge8Driver, Ch340Driver};
use crate::drivers::GpioDriver;
use crate::mock::MockRelayDriver;
use crate::shadow::ShadowCache;
use crate::traits::{DeviceHandle, RelayDriver};
use crate::Result;
use relayhub_core::{DeviceDescriptor, RelayFamily, RelayIndex, RelayState};

/// Enum wrapper for relay driver dispatch.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyRelayDriver {
    /// Sainsmart CH340G 16-channel card.
    #[cfg(feature = "hardware-usb")]
    Ch340(Ch340Driver),

    /// CGE FTDI 8-channel card.
    #[cfg(feature = "hardware-usb")]
    Cge8(Cge8Driver),

    /// sysfs GPIO relays.
    Gpio(GpioDriver),

    /// Mock relay bus for development and testing.
    Mock(MockRelayDriver),
}

macro_rules! dispatch {
    ($self:ident, $driver:ident => $call:expr) => {
        match $self {
            #[cfg(feature = "hardware-usb")]
            Self::Ch340($driver) => $call,
            #[cfg(feature = "hardware-usb")]
            Self::Cge8($driver) => $call,
            Self::Gpio($driver) => $call,
            Self::Mock($driver) => $call,
        }
    };
}

impl RelayDriver for AnyRelayDriver {
    fn family(&self) -> RelayFamily {
        dispatch!(self, driver => driver.family())
    }

    fn enumerate(&self, cache: &ShadowCache) -> Result<Vec<DeviceDescriptor>> {
        dispatch!(self, driver => driver.enumerate(cache))
    }

    fn detect_one(&self, serial: Option<&str>, cache: &ShadowCache) -> Result<DeviceHandle> {
        dispatch!(self, driver => driver.detect_one(serial, cache))
    }

    fn get_relay(&self, device: &DeviceHandle, relay: RelayIndex) -> Result<RelayState> {
        dispatch!(self, driver => driver.get_relay(device, relay))
    }

    fn set_relay(
        &self,
        device: &DeviceHandle,
        relay: RelayIndex,
        state: RelayState,
        cache: &ShadowCache,
    ) -> Result<()> {
        dispatch!(self, driver => driver.set_relay(device, relay, state, cache))
    }

    fn release(&self, device: DeviceHandle) {
        dispatch!(self, driver => driver.release(device))
    }
}

#[cfg(feature = "hardware-usb")]
impl From<Ch340Driver> for AnyRelayDriver {
    fn from(driver: Ch340Driver) -> Self {
        Self::Ch340(driver)
    }
}

#[cfg(feature = "hardware-usb")]
impl From<Cge8Driver> for AnyRelayDriver {
    fn from(driver: Cge8Driver) -> Self {
        Self::Cge8(driver)
    }
}

impl From<GpioDriver> for AnyRelayDriver {
    fn from(driver: GpioDriver) -> Self {
        Self::Gpio(driver)
    }
}

impl From<MockRelayDriver> for AnyRelayDriver {
    fn from(driver: MockRelayDriver) -> Self {
        Self::Mock(driver)
    }
}

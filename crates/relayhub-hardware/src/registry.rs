//! Driver registry.
//!
//! The registry owns the ordered driver list and the shared shadow cache,
//! and is the single entry point the rest of the system uses to talk to
//! relay hardware.
//!
//! # Detection order
//!
//! ```text
//!  detect(None)                 detect(Some("A9GXV5R9"))
//!      │                              │
//!      ▼                              ▼
//!  CH340 ──miss──► CGE8 ──miss──► GPIO ──miss──► mock... ──miss──► NotFound
//!      │hit           │hit           │hit
//!      ▼              ▼              ▼
//!  DeviceHandle   DeviceHandle   DeviceHandle
//! ```
//!
//! # Examples
//!
//! ```
//! use relayhub_core::{RelayIndex, RelayState};
//! use relayhub_hardware::mock::MockRelayDriver;
//! use relayhub_hardware::registry::DriverRegistry;
//! use relayhub_hardware::shadow::ShadowCache;
//!
//! let (driver, handle) = MockRelayDriver::new();
//! handle.attach("MOCK-1", 8);
//!
//! let mut registry = DriverRegistry::new(ShadowCache::new());
//! registry.register(driver);
//!
//! let device = registry.detect(None)?;
//! let relay = RelayIndex::new(5).unwrap();
//! registry.set_relay(&device, relay, RelayState::On)?;
//!
//! // The mock card is write-only: the answer comes from the shadow cache.
//! assert_eq!(registry.get_relay(&device, relay)?, RelayState::On);
//! # Ok::<(), relayhub_hardware::HardwareError>(())
//! ```

#[cfg(feature = "hardware-usb")]
use crate::drivers::{Cge8Driver, Ch340Driver};
use crate::devices::AnyRelayDriver;
use crate::drivers::{GpioConfig, GpioDriver};
use crate::inventory::DeviceInventory;
use crate::shadow::ShadowCache;
use crate::traits::{DeviceHandle, RelayDriver};
use crate::{HardwareError, Result};
use relayhub_core::{
    RelayFamily, RelayIndex, RelayState, constants::DEFAULT_PULSE_DURATION_SECS,
};
use std::time::Duration;
use tracing::{debug, info};

/// Ordered set of relay drivers sharing one shadow cache.
#[derive(Debug, Clone)]
pub struct DriverRegistry {
    drivers: Vec<AnyRelayDriver>,
    cache: ShadowCache,
    pulse_duration: Duration,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new(cache: ShadowCache) -> Self {
        Self {
            drivers: Vec::new(),
            cache,
            pulse_duration: Duration::from_secs(DEFAULT_PULSE_DURATION_SECS),
        }
    }

    /// Create a registry with every hardware family, in priority order.
    ///
    /// The GPIO driver is only registered when `gpio` wires at least one
    /// relay.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid GPIO settings.
    pub fn with_hardware(cache: ShadowCache, gpio: GpioConfig) -> Result<Self> {
        let mut registry = Self::new(cache);

        #[cfg(feature = "hardware-usb")]
        {
            registry.register(Ch340Driver::new());
            registry.register(Cge8Driver::new());
        }

        if gpio.is_enabled() {
            registry.register(GpioDriver::new(gpio)?);
        }

        info!(families = ?registry.families(), "Relay drivers registered");
        Ok(registry)
    }

    /// Set how long a pulse keeps the relay on. Zero means the default.
    #[must_use]
    pub fn with_pulse_duration(mut self, duration: Duration) -> Self {
        self.pulse_duration = if duration.is_zero() {
            Duration::from_secs(DEFAULT_PULSE_DURATION_SECS)
        } else {
            duration
        };
        self
    }

    /// Append a driver. Drivers are tried in registration order.
    pub fn register(&mut self, driver: impl Into<AnyRelayDriver>) {
        let driver = driver.into();
        debug!(family = %driver.family(), "Registering relay driver");
        self.drivers.push(driver);
    }

    /// Families of the registered drivers, in priority order.
    pub fn families(&self) -> Vec<RelayFamily> {
        self.drivers.iter().map(RelayDriver::family).collect()
    }

    /// Shared shadow cache.
    pub fn cache(&self) -> &ShadowCache {
        &self.cache
    }

    pub fn pulse_duration(&self) -> Duration {
        self.pulse_duration
    }

    /// Human readable card name of a family.
    #[must_use]
    pub fn card_name(&self, family: RelayFamily) -> &'static str {
        family.name()
    }

    fn driver_for(&self, family: RelayFamily) -> Result<&AnyRelayDriver> {
        self.drivers
            .iter()
            .find(|driver| driver.family() == family)
            .ok_or(HardwareError::NoDriver { family })
    }

    /// Find a device, trying each driver in order. First success wins.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::NotFound` if no driver finds a match.
    pub fn detect(&self, serial: Option<&str>) -> Result<DeviceHandle> {
        for driver in &self.drivers {
            match driver.detect_one(serial, &self.cache) {
                Ok(device) => {
                    debug!(device = %device, "Relay device detected");
                    return Ok(device);
                }
                Err(e) => debug!(family = %driver.family(), error = %e, "Detection miss"),
            }
        }
        Err(HardwareError::not_found(serial))
    }

    /// Current state of a relay.
    ///
    /// Write-only cards answer from the shadow cache.
    ///
    /// # Errors
    ///
    /// Returns an error for out-of-range relays or transport failures.
    pub fn get_relay(&self, device: &DeviceHandle, relay: RelayIndex) -> Result<RelayState> {
        device.check_relay(relay)?;
        let state = self.driver_for(device.family)?.get_relay(device, relay)?;
        if state == RelayState::Invalid {
            return Ok(self.cache.get(&device.serial, relay));
        }
        Ok(state)
    }

    /// State of every relay of the device, in index order.
    ///
    /// # Errors
    ///
    /// Fails on the first relay that cannot be read.
    pub fn read_relays(&self, device: &DeviceHandle) -> Result<Vec<(RelayIndex, RelayState)>> {
        RelayIndex::range(device.relay_count)
            .map(|relay| Ok((relay, self.get_relay(device, relay)?)))
            .collect()
    }

    /// Switch a relay.
    ///
    /// `Pulse` switches the relay on, waits the pulse duration on the calling
    /// thread, then switches it off.
    ///
    /// # Errors
    ///
    /// Returns an error for out-of-range relays, `Invalid` and transport
    /// failures.
    pub fn set_relay(
        &self,
        device: &DeviceHandle,
        relay: RelayIndex,
        state: RelayState,
    ) -> Result<()> {
        device.check_relay(relay)?;
        let driver = self.driver_for(device.family)?;

        match state {
            RelayState::Pulse => {
                driver.set_relay(device, relay, RelayState::On, &self.cache)?;
                std::thread::sleep(self.pulse_duration);
                driver.set_relay(device, relay, RelayState::Off, &self.cache)
            }
            _ => driver.set_relay(device, relay, state, &self.cache),
        }
    }

    /// Release a device handle.
    pub fn release(&self, device: DeviceHandle) {
        match self.driver_for(device.family) {
            Ok(driver) => driver.release(device),
            Err(_) => drop(device),
        }
    }

    /// Scan every registered driver.
    pub fn enumerate_all(&self) -> DeviceInventory {
        DeviceInventory::scan(&self.drivers, &self.cache)
    }
}

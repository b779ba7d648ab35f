//! Relays wired directly to GPIO pins, driven through Linux sysfs.
//!
//! Each relay is mapped to one GPIO line. A line is exported on first use
//! by writing its number to `<root>/export`, then set up as an output and
//! switched by writing to `<root>/gpio<N>/value`:
//!
//! ```text
//! /sys/class/gpio/
//! ├── export              <- "17"
//! └── gpio17/
//!     ├── direction       <- "out"
//!     └── value           <- active_value (on) / inverse (off)
//! ```
//!
//! Unlike the USB cards the pins can be read back.

use crate::{
    HardwareError, Result,
    shadow::ShadowCache,
    traits::{DeviceHandle, RelayDriver, switch_level},
};
use relayhub_core::{DeviceDescriptor, RelayFamily, RelayIndex, RelayState};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Serial reported for the GPIO relay bank.
pub const GPIO_SERIAL: &str = "GPIO";

/// Highest number of GPIO relays.
pub const MAX_GPIO_RELAYS: u8 = 8;

/// Default sysfs GPIO directory.
pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/gpio";

const PORT_NAME: &str = "sysfs GPIO";

fn default_active_value() -> u8 {
    1
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from(DEFAULT_SYSFS_ROOT)
}

/// GPIO relay wiring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioConfig {
    /// Number of relays in use.
    pub num_relays: u8,

    /// Pin level that energises a relay (`0` or `1`).
    #[serde(default = "default_active_value")]
    pub active_value: u8,

    /// GPIO line for relay 1, relay 2, ...
    pub pins: Vec<u32>,

    /// sysfs GPIO directory.
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: PathBuf,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            num_relays: 0,
            active_value: default_active_value(),
            pins: Vec::new(),
            sysfs_root: default_sysfs_root(),
        }
    }
}

impl GpioConfig {
    /// Usable relay count: bounded by the pin list and the family limit.
    #[must_use]
    pub fn relay_count(&self) -> u8 {
        let pins = u8::try_from(self.pins.len()).unwrap_or(u8::MAX);
        self.num_relays.min(pins).min(MAX_GPIO_RELAYS)
    }

    /// Returns `true` if at least one relay is wired.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.relay_count() > 0
    }

    /// Check the active level.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `active_value` is not `0` or `1`.
    pub fn validate(&self) -> Result<()> {
        if self.active_value > 1 {
            return Err(HardwareError::configuration(format!(
                "active_value must be 0 or 1, got {}",
                self.active_value
            )));
        }
        Ok(())
    }
}

/// Driver for sysfs GPIO relays.
#[derive(Debug, Clone)]
pub struct GpioDriver {
    config: GpioConfig,
}

impl GpioDriver {
    /// Create a driver for the given wiring.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid active level.
    pub fn new(config: GpioConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GpioConfig {
        &self.config
    }

    fn root(&self) -> &Path {
        &self.config.sysfs_root
    }

    fn is_present(&self) -> bool {
        self.config.is_enabled() && self.root().is_dir()
    }

    fn pin(&self, relay: RelayIndex) -> Result<u32> {
        self.config
            .pins
            .get(relay.slot())
            .copied()
            .ok_or_else(|| HardwareError::relay_out_of_range(relay, self.config.relay_count()))
    }

    /// Export the pin if needed and return its sysfs directory.
    fn export(&self, pin: u32) -> Result<PathBuf> {
        let dir = self.root().join(format!("gpio{pin}"));
        if !dir.is_dir() {
            debug!(pin, "Exporting GPIO pin");
            fs::write(self.root().join("export"), pin.to_string())?;
        }
        Ok(dir)
    }

    fn level(&self, on: bool) -> u8 {
        if on {
            self.config.active_value
        } else {
            1 - self.config.active_value
        }
    }

    fn handle(&self) -> DeviceHandle {
        DeviceHandle::new(
            RelayFamily::GenericGpio,
            GPIO_SERIAL,
            self.config.relay_count(),
            PORT_NAME,
        )
    }
}

impl RelayDriver for GpioDriver {
    fn family(&self) -> RelayFamily {
        RelayFamily::GenericGpio
    }

    fn enumerate(&self, cache: &ShadowCache) -> Result<Vec<DeviceDescriptor>> {
        if !self.is_present() {
            return Ok(Vec::new());
        }
        cache.observe(GPIO_SERIAL);
        Ok(vec![self.handle().descriptor()])
    }

    fn detect_one(&self, serial: Option<&str>, cache: &ShadowCache) -> Result<DeviceHandle> {
        if !self.is_present() || serial.is_some_and(|wanted| wanted != GPIO_SERIAL) {
            return Err(HardwareError::not_found(serial));
        }
        cache.observe(GPIO_SERIAL);
        Ok(self.handle())
    }

    fn get_relay(&self, device: &DeviceHandle, relay: RelayIndex) -> Result<RelayState> {
        device.check_relay(relay)?;
        let dir = self.export(self.pin(relay)?)?;
        let value = fs::read_to_string(dir.join("value"))?;

        let on = match value.trim() {
            "0" => self.config.active_value == 0,
            "1" => self.config.active_value == 1,
            other => {
                return Err(HardwareError::transport(format!(
                    "unexpected GPIO value {other:?}"
                )));
            }
        };
        Ok(if on { RelayState::On } else { RelayState::Off })
    }

    fn set_relay(
        &self,
        device: &DeviceHandle,
        relay: RelayIndex,
        state: RelayState,
        cache: &ShadowCache,
    ) -> Result<()> {
        device.check_relay(relay)?;
        let on = switch_level(state)?;
        let pin = self.pin(relay)?;
        let dir = self.export(pin)?;

        fs::write(dir.join("direction"), "out")?;
        fs::write(dir.join("value"), self.level(on).to_string())?;

        cache.set(&device.serial, relay, state);
        info!(pin, relay = %relay, state = %state, "GPIO relay switched");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn relay(n: u8) -> RelayIndex {
        RelayIndex::new(n).unwrap()
    }

    /// Fake sysfs tree with the given pins already exported.
    fn fake_sysfs(pins: &[u32]) -> TempDir {
        let root = tempfile::tempdir().unwrap();
        for pin in pins {
            let dir = root.path().join(format!("gpio{pin}"));
            fs::create_dir(&dir).unwrap();
            fs::write(dir.join("value"), "0\n").unwrap();
            fs::write(dir.join("direction"), "in\n").unwrap();
        }
        root
    }

    fn driver(root: &TempDir, pins: Vec<u32>, active_value: u8) -> GpioDriver {
        GpioDriver::new(GpioConfig {
            num_relays: u8::try_from(pins.len()).unwrap(),
            active_value,
            pins,
            sysfs_root: root.path().to_path_buf(),
        })
        .unwrap()
    }

    #[test]
    fn test_relay_count_bounds() {
        let mut config = GpioConfig {
            num_relays: 4,
            pins: vec![1, 2],
            ..GpioConfig::default()
        };
        assert_eq!(config.relay_count(), 2);

        config.pins = (0..12).collect();
        config.num_relays = 12;
        assert_eq!(config.relay_count(), MAX_GPIO_RELAYS);

        assert!(!GpioConfig::default().is_enabled());
    }

    #[test]
    fn test_invalid_active_value() {
        let config = GpioConfig {
            active_value: 2,
            ..GpioConfig::default()
        };
        assert!(matches!(
            GpioDriver::new(config),
            Err(HardwareError::Configuration { .. })
        ));
    }

    #[test]
    fn test_disabled_without_pins() {
        let root = fake_sysfs(&[]);
        let driver = driver(&root, vec![], 1);
        let cache = ShadowCache::new();

        assert!(driver.enumerate(&cache).unwrap().is_empty());
        assert!(driver.detect_one(None, &cache).unwrap_err().is_not_found());
    }

    #[test]
    fn test_enumerate_and_detect() {
        let root = fake_sysfs(&[17, 18]);
        let driver = driver(&root, vec![17, 18], 1);
        let cache = ShadowCache::new();

        let devices = driver.enumerate(&cache).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].serial, GPIO_SERIAL);
        assert_eq!(devices[0].relay_count, 2);
        assert!(cache.contains(GPIO_SERIAL));

        assert!(driver.detect_one(Some("GPIO"), &cache).is_ok());
        assert!(driver.detect_one(Some("A9GXV5R9"), &cache).is_err());
    }

    #[test]
    fn test_set_and_read_back_active_high() {
        let root = fake_sysfs(&[17, 18]);
        let driver = driver(&root, vec![17, 18], 1);
        let cache = ShadowCache::new();
        let device = driver.detect_one(None, &cache).unwrap();

        driver
            .set_relay(&device, relay(2), RelayState::On, &cache)
            .unwrap();

        let gpio18 = root.path().join("gpio18");
        assert_eq!(fs::read_to_string(gpio18.join("value")).unwrap(), "1");
        assert_eq!(fs::read_to_string(gpio18.join("direction")).unwrap(), "out");
        assert_eq!(driver.get_relay(&device, relay(2)).unwrap(), RelayState::On);
        assert_eq!(driver.get_relay(&device, relay(1)).unwrap(), RelayState::Off);
        assert_eq!(cache.get(GPIO_SERIAL, relay(2)), RelayState::On);
    }

    #[test]
    fn test_active_low() {
        let root = fake_sysfs(&[5]);
        let driver = driver(&root, vec![5], 0);
        let cache = ShadowCache::new();
        let device = driver.detect_one(None, &cache).unwrap();

        driver
            .set_relay(&device, relay(1), RelayState::On, &cache)
            .unwrap();
        assert_eq!(
            fs::read_to_string(root.path().join("gpio5/value")).unwrap(),
            "0"
        );
        assert_eq!(driver.get_relay(&device, relay(1)).unwrap(), RelayState::On);

        driver
            .set_relay(&device, relay(1), RelayState::Off, &cache)
            .unwrap();
        assert_eq!(driver.get_relay(&device, relay(1)).unwrap(), RelayState::Off);
    }

    #[test]
    fn test_unexported_pin_is_exported() {
        let root = fake_sysfs(&[]);
        let driver = driver(&root, vec![22], 1);
        let cache = ShadowCache::new();
        let device = driver.detect_one(None, &cache).unwrap();

        // Nothing creates gpio22 in a fake tree, so the write fails after export.
        let result = driver.set_relay(&device, relay(1), RelayState::On, &cache);
        assert!(matches!(result, Err(HardwareError::Io(_))));
        assert_eq!(
            fs::read_to_string(root.path().join("export")).unwrap(),
            "22"
        );
        assert_eq!(cache.get(GPIO_SERIAL, relay(1)), RelayState::Off);
    }

    #[test]
    fn test_out_of_range() {
        let root = fake_sysfs(&[17]);
        let driver = driver(&root, vec![17], 1);
        let cache = ShadowCache::new();
        let device = driver.detect_one(None, &cache).unwrap();

        assert!(matches!(
            driver.set_relay(&device, relay(2), RelayState::On, &cache),
            Err(HardwareError::RelayOutOfRange { .. })
        ));
    }
}

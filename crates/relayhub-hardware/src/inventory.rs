//! Device inventory: what is attached right now.
//!
//! An inventory is a fresh scan of every registered driver, concatenated in
//! registry order. Nothing is cached between scans, so a replugged card shows
//! up (or disappears) on the next scan.
//!
//! A family whose transport cannot be scanned is logged and contributes no
//! devices; the other families are still listed.

use crate::devices::AnyRelayDriver;
use crate::shadow::ShadowCache;
use crate::traits::RelayDriver;
use relayhub_core::DeviceDescriptor;
use tracing::{debug, warn};

/// Snapshot of the attached relay devices, in enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInventory {
    devices: Vec<DeviceDescriptor>,
}

impl DeviceInventory {
    /// Scan every driver in order.
    pub fn scan(drivers: &[AnyRelayDriver], cache: &ShadowCache) -> Self {
        let mut devices = Vec::new();
        for driver in drivers {
            match driver.enumerate(cache) {
                Ok(found) => devices.extend(found),
                Err(e) => warn!(family = %driver.family(), error = %e, "Enumeration failed"),
            }
        }
        debug!(count = devices.len(), "Device inventory scanned");
        Self { devices }
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceDescriptor> {
        self.devices.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Look a device up by serial.
    #[must_use]
    pub fn find(&self, serial: &str) -> Option<&DeviceDescriptor> {
        self.devices.iter().find(|device| device.serial == serial)
    }
}

impl<'a> IntoIterator for &'a DeviceInventory {
    type Item = &'a DeviceDescriptor;
    type IntoIter = std::slice::Iter<'a, DeviceDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRelayDriver;
    use relayhub_core::RelayFamily;

    #[test]
    fn test_scan_in_registry_order() {
        let (first, first_handle) = MockRelayDriver::new();
        let (second, second_handle) = MockRelayDriver::new();
        first_handle.attach("A", 8);
        second_handle.attach("B", 16);
        first_handle.attach("C", 4);

        let drivers = vec![AnyRelayDriver::from(first), AnyRelayDriver::from(second)];
        let inventory = DeviceInventory::scan(&drivers, &ShadowCache::new());

        let serials: Vec<&str> = inventory.iter().map(|d| d.serial.as_str()).collect();
        assert_eq!(serials, vec!["A", "C", "B"]);
    }

    #[test]
    fn test_failing_family_is_skipped() {
        let (broken, broken_handle) = MockRelayDriver::new();
        let (healthy, healthy_handle) = MockRelayDriver::new();
        broken_handle.attach("A", 8);
        broken_handle.fail_next_operation();
        healthy_handle.attach("B", 8);

        let drivers = vec![AnyRelayDriver::from(broken), AnyRelayDriver::from(healthy)];
        let inventory = DeviceInventory::scan(&drivers, &ShadowCache::new());

        assert_eq!(inventory.len(), 1);
        assert!(inventory.find("B").is_some());
        assert!(inventory.find("A").is_none());
    }

    #[test]
    fn test_scan_is_fresh() {
        let (driver, handle) = MockRelayDriver::new();
        let drivers = vec![AnyRelayDriver::from(driver)];
        let cache = ShadowCache::new();

        assert!(DeviceInventory::scan(&drivers, &cache).is_empty());

        handle.attach("A", 8);
        assert_eq!(DeviceInventory::scan(&drivers, &cache).len(), 1);

        handle.detach("A");
        assert!(DeviceInventory::scan(&drivers, &cache).is_empty());
    }

    #[test]
    fn test_scan_registers_serials() {
        let (driver, handle) = MockRelayDriver::new();
        handle.attach("A", 8);
        let cache = ShadowCache::new();

        let inventory = DeviceInventory::scan(&[AnyRelayDriver::from(driver)], &cache);
        assert_eq!(inventory.find("A").unwrap().family, RelayFamily::Mock);
        assert!(cache.contains("A"));
    }
}

//! Mock relay card driver for testing and development.
//!
//! The mock keeps a simulated bus of relay cards in memory. Tests plug and
//! unplug cards, inject transport failures and choose whether the cards can
//! be read back, all through a [`MockRelayHandle`].

use crate::{
    HardwareError, Result,
    shadow::ShadowCache,
    traits::{DeviceHandle, RelayDriver, switch_level},
};
use relayhub_core::{
    DeviceDescriptor, RelayFamily, RelayIndex, RelayState, constants::MAX_NUM_RELAYS,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One simulated card on the bus.
#[derive(Debug, Clone)]
struct MockCard {
    serial: String,
    relay_count: u8,
    relays: [bool; MAX_NUM_RELAYS as usize],
}

#[derive(Debug, Default)]
struct MockBus {
    cards: Vec<MockCard>,
    readback: bool,
    fail_next: bool,
    writes: usize,
}

impl MockBus {
    fn take_failure(&mut self, operation: &str) -> Result<()> {
        if std::mem::take(&mut self.fail_next) {
            return Err(HardwareError::transport(format!(
                "injected failure during {operation}"
            )));
        }
        Ok(())
    }

    fn card_mut(&mut self, serial: &str) -> Result<&mut MockCard> {
        self.cards
            .iter_mut()
            .find(|card| card.serial == serial)
            .ok_or_else(|| HardwareError::not_found(Some(serial)))
    }
}

fn lock(bus: &Mutex<MockBus>) -> MutexGuard<'_, MockBus> {
    bus.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock relay card driver.
///
/// Cards attached through the handle show up in enumeration in attach order.
/// By default the cards are write-only, like the USB families:
/// [`RelayDriver::get_relay`] answers `Invalid`.
///
/// # Examples
///
/// ```
/// use relayhub_hardware::mock::MockRelayDriver;
/// use relayhub_hardware::shadow::ShadowCache;
/// use relayhub_hardware::traits::RelayDriver;
///
/// let (driver, handle) = MockRelayDriver::new();
/// handle.attach("MOCK-A", 8);
/// handle.attach("MOCK-B", 16);
///
/// let devices = driver.enumerate(&ShadowCache::new()).unwrap();
/// assert_eq!(devices.len(), 2);
/// assert_eq!(devices[1].relay_count, 16);
/// ```
#[derive(Debug, Clone)]
pub struct MockRelayDriver {
    bus: Arc<Mutex<MockBus>>,
    name: String,
}

impl MockRelayDriver {
    /// Create a new mock driver with an empty bus.
    pub fn new() -> (Self, MockRelayHandle) {
        Self::with_name("Mock relay bus".to_string())
    }

    /// Create a new mock driver with a custom name (used in port strings).
    pub fn with_name(name: String) -> (Self, MockRelayHandle) {
        let bus = Arc::new(Mutex::new(MockBus::default()));
        let driver = Self {
            bus: Arc::clone(&bus),
            name,
        };
        (driver, MockRelayHandle { bus })
    }

    /// Name given to this mock bus.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl RelayDriver for MockRelayDriver {
    fn family(&self) -> RelayFamily {
        RelayFamily::Mock
    }

    fn enumerate(&self, cache: &ShadowCache) -> Result<Vec<DeviceDescriptor>> {
        let mut bus = lock(&self.bus);
        bus.take_failure("enumerate")?;

        Ok(bus
            .cards
            .iter()
            .map(|card| {
                cache.observe(&card.serial);
                DeviceDescriptor::new(RelayFamily::Mock, card.serial.clone(), card.relay_count)
            })
            .collect())
    }

    fn detect_one(&self, serial: Option<&str>, cache: &ShadowCache) -> Result<DeviceHandle> {
        let mut bus = lock(&self.bus);
        bus.take_failure("detect")?;

        let card = bus
            .cards
            .iter()
            .find(|card| serial.is_none_or(|wanted| card.serial == wanted))
            .ok_or_else(|| HardwareError::not_found(serial))?;

        cache.observe(&card.serial);
        Ok(DeviceHandle::new(
            RelayFamily::Mock,
            card.serial.clone(),
            card.relay_count,
            self.name.clone(),
        ))
    }

    fn get_relay(&self, device: &DeviceHandle, relay: RelayIndex) -> Result<RelayState> {
        device.check_relay(relay)?;
        let mut bus = lock(&self.bus);
        bus.take_failure("get_relay")?;

        let readback = bus.readback;
        let card = bus.card_mut(&device.serial)?;
        if !readback {
            return Ok(RelayState::Invalid);
        }
        Ok(if card.relays[relay.slot()] {
            RelayState::On
        } else {
            RelayState::Off
        })
    }

    fn set_relay(
        &self,
        device: &DeviceHandle,
        relay: RelayIndex,
        state: RelayState,
        cache: &ShadowCache,
    ) -> Result<()> {
        device.check_relay(relay)?;
        let level = switch_level(state)?;
        let mut bus = lock(&self.bus);
        bus.take_failure("set_relay")?;

        bus.card_mut(&device.serial)?.relays[relay.slot()] = level;
        bus.writes += 1;
        cache.set(&device.serial, relay, state);
        Ok(())
    }
}

/// Handle for controlling a mock relay bus.
///
/// Clones share the same bus.
#[derive(Debug, Clone)]
pub struct MockRelayHandle {
    bus: Arc<Mutex<MockBus>>,
}

impl MockRelayHandle {
    /// Plug a card in. A card with the same serial is replaced.
    pub fn attach(&self, serial: impl Into<String>, relay_count: u8) {
        let serial = serial.into();
        let mut bus = lock(&self.bus);
        bus.cards.retain(|card| card.serial != serial);
        bus.cards.push(MockCard {
            serial,
            relay_count: relay_count.min(MAX_NUM_RELAYS),
            relays: [false; MAX_NUM_RELAYS as usize],
        });
    }

    /// Unplug a card. Returns `false` if no card had that serial.
    pub fn detach(&self, serial: &str) -> bool {
        let mut bus = lock(&self.bus);
        let before = bus.cards.len();
        bus.cards.retain(|card| card.serial != serial);
        bus.cards.len() != before
    }

    /// Make the next driver operation fail with a transport error.
    pub fn fail_next_operation(&self) {
        lock(&self.bus).fail_next = true;
    }

    /// Choose whether the cards can be read back.
    pub fn set_readback(&self, enabled: bool) {
        lock(&self.bus).readback = enabled;
    }

    /// Physical position of a relay, `None` if the card is not attached.
    pub fn relay_is_on(&self, serial: &str, relay: RelayIndex) -> Option<bool> {
        lock(&self.bus)
            .cards
            .iter()
            .find(|card| card.serial == serial)
            .map(|card| card.relays[relay.slot()])
    }

    /// Number of successful relay writes so far.
    pub fn write_count(&self) -> usize {
        lock(&self.bus).writes
    }
}

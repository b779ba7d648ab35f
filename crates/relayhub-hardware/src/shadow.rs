//! Shadow copy of the last commanded relay states.
//!
//! The USB relay cards supported here are write-only: they accept switch
//! commands but cannot report the current position of a relay. The shadow
//! cache remembers what was last written to each device so that reads can
//! still be answered.
//!
//! Entries are keyed by device serial and hold one state per possible relay.
//! An entry is created the first time a serial is seen (enumeration,
//! detection or a write) with every relay `Off`.
//!
//! # Examples
//!
//! ```
//! use relayhub_core::{RelayIndex, RelayState};
//! use relayhub_hardware::shadow::ShadowCache;
//!
//! let cache = ShadowCache::new();
//! let relay = RelayIndex::new(3).unwrap();
//!
//! assert_eq!(cache.get("A9GXV5R9", relay), RelayState::Invalid);
//!
//! cache.set("A9GXV5R9", relay, RelayState::On);
//! assert_eq!(cache.get("A9GXV5R9", relay), RelayState::On);
//! ```

use relayhub_core::{RelayIndex, RelayState, constants::MAX_NUM_RELAYS};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type StateTable = [RelayState; MAX_NUM_RELAYS as usize];

/// Process-wide map from device serial to last commanded relay states.
///
/// Cloning the cache is cheap and every clone shares the same table.
#[derive(Debug, Clone, Default)]
pub struct ShadowCache {
    entries: Arc<Mutex<HashMap<String, StateTable>>>,
}

impl ShadowCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, StateTable>> {
        // A panic while holding the lock cannot leave a table half-written.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last commanded state of a relay, `Invalid` for an unknown serial.
    #[must_use]
    pub fn get(&self, serial: &str, relay: RelayIndex) -> RelayState {
        self.entries()
            .get(serial)
            .map_or(RelayState::Invalid, |table| table[relay.slot()])
    }

    /// Record the state of a relay, creating the entry if needed.
    pub fn set(&self, serial: &str, relay: RelayIndex, state: RelayState) {
        let mut entries = self.entries();
        let table = entries
            .entry(serial.to_string())
            .or_insert([RelayState::Off; MAX_NUM_RELAYS as usize]);
        table[relay.slot()] = state;
    }

    /// Make sure an entry exists for `serial` without touching its states.
    pub fn observe(&self, serial: &str) {
        self.entries()
            .entry(serial.to_string())
            .or_insert([RelayState::Off; MAX_NUM_RELAYS as usize]);
    }

    /// Returns `true` if the serial has been seen.
    #[must_use]
    pub fn contains(&self, serial: &str) -> bool {
        self.entries().contains_key(serial)
    }

    /// Number of known serials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relay(n: u8) -> RelayIndex {
        RelayIndex::new(n).unwrap()
    }

    #[test]
    fn test_unknown_serial_is_invalid() {
        let cache = ShadowCache::new();
        assert_eq!(cache.get("nope", relay(1)), RelayState::Invalid);
        assert!(!cache.contains("nope"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_observe_defaults_to_off() {
        let cache = ShadowCache::new();
        cache.observe("1a86:7523:4");

        assert!(cache.contains("1a86:7523:4"));
        for index in RelayIndex::range(16) {
            assert_eq!(cache.get("1a86:7523:4", index), RelayState::Off);
        }
    }

    #[test]
    fn test_observe_keeps_existing_state() {
        let cache = ShadowCache::new();
        cache.set("S1", relay(2), RelayState::On);
        cache.observe("S1");
        assert_eq!(cache.get("S1", relay(2)), RelayState::On);
    }

    #[test]
    fn test_set_then_get() {
        let cache = ShadowCache::new();
        cache.set("S1", relay(16), RelayState::On);

        assert_eq!(cache.get("S1", relay(16)), RelayState::On);
        assert_eq!(cache.get("S1", relay(15)), RelayState::Off);
    }

    #[test]
    fn test_last_write_wins() {
        let cache = ShadowCache::new();
        cache.set("S1", relay(1), RelayState::Off);
        cache.set("S1", relay(1), RelayState::On);
        cache.set("S1", relay(1), RelayState::Off);
        assert_eq!(cache.get("S1", relay(1)), RelayState::Off);
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = ShadowCache::new();
        let other = cache.clone();

        other.set("S1", relay(4), RelayState::On);
        assert_eq!(cache.get("S1", relay(4)), RelayState::On);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(other.is_empty());
    }

    #[test]
    fn test_serials_are_independent() {
        let cache = ShadowCache::new();
        cache.set("S1", relay(1), RelayState::On);
        cache.observe("S2");
        assert_eq!(cache.get("S2", relay(1)), RelayState::Off);
    }
}

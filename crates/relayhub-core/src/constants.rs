//! Core constants shared by the relay drivers, the board store and the
//! HTTP front end.
//!
//! # Relay numbering
//!
//! Relays are always addressed with a 1-based index. A card never has more
//! than [`MAX_NUM_RELAYS`] relays, so every per-card state table is sized to
//! that bound regardless of the real relay count of the device.
//!
//! ```
//! use relayhub_core::constants::{FIRST_RELAY, MAX_NUM_RELAYS};
//!
//! fn is_addressable(relay: u8) -> bool {
//!     (FIRST_RELAY..=MAX_NUM_RELAYS).contains(&relay)
//! }
//!
//! assert!(is_addressable(1));
//! assert!(is_addressable(16));
//! assert!(!is_addressable(0));
//! assert!(!is_addressable(17));
//! ```

// ============================================================================
// Relay Addressing
// ============================================================================

/// Index of the first relay on every card.
pub const FIRST_RELAY: u8 = 1;

/// Highest relay index any supported card can expose.
pub const MAX_NUM_RELAYS: u8 = 16;

/// Number of relay labels kept per board and per server.
pub const RELAY_LABEL_COUNT: usize = MAX_NUM_RELAYS as usize;

/// Maximum length of a device serial string.
///
/// USB string descriptors read from the cards are truncated to this length.
pub const MAX_SERIAL_LEN: usize = 32;

// ============================================================================
// HTTP API Error Codes
// ============================================================================

/// No physical device matches the requested identity.
pub const ERROR_NO_DEVICE: u16 = 1001;

/// The route is only valid in the other addressing mode (boards vs. card).
pub const ERROR_UNAVAILABLE: u16 = 1002;

/// Malformed relay index, relay value, board id or path.
pub const ERROR_INVALID_PARAMETER: u16 = 1003;

// ============================================================================
// Service Defaults
// ============================================================================

/// Default TCP port of the HTTP service.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default duration of a relay pulse, in seconds.
///
/// A configured value of `0` falls back to this default.
pub const DEFAULT_PULSE_DURATION_SECS: u64 = 1;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "/etc/relayhub.toml";

/// Default USB transfer timeout (milliseconds).
///
/// Bounds every control and bulk transfer so that a stalled device never
/// blocks the request loop for long.
pub const DEFAULT_USB_TIMEOUT_MS: u64 = 5000;

/// Prefix of the label given to relays without a configured one.
///
/// ```
/// use relayhub_core::constants::DEFAULT_LABEL_PREFIX;
///
/// assert_eq!(format!("{DEFAULT_LABEL_PREFIX} 3"), "My appliance 3");
/// ```
pub const DEFAULT_LABEL_PREFIX: &str = "My appliance";

/// Build the default label for a 1-based relay number.
#[must_use]
pub fn default_relay_label(relay: usize) -> String {
    format!("{DEFAULT_LABEL_PREFIX} {relay}")
}

/// Build the full table of default relay labels.
#[must_use]
pub fn default_relay_labels() -> Vec<String> {
    (1..=RELAY_LABEL_COUNT).map(default_relay_label).collect()
}

//! Error types for relay driver operations.
//!
//! Every driver failure ends up in one of two buckets for the HTTP API:
//! the device could not be found (`NotFound`), or it was found but talking
//! to it failed (transport errors). Both are reported to clients as
//! "no compatible device"; the distinction only matters for logging.

use relayhub_core::{RelayFamily, RelayIndex, RelayState};

/// Result type alias for relay driver operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during relay driver operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// No attached device matches the requested identity.
    #[error("No relay device found: {device}")]
    NotFound { device: String },

    /// Relay index beyond the relay count of the device.
    #[error("Relay {relay} out of range, device has {relay_count} relays")]
    RelayOutOfRange { relay: RelayIndex, relay_count: u8 },

    /// The driver cannot apply this state directly.
    #[error("Cannot apply relay state {state}")]
    InvalidState { state: RelayState },

    /// No driver is registered for the requested family.
    #[error("No driver registered for {family}")]
    NoDriver { family: RelayFamily },

    /// Transport level failure talking to a device.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Driver configuration error.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// libusb failure.
    #[cfg(feature = "hardware-usb")]
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new not found error.
    ///
    /// `serial` is `None` when any device of the family would have done.
    pub fn not_found(serial: Option<&str>) -> Self {
        Self::NotFound {
            device: serial.unwrap_or("any device").to_string(),
        }
    }

    /// Create a new relay out of range error.
    pub fn relay_out_of_range(relay: RelayIndex, relay_count: u8) -> Self {
        Self::RelayOutOfRange { relay, relay_count }
    }

    /// Create a new invalid state error.
    pub fn invalid_state(state: RelayState) -> Self {
        Self::InvalidState { state }
    }

    /// Create a new transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if the error means the device is simply absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::NoDriver { .. })
    }
}

//! Relay card hardware layer for relayhub.
//!
//! This crate hides the differences between the supported relay card
//! families behind one driver contract, and remembers the last commanded
//! state of cards that cannot be read back.
//!
//! # Layout
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │ DriverRegistry                             │
//! │   detect / get_relay / set_relay / scan    │
//! │                                            │
//! │   ┌────────┐ ┌────────┐ ┌──────┐ ┌──────┐  │      ┌─────────────┐
//! │   │ CH340  │ │ CGE8   │ │ GPIO │ │ Mock │──┼─────►│ ShadowCache │
//! │   └────────┘ └────────┘ └──────┘ └──────┘  │      └─────────────┘
//! │        AnyRelayDriver (enum dispatch)      │
//! └────────────────────────────────────────────┘
//! ```
//!
//! - [`traits::RelayDriver`]: the five operations every family implements.
//! - [`registry::DriverRegistry`]: ordered drivers plus the shared cache.
//! - [`inventory::DeviceInventory`]: a fresh scan of every family.
//! - [`shadow::ShadowCache`]: last commanded state per serial.
//!
//! # Blocking I/O
//!
//! Driver operations block (libusb transfers, sysfs writes, pulse sleeps).
//! Async callers must run them on a blocking thread, e.g. with
//! `tokio::task::spawn_blocking`.
//!
//! # Features
//!
//! - `hardware-usb` (default): the CH340 and CGE8 USB drivers, via `rusb`.

pub mod devices;
pub mod drivers;
pub mod error;
pub mod inventory;
pub mod mock;
pub mod registry;
pub mod shadow;
pub mod traits;

// Re-export commonly used types for convenience
pub use devices::AnyRelayDriver;
pub use drivers::{GpioConfig, GpioDriver};
pub use error::{HardwareError, Result};
pub use inventory::DeviceInventory;
pub use registry::DriverRegistry;
pub use shadow::ShadowCache;
pub use traits::{DeviceHandle, RelayDriver};

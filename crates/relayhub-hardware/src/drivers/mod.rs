//! Hardware relay card drivers.
//!
//! | Family | Transport | Read back |
//! |---|---|---|
//! | [`ch340`] | USB bulk (`1a86:7523`) | no |
//! | [`cge8`] | FTDI FT232R (`0403:6001`) | no |
//! | [`gpio`] | Linux sysfs GPIO | yes |
//!
//! The USB drivers are only built with the `hardware-usb` feature.

#[cfg(feature = "hardware-usb")]
pub mod cge8;
#[cfg(feature = "hardware-usb")]
pub mod ch340;
pub mod gpio;
#[cfg(feature = "hardware-usb")]
mod usb;

#[cfg(feature = "hardware-usb")]
pub use cge8::Cge8Driver;
#[cfg(feature = "hardware-usb")]
pub use ch340::Ch340Driver;
pub use gpio::{GpioConfig, GpioDriver};

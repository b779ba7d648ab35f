//! Mock device implementations for testing and development.
//!
//! This module provides a simulated relay card bus that can be controlled
//! programmatically without requiring physical hardware.

pub mod relay;

pub use relay::{MockRelayDriver, MockRelayHandle};

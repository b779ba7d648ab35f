//! Board configuration and serial resolution for relayhub.
//!
//! - [`config`]: the TOML configuration file (server, GPIO and boards).
//! - [`store`]: the declared boards, in declaration order.
//! - [`resolver`]: binds `AUTO`/`FIRST` boards to attached devices.
//!
//! # Examples
//!
//! ```
//! use relayhub_boards::{RelayhubConfig, SerialResolver};
//! use relayhub_core::BoardId;
//! use relayhub_hardware::mock::MockRelayDriver;
//! use relayhub_hardware::{DriverRegistry, ShadowCache};
//!
//! let mut config = RelayhubConfig::from_toml_str(
//!     r#"
//!     [[boards]]
//!     id = 1
//!     serial = "AUTO"
//!     num_relays = 8
//!     "#,
//! )
//! .unwrap();
//!
//! let (driver, handle) = MockRelayDriver::new();
//! handle.attach("MOCK-1", 8);
//! let mut registry = DriverRegistry::new(ShadowCache::new());
//! registry.register(driver);
//!
//! let board = BoardId::new(1).unwrap();
//! let device = SerialResolver::new(&registry).resolve(&mut config.boards, board).unwrap();
//! assert_eq!(device.serial, "MOCK-1");
//! ```

pub mod config;
pub mod error;
pub mod resolver;
pub mod store;

pub use config::{RelayhubConfig, ServerConfig};
pub use error::{BoardError, BoardResult, ConfigError, ConfigResult};
pub use resolver::{BoardResolution, SerialResolver};
pub use store::{BoardConfig, BoardStore};

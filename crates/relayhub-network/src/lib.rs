//! HTTP control surface for relayhub.
//!
//! This crate turns HTTP requests into relay operations. hyper parses each
//! request; the router sends it to a card, a serial or a board and renders
//! JSON or HTML answers.
//!
//! # Components
//!
//! - **route**: path classification (`/api/card`, `/api/serial`, `/api/board`, ...)
//! - **router**: the request handling context (registry, boards, options)
//! - **response**: the `{"meta":..,"data":..}` envelope and response headers
//! - **html**: status/control page, shutdown and error pages
//! - **server**: the sequential accept loop, one hyper connection at a time
//!
//! # Example
//!
//! ```
//! use relayhub_boards::{BoardStore, ServerConfig};
//! use relayhub_hardware::mock::MockRelayDriver;
//! use relayhub_hardware::{DriverRegistry, ShadowCache};
//! use relayhub_network::{Method, Router};
//!
//! let (driver, handle) = MockRelayDriver::new();
//! handle.attach("MOCK-1", 8);
//! let mut registry = DriverRegistry::new(ShadowCache::new());
//! registry.register(driver);
//!
//! let mut router = Router::new(registry, BoardStore::default(), ServerConfig::default());
//! let dispatch = router.handle(&Method::GET, "/api/card/2/1");
//! assert_eq!(dispatch.response.body, r#"{"meta":{},"data":[{"relay":"2","value":"1"}]}"#);
//! ```

pub mod html;
pub mod response;
pub mod route;
pub mod router;
mod server;

pub use hyper::{Method, StatusCode};
pub use response::{ApiError, HttpResponse};
pub use route::{Route, RouteError, Target};
pub use router::{Dispatch, Router};
pub use server::{HttpServer, HttpServerConfig, HttpServerError};

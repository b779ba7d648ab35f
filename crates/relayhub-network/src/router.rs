//! Request dispatch.
//!
//! The [`Router`] owns everything a request can touch: the driver registry
//! (and through it the shadow cache), the board store and the server
//! options. It is built once at startup, handed to the server behind a
//! single mutex, and torn down with [`Router::shutdown`].
//!
//! ```text
//!  method, path
//!       │
//!       ▼
//!  method check ─► classify() ─► open device ─► relay check ─► read/write ─► HttpResponse
//!    500 page      500 / 1002      1001           1003           1001
//!                  / 1003
//! ```

use crate::html::{self, CardSection, RelayRow};
use crate::response::{ApiError, BoardEntry, HttpResponse, InventoryEntry, RelayEntry};
use crate::route::{Route, RouteError, Target, classify};
use hyper::{Method, StatusCode};
use relayhub_boards::{
    BoardError, BoardResolution, BoardStore, RelayhubConfig, SerialResolver, ServerConfig,
};
use relayhub_core::{RelayIndex, RelayState};
use relayhub_hardware::{DeviceHandle, DriverRegistry};
use tracing::{debug, info, warn};

/// Result of handling one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub response: HttpResponse,
    /// Set by `/quit`: the server stops after sending the response.
    pub shutdown: bool,
}

impl From<HttpResponse> for Dispatch {
    fn from(response: HttpResponse) -> Self {
        Self {
            response,
            shutdown: false,
        }
    }
}

/// Request handling context.
#[derive(Debug)]
pub struct Router {
    registry: DriverRegistry,
    boards: BoardStore,
    server: ServerConfig,
}

impl Router {
    /// Build a router and bind every board to a device.
    ///
    /// Boards are resolved once in declaration order, so the first declared
    /// board claims a shared card no matter which board is requested first.
    pub fn new(registry: DriverRegistry, mut boards: BoardStore, server: ServerConfig) -> Self {
        let resolutions = SerialResolver::new(&registry).resolve_all(&mut boards);
        for BoardResolution { board_id, device } in resolutions {
            match device {
                Some(device) => {
                    info!(board_id = %board_id, serial = %device.serial, "Board assigned");
                    registry.release(device);
                }
                None => warn!(board_id = %board_id, "Board has no device"),
            }
        }

        Self {
            registry,
            boards,
            server,
        }
    }

    /// Build a router from a loaded configuration.
    pub fn from_config(registry: DriverRegistry, config: RelayhubConfig) -> Self {
        Self::new(registry, config.boards, config.server)
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    pub fn boards(&self) -> &BoardStore {
        &self.boards
    }

    pub fn server_config(&self) -> &ServerConfig {
        &self.server
    }

    /// Handle one request. `path` excludes the query string.
    pub fn handle(&mut self, method: &Method, path: &str) -> Dispatch {
        debug!(method = %method, path = %path, "Handling request");

        if *method != Method::GET && *method != Method::POST {
            warn!(method = %method, "Unsupported method");
            return HttpResponse::html(
                StatusCode::INTERNAL_SERVER_ERROR,
                html::error_page(&format!("unsupported method {method}")),
            )
            .into();
        }

        let route = match classify(path, !self.boards.is_empty()) {
            Ok(route) => route,
            Err(RouteError::Unroutable(path)) => {
                debug!(path = %path, "Unroutable path");
                return HttpResponse::html(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    html::error_page(&format!("unknown path {path}")),
                )
                .into();
            }
            Err(RouteError::Unavailable) => {
                return HttpResponse::json_error(ApiError::Unavailable).into();
            }
            Err(RouteError::InvalidParameter(message)) => {
                debug!(path = %path, reason = %message, "Invalid parameter");
                return HttpResponse::json_error(ApiError::InvalidParameter).into();
            }
        };

        match route {
            Route::StatusPage => HttpResponse::html(StatusCode::OK, self.status_page()).into(),
            Route::Quit => {
                info!("Shutdown requested");
                Dispatch {
                    response: HttpResponse::html(StatusCode::OK, html::quit_page()),
                    shutdown: true,
                }
            }
            Route::Inventory => self.inventory().into(),
            Route::BoardList => self.board_list().into(),
            Route::Relay {
                target,
                relay,
                value,
            } => self.relay(&target, relay, value).into(),
        }
    }

    /// Drop all cached relay state.
    pub fn shutdown(&mut self) {
        self.registry.cache().clear();
        info!("Router shut down");
    }

    fn open(&mut self, target: &Target) -> Result<DeviceHandle, BoardError> {
        match target {
            Target::Card => Ok(self.registry.detect(None)?),
            Target::Serial(serial) => Ok(self.registry.detect(Some(serial))?),
            Target::Board(board_id) => {
                SerialResolver::new(&self.registry).resolve(&mut self.boards, *board_id)
            }
        }
    }

    fn relay(
        &mut self,
        target: &Target,
        relay: Option<RelayIndex>,
        value: Option<RelayState>,
    ) -> HttpResponse {
        let device = match self.open(target) {
            Ok(device) => device,
            Err(e) => {
                debug!(target = ?target, error = %e, "No device for request");
                return HttpResponse::json_error(ApiError::NoDevice);
            }
        };
        let response = self.relay_on(&device, relay, value);
        self.registry.release(device);
        response
    }

    fn relay_on(
        &self,
        device: &DeviceHandle,
        relay: Option<RelayIndex>,
        value: Option<RelayState>,
    ) -> HttpResponse {
        if let Some(relay) = relay
            && device.check_relay(relay).is_err()
        {
            debug!(
                serial = %device.serial,
                relay = %relay,
                relay_count = device.relay_count,
                "Relay out of range"
            );
            return HttpResponse::json_error(ApiError::InvalidParameter);
        }

        if let (Some(relay), Some(state)) = (relay, value)
            && let Err(e) = self.registry.set_relay(device, relay, state)
        {
            warn!(serial = %device.serial, relay = %relay, error = %e, "Relay write failed");
            return HttpResponse::json_error(ApiError::NoDevice);
        }

        let states = match relay {
            Some(relay) => self
                .registry
                .get_relay(device, relay)
                .map(|state| vec![(relay, state)]),
            None => self.registry.read_relays(device),
        };

        match states {
            Ok(states) => {
                let entries: Vec<RelayEntry> = states
                    .into_iter()
                    .map(|(relay, state)| RelayEntry::new(relay, state))
                    .collect();
                HttpResponse::json_data(&entries)
            }
            Err(e) => {
                warn!(serial = %device.serial, error = %e, "Relay read failed");
                HttpResponse::json_error(ApiError::NoDevice)
            }
        }
    }

    fn inventory(&self) -> HttpResponse {
        let inventory = self.registry.enumerate_all();
        if inventory.is_empty() {
            return HttpResponse::json_error(ApiError::NoDevice);
        }
        let entries: Vec<InventoryEntry> = inventory
            .iter()
            .enumerate()
            .map(|(i, device)| InventoryEntry {
                num: (i + 1).to_string(),
                relay_type: device.family.name().to_string(),
                serial: device.serial.clone(),
            })
            .collect();
        HttpResponse::json_data(&entries)
    }

    fn board_list(&mut self) -> HttpResponse {
        let resolutions = SerialResolver::new(&self.registry).resolve_all(&mut self.boards);
        let mut entries = Vec::with_capacity(resolutions.len());

        for resolution in resolutions {
            let Some(board) = self.boards.get(resolution.board_id) else {
                continue;
            };
            let relay_type = resolution
                .device
                .as_ref()
                .map_or("NOT FOUND", |device| device.family.name());
            entries.push(BoardEntry {
                board: board.board_id.to_string(),
                comment: board.comment.clone(),
                relay_type: relay_type.to_string(),
                serial: board.assigned_serial.clone().unwrap_or_default(),
            });
            if let Some(device) = resolution.device {
                self.registry.release(device);
            }
        }

        HttpResponse::json_data(&entries)
    }

    fn status_page(&mut self) -> String {
        let sections = if self.boards.is_empty() {
            self.card_sections()
        } else {
            self.board_sections()
        };
        html::status_page(&sections)
    }

    fn rows(&self, device: &DeviceHandle, label: impl Fn(RelayIndex) -> String) -> Vec<RelayRow> {
        RelayIndex::range(device.relay_count)
            .map(|relay| {
                let state = self.registry.get_relay(device, relay).unwrap_or_else(|e| {
                    warn!(serial = %device.serial, relay = %relay, error = %e, "Relay read failed");
                    RelayState::Invalid
                });
                RelayRow {
                    relay,
                    label: label(relay),
                    state,
                }
            })
            .collect()
    }

    fn card_sections(&self) -> Vec<CardSection> {
        let inventory = self.registry.enumerate_all();
        let mut sections = Vec::with_capacity(inventory.len());

        for (i, descriptor) in inventory.iter().enumerate() {
            let mut section = CardSection {
                heading: format!("Card #{}: {}", i + 1, descriptor.family.name()),
                detail: format!("Serial {}", descriptor.serial),
                serial: None,
                relays: Vec::new(),
            };
            match self.registry.detect(Some(&descriptor.serial)) {
                Ok(device) => {
                    section.relays =
                        self.rows(&device, |relay| self.server.label(relay).to_string());
                    section.serial = Some(device.serial.clone());
                    self.registry.release(device);
                }
                Err(e) => debug!(serial = %descriptor.serial, error = %e, "Card vanished"),
            }
            sections.push(section);
        }
        sections
    }

    fn board_sections(&mut self) -> Vec<CardSection> {
        let resolutions = SerialResolver::new(&self.registry).resolve_all(&mut self.boards);
        let mut sections = Vec::with_capacity(resolutions.len());

        for resolution in resolutions {
            let Some(board) = self.boards.get(resolution.board_id) else {
                continue;
            };
            let serial = board.assigned_serial.as_deref().unwrap_or("none");
            let mut section = CardSection {
                heading: format!("Board {}", board.board_id),
                detail: if board.comment.is_empty() {
                    format!("Serial {serial}")
                } else {
                    format!("{} (serial {serial})", board.comment)
                },
                serial: None,
                relays: Vec::new(),
            };
            if let Some(device) = resolution.device {
                section.relays = self.rows(&device, |relay| board.label(relay).to_string());
                section.serial = Some(device.serial.clone());
                self.registry.release(device);
            }
            sections.push(section);
        }
        sections
    }
}

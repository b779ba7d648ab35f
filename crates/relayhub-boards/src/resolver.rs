//! Serial resolution: mapping boards onto attached devices.
//!
//! Fixed-serial boards are bound to their literal serial, provided the card
//! found there has the declared relay count. `AUTO` and `FIRST` boards get a
//! serial picked from the live inventory:
//!
//! ```text
//!  assigned serial still detectable? ──yes──► reuse it
//!            │ no
//!            ▼
//!  walk enumerate_all() in order:
//!    same relay count && not claimed by another board? ──► assign
//!            │ none
//!            ▼
//!  clear assignment, board unavailable
//! ```
//!
//! All boards are resolved once at startup so that declaration order decides
//! who claims a shared card. After that, resolution runs lazily, once per
//! request addressing a board, so a card that is unplugged and replaced by
//! another of the same size is picked up without a restart.

use crate::error::{BoardError, BoardResult};
use crate::store::BoardStore;
use relayhub_core::{BoardId, SerialPolicy};
use relayhub_hardware::{DeviceHandle, DriverRegistry};
use tracing::{debug, info, warn};

/// Outcome of resolving one board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardResolution {
    pub board_id: BoardId,
    /// Bound device, `None` when the board is unavailable.
    pub device: Option<DeviceHandle>,
}

/// Resolves board identities against a driver registry.
#[derive(Debug, Clone, Copy)]
pub struct SerialResolver<'a> {
    registry: &'a DriverRegistry,
}

impl<'a> SerialResolver<'a> {
    pub fn new(registry: &'a DriverRegistry) -> Self {
        Self { registry }
    }

    /// Resolve one board to an open device.
    ///
    /// # Errors
    ///
    /// Returns `BoardError::UnknownBoard` for an undeclared id and
    /// `BoardError::Unresolved` when no attached device can serve the board.
    pub fn resolve(&self, store: &mut BoardStore, board_id: BoardId) -> BoardResult<DeviceHandle> {
        let board = store.get(board_id).ok_or(BoardError::UnknownBoard(board_id))?;
        let (policy, relay_count) = (board.serial_policy.clone(), board.relay_count);

        match policy {
            SerialPolicy::Fixed(serial) => self.resolve_fixed(board_id, &serial, relay_count),
            SerialPolicy::Auto | SerialPolicy::First => self.resolve_dynamic(store, board_id),
        }
    }

    fn resolve_fixed(
        &self,
        board_id: BoardId,
        serial: &str,
        relay_count: u8,
    ) -> BoardResult<DeviceHandle> {
        let device = self.registry.detect(Some(serial)).map_err(|e| {
            debug!(board_id = %board_id, serial = %serial, error = %e, "Fixed board not present");
            BoardError::Unresolved(board_id)
        })?;

        if device.relay_count != relay_count {
            warn!(
                board_id = %board_id,
                serial = %serial,
                expected = relay_count,
                found = device.relay_count,
                "Fixed board relay count mismatch"
            );
            self.registry.release(device);
            return Err(BoardError::Unresolved(board_id));
        }
        Ok(device)
    }

    fn resolve_dynamic(
        &self,
        store: &mut BoardStore,
        board_id: BoardId,
    ) -> BoardResult<DeviceHandle> {
        let board = store.get(board_id).ok_or(BoardError::UnknownBoard(board_id))?;
        let relay_count = board.relay_count;

        if let Some(serial) = board.assigned_serial.as_deref() {
            match self.registry.detect(Some(serial)) {
                Ok(device) if device.relay_count == relay_count => return Ok(device),
                Ok(_) | Err(_) => {
                    info!(
                        board_id = %board_id,
                        serial = %serial,
                        "Bound device gone, re-resolving"
                    );
                }
            }
        }

        let inventory = self.registry.enumerate_all();
        let candidate = inventory
            .iter()
            .filter(|device| device.relay_count == relay_count)
            .find(|device| !store.is_claimed(&device.serial, board_id))
            .map(|device| device.serial.clone());

        let Some(serial) = candidate else {
            if let Some(board) = store.get_mut(board_id) {
                board.assigned_serial = None;
            }
            info!(board_id = %board_id, relay_count, "No device available for board");
            return Err(BoardError::Unresolved(board_id));
        };

        let device = self.registry.detect(Some(&serial));
        let board = store.get_mut(board_id).ok_or(BoardError::UnknownBoard(board_id))?;
        match device {
            Ok(device) => {
                if board.assigned_serial.as_deref() != Some(serial.as_str()) {
                    info!(board_id = %board_id, serial = %serial, "Board bound to device");
                }
                board.assigned_serial = Some(serial);
                Ok(device)
            }
            Err(e) => {
                debug!(board_id = %board_id, serial = %serial, error = %e, "Candidate vanished");
                board.assigned_serial = None;
                Err(BoardError::Unresolved(board_id))
            }
        }
    }

    /// Resolve every board in declaration order.
    pub fn resolve_all(&self, store: &mut BoardStore) -> Vec<BoardResolution> {
        store
            .ids()
            .into_iter()
            .map(|board_id| BoardResolution {
                board_id,
                device: self.resolve(store, board_id).ok(),
            })
            .collect()
    }
}

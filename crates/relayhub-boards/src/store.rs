//! Board configuration store.
//!
//! A *board* is the operator's stable name for a relay card ("board 2 is the
//! garage card"). The store keeps the declared boards in declaration order;
//! that order breaks ties when several boards could claim the same device.
//!
//! The only field that changes after load is [`BoardConfig::assigned_serial`],
//! written by the resolver.

use crate::error::{ConfigError, ConfigResult};
use relayhub_core::{
    BoardId, RelayIndex, SerialPolicy,
    constants::{MAX_NUM_RELAYS, RELAY_LABEL_COUNT, default_relay_label},
};

/// One declared board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    pub board_id: BoardId,
    pub serial_policy: SerialPolicy,
    /// Serial of the device currently bound to the board.
    pub assigned_serial: Option<String>,
    pub relay_count: u8,
    pub labels: Vec<String>,
    pub comment: String,
}

impl BoardConfig {
    /// Declare a board.
    ///
    /// Fixed-serial boards are bound to their literal serial from the start.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidBoard` if `relay_count` is outside 1-16.
    ///
    /// # Examples
    ///
    /// ```
    /// use relayhub_boards::store::BoardConfig;
    /// use relayhub_core::{BoardId, SerialPolicy};
    ///
    /// let board = BoardConfig::new(BoardId::new(1).unwrap(), SerialPolicy::Auto, 8).unwrap();
    /// assert_eq!(board.assigned_serial, None);
    /// assert_eq!(board.labels[7], "My appliance 8");
    /// ```
    pub fn new(
        board_id: BoardId,
        serial_policy: SerialPolicy,
        relay_count: u8,
    ) -> ConfigResult<Self> {
        if !(1..=MAX_NUM_RELAYS).contains(&relay_count) {
            return Err(ConfigError::invalid_board(
                board_id,
                format!("num_relays must be 1-{MAX_NUM_RELAYS}, got {relay_count}"),
            ));
        }
        let assigned_serial = serial_policy.fixed_serial().map(str::to_string);
        Ok(Self {
            board_id,
            serial_policy,
            assigned_serial,
            relay_count,
            labels: (1..=RELAY_LABEL_COUNT).map(default_relay_label).collect(),
            comment: String::new(),
        })
    }

    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Override the first labels; the rest keep their defaults.
    #[must_use]
    pub fn with_labels<S: AsRef<str>>(mut self, labels: &[S]) -> Self {
        for (slot, label) in self.labels.iter_mut().zip(labels) {
            *slot = label.as_ref().to_string();
        }
        self
    }

    /// Label of a relay.
    #[must_use]
    pub fn label(&self, relay: RelayIndex) -> &str {
        &self.labels[relay.slot()]
    }
}

/// The declared boards, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardStore {
    boards: Vec<BoardConfig>,
}

impl BoardStore {
    /// Build a store.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateBoard` if two boards share an id.
    pub fn new(boards: Vec<BoardConfig>) -> ConfigResult<Self> {
        for (i, board) in boards.iter().enumerate() {
            if boards[..i].iter().any(|other| other.board_id == board.board_id) {
                return Err(ConfigError::DuplicateBoard(board.board_id));
            }
        }
        Ok(Self { boards })
    }

    /// `true` when no boards are configured (single-card mode).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.boards.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoardConfig> {
        self.boards.iter()
    }

    /// Board ids in declaration order.
    pub fn ids(&self) -> Vec<BoardId> {
        self.boards.iter().map(|board| board.board_id).collect()
    }

    #[must_use]
    pub fn get(&self, board_id: BoardId) -> Option<&BoardConfig> {
        self.boards.iter().find(|board| board.board_id == board_id)
    }

    pub fn get_mut(&mut self, board_id: BoardId) -> Option<&mut BoardConfig> {
        self.boards.iter_mut().find(|board| board.board_id == board_id)
    }

    /// Returns `true` if a board other than `except` is bound to `serial`.
    #[must_use]
    pub fn is_claimed(&self, serial: &str, except: BoardId) -> bool {
        self.boards.iter().any(|board| {
            board.board_id != except && board.assigned_serial.as_deref() == Some(serial)
        })
    }

    /// Board currently bound to `serial`.
    #[must_use]
    pub fn board_for_serial(&self, serial: &str) -> Option<&BoardConfig> {
        self.boards
            .iter()
            .find(|board| board.assigned_serial.as_deref() == Some(serial))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> BoardId {
        BoardId::new(n).unwrap()
    }

    #[test]
    fn test_fixed_board_is_bound() {
        let board =
            BoardConfig::new(id(1), SerialPolicy::Fixed("A9GXV5R9".to_string()), 8).unwrap();
        assert_eq!(board.assigned_serial.as_deref(), Some("A9GXV5R9"));
    }

    #[test]
    fn test_relay_count_bounds() {
        assert!(BoardConfig::new(id(1), SerialPolicy::Auto, 0).is_err());
        assert!(BoardConfig::new(id(1), SerialPolicy::Auto, 17).is_err());
        assert!(BoardConfig::new(id(1), SerialPolicy::Auto, 16).is_ok());
    }

    #[test]
    fn test_labels() {
        let board = BoardConfig::new(id(1), SerialPolicy::First, 4)
            .unwrap()
            .with_labels(&["Door", "Light"])
            .with_comment("Garage");

        assert_eq!(board.label(RelayIndex::new(1).unwrap()), "Door");
        assert_eq!(board.label(RelayIndex::new(2).unwrap()), "Light");
        assert_eq!(board.label(RelayIndex::new(3).unwrap()), "My appliance 3");
        assert_eq!(board.labels.len(), 16);
        assert_eq!(board.comment, "Garage");
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let boards = vec![
            BoardConfig::new(id(1), SerialPolicy::Auto, 8).unwrap(),
            BoardConfig::new(id(1), SerialPolicy::Auto, 4).unwrap(),
        ];
        assert!(matches!(
            BoardStore::new(boards),
            Err(ConfigError::DuplicateBoard(_))
        ));
    }

    #[test]
    fn test_lookup_and_claims() {
        let mut store = BoardStore::new(vec![
            BoardConfig::new(id(2), SerialPolicy::Fixed("S1".to_string()), 8).unwrap(),
            BoardConfig::new(id(1), SerialPolicy::Auto, 8).unwrap(),
        ])
        .unwrap();

        assert_eq!(store.ids(), vec![id(2), id(1)]);
        assert!(store.is_claimed("S1", id(1)));
        assert!(!store.is_claimed("S1", id(2)));
        assert!(store.get(id(3)).is_none());

        store.get_mut(id(1)).unwrap().assigned_serial = Some("S2".to_string());
        assert_eq!(store.board_for_serial("S2").unwrap().board_id, id(1));
    }

    #[test]
    fn test_empty_store() {
        let store = BoardStore::default();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }
}

use relayhub_core::BoardId;
use relayhub_hardware::HardwareError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Cannot read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or has the wrong shape.
    #[error("Cannot parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A board declaration is unusable.
    #[error("Invalid board {board}: {message}")]
    InvalidBoard { board: String, message: String },

    /// Two boards share an id.
    #[error("Duplicate board id {0}")]
    DuplicateBoard(BoardId),
}

impl ConfigError {
    pub fn invalid_board(board: impl ToString, message: impl Into<String>) -> Self {
        Self::InvalidBoard {
            board: board.to_string(),
            message: message.into(),
        }
    }
}

/// Errors raised while mapping a board onto a device.
#[derive(Debug, Error)]
pub enum BoardError {
    /// No board with this id is configured.
    #[error("Unknown board {0}")]
    UnknownBoard(BoardId),

    /// No attached device can serve the board.
    #[error("No device available for board {0}")]
    Unresolved(BoardId),

    #[error(transparent)]
    Hardware(#[from] HardwareError),
}

/// Specialized result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Specialized result type for board resolution
pub type BoardResult<T> = Result<T, BoardError>;

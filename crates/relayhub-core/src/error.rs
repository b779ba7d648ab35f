use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Request parameter errors
    #[error("Invalid relay index: {0}")]
    InvalidRelayIndex(String),

    #[error("Invalid relay value: {0}")]
    InvalidRelayValue(String),

    #[error("Invalid relay state: {0}")]
    InvalidRelayState(String),

    #[error("Invalid board id: {0}")]
    InvalidBoardId(String),

    // Configuration errors
    #[error("Invalid relay count {count}, expected 1-{max}")]
    InvalidRelayCount { count: u8, max: u8 },

    #[error("Invalid serial policy: {0}")]
    InvalidSerialPolicy(String),
}

pub type Result<T> = std::result::Result<T, Error>;

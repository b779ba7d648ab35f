use crate::{
    Result,
    constants::{FIRST_RELAY, MAX_NUM_RELAYS, MAX_SERIAL_LEN},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Returns `true` if `s` is a non-empty run of ASCII digits.
fn is_unsigned_integer(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// State of a single relay.
///
/// The discriminants are part of the HTTP API: the JSON `"value"` field
/// carries the numeric value of the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RelayState {
    #[default]
    Off = 0,
    On = 1,
    /// Switch on, wait the pulse duration, switch off.
    Pulse = 2,
    /// No known or queryable state.
    Invalid = 3,
}

impl RelayState {
    /// Create a relay state from its numeric value.
    ///
    /// # Errors
    /// Returns `Error::InvalidRelayState` for values above 3.
    #[inline]
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(RelayState::Off),
            1 => Ok(RelayState::On),
            2 => Ok(RelayState::Pulse),
            3 => Ok(RelayState::Invalid),
            _ => Err(Error::InvalidRelayState(value.to_string())),
        }
    }

    /// Convert the relay state to its numeric value.
    #[inline]
    #[must_use]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse the `<value>` segment of an API path.
    ///
    /// Only `0` (off) and `1` (on) are accepted.
    ///
    /// # Errors
    /// Returns `Error::InvalidRelayValue` for anything else.
    pub fn from_api_value(s: &str) -> Result<Self> {
        match s {
            "0" => Ok(RelayState::Off),
            "1" => Ok(RelayState::On),
            _ => Err(Error::InvalidRelayValue(s.to_string())),
        }
    }

    /// Returns `true` if the relay is known to be on.
    #[inline]
    #[must_use]
    pub fn is_on(self) -> bool {
        matches!(self, RelayState::On)
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RelayState::Off => write!(f, "off"),
            RelayState::On => write!(f, "on"),
            RelayState::Pulse => write!(f, "pulse"),
            RelayState::Invalid => write!(f, "invalid"),
        }
    }
}

impl std::str::FromStr for RelayState {
    type Err = Error;

    /// Parse a command-line state word (`on`, `off`, `pulse`).
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "on" => Ok(RelayState::On),
            "off" => Ok(RelayState::Off),
            "pulse" => Ok(RelayState::Pulse),
            _ => Err(Error::InvalidRelayState(s.to_string())),
        }
    }
}

/// 1-based relay index (1-16).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelayIndex(u8);

impl RelayIndex {
    /// Create a new relay index with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidRelayIndex` if the index is outside 1-16.
    pub fn new(index: u8) -> Result<Self> {
        if !(FIRST_RELAY..=MAX_NUM_RELAYS).contains(&index) {
            return Err(Error::InvalidRelayIndex(format!(
                "relay must be {FIRST_RELAY}-{MAX_NUM_RELAYS}, got {index}"
            )));
        }
        Ok(RelayIndex(index))
    }

    /// Iterate over the relay indices `1..=count`.
    ///
    /// Counts above 16 are clamped.
    pub fn range(count: u8) -> impl Iterator<Item = RelayIndex> {
        (FIRST_RELAY..=count.min(MAX_NUM_RELAYS)).map(RelayIndex)
    }

    /// Get the raw 1-based index.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// Get the 0-based slot of this relay in a state table.
    #[must_use]
    pub fn slot(&self) -> usize {
        usize::from(self.0 - FIRST_RELAY)
    }
}

impl fmt::Display for RelayIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RelayIndex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if !is_unsigned_integer(s) {
            return Err(Error::InvalidRelayIndex(s.to_string()));
        }
        let index: u8 = s
            .parse()
            .map_err(|_| Error::InvalidRelayIndex(s.to_string()))?;
        RelayIndex::new(index)
    }
}

/// Supported relay card families.
///
/// The set is fixed. [`RelayFamily::PRIORITY`] is the order in which
/// family-agnostic detection tries the hardware families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayFamily {
    /// Sainsmart 16-channel card driven by a CH340G USB bridge.
    Sainsmart16Ch340,
    /// CGE 8-channel card behind an FTDI FT232R.
    Cge8Usb,
    /// Relays wired directly to GPIO pins.
    GenericGpio,
    /// In-memory card used by tests and simulations.
    Mock,
}

impl RelayFamily {
    /// Hardware families in detection priority order.
    pub const PRIORITY: [RelayFamily; 3] = [
        RelayFamily::Sainsmart16Ch340,
        RelayFamily::Cge8Usb,
        RelayFamily::GenericGpio,
    ];

    /// Human readable card name, as reported in `relay_type`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            RelayFamily::Sainsmart16Ch340 => "Sainsmart USB CH340G 16-channel relay card",
            RelayFamily::Cge8Usb => "CGE USB 8-channel relay card",
            RelayFamily::GenericGpio => "Generic GPIO relays",
            RelayFamily::Mock => "Mock relay card",
        }
    }

    /// Relay count of a card of this family when nothing else is known.
    #[must_use]
    pub fn default_relay_count(self) -> u8 {
        match self {
            RelayFamily::Sainsmart16Ch340 => 16,
            RelayFamily::Cge8Usb => 8,
            RelayFamily::GenericGpio => 8,
            RelayFamily::Mock => 8,
        }
    }
}

impl fmt::Display for RelayFamily {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A physical device found on one of the transports.
///
/// Produced fresh by every enumeration; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub family: RelayFamily,
    pub serial: String,
    pub relay_count: u8,
}

impl DeviceDescriptor {
    pub fn new(family: RelayFamily, serial: impl Into<String>, relay_count: u8) -> Self {
        Self {
            family,
            serial: serial.into(),
            relay_count,
        }
    }
}

/// Operator-assigned board number (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoardId(u8);

impl BoardId {
    /// Create a new board id with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidBoardId` for zero.
    pub fn new(id: u8) -> Result<Self> {
        if id == 0 {
            return Err(Error::InvalidBoardId("board id must be positive".to_string()));
        }
        Ok(BoardId(id))
    }

    /// Get the raw board id.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BoardId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if !is_unsigned_integer(s) {
            return Err(Error::InvalidBoardId(s.to_string()));
        }
        let id: u8 = s.parse().map_err(|_| Error::InvalidBoardId(s.to_string()))?;
        BoardId::new(id)
    }
}

/// How a board picks the physical device it is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SerialPolicy {
    /// Always the configured serial.
    Fixed(String),
    /// First unclaimed device with the right relay count, re-resolved when
    /// the bound device disappears.
    Auto,
    /// Same first-fit selection, declared with `NULL`/`FIRST` in the
    /// configuration.
    First,
}

impl SerialPolicy {
    /// Parse the `serial` entry of a board declaration.
    ///
    /// `AUTO` selects [`SerialPolicy::Auto`], `NULL` and `FIRST` select
    /// [`SerialPolicy::First`] (keywords are case-insensitive). Anything else
    /// is a literal serial.
    ///
    /// # Errors
    /// Returns `Error::InvalidSerialPolicy` for an empty value or a serial
    /// longer than 32 characters.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::InvalidSerialPolicy("empty serial".to_string()));
        }
        if value.eq_ignore_ascii_case("AUTO") {
            return Ok(SerialPolicy::Auto);
        }
        if value.eq_ignore_ascii_case("NULL") || value.eq_ignore_ascii_case("FIRST") {
            return Ok(SerialPolicy::First);
        }
        if value.len() > MAX_SERIAL_LEN {
            return Err(Error::InvalidSerialPolicy(format!(
                "serial longer than {MAX_SERIAL_LEN} characters: {value}"
            )));
        }
        Ok(SerialPolicy::Fixed(value.to_string()))
    }

    /// Returns the literal serial of a fixed policy.
    #[must_use]
    pub fn fixed_serial(&self) -> Option<&str> {
        match self {
            SerialPolicy::Fixed(serial) => Some(serial),
            SerialPolicy::Auto | SerialPolicy::First => None,
        }
    }

    /// Returns `true` if the serial is chosen by resolution.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, SerialPolicy::Fixed(_))
    }
}

impl fmt::Display for SerialPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SerialPolicy::Fixed(serial) => write!(f, "{serial}"),
            SerialPolicy::Auto => write!(f, "AUTO"),
            SerialPolicy::First => write!(f, "FIRST"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1", 1)]
    #[case("8", 8)]
    #[case("16", 16)]
    #[case("007", 7)]
    fn test_relay_index_valid(#[case] input: &str, #[case] expected: u8) {
        let index: RelayIndex = input.parse().unwrap();
        assert_eq!(index.as_u8(), expected);
        assert_eq!(index.slot(), usize::from(expected - 1));
    }

    #[rstest]
    #[case("0")]
    #[case("17")]
    #[case("256")]
    #[case("-1")]
    #[case("3abc")]
    #[case("")]
    #[case(" 3")]
    fn test_relay_index_invalid(#[case] input: &str) {
        let result: Result<RelayIndex> = input.parse();
        assert!(matches!(result, Err(Error::InvalidRelayIndex(_))));
    }

    #[test]
    fn test_relay_index_range() {
        let all: Vec<u8> = RelayIndex::range(4).map(|i| i.as_u8()).collect();
        assert_eq!(all, vec![1, 2, 3, 4]);

        assert_eq!(RelayIndex::range(0).count(), 0);
        assert_eq!(RelayIndex::range(40).count(), 16);
    }

    #[rstest]
    #[case("0", RelayState::Off)]
    #[case("1", RelayState::On)]
    fn test_relay_state_api_value(#[case] input: &str, #[case] expected: RelayState) {
        assert_eq!(RelayState::from_api_value(input).unwrap(), expected);
    }

    #[rstest]
    #[case("2")]
    #[case("01")]
    #[case("on")]
    #[case("")]
    fn test_relay_state_api_value_invalid(#[case] input: &str) {
        assert!(matches!(
            RelayState::from_api_value(input),
            Err(Error::InvalidRelayValue(_))
        ));
    }

    #[test]
    fn test_relay_state_numeric() {
        assert_eq!(RelayState::from_u8(0).unwrap(), RelayState::Off);
        assert_eq!(RelayState::from_u8(3).unwrap(), RelayState::Invalid);
        assert!(RelayState::from_u8(4).is_err());

        assert_eq!(RelayState::On.to_u8(), 1);
        assert_eq!(RelayState::Invalid.to_u8(), 3);
        assert_eq!(RelayState::default(), RelayState::Off);
    }

    #[test]
    fn test_relay_state_from_str() {
        assert_eq!("ON".parse::<RelayState>().unwrap(), RelayState::On);
        assert_eq!("off".parse::<RelayState>().unwrap(), RelayState::Off);
        assert_eq!("Pulse".parse::<RelayState>().unwrap(), RelayState::Pulse);
        assert!("toggle".parse::<RelayState>().is_err());
    }

    #[test]
    fn test_family_priority_excludes_mock() {
        assert!(!RelayFamily::PRIORITY.contains(&RelayFamily::Mock));
        assert_eq!(RelayFamily::PRIORITY[0], RelayFamily::Sainsmart16Ch340);
    }

    #[test]
    fn test_family_serde_name() {
        let json = serde_json::to_string(&RelayFamily::Cge8Usb).unwrap();
        assert_eq!(json, "\"cge8_usb\"");
    }

    #[rstest]
    #[case("1", 1)]
    #[case("42", 42)]
    fn test_board_id_valid(#[case] input: &str, #[case] expected: u8) {
        let id: BoardId = input.parse().unwrap();
        assert_eq!(id.as_u8(), expected);
    }

    #[rstest]
    #[case("0")]
    #[case("300")]
    #[case("x1")]
    #[case("")]
    fn test_board_id_invalid(#[case] input: &str) {
        assert!(input.parse::<BoardId>().is_err());
    }

    #[rstest]
    #[case("AUTO", SerialPolicy::Auto)]
    #[case("auto", SerialPolicy::Auto)]
    #[case("NULL", SerialPolicy::First)]
    #[case("first", SerialPolicy::First)]
    #[case(" A9GXV5R9 ", SerialPolicy::Fixed("A9GXV5R9".to_string()))]
    #[case("1a86:7523:4", SerialPolicy::Fixed("1a86:7523:4".to_string()))]
    fn test_serial_policy_parse(#[case] input: &str, #[case] expected: SerialPolicy) {
        assert_eq!(SerialPolicy::parse(input).unwrap(), expected);
    }

    #[test]
    fn test_serial_policy_invalid() {
        assert!(SerialPolicy::parse("   ").is_err());
        assert!(SerialPolicy::parse(&"X".repeat(33)).is_err());
    }

    #[test]
    fn test_serial_policy_accessors() {
        assert_eq!(
            SerialPolicy::Fixed("ABC".to_string()).fixed_serial(),
            Some("ABC")
        );
        assert!(SerialPolicy::Auto.is_resolved());
        assert!(SerialPolicy::First.is_resolved());
        assert!(!SerialPolicy::Fixed("ABC".to_string()).is_resolved());
    }
}

//! Configuration file loading.
//!
//! The configuration is a TOML file with three optional parts:
//!
//! ```toml
//! [http_server]
//! server_iface = "0.0.0.0"
//! server_port = 8000
//! pulse_duration = 1
//! relay_labels = ["Lamp", "Pump"]
//!
//! [gpio]
//! num_relays = 4
//! active_value = 1
//! pins = [17, 18, 27, 22]
//!
//! [[boards]]
//! id = 1
//! serial = "AUTO"
//! num_relays = 8
//! comment = "Garage"
//! relay_labels = ["Door"]
//! ```
//!
//! Loading is forgiving: a malformed board is logged and skipped, and an
//! unreadable file falls back to the defaults (see
//! [`RelayhubConfig::load_or_default`]).

use crate::error::{ConfigError, ConfigResult};
use crate::store::{BoardConfig, BoardStore};
use relayhub_core::{
    BoardId, RelayIndex, SerialPolicy,
    constants::{
        DEFAULT_PULSE_DURATION_SECS, DEFAULT_SERVER_PORT, RELAY_LABEL_COUNT, default_relay_labels,
    },
};
use relayhub_hardware::GpioConfig;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// HTTP service settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to listen on.
    pub iface: IpAddr,

    /// TCP port to listen on.
    pub port: u16,

    /// How long a pulse keeps a relay on.
    pub pulse_duration: Duration,

    /// Relay labels used in single-card mode, always 16 entries.
    pub relay_labels: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            iface: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_SERVER_PORT,
            pulse_duration: Duration::from_secs(DEFAULT_PULSE_DURATION_SECS),
            relay_labels: default_relay_labels(),
        }
    }
}

impl ServerConfig {
    /// Socket address to bind.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.iface, self.port)
    }

    /// Label of a relay in single-card mode.
    #[must_use]
    pub fn label(&self, relay: RelayIndex) -> &str {
        &self.relay_labels[relay.slot()]
    }

    /// Replace the first labels (command line labels win over the file).
    pub fn override_labels<S: AsRef<str>>(&mut self, labels: &[S]) {
        for (slot, label) in self.relay_labels.iter_mut().zip(labels) {
            *slot = label.as_ref().to_string();
        }
    }
}

/// Everything read from the configuration file.
#[derive(Debug, Clone, Default)]
pub struct RelayhubConfig {
    pub server: ServerConfig,
    pub gpio: GpioConfig,
    pub boards: BoardStore,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    http_server: RawServer,
    gpio: GpioConfig,
    boards: Vec<toml::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawServer {
    server_iface: Option<String>,
    server_port: Option<u16>,
    pulse_duration: Option<u64>,
    relay_labels: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawBoard {
    id: u8,
    serial: Option<String>,
    num_relays: u8,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    relay_labels: Vec<String>,
}

impl RawServer {
    fn into_server_config(self) -> ServerConfig {
        let mut server = ServerConfig::default();

        if let Some(iface) = self.server_iface {
            match iface.trim().parse::<IpAddr>() {
                Ok(addr) => server.iface = addr,
                Err(_) => {
                    warn!(iface = %iface, "Invalid server_iface, listening on all interfaces");
                }
            }
        }
        if let Some(port) = self.server_port {
            server.port = port;
        }
        match self.pulse_duration {
            Some(0) | None => {}
            Some(secs) => server.pulse_duration = Duration::from_secs(secs),
        }
        if self.relay_labels.len() > RELAY_LABEL_COUNT {
            warn!(count = self.relay_labels.len(), "Extra relay labels ignored");
        }
        server.override_labels(&self.relay_labels);
        server
    }
}

fn parse_board(value: toml::Value) -> ConfigResult<BoardConfig> {
    let name = value
        .get("id")
        .map_or_else(|| "<no id>".to_string(), ToString::to_string);
    let raw = RawBoard::deserialize(value)
        .map_err(|e| ConfigError::invalid_board(&name, e.to_string()))?;

    let board_id =
        BoardId::new(raw.id).map_err(|e| ConfigError::invalid_board(&name, e.to_string()))?;
    let serial_policy = match raw.serial.as_deref() {
        None => SerialPolicy::First,
        Some(serial) => SerialPolicy::parse(serial)
            .map_err(|e| ConfigError::invalid_board(board_id, e.to_string()))?,
    };
    if raw.relay_labels.len() > RELAY_LABEL_COUNT {
        warn!(board_id = %board_id, "Extra relay labels ignored");
    }

    Ok(BoardConfig::new(board_id, serial_policy, raw.num_relays)?
        .with_comment(raw.comment)
        .with_labels(&raw.relay_labels))
}

impl RelayhubConfig {
    /// Parse a configuration document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` if the document is not valid TOML or a
    /// section has the wrong shape. Individual malformed or duplicate boards
    /// are skipped with a warning instead.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let raw: RawConfig = toml::from_str(content)?;

        let mut boards: Vec<BoardConfig> = Vec::with_capacity(raw.boards.len());
        for value in raw.boards {
            match parse_board(value) {
                Ok(board) if boards.iter().any(|b| b.board_id == board.board_id) => {
                    warn!(board_id = %board.board_id, "Duplicate board skipped");
                }
                Ok(board)
                    if board.assigned_serial.is_some()
                        && boards.iter().any(|b| b.assigned_serial == board.assigned_serial) =>
                {
                    warn!(
                        board_id = %board.board_id,
                        policy = %board.serial_policy,
                        "Board with duplicate serial skipped"
                    );
                }
                Ok(board) => {
                    debug!(
                        board_id = %board.board_id,
                        policy = %board.serial_policy,
                        "Board declared"
                    );
                    boards.push(board);
                }
                Err(e) => warn!(error = %e, "Board skipped"),
            }
        }

        Ok(Self {
            server: raw.http_server.into_server_config(),
            gpio: raw.gpio,
            boards: BoardStore::new(boards)?,
        })
    }

    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Read` if the file cannot be read, or any error
    /// of [`RelayhubConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), boards = config.boards.len(), "Configuration loaded");
        Ok(config)
    }

    /// Like [`RelayhubConfig::load`], falling back to the defaults on error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Using default configuration");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn id(n: u8) -> BoardId {
        BoardId::new(n).unwrap()
    }

    #[test]
    fn test_empty_document() {
        let config = RelayhubConfig::from_toml_str("").unwrap();
        assert_eq!(config.server, ServerConfig::default());
        assert!(config.boards.is_empty());
        assert!(!config.gpio.is_enabled());
    }

    #[test]
    fn test_server_section() {
        let config = RelayhubConfig::from_toml_str(
            r#"
            [http_server]
            server_iface = "127.0.0.1"
            server_port = 9090
            pulse_duration = 3
            relay_labels = ["Lamp", "Pump"]
            "#,
        )
        .unwrap();

        let server = config.server;
        assert_eq!(server.socket_addr(), "127.0.0.1:9090".parse().unwrap());
        assert_eq!(server.pulse_duration, Duration::from_secs(3));
        assert_eq!(server.relay_labels[0], "Lamp");
        assert_eq!(server.relay_labels[1], "Pump");
        assert_eq!(server.relay_labels[2], "My appliance 3");
        assert_eq!(server.relay_labels.len(), 16);
    }

    #[test]
    fn test_zero_pulse_and_bad_iface_use_defaults() {
        let config = RelayhubConfig::from_toml_str(
            r#"
            [http_server]
            server_iface = "not-an-address"
            pulse_duration = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.server.iface, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.server.pulse_duration, Duration::from_secs(1));
    }

    #[test]
    fn test_ipv6_iface() {
        let config =
            RelayhubConfig::from_toml_str("[http_server]\nserver_iface = \"::1\"\n").unwrap();
        assert!(config.server.iface.is_ipv6());
    }

    #[test]
    fn test_gpio_section() {
        let config = RelayhubConfig::from_toml_str(
            r#"
            [gpio]
            num_relays = 2
            active_value = 0
            pins = [17, 18]
            "#,
        )
        .unwrap();

        assert_eq!(config.gpio.relay_count(), 2);
        assert_eq!(config.gpio.active_value, 0);
        assert_eq!(config.gpio.sysfs_root, Path::new("/sys/class/gpio"));
    }

    #[test]
    fn test_boards() {
        let config = RelayhubConfig::from_toml_str(
            r#"
            [[boards]]
            id = 1
            serial = "AUTO"
            num_relays = 8
            comment = "Garage"
            relay_labels = ["Door"]

            [[boards]]
            id = 2
            serial = "A9GXV5R9"
            num_relays = 8

            [[boards]]
            id = 3
            num_relays = 16
            "#,
        )
        .unwrap();

        let boards = &config.boards;
        assert_eq!(boards.ids(), vec![id(1), id(2), id(3)]);

        let garage = boards.get(id(1)).unwrap();
        assert_eq!(garage.serial_policy, SerialPolicy::Auto);
        assert_eq!(garage.comment, "Garage");
        assert_eq!(garage.labels[0], "Door");
        assert_eq!(garage.labels[1], "My appliance 2");

        let fixed = boards.get(id(2)).unwrap();
        assert_eq!(fixed.assigned_serial.as_deref(), Some("A9GXV5R9"));

        assert_eq!(boards.get(id(3)).unwrap().serial_policy, SerialPolicy::First);
    }

    #[test]
    fn test_malformed_boards_are_skipped() {
        let config = RelayhubConfig::from_toml_str(
            r#"
            [[boards]]
            id = 1
            serial = "AUTO"
            num_relays = 8

            [[boards]]
            id = "two"
            num_relays = 8

            [[boards]]
            id = 3

            [[boards]]
            id = 4
            num_relays = 40

            [[boards]]
            id = 0
            num_relays = 8

            [[boards]]
            id = 1
            num_relays = 4

            [[boards]]
            id = 5
            serial = "NULL"
            num_relays = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.boards.ids(), vec![id(1), id(5)]);
        assert_eq!(config.boards.get(id(1)).unwrap().relay_count, 8);
    }

    #[test]
    fn test_duplicate_fixed_serial_is_skipped() {
        let config = RelayhubConfig::from_toml_str(
            r#"
            [[boards]]
            id = 1
            serial = "A9GXV5R9"
            num_relays = 8

            [[boards]]
            id = 2
            serial = "A9GXV5R9"
            num_relays = 8

            [[boards]]
            id = 3
            serial = "AUTO"
            num_relays = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.boards.ids(), vec![id(1), id(3)]);
    }

    #[test]
    fn test_invalid_document() {
        assert!(matches!(
            RelayhubConfig::from_toml_str("[http_server"),
            Err(ConfigError::Parse(_))
        ));
        assert!(RelayhubConfig::from_toml_str("[http_server]\nserver_port = \"x\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[http_server]\nserver_port = 8123\n").unwrap();

        let config = RelayhubConfig::load(file.path()).unwrap();
        assert_eq!(config.server.port, 8123);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");

        assert!(matches!(
            RelayhubConfig::load(&path),
            Err(ConfigError::Read { .. })
        ));

        let config = RelayhubConfig::load_or_default(&path);
        assert_eq!(config.server.port, DEFAULT_SERVER_PORT);
        assert!(config.boards.is_empty());
    }

    #[test]
    fn test_command_line_labels_override() {
        let mut server = ServerConfig::default();
        server.override_labels(&["Fan".to_string()]);
        assert_eq!(server.label(RelayIndex::new(1).unwrap()), "Fan");
        assert_eq!(server.label(RelayIndex::new(2).unwrap()), "My appliance 2");
    }
}

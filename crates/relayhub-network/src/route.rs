//! Path classification.
//!
//! Turns a request path into a [`Route`] without touching hardware. Checks
//! run in a fixed order: route availability first (1002), then parameter
//! syntax (1003). Device resolution and the relay-count check happen later
//! in the router.
//!
//! Serial segments are percent-decoded, since the status page escapes
//! serials such as `1a86:7523:4` when it builds toggle URLs.

use percent_encoding::percent_decode_str;
use relayhub_core::constants::MAX_SERIAL_LEN;
use relayhub_core::{BoardId, RelayIndex, RelayState};
use thiserror::Error;

/// How a relay request names its device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The first detected card (single-card mode).
    Card,
    Serial(String),
    Board(BoardId),
}

/// A classified request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    StatusPage,
    Quit,
    /// `/api/info` and `/api/serial`.
    Inventory,
    /// `/api/board`.
    BoardList,
    Relay {
        target: Target,
        relay: Option<RelayIndex>,
        value: Option<RelayState>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The path matches no route.
    #[error("Unknown path {0}")]
    Unroutable(String),

    /// The route exists but not in the current mode (boards or single card).
    #[error("Function unavailable in this context")]
    Unavailable,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl RouteError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }
}

const CARD_PREFIX: &str = "/api/card";
const SERIAL_PREFIX: &str = "/api/serial";
const BOARD_PREFIX: &str = "/api/board";

/// Classify a path (query string already stripped).
///
/// `boards_configured` selects between board mode, where `/api/board` is
/// available, and single-card mode, where `/api/card` is.
///
/// # Errors
///
/// See [`RouteError`].
///
/// # Examples
///
/// ```
/// use relayhub_network::route::{classify, Route, RouteError, Target};
///
/// let route = classify("/api/serial/A9GXV5R9/3/1", false).unwrap();
/// assert!(matches!(route, Route::Relay { target: Target::Serial(_), .. }));
///
/// assert_eq!(classify("/api/card", true), Err(RouteError::Unavailable));
/// ```
pub fn classify(path: &str, boards_configured: bool) -> Result<Route, RouteError> {
    match path {
        "/" => return Ok(Route::StatusPage),
        "/quit" => return Ok(Route::Quit),
        "/api/info" | SERIAL_PREFIX => return Ok(Route::Inventory),
        _ => {}
    }

    if let Some(rest) = path.strip_prefix(CARD_PREFIX) {
        if boards_configured {
            return Err(RouteError::Unavailable);
        }
        let segments = segments(rest)?;
        let (relay, value) = relay_and_value(&segments)?;
        return Ok(Route::Relay {
            target: Target::Card,
            relay,
            value,
        });
    }

    if let Some(rest) = path.strip_prefix(BOARD_PREFIX) {
        if !boards_configured {
            return Err(RouteError::Unavailable);
        }
        let segments = segments(rest)?;
        let Some((id, tail)) = segments.split_first() else {
            return Ok(Route::BoardList);
        };
        let board = id
            .parse::<BoardId>()
            .map_err(|e| RouteError::invalid(e.to_string()))?;
        let (relay, value) = relay_and_value(tail)?;
        return Ok(Route::Relay {
            target: Target::Board(board),
            relay,
            value,
        });
    }

    if let Some(rest) = path.strip_prefix(SERIAL_PREFIX) {
        let segments = segments(rest)?;
        let Some((serial, tail)) = segments.split_first() else {
            return Ok(Route::Inventory);
        };
        let serial = percent_decode_str(serial)
            .decode_utf8()
            .map_err(|_| RouteError::invalid("serial is not UTF-8"))?;
        if serial.len() > MAX_SERIAL_LEN {
            return Err(RouteError::invalid(format!("serial longer than {MAX_SERIAL_LEN}")));
        }
        let (relay, value) = relay_and_value(tail)?;
        return Ok(Route::Relay {
            target: Target::Serial(serial.into_owned()),
            relay,
            value,
        });
    }

    Err(RouteError::Unroutable(path.to_string()))
}

/// Split what follows a route prefix into non-empty segments.
fn segments(rest: &str) -> Result<Vec<&str>, RouteError> {
    if rest.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = rest.strip_prefix('/') else {
        return Err(RouteError::invalid(format!("unexpected {rest:?} after prefix")));
    };
    let segments: Vec<&str> = rest.split('/').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(RouteError::invalid("empty path segment"));
    }
    Ok(segments)
}

fn relay_and_value(
    segments: &[&str],
) -> Result<(Option<RelayIndex>, Option<RelayState>), RouteError> {
    match segments {
        [] => Ok((None, None)),
        [relay] => Ok((Some(parse_relay(relay)?), None)),
        [relay, value] => {
            let value =
                RelayState::from_api_value(value).map_err(|e| RouteError::invalid(e.to_string()))?;
            Ok((Some(parse_relay(relay)?), Some(value)))
        }
        _ => Err(RouteError::invalid("too many path segments")),
    }
}

fn parse_relay(segment: &str) -> Result<RelayIndex, RouteError> {
    segment
        .parse::<RelayIndex>()
        .map_err(|e| RouteError::invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn relay(n: u8) -> Option<RelayIndex> {
        Some(RelayIndex::new(n).unwrap())
    }

    #[test]
    fn test_fixed_routes() {
        assert_eq!(classify("/", false), Ok(Route::StatusPage));
        assert_eq!(classify("/quit", true), Ok(Route::Quit));
        assert_eq!(classify("/api/info", false), Ok(Route::Inventory));
        assert_eq!(classify("/api/serial", true), Ok(Route::Inventory));
    }

    #[test]
    fn test_card_routes() {
        assert_eq!(
            classify("/api/card", false),
            Ok(Route::Relay { target: Target::Card, relay: None, value: None })
        );
        assert_eq!(
            classify("/api/card/16", false),
            Ok(Route::Relay { target: Target::Card, relay: relay(16), value: None })
        );
        assert_eq!(
            classify("/api/card/2/1", false),
            Ok(Route::Relay {
                target: Target::Card,
                relay: relay(2),
                value: Some(RelayState::On),
            })
        );
    }

    #[test]
    fn test_serial_route() {
        assert_eq!(
            classify("/api/serial/A9GXV5R9/3/0", true),
            Ok(Route::Relay {
                target: Target::Serial("A9GXV5R9".to_string()),
                relay: relay(3),
                value: Some(RelayState::Off),
            })
        );
    }

    #[test]
    fn test_serial_is_percent_decoded() {
        assert_eq!(
            classify("/api/serial/1a86%3A7523%3A4/1/1", false),
            Ok(Route::Relay {
                target: Target::Serial("1a86:7523:4".to_string()),
                relay: relay(1),
                value: Some(RelayState::On),
            })
        );
        assert!(matches!(
            classify("/api/serial/%FF/1", false),
            Err(RouteError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_board_routes() {
        let board = BoardId::new(2).unwrap();
        assert_eq!(classify("/api/board", true), Ok(Route::BoardList));
        assert_eq!(
            classify("/api/board/2/5", true),
            Ok(Route::Relay { target: Target::Board(board), relay: relay(5), value: None })
        );
    }

    #[rstest]
    #[case("/api/card", true)]
    #[case("/api/card/1/1", true)]
    #[case("/api/cards", true)]
    #[case("/api/board", false)]
    #[case("/api/board/1/3/2", false)]
    fn test_unavailable(#[case] path: &str, #[case] boards: bool) {
        assert_eq!(classify(path, boards), Err(RouteError::Unavailable));
    }

    #[rstest]
    #[case("/api/cards", false)]
    #[case("/api/card/", false)]
    #[case("/api/card/0", false)]
    #[case("/api/card/17", false)]
    #[case("/api/card/+1", false)]
    #[case("/api/card/1/2", false)]
    #[case("/api/card/1/on", false)]
    #[case("/api/card/1/1/1", false)]
    #[case("/api/card//1", false)]
    #[case("/api/serial/", false)]
    #[case("/api/serialX", false)]
    #[case("/api/board/1/3/2", true)]
    #[case("/api/board/0", true)]
    #[case("/api/board/x/1", true)]
    #[case("/api/boards", true)]
    fn test_invalid_parameter(#[case] path: &str, #[case] boards: bool) {
        assert!(matches!(
            classify(path, boards),
            Err(RouteError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_serial_too_long() {
        let path = format!("/api/serial/{}", "S".repeat(MAX_SERIAL_LEN + 1));
        assert!(matches!(classify(&path, false), Err(RouteError::InvalidParameter(_))));
    }

    #[rstest]
    #[case("/index.html")]
    #[case("/api")]
    #[case("/api/infos")]
    #[case("/quit/now")]
    fn test_unroutable(#[case] path: &str) {
        assert!(matches!(classify(path, false), Err(RouteError::Unroutable(_))));
    }
}

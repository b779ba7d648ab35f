//! HTTP responses and the JSON API envelope.
//!
//! Every API answer, errors included, is wrapped as
//!
//! ```text
//! {"meta":{},"data":[ ... ]}                                   success
//! {"meta":{"error":1003,"message":"Invalid value."},"data":{}}  failure
//! ```
//!
//! Errors travel with HTTP status 200; only unroutable requests get a 500.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{CONNECTION, CONTENT_TYPE, HeaderValue, SERVER};
use hyper::{Response, StatusCode};
use relayhub_core::constants::{ERROR_INVALID_PARAMETER, ERROR_NO_DEVICE, ERROR_UNAVAILABLE};
use relayhub_core::{RelayIndex, RelayState};
use serde::Serialize;

/// Value of the `Server` header.
pub const SERVER_NAME: &str = concat!("relayhub/", env!("CARGO_PKG_VERSION"));

pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";
pub const CONTENT_TYPE_HTML: &str = "text/html; charset=utf-8";

/// Error codes reported in the JSON envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    /// 1001
    NoDevice,
    /// 1002
    Unavailable,
    /// 1003
    InvalidParameter,
}

impl ApiError {
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::NoDevice => ERROR_NO_DEVICE,
            Self::Unavailable => ERROR_UNAVAILABLE,
            Self::InvalidParameter => ERROR_INVALID_PARAMETER,
        }
    }

    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::NoDevice => "No compatible device detected.",
            Self::Unavailable => "function unavailable in this context.",
            Self::InvalidParameter => "Invalid value.",
        }
    }
}

#[derive(Serialize)]
struct Envelope<M, D> {
    meta: M,
    data: D,
}

#[derive(Serialize)]
struct Empty {}

#[derive(Serialize)]
struct ErrorMeta {
    error: u16,
    message: &'static str,
}

/// One line of `/api/info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryEntry {
    pub num: String,
    pub relay_type: String,
    pub serial: String,
}

/// One relay of a relay query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayEntry {
    pub relay: String,
    pub value: String,
}

impl RelayEntry {
    #[must_use]
    pub fn new(relay: RelayIndex, state: RelayState) -> Self {
        Self {
            relay: relay.to_string(),
            value: state.to_u8().to_string(),
        }
    }
}

/// One line of `/api/board`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardEntry {
    pub board: String,
    pub comment: String,
    pub relay_type: String,
    pub serial: String,
}

/// A response as produced by the router, before it becomes a hyper response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    #[must_use]
    pub fn html(status: StatusCode, body: String) -> Self {
        Self {
            status,
            content_type: CONTENT_TYPE_HTML,
            body,
        }
    }

    /// `{"meta":{},"data":data}`.
    pub fn json_data<D: Serialize>(data: &D) -> Self {
        Self::json(&Envelope { meta: Empty {}, data })
    }

    /// Error envelope for an API error code.
    #[must_use]
    pub fn json_error(error: ApiError) -> Self {
        Self::json(&Envelope {
            meta: ErrorMeta {
                error: error.code(),
                message: error.message(),
            },
            data: Empty {},
        })
    }

    fn json<T: Serialize>(value: &T) -> Self {
        // Envelopes hold only strings and integers.
        let body = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
        Self {
            status: StatusCode::OK,
            content_type: CONTENT_TYPE_JSON,
            body,
        }
    }

    /// Build the hyper response. `Date` and `Content-Length` are added by
    /// hyper when the response is written.
    #[must_use]
    pub fn into_hyper(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::from(self.body)));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        headers.insert(SERVER, HeaderValue::from_static(SERVER_NAME));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(self.content_type));
        headers.insert(CONNECTION, HeaderValue::from_static("close"));
        response
    }
}

use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt::{self, Debug, Display};

/// Crate-wide error value.
///
/// Codes `1..=99` are upstream or internal failures. Anything raised while
/// talking to a routing capability lands in that range and is treated as a
/// resolution failure. Codes `100` and above are caller errors.
#[derive(Clone, Debug, PartialEq)]
pub struct Error {
    pub code: i32,
    pub message: String,
}

impl Error {
    pub fn is_invalid_input(&self) -> bool {
        self.code == 101
    }

    pub fn is_resolution_failure(&self) -> bool {
        matches!(self.code, 3..=6)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for Error {}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        reqwest_error(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        io_error(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        malformed_payload_error(err)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_message) = match self.code {
            1..=99 => (StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch distance"),
            _ => (StatusCode::BAD_REQUEST, self.message.as_str()),
        };

        let body = Json(json!({
            "code": self.code,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub fn invalid_input_error() -> Error {
    Error {
        code: 101,
        message: "invalid input".into(),
    }
}

pub fn config_error<T: Display>(err: T) -> Error {
    Error {
        code: 2,
        message: format!("configuration error: {}", err),
    }
}

pub fn reqwest_error(err: reqwest::Error) -> Error {
    Error {
        code: 3,
        message: format!("reqwest error: {}", err),
    }
}

pub fn upstream_error() -> Error {
    Error {
        code: 4,
        message: "upstream error".into(),
    }
}

pub fn malformed_payload_error<T: Debug>(err: T) -> Error {
    Error {
        code: 5,
        message: format!("malformed routing payload: {:?}", err),
    }
}

pub fn resolution_dropped_error() -> Error {
    Error {
        code: 6,
        message: "resolution task ended without a result".into(),
    }
}

pub fn location_unavailable_error() -> Error {
    Error {
        code: 7,
        message: "current location unavailable".into(),
    }
}

pub fn io_error(err: std::io::Error) -> Error {
    Error {
        code: 8,
        message: format!("io error: {}", err),
    }
}

pub fn server_error<T: Display>(err: T) -> Error {
    Error {
        code: 9,
        message: format!("server error: {}", err),
    }
}

#[test]
fn resolution_failures_share_one_class() {
    assert!(reqwest_error_like().is_resolution_failure());
    assert!(upstream_error().is_resolution_failure());
    assert!(malformed_payload_error("routes").is_resolution_failure());
    assert!(resolution_dropped_error().is_resolution_failure());

    assert!(!invalid_input_error().is_resolution_failure());
    assert!(!location_unavailable_error().is_resolution_failure());
    assert!(invalid_input_error().is_invalid_input());

    fn reqwest_error_like() -> Error {
        Error {
            code: 3,
            message: "reqwest error".into(),
        }
    }
}

#[test]
fn upstream_errors_hide_details_from_clients() {
    let response = upstream_error().into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = invalid_input_error().into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

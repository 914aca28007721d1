//! Error types for the Odoo client.

use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Result type for client operations.
pub type OdooResult<T> = Result<T, OdooError>;

/// HTTP status codes that are retried with backoff.
pub const RETRYABLE_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// Longest response-body snippet kept in an error message.
const MAX_BODY_SNIPPET: usize = 500;

/// Error types that can occur while resolving, validating or executing an
/// Odoo operation.
#[derive(Debug, thiserror::Error)]
pub enum OdooError {
    /// No profile is registered under the requested company name.
    #[error("Company '{name}' not found. Available companies: {}", available.join(", "))]
    CompanyNotFound {
        name: String,
        available: Vec<String>,
    },

    /// A required argument is missing or has the wrong shape.
    #[error("Invalid arguments: {0}")]
    Validation(String),

    /// The tool name is not one of the supported operations.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// A company profile or HTTP client could not be built.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The call exceeded the configured timeout.
    #[error("Request to Odoo API timed out after {}s", timeout.as_secs_f64())]
    Timeout { timeout: Duration },

    /// Transport-level failure (refused, reset, DNS).
    #[error("Failed to connect to Odoo API: {0}")]
    Connection(String),

    /// Non-2xx response.
    #[error("Odoo API HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// Response body is not valid JSON.
    #[error("Invalid JSON response from Odoo API: {0}")]
    Decode(String),

    /// Valid JSON body carrying an upstream error envelope.
    #[error("Odoo API error: {message}")]
    Application {
        code: Option<serde_json::Value>,
        message: String,
    },

    /// The caller abandoned the call.
    #[error("Request cancelled")]
    Cancelled,

    /// Any other HTTP client failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Coarse classification of an [`OdooError`], used for logging and for
/// rendering failures to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    CompanyNotFound,
    Validation,
    Config,
    Timeout,
    Connection,
    Http,
    RetryableHttp,
    Decode,
    Application,
    Cancelled,
    Transport,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CompanyNotFound => "company_not_found",
            Self::Validation => "validation",
            Self::Config => "config",
            Self::Timeout => "timeout",
            Self::Connection => "connection",
            Self::Http => "http",
            Self::RetryableHttp => "retryable_http",
            Self::Decode => "decode",
            Self::Application => "application",
            Self::Cancelled => "cancelled",
            Self::Transport => "transport",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OdooError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CompanyNotFound { .. } => ErrorKind::CompanyNotFound,
            Self::Validation(_) | Self::UnknownTool(_) => ErrorKind::Validation,
            Self::Config(_) | Self::InvalidUrl(_) => ErrorKind::Config,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Connection(_) => ErrorKind::Connection,
            Self::HttpStatus { status, .. } if RETRYABLE_STATUS_CODES.contains(status) => {
                ErrorKind::RetryableHttp
            }
            Self::HttpStatus { .. } => ErrorKind::Http,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Application { .. } => ErrorKind::Application,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Http(_) => ErrorKind::Transport,
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether another attempt may succeed. The retry loop and the kind
    /// classification both derive from [`RETRYABLE_STATUS_CODES`].
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Timeout | ErrorKind::Connection | ErrorKind::RetryableHttp
        )
    }

    /// Classify a failure reported by the HTTP client.
    pub(crate) fn from_transport(error: reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            Self::Timeout { timeout }
        } else if error.is_connect() || error.is_request() || error.is_body() {
            Self::Connection(error.to_string())
        } else {
            Self::Http(error)
        }
    }

    /// Create an HTTP status error from a status code and response body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = match serde_json::from_str::<ErrorResponse>(body) {
            Ok(ErrorResponse {
                message: Some(message),
                ..
            }) => message,
            Ok(ErrorResponse {
                name: Some(name), ..
            }) => name,
            _ => snippet(body),
        };
        Self::HttpStatus { status, message }
    }

    /// Recognise an upstream error envelope in a decoded 2xx body.
    ///
    /// Returns `None` when the body is an ordinary result.
    pub fn from_envelope(body: &serde_json::Value) -> Option<Self> {
        let error = body.as_object()?.get("error")?;
        let (code, message) = match error {
            serde_json::Value::Object(map) => (
                map.get("code").cloned(),
                map.get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("Unknown error")
                    .to_string(),
            ),
            serde_json::Value::String(message) => (None, message.clone()),
            _ => (None, "Unknown error".to_string()),
        };
        Some(Self::Application { code, message })
    }
}

/// Error body returned by the JSON-2 endpoint on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn snippet(body: &str) -> String {
    match body.char_indices().nth(MAX_BODY_SNIPPET) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Maximum length for raw response bodies carried in error values.
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Body of a non-success response, tagged by whether the server sent
/// structured JSON. Callers can distinguish a structured error from an
/// opaque one without re-parsing.
#[derive(Debug, Clone)]
pub enum ErrorBody {
    Parsed(Value),
    Unparsed(String),
}

impl ErrorBody {
    pub fn from_text(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => ErrorBody::Parsed(value),
            Err(_) => ErrorBody::Unparsed(truncate_body(text)),
        }
    }

    /// The server's human-readable `detail` field, when present.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ErrorBody::Parsed(value) => value.get("detail").and_then(Value::as_str),
            ErrorBody::Unparsed(_) => None,
        }
    }

    /// Best-effort message for display: the `detail` field of a structured
    /// error, or the raw body text otherwise.
    pub fn message(&self) -> String {
        match self {
            ErrorBody::Parsed(value) => value
                .get("detail")
                .and_then(Value::as_str)
                .unwrap_or("unrecognized error response")
                .to_string(),
            ErrorBody::Unparsed(raw) => raw.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered 401. The session has already been cleared; the
    /// caller is responsible for returning to the login flow.
    #[error("Session expired")]
    SessionExpired,

    /// Any other non-success status, with the best-effort classified body.
    #[error("API error {status}: {}", .body.message())]
    Api { status: StatusCode, body: ErrorBody },

    /// A success status whose body could not be parsed as JSON. This is a
    /// defect in the server contract, not recoverable by retry.
    #[error("Invalid JSON response from server")]
    MalformedResponse { body: String },

    /// The exchange could not be completed at all.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ApiError {
    /// Classify a non-success response. 401 is the sole status that maps to
    /// `SessionExpired`; the caller performs the session clear.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            ApiError::SessionExpired
        } else {
            ApiError::Api {
                status,
                body: ErrorBody::from_text(body),
            }
        }
    }

    pub fn malformed(body: &str) -> Self {
        ApiError::MalformedResponse {
            body: truncate_body(body),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::SessionExpired => Some(StatusCode::UNAUTHORIZED),
            ApiError::Api { status, .. } => Some(*status),
            ApiError::MalformedResponse { .. } => None,
            ApiError::Network(e) => e.status(),
        }
    }
}

/// Truncate a response body to avoid carrying excessive data in errors.
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        body.to_string()
    } else {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!(
            "{}... (truncated, {} total bytes)",
            &body[..end],
            body.len()
        )
    }
}

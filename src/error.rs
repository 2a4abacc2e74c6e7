//! Errors raised while talking to the tracker API.
//!
//! Every failure a view can hit collapses into one inline message through
//! [`ApiError::user_message`]. An empty result set is not an error.

use serde::Deserialize;
use thiserror::Error;

/// Backend message for leaderboard periods without data.
pub const NO_DATA_MESSAGE: &str = "No data found for the specified period";

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// Network or transport failure before a response arrived
    #[error("request failed: {0}")]
    Transport(String),
    /// Non-2xx response
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    /// 2xx response whose body did not match the expected shape
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{0}")]
    InvalidInput(String),
}

/// Error body sent by the backend: `{ "error": "..." }`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

impl ApiError {
    /// Build a status error from a non-2xx response body.
    ///
    /// Uses the body's `error` field when present, otherwise a generic
    /// "HTTP error, status N" message.
    ///
    /// ```
    /// use route_viewer::ApiError;
    ///
    /// let err = ApiError::from_response(404, br#"{"error":"User not found"}"#);
    /// assert_eq!(err.user_message(), "User not found");
    ///
    /// let err = ApiError::from_response(502, b"<html>Bad gateway</html>");
    /// assert_eq!(err.user_message(), "HTTP error, status 502");
    /// ```
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.error)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("HTTP error, status {}", status));
        ApiError::Status { status, message }
    }

    /// The single string a view shows in place of its content.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Transport(msg)
            | ApiError::InvalidConfig(msg)
            | ApiError::InvalidInput(msg) => msg.clone(),
            ApiError::Status { message, .. } => message.clone(),
            ApiError::Decode(msg) => format!("invalid response: {}", msg),
        }
    }

    /// HTTP status, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the backend reported an empty period rather than a failure.
    pub fn is_no_data(&self) -> bool {
        matches!(self, ApiError::Status { message, .. } if message == NO_DATA_MESSAGE)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_error_body() {
        let err = ApiError::from_response(400, br#"{"error":"Invalid date range"}"#);
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.user_message(), "Invalid date range");
    }

    #[test]
    fn test_missing_error_field_falls_back() {
        let err = ApiError::from_response(500, br#"{"detail":"boom"}"#);
        assert_eq!(err.user_message(), "HTTP error, status 500");

        let err = ApiError::from_response(503, b"");
        assert_eq!(err.user_message(), "HTTP error, status 503");

        let err = ApiError::from_response(500, br#"{"error":""}"#);
        assert_eq!(err.user_message(), "HTTP error, status 500");
    }

    #[test]
    fn test_no_data_detection() {
        let err = ApiError::from_response(404, br#"{"error":"No data found for the specified period"}"#);
        assert!(err.is_no_data());
        assert!(!ApiError::Transport("offline".into()).is_no_data());
    }

    #[test]
    fn test_decode_from_serde() {
        let err: ApiError = serde_json::from_str::<Vec<u8>>("nope").unwrap_err().into();
        assert!(matches!(err, ApiError::Decode(_)));
        assert!(err.user_message().starts_with("invalid response"));
    }
}

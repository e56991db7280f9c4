use portal_core::ValidationError;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Everything a portal call can fail with.
///
/// Pages render [`ApiError::user_message`]; only [`ApiError::SessionExpired`]
/// sends the user back to the login screen.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("http status {status}: {}", detail.as_deref().unwrap_or("no detail"))]
    Http { status: u16, detail: Option<String> },
    #[error("session expired")]
    SessionExpired,
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ApiError {
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Http {
                detail: Some(detail),
                ..
            } => detail.clone(),
            ApiError::Http { status, .. } => format!("Request failed (HTTP {status})"),
            ApiError::Transport(_) => "Unable to reach the server".to_string(),
            ApiError::Decode(_) => "Unexpected response from the server".to_string(),
            ApiError::SessionExpired => "Your session has expired. Please sign in again.".to_string(),
            ApiError::Validation(err) => err.message.clone(),
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub(crate) fn from_body(status: u16, body: &[u8]) -> Self {
        ApiError::Http {
            status,
            detail: extract_detail(body),
        }
    }
}

/// The `detail` string of an error body, if it has one.
pub fn extract_detail(body: &[u8]) -> Option<String> {
    let value: JsonValue = serde_json::from_slice(body).ok()?;
    value
        .get("detail")
        .and_then(JsonValue::as_str)
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_is_shown_verbatim() {
        let err = ApiError::from_body(403, br#"{"detail": "You do not have permission."}"#);
        assert_eq!(err.user_message(), "You do not have permission.");
        assert_eq!(err.status(), Some(403));
    }

    #[test]
    fn missing_or_non_string_detail_falls_back() {
        let missing = ApiError::from_body(500, b"<html>oops</html>");
        assert_eq!(missing.user_message(), "Request failed (HTTP 500)");

        let numeric = ApiError::from_body(400, br#"{"detail": 42}"#);
        assert_eq!(numeric.user_message(), "Request failed (HTTP 400)");

        let nested = ApiError::from_body(400, br#"{"errors": {"detail": "x"}}"#);
        assert_eq!(nested.user_message(), "Request failed (HTTP 400)");
    }

    #[test]
    fn validation_errors_keep_their_message() {
        let err: ApiError = ValidationError::new("Invalid email format").into();
        assert_eq!(err.user_message(), "Invalid email format");
        assert!(!err.is_session_expired());
        assert!(ApiError::SessionExpired.is_session_expired());
    }
}

use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 | 403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Whether the remote side is effectively unreachable, as opposed to
    /// answering with something unusable.
    pub fn is_unreachable(&self) -> bool {
        match self {
            ApiError::RateLimited | ApiError::ServerError(_) => true,
            ApiError::NetworkError(e) => !e.is_decode(),
            _ => false,
        }
    }
}

impl From<ApiError> for ErrorKind {
    fn from(err: ApiError) -> Self {
        if err.is_unreachable() {
            ErrorKind::TransportUnreachable(err.to_string())
        } else {
            ErrorKind::Payload(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_classification() {
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, "gone"),
            ApiError::NotFound(_)
        ));
        assert!(ApiError::from_status(StatusCode::BAD_GATEWAY, "").is_unreachable());
        assert!(ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, "").is_unreachable());
        assert!(!ApiError::from_status(StatusCode::FORBIDDEN, "").is_unreachable());
    }

    #[test]
    fn test_into_error_kind() {
        let kind: ErrorKind = ApiError::ServerError("down".into()).into();
        assert!(matches!(kind, ErrorKind::TransportUnreachable(_)));

        let kind: ErrorKind = ApiError::InvalidResponse("html".into()).into();
        assert!(matches!(kind, ErrorKind::Payload(_)));
    }

    #[test]
    fn test_truncate_body() {
        let long = "é".repeat(400);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.contains("truncated, 800 total bytes"));
        assert_eq!(ApiError::truncate_body("short"), "short");
    }
}

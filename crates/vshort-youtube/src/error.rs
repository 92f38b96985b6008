//! Platform client error types.

use thiserror::Error;
use vshort_models::ErrorKind;

pub type PlatformResult<T> = Result<T, PlatformError>;

/// Reasons in a 403 body that mean "out of quota" rather than "not allowed".
const QUOTA_REASONS: &[&str] = &[
    "quotaExceeded",
    "uploadLimitExceeded",
    "rateLimitExceeded",
    "userRateLimitExceeded",
    "dailyLimitExceeded",
];

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Quota exceeded: {0}")]
    Quota(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlatformError {
    /// Job error kind this failure is reported as.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlatformError::Auth(_) => ErrorKind::AuthError,
            PlatformError::Quota(_) => ErrorKind::QuotaError,
            PlatformError::Network(_) | PlatformError::InvalidResponse(_) | PlatformError::Io(_) => {
                ErrorKind::NetworkError
            }
        }
    }

    /// Only transport-level failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PlatformError::Network(_))
    }

    /// Classify a non-success HTTP response from the API.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = api_message(body).unwrap_or_else(|| truncate(body, 300));
        match status {
            401 => PlatformError::Auth(format!("401: {}", message)),
            403 if has_quota_reason(body) => PlatformError::Quota(format!("403: {}", message)),
            403 => PlatformError::Auth(format!("403: {}", message)),
            429 => PlatformError::Quota(format!("429: {}", message)),
            500..=599 => PlatformError::Network(format!("server error {}: {}", status, message)),
            _ => PlatformError::InvalidResponse(format!("unexpected status {}: {}", status, message)),
        }
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PlatformError::Network(format!("request timed out: {}", e))
        } else if e.is_decode() {
            PlatformError::InvalidResponse(e.to_string())
        } else {
            PlatformError::Network(e.to_string())
        }
    }
}

/// `error.message` from a Google API error body.
fn api_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value["error"]["message"].as_str().map(str::to_string)
}

fn has_quota_reason(body: &str) -> bool {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return QUOTA_REASONS.iter().any(|r| body.contains(r));
    };
    value["error"]["errors"]
        .as_array()
        .map(|errors| {
            errors.iter().any(|e| {
                e["reason"]
                    .as_str()
                    .map(|r| QUOTA_REASONS.contains(&r))
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false)
}

fn truncate(s: &str, max: usize) -> String {
    let s = s.trim();
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUOTA_BODY: &str = r#"{"error": {"code": 403, "message": "The request cannot be completed because you have exceeded your quota.",
        "errors": [{"domain": "youtube.quota", "reason": "quotaExceeded"}]}}"#;

    const FORBIDDEN_BODY: &str = r#"{"error": {"code": 403, "message": "Forbidden",
        "errors": [{"domain": "global", "reason": "forbidden"}]}}"#;

    #[test]
    fn test_classification() {
        assert!(matches!(PlatformError::from_status(401, ""), PlatformError::Auth(_)));
        assert!(matches!(PlatformError::from_status(403, QUOTA_BODY), PlatformError::Quota(_)));
        assert!(matches!(PlatformError::from_status(403, FORBIDDEN_BODY), PlatformError::Auth(_)));
        assert!(matches!(PlatformError::from_status(429, ""), PlatformError::Quota(_)));
        assert!(matches!(PlatformError::from_status(503, "busy"), PlatformError::Network(_)));
        assert!(matches!(PlatformError::from_status(400, "bad"), PlatformError::InvalidResponse(_)));
    }

    #[test]
    fn test_message_extracted() {
        let err = PlatformError::from_status(403, QUOTA_BODY);
        assert!(err.to_string().contains("exceeded your quota"));
    }

    #[test]
    fn test_kind_and_retry() {
        assert_eq!(PlatformError::Quota("x".into()).kind(), ErrorKind::QuotaError);
        assert_eq!(PlatformError::Auth("x".into()).kind(), ErrorKind::AuthError);
        assert!(PlatformError::Network("x".into()).is_retryable());
        assert!(!PlatformError::Quota("x".into()).is_retryable());
        assert!(!PlatformError::InvalidResponse("x".into()).is_retryable());
    }
}

//! The session/translator error taxonomy.
//!
//! `main` and configuration loading use `anyhow`; everything inside a
//! session's lifetime uses `ProxyError` so the session loop can decide
//! fatal-vs-recoverable without string matching.

use crate::config::ConfigError;
use crate::upstream::UpstreamErrorDetail;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("upstream handshake failed: {0}")]
    UpstreamHandshake(String),

    /// An explicit `error` event received from upstream during the
    /// handshake, carrying the provider's own message/code so the
    /// client-visible `Error` can echo them verbatim rather than a
    /// generic proxy-side code.
    #[error("upstream rejected the session: {}", .0.message)]
    UpstreamRejected(UpstreamErrorDetail),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("translation error: {0}")]
    Translation(String),

    #[error("timed out waiting for upstream session.updated")]
    Timeout,

    #[error("write queue backpressure exceeded")]
    Backpressure,

    #[error("client socket error: {0}")]
    ClientSocket(#[from] axum::Error),

    #[error("upstream socket error: {0}")]
    UpstreamSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("message serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Whether an error tears the session down or leaves it in `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Fatal,
    Recoverable,
}

impl ProxyError {
    /// Classifies this error as fatal (tear the session down) or
    /// recoverable (stay in `Ready`, notify the client, keep going).
    pub fn class(&self) -> ErrorClass {
        match self {
            ProxyError::Config(_) => ErrorClass::Fatal,
            ProxyError::UpstreamHandshake(_) => ErrorClass::Fatal,
            ProxyError::UpstreamRejected(_) => ErrorClass::Fatal,
            ProxyError::ProtocolViolation(_) => ErrorClass::Fatal,
            ProxyError::Timeout => ErrorClass::Fatal,
            ProxyError::Backpressure => ErrorClass::Fatal,
            ProxyError::ClientSocket(_) => ErrorClass::Fatal,
            ProxyError::UpstreamSocket(_) => ErrorClass::Fatal,
            ProxyError::Translation(_) => ErrorClass::Recoverable,
            ProxyError::Serialization(_) => ErrorClass::Recoverable,
        }
    }
}

/// Classifies an `error` event received from upstream. Upstream's own
/// error codes don't distinguish fatal from recoverable, so this
/// leans on the one signal it does give: a code naming itself a
/// warning is treated as recoverable, everything else tears the
/// session down rather than risk continuing in a state upstream
/// considers broken.
pub fn classify_upstream_error(detail: &UpstreamErrorDetail) -> ErrorClass {
    match &detail.code {
        Some(code) if code.contains("warning") => ErrorClass::Recoverable,
        _ => ErrorClass::Fatal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_errors_without_a_warning_code_are_fatal() {
        let detail = UpstreamErrorDetail {
            message: "invalid request".to_string(),
            code: Some("invalid_request_error".to_string()),
        };
        assert_eq!(classify_upstream_error(&detail), ErrorClass::Fatal);
    }

    #[test]
    fn upstream_errors_with_a_warning_code_are_recoverable() {
        let detail = UpstreamErrorDetail {
            message: "item already has a response in flight".to_string(),
            code: Some("response_warning".to_string()),
        };
        assert_eq!(classify_upstream_error(&detail), ErrorClass::Recoverable);
    }

    #[test]
    fn fatal_errors_are_classified_fatal() {
        assert_eq!(ProxyError::Timeout.class(), ErrorClass::Fatal);
        assert_eq!(ProxyError::Backpressure.class(), ErrorClass::Fatal);
        assert_eq!(
            ProxyError::ProtocolViolation("bad".into()).class(),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn translation_errors_are_recoverable() {
        assert_eq!(
            ProxyError::Translation("unrecognized type".into()).class(),
            ErrorClass::Recoverable
        );
    }

    #[test]
    fn upstream_rejected_carries_the_provider_detail() {
        let detail = UpstreamErrorDetail {
            message: "invalid_api_key".to_string(),
            code: Some("invalid_request_error".to_string()),
        };
        let err = ProxyError::UpstreamRejected(detail);
        assert_eq!(err.class(), ErrorClass::Fatal);
        assert!(err.to_string().contains("invalid_api_key"));
    }

    #[test]
    fn error_messages_never_echo_raw_field_name_as_credential() {
        let err = ProxyError::UpstreamHandshake("401 unauthorized".into());
        assert_eq!(err.to_string(), "upstream handshake failed: 401 unauthorized");
    }
}

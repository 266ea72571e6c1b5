//! Application error types

use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
///
/// Cloneable so a single coalesced fetch result can be handed to every waiter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    /// Missing or rejected credential. Fatal, never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network failure, timeout or 5xx/429 upstream answer. Retried per policy.
    #[error("Transient fetch error: {0}")]
    Transient(String),

    /// Upstream response missing or malformed expected fields.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Non-retryable 4xx answer from an upstream provider.
    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// Analysis engine exhausted its retries or returned empty content.
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// A gating input of a downstream stage could not be resolved.
    #[error("Dependency '{group}' failed: {reason}")]
    DependencyFailed { group: String, reason: String },

    #[error("Keychain error: {0}")]
    Keychain(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the orchestrator may schedule another attempt after this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Transient(_))
    }

    /// Whether this error must abort the pipeline instead of degrading
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Config(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Transient(_) => "TRANSIENT_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Upstream { .. } => "UPSTREAM_ERROR",
            AppError::Analysis(_) => "ANALYSIS_ERROR",
            AppError::DependencyFailed { .. } => "DEPENDENCY_FAILED",
            AppError::Keychain(_) => "KEYCHAIN_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return AppError::Validation(format!("Malformed upstream response: {}", err));
        }
        match err.status() {
            Some(status) if status.is_client_error() && status.as_u16() != 429 => {
                AppError::Upstream {
                    status: status.as_u16(),
                    message: err.to_string(),
                }
            }
            _ => AppError::Transient(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("Malformed JSON: {}", err))
    }
}

impl From<keyring::Error> for AppError {
    fn from(err: keyring::Error) -> Self {
        AppError::Keychain(err.to_string())
    }
}

/// Serializable error response for dashboard consumers
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        ErrorResponse {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        ErrorResponse::from(self).serialize(serializer)
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(AppError::Transient("reset".into()).is_retryable());
        assert!(!AppError::Config("no key".into()).is_retryable());
        assert!(!AppError::Validation("bad".into()).is_retryable());
        assert!(!AppError::Upstream { status: 404, message: "gone".into() }.is_retryable());
        assert!(!AppError::Analysis("empty".into()).is_retryable());
    }

    #[test]
    fn test_error_serializes_with_code() {
        let err = AppError::Config("OPENAI_API_KEY is not set".into());
        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json["code"], "CONFIG_ERROR");
        assert_eq!(
            json["message"],
            "Configuration error: OPENAI_API_KEY is not set"
        );
    }

    #[test]
    fn test_serde_json_error_is_validation() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: AppError = parse.unwrap_err().into();
        assert!(matches!(err, AppError::Validation(_)));
    }
}

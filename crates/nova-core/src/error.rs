use thiserror::Error;

/// Field-level detail attached to a [`NovaError::Validation`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Top-level error taxonomy crossing the `nova-core` boundary.
///
/// Every component returns one of these kinds as a value; there is no
/// exception-for-control-flow anywhere in the engine.
#[derive(Debug, Error)]
pub enum NovaError {
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        fields: Vec<FieldError>,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rate limited: retry after {remaining_lockout_seconds}s")]
    RateLimited { remaining_lockout_seconds: u64 },

    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("upstream timeout after {0}s")]
    UpstreamTimeout(u64),

    #[error("decryption failed: {0}")]
    DecryptionFailure(String),

    #[error("key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl NovaError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn validation_fields(message: impl Into<String>, fields: Vec<FieldError>) -> Self {
        Self::Validation {
            message: message.into(),
            fields,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Stable error code used by transports to pick a status mapping.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::UpstreamUnreachable(_) => "UPSTREAM_UNREACHABLE",
            Self::UpstreamTimeout(_) => "UPSTREAM_TIMEOUT",
            Self::DecryptionFailure(_) => "DECRYPTION_FAILURE",
            Self::KeyUnavailable(_) => "KEY_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl From<serde_json::Error> for NovaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization error: {err}"))
    }
}

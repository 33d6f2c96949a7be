// src/error.rs
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Failure of a single Bounded Remote Call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{provider} returned HTTP {status}")]
    Http { provider: String, status: u16 },

    #[error("{provider} did not respond within {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("{provider} transport failure: {message}")]
    Transport { provider: String, message: String },

    #[error("{provider} returned an unreadable body: {message}")]
    Decode { provider: String, message: String },

    /// 2xx response whose body is an error or throttling notice.
    #[error("{provider} rejected the request: {message}")]
    Rejected { provider: String, message: String },
}

impl ProviderError {
    pub fn provider(&self) -> &str {
        match self {
            Self::Http { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::Transport { provider, .. }
            | Self::Decode { provider, .. }
            | Self::Rejected { provider, .. } => provider,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("{provider} not configured: set {env_var}")]
    NotConfigured { provider: String, env_var: String },

    #[error("Invalid endpoint for {provider}: {message}")]
    InvalidEndpoint { provider: String, message: String },

    #[error("Missing required parameter: '{0}'")]
    MissingParameter(String),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{provider}: {message}")]
    NotFound { provider: String, message: String },

    #[error("{provider} response is missing required field '{field}'")]
    Incomplete { provider: String, field: String },

    #[error("All sources failed ({}): {last_error}", attempted.join(", "))]
    Exhausted {
        attempted: Vec<String>,
        last_error: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Serialisable tag recorded as `metadata.error_kind` on degraded envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Validation,
    ProviderHttp,
    ProviderTimeout,
    ProviderTransport,
    ProviderDecode,
    ProviderRejected,
    NotFound,
    IncompletePayload,
    Exhausted,
    Internal,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Validation => "validation",
            Self::ProviderHttp => "provider_http",
            Self::ProviderTimeout => "provider_timeout",
            Self::ProviderTransport => "provider_transport",
            Self::ProviderDecode => "provider_decode",
            Self::ProviderRejected => "provider_rejected",
            Self::NotFound => "not_found",
            Self::IncompletePayload => "incomplete_payload",
            Self::Exhausted => "exhausted",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToolError {
    pub fn not_configured(provider: impl Into<String>, env_var: impl Into<String>) -> Self {
        Self::NotConfigured {
            provider: provider.into(),
            env_var: env_var.into(),
        }
    }

    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn incomplete(provider: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Incomplete {
            provider: provider.into(),
            field: field.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotConfigured { .. } | Self::InvalidEndpoint { .. } => ErrorKind::Configuration,
            Self::MissingParameter(_) | Self::InvalidParameter { .. } => ErrorKind::Validation,
            Self::Provider(ProviderError::Http { .. }) => ErrorKind::ProviderHttp,
            Self::Provider(ProviderError::Timeout { .. }) => ErrorKind::ProviderTimeout,
            Self::Provider(ProviderError::Transport { .. }) => ErrorKind::ProviderTransport,
            Self::Provider(ProviderError::Decode { .. }) => ErrorKind::ProviderDecode,
            Self::Provider(ProviderError::Rejected { .. }) => ErrorKind::ProviderRejected,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Incomplete { .. } => ErrorKind::IncompletePayload,
            Self::Exhausted { .. } => ErrorKind::Exhausted,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether a Fallback Chain should move on to its next candidate.
    pub fn triggers_fallback(&self) -> bool {
        matches!(
            self,
            Self::Provider(_) | Self::NotFound { .. } | Self::Incomplete { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_failures_trigger_fallback() {
        let timeout = ToolError::from(ProviderError::Timeout {
            provider: "fmp".into(),
            timeout_ms: 10_000,
        });
        assert!(timeout.triggers_fallback());
        assert_eq!(timeout.kind(), ErrorKind::ProviderTimeout);
        assert!(ToolError::not_found("fmp", "no quote").triggers_fallback());
        assert!(ToolError::incomplete("yahoo", "quoteType").triggers_fallback());
    }

    #[test]
    fn configuration_and_validation_do_not_chain() {
        let missing_key = ToolError::not_configured("financialmodelingprep.com", "FMP_API_KEY");
        assert!(!missing_key.triggers_fallback());
        assert_eq!(missing_key.kind(), ErrorKind::Configuration);
        assert!(missing_key.to_string().contains("FMP_API_KEY"));

        let missing_param = ToolError::MissingParameter("symbol".into());
        assert!(!missing_param.triggers_fallback());
        assert_eq!(missing_param.kind().as_str(), "validation");
    }

    #[test]
    fn exhausted_message_lists_sources_in_order() {
        let err = ToolError::Exhausted {
            attempted: vec!["a".into(), "b".into(), "c".into()],
            last_error: "c returned HTTP 500".into(),
        };
        assert_eq!(
            err.to_string(),
            "All sources failed (a, b, c): c returned HTTP 500"
        );
    }
}

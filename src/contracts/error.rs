//! The routing-level error shape.
//!
//! Every failure that crosses the engine boundary - no eligible provider, a
//! specific adapter's transport failure, an exhausted cascade, or an
//! adapter-defined logical rejection - is reported through [`RouteError`].
//! The `retryable` flag is the single signal the engine uses to decide
//! whether to keep falling back or stop immediately.

use serde::{Serialize, Serializer};

use super::Capability;

/// Stable machine-readable error code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    /// No eligible healthy adapter at all. Fatal to this call, retryable
    /// at a later time.
    NoProviderAvailable,
    /// A specific adapter's transport or vendor-side failure.
    ProviderError,
    /// The fallback cascade was exhausted without a success.
    AllProvidersFailed,
    /// The request itself is malformed; no provider would handle it
    /// differently.
    InvalidRequest,
    /// The adapter does not implement the invoked operation.
    Unsupported,
    /// The adapter could not parse the vendor response.
    Parse,
    /// An adapter-defined code, passed through verbatim.
    Other(String),
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::NoProviderAvailable => "NO_PROVIDER_AVAILABLE",
            ErrorCode::ProviderError => "PROVIDER_ERROR",
            ErrorCode::AllProvidersFailed => "ALL_PROVIDERS_FAILED",
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::Unsupported => "UNSUPPORTED",
            ErrorCode::Parse => "PARSE_ERROR",
            ErrorCode::Other(code) => code,
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A routing failure returned to callers inside [`super::Routed`].
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct RouteError {
    pub code: ErrorCode,
    pub message: String,
    /// The provider that produced the error, when one was involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Whether falling back to another provider (or retrying later) could
    /// succeed.
    pub retryable: bool,
}

impl RouteError {
    /// No enabled, healthy, tier-eligible provider implements the capability.
    pub fn no_provider_available(capability: Capability) -> Self {
        Self {
            code: ErrorCode::NoProviderAvailable,
            message: format!("no provider available for capability {capability}"),
            provider: None,
            retryable: true,
        }
    }

    /// A specific provider failed at the transport level.
    pub fn provider_error(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ProviderError,
            message: message.into(),
            provider: Some(provider.into()),
            retryable: true,
        }
    }

    /// Every attempted provider failed and no specific error was captured.
    pub fn all_providers_failed(capability: Capability) -> Self {
        Self {
            code: ErrorCode::AllProvidersFailed,
            message: format!("all providers failed for capability {capability}"),
            provider: None,
            retryable: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_serialize_as_strings() {
        let err = RouteError::no_provider_available(Capability::Embedding);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "NO_PROVIDER_AVAILABLE");
        assert_eq!(json["retryable"], true);
        assert!(json.get("provider").is_none());

        let other = ErrorCode::Other("QUOTA_EXCEEDED".to_string());
        assert_eq!(serde_json::to_value(&other).unwrap(), "QUOTA_EXCEEDED");
    }

    #[test]
    fn test_display_includes_code_and_message() {
        let err = RouteError::provider_error("openai", "connection reset");
        assert_eq!(err.to_string(), "PROVIDER_ERROR: connection reset");
    }
}

//! Provider adapter contract.
//!
//! Adapters are the only component that talks to AI vendors; this layer
//! treats them as opaque implementations of [`ProviderAdapter`]. Every
//! capability method defaults to an `Unsupported` error, so an adapter
//! implements exactly the operations for the capabilities it declares in its
//! descriptor and nothing else.
//!
//! Adapter failures come in two flavors: transport failures (network errors,
//! timeouts, cancellation) which feed the circuit breaker, and logical
//! rejections (invalid input, unsupported operation, vendor-side refusals)
//! which do not. [`AdapterError`] represents both; the routing engine never
//! needs language-level exception handling for its control flow.

use async_trait::async_trait;
use std::time::Duration;

use crate::contracts::{
    AssessmentRequest, AssessmentResponse, CompletionRequest, CompletionResponse, EmbeddingRequest,
    EmbeddingResponse, ErrorCode, ImageGenerationRequest, ImageGenerationResponse, RouteError,
    SafetyRequest, SafetyResponse, SpeechSynthesisRequest, SpeechSynthesisResponse,
    StructuredRequest, StructuredResponse, TranscriptionRequest, TranscriptionResponse,
    TranslationRequest, TranslationResponse, VisionRequest, VisionResponse,
};

/// What an adapter returns on success: the capability response plus the raw
/// accounting inputs the engine turns into usage metadata.
#[derive(Debug, Clone)]
pub struct AdapterOutput<T> {
    pub data: T,
    /// Model name the vendor actually served.
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl<T> AdapterOutput<T> {
    pub fn new(data: T, model: impl Into<String>, input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            data,
            model: model.into(),
            input_tokens,
            output_tokens,
        }
    }
}

pub type AdapterResult<T> = Result<AdapterOutput<T>, AdapterError>;

/// An adapter failure, transport-level or logical.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterError {
    /// Connection-level failure reaching the vendor.
    #[error("network error: {0}")]
    Network(String),

    /// The call exceeded its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The call was cancelled before completing.
    #[error("request cancelled")]
    Cancelled,

    /// The vendor throttled the call; another provider may accept it.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The request is malformed; no provider would handle it differently.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The adapter does not implement this operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// The vendor responded but the payload could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Vendor-defined rejection, passed through with its own code.
    #[error("provider error {code}: {message}")]
    Provider {
        code: String,
        message: String,
        retryable: bool,
    },
}

impl AdapterError {
    /// Transport failures are the only ones recorded against a provider's
    /// circuit breaker: the call itself never completed.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AdapterError::Network(_) | AdapterError::Timeout(_) | AdapterError::Cancelled
        )
    }

    /// Whether falling back to the next provider could succeed.
    pub fn retryable(&self) -> bool {
        match self {
            AdapterError::Network(_)
            | AdapterError::Timeout(_)
            | AdapterError::Cancelled
            | AdapterError::RateLimited(_) => true,
            AdapterError::InvalidInput(_)
            | AdapterError::Unsupported(_)
            | AdapterError::Parse(_) => false,
            AdapterError::Provider { retryable, .. } => *retryable,
        }
    }

    /// Convert into the routing-level error shape, attributed to `provider`.
    pub fn to_route_error(&self, provider: &str) -> RouteError {
        let code = match self {
            AdapterError::Network(_) | AdapterError::Timeout(_) | AdapterError::Cancelled => {
                ErrorCode::ProviderError
            }
            AdapterError::RateLimited(_) => ErrorCode::ProviderError,
            AdapterError::InvalidInput(_) => ErrorCode::InvalidRequest,
            AdapterError::Unsupported(_) => ErrorCode::Unsupported,
            AdapterError::Parse(_) => ErrorCode::Parse,
            AdapterError::Provider { code, .. } => ErrorCode::Other(code.clone()),
        };
        RouteError {
            code,
            message: self.to_string(),
            provider: Some(provider.to_string()),
            retryable: self.retryable(),
        }
    }
}

fn unsupported<T>(operation: &str) -> AdapterResult<T> {
    Err(AdapterError::Unsupported(format!(
        "adapter does not implement {operation}"
    )))
}

/// One configured vendor integration.
///
/// All methods default to `Unsupported`; adapters override the subset
/// matching their declared capabilities. Any two adapters implementing the
/// same capability are interchangeable from the caller's point of view.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn complete(&self, _request: &CompletionRequest) -> AdapterResult<CompletionResponse> {
        unsupported("complete")
    }

    async fn assess(&self, _request: &AssessmentRequest) -> AdapterResult<AssessmentResponse> {
        unsupported("assess")
    }

    async fn check_safety(&self, _request: &SafetyRequest) -> AdapterResult<SafetyResponse> {
        unsupported("check_safety")
    }

    async fn analyze_image(&self, _request: &VisionRequest) -> AdapterResult<VisionResponse> {
        unsupported("analyze_image")
    }

    async fn embed(&self, _request: &EmbeddingRequest) -> AdapterResult<EmbeddingResponse> {
        unsupported("embed")
    }

    async fn transcribe(
        &self,
        _request: &TranscriptionRequest,
    ) -> AdapterResult<TranscriptionResponse> {
        unsupported("transcribe")
    }

    async fn synthesize_speech(
        &self,
        _request: &SpeechSynthesisRequest,
    ) -> AdapterResult<SpeechSynthesisResponse> {
        unsupported("synthesize_speech")
    }

    async fn translate(&self, _request: &TranslationRequest) -> AdapterResult<TranslationResponse> {
        unsupported("translate")
    }

    async fn generate_structured(
        &self,
        _request: &StructuredRequest,
    ) -> AdapterResult<StructuredResponse> {
        unsupported("generate_structured")
    }

    async fn generate_image(
        &self,
        _request: &ImageGenerationRequest,
    ) -> AdapterResult<ImageGenerationResponse> {
        unsupported("generate_image")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BareAdapter;
    impl ProviderAdapter for BareAdapter {}

    #[tokio::test]
    async fn test_default_methods_report_unsupported() {
        let adapter = BareAdapter;
        let req = EmbeddingRequest {
            meta: Default::default(),
            input: vec!["x".to_string()],
            model: None,
        };
        let err = adapter.embed(&req).await.unwrap_err();
        assert!(matches!(err, AdapterError::Unsupported(_)));
        assert!(!err.retryable());
        assert!(!err.is_transport());
    }

    #[test]
    fn test_error_classification() {
        assert!(AdapterError::Network("reset".into()).is_transport());
        assert!(AdapterError::Timeout(Duration::from_secs(1)).is_transport());
        assert!(AdapterError::Cancelled.is_transport());
        assert!(!AdapterError::RateLimited("slow down".into()).is_transport());
        assert!(AdapterError::RateLimited("slow down".into()).retryable());
        assert!(!AdapterError::InvalidInput("bad".into()).retryable());

        let vendor = AdapterError::Provider {
            code: "QUOTA_EXCEEDED".to_string(),
            message: "monthly quota exhausted".to_string(),
            retryable: false,
        };
        assert!(!vendor.retryable());
        let route = vendor.to_route_error("gemini");
        assert_eq!(route.code, ErrorCode::Other("QUOTA_EXCEEDED".to_string()));
        assert_eq!(route.provider.as_deref(), Some("gemini"));
    }
}

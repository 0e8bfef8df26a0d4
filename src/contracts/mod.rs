//! Capability contracts - provider-agnostic request and response shapes.
//!
//! # Key Concepts
//! - Capability: a named kind of AI operation with a fixed contract
//! - CostTier: caller-selected cost/quality class used to filter providers
//! - RequestMeta: routing fields carried by every request (tier, overrides, ids)
//! - Routed: the result shape every routing path returns - data or a typed
//!   error, always with usage metadata attached
//!
//! Contracts are pure data. Any two adapters implementing the same capability
//! are interchangeable from the caller's point of view: same request shape in,
//! same response shape out, differing only in quality, cost, and latency.

mod error;
mod requests;
mod usage;

pub use error::{ErrorCode, RouteError};
pub use requests::{
    AssessmentRequest, AssessmentResponse, CompletionRequest, CompletionResponse,
    EmbeddingRequest, EmbeddingResponse, ImageGenerationRequest, ImageGenerationResponse,
    RequestMeta, SafetyRequest, SafetyResponse, SpeechSynthesisRequest, SpeechSynthesisResponse,
    StructuredRequest, StructuredResponse, TranscriptionRequest, TranscriptionResponse,
    TranslationRequest, TranslationResponse, VisionRequest, VisionResponse,
};
pub use usage::AiUsage;

use serde::{Deserialize, Serialize};

/// A named kind of AI operation with a fixed request/response contract.
///
/// The set is closed: adapters declare which of these they implement, and the
/// routing engine never dispatches a capability an adapter did not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    TextCompletion,
    Assessment,
    ContentSafety,
    Vision,
    Embedding,
    Speech,
    Translation,
    StructuredOutput,
    ImageGeneration,
}

impl Capability {
    /// All capabilities, in declaration order.
    pub const ALL: [Capability; 9] = [
        Capability::TextCompletion,
        Capability::Assessment,
        Capability::ContentSafety,
        Capability::Vision,
        Capability::Embedding,
        Capability::Speech,
        Capability::Translation,
        Capability::StructuredOutput,
        Capability::ImageGeneration,
    ];

    /// Stable kebab-case tag, used in cache keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::TextCompletion => "text-completion",
            Capability::Assessment => "assessment",
            Capability::ContentSafety => "content-safety",
            Capability::Vision => "vision",
            Capability::Embedding => "embedding",
            Capability::Speech => "speech",
            Capability::Translation => "translation",
            Capability::StructuredOutput => "structured-output",
            Capability::ImageGeneration => "image-generation",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cost/quality class for a request.
///
/// Expresses the caller's willingness to pay for quality and latency versus
/// cost. Providers declare which tiers they are eligible to serve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostTier {
    Critical,
    #[default]
    Standard,
    Economy,
}

impl CostTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostTier::Critical => "critical",
            CostTier::Standard => "standard",
            CostTier::Economy => "economy",
        }
    }
}

impl std::fmt::Display for CostTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one routed call: either the capability's response or a typed
/// error, always carrying usage metadata.
///
/// No path through the routing engine returns a bare `Err` - callers branch
/// on [`Routed::is_success`] (or destructure `result`) instead of catching
/// anything.
#[derive(Debug, Clone)]
pub struct Routed<T> {
    pub result: Result<T, RouteError>,
    pub usage: AiUsage,
}

impl<T> Routed<T> {
    /// Build a successful result.
    pub fn success(data: T, usage: AiUsage) -> Self {
        Self {
            result: Ok(data),
            usage,
        }
    }

    /// Build a failed result.
    pub fn failure(error: RouteError, usage: AiUsage) -> Self {
        Self {
            result: Err(error),
            usage,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// The response data, if the call succeeded.
    pub fn data(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    /// The error, if the call failed.
    pub fn error(&self) -> Option<&RouteError> {
        self.result.as_ref().err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_tags_are_stable() {
        assert_eq!(Capability::TextCompletion.as_str(), "text-completion");
        assert_eq!(Capability::ContentSafety.as_str(), "content-safety");
        assert_eq!(Capability::StructuredOutput.as_str(), "structured-output");

        // serde names must match the stable tags
        let json = serde_json::to_string(&Capability::ImageGeneration).unwrap();
        assert_eq!(json, "\"image-generation\"");
    }

    #[test]
    fn test_tier_defaults_to_standard() {
        assert_eq!(CostTier::default(), CostTier::Standard);

        #[derive(Deserialize)]
        struct Probe {
            #[serde(default)]
            tier: CostTier,
        }
        let p: Probe = serde_json::from_str("{}").unwrap();
        assert_eq!(p.tier, CostTier::Standard);
    }

    #[test]
    fn test_routed_accessors() {
        let ok: Routed<u32> = Routed::success(7, AiUsage::none(CostTier::Standard));
        assert!(ok.is_success());
        assert_eq!(ok.data(), Some(&7));
        assert!(ok.error().is_none());

        let err: Routed<u32> = Routed::failure(
            RouteError::no_provider_available(Capability::Vision),
            AiUsage::none(CostTier::Economy),
        );
        assert!(!err.is_success());
        assert_eq!(err.error().unwrap().code, ErrorCode::NoProviderAvailable);
    }
}

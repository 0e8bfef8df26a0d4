//! Request and response types, one pair per capability.
//!
//! Every request embeds [`RequestMeta`] for routing (tier, provider override,
//! tenant/correlation ids, cache TTL override) plus its capability-specific
//! fields. Each request exposes `cache_fields()`: the JSON projection of only
//! the fields that determine its semantic meaning. Caller metadata (tenant,
//! correlation id) is deliberately excluded so structurally identical
//! requests share a cache entry.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::CostTier;

/// Routing fields carried by every capability request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMeta {
    /// Cost/quality class; defaults to standard when omitted.
    #[serde(default)]
    pub tier: CostTier,
    /// Pin the call to one provider instead of routing by priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Override the capability's default cache TTL, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_secs: Option<u64>,
}

impl RequestMeta {
    /// Fill in a correlation id if the caller did not supply one.
    pub fn ensure_correlation_id(&mut self) {
        if self.correlation_id.is_none() {
            self.correlation_id = Some(uuid::Uuid::new_v4().to_string());
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Text completion
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    #[serde(default)]
    pub meta: RequestMeta,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Sampling temperature (0 = deterministic). Non-zero output is never
    /// cached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn cache_fields(&self) -> Value {
        json!({
            "prompt": self.prompt,
            "system_prompt": self.system_prompt,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "tier": self.meta.tier,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Assessment
// ─────────────────────────────────────────────────────────────────────────────

/// Grade a submission against a rubric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentRequest {
    #[serde(default)]
    pub meta: RequestMeta,
    pub submission: String,
    pub rubric: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl AssessmentRequest {
    pub fn cache_fields(&self) -> Value {
        json!({
            "submission": self.submission,
            "rubric": self.rubric,
            "max_score": self.max_score,
            "temperature": self.temperature,
            "tier": self.meta.tier,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentResponse {
    pub score: f64,
    pub feedback: String,
    /// Per-criterion scores, keyed by rubric criterion.
    #[serde(default)]
    pub breakdown: Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// Content safety
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyRequest {
    #[serde(default)]
    pub meta: RequestMeta,
    pub content: String,
    /// Restrict the check to specific categories; empty checks all.
    #[serde(default)]
    pub categories: Vec<String>,
}

impl SafetyRequest {
    pub fn cache_fields(&self) -> Value {
        json!({
            "content": self.content,
            "categories": self.categories,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyResponse {
    pub flagged: bool,
    /// Categories that triggered, with scores in [0, 1].
    #[serde(default)]
    pub categories: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Vision
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionRequest {
    #[serde(default)]
    pub meta: RequestMeta,
    /// Image URL or data URI.
    pub image: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl VisionRequest {
    pub fn cache_fields(&self) -> Value {
        json!({
            "image": self.image,
            "prompt": self.prompt,
            "temperature": self.temperature,
            "tier": self.meta.tier,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionResponse {
    pub text: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Embedding
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    #[serde(default)]
    pub meta: RequestMeta,
    pub input: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl EmbeddingRequest {
    pub fn cache_fields(&self) -> Value {
        json!({
            "input": self.input,
            "model": self.model,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub vectors: Vec<Vec<f32>>,
    pub dimensions: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Speech (transcription and synthesis)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionRequest {
    #[serde(default)]
    pub meta: RequestMeta,
    /// Base64-encoded audio payload.
    pub audio: String,
    /// Container format, e.g. "wav" or "mp3".
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl TranscriptionRequest {
    pub fn cache_fields(&self) -> Value {
        json!({
            "audio": self.audio,
            "format": self.format,
            "language": self.language,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResponse {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechSynthesisRequest {
    #[serde(default)]
    pub meta: RequestMeta,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl SpeechSynthesisRequest {
    pub fn cache_fields(&self) -> Value {
        json!({
            "text": self.text,
            "voice": self.voice,
            "format": self.format,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechSynthesisResponse {
    /// Base64-encoded audio payload.
    pub audio: String,
    pub format: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Translation
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRequest {
    #[serde(default)]
    pub meta: RequestMeta,
    pub text: String,
    /// BCP 47 tag; omitted means the provider detects the source language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,
    pub target_language: String,
}

impl TranslationRequest {
    pub fn cache_fields(&self) -> Value {
        json!({
            "text": self.text,
            "source_language": self.source_language,
            "target_language": self.target_language,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_source_language: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Structured output
// ─────────────────────────────────────────────────────────────────────────────

/// Generate JSON conforming to a caller-supplied schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredRequest {
    #[serde(default)]
    pub meta: RequestMeta,
    pub prompt: String,
    /// JSON Schema the output must conform to.
    pub schema: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl StructuredRequest {
    pub fn cache_fields(&self) -> Value {
        json!({
            "prompt": self.prompt,
            "schema": self.schema,
            "system_prompt": self.system_prompt,
            "temperature": self.temperature,
            "tier": self.meta.tier,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredResponse {
    pub data: Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// Image generation
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationRequest {
    #[serde(default)]
    pub meta: RequestMeta,
    pub prompt: String,
    /// "WxH", e.g. "1024x1024".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default = "default_image_count")]
    pub count: u32,
}

fn default_image_count() -> u32 {
    1
}

impl ImageGenerationRequest {
    pub fn cache_fields(&self) -> Value {
        json!({
            "prompt": self.prompt,
            "size": self.size,
            "count": self.count,
            "tier": self.meta.tier,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationResponse {
    /// Image URLs or data URIs, one per requested image.
    pub images: Vec<String>,
}

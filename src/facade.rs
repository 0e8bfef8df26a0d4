//! Typed per-capability entry points.
//!
//! [`AiFacade`] is the surface application code talks to: one method per
//! capability operation, each fully typed. The facade stamps a correlation id
//! on the request, decides whether the call is cacheable and under which key
//! and TTL, and hands everything to the routing engine. Callers never see
//! adapters, candidates, or cache keys.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{cache_key, should_cache};
use crate::contracts::{
    AssessmentRequest, AssessmentResponse, Capability, CompletionRequest, CompletionResponse,
    EmbeddingRequest, EmbeddingResponse, ImageGenerationRequest, ImageGenerationResponse,
    RequestMeta, Routed, SafetyRequest, SafetyResponse, SpeechSynthesisRequest,
    SpeechSynthesisResponse, StructuredRequest, StructuredResponse, TranscriptionRequest,
    TranscriptionResponse, TranslationRequest, TranslationResponse, VisionRequest, VisionResponse,
};
use crate::router::{CachePlan, RoutingEngine};

/// Typed entry point over the routing engine, one method per operation.
#[derive(Clone)]
pub struct AiFacade {
    engine: Arc<RoutingEngine>,
}

impl AiFacade {
    pub fn new(engine: Arc<RoutingEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<RoutingEngine> {
        &self.engine
    }

    /// Cache plan for one call, or None when the request is uncacheable.
    ///
    /// The key is scoped to the pinned provider when one is set, so a pinned
    /// call never serves a response produced by a different provider, and
    /// unpinned calls share entries under the "any" scope.
    fn cache_plan(
        &self,
        capability: Capability,
        meta: &RequestMeta,
        temperature: Option<f32>,
        fields: &serde_json::Value,
    ) -> Option<CachePlan> {
        if !should_cache(capability, temperature) {
            return None;
        }
        let scope = meta.preferred_provider.as_deref().unwrap_or("any");
        let ttl = match meta.cache_ttl_secs {
            Some(secs) => Duration::from_secs(secs),
            None => self.engine.cache().ttl_for(capability),
        };
        Some(CachePlan {
            key: cache_key(capability, scope, fields),
            ttl,
        })
    }

    pub async fn complete(&self, mut request: CompletionRequest) -> Routed<CompletionResponse> {
        request.meta.ensure_correlation_id();
        let plan = self.cache_plan(
            Capability::TextCompletion,
            &request.meta,
            request.temperature,
            &request.cache_fields(),
        );
        let req = request.clone();
        self.engine
            .route(
                Capability::TextCompletion,
                "complete",
                &request.meta,
                plan,
                move |adapter| {
                    let req = req.clone();
                    async move { adapter.complete(&req).await }
                },
            )
            .await
    }

    pub async fn assess(&self, mut request: AssessmentRequest) -> Routed<AssessmentResponse> {
        request.meta.ensure_correlation_id();
        let plan = self.cache_plan(
            Capability::Assessment,
            &request.meta,
            request.temperature,
            &request.cache_fields(),
        );
        let req = request.clone();
        self.engine
            .route(
                Capability::Assessment,
                "assess",
                &request.meta,
                plan,
                move |adapter| {
                    let req = req.clone();
                    async move { adapter.assess(&req).await }
                },
            )
            .await
    }

    pub async fn check_safety(&self, mut request: SafetyRequest) -> Routed<SafetyResponse> {
        request.meta.ensure_correlation_id();
        let plan = self.cache_plan(
            Capability::ContentSafety,
            &request.meta,
            None,
            &request.cache_fields(),
        );
        let req = request.clone();
        self.engine
            .route(
                Capability::ContentSafety,
                "check_safety",
                &request.meta,
                plan,
                move |adapter| {
                    let req = req.clone();
                    async move { adapter.check_safety(&req).await }
                },
            )
            .await
    }

    pub async fn analyze_image(&self, mut request: VisionRequest) -> Routed<VisionResponse> {
        request.meta.ensure_correlation_id();
        let plan = self.cache_plan(
            Capability::Vision,
            &request.meta,
            request.temperature,
            &request.cache_fields(),
        );
        let req = request.clone();
        self.engine
            .route(
                Capability::Vision,
                "analyze_image",
                &request.meta,
                plan,
                move |adapter| {
                    let req = req.clone();
                    async move { adapter.analyze_image(&req).await }
                },
            )
            .await
    }

    pub async fn embed(&self, mut request: EmbeddingRequest) -> Routed<EmbeddingResponse> {
        request.meta.ensure_correlation_id();
        let plan = self.cache_plan(
            Capability::Embedding,
            &request.meta,
            None,
            &request.cache_fields(),
        );
        let req = request.clone();
        self.engine
            .route(
                Capability::Embedding,
                "embed",
                &request.meta,
                plan,
                move |adapter| {
                    let req = req.clone();
                    async move { adapter.embed(&req).await }
                },
            )
            .await
    }

    pub async fn transcribe(
        &self,
        mut request: TranscriptionRequest,
    ) -> Routed<TranscriptionResponse> {
        request.meta.ensure_correlation_id();
        let plan = self.cache_plan(
            Capability::Speech,
            &request.meta,
            None,
            &request.cache_fields(),
        );
        let req = request.clone();
        self.engine
            .route(
                Capability::Speech,
                "transcribe",
                &request.meta,
                plan,
                move |adapter| {
                    let req = req.clone();
                    async move { adapter.transcribe(&req).await }
                },
            )
            .await
    }

    pub async fn synthesize_speech(
        &self,
        mut request: SpeechSynthesisRequest,
    ) -> Routed<SpeechSynthesisResponse> {
        request.meta.ensure_correlation_id();
        let plan = self.cache_plan(
            Capability::Speech,
            &request.meta,
            None,
            &request.cache_fields(),
        );
        let req = request.clone();
        self.engine
            .route(
                Capability::Speech,
                "synthesize_speech",
                &request.meta,
                plan,
                move |adapter| {
                    let req = req.clone();
                    async move { adapter.synthesize_speech(&req).await }
                },
            )
            .await
    }

    pub async fn translate(&self, mut request: TranslationRequest) -> Routed<TranslationResponse> {
        request.meta.ensure_correlation_id();
        let plan = self.cache_plan(
            Capability::Translation,
            &request.meta,
            None,
            &request.cache_fields(),
        );
        let req = request.clone();
        self.engine
            .route(
                Capability::Translation,
                "translate",
                &request.meta,
                plan,
                move |adapter| {
                    let req = req.clone();
                    async move { adapter.translate(&req).await }
                },
            )
            .await
    }

    pub async fn generate_structured(
        &self,
        mut request: StructuredRequest,
    ) -> Routed<StructuredResponse> {
        request.meta.ensure_correlation_id();
        let plan = self.cache_plan(
            Capability::StructuredOutput,
            &request.meta,
            request.temperature,
            &request.cache_fields(),
        );
        let req = request.clone();
        self.engine
            .route(
                Capability::StructuredOutput,
                "generate_structured",
                &request.meta,
                plan,
                move |adapter| {
                    let req = req.clone();
                    async move { adapter.generate_structured(&req).await }
                },
            )
            .await
    }

    pub async fn generate_image(
        &self,
        mut request: ImageGenerationRequest,
    ) -> Routed<ImageGenerationResponse> {
        request.meta.ensure_correlation_id();
        let plan = self.cache_plan(
            Capability::ImageGeneration,
            &request.meta,
            None,
            &request.cache_fields(),
        );
        let req = request.clone();
        self.engine
            .route(
                Capability::ImageGeneration,
                "generate_image",
                &request.meta,
                plan,
                move |adapter| {
                    let req = req.clone();
                    async move { adapter.generate_image(&req).await }
                },
            )
            .await
    }
}

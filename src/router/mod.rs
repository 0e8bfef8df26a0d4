//! Routing engine - the dispatcher in front of every adapter.
//!
//! For one call: cache check, candidate selection, sequential fallback
//! cascade in priority order, health recording, cache write-through. The
//! cascade is bounded by `max_fallback_attempts` so worst-case latency stays
//! predictable, and providers are never raced in parallel - that would trade
//! cost predictability for latency and risk double-billing.
//!
//! Only transport failures feed the circuit breaker. A provider that returns
//! a well-formed rejection (the caller's input is genuinely invalid, say) is
//! never penalized for it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::adapter::{AdapterError, AdapterOutput, ProviderAdapter};
use crate::cache::ResponseCache;
use crate::config::RouterConfig;
use crate::contracts::{AiUsage, Capability, RequestMeta, RouteError, Routed};
use crate::registry::{ProviderCandidate, ProviderQuery, ProviderRegistry};

/// Where and for how long a routed call's response may be cached.
///
/// Built by the facade from the cacheability rule; absent when the request
/// is non-deterministic or the capability opts out.
#[derive(Debug, Clone)]
pub struct CachePlan {
    pub key: String,
    pub ttl: Duration,
}

/// The dispatcher. Shared state (registry, cache) is reference-counted so
/// many `route` calls proceed independently.
pub struct RoutingEngine {
    registry: Arc<ProviderRegistry>,
    cache: Arc<ResponseCache>,
    config: RouterConfig,
}

impl RoutingEngine {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        cache: Arc<ResponseCache>,
        config: RouterConfig,
    ) -> Self {
        Self {
            registry,
            cache,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Route one capability call.
    ///
    /// `exec` knows how to invoke the capability-specific adapter method; the
    /// engine supplies the adapter instance for each attempt. Never returns a
    /// bare error - every path produces a [`Routed`], and adapter panics
    /// aside, nothing propagates past this boundary.
    pub async fn route<T, F, Fut>(
        &self,
        capability: Capability,
        operation: &str,
        meta: &RequestMeta,
        cache_plan: Option<CachePlan>,
        exec: F,
    ) -> Routed<T>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(Arc<dyn ProviderAdapter>) -> Fut,
        Fut: Future<Output = Result<AdapterOutput<T>, AdapterError>>,
    {
        let started = Instant::now();
        let correlation = meta.correlation_id.as_deref().unwrap_or("-");

        // 1. Cache short-circuit: on a hit no provider is contacted.
        if let Some(plan) = &cache_plan {
            if let Some(cached) = self.cache.get(&plan.key).await {
                match serde_json::from_value::<T>(cached.data) {
                    Ok(data) => {
                        tracing::debug!(
                            "{} [{}] served from cache (provider {})",
                            operation,
                            correlation,
                            cached.provider
                        );
                        let usage = AiUsage {
                            provider: cached.provider,
                            model: cached.model,
                            input_tokens: cached.input_tokens,
                            output_tokens: cached.output_tokens,
                            cost_usd: 0.0,
                            duration_ms: started.elapsed().as_millis() as u64,
                            cached: true,
                            tier: meta.tier,
                        };
                        return Routed::success(data, usage);
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Cached payload for {} no longer matches the response type, refetching: {}",
                            plan.key,
                            e
                        );
                    }
                }
            }
        }

        // 2. Candidate selection: a valid preferred provider pins the list.
        let candidates = self.candidates(capability, meta).await;

        // 3. Nothing eligible at all.
        if candidates.is_empty() {
            tracing::warn!(
                "{} [{}] has no eligible provider for {}",
                operation,
                correlation,
                capability
            );
            return Routed::failure(
                RouteError::no_provider_available(capability),
                AiUsage::none(meta.tier),
            );
        }

        // 4. Bounded sequential cascade in priority order.
        let attempts = candidates.len().min(self.config.max_fallback_attempts.max(1));
        let mut last_error: Option<RouteError> = None;

        for candidate in candidates.into_iter().take(attempts) {
            let attempt_started = Instant::now();
            tracing::debug!(
                "{} [{}] trying provider {} (priority {})",
                operation,
                correlation,
                candidate.id,
                candidate.priority
            );

            let outcome = match tokio::time::timeout(
                self.config.request_timeout(),
                exec(Arc::clone(&candidate.adapter)),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(AdapterError::Timeout(self.config.request_timeout())),
            };

            match outcome {
                Ok(output) => {
                    let duration = attempt_started.elapsed();
                    self.registry.record_success(&candidate.id, duration).await;
                    return self
                        .finish_success(capability, meta, cache_plan, candidate, output, started)
                        .await;
                }
                Err(err) if err.is_transport() => {
                    // The call never completed; this is what the breaker is for.
                    self.registry
                        .record_failure(&candidate.id, &err.to_string())
                        .await;
                    tracing::warn!(
                        "{} [{}] transport failure from {}: {}",
                        operation,
                        correlation,
                        candidate.id,
                        err
                    );
                    last_error = Some(err.to_route_error(&candidate.id));
                }
                Err(err) if !err.retryable() => {
                    // A logical rejection no other provider would handle
                    // differently: return it verbatim, no health penalty.
                    tracing::debug!(
                        "{} [{}] non-retryable rejection from {}: {}",
                        operation,
                        correlation,
                        candidate.id,
                        err
                    );
                    let mut usage = AiUsage::none(meta.tier);
                    usage.provider = candidate.id.clone();
                    usage.duration_ms = started.elapsed().as_millis() as u64;
                    return Routed::failure(err.to_route_error(&candidate.id), usage);
                }
                Err(err) => {
                    // Retryable logical failure: the call completed, so the
                    // breaker is not involved; fall through to the next
                    // provider.
                    tracing::warn!(
                        "{} [{}] retryable failure from {}, falling back: {}",
                        operation,
                        correlation,
                        candidate.id,
                        err
                    );
                    last_error = Some(err.to_route_error(&candidate.id));
                }
            }
        }

        // 5. Cascade exhausted.
        let error =
            last_error.unwrap_or_else(|| RouteError::all_providers_failed(capability));
        tracing::error!(
            "{} [{}] exhausted {} attempt(s): {}",
            operation,
            correlation,
            attempts,
            error
        );
        let mut usage = AiUsage::none(meta.tier);
        usage.duration_ms = started.elapsed().as_millis() as u64;
        Routed::failure(error, usage)
    }

    async fn candidates(
        &self,
        capability: Capability,
        meta: &RequestMeta,
    ) -> Vec<ProviderCandidate> {
        if let Some(preferred) = &meta.preferred_provider {
            if let Some(candidate) = self.registry.candidate_for(preferred, capability).await {
                return vec![candidate];
            }
            tracing::debug!(
                "Preferred provider {} not eligible for {}, routing freely",
                preferred,
                capability
            );
        }
        let query = ProviderQuery {
            tier: Some(meta.tier),
            healthy_only: true,
        };
        self.registry.providers_for(capability, &query).await
    }

    async fn finish_success<T: Serialize>(
        &self,
        capability: Capability,
        meta: &RequestMeta,
        cache_plan: Option<CachePlan>,
        candidate: ProviderCandidate,
        output: AdapterOutput<T>,
        started: Instant,
    ) -> Routed<T> {
        let usage = AiUsage {
            provider: candidate.id.clone(),
            model: output.model,
            input_tokens: output.input_tokens,
            output_tokens: output.output_tokens,
            cost_usd: AiUsage::cost_for(
                output.input_tokens,
                output.output_tokens,
                candidate.input_cost_per_1k,
                candidate.output_cost_per_1k,
            ),
            duration_ms: started.elapsed().as_millis() as u64,
            cached: false,
            tier: meta.tier,
        };

        if let Some(plan) = cache_plan {
            if !plan.ttl.is_zero() {
                match serde_json::to_value(&output.data) {
                    Ok(value) => {
                        self.cache.set(&plan.key, value, &usage, plan.ttl).await;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Not caching {} response for {}: {}",
                            capability,
                            plan.key,
                            e
                        );
                    }
                }
            }
        }

        Routed::success(output.data, usage)
    }
}

/// Shared engine wrapped in Arc for concurrent access.
pub type SharedRoutingEngine = Arc<RoutingEngine>;

//! Provider registry - live catalogue of configured adapters.
//!
//! # Key Concepts
//! - Descriptor: what a provider claims (capabilities, priorities, tiers, rates)
//! - Health: per-provider circuit breaker driven by recorded outcomes
//! - Query: filtered, priority-sorted candidate selection for one capability
//!
//! Health state is per-process. A provider is never silently dropped because
//! of failures - it is only marked unavailable until its circuit admits a
//! probe again. The open→half-open transition happens inside the candidate
//! query under the registry write lock, so exactly one concurrent query
//! admits the probe.

mod health;

pub use health::{CircuitState, ProviderHealth};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::adapter::ProviderAdapter;
use crate::config::CircuitConfig;
use crate::contracts::{Capability, CostTier};

/// Priority assigned to a capability the provider implements but did not
/// rank. Sorts after every explicit priority.
pub const DEFAULT_PRIORITY: u32 = 1000;

/// Static description of one configured adapter instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: String,
    pub display_name: String,
    /// Capabilities this adapter implements.
    pub capabilities: Vec<Capability>,
    /// Per-capability priority, lower tried first. Missing entries sort last.
    #[serde(default)]
    pub priorities: HashMap<Capability, u32>,
    /// Cost tiers this provider is eligible to serve. Empty means all tiers.
    #[serde(default)]
    pub tiers: Vec<CostTier>,
    /// USD per 1k input tokens, for budget estimation.
    #[serde(default)]
    pub input_cost_per_1k: f64,
    /// USD per 1k output tokens.
    #[serde(default)]
    pub output_cost_per_1k: f64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl ProviderDescriptor {
    pub fn implements(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn priority_for(&self, capability: Capability) -> u32 {
        self.priorities
            .get(&capability)
            .copied()
            .unwrap_or(DEFAULT_PRIORITY)
    }

    pub fn serves_tier(&self, tier: CostTier) -> bool {
        self.tiers.is_empty() || self.tiers.contains(&tier)
    }
}

/// Filter options for a candidate query.
#[derive(Debug, Clone)]
pub struct ProviderQuery {
    pub tier: Option<CostTier>,
    /// Exclude providers whose circuit does not admit a call right now.
    pub healthy_only: bool,
}

impl Default for ProviderQuery {
    fn default() -> Self {
        Self {
            tier: None,
            healthy_only: true,
        }
    }
}

/// A snapshot handed to the routing engine: everything it needs to invoke
/// and account for one provider, detached from the registry lock.
#[derive(Clone)]
pub struct ProviderCandidate {
    pub id: String,
    pub display_name: String,
    pub priority: u32,
    pub input_cost_per_1k: f64,
    pub output_cost_per_1k: f64,
    pub adapter: Arc<dyn ProviderAdapter>,
}

/// Read-only per-provider snapshot for observability.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub id: String,
    pub display_name: String,
    pub enabled: bool,
    pub capabilities: Vec<Capability>,
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub circuit_state: CircuitState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_reset_at: Option<chrono::DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success: Option<chrono::DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<chrono::DateTime<Utc>>,
}

struct RegisteredProvider {
    descriptor: ProviderDescriptor,
    adapter: Arc<dyn ProviderAdapter>,
    health: ProviderHealth,
}

impl RegisteredProvider {
    fn candidate(&self, capability: Capability) -> ProviderCandidate {
        ProviderCandidate {
            id: self.descriptor.id.clone(),
            display_name: self.descriptor.display_name.clone(),
            priority: self.descriptor.priority_for(capability),
            input_cost_per_1k: self.descriptor.input_cost_per_1k,
            output_cost_per_1k: self.descriptor.output_cost_per_1k,
            adapter: Arc::clone(&self.adapter),
        }
    }
}

/// Live catalogue of configured adapters with health tracking.
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, RegisteredProvider>>,
    circuit: CircuitConfig,
}

impl ProviderRegistry {
    pub fn new(circuit: CircuitConfig) -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            circuit,
        }
    }

    /// Insert or replace a provider. Replacing resets its health to the
    /// initial closed-circuit state.
    pub async fn register(&self, descriptor: ProviderDescriptor, adapter: Arc<dyn ProviderAdapter>) {
        tracing::info!(
            "Registered provider {} ({}) with capabilities {:?}",
            descriptor.id,
            descriptor.display_name,
            descriptor.capabilities
        );
        let mut providers = self.providers.write().await;
        providers.insert(
            descriptor.id.clone(),
            RegisteredProvider {
                descriptor,
                adapter,
                health: ProviderHealth::new(),
            },
        );
    }

    /// Remove a provider entirely. Requests already dispatched to its adapter
    /// are unaffected - they hold their own Arc.
    pub async fn deregister(&self, id: &str) -> bool {
        let removed = self.providers.write().await.remove(id).is_some();
        if removed {
            tracing::info!("Deregistered provider {}", id);
        }
        removed
    }

    /// Toggle a provider without losing its health history.
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        let mut providers = self.providers.write().await;
        match providers.get_mut(id) {
            Some(provider) => {
                provider.descriptor.enabled = enabled;
                tracing::info!("Provider {} enabled={}", id, enabled);
                true
            }
            None => false,
        }
    }

    /// All enabled providers implementing `capability`, filtered by tier
    /// eligibility and circuit admission, ascending by priority.
    ///
    /// When `healthy_only` is set this is not a pure read: an open circuit
    /// whose reset time has elapsed transitions to half-open here, and the
    /// admitted call is the probe.
    pub async fn providers_for(
        &self,
        capability: Capability,
        query: &ProviderQuery,
    ) -> Vec<ProviderCandidate> {
        let now = Utc::now();
        let mut providers = self.providers.write().await;
        let mut candidates: Vec<ProviderCandidate> = providers
            .values_mut()
            .filter_map(|p| {
                if !p.descriptor.enabled || !p.descriptor.implements(capability) {
                    return None;
                }
                if !query.tier.map_or(true, |t| p.descriptor.serves_tier(t)) {
                    return None;
                }
                if query.healthy_only {
                    let (admitted, probed) = p.health.admit(now);
                    if probed {
                        tracing::info!(
                            "Circuit for provider {} half-open, admitting probe",
                            p.descriptor.id
                        );
                    }
                    if !admitted {
                        return None;
                    }
                }
                Some(p.candidate(capability))
            })
            .collect();
        candidates.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.id.cmp(&b.id)));
        candidates
    }

    /// The candidate for one specific provider, if it is enabled and
    /// implements `capability`. Health is deliberately not consulted: a
    /// caller pinning a provider gets that provider or nothing.
    pub async fn candidate_for(&self, id: &str, capability: Capability) -> Option<ProviderCandidate> {
        let providers = self.providers.read().await;
        providers
            .get(id)
            .filter(|p| p.descriptor.enabled && p.descriptor.implements(capability))
            .map(|p| p.candidate(capability))
    }

    /// Record a successful call: closes the circuit, zeroes the failure
    /// count, and folds the measured duration into the latency estimate.
    pub async fn record_success(&self, id: &str, duration: Duration) {
        let mut providers = self.providers.write().await;
        if let Some(provider) = providers.get_mut(id) {
            provider.health.record_success(
                duration.as_millis() as f64,
                self.circuit.latency_smoothing,
                Utc::now(),
            );
            tracing::debug!(
                "Provider {} succeeded in {}ms",
                id,
                duration.as_millis()
            );
        }
    }

    /// Record a transport failure. At the failure threshold the circuit
    /// opens; while failures persist every call re-arms the reset timer, so a
    /// provider that fails its half-open probe reopens with a fresh window.
    pub async fn record_failure(&self, id: &str, error: &str) {
        let mut providers = self.providers.write().await;
        if let Some(provider) = providers.get_mut(id) {
            let opened = provider.health.record_failure(
                self.circuit.failure_threshold,
                self.circuit.reset_delay(),
                Utc::now(),
            );
            if opened {
                tracing::warn!(
                    "Circuit opened for provider {} after {} consecutive failures (reset at {:?}): {}",
                    id,
                    provider.health.consecutive_failures,
                    provider.health.circuit_reset_at,
                    error
                );
            } else {
                tracing::warn!(
                    "Provider {} failure {}/{}: {}",
                    id,
                    provider.health.consecutive_failures,
                    self.circuit.failure_threshold,
                    error
                );
            }
        }
    }

    /// Read-only snapshot of every registered provider.
    pub async fn status(&self) -> Vec<ProviderStatus> {
        let providers = self.providers.read().await;
        let mut statuses: Vec<ProviderStatus> = providers
            .values()
            .map(|p| ProviderStatus {
                id: p.descriptor.id.clone(),
                display_name: p.descriptor.display_name.clone(),
                enabled: p.descriptor.enabled,
                capabilities: p.descriptor.capabilities.clone(),
                healthy: p.health.healthy,
                consecutive_failures: p.health.consecutive_failures,
                circuit_state: p.health.circuit_state,
                circuit_reset_at: p.health.circuit_reset_at,
                avg_latency_ms: p.health.avg_latency_ms,
                last_success: p.health.last_success,
                last_failure: p.health.last_failure,
            })
            .collect();
        statuses.sort_by(|a, b| a.id.cmp(&b.id));
        statuses
    }
}

/// Shared registry wrapped in Arc for concurrent access.
pub type SharedProviderRegistry = Arc<ProviderRegistry>;

#[cfg(test)]
mod tests {
    use super::*;

    struct NullAdapter;
    impl ProviderAdapter for NullAdapter {}

    fn descriptor(id: &str, capability: Capability, priority: Option<u32>) -> ProviderDescriptor {
        let mut priorities = HashMap::new();
        if let Some(p) = priority {
            priorities.insert(capability, p);
        }
        ProviderDescriptor {
            id: id.to_string(),
            display_name: id.to_uppercase(),
            capabilities: vec![capability],
            priorities,
            tiers: vec![],
            input_cost_per_1k: 0.5,
            output_cost_per_1k: 1.5,
            enabled: true,
        }
    }

    fn registry() -> ProviderRegistry {
        ProviderRegistry::new(CircuitConfig::default())
    }

    #[tokio::test]
    async fn test_priority_ordering_with_sentinel() {
        let reg = registry();
        let cap = Capability::TextCompletion;
        reg.register(descriptor("beta", cap, Some(2)), Arc::new(NullAdapter)).await;
        reg.register(descriptor("alpha", cap, Some(1)), Arc::new(NullAdapter)).await;
        reg.register(descriptor("unranked", cap, None), Arc::new(NullAdapter)).await;

        let candidates = reg.providers_for(cap, &ProviderQuery::default()).await;
        let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "beta", "unranked"]);
        assert_eq!(candidates[2].priority, DEFAULT_PRIORITY);
    }

    #[tokio::test]
    async fn test_disabled_and_wrong_capability_never_returned() {
        let reg = registry();
        let mut off = descriptor("off", Capability::Embedding, Some(1));
        off.enabled = false;
        reg.register(off, Arc::new(NullAdapter)).await;
        reg.register(
            descriptor("vision-only", Capability::Vision, Some(1)),
            Arc::new(NullAdapter),
        ).await;

        let query = ProviderQuery { tier: None, healthy_only: false };
        assert!(reg.providers_for(Capability::Embedding, &query).await.is_empty());

        // preferred-provider lookup applies the same gates
        assert!(reg.candidate_for("off", Capability::Embedding).await.is_none());
        assert!(reg.candidate_for("vision-only", Capability::Embedding).await.is_none());
        assert!(reg.candidate_for("vision-only", Capability::Vision).await.is_some());
    }

    #[tokio::test]
    async fn test_tier_filter() {
        let reg = registry();
        let cap = Capability::Assessment;
        let mut premium = descriptor("premium", cap, Some(1));
        premium.tiers = vec![CostTier::Critical];
        reg.register(premium, Arc::new(NullAdapter)).await;
        let mut any_tier = descriptor("any-tier", cap, Some(2));
        any_tier.tiers = vec![];
        reg.register(any_tier, Arc::new(NullAdapter)).await;

        let economy = ProviderQuery { tier: Some(CostTier::Economy), healthy_only: true };
        let ids: Vec<String> = reg
            .providers_for(cap, &economy)
            .await
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["any-tier"]);

        let critical = ProviderQuery { tier: Some(CostTier::Critical), healthy_only: true };
        assert_eq!(reg.providers_for(cap, &critical).await.len(), 2);
    }

    #[tokio::test]
    async fn test_circuit_opens_after_threshold_and_excludes_provider() {
        let reg = registry();
        let cap = Capability::TextCompletion;
        reg.register(descriptor("flaky", cap, Some(1)), Arc::new(NullAdapter)).await;

        for _ in 0..4 {
            reg.record_failure("flaky", "connection reset").await;
        }
        assert_eq!(reg.providers_for(cap, &ProviderQuery::default()).await.len(), 1);

        reg.record_failure("flaky", "connection reset").await;
        let status = &reg.status().await[0];
        assert_eq!(status.circuit_state, CircuitState::Open);
        assert!(!status.healthy);
        assert!(status.circuit_reset_at.is_some());

        assert!(reg.providers_for(cap, &ProviderQuery::default()).await.is_empty());
        // still visible when health is not required
        let all = ProviderQuery { tier: None, healthy_only: false };
        assert_eq!(reg.providers_for(cap, &all).await.len(), 1);
    }

    #[tokio::test]
    async fn test_success_resets_circuit_regardless_of_failure_count() {
        let reg = registry();
        let cap = Capability::TextCompletion;
        reg.register(descriptor("flaky", cap, Some(1)), Arc::new(NullAdapter)).await;

        for _ in 0..7 {
            reg.record_failure("flaky", "boom").await;
        }
        reg.record_success("flaky", Duration::from_millis(120)).await;

        let status = &reg.status().await[0];
        assert_eq!(status.circuit_state, CircuitState::Closed);
        assert!(status.healthy);
        assert_eq!(status.consecutive_failures, 0);
        assert_eq!(status.avg_latency_ms, Some(120.0));
        assert_eq!(reg.providers_for(cap, &ProviderQuery::default()).await.len(), 1);
    }

    #[tokio::test]
    async fn test_elapsed_reset_admits_half_open_probe() {
        let circuit = CircuitConfig { reset_secs: 0, ..CircuitConfig::default() };
        let reg = ProviderRegistry::new(circuit);
        let cap = Capability::TextCompletion;
        reg.register(descriptor("flaky", cap, Some(1)), Arc::new(NullAdapter)).await;

        for _ in 0..5 {
            reg.record_failure("flaky", "boom").await;
        }
        // reset delay is zero, so the next query admits the probe
        let candidates = reg.providers_for(cap, &ProviderQuery::default()).await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(reg.status().await[0].circuit_state, CircuitState::HalfOpen);

        // a failed probe reopens immediately with a fresh reset window
        reg.record_failure("flaky", "probe failed").await;
        let status = &reg.status().await[0];
        assert_eq!(status.circuit_state, CircuitState::Open);
        assert!(status.circuit_reset_at.is_some());
    }

    #[tokio::test]
    async fn test_query_applies_all_gates_in_one_pass() {
        let reg = registry();
        let cap = Capability::TextCompletion;
        let mut off = descriptor("off", cap, Some(1));
        off.enabled = false;
        reg.register(off, Arc::new(NullAdapter)).await;
        let mut premium = descriptor("premium", cap, Some(2));
        premium.tiers = vec![CostTier::Critical];
        reg.register(premium, Arc::new(NullAdapter)).await;
        reg.register(descriptor("tripped", cap, Some(3)), Arc::new(NullAdapter)).await;
        reg.register(descriptor("open-for-business", cap, Some(4)), Arc::new(NullAdapter)).await;

        for _ in 0..5 {
            reg.record_failure("tripped", "boom").await;
        }

        // one query filters on enablement, tier, and circuit admission together
        let economy = ProviderQuery { tier: Some(CostTier::Economy), healthy_only: true };
        let ids: Vec<String> = reg
            .providers_for(cap, &economy)
            .await
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["open-for-business"]);

        // the rejection left the tripped provider's circuit untouched
        let tripped = reg
            .status()
            .await
            .into_iter()
            .find(|s| s.id == "tripped")
            .unwrap();
        assert_eq!(tripped.circuit_state, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_latency_ema() {
        let reg = registry();
        let cap = Capability::Embedding;
        reg.register(descriptor("fast", cap, Some(1)), Arc::new(NullAdapter)).await;

        reg.record_success("fast", Duration::from_millis(100)).await;
        reg.record_success("fast", Duration::from_millis(200)).await;
        let avg = reg.status().await[0].avg_latency_ms.unwrap();
        // 100 seeded, then 0.9 * 100 + 0.1 * 200
        assert!((avg - 110.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_register_replaces_and_deregister_removes() {
        let reg = registry();
        let cap = Capability::Translation;
        reg.register(descriptor("dup", cap, Some(5)), Arc::new(NullAdapter)).await;
        reg.record_failure("dup", "x").await;

        // re-registration overwrites and resets health
        reg.register(descriptor("dup", cap, Some(1)), Arc::new(NullAdapter)).await;
        let status = &reg.status().await[0];
        assert_eq!(status.consecutive_failures, 0);

        assert!(reg.deregister("dup").await);
        assert!(!reg.deregister("dup").await);
        assert!(reg.status().await.is_empty());
    }
}

//! Routing, circuit-breaker, and cache configuration.
//!
//! Every knob has a serde default so hosting services can deserialize partial
//! config, and `from_env` constructors pick up environment overrides the same
//! way settings elsewhere in the stack do.

use serde::Deserialize;
use std::time::Duration;

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Routing engine settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    /// Upper bound on the fallback cascade; keeps worst-case latency
    /// predictable regardless of how many providers are registered.
    #[serde(default = "default_max_fallback_attempts")]
    pub max_fallback_attempts: usize,
    /// Deadline for a single adapter invocation. A timeout counts as a
    /// transport failure and feeds the circuit breaker.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_fallback_attempts() -> usize {
    3
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_fallback_attempts: default_max_fallback_attempts(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl RouterConfig {
    /// Defaults with `AI_ROUTER_MAX_FALLBACK_ATTEMPTS` and
    /// `AI_ROUTER_REQUEST_TIMEOUT_SECS` overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_parse("AI_ROUTER_MAX_FALLBACK_ATTEMPTS") {
            config.max_fallback_attempts = v;
        }
        if let Some(v) = env_parse("AI_ROUTER_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = v;
        }
        config
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Circuit breaker settings, shared by all registered providers.
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitConfig {
    /// Consecutive transport failures before the circuit opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls before admitting a probe.
    #[serde(default = "default_reset_secs")]
    pub reset_secs: u64,
    /// Smoothing factor for the rolling latency estimate.
    #[serde(default = "default_latency_smoothing")]
    pub latency_smoothing: f64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_reset_secs() -> u64 {
    30
}

fn default_latency_smoothing() -> f64 {
    0.1
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_secs: default_reset_secs(),
            latency_smoothing: default_latency_smoothing(),
        }
    }
}

impl CircuitConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_parse("AI_ROUTER_CIRCUIT_FAILURE_THRESHOLD") {
            config.failure_threshold = v;
        }
        if let Some(v) = env_parse("AI_ROUTER_CIRCUIT_RESET_SECS") {
            config.reset_secs = v;
        }
        config
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_secs(self.reset_secs)
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// L1 entry-count bound.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// L1 total serialized-size budget in bytes.
    #[serde(default = "default_max_total_bytes")]
    pub max_total_bytes: usize,
    /// Payloads larger than this are never stored, in either tier.
    #[serde(default = "default_max_entry_bytes")]
    pub max_entry_bytes: usize,
    /// TTL for capabilities without a specific default, in seconds.
    #[serde(default = "default_fallback_ttl_secs")]
    pub fallback_ttl_secs: u64,
}

fn default_max_entries() -> usize {
    1000
}

fn default_max_total_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_max_entry_bytes() -> usize {
    256 * 1024
}

fn default_fallback_ttl_secs() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            max_total_bytes: default_max_total_bytes(),
            max_entry_bytes: default_max_entry_bytes(),
            fallback_ttl_secs: default_fallback_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_parse("AI_ROUTER_CACHE_MAX_ENTRIES") {
            config.max_entries = v;
        }
        if let Some(v) = env_parse("AI_ROUTER_CACHE_MAX_TOTAL_BYTES") {
            config.max_total_bytes = v;
        }
        if let Some(v) = env_parse("AI_ROUTER_CACHE_MAX_ENTRY_BYTES") {
            config.max_entry_bytes = v;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let router = RouterConfig::default();
        assert_eq!(router.max_fallback_attempts, 3);
        assert_eq!(router.request_timeout(), Duration::from_secs(60));

        let circuit = CircuitConfig::default();
        assert_eq!(circuit.failure_threshold, 5);
        assert_eq!(circuit.reset_delay(), Duration::from_secs(30));

        let cache = CacheConfig::default();
        assert_eq!(cache.max_entries, 1000);
        assert!(cache.max_entry_bytes < cache.max_total_bytes);
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: CircuitConfig = serde_json::from_str("{\"failure_threshold\": 2}").unwrap();
        assert_eq!(config.failure_threshold, 2);
        assert_eq!(config.reset_secs, 30);
    }
}

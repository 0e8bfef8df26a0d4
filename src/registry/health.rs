//! Per-provider health record and circuit-breaker state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Circuit breaker state.
///
/// Closed admits calls. Open rejects them until the reset time, at which
/// point the next availability check transitions to half-open and admits a
/// probe. Half-open admits calls until a success closes the circuit or a
/// failure reopens it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Mutable health state embedded in each registered provider.
///
/// Invariants: an open circuit implies `!healthy`, and the failure counter
/// resets only on a recorded success.
#[derive(Debug, Clone)]
pub struct ProviderHealth {
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub circuit_state: CircuitState,
    /// Set only while the circuit is open.
    pub circuit_reset_at: Option<DateTime<Utc>>,
    /// Exponential moving average of successful-call latency. None until the
    /// first success seeds it.
    pub avg_latency_ms: Option<f64>,
    pub last_check: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
}

impl ProviderHealth {
    pub fn new() -> Self {
        Self {
            healthy: true,
            consecutive_failures: 0,
            circuit_state: CircuitState::Closed,
            circuit_reset_at: None,
            avg_latency_ms: None,
            last_check: None,
            last_success: None,
            last_failure: None,
        }
    }

    /// Availability check. Returns `(admitted, probed)` where `probed` marks
    /// the open→half-open transition - the admitted call is the trial
    /// request. This is a state mutation, not a pure predicate; callers hold
    /// the registry write lock so at most one task performs the transition.
    pub fn admit(&mut self, now: DateTime<Utc>) -> (bool, bool) {
        self.last_check = Some(now);
        match self.circuit_state {
            CircuitState::Closed | CircuitState::HalfOpen => {
                (true, false)
            }
            CircuitState::Open => match self.circuit_reset_at {
                Some(reset_at) if now >= reset_at => {
                    self.circuit_state = CircuitState::HalfOpen;
                    (true, true)
                }
                _ => (false, false),
            },
        }
    }

    /// A recorded success closes the circuit unconditionally.
    pub fn record_success(&mut self, duration_ms: f64, smoothing: f64, now: DateTime<Utc>) {
        self.healthy = true;
        self.consecutive_failures = 0;
        self.circuit_state = CircuitState::Closed;
        self.circuit_reset_at = None;
        self.last_success = Some(now);
        self.avg_latency_ms = Some(match self.avg_latency_ms {
            Some(avg) => avg * (1.0 - smoothing) + duration_ms * smoothing,
            None => duration_ms,
        });
    }

    /// A recorded transport failure. Returns true when this call transitioned
    /// the circuit from closed or half-open to open. While the failure count
    /// stays at or above the threshold the reset timer is re-armed every
    /// time, so a failed half-open probe reopens with a fresh window.
    pub fn record_failure(
        &mut self,
        threshold: u32,
        reset_delay: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        self.consecutive_failures += 1;
        self.last_failure = Some(now);
        if self.consecutive_failures >= threshold {
            let was_open = self.circuit_state == CircuitState::Open;
            self.circuit_state = CircuitState::Open;
            self.healthy = false;
            self.circuit_reset_at =
                Some(now + chrono::Duration::from_std(reset_delay).unwrap_or_default());
            !was_open
        } else {
            false
        }
    }
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self::new()
    }
}

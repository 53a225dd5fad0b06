//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, requests fail fast
//! - Half-Open: a single trial request is let through
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold
//! Open → Half-Open: next call after `timeout`, or automatically after `reset_timeout`
//! Half-Open → Closed: trial request succeeds
//! Half-Open → Open: trial request fails
//! ```
//!
//! # Design Decisions
//! - One breaker per client instance (not global)
//! - Fail fast in Open state (no waiting for timeout)
//! - Single probe in Half-Open (prevents hammering recovering backend)
//! - Cancelled calls say nothing about backend health and are not counted
//! - Outside Closed, only the trial's outcome moves the state; calls that
//!   started before the circuit opened are tallied and otherwise ignored

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::observability::metrics;
use crate::resilience::ResilienceError;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }
}

/// Breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Failures that open the circuit.
    pub threshold: u32,
    /// How long an open circuit rejects calls before allowing a trial.
    pub timeout: Duration,
    /// Delay of the automatic Open → Half-Open transition.
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            timeout: Duration::from_millis(30_000),
            reset_timeout: Duration::from_millis(30_000),
        }
    }
}

/// Serializable view of a breaker, for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure_ms_ago: Option<u64>,
    pub total_failures: u64,
    pub total_successes: u64,
    pub rejected: u64,
    pub probe_in_flight: bool,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
    probe_in_flight: bool,
    /// Bumped on every state change; stale self-heal timers compare against it.
    generation: u64,
    total_failures: u64,
    total_successes: u64,
    rejected: u64,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_at: None,
            probe_in_flight: false,
            generation: 0,
            total_failures: 0,
            total_successes: 0,
            rejected: 0,
        }
    }

    fn transition(&mut self, name: &str, to: CircuitState) {
        if self.state == to {
            return;
        }
        tracing::info!(
            circuit = %name,
            from = self.state.as_str(),
            to = to.as_str(),
            failures = self.failure_count,
            "Circuit state change"
        );
        metrics::record_circuit_transition(name, to.as_str());
        self.state = to;
        self.generation += 1;
    }
}

/// A count- and time-driven circuit breaker.
///
/// Cloning is cheap and clones share state.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<BreakerInner>>,
}

/// Releases the half-open trial slot if the trial future is dropped mid-flight.
struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.inner.lock().probe_in_flight = false;
        }
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: Arc::from(name.into()),
            config,
            inner: Arc::new(Mutex::new(BreakerInner::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Run `op` through the breaker.
    ///
    /// Returns `E::circuit_open()` without invoking `op` while the circuit
    /// is open (or a half-open trial is already running).
    pub async fn execute<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        E: ResilienceError,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let is_trial = match self.try_acquire() {
            Some(is_trial) => is_trial,
            None => return Err(E::circuit_open()),
        };
        let mut probe = ProbeGuard {
            breaker: self,
            armed: is_trial,
        };

        let result = op().await;
        let recorded = match &result {
            Ok(_) => {
                self.record_success(is_trial);
                true
            }
            Err(err) if err.is_cancelled() => false,
            Err(_) => {
                self.record_failure(is_trial);
                true
            }
        };
        if recorded {
            probe.armed = false;
        }
        result
    }

    /// Returns `Some(is_trial)` when a call may proceed, `None` when rejected.
    fn try_acquire(&self) -> Option<bool> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Some(false),
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure_at
                    .map(|at| Instant::now().saturating_duration_since(at))
                    .unwrap_or(self.config.timeout);
                if elapsed < self.config.timeout {
                    inner.rejected += 1;
                    tracing::debug!(circuit = %self.name, "Circuit open, rejecting call");
                    return None;
                }
                inner.transition(&self.name, CircuitState::HalfOpen);
                inner.probe_in_flight = true;
                Some(true)
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    inner.rejected += 1;
                    return None;
                }
                inner.probe_in_flight = true;
                Some(true)
            }
        }
    }

    /// Only the half-open trial may close the circuit. Calls that started
    /// before the circuit opened are counted but change nothing.
    fn record_success(&self, is_trial: bool) {
        let mut inner = self.inner.lock();
        inner.total_successes = inner.total_successes.saturating_add(1);
        match inner.state {
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::HalfOpen if is_trial => {
                inner.failure_count = 0;
                inner.probe_in_flight = false;
                inner.transition(&self.name, CircuitState::Closed);
            }
            CircuitState::HalfOpen | CircuitState::Open => {
                tracing::debug!(circuit = %self.name, "Ignoring late success while circuit is not closed");
            }
        }
    }

    fn record_failure(&self, is_trial: bool) {
        let generation = {
            let mut inner = self.inner.lock();
            inner.total_failures = inner.total_failures.saturating_add(1);

            let should_open = match inner.state {
                CircuitState::Closed => {
                    inner.failure_count = inner.failure_count.saturating_add(1);
                    inner.last_failure_at = Some(Instant::now());
                    inner.failure_count >= self.config.threshold
                }
                CircuitState::HalfOpen if is_trial => {
                    inner.failure_count = inner.failure_count.saturating_add(1);
                    inner.last_failure_at = Some(Instant::now());
                    inner.probe_in_flight = false;
                    true
                }
                // Stale outcome; the open timer and the trial slot are untouched.
                CircuitState::HalfOpen | CircuitState::Open => false,
            };
            if !should_open {
                return;
            }
            tracing::warn!(
                circuit = %self.name,
                failures = inner.failure_count,
                threshold = self.config.threshold,
                "Opening circuit"
            );
            inner.transition(&self.name, CircuitState::Open);
            inner.generation
        };
        self.schedule_half_open(generation);
    }

    /// Moves an open circuit to half-open after `reset_timeout`, even with
    /// no further traffic, unless the state changed in the meantime.
    fn schedule_half_open(&self, generation: u64) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let weak: Weak<Mutex<BreakerInner>> = Arc::downgrade(&self.inner);
        let name = self.name.clone();
        let delay = self.config.reset_timeout;

        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut inner = inner.lock();
            if inner.state == CircuitState::Open && inner.generation == generation {
                inner.transition(&name, CircuitState::HalfOpen);
                inner.probe_in_flight = false;
            }
        });
    }

    /// Force the breaker closed with a zero failure count.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count = 0;
        inner.probe_in_flight = false;
        inner.last_failure_at = None;
        inner.transition(&self.name, CircuitState::Closed);
        tracing::info!(circuit = %self.name, "Circuit manually reset");
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.inner.lock();
        CircuitSnapshot {
            name: self.name.to_string(),
            state: inner.state,
            failure_count: inner.failure_count,
            last_failure_ms_ago: inner
                .last_failure_at
                .map(|at| Instant::now().saturating_duration_since(at).as_millis() as u64),
            total_failures: inner.total_failures,
            total_successes: inner.total_successes,
            rejected: inner.rejected,
            probe_in_flight: inner.probe_in_flight,
        }
    }
}

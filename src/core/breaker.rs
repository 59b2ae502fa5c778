//! Circuit Breakers
//!
//! Failure isolation for external operations (agent queries, data feeds).
//! Each monitored operation class gets its own breaker, created lazily on
//! first failure and kept for the process lifetime.
//!
//! State machine:
//! - Closed: calls pass; failures count; a success resets the counter
//! - Open: entered at the failure threshold; every call short-circuits until
//!   the recovery timeout elapses
//! - HalfOpen: exactly one probe call allowed; success closes the breaker,
//!   failure reopens it and restarts the timer

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::comms::events::{EngineEvent, EventSender};

/// Breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "CLOSED",
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Breaker thresholds
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens
    pub failure_threshold: u32,
    /// How long an open breaker waits before allowing a probe
    pub recovery_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

/// Failure-isolation state machine for one operation class
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: String,
    state: BreakerState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    opened_at: Option<Instant>,
    config: BreakerConfig,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            state: BreakerState::Closed,
            consecutive_failures: 0,
            last_failure: None,
            opened_at: None,
            config,
        }
    }

    /// Whether a call may proceed right now. An open breaker whose recovery
    /// timeout has elapsed moves to half-open and admits exactly one probe.
    pub fn allow(&mut self) -> bool {
        match self.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let elapsed = self
                    .opened_at
                    .map(|t| t.elapsed() >= self.config.recovery_timeout)
                    .unwrap_or(true);
                if elapsed {
                    info!("breaker {} half-open, allowing probe", self.name);
                    self.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
            // A probe is already in flight
            BreakerState::HalfOpen => false,
        }
    }

    /// Record a successful call. Returns the new state if it changed.
    pub fn record_success(&mut self) -> Option<BreakerState> {
        self.consecutive_failures = 0;
        if self.state != BreakerState::Closed {
            info!("breaker {} closed after successful probe", self.name);
            self.state = BreakerState::Closed;
            self.opened_at = None;
            return Some(BreakerState::Closed);
        }
        None
    }

    /// Record a failed call. Returns the new state if it changed.
    pub fn record_failure(&mut self) -> Option<BreakerState> {
        self.consecutive_failures += 1;
        self.last_failure = Some(Instant::now());

        match self.state {
            BreakerState::HalfOpen => {
                warn!("breaker {} reopened: probe failed", self.name);
                self.state = BreakerState::Open;
                self.opened_at = Some(Instant::now());
                Some(BreakerState::Open)
            }
            BreakerState::Closed if self.consecutive_failures >= self.config.failure_threshold => {
                warn!(
                    "breaker {} opened after {} consecutive failures",
                    self.name, self.consecutive_failures
                );
                self.state = BreakerState::Open;
                self.opened_at = Some(Instant::now());
                Some(BreakerState::Open)
            }
            BreakerState::Open => {
                // Failure observed while already open restarts the timer
                self.opened_at = Some(Instant::now());
                None
            }
            _ => None,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Lazily-created breakers keyed by operation class
/// (e.g. "agent-query:momentum-1", "data-feed")
pub struct CircuitBreakerRegistry {
    breakers: HashMap<String, CircuitBreaker>,
    config: BreakerConfig,
    events: Option<EventSender>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            breakers: HashMap::new(),
            config,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Whether a call to the operation may proceed. Operations with no
    /// recorded failure have no breaker yet and always pass.
    pub fn allow(&mut self, operation: &str) -> bool {
        match self.breakers.get_mut(operation) {
            Some(breaker) => {
                let before = breaker.state();
                let allowed = breaker.allow();
                let after = breaker.state();
                if before != after {
                    self.emit(operation, before, after);
                }
                allowed
            }
            None => true,
        }
    }

    /// Record a success for the operation, if it is being monitored
    pub fn record_success(&mut self, operation: &str) {
        if let Some(breaker) = self.breakers.get_mut(operation) {
            let before = breaker.state();
            if let Some(after) = breaker.record_success() {
                self.emit(operation, before, after);
            }
        }
    }

    /// Record a failure, creating the breaker on first failure
    pub fn record_failure(&mut self, operation: &str) {
        let config = self.config.clone();
        let breaker = self
            .breakers
            .entry(operation.to_string())
            .or_insert_with(|| CircuitBreaker::new(operation, config));
        let before = breaker.state();
        if let Some(after) = breaker.record_failure() {
            self.emit(operation, before, after);
        }
    }

    pub fn state(&self, operation: &str) -> BreakerState {
        self.breakers
            .get(operation)
            .map(|b| b.state())
            .unwrap_or(BreakerState::Closed)
    }

    pub fn breaker_count(&self) -> usize {
        self.breakers.len()
    }

    /// Status summary for logging, e.g. "OPEN: agent-query:alpha, data-feed"
    pub fn status_summary(&self) -> String {
        let mut open: Vec<&str> = self
            .breakers
            .values()
            .filter(|b| b.state() != BreakerState::Closed)
            .map(|b| b.name())
            .collect();
        if open.is_empty() {
            "all breakers closed".to_string()
        } else {
            open.sort();
            format!("OPEN: {}", open.join(", "))
        }
    }

    fn emit(&self, operation: &str, from: BreakerState, to: BreakerState) {
        if let Some(events) = &self.events {
            events.emit(EngineEvent::BreakerTransition {
                operation: operation.to_string(),
                from,
                to,
            });
        }
    }
}

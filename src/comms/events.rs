//! Engine events for the alerting/telemetry collaborator

use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::warn;

use crate::core::breaker::BreakerState;
use crate::core::types::{Direction, RiskLayer};

/// Events emitted by the decision engine
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A risk guard layer rejected a candidate trade
    RiskViolation {
        symbol: String,
        layer: RiskLayer,
        detail: String,
    },
    /// A circuit breaker changed state
    BreakerTransition {
        operation: String,
        from: BreakerState,
        to: BreakerState,
    },
    /// A trade decision was emitted
    DecisionEmitted {
        symbol: String,
        direction: Direction,
        notional: Decimal,
        confidence: f64,
    },
    /// The daily loss limit was crossed; entries are blocked until rollover
    DailyLimitBreached { daily_pnl: Decimal },
}

/// Non-blocking sender handle shared across engine components
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<EngineEvent>,
}

impl EventSender {
    /// Emit an event without blocking the decision cycle. A full or closed
    /// channel drops the event with a warning; telemetry never stalls trading.
    pub fn emit(&self, event: EngineEvent) {
        if let Err(e) = self.tx.try_send(event) {
            warn!("engine event dropped: {}", e);
        }
    }
}

/// Create a bounded event channel
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<EngineEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender { tx }, rx)
}

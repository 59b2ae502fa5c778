//! Core decision pipeline
//!
//! Regime classification, vote consensus, correlation risk analysis and the
//! layered risk guard, composed per cycle by the orchestrator. Every
//! component is an explicitly constructed service object; shared state is
//! limited to the risk-limit counters and the circuit-breaker registry.

pub mod types;
pub mod regime;
pub mod performance;
pub mod consensus;
pub mod correlation;
pub mod breaker;
pub mod guard;
pub mod orchestrator;

// Re-export commonly used types
pub use types::{
    AgentSpecialty, AgentVote, Candle, ConsensusResult, DecisionOutcome, Direction, ReasonCode,
    RiskLayer, TradeDecision,
};
pub use regime::{Regime, RegimeClassifier, RegimeConfig, RegimeMetrics};
pub use performance::{AgentPerformanceBook, AgentRecord, PerformanceConfig};
pub use consensus::{ConsensusConfig, ConsensusEngine};
pub use correlation::{CorrelationAnalyzer, CorrelationConfig, CorrelationRisk, RiskLevel};
pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker, CircuitBreakerRegistry};
pub use guard::{RiskGuard, RiskGuardConfig, RiskVerdict, TradeCandidate, TradeIntent};
pub use orchestrator::{DecisionOrchestrator, OrchestratorConfig};

//! Core type definitions for the decision engine
//!
//! Votes, consensus results and decision outcomes are explicit structs with
//! validated construction: a malformed vote is rejected at the boundary and
//! never enters aggregation.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::regime::Regime;

/// Represents a single price candle (OHLCV)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    /// Timestamp of the candle open
    pub time: DateTime<Utc>,
    /// Opening price
    pub open: Decimal,
    /// Highest price during the period
    pub high: Decimal,
    /// Lowest price during the period
    pub low: Decimal,
    /// Closing price
    pub close: Decimal,
    /// Volume traded during the period
    pub volume: Decimal,
}

impl Candle {
    /// Create a new candle
    pub fn new(
        time: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self { time, open, high, low, close, volume }
    }

    /// Check if this is a bullish (green) candle
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Check if this is a bearish (red) candle
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Get the full range (high - low)
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }
}

/// Direction of a proposed trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
    Hold,
}

impl Direction {
    /// Convert to a storable string
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
            Direction::Hold => "HOLD",
        }
    }

    /// The opposite directional side; `Hold` has none
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
            Direction::Hold => Direction::Hold,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Agent type / specialization tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentSpecialty {
    /// Trend-following and momentum analysis
    Trend,
    /// Mean-reversion / range analysis
    MeanReversion,
    /// Volatility and event analysis
    Volatility,
    /// News / sentiment analysis
    Sentiment,
    /// No particular specialization
    Generalist,
}

impl AgentSpecialty {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentSpecialty::Trend => "TREND",
            AgentSpecialty::MeanReversion => "MEAN_REVERSION",
            AgentSpecialty::Volatility => "VOLATILITY",
            AgentSpecialty::Sentiment => "SENTIMENT",
            AgentSpecialty::Generalist => "GENERALIST",
        }
    }
}

impl std::fmt::Display for AgentSpecialty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One trading opinion submitted by an analysis agent for one cycle.
///
/// Immutable once constructed. The validating constructor is the only
/// entry point; a vote that fails validation never reaches consensus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentVote {
    pub agent_id: String,
    pub specialty: AgentSpecialty,
    pub direction: Direction,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Proposed notional, >= 0
    pub notional: Decimal,
    /// Free-text rationale for audit
    pub rationale: String,
    /// Optional symbol-class focus tag (e.g. "crypto", "equity")
    pub focus: Option<String>,
}

impl AgentVote {
    /// Build a validated vote. Rejects NaN or out-of-range confidence and
    /// negative notionals.
    pub fn new(
        agent_id: impl Into<String>,
        specialty: AgentSpecialty,
        direction: Direction,
        confidence: f64,
        notional: Decimal,
        rationale: impl Into<String>,
    ) -> Result<Self> {
        let agent_id = agent_id.into();
        if agent_id.is_empty() {
            bail!("vote rejected: empty agent id");
        }
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            bail!("vote rejected: confidence {} outside [0,1] ({})", confidence, agent_id);
        }
        if notional < Decimal::ZERO {
            bail!("vote rejected: negative notional {} ({})", notional, agent_id);
        }
        Ok(Self {
            agent_id,
            specialty,
            direction,
            confidence,
            notional,
            rationale: rationale.into(),
            focus: None,
        })
    }

    /// Attach a symbol-class focus tag
    pub fn with_focus(mut self, focus: impl Into<String>) -> Self {
        self.focus = Some(focus.into());
        self
    }

    /// Re-check the construction invariants. Used as defense in depth by the
    /// consensus engine on votes that crossed a process boundary.
    pub fn is_well_formed(&self) -> bool {
        !self.agent_id.is_empty()
            && self.confidence.is_finite()
            && (0.0..=1.0).contains(&self.confidence)
            && self.notional >= Decimal::ZERO
    }
}

/// Aggregated decision derived from all agent votes for one cycle.
///
/// Produced once per cycle and never mutated afterwards. Dissenting votes
/// are retained for audit.
#[derive(Debug, Clone)]
pub struct ConsensusResult {
    pub direction: Direction,
    /// Winning (or largest) direction's share of total effective weight
    pub confidence: f64,
    pub notional: Decimal,
    /// Number of votes agreeing with the final direction
    pub contributing: usize,
    /// Votes whose direction differs from the final direction
    pub dissenting: Vec<AgentVote>,
}

impl ConsensusResult {
    /// A HOLD consensus with the given confidence and no notional
    pub fn hold(confidence: f64) -> Self {
        Self {
            direction: Direction::Hold,
            confidence,
            notional: Decimal::ZERO,
            contributing: 0,
            dissenting: Vec::new(),
        }
    }
}

/// Risk guard layer identifiers, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLayer {
    Position,
    Portfolio,
    Daily,
    System,
}

impl RiskLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLayer::Position => "position",
            RiskLayer::Portfolio => "portfolio",
            RiskLayer::Daily => "daily",
            RiskLayer::System => "system",
        }
    }
}

impl std::fmt::Display for RiskLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Machine-readable reason for a `NoAction` outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonCode {
    /// No agent produced a usable vote this cycle
    NoVotes,
    /// Votes agreed on HOLD
    HoldConsensus,
    /// A direction led but its weighted share stayed below the majority threshold
    WeakMajority,
    /// A required operation's circuit breaker is open - could not evaluate
    CircuitOpen,
    /// A collaborator (feed, portfolio) failed this cycle - could not evaluate
    DependencyUnavailable,
    /// Correlation analysis vetoed the trade outright
    CorrelationVeto,
    /// A risk guard layer rejected the evaluated candidate
    RiskLimit(RiskLayer),
    /// The system kill switch is engaged
    KillSwitch,
}

impl ReasonCode {
    /// Stable machine-readable code for logs and alerting
    pub fn code(&self) -> &'static str {
        match self {
            ReasonCode::NoVotes => "no_votes",
            ReasonCode::HoldConsensus => "hold_consensus",
            ReasonCode::WeakMajority => "weak_majority",
            ReasonCode::CircuitOpen => "circuit_open",
            ReasonCode::DependencyUnavailable => "dependency_unavailable",
            ReasonCode::CorrelationVeto => "correlation_veto",
            ReasonCode::RiskLimit(RiskLayer::Position) => "risk_limit_position",
            ReasonCode::RiskLimit(RiskLayer::Portfolio) => "risk_limit_portfolio",
            ReasonCode::RiskLimit(RiskLayer::Daily) => "risk_limit_daily",
            ReasonCode::RiskLimit(RiskLayer::System) => "risk_limit_system",
            ReasonCode::KillSwitch => "kill_switch",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Final trade action emitted for one symbol in one cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeDecision {
    pub id: Uuid,
    pub symbol: String,
    pub direction: Direction,
    pub notional: Decimal,
    pub regime: Regime,
    pub consensus_confidence: f64,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    /// Human-readable record of every sizing adjustment applied
    pub adjustments: Vec<String>,
    pub decided_at: DateTime<Utc>,
}

/// Outcome of one decision cycle
#[derive(Debug, Clone)]
pub enum DecisionOutcome {
    Trade(TradeDecision),
    NoAction { code: ReasonCode, detail: String },
}

impl DecisionOutcome {
    pub fn no_action(code: ReasonCode, detail: impl Into<String>) -> Self {
        DecisionOutcome::NoAction { code, detail: detail.into() }
    }

    pub fn is_trade(&self) -> bool {
        matches!(self, DecisionOutcome::Trade(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_candle_bullish() {
        let candle = Candle::new(Utc::now(), dec!(100), dec!(110), dec!(95), dec!(105), dec!(1000));
        assert!(candle.is_bullish());
        assert!(!candle.is_bearish());
        assert_eq!(candle.range(), dec!(15));
    }

    #[test]
    fn test_vote_validation() {
        let ok = AgentVote::new("momentum-1", AgentSpecialty::Trend, Direction::Long, 0.8, dec!(1000), "uptrend");
        assert!(ok.is_ok());
        assert!(ok.unwrap().is_well_formed());

        assert!(AgentVote::new("a", AgentSpecialty::Trend, Direction::Long, 1.2, dec!(1000), "").is_err());
        assert!(AgentVote::new("a", AgentSpecialty::Trend, Direction::Long, f64::NAN, dec!(1000), "").is_err());
        assert!(AgentVote::new("a", AgentSpecialty::Trend, Direction::Long, 0.5, dec!(-1), "").is_err());
        assert!(AgentVote::new("", AgentSpecialty::Trend, Direction::Long, 0.5, dec!(1), "").is_err());
    }

    #[test]
    fn test_vote_focus() {
        let vote = AgentVote::new("a", AgentSpecialty::Sentiment, Direction::Short, 0.4, dec!(500), "fud")
            .unwrap()
            .with_focus("crypto");
        assert_eq!(vote.focus.as_deref(), Some("crypto"));
    }

    #[test]
    fn test_hold_consensus() {
        let hold = ConsensusResult::hold(0.4);
        assert_eq!(hold.direction, Direction::Hold);
        assert_eq!(hold.notional, Decimal::ZERO);
        assert_eq!(hold.contributing, 0);
    }

    #[test]
    fn test_reason_codes_stable() {
        assert_eq!(ReasonCode::NoVotes.code(), "no_votes");
        assert_eq!(ReasonCode::RiskLimit(RiskLayer::Daily).code(), "risk_limit_daily");
        assert_eq!(ReasonCode::KillSwitch.to_string(), "kill_switch");
    }

    #[test]
    fn test_direction_opposite() {
        assert_eq!(Direction::Long.opposite(), Direction::Short);
        assert_eq!(Direction::Short.opposite(), Direction::Long);
        assert_eq!(Direction::Hold.opposite(), Direction::Hold);
    }
}

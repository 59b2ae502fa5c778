//! Decision Orchestrator
//!
//! The per-tick control flow for one symbol:
//!
//! 1. Market history snapshot -> regime metrics
//! 2. Concurrent, timeout-bounded vote collection (a slow agent is excluded,
//!    not awaited; absence is not an opinion)
//! 3. Consensus
//! 4. Regime size multiplier
//! 5. Correlation risk adjustment or veto
//! 6. Risk guard -> `TradeDecision` or `NoAction`
//!
//! Cycles for different symbols are independent and may run in parallel;
//! the only shared state is the risk guard and the breaker registry. The
//! cycle never retries internally - retry policy belongs to the caller.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::breaker::CircuitBreakerRegistry;
use super::consensus::ConsensusEngine;
use super::correlation::{CorrelationAnalyzer, RiskLevel};
use super::guard::{RiskGuard, RiskVerdict, TradeCandidate};
use super::performance::AgentPerformanceBook;
use super::regime::{RegimeClassifier, RegimeMetrics};
use super::types::{
    AgentVote, Candle, DecisionOutcome, Direction, ReasonCode, RiskLayer, TradeDecision,
};
use crate::comms::events::{EngineEvent, EventSender};
use crate::providers::{MarketHistoryProvider, PortfolioProvider, VoteProvider};

const OP_DATA_FEED: &str = "data-feed";
const OP_PORTFOLIO: &str = "portfolio";

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Bound on every external query (agent votes, feeds)
    pub vote_timeout: Duration,
    /// Trailing samples requested from the history provider
    pub history_len: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            vote_timeout: Duration::from_secs(3),
            history_len: 64,
        }
    }
}

/// Composes the pipeline components into the per-cycle decision flow
pub struct DecisionOrchestrator {
    regime: RegimeClassifier,
    consensus: ConsensusEngine,
    correlation: CorrelationAnalyzer,
    guard: Arc<Mutex<RiskGuard>>,
    breakers: Arc<Mutex<CircuitBreakerRegistry>>,
    performance: Arc<RwLock<AgentPerformanceBook>>,
    history_provider: Arc<dyn MarketHistoryProvider>,
    vote_providers: Vec<Arc<dyn VoteProvider>>,
    portfolio_provider: Arc<dyn PortfolioProvider>,
    events: Option<EventSender>,
    config: OrchestratorConfig,
}

impl DecisionOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        regime: RegimeClassifier,
        consensus: ConsensusEngine,
        correlation: CorrelationAnalyzer,
        guard: Arc<Mutex<RiskGuard>>,
        breakers: Arc<Mutex<CircuitBreakerRegistry>>,
        performance: Arc<RwLock<AgentPerformanceBook>>,
        history_provider: Arc<dyn MarketHistoryProvider>,
        vote_providers: Vec<Arc<dyn VoteProvider>>,
        portfolio_provider: Arc<dyn PortfolioProvider>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            regime,
            consensus,
            correlation,
            guard,
            breakers,
            performance,
            history_provider,
            vote_providers,
            portfolio_provider,
            events: None,
            config,
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Run one decision cycle for one symbol.
    ///
    /// Re-entrant; the only side effects are breaker and risk-limit state
    /// updates and emitted events.
    pub async fn run_cycle(&self, symbol: &str) -> DecisionOutcome {
        // 1. Market history through the data-feed breaker. A failed or
        // circuit-open feed degrades to an empty window (Unknown regime)
        // rather than aborting: agents that don't need history may still vote.
        let history = self.fetch_history(symbol).await;
        let metrics = match history.last() {
            Some(last) => {
                self.regime
                    .classify(&history[..history.len() - 1], last.close, last.volume)
            }
            None => RegimeMetrics::unknown(),
        };
        debug!(
            "{}: regime {} (conf {:.2}, strategy {})",
            symbol, metrics.regime, metrics.confidence, metrics.strategy
        );

        // 2. Vote collection: fan out, bound each agent by the timeout,
        // fan in before consensus
        let (votes, circuit_excluded) = self.collect_votes(symbol, &history).await;
        if votes.is_empty() {
            if circuit_excluded > 0 && circuit_excluded == self.vote_providers.len() {
                return DecisionOutcome::no_action(
                    ReasonCode::CircuitOpen,
                    format!("all {} agent circuits open", circuit_excluded),
                );
            }
            return DecisionOutcome::no_action(
                ReasonCode::NoVotes,
                "no agent votes available within the wait window",
            );
        }

        // 3. Consensus under a read-only borrow of the performance book
        let consensus = {
            let book = match self.performance.read() {
                Ok(book) => book,
                Err(poisoned) => poisoned.into_inner(),
            };
            self.consensus
                .build_consensus(&votes, symbol, &book, metrics.regime)
        };

        if consensus.direction == Direction::Hold {
            let (code, detail) = if consensus.dissenting.is_empty() {
                (
                    ReasonCode::HoldConsensus,
                    format!("{} vote(s) agreed on HOLD", consensus.contributing),
                )
            } else {
                (
                    ReasonCode::WeakMajority,
                    format!(
                        "leading direction held {:.1}% of weight, below the majority threshold",
                        consensus.confidence * 100.0
                    ),
                )
            };
            return DecisionOutcome::no_action(code, detail);
        }

        // Pricing the candidate needs a current sample
        let price = match history.last() {
            Some(last) => last.close,
            None => {
                return DecisionOutcome::no_action(
                    ReasonCode::DependencyUnavailable,
                    "no market data to price the candidate",
                )
            }
        };

        // 4. Regime-aware sizing
        let mut adjustments = Vec::new();
        let mut notional = consensus.notional
            * Decimal::from_f64(metrics.size_multiplier).unwrap_or(Decimal::ONE);
        adjustments.push(format!(
            "regime {} multiplier {:.2}",
            metrics.regime, metrics.size_multiplier
        ));

        // 5. Correlation risk: veto at Critical, shrink otherwise, then
        // re-score the adjusted size for the guard's portfolio layer
        let snapshot = match self.fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(outcome) => return outcome,
        };

        let initial_risk = self
            .correlation
            .analyze(symbol, consensus.direction, notional, &snapshot);
        if initial_risk.level == RiskLevel::Critical {
            warn!("{}: correlation veto: {}", symbol, initial_risk.explanation);
            return DecisionOutcome::no_action(ReasonCode::CorrelationVeto, initial_risk.explanation);
        }
        if initial_risk.size_adjustment < 1.0 {
            notional *= Decimal::from_f64(initial_risk.size_adjustment).unwrap_or(Decimal::ONE);
            adjustments.push(format!(
                "correlation {} adjustment {:.2}",
                initial_risk.level, initial_risk.size_adjustment
            ));
        }
        let final_risk = self
            .correlation
            .analyze(symbol, consensus.direction, notional, &snapshot);

        // 6. Risk guard
        let candidate = TradeCandidate::entry(symbol, consensus.direction, notional, price);
        let verdict = {
            let mut guard = match self.guard.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let verdict = guard.evaluate(&candidate, &snapshot, Some(&final_risk));
            if verdict.is_approved() {
                guard.record_entry();
            }
            verdict
        };

        match verdict {
            RiskVerdict::Blocked { layer, detail } => {
                let code = match layer {
                    RiskLayer::System => ReasonCode::KillSwitch,
                    other => ReasonCode::RiskLimit(other),
                };
                DecisionOutcome::no_action(code, detail)
            }
            RiskVerdict::Approved {
                stop_loss,
                take_profit,
                adjustments: guard_adjustments,
            } => {
                adjustments.extend(guard_adjustments);
                let decision = TradeDecision {
                    id: Uuid::new_v4(),
                    symbol: symbol.to_string(),
                    direction: consensus.direction,
                    notional,
                    regime: metrics.regime,
                    consensus_confidence: consensus.confidence,
                    stop_loss,
                    take_profit,
                    adjustments,
                    decided_at: Utc::now(),
                };
                info!(
                    "{}: {} {} (confidence {:.2}, regime {}, {} dissenter(s))",
                    symbol,
                    decision.direction,
                    decision.notional,
                    decision.consensus_confidence,
                    decision.regime,
                    consensus.dissenting.len()
                );
                if let Some(events) = &self.events {
                    events.emit(EngineEvent::DecisionEmitted {
                        symbol: decision.symbol.clone(),
                        direction: decision.direction,
                        notional: decision.notional,
                        confidence: decision.consensus_confidence,
                    });
                }
                DecisionOutcome::Trade(decision)
            }
        }
    }

    /// Run independent cycles for several symbols in parallel
    pub async fn run_symbols(self: Arc<Self>, symbols: &[String]) -> Vec<(String, DecisionOutcome)> {
        let mut handles = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let this = Arc::clone(&self);
            let symbol = symbol.clone();
            handles.push(tokio::spawn(async move {
                let outcome = this.run_cycle(&symbol).await;
                (symbol, outcome)
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(pair) => results.push(pair),
                Err(e) => warn!("symbol cycle task failed: {}", e),
            }
        }
        results
    }

    async fn fetch_history(&self, symbol: &str) -> Vec<Candle> {
        if !self.lock_breakers().allow(OP_DATA_FEED) {
            warn!("{}: data-feed circuit open, classifying without history", symbol);
            return Vec::new();
        }

        let fetch = self
            .history_provider
            .history(symbol, self.config.history_len);
        match timeout(self.config.vote_timeout, fetch).await {
            Ok(Ok(history)) => {
                self.lock_breakers().record_success(OP_DATA_FEED);
                history
            }
            Ok(Err(e)) => {
                warn!("{}: history fetch failed: {}", symbol, e);
                self.lock_breakers().record_failure(OP_DATA_FEED);
                Vec::new()
            }
            Err(_) => {
                warn!("{}: history fetch timed out", symbol);
                self.lock_breakers().record_failure(OP_DATA_FEED);
                Vec::new()
            }
        }
    }

    async fn collect_votes(&self, symbol: &str, history: &[Candle]) -> (Vec<AgentVote>, usize) {
        let mut handles = Vec::new();
        let mut circuit_excluded = 0usize;

        for provider in &self.vote_providers {
            let operation = format!("agent-query:{}", provider.agent_id());
            if !self.lock_breakers().allow(&operation) {
                debug!("{}: {} excluded, circuit open", symbol, operation);
                circuit_excluded += 1;
                continue;
            }

            let provider = Arc::clone(provider);
            let symbol = symbol.to_string();
            let history = history.to_vec();
            let wait = self.config.vote_timeout;
            handles.push((
                operation,
                tokio::spawn(async move {
                    timeout(wait, provider.vote(&symbol, &history)).await
                }),
            ));
        }

        let mut votes = Vec::with_capacity(handles.len());
        for (operation, handle) in handles {
            match handle.await {
                Ok(Ok(Ok(vote))) => {
                    self.lock_breakers().record_success(&operation);
                    votes.push(vote);
                }
                Ok(Ok(Err(e))) => {
                    warn!("{}: {} failed: {}", symbol, operation, e);
                    self.lock_breakers().record_failure(&operation);
                }
                Ok(Err(_elapsed)) => {
                    warn!("{}: {} timed out, excluded from consensus", symbol, operation);
                    self.lock_breakers().record_failure(&operation);
                }
                Err(e) => {
                    warn!("{}: {} task failed: {}", symbol, operation, e);
                    self.lock_breakers().record_failure(&operation);
                }
            }
        }

        (votes, circuit_excluded)
    }

    async fn fetch_snapshot(&self) -> Result<crate::portfolio::PortfolioSnapshot, DecisionOutcome> {
        if !self.lock_breakers().allow(OP_PORTFOLIO) {
            return Err(DecisionOutcome::no_action(
                ReasonCode::CircuitOpen,
                "portfolio provider circuit open",
            ));
        }
        match timeout(self.config.vote_timeout, self.portfolio_provider.snapshot()).await {
            Ok(Ok(snapshot)) => {
                self.lock_breakers().record_success(OP_PORTFOLIO);
                Ok(snapshot)
            }
            Ok(Err(e)) => {
                self.lock_breakers().record_failure(OP_PORTFOLIO);
                Err(DecisionOutcome::no_action(
                    ReasonCode::DependencyUnavailable,
                    format!("portfolio snapshot failed: {}", e),
                ))
            }
            Err(_) => {
                self.lock_breakers().record_failure(OP_PORTFOLIO);
                Err(DecisionOutcome::no_action(
                    ReasonCode::DependencyUnavailable,
                    "portfolio snapshot timed out",
                ))
            }
        }
    }

    fn lock_breakers(&self) -> std::sync::MutexGuard<'_, CircuitBreakerRegistry> {
        match self.breakers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

//! Quorum - Multi-Agent Trading Decision Engine
//!
//! Wires the decision pipeline together and drives it against a simulated
//! market feed: per-cycle regime classification, agent vote consensus,
//! correlation risk adjustment and the layered risk guard. Order execution,
//! real market data and notification delivery are external collaborators;
//! this binary stands them in with a random-walk feed and a log-only event
//! drain.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use quorum::agents::{MeanReversionAgent, TrendAgent, VolatilityAgent};
use quorum::comms::{self, CycleMonitor, EngineEvent};
use quorum::config::Config;
use quorum::core::breaker::CircuitBreakerRegistry;
use quorum::core::consensus::ConsensusEngine;
use quorum::core::correlation::CorrelationAnalyzer;
use quorum::core::guard::RiskGuard;
use quorum::core::orchestrator::DecisionOrchestrator;
use quorum::core::performance::AgentPerformanceBook;
use quorum::core::regime::RegimeClassifier;
use quorum::core::types::{Candle, DecisionOutcome, ReasonCode};
use quorum::portfolio::PortfolioSnapshot;
use quorum::providers::{KillSwitch, MarketHistoryProvider, PortfolioProvider, VoteProvider};
use quorum::universe::Universe;

const SEP: &str = "===========================================================";

/// Random-walk candle feed standing in for the market-data collaborator
struct SimulatedMarket {
    series: Mutex<HashMap<String, Vec<Candle>>>,
}

impl SimulatedMarket {
    fn new(symbols: &[String]) -> Self {
        let mut rng = rand::thread_rng();
        let mut series = HashMap::new();
        for symbol in symbols {
            let mut price = rng.gen_range(50.0..500.0);
            let mut candles = Vec::with_capacity(64);
            for _ in 0..64 {
                price = Self::step(price, &mut rng, &mut candles);
            }
            series.insert(symbol.clone(), candles);
        }
        Self {
            series: Mutex::new(series),
        }
    }

    fn step(price: f64, rng: &mut impl Rng, candles: &mut Vec<Candle>) -> f64 {
        let drift = rng.gen_range(-0.008..0.009);
        let next = (price * (1.0 + drift)).max(1.0);
        let open = Decimal::from_f64(price).unwrap_or(dec!(100));
        let close = Decimal::from_f64(next).unwrap_or(dec!(100));
        let high = open.max(close) * dec!(1.002);
        let low = open.min(close) * dec!(0.998);
        let volume = Decimal::from_f64(rng.gen_range(700.0..1400.0)).unwrap_or(dec!(1000));
        candles.push(Candle::new(Utc::now(), open, high, low, close, volume));
        next
    }

    fn advance(&self, symbol: &str) {
        let mut series = match self.series.lock() {
            Ok(series) => series,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(candles) = series.get_mut(symbol) {
            let last = candles.last().and_then(|c| c.close.to_f64()).unwrap_or(100.0);
            let mut rng = rand::thread_rng();
            Self::step(last, &mut rng, candles);
            let len = candles.len();
            if len > 512 {
                candles.drain(..len - 512);
            }
        }
    }
}

#[async_trait]
impl MarketHistoryProvider for SimulatedMarket {
    async fn history(&self, symbol: &str, count: usize) -> Result<Vec<Candle>> {
        self.advance(symbol);
        let series = match self.series.lock() {
            Ok(series) => series,
            Err(poisoned) => poisoned.into_inner(),
        };
        let candles = series.get(symbol).cloned().unwrap_or_default();
        let start = candles.len().saturating_sub(count);
        Ok(candles[start..].to_vec())
    }
}

/// Flat paper portfolio standing in for the portfolio collaborator
struct PaperPortfolio {
    capital: Decimal,
}

#[async_trait]
impl PortfolioProvider for PaperPortfolio {
    async fn snapshot(&self) -> Result<PortfolioSnapshot> {
        Ok(PortfolioSnapshot::new(self.capital))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::load("config.toml").unwrap_or_else(|e| {
        eprintln!("Failed to load config.toml: {}. Exiting.", e);
        std::process::exit(1);
    });

    // Setup logging
    let level = cfg.system.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("{}", SEP);
    info!("  {} - Multi-Agent Trading Decision Engine", cfg.system.name);
    info!("  One risk-bounded decision per symbol per cycle.");
    info!("{}", SEP);

    let universe = Universe::from_symbols(cfg.symbols.clone());
    info!("Universe: {} symbols", universe.len());

    // Kill switch: Ctrl-C engages it; every in-flight cycle observes it at
    // the guard's system layer
    let kill = KillSwitch::new();
    let kill_for_signal = kill.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received: kill switch engaged");
            kill_for_signal.engage();
        }
    });

    // Event channel: the alerting/telemetry collaborator's feed
    let (events, mut event_rx) = comms::channel(256);
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                EngineEvent::RiskViolation { symbol, layer, detail } => {
                    warn!("[ALERT] risk violation [{}] {}: {}", layer, symbol, detail)
                }
                EngineEvent::BreakerTransition { operation, from, to } => {
                    warn!("[ALERT] breaker {} {} -> {}", operation, from, to)
                }
                EngineEvent::DailyLimitBreached { daily_pnl } => {
                    warn!("[ALERT] daily loss limit breached at {}", daily_pnl)
                }
                EngineEvent::DecisionEmitted { symbol, direction, notional, confidence } => {
                    info!(
                        "[ALERT] decision {} {} {} (confidence {:.2})",
                        symbol, direction, notional, confidence
                    )
                }
            }
        }
    });

    // Agent performance book, persisted across runs
    let store_path = cfg.performance.store_path.clone();
    let mut book = AgentPerformanceBook::load_or_new(&store_path, cfg.performance.to_config());

    let base_notional = cfg.agents.base_notional_decimal();
    let vote_providers: Vec<Arc<dyn VoteProvider>> = vec![
        Arc::new(TrendAgent::new("trend-1", base_notional)),
        Arc::new(MeanReversionAgent::new("revert-1", base_notional)),
        Arc::new(VolatilityAgent::new("vol-1", base_notional)),
    ];
    for provider in &vote_providers {
        book.register(provider.agent_id(), provider.specialty());
    }
    info!("Agents: {} vote providers | {}", vote_providers.len(), book.format_stats());

    // Explicitly constructed, dependency-injected services
    let performance = Arc::new(RwLock::new(book));
    let guard = Arc::new(Mutex::new(
        RiskGuard::new(cfg.risk.to_config(), kill.flag()).with_events(events.clone()),
    ));
    let breakers = Arc::new(Mutex::new(
        CircuitBreakerRegistry::new(cfg.breaker.to_config()).with_events(events.clone()),
    ));
    let market = Arc::new(SimulatedMarket::new(&cfg.symbols));
    let portfolio = Arc::new(PaperPortfolio { capital: dec!(100000) });

    let orchestrator = Arc::new(
        DecisionOrchestrator::new(
            RegimeClassifier::new(cfg.regime.to_config()),
            ConsensusEngine::new(cfg.consensus.to_config()),
            CorrelationAnalyzer::new(cfg.correlation.to_config()),
            Arc::clone(&guard),
            breakers,
            Arc::clone(&performance),
            market,
            vote_providers,
            portfolio,
            cfg.orchestrator.to_config(),
        )
        .with_events(events),
    );

    info!("Pipeline: regime -> consensus -> correlation -> risk guard");
    info!("Feed: simulated random walk (paper mode)");

    let mut monitor = CycleMonitor::new();
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(2));
    let mut rounds = 0u64;

    loop {
        interval.tick().await;
        if kill.is_engaged() {
            info!("Kill switch engaged; stopping decision loop");
            break;
        }

        let results = Arc::clone(&orchestrator).run_symbols(&universe.symbols()).await;
        for (symbol, outcome) in results {
            monitor.record_cycle();
            match outcome {
                DecisionOutcome::Trade(decision) => {
                    monitor.record_decision();
                    info!(
                        "{}: {} {} @ SL {} / TP {} | regime {} | {}",
                        symbol,
                        decision.direction,
                        decision.notional,
                        decision.stop_loss,
                        decision.take_profit,
                        decision.regime,
                        decision.adjustments.join("; "),
                    );
                }
                DecisionOutcome::NoAction { code, detail } => {
                    monitor.record_no_action();
                    match code {
                        ReasonCode::RiskLimit(_) | ReasonCode::KillSwitch => {
                            monitor.record_risk_block()
                        }
                        ReasonCode::CircuitOpen => monitor.record_circuit_rejection(),
                        _ => {}
                    }
                    info!("{}: no action [{}] {}", symbol, code, detail);
                }
            }
        }

        rounds += 1;
        if rounds % 10 == 0 {
            info!("{}", SEP);
            info!("Monitor: {}", monitor.summary());
            let guard_status = match guard.lock() {
                Ok(guard) => guard.status(),
                Err(poisoned) => poisoned.into_inner().status(),
            };
            info!("Guard: {}", guard_status);
            info!("{}", SEP);
        }
    }

    // Persist agent performance for the next run
    let save_result = match performance.read() {
        Ok(book) => book.save(&store_path),
        Err(poisoned) => poisoned.into_inner().save(&store_path),
    };
    if let Err(e) = save_result {
        warn!("failed to save performance book: {}", e);
    }

    info!("Monitor: {}", monitor.summary());
    info!("Shutdown complete");
    Ok(())
}

//! Risk Guard
//!
//! Layered limit checks over every candidate trade, evaluated in fixed
//! order with the first violation winning:
//!
//! 1. Position: single-position size cap, SL/TP present or defaulted
//! 2. Portfolio: post-trade leverage cap, correlation risk must be safe
//! 3. Daily: day loss limit (sticky; blocks entries only) and trade count
//! 4. System: kill switch blocks everything
//!
//! Risk limits are ENFORCED, not discovered. A blocked verdict identifies
//! the offending layer and is an ordinary result, never an error; it is
//! distinct from a circuit breaker's "cannot evaluate".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};

use super::correlation::CorrelationRisk;
use super::types::{Direction, RiskLayer};
use crate::comms::events::{EngineEvent, EventSender};
use crate::portfolio::PortfolioSnapshot;

/// Risk limit configuration
#[derive(Debug, Clone)]
pub struct RiskGuardConfig {
    /// Max notional for a single position
    pub max_position_notional: Decimal,
    /// Max total exposure relative to capital after the trade
    pub max_portfolio_leverage: Decimal,
    /// Max daily loss (realized + unrealized) as a fraction of capital
    pub daily_loss_limit: Decimal,
    /// Max new entries per trading day
    pub max_trades_per_day: usize,
    /// Stop-loss distance applied when a candidate carries none
    pub default_stop_loss_pct: Decimal,
    /// Take-profit distance applied when a candidate carries none
    pub default_take_profit_pct: Decimal,
}

impl Default for RiskGuardConfig {
    fn default() -> Self {
        Self {
            max_position_notional: dec!(50000),
            max_portfolio_leverage: dec!(2.0),
            daily_loss_limit: dec!(0.03),
            max_trades_per_day: 20,
            default_stop_loss_pct: dec!(0.02),
            default_take_profit_pct: dec!(0.04),
        }
    }
}

/// Whether the candidate opens exposure or closes it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeIntent {
    Entry,
    Exit,
}

/// A candidate trade presented to the guard
#[derive(Debug, Clone)]
pub struct TradeCandidate {
    pub symbol: String,
    pub direction: Direction,
    pub notional: Decimal,
    pub price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub intent: TradeIntent,
}

impl TradeCandidate {
    pub fn entry(
        symbol: impl Into<String>,
        direction: Direction,
        notional: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            direction,
            notional,
            price,
            stop_loss: None,
            take_profit: None,
            intent: TradeIntent::Entry,
        }
    }

    pub fn exit(
        symbol: impl Into<String>,
        direction: Direction,
        notional: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            direction,
            notional,
            price,
            stop_loss: None,
            take_profit: None,
            intent: TradeIntent::Exit,
        }
    }
}

/// Outcome of a guard evaluation
#[derive(Debug, Clone)]
pub enum RiskVerdict {
    Approved {
        stop_loss: Decimal,
        take_profit: Decimal,
        adjustments: Vec<String>,
    },
    Blocked {
        layer: RiskLayer,
        detail: String,
    },
}

impl RiskVerdict {
    pub fn is_approved(&self) -> bool {
        matches!(self, RiskVerdict::Approved { .. })
    }
}

/// Long-lived per-day counters, mutated only by the guard
#[derive(Debug, Clone, Default)]
pub struct RiskLimitState {
    day: u32,
    daily_realized_pnl: Decimal,
    daily_breached: bool,
    trades_today: usize,
}

/// Enforces the layered risk policy
pub struct RiskGuard {
    config: RiskGuardConfig,
    state: RiskLimitState,
    kill_switch: Arc<AtomicBool>,
    events: Option<EventSender>,
}

impl RiskGuard {
    pub fn new(config: RiskGuardConfig, kill_switch: Arc<AtomicBool>) -> Self {
        Self {
            config,
            state: RiskLimitState {
                day: Utc::now().day(),
                ..Default::default()
            },
            kill_switch,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Reset daily tracking when the day rolls over
    pub fn check_daily_reset(&mut self) {
        let today = Utc::now().day();
        if today != self.state.day {
            info!("daily rollover: risk counters reset");
            self.state.day = today;
            self.state.daily_realized_pnl = Decimal::ZERO;
            self.state.daily_breached = false;
            self.state.trades_today = 0;
        }
    }

    /// Evaluate a candidate against all four layers in order.
    ///
    /// `correlation` carries the analyzer's verdict for entries; exits pass
    /// `None` since closing exposure has no concentration to add.
    pub fn evaluate(
        &mut self,
        candidate: &TradeCandidate,
        snapshot: &PortfolioSnapshot,
        correlation: Option<&CorrelationRisk>,
    ) -> RiskVerdict {
        self.check_daily_reset();

        // Layer 1: position
        if candidate.direction == Direction::Hold {
            return self.block(candidate, RiskLayer::Position, "hold carries no trade to evaluate");
        }
        if candidate.notional <= Decimal::ZERO {
            return self.block(
                candidate,
                RiskLayer::Position,
                format!("non-positive notional {}", candidate.notional),
            );
        }
        if candidate.notional > self.config.max_position_notional {
            return self.block(
                candidate,
                RiskLayer::Position,
                format!(
                    "notional {} exceeds max single-position size {}",
                    candidate.notional, self.config.max_position_notional
                ),
            );
        }
        let mut adjustments = Vec::new();
        let (stop_loss, take_profit) = self.resolve_protections(candidate, &mut adjustments);

        // Layer 2: portfolio
        let capital = snapshot.capital();
        if capital.is_zero() {
            return self.block(candidate, RiskLayer::Portfolio, "no capital backing the account");
        }
        let exposure_after = match candidate.intent {
            TradeIntent::Entry => snapshot.total_notional() + candidate.notional,
            TradeIntent::Exit => {
                let total = snapshot.total_notional();
                total - candidate.notional.min(total)
            }
        };
        let leverage = exposure_after / capital;
        if leverage > self.config.max_portfolio_leverage {
            return self.block(
                candidate,
                RiskLayer::Portfolio,
                format!(
                    "post-trade leverage {:.2} exceeds max {:.2}",
                    leverage, self.config.max_portfolio_leverage
                ),
            );
        }
        if let Some(corr) = correlation {
            if !corr.is_safe {
                return self.block(
                    candidate,
                    RiskLayer::Portfolio,
                    format!("correlation risk {}: {}", corr.level, corr.explanation),
                );
            }
        }

        // Layer 3: daily
        let daily_pnl = self.state.daily_realized_pnl + snapshot.unrealized_pnl();
        let loss_limit = capital * self.config.daily_loss_limit;
        if daily_pnl < -loss_limit && !self.state.daily_breached {
            self.state.daily_breached = true;
            warn!("daily loss limit breached: {} (limit {})", daily_pnl, loss_limit);
            if let Some(events) = &self.events {
                events.emit(EngineEvent::DailyLimitBreached { daily_pnl });
            }
        }
        if candidate.intent == TradeIntent::Entry {
            if self.state.daily_breached {
                return self.block(
                    candidate,
                    RiskLayer::Daily,
                    format!(
                        "daily loss {} breached limit {}; entries blocked until rollover",
                        daily_pnl, loss_limit
                    ),
                );
            }
            if self.state.trades_today >= self.config.max_trades_per_day {
                return self.block(
                    candidate,
                    RiskLayer::Daily,
                    format!(
                        "max daily trades reached ({}/{})",
                        self.state.trades_today, self.config.max_trades_per_day
                    ),
                );
            }
        }

        // Layer 4: system
        if self.kill_switch.load(Ordering::Relaxed) {
            return self.block(candidate, RiskLayer::System, "kill switch engaged; all trading halted");
        }

        RiskVerdict::Approved {
            stop_loss,
            take_profit,
            adjustments,
        }
    }

    /// Record that a decision was emitted (counts toward the daily cap)
    pub fn record_entry(&mut self) {
        self.state.trades_today += 1;
    }

    /// Record realized P&L reported by the execution collaborator
    pub fn record_realized_pnl(&mut self, pnl: Decimal) {
        self.state.daily_realized_pnl += pnl;
    }

    /// Operator override: clear the sticky daily breach and counters
    pub fn manual_reset(&mut self) {
        info!("risk guard manually reset");
        self.state.daily_realized_pnl = Decimal::ZERO;
        self.state.daily_breached = false;
        self.state.trades_today = 0;
    }

    pub fn is_daily_breached(&self) -> bool {
        self.state.daily_breached
    }

    pub fn daily_realized_pnl(&self) -> Decimal {
        self.state.daily_realized_pnl
    }

    /// Current status line for logging
    pub fn status(&self) -> String {
        format!(
            "entries: {} | daily realized: {} | breached: {} | kill switch: {}",
            self.state.trades_today,
            self.state.daily_realized_pnl,
            if self.state.daily_breached { "YES" } else { "no" },
            if self.kill_switch.load(Ordering::Relaxed) { "ENGAGED" } else { "off" },
        )
    }

    fn resolve_protections(
        &self,
        candidate: &TradeCandidate,
        adjustments: &mut Vec<String>,
    ) -> (Decimal, Decimal) {
        let sl_distance = candidate.price * self.config.default_stop_loss_pct;
        let tp_distance = candidate.price * self.config.default_take_profit_pct;

        let stop_loss = candidate.stop_loss.unwrap_or_else(|| {
            adjustments.push("stop-loss defaulted".to_string());
            match candidate.direction {
                Direction::Short => candidate.price + sl_distance,
                _ => candidate.price - sl_distance,
            }
        });
        let take_profit = candidate.take_profit.unwrap_or_else(|| {
            adjustments.push("take-profit defaulted".to_string());
            match candidate.direction {
                Direction::Short => candidate.price - tp_distance,
                _ => candidate.price + tp_distance,
            }
        });

        (stop_loss, take_profit)
    }

    fn block(
        &self,
        candidate: &TradeCandidate,
        layer: RiskLayer,
        detail: impl Into<String>,
    ) -> RiskVerdict {
        let detail = detail.into();
        warn!("risk block [{}] {}: {}", layer, candidate.symbol, detail);
        if let Some(events) = &self.events {
            events.emit(EngineEvent::RiskViolation {
                symbol: candidate.symbol.clone(),
                layer,
                detail: detail.clone(),
            });
        }
        RiskVerdict::Blocked { layer, detail }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::correlation::{CorrelationRisk, RiskLevel};
    use crate::portfolio::OpenPosition;

    fn guard() -> RiskGuard {
        RiskGuard::new(RiskGuardConfig::default(), Arc::new(AtomicBool::new(false)))
    }

    fn snapshot_empty() -> PortfolioSnapshot {
        PortfolioSnapshot::new(dec!(100000))
    }

    fn safe_corr() -> CorrelationRisk {
        CorrelationRisk::from_level(RiskLevel::Low, "test")
    }

    #[test]
    fn test_basic_entry_approved_with_defaults() {
        let mut guard = guard();
        let candidate = TradeCandidate::entry("AAPL", Direction::Long, dec!(10000), dec!(100));
        let corr = safe_corr();

        match guard.evaluate(&candidate, &snapshot_empty(), Some(&corr)) {
            RiskVerdict::Approved { stop_loss, take_profit, adjustments } => {
                assert_eq!(stop_loss, dec!(98.0000));
                assert_eq!(take_profit, dec!(104.0000));
                assert_eq!(adjustments.len(), 2);
            }
            RiskVerdict::Blocked { layer, detail } => {
                panic!("unexpected block at {}: {}", layer, detail)
            }
        }
    }

    #[test]
    fn test_short_protection_defaults() {
        let mut guard = guard();
        let candidate = TradeCandidate::entry("AAPL", Direction::Short, dec!(10000), dec!(100));
        let corr = safe_corr();

        match guard.evaluate(&candidate, &snapshot_empty(), Some(&corr)) {
            RiskVerdict::Approved { stop_loss, take_profit, .. } => {
                assert!(stop_loss > dec!(100));
                assert!(take_profit < dec!(100));
            }
            _ => panic!("expected approval"),
        }
    }

    #[test]
    fn test_explicit_protections_kept() {
        let mut guard = guard();
        let mut candidate = TradeCandidate::entry("AAPL", Direction::Long, dec!(10000), dec!(100));
        candidate.stop_loss = Some(dec!(95));
        candidate.take_profit = Some(dec!(112));
        let corr = safe_corr();

        match guard.evaluate(&candidate, &snapshot_empty(), Some(&corr)) {
            RiskVerdict::Approved { stop_loss, take_profit, adjustments } => {
                assert_eq!(stop_loss, dec!(95));
                assert_eq!(take_profit, dec!(112));
                assert!(adjustments.is_empty());
            }
            _ => panic!("expected approval"),
        }
    }

    #[test]
    fn test_layer1_position_size_cap() {
        let mut guard = guard();
        let candidate = TradeCandidate::entry("AAPL", Direction::Long, dec!(60000), dec!(100));
        let corr = safe_corr();

        match guard.evaluate(&candidate, &snapshot_empty(), Some(&corr)) {
            RiskVerdict::Blocked { layer, .. } => assert_eq!(layer, RiskLayer::Position),
            _ => panic!("expected position-layer block"),
        }
    }

    #[test]
    fn test_layer2_leverage_cap() {
        let mut guard = guard();
        let mut snap = PortfolioSnapshot::new(dec!(100000));
        for (i, sym) in ["JPM", "XOM", "CAT", "DIS"].iter().enumerate() {
            snap.add_position(OpenPosition::new(
                *sym,
                Direction::Long,
                dec!(40000) + Decimal::from(i),
                dec!(100),
                dec!(100),
            ));
        }
        // ~160k existing + 45k proposed = 2.05x leverage
        let candidate = TradeCandidate::entry("AAPL", Direction::Long, dec!(45000), dec!(100));
        let corr = safe_corr();

        match guard.evaluate(&candidate, &snap, Some(&corr)) {
            RiskVerdict::Blocked { layer, detail } => {
                assert_eq!(layer, RiskLayer::Portfolio);
                assert!(detail.contains("leverage"));
            }
            _ => panic!("expected portfolio-layer block"),
        }
    }

    #[test]
    fn test_layer2_correlation_unsafe() {
        let mut guard = guard();
        let candidate = TradeCandidate::entry("AAPL", Direction::Long, dec!(10000), dec!(100));
        let corr = CorrelationRisk::from_level(RiskLevel::High, "symbol concentration");

        match guard.evaluate(&candidate, &snapshot_empty(), Some(&corr)) {
            RiskVerdict::Blocked { layer, detail } => {
                assert_eq!(layer, RiskLayer::Portfolio);
                assert!(detail.contains("correlation"));
            }
            _ => panic!("expected portfolio-layer block"),
        }
    }

    #[test]
    fn test_layer3_daily_loss_blocks_entries_not_exits() {
        let mut guard = guard();
        // 4% realized loss on 100k capital, limit is 3%
        guard.record_realized_pnl(dec!(-4000));

        let entry = TradeCandidate::entry("AAPL", Direction::Long, dec!(10000), dec!(100));
        let corr = safe_corr();
        match guard.evaluate(&entry, &snapshot_empty(), Some(&corr)) {
            RiskVerdict::Blocked { layer, .. } => assert_eq!(layer, RiskLayer::Daily),
            _ => panic!("expected daily-layer block"),
        }
        assert!(guard.is_daily_breached());

        // An exit is not blocked by the daily layer
        let exit = TradeCandidate::exit("AAPL", Direction::Long, dec!(10000), dec!(100));
        assert!(guard.evaluate(&exit, &snapshot_empty(), None).is_approved());
    }

    #[test]
    fn test_daily_breach_is_sticky() {
        let mut guard = guard();
        guard.record_realized_pnl(dec!(-4000));
        let entry = TradeCandidate::entry("AAPL", Direction::Long, dec!(10000), dec!(100));
        let corr = safe_corr();
        assert!(!guard.evaluate(&entry, &snapshot_empty(), Some(&corr)).is_approved());

        // P&L recovers, but the flag holds until rollover or manual reset
        guard.record_realized_pnl(dec!(4000));
        assert!(!guard.evaluate(&entry, &snapshot_empty(), Some(&corr)).is_approved());

        guard.manual_reset();
        assert!(guard.evaluate(&entry, &snapshot_empty(), Some(&corr)).is_approved());
    }

    #[test]
    fn test_unrealized_loss_counts_toward_daily() {
        let mut guard = guard();
        // Open position down 4% of capital
        let mut snap = PortfolioSnapshot::new(dec!(100000));
        snap.add_position(OpenPosition::new(
            "AAPL",
            Direction::Long,
            dec!(40000),
            dec!(100),
            dec!(90),
        ));

        let entry = TradeCandidate::entry("MSFT", Direction::Long, dec!(10000), dec!(100));
        let corr = safe_corr();
        match guard.evaluate(&entry, &snap, Some(&corr)) {
            RiskVerdict::Blocked { layer, .. } => assert_eq!(layer, RiskLayer::Daily),
            _ => panic!("expected daily-layer block"),
        }
    }

    #[test]
    fn test_layer3_trade_count_cap() {
        let mut guard = guard();
        for _ in 0..20 {
            guard.record_entry();
        }
        let entry = TradeCandidate::entry("AAPL", Direction::Long, dec!(10000), dec!(100));
        let corr = safe_corr();
        match guard.evaluate(&entry, &snapshot_empty(), Some(&corr)) {
            RiskVerdict::Blocked { layer, detail } => {
                assert_eq!(layer, RiskLayer::Daily);
                assert!(detail.contains("max daily trades"));
            }
            _ => panic!("expected daily-layer block"),
        }
    }

    #[test]
    fn test_layer4_kill_switch_blocks_everything() {
        let kill = Arc::new(AtomicBool::new(true));
        let mut guard = RiskGuard::new(RiskGuardConfig::default(), kill);

        let entry = TradeCandidate::entry("AAPL", Direction::Long, dec!(10000), dec!(100));
        let corr = safe_corr();
        match guard.evaluate(&entry, &snapshot_empty(), Some(&corr)) {
            RiskVerdict::Blocked { layer, .. } => assert_eq!(layer, RiskLayer::System),
            _ => panic!("expected system-layer block"),
        }

        // Exits are blocked too
        let exit = TradeCandidate::exit("AAPL", Direction::Long, dec!(10000), dec!(100));
        assert!(!guard.evaluate(&exit, &snapshot_empty(), None).is_approved());
    }

    #[test]
    fn test_first_violation_wins() {
        // Oversized position with kill switch engaged: position layer reports
        let kill = Arc::new(AtomicBool::new(true));
        let mut guard = RiskGuard::new(RiskGuardConfig::default(), kill);
        let candidate = TradeCandidate::entry("AAPL", Direction::Long, dec!(60000), dec!(100));
        let corr = safe_corr();

        match guard.evaluate(&candidate, &snapshot_empty(), Some(&corr)) {
            RiskVerdict::Blocked { layer, .. } => assert_eq!(layer, RiskLayer::Position),
            _ => panic!("expected block"),
        }
    }

    #[test]
    fn test_breach_emits_event() {
        let (sender, mut rx) = crate::comms::events::channel(8);
        let mut guard = RiskGuard::new(
            RiskGuardConfig::default(),
            Arc::new(AtomicBool::new(false)),
        )
        .with_events(sender);
        guard.record_realized_pnl(dec!(-5000));

        let entry = TradeCandidate::entry("AAPL", Direction::Long, dec!(10000), dec!(100));
        let corr = safe_corr();
        let _ = guard.evaluate(&entry, &snapshot_empty(), Some(&corr));

        let mut saw_breach = false;
        let mut saw_violation = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                EngineEvent::DailyLimitBreached { .. } => saw_breach = true,
                EngineEvent::RiskViolation { layer, .. } => {
                    assert_eq!(layer, RiskLayer::Daily);
                    saw_violation = true;
                }
                _ => {}
            }
        }
        assert!(saw_breach && saw_violation);
    }
}

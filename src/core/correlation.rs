//! Correlation Risk Analyzer
//!
//! Evaluates a proposed position against the existing open-position set for
//! directional, per-symbol and per-sector concentration. Risk escalates
//! monotonically with each metric; the analyzer only reads the snapshot.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::Direction;
use crate::portfolio::PortfolioSnapshot;
use crate::universe::sector_of;

/// Qualitative correlation risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }

    /// Recommended position size adjustment for this level.
    /// 1.0 at Low, shrinking multiplicatively, 0 at Critical (hard veto).
    pub fn size_adjustment(&self) -> f64 {
        match self {
            RiskLevel::Low => 1.0,
            RiskLevel::Medium => 0.75,
            RiskLevel::High => 0.5,
            RiskLevel::Critical => 0.0,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a correlation analysis
#[derive(Debug, Clone)]
pub struct CorrelationRisk {
    pub level: RiskLevel,
    pub is_safe: bool,
    pub size_adjustment: f64,
    pub explanation: String,
}

impl CorrelationRisk {
    /// Build from a level; safety and adjustment derive from it so the
    /// Critical => unsafe invariant holds by construction.
    pub fn from_level(level: RiskLevel, explanation: impl Into<String>) -> Self {
        Self {
            level,
            is_safe: level < RiskLevel::High,
            size_adjustment: level.size_adjustment(),
            explanation: explanation.into(),
        }
    }
}

/// Concentration caps, each expressed as a fraction of account capital
#[derive(Debug, Clone)]
pub struct CorrelationConfig {
    /// Cap on total same-direction exposure
    pub directional_cap: f64,
    /// Cap on exposure to a single symbol
    pub symbol_cap: f64,
    /// Cap on exposure to a single sector
    pub sector_cap: f64,
    /// Fraction of a cap at which risk becomes Medium
    pub medium_ratio: f64,
    /// Multiple of a cap at which risk becomes Critical
    pub critical_ratio: f64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            directional_cap: 0.5,
            symbol_cap: 0.10,
            sector_cap: 0.25,
            medium_ratio: 0.75,
            critical_ratio: 1.5,
        }
    }
}

/// Analyzes proposed trades for portfolio concentration risk
#[derive(Debug, Clone)]
pub struct CorrelationAnalyzer {
    config: CorrelationConfig,
}

impl CorrelationAnalyzer {
    pub fn new(config: CorrelationConfig) -> Self {
        Self { config }
    }

    /// Analyze a proposed trade against the current snapshot.
    ///
    /// Never mutates the snapshot. The returned level is the worst of the
    /// directional, symbol and sector concentration checks.
    pub fn analyze(
        &self,
        symbol: &str,
        side: Direction,
        notional: Decimal,
        snapshot: &PortfolioSnapshot,
    ) -> CorrelationRisk {
        if side == Direction::Hold || notional <= Decimal::ZERO {
            return CorrelationRisk::from_level(RiskLevel::Low, "no directional exposure proposed");
        }
        if snapshot.capital().is_zero() {
            return CorrelationRisk::from_level(RiskLevel::Critical, "no capital backing the account");
        }

        let capital = snapshot.capital().to_f64().unwrap_or(0.0);
        let proposed = notional.to_f64().unwrap_or(0.0);
        if capital <= 0.0 {
            return CorrelationRisk::from_level(RiskLevel::Critical, "no capital backing the account");
        }

        let sector = sector_of(symbol);
        let directional = (snapshot.directional_notional(side).to_f64().unwrap_or(0.0) + proposed) / capital;
        let symbol_conc = (snapshot.symbol_notional(symbol, side).to_f64().unwrap_or(0.0) + proposed) / capital;
        let sector_conc = (snapshot.sector_notional(sector, side).to_f64().unwrap_or(0.0) + proposed) / capital;

        let checks = [
            ("directional", directional, self.config.directional_cap),
            ("symbol", symbol_conc, self.config.symbol_cap),
            ("sector", sector_conc, self.config.sector_cap),
        ];

        let mut level = RiskLevel::Low;
        let mut worst: Option<(&str, f64, f64)> = None;
        for (name, value, cap) in checks {
            let check_level = self.level_for(value, cap);
            if check_level > level || worst.is_none() {
                level = level.max(check_level);
                worst = Some((name, value, cap));
            }
        }

        let (name, value, cap) = worst.unwrap_or(("directional", directional, self.config.directional_cap));
        let explanation = format!(
            "{} {} concentration {:.1}% of capital (cap {:.1}%) after adding {} {}",
            level, name, value * 100.0, cap * 100.0, side, symbol
        );

        CorrelationRisk::from_level(level, explanation)
    }

    fn level_for(&self, value: f64, cap: f64) -> RiskLevel {
        if cap <= 0.0 {
            return RiskLevel::Critical;
        }
        let ratio = value / cap;
        if ratio >= self.config.critical_ratio {
            RiskLevel::Critical
        } else if ratio >= 1.0 {
            RiskLevel::High
        } else if ratio >= self.config.medium_ratio {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl Default for CorrelationAnalyzer {
    fn default() -> Self {
        Self::new(CorrelationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::OpenPosition;
    use rust_decimal_macros::dec;

    fn snapshot(positions: Vec<OpenPosition>) -> PortfolioSnapshot {
        let mut snap = PortfolioSnapshot::new(dec!(100000));
        for p in positions {
            snap.add_position(p);
        }
        snap
    }

    #[test]
    fn test_small_trade_empty_book_is_low() {
        let analyzer = CorrelationAnalyzer::default();
        let snap = snapshot(vec![]);
        let risk = analyzer.analyze("AAPL", Direction::Long, dec!(5000), &snap);

        assert_eq!(risk.level, RiskLevel::Low);
        assert!(risk.is_safe);
        assert!((risk.size_adjustment - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_symbol_cap_breach_is_at_least_high() {
        // 8% existing + 4% proposed = 12% of capital in one symbol, cap 10%
        let analyzer = CorrelationAnalyzer::default();
        let snap = snapshot(vec![OpenPosition::new(
            "AAPL",
            Direction::Long,
            dec!(8000),
            dec!(100),
            dec!(100),
        )]);
        let risk = analyzer.analyze("AAPL", Direction::Long, dec!(4000), &snap);

        assert!(risk.level >= RiskLevel::High);
        assert!(!risk.is_safe);
    }

    #[test]
    fn test_symbol_critical_veto() {
        // 16% of capital in one symbol is 1.6x the 10% cap
        let analyzer = CorrelationAnalyzer::default();
        let snap = snapshot(vec![OpenPosition::new(
            "AAPL",
            Direction::Long,
            dec!(10000),
            dec!(100),
            dec!(100),
        )]);
        let risk = analyzer.analyze("AAPL", Direction::Long, dec!(6000), &snap);

        assert_eq!(risk.level, RiskLevel::Critical);
        assert!(!risk.is_safe);
        assert_eq!(risk.size_adjustment, 0.0);
    }

    #[test]
    fn test_directional_concentration() {
        // 45% long already, proposing 10% more: 55% vs 50% cap -> High
        let analyzer = CorrelationAnalyzer::default();
        let snap = snapshot(vec![
            OpenPosition::new("JPM", Direction::Long, dec!(25000), dec!(100), dec!(100)),
            OpenPosition::new("XOM", Direction::Long, dec!(20000), dec!(100), dec!(100)),
        ]);
        let risk = analyzer.analyze("CAT", Direction::Long, dec!(10000), &snap);

        assert!(risk.level >= RiskLevel::High);
        assert!(!risk.is_safe);
        assert!(risk.explanation.contains("directional"));
    }

    #[test]
    fn test_opposite_side_not_counted() {
        // Heavy long book doesn't penalize a short proposal directionally
        let analyzer = CorrelationAnalyzer::default();
        let snap = snapshot(vec![
            OpenPosition::new("JPM", Direction::Long, dec!(25000), dec!(100), dec!(100)),
            OpenPosition::new("XOM", Direction::Long, dec!(20000), dec!(100), dec!(100)),
        ]);
        let risk = analyzer.analyze("CAT", Direction::Short, dec!(5000), &snap);

        assert_eq!(risk.level, RiskLevel::Low);
        assert!(risk.is_safe);
    }

    #[test]
    fn test_sector_concentration() {
        // 20% tech existing + 8% more tech = 28% vs 25% sector cap
        let analyzer = CorrelationAnalyzer::default();
        let snap = snapshot(vec![
            OpenPosition::new("AAPL", Direction::Long, dec!(10000), dec!(100), dec!(100)),
            OpenPosition::new("MSFT", Direction::Long, dec!(10000), dec!(100), dec!(100)),
        ]);
        let risk = analyzer.analyze("NVDA", Direction::Long, dec!(8000), &snap);

        assert!(risk.level >= RiskLevel::High);
        assert!(risk.explanation.contains("sector"));
    }

    #[test]
    fn test_medium_band_shrinks_size() {
        // 8% of capital in one symbol is 0.8x the cap -> Medium
        let analyzer = CorrelationAnalyzer::default();
        let snap = snapshot(vec![]);
        let risk = analyzer.analyze("AAPL", Direction::Long, dec!(8000), &snap);

        assert_eq!(risk.level, RiskLevel::Medium);
        assert!(risk.is_safe);
        assert!((risk.size_adjustment - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_monotonic_escalation() {
        let analyzer = CorrelationAnalyzer::default();
        let snap = snapshot(vec![]);

        let mut last = RiskLevel::Low;
        for notional in [dec!(2000), dec!(8000), dec!(11000), dec!(20000)] {
            let risk = analyzer.analyze("AAPL", Direction::Long, notional, &snap);
            assert!(risk.level >= last, "risk must not decrease as size grows");
            last = risk.level;
        }
        assert_eq!(last, RiskLevel::Critical);
    }

    #[test]
    fn test_zero_capital_is_critical() {
        let analyzer = CorrelationAnalyzer::default();
        let snap = PortfolioSnapshot::new(Decimal::ZERO);
        let risk = analyzer.analyze("AAPL", Direction::Long, dec!(1000), &snap);

        assert_eq!(risk.level, RiskLevel::Critical);
        assert!(!risk.is_safe);
    }

    #[test]
    fn test_hold_proposal_is_low() {
        let analyzer = CorrelationAnalyzer::default();
        let snap = snapshot(vec![]);
        let risk = analyzer.analyze("AAPL", Direction::Hold, dec!(1000), &snap);
        assert_eq!(risk.level, RiskLevel::Low);
    }
}

//! Portfolio Snapshot Module
//!
//! Read-only view of the open-position set owned by the portfolio
//! collaborator. The decision engine only reads snapshots; it never mutates
//! positions. Exposure math here feeds the correlation analyzer and the
//! portfolio-level risk layer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::types::Direction;
use crate::universe::{sector_of, Sector};

/// An open position as reported by the portfolio collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPosition {
    pub symbol: String,
    /// Long or Short; never Hold
    pub side: Direction,
    /// Notional value at entry
    pub notional: Decimal,
    pub entry_price: Decimal,
    pub current_price: Decimal,
    pub sector: Sector,
    pub opened_at: DateTime<Utc>,
}

impl OpenPosition {
    pub fn new(
        symbol: impl Into<String>,
        side: Direction,
        notional: Decimal,
        entry_price: Decimal,
        current_price: Decimal,
    ) -> Self {
        let symbol = symbol.into();
        let sector = sector_of(&symbol);
        Self {
            symbol,
            side,
            notional,
            entry_price,
            current_price,
            sector,
            opened_at: Utc::now(),
        }
    }

    /// Calculate unrealized P&L from the price move since entry
    pub fn unrealized_pnl(&self) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        let move_pct = (self.current_price - self.entry_price) / self.entry_price;
        match self.side {
            Direction::Long => self.notional * move_pct,
            Direction::Short => -(self.notional * move_pct),
            Direction::Hold => Decimal::ZERO,
        }
    }
}

/// Point-in-time snapshot of the portfolio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    positions: HashMap<String, OpenPosition>,
    /// Account capital backing the positions
    capital: Decimal,
}

impl PortfolioSnapshot {
    pub fn new(capital: Decimal) -> Self {
        Self {
            positions: HashMap::new(),
            capital,
        }
    }

    pub fn capital(&self) -> Decimal {
        self.capital
    }

    /// Insert a position while building a snapshot
    pub fn add_position(&mut self, position: OpenPosition) {
        self.positions.insert(position.symbol.clone(), position);
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn get_position(&self, symbol: &str) -> Option<&OpenPosition> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> &HashMap<String, OpenPosition> {
        &self.positions
    }

    /// Total notional across all positions
    pub fn total_notional(&self) -> Decimal {
        self.positions.values().map(|p| p.notional).sum()
    }

    /// Total notional held on the given side
    pub fn directional_notional(&self, side: Direction) -> Decimal {
        self.positions
            .values()
            .filter(|p| p.side == side)
            .map(|p| p.notional)
            .sum()
    }

    /// Notional held in one symbol on the given side
    pub fn symbol_notional(&self, symbol: &str, side: Direction) -> Decimal {
        self.positions
            .values()
            .filter(|p| p.symbol == symbol && p.side == side)
            .map(|p| p.notional)
            .sum()
    }

    /// Notional held in one sector on the given side
    pub fn sector_notional(&self, sector: Sector, side: Direction) -> Decimal {
        self.positions
            .values()
            .filter(|p| p.sector == sector && p.side == side)
            .map(|p| p.notional)
            .sum()
    }

    /// Total unrealized P&L across all positions
    pub fn unrealized_pnl(&self) -> Decimal {
        self.positions.values().map(|p| p.unrealized_pnl()).sum()
    }

    /// Exposure summary string (e.g. "60% long by 20% short")
    pub fn exposure_summary(&self) -> String {
        if self.capital.is_zero() {
            return "no capital".to_string();
        }
        let long = self.directional_notional(Direction::Long) / self.capital * Decimal::from(100);
        let short = self.directional_notional(Direction::Short) / self.capital * Decimal::from(100);
        format!("{:.0}% long by {:.0}% short", long, short)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot_with(positions: Vec<OpenPosition>) -> PortfolioSnapshot {
        let mut snap = PortfolioSnapshot::new(dec!(100000));
        for p in positions {
            snap.add_position(p);
        }
        snap
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = PortfolioSnapshot::new(dec!(100000));
        assert_eq!(snap.capital(), dec!(100000));
        assert_eq!(snap.total_notional(), Decimal::ZERO);
        assert_eq!(snap.position_count(), 0);
    }

    #[test]
    fn test_directional_notional() {
        let snap = snapshot_with(vec![
            OpenPosition::new("AAPL", Direction::Long, dec!(20000), dec!(100), dec!(100)),
            OpenPosition::new("MSFT", Direction::Long, dec!(10000), dec!(200), dec!(200)),
            OpenPosition::new("JPM", Direction::Short, dec!(5000), dec!(150), dec!(150)),
        ]);

        assert_eq!(snap.directional_notional(Direction::Long), dec!(30000));
        assert_eq!(snap.directional_notional(Direction::Short), dec!(5000));
        assert_eq!(snap.total_notional(), dec!(35000));
    }

    #[test]
    fn test_sector_notional() {
        let snap = snapshot_with(vec![
            OpenPosition::new("AAPL", Direction::Long, dec!(20000), dec!(100), dec!(100)),
            OpenPosition::new("NVDA", Direction::Long, dec!(10000), dec!(500), dec!(500)),
            OpenPosition::new("JPM", Direction::Long, dec!(5000), dec!(150), dec!(150)),
        ]);

        assert_eq!(snap.sector_notional(Sector::Technology, Direction::Long), dec!(30000));
        assert_eq!(snap.sector_notional(Sector::Finance, Direction::Long), dec!(5000));
        assert_eq!(snap.sector_notional(Sector::Energy, Direction::Long), Decimal::ZERO);
    }

    #[test]
    fn test_unrealized_pnl() {
        // Long gained 10%, short lost 10% of its notional
        let snap = snapshot_with(vec![
            OpenPosition::new("AAPL", Direction::Long, dec!(10000), dec!(100), dec!(110)),
            OpenPosition::new("JPM", Direction::Short, dec!(10000), dec!(100), dec!(110)),
        ]);

        let long_pnl = snap.get_position("AAPL").unwrap().unrealized_pnl();
        let short_pnl = snap.get_position("JPM").unwrap().unrealized_pnl();
        assert_eq!(long_pnl, dec!(1000));
        assert_eq!(short_pnl, dec!(-1000));
        assert_eq!(snap.unrealized_pnl(), Decimal::ZERO);
    }

    #[test]
    fn test_exposure_summary() {
        let snap = snapshot_with(vec![
            OpenPosition::new("AAPL", Direction::Long, dec!(50000), dec!(100), dec!(100)),
            OpenPosition::new("JPM", Direction::Short, dec!(25000), dec!(150), dec!(150)),
        ]);

        let summary = snap.exposure_summary();
        assert!(summary.contains("50%"));
        assert!(summary.contains("25%"));
    }
}

//! Built-in Analysis Agents
//!
//! Small heuristic vote providers, one per specialization. Real deployments
//! inject external agents through the same `VoteProvider` seam; these keep
//! the engine exercisable end to end without any external dependency.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::core::types::{AgentSpecialty, AgentVote, Candle, Direction};
use crate::providers::VoteProvider;

fn closes(history: &[Candle]) -> Vec<f64> {
    history.iter().filter_map(|c| c.close.to_f64()).collect()
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn scaled_notional(base: Decimal, confidence: f64) -> Decimal {
    base * Decimal::from_f64(confidence).unwrap_or(Decimal::ZERO)
}

/// Votes with the prevailing trend: short SMA against long SMA
pub struct TrendAgent {
    id: String,
    base_notional: Decimal,
}

impl TrendAgent {
    pub fn new(id: impl Into<String>, base_notional: Decimal) -> Self {
        Self {
            id: id.into(),
            base_notional,
        }
    }
}

#[async_trait]
impl VoteProvider for TrendAgent {
    fn agent_id(&self) -> &str {
        &self.id
    }

    fn specialty(&self) -> AgentSpecialty {
        AgentSpecialty::Trend
    }

    async fn vote(&self, _symbol: &str, history: &[Candle]) -> Result<AgentVote> {
        let closes = closes(history);
        if closes.len() < 20 {
            return AgentVote::new(
                self.id.clone(),
                self.specialty(),
                Direction::Hold,
                0.1,
                Decimal::ZERO,
                "insufficient history for trend reading",
            );
        }

        let short = mean(&closes[closes.len() - 5..]);
        let long = mean(&closes[closes.len() - 20..]);
        if long <= 0.0 {
            return AgentVote::new(
                self.id.clone(),
                self.specialty(),
                Direction::Hold,
                0.1,
                Decimal::ZERO,
                "degenerate price window",
            );
        }

        // Gap between the averages, in units of 1% of price
        let gap = (short - long) / long;
        let strength = (gap.abs() / 0.01).min(1.0);
        if strength < 0.2 {
            return AgentVote::new(
                self.id.clone(),
                self.specialty(),
                Direction::Hold,
                0.2,
                Decimal::ZERO,
                format!("flat averages (gap {:.3}%)", gap * 100.0),
            );
        }

        let direction = if gap > 0.0 { Direction::Long } else { Direction::Short };
        let confidence = 0.4 + 0.5 * strength;
        AgentVote::new(
            self.id.clone(),
            self.specialty(),
            direction,
            confidence,
            scaled_notional(self.base_notional, confidence),
            format!("short SMA {:.2} vs long SMA {:.2}", short, long),
        )
    }
}

/// Fades stretched prices back toward the window mean
pub struct MeanReversionAgent {
    id: String,
    base_notional: Decimal,
}

impl MeanReversionAgent {
    pub fn new(id: impl Into<String>, base_notional: Decimal) -> Self {
        Self {
            id: id.into(),
            base_notional,
        }
    }
}

#[async_trait]
impl VoteProvider for MeanReversionAgent {
    fn agent_id(&self) -> &str {
        &self.id
    }

    fn specialty(&self) -> AgentSpecialty {
        AgentSpecialty::MeanReversion
    }

    async fn vote(&self, _symbol: &str, history: &[Candle]) -> Result<AgentVote> {
        let closes = closes(history);
        if closes.len() < 20 {
            return AgentVote::new(
                self.id.clone(),
                self.specialty(),
                Direction::Hold,
                0.1,
                Decimal::ZERO,
                "insufficient history for reversion reading",
            );
        }

        let window = &closes[closes.len() - 20..];
        let m = mean(window);
        let var = window.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / window.len() as f64;
        let std = var.sqrt();
        let last = *window.last().unwrap_or(&m);
        if std <= f64::EPSILON || m <= 0.0 {
            return AgentVote::new(
                self.id.clone(),
                self.specialty(),
                Direction::Hold,
                0.1,
                Decimal::ZERO,
                "no dispersion to revert against",
            );
        }

        let z = (last - m) / std;
        if z.abs() < 1.5 {
            return AgentVote::new(
                self.id.clone(),
                self.specialty(),
                Direction::Hold,
                0.3,
                Decimal::ZERO,
                format!("price within band (z {:.2})", z),
            );
        }

        // Stretched: fade back toward the mean
        let direction = if z > 0.0 { Direction::Short } else { Direction::Long };
        let confidence = (0.3 + 0.2 * z.abs()).min(0.9);
        AgentVote::new(
            self.id.clone(),
            self.specialty(),
            direction,
            confidence,
            scaled_notional(self.base_notional, confidence),
            format!("price {:.2} stretched {:.1} sigma from mean {:.2}", last, z, m),
        )
    }
}

/// Trades range expansion in the direction of the breakout candle
pub struct VolatilityAgent {
    id: String,
    base_notional: Decimal,
}

impl VolatilityAgent {
    pub fn new(id: impl Into<String>, base_notional: Decimal) -> Self {
        Self {
            id: id.into(),
            base_notional,
        }
    }
}

#[async_trait]
impl VoteProvider for VolatilityAgent {
    fn agent_id(&self) -> &str {
        &self.id
    }

    fn specialty(&self) -> AgentSpecialty {
        AgentSpecialty::Volatility
    }

    async fn vote(&self, _symbol: &str, history: &[Candle]) -> Result<AgentVote> {
        if history.len() < 15 {
            return AgentVote::new(
                self.id.clone(),
                self.specialty(),
                Direction::Hold,
                0.1,
                Decimal::ZERO,
                "insufficient history for range reading",
            );
        }

        let ranges: Vec<f64> = history.iter().filter_map(|c| c.range().to_f64()).collect();
        let baseline = mean(&ranges[..ranges.len() - 3]);
        let recent = mean(&ranges[ranges.len() - 3..]);
        let last = &history[history.len() - 1];

        if baseline <= f64::EPSILON || recent < baseline * 1.8 {
            return AgentVote::new(
                self.id.clone(),
                self.specialty(),
                Direction::Hold,
                0.3,
                Decimal::ZERO,
                "no range expansion",
            );
        }

        let direction = if last.is_bullish() { Direction::Long } else { Direction::Short };
        let expansion = (recent / baseline).min(4.0);
        let confidence = (0.3 + 0.1 * expansion).min(0.8);
        AgentVote::new(
            self.id.clone(),
            self.specialty(),
            direction,
            confidence,
            scaled_notional(self.base_notional, confidence),
            format!("range expanded {:.1}x, breakout {}", expansion, direction),
        )
    }
}

//! Agent Performance Book
//!
//! Tracks each agent's rolling win rate and average return and derives the
//! per-agent weight used by the consensus engine. Weights change only when an
//! outcome is recorded or external history is loaded - never inside a single
//! consensus call, which borrows the book immutably.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::regime::Regime;
use super::types::{AgentSpecialty, AgentVote};
use crate::universe::symbol_class;

/// Weighting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// EMA decay for win rate / return tracking (the weight-decay schedule)
    pub ema_alpha: f64,
    /// Multiplier applied when an agent's specialty matches the regime
    pub specialization_bonus: f64,
    /// Multiplier applied when an agent's focus tag matches the symbol class
    pub focus_bonus: f64,
    /// Weight assigned to agents with no recorded history
    pub default_weight: f64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            ema_alpha: 0.1,
            specialization_bonus: 1.2,
            focus_bonus: 1.1,
            default_weight: 0.5,
        }
    }
}

/// Rolling performance record for one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub specialty: AgentSpecialty,
    pub trade_count: u32,
    /// EMA win rate, starts at the neutral 0.5
    pub win_rate: f64,
    /// EMA of fractional per-trade return
    pub avg_return: f64,
}

impl AgentRecord {
    pub fn new(specialty: AgentSpecialty) -> Self {
        Self {
            specialty,
            trade_count: 0,
            win_rate: 0.5,
            avg_return: 0.0,
        }
    }
}

/// Per-agent historical performance store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentPerformanceBook {
    records: BTreeMap<String, AgentRecord>,
    #[serde(default)]
    config: PerformanceConfig,
}

impl AgentPerformanceBook {
    pub fn new(config: PerformanceConfig) -> Self {
        Self {
            records: BTreeMap::new(),
            config,
        }
    }

    /// Register an agent so its record exists before the first outcome
    pub fn register(&mut self, agent_id: impl Into<String>, specialty: AgentSpecialty) {
        self.records
            .entry(agent_id.into())
            .or_insert_with(|| AgentRecord::new(specialty));
    }

    /// Replace a record wholesale, e.g. from an external performance store
    pub fn set_record(&mut self, agent_id: impl Into<String>, record: AgentRecord) {
        self.records.insert(agent_id.into(), record);
    }

    pub fn get(&self, agent_id: &str) -> Option<&AgentRecord> {
        self.records.get(agent_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record a closed-trade outcome attributed to an agent's vote.
    ///
    /// Uses the warm-up EMA `alpha = min(config alpha, 1/n)` so early trades
    /// move the estimate quickly and later ones decay smoothly.
    pub fn record_outcome(&mut self, agent_id: &str, specialty: AgentSpecialty, won: bool, ret: f64) {
        let record = self
            .records
            .entry(agent_id.to_string())
            .or_insert_with(|| AgentRecord::new(specialty));

        record.trade_count += 1;
        let alpha = self.config.ema_alpha.min(1.0 / record.trade_count as f64);
        record.win_rate = record.win_rate * (1.0 - alpha) + if won { 1.0 } else { 0.0 } * alpha;
        record.avg_return = record.avg_return * (1.0 - alpha) + ret * alpha;
    }

    /// Historical weight for an agent, in [0, 1].
    ///
    /// Win rate scaled by recent average return; an agent with no record gets
    /// the configured default.
    pub fn weight(&self, agent_id: &str) -> f64 {
        match self.records.get(agent_id) {
            Some(record) => {
                let return_factor = 1.0 + record.avg_return.clamp(-0.5, 0.5);
                (record.win_rate * return_factor).clamp(0.0, 1.0)
            }
            None => self.config.default_weight,
        }
    }

    /// Bonus for specialization fit: specialty matched to the regime's
    /// strategy family, focus tag matched to the symbol class.
    pub fn specialization_bonus(&self, vote: &AgentVote, symbol: &str, regime: Regime) -> f64 {
        let mut bonus = 1.0;

        if specialty_matches_regime(vote.specialty, regime) {
            bonus *= self.config.specialization_bonus;
        }

        if let Some(focus) = &vote.focus {
            if focus == symbol_class(symbol) {
                bonus *= self.config.focus_bonus;
            } else {
                bonus /= self.config.focus_bonus;
            }
        }

        bonus
    }

    /// Format record stats for logging
    pub fn format_stats(&self) -> String {
        if self.records.is_empty() {
            return "no agent history".to_string();
        }
        let parts: Vec<String> = self
            .records
            .iter()
            .map(|(id, r)| format!("{}(n={}, wr={:.1}%)", id, r.trade_count, r.win_rate * 100.0))
            .collect();
        parts.join(" | ")
    }

    /// Save the book to a JSON file
    pub fn save(&self, path: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!("performance book saved to {}", path);
        Ok(())
    }

    /// Load the book from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let book: Self = serde_json::from_str(&json)?;
        Ok(book)
    }

    /// Load from file or start fresh if the file doesn't exist
    pub fn load_or_new<P: AsRef<Path>>(path: P, config: PerformanceConfig) -> Self {
        match Self::load(path) {
            Ok(book) => book,
            Err(_) => Self::new(config),
        }
    }
}

fn specialty_matches_regime(specialty: AgentSpecialty, regime: Regime) -> bool {
    matches!(
        (specialty, regime),
        (AgentSpecialty::Trend, Regime::TrendingBull)
            | (AgentSpecialty::Trend, Regime::TrendingBear)
            | (AgentSpecialty::MeanReversion, Regime::Ranging)
            | (AgentSpecialty::MeanReversion, Regime::LowVolatility)
            | (AgentSpecialty::Volatility, Regime::HighVolatility)
            | (AgentSpecialty::Volatility, Regime::LiquidityDriven)
            | (AgentSpecialty::Sentiment, Regime::NewsDriven)
    )
}

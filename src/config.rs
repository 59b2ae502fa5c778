//! Configuration loader
//!
//! All tunable thresholds live here rather than in code: the consensus
//! majority threshold, regime thresholds, concentration caps, risk limits,
//! breaker thresholds and query timeouts. Monetary values are plain floats
//! in the file and converted to `Decimal` at the component boundary.

use std::fs;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::core::breaker::BreakerConfig;
use crate::core::consensus::ConsensusConfig;
use crate::core::correlation::CorrelationConfig;
use crate::core::guard::RiskGuardConfig;
use crate::core::orchestrator::OrchestratorConfig;
use crate::core::performance::PerformanceConfig;
use crate::core::regime::RegimeConfig;

fn to_decimal(value: f64, fallback: Decimal) -> Decimal {
    Decimal::from_str(&value.to_string()).unwrap_or(fallback)
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub system: SystemConfig,
    #[serde(default)]
    pub consensus: ConsensusSettings,
    #[serde(default)]
    pub regime: RegimeSettings,
    #[serde(default)]
    pub correlation: CorrelationSettings,
    #[serde(default)]
    pub risk: RiskSettings,
    #[serde(default)]
    pub breaker: BreakerSettings,
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
    #[serde(default)]
    pub performance: PerformanceSettings,
    #[serde(default)]
    pub agents: AgentSettings,
    pub symbols: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SystemConfig {
    pub name: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct ConsensusSettings {
    #[serde(default = "default_majority_threshold")]
    pub majority_threshold: f64,
    #[serde(default = "default_max_symbol_notional")]
    pub max_symbol_notional: f64,
}

fn default_majority_threshold() -> f64 {
    0.55
}

fn default_max_symbol_notional() -> f64 {
    100000.0
}

impl Default for ConsensusSettings {
    fn default() -> Self {
        Self {
            majority_threshold: default_majority_threshold(),
            max_symbol_notional: default_max_symbol_notional(),
        }
    }
}

impl ConsensusSettings {
    pub fn to_config(&self) -> ConsensusConfig {
        let defaults = ConsensusConfig::default();
        ConsensusConfig {
            majority_threshold: self.majority_threshold,
            max_symbol_notional: to_decimal(self.max_symbol_notional, defaults.max_symbol_notional),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RegimeSettings {
    pub min_window: usize,
    pub short_window: usize,
    pub recent_subwindow: usize,
    pub trend_threshold: f64,
    pub high_vol_percentile: f64,
    pub low_vol_percentile: f64,
    pub news_z_threshold: f64,
    pub liquidity_z_threshold: f64,
}

impl Default for RegimeSettings {
    fn default() -> Self {
        let defaults = RegimeConfig::default();
        Self {
            min_window: defaults.min_window,
            short_window: defaults.short_window,
            recent_subwindow: defaults.recent_subwindow,
            trend_threshold: defaults.trend_threshold,
            high_vol_percentile: defaults.high_vol_percentile,
            low_vol_percentile: defaults.low_vol_percentile,
            news_z_threshold: defaults.news_z_threshold,
            liquidity_z_threshold: defaults.liquidity_z_threshold,
        }
    }
}

impl RegimeSettings {
    pub fn to_config(&self) -> RegimeConfig {
        RegimeConfig {
            min_window: self.min_window,
            short_window: self.short_window,
            recent_subwindow: self.recent_subwindow,
            trend_threshold: self.trend_threshold,
            high_vol_percentile: self.high_vol_percentile,
            low_vol_percentile: self.low_vol_percentile,
            news_z_threshold: self.news_z_threshold,
            liquidity_z_threshold: self.liquidity_z_threshold,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CorrelationSettings {
    pub directional_cap: f64,
    pub symbol_cap: f64,
    pub sector_cap: f64,
    pub medium_ratio: f64,
    pub critical_ratio: f64,
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        let defaults = CorrelationConfig::default();
        Self {
            directional_cap: defaults.directional_cap,
            symbol_cap: defaults.symbol_cap,
            sector_cap: defaults.sector_cap,
            medium_ratio: defaults.medium_ratio,
            critical_ratio: defaults.critical_ratio,
        }
    }
}

impl CorrelationSettings {
    pub fn to_config(&self) -> CorrelationConfig {
        CorrelationConfig {
            directional_cap: self.directional_cap,
            symbol_cap: self.symbol_cap,
            sector_cap: self.sector_cap,
            medium_ratio: self.medium_ratio,
            critical_ratio: self.critical_ratio,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RiskSettings {
    pub max_position_notional: f64,
    pub max_portfolio_leverage: f64,
    pub daily_loss_limit: f64,
    pub max_trades_per_day: usize,
    pub default_stop_loss_pct: f64,
    pub default_take_profit_pct: f64,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            max_position_notional: 50000.0,
            max_portfolio_leverage: 2.0,
            daily_loss_limit: 0.03,
            max_trades_per_day: 20,
            default_stop_loss_pct: 0.02,
            default_take_profit_pct: 0.04,
        }
    }
}

impl RiskSettings {
    pub fn to_config(&self) -> RiskGuardConfig {
        let defaults = RiskGuardConfig::default();
        RiskGuardConfig {
            max_position_notional: to_decimal(self.max_position_notional, defaults.max_position_notional),
            max_portfolio_leverage: to_decimal(self.max_portfolio_leverage, defaults.max_portfolio_leverage),
            daily_loss_limit: to_decimal(self.daily_loss_limit, defaults.daily_loss_limit),
            max_trades_per_day: self.max_trades_per_day,
            default_stop_loss_pct: to_decimal(self.default_stop_loss_pct, defaults.default_stop_loss_pct),
            default_take_profit_pct: to_decimal(self.default_take_profit_pct, defaults.default_take_profit_pct),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub recovery_timeout_secs: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_secs: 60,
        }
    }
}

impl BreakerSettings {
    pub fn to_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.failure_threshold,
            recovery_timeout: Duration::from_secs(self.recovery_timeout_secs),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    pub vote_timeout_ms: u64,
    pub history_len: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            vote_timeout_ms: 3000,
            history_len: 64,
        }
    }
}

impl OrchestratorSettings {
    pub fn to_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            vote_timeout: Duration::from_millis(self.vote_timeout_ms),
            history_len: self.history_len,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PerformanceSettings {
    pub ema_alpha: f64,
    pub specialization_bonus: f64,
    pub focus_bonus: f64,
    pub default_weight: f64,
    pub store_path: String,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        let defaults = PerformanceConfig::default();
        Self {
            ema_alpha: defaults.ema_alpha,
            specialization_bonus: defaults.specialization_bonus,
            focus_bonus: defaults.focus_bonus,
            default_weight: defaults.default_weight,
            store_path: "quorum_performance.json".to_string(),
        }
    }
}

impl PerformanceSettings {
    pub fn to_config(&self) -> PerformanceConfig {
        PerformanceConfig {
            ema_alpha: self.ema_alpha,
            specialization_bonus: self.specialization_bonus,
            focus_bonus: self.focus_bonus,
            default_weight: self.default_weight,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub base_notional: f64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            base_notional: 10000.0,
        }
    }
}

impl AgentSettings {
    pub fn base_notional_decimal(&self) -> Decimal {
        to_decimal(self.base_notional, Decimal::new(10000, 0))
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }
}

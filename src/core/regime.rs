//! Market Regime Classification
//!
//! Derives the prevailing regime from a trailing OHLCV window:
//! - TrendingBull / TrendingBear: drift dominates noise in a consistent direction
//! - Ranging: no drift, mid-range volatility
//! - HighVolatility / LowVolatility: realized volatility in the tails of its
//!   own trailing distribution
//! - NewsDriven: volume or price-delta z-score spike in the recent sub-window
//! - LiquidityDriven: anomalously low volume against ongoing price movement
//!
//! Classification is pure and stateless: the same window always produces the
//! same metrics. A window below the minimum length yields `Unknown` with
//! confidence 0 - absent data is a representable state, not an error.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::Candle;

const EPS: f64 = 1e-9;

/// Market regime classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regime {
    TrendingBull,
    TrendingBear,
    Ranging,
    HighVolatility,
    LowVolatility,
    NewsDriven,
    LiquidityDriven,
    Unknown,
}

impl Regime {
    /// Convert to a storable string
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::TrendingBull => "TRENDING_BULL",
            Regime::TrendingBear => "TRENDING_BEAR",
            Regime::Ranging => "RANGING",
            Regime::HighVolatility => "HIGH_VOLATILITY",
            Regime::LowVolatility => "LOW_VOLATILITY",
            Regime::NewsDriven => "NEWS_DRIVEN",
            Regime::LiquidityDriven => "LIQUIDITY_DRIVEN",
            Regime::Unknown => "UNKNOWN",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "TRENDING_BULL" => Some(Regime::TrendingBull),
            "TRENDING_BEAR" => Some(Regime::TrendingBear),
            "RANGING" => Some(Regime::Ranging),
            "HIGH_VOLATILITY" => Some(Regime::HighVolatility),
            "LOW_VOLATILITY" => Some(Regime::LowVolatility),
            "NEWS_DRIVEN" => Some(Regime::NewsDriven),
            "LIQUIDITY_DRIVEN" => Some(Regime::LiquidityDriven),
            "UNKNOWN" => Some(Regime::Unknown),
            _ => None,
        }
    }

    /// Recommended strategy family for this regime. Pure lookup.
    pub fn optimal_strategy(&self) -> &'static str {
        match self {
            Regime::TrendingBull | Regime::TrendingBear => "trend-following",
            Regime::Ranging => "mean-reversion",
            Regime::HighVolatility => "volatility-breakout",
            Regime::LowVolatility => "carry",
            Regime::NewsDriven => "event-driven",
            Regime::LiquidityDriven => "liquidity-aware",
            Regime::Unknown => "stand-aside",
        }
    }

    /// Position size multiplier for this regime at the given classification
    /// confidence. Scales linearly inside a regime-specific band; always in
    /// (0, 1.5].
    pub fn size_multiplier(&self, confidence: f64) -> f64 {
        let c = confidence.clamp(0.0, 1.0);
        let (lo, hi) = match self {
            Regime::TrendingBull | Regime::TrendingBear => (0.8, 1.3),
            Regime::Ranging => (0.4, 0.8),
            Regime::HighVolatility => (0.3, 0.6),
            Regime::LowVolatility => (0.6, 1.0),
            Regime::NewsDriven => (0.2, 0.5),
            Regime::LiquidityDriven => (0.3, 0.6),
            // Unclassified markets trade at a fixed small size
            Regime::Unknown => return 0.25,
        };
        lo + (hi - lo) * c
    }
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output of one classification pass
#[derive(Debug, Clone, Serialize)]
pub struct RegimeMetrics {
    pub regime: Regime,
    /// |short slope| relative to realized volatility
    pub trend_strength: f64,
    /// Realized volatility (std dev of per-bar returns)
    pub volatility: f64,
    /// Classification confidence in [0, 1]
    pub confidence: f64,
    /// Recommended strategy family
    pub strategy: &'static str,
    /// Position size multiplier in (0, 1.5]
    pub size_multiplier: f64,
}

impl RegimeMetrics {
    /// Metrics for a window too short to classify
    pub fn unknown() -> Self {
        Self::build(Regime::Unknown, 0.0, 0.0, 0.0)
    }

    fn build(regime: Regime, trend_strength: f64, volatility: f64, confidence: f64) -> Self {
        Self {
            regime,
            trend_strength,
            volatility,
            confidence,
            strategy: regime.optimal_strategy(),
            size_multiplier: regime.size_multiplier(confidence),
        }
    }
}

/// Classification thresholds
#[derive(Debug, Clone)]
pub struct RegimeConfig {
    /// Minimum samples (history + current) required to classify
    pub min_window: usize,
    /// Window for the short trend slope and the rolling volatility series
    pub short_window: usize,
    /// Most recent samples scanned for volume/price anomalies
    pub recent_subwindow: usize,
    /// Trend strength (|slope| / volatility) above which the market trends
    pub trend_threshold: f64,
    /// Volatility percentile above which the regime is high-volatility
    pub high_vol_percentile: f64,
    /// Volatility percentile below which the regime is low-volatility
    pub low_vol_percentile: f64,
    /// Z-score above which a volume or price delta is news-driven
    pub news_z_threshold: f64,
    /// Magnitude of negative volume z-score flagging a liquidity vacuum
    pub liquidity_z_threshold: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            min_window: 20,
            short_window: 10,
            recent_subwindow: 5,
            trend_threshold: 1.0,
            high_vol_percentile: 0.8,
            low_vol_percentile: 0.2,
            news_z_threshold: 3.0,
            liquidity_z_threshold: 1.5,
        }
    }
}

/// Stateless regime classifier
#[derive(Debug, Clone)]
pub struct RegimeClassifier {
    config: RegimeConfig,
}

impl RegimeClassifier {
    pub fn new(config: RegimeConfig) -> Self {
        Self { config }
    }

    /// Classify the current regime from the trailing window plus the latest
    /// sample. Ties between candidate regimes resolve by fixed precedence:
    /// news-driven > liquidity-driven > high-volatility > trending > ranging
    /// > low-volatility.
    pub fn classify(
        &self,
        history: &[Candle],
        current_price: Decimal,
        current_volume: Decimal,
    ) -> RegimeMetrics {
        let cfg = &self.config;

        let mut closes: Vec<f64> = history.iter().filter_map(|c| c.close.to_f64()).collect();
        let mut volumes: Vec<f64> = history.iter().filter_map(|c| c.volume.to_f64()).collect();
        closes.push(current_price.to_f64().unwrap_or(0.0));
        volumes.push(current_volume.to_f64().unwrap_or(0.0));

        let n = closes.len();
        if n < cfg.min_window || closes.iter().any(|c| *c <= 0.0) {
            return RegimeMetrics::unknown();
        }

        let returns: Vec<f64> = closes.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect();
        let volatility = std_dev(&returns);

        // Short and long trend slopes, normalized to fractional drift per bar
        let short = &closes[n - cfg.short_window.min(n)..];
        let short_slope = slope(short) / mean(short).max(EPS);
        let long_slope = slope(&closes) / mean(&closes).max(EPS);
        let trend_strength = short_slope.abs() / (volatility + EPS);

        // Latest rolling volatility ranked against its trailing distribution
        let window = cfg.short_window.min(returns.len()).max(2);
        let rolling: Vec<f64> = returns.windows(window).map(std_dev).collect();
        let latest_vol = *rolling.last().unwrap_or(&volatility);
        let vol_pct = percentile_rank(&rolling, latest_vol);

        // Volume anomalies over the recent sub-window vs the prior baseline.
        // Std floors at 10% of the baseline mean so a near-constant series
        // does not turn ordinary jitter into an infinite z-score.
        let recent = cfg.recent_subwindow.clamp(1, n - 1);
        let vol_base = &volumes[..n - recent];
        let vmean = mean(vol_base);
        let vstd = std_dev(vol_base).max(0.1 * vmean.abs()).max(EPS);
        let vol_z_last = (volumes[n - 1] - vmean) / vstd;

        // Price-delta anomalies, same construction
        let abs_rets: Vec<f64> = returns.iter().map(|r| r.abs()).collect();
        let rn = abs_rets.len();
        let ret_base = &abs_rets[..rn - recent.min(rn - 1)];
        let rmean = mean(ret_base);
        let rstd = std_dev(ret_base).max(0.1 * rmean.abs()).max(EPS);
        let last_abs_ret = abs_rets[rn - 1];
        let median_abs_ret = median(&abs_rets);

        // A news move carries volume at the same sample; a price spike on
        // shrinking volume is a liquidity vacuum, not news
        let mut news = false;
        let mut news_z = 0.0_f64;
        for j in (n - recent)..n {
            let vz = (volumes[j] - vmean) / vstd;
            let rz = if j >= 1 { (abs_rets[j - 1] - rmean) / rstd } else { 0.0 };
            if vz > cfg.news_z_threshold || (rz > cfg.news_z_threshold && vz >= 0.0) {
                news = true;
                news_z = news_z.max(vz.max(rz));
            }
        }
        let liquidity =
            vol_z_last < -cfg.liquidity_z_threshold && last_abs_ret > median_abs_ret;
        let trending = trend_strength > cfg.trend_threshold
            && short_slope.abs() > EPS
            && short_slope.signum() == long_slope.signum();

        let (regime, confidence) = if news {
            (Regime::NewsDriven, (news_z / (2.0 * cfg.news_z_threshold)).clamp(0.0, 1.0))
        } else if liquidity {
            (
                Regime::LiquidityDriven,
                (vol_z_last.abs() / (2.0 * cfg.liquidity_z_threshold)).clamp(0.0, 1.0),
            )
        } else if vol_pct > cfg.high_vol_percentile {
            (
                Regime::HighVolatility,
                ((vol_pct - cfg.high_vol_percentile) / (1.0 - cfg.high_vol_percentile))
                    .clamp(0.0, 1.0),
            )
        } else if trending {
            let regime = if short_slope > 0.0 {
                Regime::TrendingBull
            } else {
                Regime::TrendingBear
            };
            (regime, (trend_strength / (2.0 * cfg.trend_threshold)).clamp(0.0, 1.0))
        } else if vol_pct < cfg.low_vol_percentile {
            (
                Regime::LowVolatility,
                ((cfg.low_vol_percentile - vol_pct) / cfg.low_vol_percentile).clamp(0.0, 1.0),
            )
        } else {
            (
                Regime::Ranging,
                (1.0 - trend_strength / cfg.trend_threshold).clamp(0.0, 1.0),
            )
        };

        RegimeMetrics::build(regime, trend_strength, volatility, confidence)
    }
}

impl Default for RegimeClassifier {
    fn default() -> Self {
        Self::new(RegimeConfig::default())
    }
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn std_dev(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    let var = xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / xs.len() as f64;
    var.sqrt()
}

/// Least-squares slope of a series against its index
fn slope(xs: &[f64]) -> f64 {
    let n = xs.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(xs);
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in xs.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    if den < EPS {
        0.0
    } else {
        num / den
    }
}

/// Mid-rank percentile of `x` within `values`, in [0, 1].
/// Values within a relative tolerance of `x` count as ties so that a
/// near-constant series ranks mid-distribution instead of at an extreme
/// decided by floating-point noise.
fn percentile_rank(values: &[f64], x: f64) -> f64 {
    if values.is_empty() {
        return 0.5;
    }
    let tol = (x.abs() * 1e-6).max(1e-12);
    let below = values.iter().filter(|v| **v < x - tol).count() as f64;
    let equal = values.iter().filter(|v| (**v - x).abs() <= tol).count() as f64;
    (below + 0.5 * equal) / values.len() as f64
}

fn median(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

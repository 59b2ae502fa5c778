//! Trading Universe Module
//!
//! Manages the set of tradable symbols and their sector classification.
//! Sector membership feeds the correlation analyzer's concentration checks;
//! the crypto/equity split feeds agent specialization matching.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Sector classification for concentration bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sector {
    Technology,
    Finance,
    Healthcare,
    Industrial,
    Consumer,
    Energy,
    Etf,
    Crypto,
    Unknown,
}

impl std::fmt::Display for Sector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

const TECHNOLOGY: &[&str] = &[
    "AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "TSLA", "META", "NFLX", "AVGO", "ORCL",
    "ADBE", "CRM", "AMD", "INTC", "CSCO", "QCOM", "TXN", "AMAT", "MU", "LRCX",
    "NOW", "PANW", "SNOW", "CRWD", "PLTR", "UBER", "COIN", "SHOP", "PYPL",
];

const FINANCE: &[&str] = &[
    "JPM", "GS", "MS", "BAC", "WFC", "C", "SCHW", "BLK", "AXP", "V", "MA", "COF",
];

const HEALTHCARE: &[&str] = &[
    "JNJ", "PFE", "UNH", "ABBV", "MRK", "LLY", "TMO", "ABT", "AMGN", "GILD",
];

const INDUSTRIAL: &[&str] = &[
    "BA", "CAT", "GE", "HON", "UPS", "LMT", "RTX", "DE", "MMM", "FDX",
];

const CONSUMER: &[&str] = &[
    "DIS", "NKE", "SBUX", "MCD", "HD", "LOW", "TGT", "COST", "WMT", "PG", "KO", "PEP",
];

const ENERGY: &[&str] = &[
    "XOM", "CVX", "COP", "SLB", "EOG", "OXY", "PSX", "VLO", "MPC", "HAL",
];

const ETFS: &[&str] = &[
    "SPY", "QQQ", "IWM", "DIA", "SMH", "XLF", "XLE", "XLK", "GLD", "SLV",
    "USO", "TLT", "HYG", "EEM", "VXX",
];

/// Check if a symbol is crypto
pub fn is_crypto(symbol: &str) -> bool {
    symbol.ends_with("USD")
        || symbol.ends_with("USDT")
        || symbol.ends_with("BTC")
        || symbol.ends_with("ETH")
        || matches!(symbol, "BTC" | "ETH" | "XRP" | "DOGE" | "ADA" | "SOL")
}

/// Classify a symbol into its sector
pub fn sector_of(symbol: &str) -> Sector {
    let upper = symbol.to_uppercase();
    let sym = upper.as_str();
    if is_crypto(sym) {
        return Sector::Crypto;
    }
    if TECHNOLOGY.contains(&sym) {
        Sector::Technology
    } else if FINANCE.contains(&sym) {
        Sector::Finance
    } else if HEALTHCARE.contains(&sym) {
        Sector::Healthcare
    } else if INDUSTRIAL.contains(&sym) {
        Sector::Industrial
    } else if CONSUMER.contains(&sym) {
        Sector::Consumer
    } else if ENERGY.contains(&sym) {
        Sector::Energy
    } else if ETFS.contains(&sym) {
        Sector::Etf
    } else {
        Sector::Unknown
    }
}

/// Symbol class tag used for agent focus matching
pub fn symbol_class(symbol: &str) -> &'static str {
    if is_crypto(&symbol.to_uppercase()) {
        "crypto"
    } else {
        "equity"
    }
}

/// Trading universe containing all tradable symbols
#[derive(Debug, Clone)]
pub struct Universe {
    symbols: HashSet<String>,
}

impl Universe {
    /// Create universe from a list of symbols
    pub fn from_symbols(symbols: Vec<String>) -> Self {
        Self {
            symbols: symbols.into_iter().map(|s| s.to_uppercase()).collect(),
        }
    }

    /// Check if a symbol is in the universe
    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains(&symbol.to_uppercase())
    }

    /// Get all symbols as a vector (sorted for consistency)
    pub fn symbols(&self) -> Vec<String> {
        let mut syms: Vec<_> = self.symbols.iter().cloned().collect();
        syms.sort();
        syms
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sector_classification() {
        assert_eq!(sector_of("AAPL"), Sector::Technology);
        assert_eq!(sector_of("jpm"), Sector::Finance);
        assert_eq!(sector_of("XOM"), Sector::Energy);
        assert_eq!(sector_of("SPY"), Sector::Etf);
        assert_eq!(sector_of("BTCUSD"), Sector::Crypto);
        assert_eq!(sector_of("ZZZZ"), Sector::Unknown);
    }

    #[test]
    fn test_crypto_detection() {
        assert!(is_crypto("BTCUSD"));
        assert!(is_crypto("ETHUSDT"));
        assert!(is_crypto("SOL"));
        assert!(!is_crypto("AAPL"));
    }

    #[test]
    fn test_symbol_class() {
        assert_eq!(symbol_class("BTCUSD"), "crypto");
        assert_eq!(symbol_class("AAPL"), "equity");
    }

    #[test]
    fn test_universe() {
        let universe = Universe::from_symbols(vec!["aapl".to_string(), "MSFT".to_string()]);
        assert_eq!(universe.len(), 2);
        assert!(universe.contains("AAPL"));
        assert!(universe.contains("msft"));
        assert!(!universe.contains("GOOGL"));
        assert_eq!(universe.symbols(), vec!["AAPL".to_string(), "MSFT".to_string()]);
    }
}

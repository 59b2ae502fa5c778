//! Collaborator Seams
//!
//! Traits for everything the decision engine consumes from the outside:
//! market history, agent votes, portfolio snapshots and the kill-switch
//! flag. All implementations are injected into the orchestrator at
//! construction; nothing here is a global.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::core::types::{AgentSpecialty, AgentVote, Candle};
use crate::portfolio::PortfolioSnapshot;

/// Supplies trailing OHLCV history for a symbol
#[async_trait]
pub trait MarketHistoryProvider: Send + Sync {
    /// Return up to `count` samples, oldest first
    async fn history(&self, symbol: &str, count: usize) -> Result<Vec<Candle>>;
}

/// One analysis agent, consumed purely as a producer of votes
#[async_trait]
pub trait VoteProvider: Send + Sync {
    /// Stable agent identifier, also the breaker operation key suffix
    fn agent_id(&self) -> &str;

    fn specialty(&self) -> AgentSpecialty;

    /// Produce a vote for the symbol given the cycle's history snapshot.
    /// Called under a timeout; a slow agent is excluded, not awaited.
    async fn vote(&self, symbol: &str, history: &[Candle]) -> Result<AgentVote>;
}

/// Supplies the current open-position snapshot and account capital
#[async_trait]
pub trait PortfolioProvider: Send + Sync {
    async fn snapshot(&self) -> Result<PortfolioSnapshot>;
}

/// Shared kill-switch flag. Engaging it halts all new trading at the
/// guard's system layer; any in-flight cycle observes it at that checkpoint.
#[derive(Debug, Clone, Default)]
pub struct KillSwitch {
    flag: Arc<AtomicBool>,
}

impl KillSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engage(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_engaged(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// The underlying flag, for components that poll it directly
    pub fn flag(&self) -> Arc<AtomicBool> {
        self.flag.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kill_switch_toggles() {
        let kill = KillSwitch::new();
        assert!(!kill.is_engaged());

        kill.engage();
        assert!(kill.is_engaged());
        // Clones observe the same flag
        let clone = kill.clone();
        assert!(clone.is_engaged());

        kill.release();
        assert!(!clone.is_engaged());
    }

    #[test]
    fn test_flag_shared_with_guard() {
        let kill = KillSwitch::new();
        let flag = kill.flag();
        kill.engage();
        assert!(flag.load(Ordering::Relaxed));
    }
}

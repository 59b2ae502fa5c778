//! Consensus Engine
//!
//! Aggregates per-agent votes into one decision. Each vote carries an
//! effective weight of `historical weight x confidence x specialization
//! bonus`; a direction wins only when its share of total effective weight
//! exceeds the majority threshold. A weak plurality never trades.
//!
//! Given identical votes and weights the result is bit-for-bit reproducible:
//! no randomness, no wall clock, iteration in submission order.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, warn};

use super::performance::AgentPerformanceBook;
use super::regime::Regime;
use super::types::{AgentVote, ConsensusResult, Direction};

/// Consensus configuration
#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    /// Weighted share of total effective weight a direction must exceed to win
    pub majority_threshold: f64,
    /// Global per-symbol ceiling on consensus notional
    pub max_symbol_notional: Decimal,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            majority_threshold: 0.55,
            max_symbol_notional: dec!(100000),
        }
    }
}

/// Aggregates agent votes into a single decision per cycle
#[derive(Debug, Clone)]
pub struct ConsensusEngine {
    config: ConsensusConfig,
}

impl ConsensusEngine {
    pub fn new(config: ConsensusConfig) -> Self {
        Self { config }
    }

    /// Build consensus from the cycle's votes.
    ///
    /// An empty vote set yields HOLD with confidence 0 and zero notional.
    /// Malformed votes are excluded with a warning and the rest proceed.
    pub fn build_consensus(
        &self,
        votes: &[AgentVote],
        symbol: &str,
        book: &AgentPerformanceBook,
        regime: Regime,
    ) -> ConsensusResult {
        if votes.is_empty() {
            return ConsensusResult::hold(0.0);
        }

        let mut total_weight = 0.0_f64;
        let mut long_weight = 0.0_f64;
        let mut short_weight = 0.0_f64;
        let mut weighted: Vec<(f64, &AgentVote)> = Vec::with_capacity(votes.len());

        for vote in votes {
            if !vote.is_well_formed() {
                warn!(
                    "excluding malformed vote from {} (conf={}, notional={})",
                    vote.agent_id, vote.confidence, vote.notional
                );
                continue;
            }

            let weight = book.weight(&vote.agent_id)
                * vote.confidence
                * book.specialization_bonus(vote, symbol, regime);

            total_weight += weight;
            match vote.direction {
                Direction::Long => long_weight += weight,
                Direction::Short => short_weight += weight,
                Direction::Hold => {}
            }
            weighted.push((weight, vote));
        }

        if weighted.is_empty() || total_weight <= 0.0 {
            return ConsensusResult::hold(0.0);
        }

        let long_share = long_weight / total_weight;
        let short_share = short_weight / total_weight;
        let (leader, leader_share) = if long_share >= short_share {
            (Direction::Long, long_share)
        } else {
            (Direction::Short, short_share)
        };

        debug!(
            "{}: long share {:.3}, short share {:.3}, threshold {:.2}",
            symbol, long_share, short_share, self.config.majority_threshold
        );

        if leader_share <= self.config.majority_threshold {
            // No decision on a weak plurality; confidence reports how close
            // the leading direction came
            let contributing = weighted
                .iter()
                .filter(|(_, v)| v.direction == Direction::Hold)
                .count();
            let dissenting: Vec<AgentVote> = weighted
                .iter()
                .filter(|(_, v)| v.direction != Direction::Hold)
                .map(|(_, v)| (*v).clone())
                .collect();
            return ConsensusResult {
                direction: Direction::Hold,
                confidence: leader_share,
                notional: Decimal::ZERO,
                contributing,
                dissenting,
            };
        }

        // Notional: weighted average over agreeing votes, clamped by the
        // weight-scaled sum and the per-symbol ceiling
        let mut weight_sum = Decimal::ZERO;
        let mut weighted_notional_sum = Decimal::ZERO;
        let mut contributing = 0usize;
        for (weight, vote) in &weighted {
            if vote.direction != leader {
                continue;
            }
            let w = Decimal::from_f64(*weight).unwrap_or(Decimal::ZERO);
            weight_sum += w;
            weighted_notional_sum += w * vote.notional;
            contributing += 1;
        }

        let notional = if weight_sum.is_zero() {
            Decimal::ZERO
        } else {
            (weighted_notional_sum / weight_sum)
                .min(weighted_notional_sum)
                .min(self.config.max_symbol_notional)
        };

        let dissenting: Vec<AgentVote> = weighted
            .iter()
            .filter(|(_, v)| v.direction != leader)
            .map(|(_, v)| (*v).clone())
            .collect();

        ConsensusResult {
            direction: leader,
            confidence: leader_share,
            notional,
            contributing,
            dissenting,
        }
    }
}

impl Default for ConsensusEngine {
    fn default() -> Self {
        Self::new(ConsensusConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::performance::{AgentRecord, PerformanceConfig};
    use crate::core::types::AgentSpecialty;

    fn vote(id: &str, direction: Direction, confidence: f64, notional: Decimal) -> AgentVote {
        AgentVote::new(id, AgentSpecialty::Generalist, direction, confidence, notional, "test")
            .unwrap()
    }

    fn book_with_weights(weights: &[(&str, f64)]) -> AgentPerformanceBook {
        // win_rate with zero avg_return maps straight to the weight
        let mut book = AgentPerformanceBook::new(PerformanceConfig::default());
        for (id, w) in weights {
            let mut record = AgentRecord::new(AgentSpecialty::Generalist);
            record.win_rate = *w;
            book.set_record(*id, record);
        }
        book
    }

    #[test]
    fn test_empty_votes_hold_zero() {
        let engine = ConsensusEngine::default();
        let book = AgentPerformanceBook::new(PerformanceConfig::default());
        let result = engine.build_consensus(&[], "AAPL", &book, Regime::Ranging);

        assert_eq!(result.direction, Direction::Hold);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.notional, Decimal::ZERO);
    }

    #[test]
    fn test_weighted_long_majority_wins() {
        // A: LONG conf 0.9 weight 0.6; B: SHORT conf 0.8 weight 0.3;
        // C: LONG conf 0.5 weight 0.1
        // long = 0.54 + 0.05 = 0.59, short = 0.24, total = 0.83
        // long share = 0.59 / 0.83 ~ 0.711 > 0.55 -> LONG
        let engine = ConsensusEngine::default();
        let book = book_with_weights(&[("a", 0.6), ("b", 0.3), ("c", 0.1)]);
        let votes = vec![
            vote("a", Direction::Long, 0.9, dec!(10000)),
            vote("b", Direction::Short, 0.8, dec!(8000)),
            vote("c", Direction::Long, 0.5, dec!(5000)),
        ];

        let result = engine.build_consensus(&votes, "AAPL", &book, Regime::Unknown);
        assert_eq!(result.direction, Direction::Long);
        assert!((result.confidence - 0.59 / 0.83).abs() < 1e-9);
        assert!(result.confidence > 0.55);
        assert_eq!(result.contributing, 2);
        assert_eq!(result.dissenting.len(), 1);
        assert_eq!(result.dissenting[0].agent_id, "b");
    }

    #[test]
    fn test_weak_plurality_holds() {
        // Even split leaves both shares at 0.5, below the 0.55 threshold
        let engine = ConsensusEngine::default();
        let book = book_with_weights(&[("a", 0.5), ("b", 0.5)]);
        let votes = vec![
            vote("a", Direction::Long, 0.8, dec!(10000)),
            vote("b", Direction::Short, 0.8, dec!(10000)),
        ];

        let result = engine.build_consensus(&votes, "AAPL", &book, Regime::Unknown);
        assert_eq!(result.direction, Direction::Hold);
        assert!((result.confidence - 0.5).abs() < 1e-9);
        assert_eq!(result.notional, Decimal::ZERO);
        // Both directional votes are retained as dissent from the HOLD
        assert_eq!(result.dissenting.len(), 2);
    }

    #[test]
    fn test_hold_votes_dilute_majority() {
        // A strong long voter plus a heavy hold voter: the hold weight keeps
        // the long share below the threshold
        let engine = ConsensusEngine::default();
        let book = book_with_weights(&[("bull", 0.5), ("fence", 0.9)]);
        let votes = vec![
            vote("bull", Direction::Long, 0.9, dec!(10000)),
            vote("fence", Direction::Hold, 0.9, dec!(0)),
        ];

        let result = engine.build_consensus(&votes, "AAPL", &book, Regime::Unknown);
        assert_eq!(result.direction, Direction::Hold);
        // long share = 0.45 / (0.45 + 0.81)
        assert!((result.confidence - 0.45 / 1.26).abs() < 1e-9);
    }

    #[test]
    fn test_all_hold_votes() {
        let engine = ConsensusEngine::default();
        let book = book_with_weights(&[("a", 0.5), ("b", 0.5)]);
        let votes = vec![
            vote("a", Direction::Hold, 0.7, dec!(0)),
            vote("b", Direction::Hold, 0.6, dec!(0)),
        ];

        let result = engine.build_consensus(&votes, "AAPL", &book, Regime::Unknown);
        assert_eq!(result.direction, Direction::Hold);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.contributing, 2);
        assert!(result.dissenting.is_empty());
    }

    #[test]
    fn test_notional_invariant() {
        let engine = ConsensusEngine::default();
        let book = book_with_weights(&[("a", 0.6), ("b", 0.2)]);
        let votes = vec![
            vote("a", Direction::Long, 0.9, dec!(20000)),
            vote("b", Direction::Long, 0.9, dec!(10000)),
        ];

        let result = engine.build_consensus(&votes, "AAPL", &book, Regime::Unknown);
        assert_eq!(result.direction, Direction::Long);

        // notional <= sum of contributing notionals scaled by their weights
        let scaled_sum = dec!(20000) * Decimal::from_f64(0.6 * 0.9).unwrap()
            + dec!(10000) * Decimal::from_f64(0.2 * 0.9).unwrap();
        assert!(result.notional <= scaled_sum);
        assert!(result.notional <= dec!(100000));
        assert!(result.notional > Decimal::ZERO);
    }

    #[test]
    fn test_notional_ceiling() {
        let engine = ConsensusEngine::new(ConsensusConfig {
            majority_threshold: 0.55,
            max_symbol_notional: dec!(5000),
        });
        let book = book_with_weights(&[("a", 0.9)]);
        let votes = vec![vote("a", Direction::Long, 1.0, dec!(50000))];

        let result = engine.build_consensus(&votes, "AAPL", &book, Regime::Unknown);
        assert_eq!(result.direction, Direction::Long);
        assert_eq!(result.notional, dec!(5000));
    }

    #[test]
    fn test_malformed_vote_excluded() {
        let engine = ConsensusEngine::default();
        let book = book_with_weights(&[("good", 0.8), ("bad", 0.9)]);

        let mut bad = vote("bad", Direction::Short, 0.9, dec!(10000));
        bad.confidence = f64::NAN; // corrupted after construction

        let votes = vec![vote("good", Direction::Long, 0.9, dec!(10000)), bad];
        let result = engine.build_consensus(&votes, "AAPL", &book, Regime::Unknown);

        // The corrupted short vote is excluded; the long vote wins alone
        assert_eq!(result.direction, Direction::Long);
        assert_eq!(result.contributing, 1);
    }

    #[test]
    fn test_specialization_shifts_outcome() {
        // Identical opposing votes, but the trend specialist matches the
        // trending regime and outweighs the generalist
        let engine = ConsensusEngine::default();
        let book = book_with_weights(&[("trendy", 0.5), ("plain", 0.5)]);
        let votes = vec![
            AgentVote::new("trendy", AgentSpecialty::Trend, Direction::Long, 0.9, dec!(10000), "")
                .unwrap(),
            AgentVote::new("plain", AgentSpecialty::Generalist, Direction::Short, 0.9, dec!(10000), "")
                .unwrap(),
        ];

        let result = engine.build_consensus(&votes, "AAPL", &book, Regime::TrendingBull);
        // long = 0.45 * 1.2 = 0.54; short = 0.45; share = 0.54 / 0.99 ~ 0.545
        // Just below the default threshold -> HOLD, confidence reports the lead
        assert_eq!(result.direction, Direction::Hold);
        assert!(result.confidence > 0.5);
    }

    #[test]
    fn test_determinism() {
        let engine = ConsensusEngine::default();
        let book = book_with_weights(&[("a", 0.7), ("b", 0.3), ("c", 0.4)]);
        let votes = vec![
            vote("a", Direction::Long, 0.8, dec!(12000)),
            vote("b", Direction::Short, 0.6, dec!(9000)),
            vote("c", Direction::Long, 0.7, dec!(7000)),
        ];

        let first = engine.build_consensus(&votes, "AAPL", &book, Regime::Ranging);
        let second = engine.build_consensus(&votes, "AAPL", &book, Regime::Ranging);
        assert_eq!(first.direction, second.direction);
        assert_eq!(first.confidence, second.confidence);
        assert_eq!(first.notional, second.notional);
    }
}

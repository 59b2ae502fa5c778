//! Quorum - Multi-Agent Trading Decision Engine
//!
//! Turns independent, possibly-conflicting votes from autonomous analysis
//! agents into a single risk-bounded trade action per symbol per cycle.
//!
//! # Pipeline
//!
//! - Market history -> regime classification
//! - Agent votes -> weighted consensus
//! - Consensus + portfolio snapshot -> correlation risk adjustment
//! - Adjusted candidate -> layered risk guard
//! - One `TradeDecision` or `NoAction` with a reason, per cycle

pub mod core;
pub mod universe;
pub mod portfolio;
pub mod providers;
pub mod agents;
pub mod comms;
pub mod config;

//! Outbound communication with collaborators
//!
//! The engine exposes its decisions, risk violations and breaker transitions
//! as events on a bounded channel; delivery (alerting, dashboards, chat) is
//! the consumer's concern, not this core's.

pub mod events;
pub mod monitor;

pub use events::{channel, EngineEvent, EventSender};
pub use monitor::CycleMonitor;

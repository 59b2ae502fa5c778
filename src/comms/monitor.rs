//! Cycle Monitor
//!
//! Collects decision-loop counters for status reporting.

use std::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct CycleMetrics {
    pub cycles_run: u64,
    pub decisions_emitted: u64,
    pub no_actions: u64,
    pub risk_blocks: u64,
    pub circuit_rejections: u64,
}

pub struct CycleMonitor {
    start_time: Instant,
    metrics: CycleMetrics,
}

impl CycleMonitor {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            metrics: CycleMetrics::default(),
        }
    }

    pub fn record_cycle(&mut self) {
        self.metrics.cycles_run += 1;
    }

    pub fn record_decision(&mut self) {
        self.metrics.decisions_emitted += 1;
    }

    pub fn record_no_action(&mut self) {
        self.metrics.no_actions += 1;
    }

    pub fn record_risk_block(&mut self) {
        self.metrics.risk_blocks += 1;
    }

    pub fn record_circuit_rejection(&mut self) {
        self.metrics.circuit_rejections += 1;
    }

    pub fn metrics(&self) -> &CycleMetrics {
        &self.metrics
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn summary(&self) -> String {
        format!(
            "up {}s | cycles: {} | decisions: {} | no-action: {} | risk blocks: {} | circuit: {}",
            self.uptime_secs(),
            self.metrics.cycles_run,
            self.metrics.decisions_emitted,
            self.metrics.no_actions,
            self.metrics.risk_blocks,
            self.metrics.circuit_rejections,
        )
    }
}

impl Default for CycleMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let mut monitor = CycleMonitor::new();
        monitor.record_cycle();
        monitor.record_cycle();
        monitor.record_decision();
        monitor.record_no_action();
        monitor.record_risk_block();

        let m = monitor.metrics();
        assert_eq!(m.cycles_run, 2);
        assert_eq!(m.decisions_emitted, 1);
        assert_eq!(m.no_actions, 1);
        assert_eq!(m.risk_blocks, 1);
        assert_eq!(m.circuit_rejections, 0);
    }

    #[test]
    fn test_summary_format() {
        let mut monitor = CycleMonitor::new();
        monitor.record_cycle();
        let summary = monitor.summary();
        assert!(summary.contains("cycles: 1"));
        assert!(summary.contains("decisions: 0"));
    }
}

//! Observer hooks for the control loop.
//!
//! Observers see every decided cycle that the [`ReportCadence`] selects, plus
//! every dispatched jump.  They cannot influence the decision: they only
//! receive copies of the loop's output.

use dinobot_types::CycleReport;
use tracing::info;

/// Receives the control loop's output.
pub trait CycleObserver {
    /// Called for cycles selected by the loop's [`ReportCadence`].
    fn observe(&mut self, report: &CycleReport);

    /// Called after every dispatched jump with the new total.
    fn on_jump(&mut self, _action_count: u64) {}
}

/// Which cycles are forwarded to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportCadence {
    /// Forward every Nth cycle (0 disables periodic reports).
    pub every: u64,
    /// Forward every cycle with a positive verdict.
    pub on_obstacle: bool,
}

impl Default for ReportCadence {
    fn default() -> Self {
        Self {
            every: 100,
            on_obstacle: true,
        }
    }
}

impl ReportCadence {
    pub fn is_due(&self, frame_count: u64, obstacle_detected: bool) -> bool {
        (self.every > 0 && frame_count % self.every == 0)
            || (self.on_obstacle && obstacle_detected)
    }
}

/// Emits each report as a structured `tracing` event.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl CycleObserver for TracingObserver {
    fn observe(&mut self, report: &CycleReport) {
        let v = &report.verdict;
        info!(
            frame = report.frame_count,
            jumps = report.action_count,
            near_dark = v.near.dark_pixels,
            far_dark = v.far.dark_pixels,
            total_dark = v.total_dark_pixels,
            obstacle = v.obstacle_detected,
            "cycle analysed"
        );
    }

    fn on_jump(&mut self, action_count: u64) {
        info!(jump = action_count, "jump executed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cadence_fires_on_period() {
        let cadence = ReportCadence {
            every: 100,
            on_obstacle: false,
        };
        assert!(!cadence.is_due(99, false));
        assert!(cadence.is_due(100, false));
        assert!(cadence.is_due(200, false));
        assert!(!cadence.is_due(101, true));
    }

    #[test]
    fn cadence_fires_on_obstacle() {
        let cadence = ReportCadence::default();
        assert!(cadence.is_due(7, true));
        assert!(!cadence.is_due(7, false));
    }

    #[test]
    fn zero_period_disables_periodic_reports() {
        let cadence = ReportCadence {
            every: 0,
            on_obstacle: false,
        };
        assert!(!cadence.is_due(0, false));
        assert!(!cadence.is_due(100, true));
    }
}

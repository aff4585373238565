//! Console output: analysis blocks, jump notices, final statistics.

use colored::Colorize;
use std::path::Path;
use std::time::Duration;

use dinobot_runtime::CycleObserver;
use dinobot_types::{CycleReport, RunSummary};

const RULE_WIDTH: usize = 60;

/// Prints an analysis block for every reported cycle.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl CycleObserver for ConsoleReporter {
    fn observe(&mut self, report: &CycleReport) {
        println!("{}", analysis_block(report));
    }

    fn on_jump(&mut self, action_count: u64) {
        println!("{}", format!("⬆  JUMP #{action_count} executed!").bold());
    }
}

pub(crate) fn analysis_block(report: &CycleReport) -> String {
    let v = &report.verdict;
    let rule = "=".repeat(RULE_WIDTH);
    let status = if v.obstacle_detected {
        "OBSTACLE DETECTED! JUMPING!".red().bold()
    } else {
        "Clear - no obstacle".green()
    };
    [
        String::new(),
        rule.clone(),
        format!("Frame #{} | Jumps: {}", report.frame_count, report.action_count),
        rule.clone(),
        "PIXEL BREAKDOWN:".bold().to_string(),
        format!("   Near dark pixels: {}", v.near.dark_pixels),
        format!("   Far dark pixels: {}", v.far.dark_pixels),
        format!("   Total dark pixels: {}", v.total_dark_pixels),
        String::new(),
        "DETECTION LOGIC:".bold().to_string(),
        format!(
            "   Threshold: pixels < {} are dark",
            v.thresholds.dark_threshold
        ),
        format!(
            "   Trigger: a box with > {} dark pixels",
            v.thresholds.trigger_count
        ),
        String::new(),
        status.to_string(),
        rule,
    ]
    .join("\n")
}

/// Statistics for a run stopped before the first cycle.
pub(crate) fn not_started_summary(poll_interval: Duration) -> RunSummary {
    RunSummary {
        run_id: uuid::Uuid::new_v4(),
        frames: 0,
        actions: 0,
        poll_interval,
        wall_time: Duration::ZERO,
    }
}

/// Final statistics printed after the loop stops.
pub(crate) fn summary_block(summary: &RunSummary, debug_folder: Option<&Path>) -> String {
    let rule = "=".repeat(RULE_WIDTH + 10);
    let mut lines = vec![
        String::new(),
        rule.clone(),
        "BOT STOPPED".bold().to_string(),
        rule.clone(),
        "FINAL STATS:".bold().to_string(),
        format!("   Total frames processed: {}", summary.frames),
        format!("   Total jumps: {}", summary.actions),
        format!(
            "   Runtime: {:.1} seconds (estimated), {:.1} seconds (measured)",
            summary.estimated_runtime().as_secs_f64(),
            summary.wall_time.as_secs_f64()
        ),
    ];
    if let Some(folder) = debug_folder {
        lines.push(format!("   Debug images saved in: {}/", folder.display()));
    }
    lines.push(rule);
    lines.join("\n")
}

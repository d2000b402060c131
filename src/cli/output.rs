//! CLI output formatting

use crate::{
    core::{Stage, VolumeState},
    execution::ExecutionEvent,
    report::BatchSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a volume state for display
pub fn format_volume_state(state: &VolumeState) -> String {
    match state {
        VolumeState::Pending => style("PENDING").dim().to_string(),
        VolumeState::Registered | VolumeState::Normalized | VolumeState::Resampled => {
            style(state.to_string().to_uppercase()).yellow().to_string()
        }
        VolumeState::Done => style("DONE").green().to_string(),
        VolumeState::Failed { stage, .. } => {
            style(format!("FAILED ({})", stage)).red().to_string()
        }
    }
}

/// Format an execution event for display
///
/// Returns `None` for events too fine-grained for the console.
pub fn format_execution_event(event: &ExecutionEvent) -> Option<String> {
    let line = match event {
        ExecutionEvent::BatchStarted { run_id, total } => format!(
            "{} Processing {} volume(s) ({})",
            ROCKET,
            style(total).bold(),
            style(&run_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::VolumeStarted { stem, .. } => {
            format!("{} {}", SPINNER, style(stem).cyan())
        }
        ExecutionEvent::StageCompleted { .. } => return None,
        ExecutionEvent::VolumeCompleted { stem, output } => match output {
            Some(path) => format!(
                "{} {} → {}",
                CHECK,
                style(stem).green(),
                style(path.display()).dim()
            ),
            None => format!("{} {}", CHECK, style(stem).green()),
        },
        ExecutionEvent::VolumeFailed { stem, stage, error } => format!(
            "{} {} failed at {}: {}",
            CROSS,
            style(stem).red(),
            stage_label(*stage),
            style(error).dim()
        ),
        ExecutionEvent::BatchCompleted {
            succeeded, failed, ..
        } => {
            if *failed == 0 {
                format!(
                    "{} All {} volume(s) {}",
                    CHECK,
                    succeeded,
                    style("succeeded").green()
                )
            } else {
                format!(
                    "{} {} succeeded, {}",
                    WARN,
                    style(succeeded).green(),
                    style(format!("{} failed", failed)).red()
                )
            }
        }
    };
    Some(line)
}

fn stage_label(stage: Stage) -> String {
    style(stage.to_string()).yellow().to_string()
}

/// Format the batch summary for display
pub fn format_summary(summary: &BatchSummary) -> String {
    let mut lines = vec![format!(
        "{} Run {}: {} total, {} succeeded, {} failed in {}",
        INFO,
        style(&summary.run_id.to_string()[..8]).dim(),
        summary.total,
        style(summary.succeeded).green(),
        style(summary.failed).red(),
        format_duration(summary.elapsed().to_std().unwrap_or_default())
    )];

    for failure in &summary.failures {
        lines.push(format!(
            "  {} {} ({}): {}",
            CROSS,
            style(failure.input.display()).bold(),
            stage_label(failure.stage),
            style(&failure.error).dim()
        ));
    }
    lines.join("\n")
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

//! Batch summary - what happened to every input of one run

use crate::core::{Stage, VolumeOutcome};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// File name of the summary written next to the outputs
pub const SUMMARY_FILE_NAME: &str = "flairprep_summary.json";

/// One failed input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub input: PathBuf,
    pub stage: Stage,
    pub error: String,
}

/// Summary of a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Unique run ID
    pub run_id: Uuid,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    /// Number of inputs submitted
    pub total: usize,

    pub succeeded: usize,
    pub failed: usize,

    /// Failed inputs in input order
    pub failures: Vec<FailureRecord>,

    /// Per-input outcomes in input order
    pub outcomes: Vec<VolumeOutcome>,
}

impl BatchSummary {
    pub fn from_outcomes(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        outcomes: Vec<VolumeOutcome>,
    ) -> Self {
        let failures: Vec<FailureRecord> = outcomes
            .iter()
            .filter_map(|o| {
                o.failure().map(|(stage, error)| FailureRecord {
                    input: o.input.clone(),
                    stage,
                    error: error.to_string(),
                })
            })
            .collect();

        Self {
            run_id,
            started_at,
            completed_at: Utc::now(),
            total: outcomes.len(),
            succeeded: outcomes.iter().filter(|o| o.is_done()).count(),
            failed: failures.len(),
            failures,
            outcomes,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Wall-clock duration of the run
    pub fn elapsed(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }

    /// Write the summary as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize batch summary")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write batch summary to {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read batch summary {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse batch summary {}", path.display()))
    }
}

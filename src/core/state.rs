//! Per-volume pipeline state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Pipeline stage a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Rejected before any tool ran, e.g. a stem already claimed by another input
    Discovery,
    Registration,
    Normalization,
    Resampling,
    Extraction,
    /// Moving finished artifacts to their final names
    Publication,
    /// The volume's task panicked or was aborted
    Fault,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Discovery => "discovery",
            Stage::Registration => "registration",
            Stage::Normalization => "normalization",
            Stage::Resampling => "resampling",
            Stage::Extraction => "extraction",
            Stage::Publication => "publication",
            Stage::Fault => "fault",
        };
        f.write_str(name)
    }
}

/// State of one input volume
///
/// `Pending → Registered → Normalized → Resampled → Done`, or `Failed` from any
/// non-terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VolumeState {
    Pending,
    Registered,
    Normalized,
    Resampled,
    /// Brain extracted and published
    Done,
    Failed {
        stage: Stage,
        error: String,
    },
}

impl VolumeState {
    /// Check if the volume is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, VolumeState::Done | VolumeState::Failed { .. })
    }

    /// Stage that moves this state forward, if any
    pub fn next_stage(&self) -> Option<Stage> {
        match self {
            VolumeState::Pending => Some(Stage::Registration),
            VolumeState::Registered => Some(Stage::Normalization),
            VolumeState::Normalized => Some(Stage::Resampling),
            VolumeState::Resampled => Some(Stage::Extraction),
            VolumeState::Done | VolumeState::Failed { .. } => None,
        }
    }

    /// State reached once the next stage succeeds
    ///
    /// Extraction and publication together reach `Done`.
    pub fn advance(&self) -> Option<VolumeState> {
        match self {
            VolumeState::Pending => Some(VolumeState::Registered),
            VolumeState::Registered => Some(VolumeState::Normalized),
            VolumeState::Normalized => Some(VolumeState::Resampled),
            VolumeState::Resampled => Some(VolumeState::Done),
            VolumeState::Done | VolumeState::Failed { .. } => None,
        }
    }

    /// Failed state for `stage`, unless already terminal
    pub fn fail(&self, stage: Stage, error: impl Into<String>) -> Option<VolumeState> {
        if self.is_terminal() {
            return None;
        }
        Some(VolumeState::Failed {
            stage,
            error: error.into(),
        })
    }
}

impl fmt::Display for VolumeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeState::Pending => f.write_str("pending"),
            VolumeState::Registered => f.write_str("registered"),
            VolumeState::Normalized => f.write_str("normalized"),
            VolumeState::Resampled => f.write_str("resampled"),
            VolumeState::Done => f.write_str("done"),
            VolumeState::Failed { stage, .. } => write!(f, "failed({})", stage),
        }
    }
}

/// Terminal record for one input volume
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeOutcome {
    pub input: PathBuf,
    pub stem: String,
    pub state: VolumeState,

    /// Published brain-extracted volume
    pub output: Option<PathBuf>,

    /// Published registration matrix
    pub matrix: Option<PathBuf>,

    /// Published brain mask, when retained
    pub mask: Option<PathBuf>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl VolumeOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self.state, VolumeState::Done)
    }

    /// Failing stage and message, if the volume failed
    pub fn failure(&self) -> Option<(Stage, &str)> {
        match &self.state {
            VolumeState::Failed { stage, error } => Some((*stage, error.as_str())),
            _ => None,
        }
    }
}

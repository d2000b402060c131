//! Error types for the preprocessing pipeline

use crate::tools::ToolError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while preparing or running the pipeline for one batch
#[derive(Debug, Error)]
pub enum PrepError {
    /// The images directory is missing or unreadable; aborts the whole run
    #[error("Input discovery failed for {}: {reason}", path.display())]
    InputDiscovery { path: PathBuf, reason: String },

    /// An external tool failed; aborts only the current input
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The registered volume could not be loaded, normalized or written back
    #[error("Normalization failed for {}: {reason}", path.display())]
    Normalization { path: PathBuf, reason: String },

    /// A finished artifact could not be moved to its final name
    #[error("Could not publish {} as {}: {source}", from.display(), to.display())]
    Publication {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid run settings
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// A temporary artifact that could not be deleted. Logged, never fatal.
#[derive(Debug, Error)]
#[error("Could not remove artifact {}: {source}", path.display())]
pub struct ArtifactCleanupError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

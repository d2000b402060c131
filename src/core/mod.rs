//! Core domain models
//!
//! Run configuration, input volumes, per-volume state, the temporary
//! artifact scope, and the error types shared by the pipeline.

pub mod artifacts;
pub mod config;
pub mod error;
pub mod state;
pub mod volume;

pub use artifacts::{ArtifactKind, ArtifactScope};
pub use config::{MaskPolicy, ProcessingConfig, RunConfig, RunSettings, ToolPaths};
pub use error::{ArtifactCleanupError, PrepError};
pub use state::*;
pub use volume::InputVolume;

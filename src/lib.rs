//! flairprep - batch FLAIR MRI preprocessing around FSL `flirt` and `bet`

pub mod cli;
pub mod core;
pub mod execution;
pub mod imaging;
pub mod report;
pub mod tools;

// Re-export commonly used types
pub use core::{InputVolume, MaskPolicy, PrepError, ProcessingConfig, RunConfig, RunSettings};
pub use core::{Stage, VolumeOutcome, VolumeState};
pub use execution::{BatchEngine, DatasetScanner, ExecutionEvent, VolumeExecutor};
pub use report::BatchSummary;
pub use tools::{SubprocessRunner, ToolError, ToolInvocation, ToolOutput, ToolRunner};

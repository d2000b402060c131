//! External tool errors

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of an external tool invocation
///
/// Any of these aborts the current volume's pipeline only.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The program could not be started (usually: not installed or not on PATH)
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with code {code}: {stderr}")]
    NonZeroExit {
        program: String,
        code: i32,
        stderr: String,
    },

    /// Killed by a signal before reporting an exit code
    #[error("{program} was terminated abnormally: {stderr}")]
    Terminated { program: String, stderr: String },

    /// Still running at the deadline; the tool's whole process group was killed
    #[error("{program} timed out after {} seconds", .limit.as_secs_f64())]
    Timeout { program: String, limit: Duration },

    /// The child was started but waiting on it failed
    #[error("Failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool reported success but an expected file is not there
    #[error("{program} did not produce expected output {}", path.display())]
    MissingOutput { program: String, path: PathBuf },
}

//! External tool invocation
//!
//! Every external program is described by a [`ToolInvocation`] (program plus
//! argument vector, never a shell string) and executed through a
//! [`ToolRunner`]. The FSL adapters build invocations and verify the files the
//! tool was supposed to write.

pub mod error;
pub mod extraction;
pub mod registration;
pub mod resample;
pub mod subprocess;

use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::path::Path;

pub use error::ToolError;
pub use extraction::{mask_path_for, BrainExtractor};
pub use registration::Registration;
pub use resample::Resampler;
pub use subprocess::SubprocessRunner;

/// Makes FSL tools write gzipped NIfTI whatever the user's environment says
pub const FSL_OUTPUT_TYPE: (&str, &str) = ("FSLOUTPUTTYPE", "NIFTI_GZ");

/// A program and its argument vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<OsString>,
    pub env: Vec<(String, String)>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// Value following `flag` in the argument vector
    pub fn value_of(&self, flag: &str) -> Option<&OsStr> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(OsString::as_os_str)
    }

    /// Positional argument at `index` (counting every argument)
    pub fn arg_at(&self, index: usize) -> Option<&OsStr> {
        self.args.get(index).map(OsString::as_os_str)
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }

    /// Human-readable command line, for logs only
    pub fn display_command(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// Captured output of a successful tool run
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Trait for running external tools - allows for different implementations
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run the invocation to completion
    ///
    /// Implementations must return an error for a launch failure, a timeout
    /// and any non-zero or abnormal exit.
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError>;
}

/// Check that every expected output file exists
pub fn ensure_outputs(program: &str, paths: &[&Path]) -> Result<(), ToolError> {
    match paths.iter().find(|p| !p.is_file()) {
        Some(missing) => Err(ToolError::MissingOutput {
            program: program.to_string(),
            path: missing.to_path_buf(),
        }),
        None => Ok(()),
    }
}

//! Subprocess tool runner - launches external programs with a timeout

use crate::tools::{ToolError, ToolInvocation, ToolOutput, ToolRunner};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs tools as child processes
#[derive(Debug, Clone)]
pub struct SubprocessRunner {
    /// Per-invocation timeout
    timeout: Duration,
}

impl SubprocessRunner {
    /// Create a new subprocess runner
    ///
    /// # Arguments
    /// * `timeout` - How long a single tool run may take before it is killed
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ToolRunner for SubprocessRunner {
    /// Run the invocation and capture stdout/stderr
    ///
    /// # Errors
    /// Returns `ToolError` if:
    /// - The executable cannot be spawned
    /// - It exits with a non-zero status or is killed by a signal
    /// - It runs past the timeout (its process group is killed)
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        let program = invocation.program.as_str();
        debug!("Running {}", invocation.display_command());

        let mut command = Command::new(program);
        command
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // FSL wrappers such as bet fork the real worker; a group kill reaches it
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(|source| ToolError::Spawn {
            program: program.to_string(),
            source,
        })?;
        let pid = child.id();

        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| ToolError::Wait {
                program: program.to_string(),
                source,
            })?,
            Err(_) => {
                kill_process_group(program, pid);
                return Err(ToolError::Timeout {
                    program: program.to_string(),
                    limit: self.timeout,
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return match output.status.code() {
                Some(code) => {
                    warn!("{} exited with code {}: {}", program, code, stderr);
                    Err(ToolError::NonZeroExit {
                        program: program.to_string(),
                        code,
                        stderr,
                    })
                }
                None => {
                    warn!("{} terminated by signal: {}", program, stderr);
                    Err(ToolError::Terminated {
                        program: program.to_string(),
                        stderr,
                    })
                }
            };
        }

        debug!("{} finished ({} bytes of output)", program, stdout.len());

        Ok(ToolOutput { stdout, stderr })
    }
}

/// SIGKILL the group led by `pid`, children included
#[cfg(unix)]
fn kill_process_group(program: &str, pid: Option<u32>) {
    let Some(pid) = pid else {
        return;
    };
    // The child was spawned as a group leader, so its pid is the group id
    let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!("Could not kill {} (process group {}): {}", program, pid, err);
        }
    } else {
        debug!("Killed {} (process group {})", program, pid);
    }
}

// Dropping the child future kills it through kill_on_drop
#[cfg(not(unix))]
fn kill_process_group(_program: &str, _pid: Option<u32>) {}

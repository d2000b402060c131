//! Isotropic resampling with `flirt -applyisoxfm`

use crate::tools::{ensure_outputs, ToolError, ToolInvocation, ToolRunner, FSL_OUTPUT_TYPE};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Resamples a volume onto an isotropic grid in its own space
#[derive(Debug)]
pub struct Resampler<R> {
    runner: Arc<R>,
    flirt: String,
}

impl<R: ToolRunner> Resampler<R> {
    pub fn new(runner: Arc<R>, flirt: impl Into<String>) -> Self {
        Self {
            runner,
            flirt: flirt.into(),
        }
    }

    /// `flirt -in <input> -ref <input> -applyisoxfm <mm> -out <output>`
    ///
    /// The volume is its own reference, so only the grid spacing changes.
    pub fn invocation(&self, input: &Path, voxel_size_mm: f64, output: &Path) -> ToolInvocation {
        ToolInvocation::new(&self.flirt)
            .arg("-in")
            .arg(input)
            .arg("-ref")
            .arg(input)
            .arg("-applyisoxfm")
            .arg(voxel_size_mm.to_string())
            .arg("-out")
            .arg(output)
            .env(FSL_OUTPUT_TYPE.0, FSL_OUTPUT_TYPE.1)
    }

    pub async fn resample(
        &self,
        input: &Path,
        voxel_size_mm: f64,
        output: &Path,
    ) -> Result<(), ToolError> {
        debug!("Resampling {} to {} mm", input.display(), voxel_size_mm);
        let invocation = self.invocation(input, voxel_size_mm, output);
        self.runner.run(&invocation).await?;
        ensure_outputs(&self.flirt, &[output])
    }
}

//! Brain extraction with `bet`

use crate::core::volume::nifti_stem;
use crate::tools::{ensure_outputs, ToolError, ToolInvocation, ToolRunner, FSL_OUTPUT_TYPE};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Skull-strips a volume and emits its brain mask
#[derive(Debug)]
pub struct BrainExtractor<R> {
    runner: Arc<R>,
    bet: String,
}

/// Mask path `bet -m` writes for `output`: `<output stem>_mask.nii.gz`
pub fn mask_path_for(output: &Path) -> PathBuf {
    let file_name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = nifti_stem(&file_name).unwrap_or(&file_name);
    output.with_file_name(format!("{}_mask.nii.gz", stem))
}

impl<R: ToolRunner> BrainExtractor<R> {
    pub fn new(runner: Arc<R>, bet: impl Into<String>) -> Self {
        Self {
            runner,
            bet: bet.into(),
        }
    }

    /// `bet <input> <output> -f <fraction> -g <gradient> -m`
    pub fn invocation(
        &self,
        input: &Path,
        output: &Path,
        fraction: f64,
        gradient: f64,
    ) -> ToolInvocation {
        ToolInvocation::new(&self.bet)
            .arg(input)
            .arg(output)
            .arg("-f")
            .arg(fraction.to_string())
            .arg("-g")
            .arg(gradient.to_string())
            .arg("-m")
            .env(FSL_OUTPUT_TYPE.0, FSL_OUTPUT_TYPE.1)
    }

    /// Extract the brain from `input`; returns the mask path
    pub async fn extract(
        &self,
        input: &Path,
        output: &Path,
        fraction: f64,
        gradient: f64,
    ) -> Result<PathBuf, ToolError> {
        debug!("Extracting brain from {} (f={})", input.display(), fraction);
        let invocation = self.invocation(input, output, fraction, gradient);
        self.runner.run(&invocation).await?;

        let mask = mask_path_for(output);
        ensure_outputs(&self.bet, &[output, mask.as_path()])?;
        Ok(mask)
    }
}

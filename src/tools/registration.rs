//! Affine registration to the reference template with `flirt`

use crate::tools::{ensure_outputs, ToolError, ToolInvocation, ToolRunner, FSL_OUTPUT_TYPE};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Aligns a moving volume into the reference template's space
#[derive(Debug)]
pub struct Registration<R> {
    runner: Arc<R>,
    flirt: String,
}

impl<R: ToolRunner> Registration<R> {
    pub fn new(runner: Arc<R>, flirt: impl Into<String>) -> Self {
        Self {
            runner,
            flirt: flirt.into(),
        }
    }

    /// `flirt -in <moving> -ref <reference> -out <registered> -omat <matrix>`
    pub fn invocation(
        &self,
        moving: &Path,
        reference: &Path,
        registered: &Path,
        matrix: &Path,
    ) -> ToolInvocation {
        ToolInvocation::new(&self.flirt)
            .arg("-in")
            .arg(moving)
            .arg("-ref")
            .arg(reference)
            .arg("-out")
            .arg(registered)
            .arg("-omat")
            .arg(matrix)
            .env(FSL_OUTPUT_TYPE.0, FSL_OUTPUT_TYPE.1)
    }

    /// Register `moving` to `reference`, writing the volume and the affine matrix
    pub async fn register(
        &self,
        moving: &Path,
        reference: &Path,
        registered: &Path,
        matrix: &Path,
    ) -> Result<(), ToolError> {
        debug!("Registering {} to {}", moving.display(), reference.display());
        let invocation = self.invocation(moving, reference, registered, matrix);
        self.runner.run(&invocation).await?;
        ensure_outputs(&self.flirt, &[registered, matrix])
    }
}

//! Volume executor - runs the staged pipeline for one input

use crate::{
    core::{
        artifacts::remove_if_present, ArtifactKind, ArtifactScope, InputVolume, MaskPolicy, PrepError, ProcessingConfig,
        RunSettings, Stage, VolumeOutcome, VolumeState,
    },
    execution::ExecutionEvent,
    imaging::normalize_file,
    tools::{BrainExtractor, Registration, Resampler, ToolRunner},
};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Callback receiving the events of one volume
pub type EmitFn<'a> = &'a (dyn Fn(ExecutionEvent) + Send + Sync);

/// Files published under their final names
#[derive(Debug, Default)]
struct Published {
    output: Option<PathBuf>,
    matrix: Option<PathBuf>,
    mask: Option<PathBuf>,
}

/// Runs Register → Normalize → Resample → Extract → Publish for one volume
pub struct VolumeExecutor<R> {
    registration: Registration<R>,
    resampler: Resampler<R>,
    extractor: BrainExtractor<R>,
    reference: PathBuf,
    output_dir: PathBuf,
    processing: ProcessingConfig,
    mask_policy: MaskPolicy,
}

impl<R: ToolRunner> VolumeExecutor<R> {
    pub fn new(runner: Arc<R>, settings: &RunSettings) -> Self {
        Self {
            registration: Registration::new(runner.clone(), &settings.tools.flirt),
            resampler: Resampler::new(runner.clone(), &settings.tools.flirt),
            extractor: BrainExtractor::new(runner, &settings.tools.bet),
            reference: settings.reference_template.clone(),
            output_dir: settings.output_dir.clone(),
            processing: settings.processing,
            mask_policy: settings.mask_policy,
        }
    }

    /// Process one input volume to a terminal outcome
    ///
    /// Never returns an error: any stage failure becomes `Failed { stage, .. }`.
    /// Working files are released before returning, whatever the outcome.
    pub async fn process(&self, input: &InputVolume, emit: EmitFn<'_>) -> VolumeOutcome {
        let started_at = Utc::now();
        info!("Processing {}", input.path().display());
        emit(ExecutionEvent::VolumeStarted {
            stem: input.stem().to_string(),
            input: input.path().to_path_buf(),
        });

        let mut scope = ArtifactScope::new(&self.output_dir, input.stem());
        let mut state = VolumeState::Pending;

        let published = match self.run_stages(input, &mut scope, &mut state, emit).await {
            Ok(published) => published,
            Err((stage, e)) => {
                error!("{} failed at {}: {}", input.stem(), stage, e);
                if let Some(failed) = state.fail(stage, e.to_string()) {
                    state = failed;
                }
                self.discard_outputs(input);
                Published::default()
            }
        };

        for e in scope.release() {
            warn!("{}", e);
        }

        VolumeOutcome {
            input: input.path().to_path_buf(),
            stem: input.stem().to_string(),
            state,
            output: published.output,
            matrix: published.matrix,
            mask: published.mask,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Remove whatever an earlier run published under this input's final names
    ///
    /// A failed input must not leave a result behind, not even a stale one.
    pub fn discard_outputs(&self, input: &InputVolume) {
        let names = [
            input.output_file_name(),
            input.matrix_file_name(),
            input.mask_file_name(),
        ];
        for name in names {
            self.remove_stale(&self.output_dir.join(name));
        }
    }

    fn remove_stale(&self, path: &Path) {
        match remove_if_present(path) {
            Ok(true) => info!("Removed stale {}", path.display()),
            Ok(false) => {}
            Err(e) => warn!("{}", e),
        }
    }

    async fn run_stages(
        &self,
        input: &InputVolume,
        scope: &mut ArtifactScope,
        state: &mut VolumeState,
        emit: EmitFn<'_>,
    ) -> Result<Published, (Stage, PrepError)> {
        let registered = self
            .register(input, scope)
            .await
            .map_err(|e| (Stage::Registration, e))?;
        self.advance(input, state, Stage::Registration, emit);

        let normalized = self
            .normalize(&registered, scope)
            .await
            .map_err(|e| (Stage::Normalization, e))?;
        self.advance(input, state, Stage::Normalization, emit);

        let resampled = self
            .resample(&normalized, scope)
            .await
            .map_err(|e| (Stage::Resampling, e))?;
        self.advance(input, state, Stage::Resampling, emit);

        self.extract(&resampled, scope)
            .await
            .map_err(|e| (Stage::Extraction, e))?;

        let published = self
            .publish(input, scope)
            .map_err(|e| (Stage::Publication, e))?;
        self.advance(input, state, Stage::Extraction, emit);

        Ok(published)
    }

    fn advance(&self, input: &InputVolume, state: &mut VolumeState, stage: Stage, emit: EmitFn<'_>) {
        if let Some(next) = state.advance() {
            *state = next;
        }
        info!("{}: {} complete ({})", input.stem(), stage, state);
        emit(ExecutionEvent::StageCompleted {
            stem: input.stem().to_string(),
            stage,
            state: state.clone(),
        });
    }

    async fn register(
        &self,
        input: &InputVolume,
        scope: &mut ArtifactScope,
    ) -> Result<PathBuf, PrepError> {
        let registered = scope.acquire(ArtifactKind::Registered);
        let matrix = scope.acquire(ArtifactKind::RegistrationMatrix);
        self.registration
            .register(input.path(), &self.reference, &registered, &matrix)
            .await?;
        Ok(registered)
    }

    async fn normalize(
        &self,
        registered: &Path,
        scope: &mut ArtifactScope,
    ) -> Result<PathBuf, PrepError> {
        let normalized = scope.acquire(ArtifactKind::Normalized);
        let (src, dst) = (registered.to_path_buf(), normalized.clone());

        match tokio::task::spawn_blocking(move || normalize_file(&src, &dst)).await {
            Ok(result) => {
                result?;
            }
            // Let a panic reach the task boundary like any other fault
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                return Err(PrepError::Normalization {
                    path: registered.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        }
        Ok(normalized)
    }

    async fn resample(
        &self,
        normalized: &Path,
        scope: &mut ArtifactScope,
    ) -> Result<PathBuf, PrepError> {
        let resampled = scope.acquire(ArtifactKind::Resampled);
        self.resampler
            .resample(normalized, self.processing.voxel_size_mm(), &resampled)
            .await?;
        Ok(resampled)
    }

    async fn extract(&self, resampled: &Path, scope: &mut ArtifactScope) -> Result<(), PrepError> {
        let extracted = scope.acquire(ArtifactKind::Extracted);
        // Tracked up front so a partial bet run never leaves it behind
        scope.acquire(ArtifactKind::ExtractedMask);
        self.extractor
            .extract(
                resampled,
                &extracted,
                self.processing.bet_fraction(),
                self.processing.gradient(),
            )
            .await?;
        Ok(())
    }

    /// Move results to their final names, byproducts first
    ///
    /// If any rename fails, byproducts published so far are removed again so
    /// that nothing is left under a final name for a failed input.
    fn publish(&self, input: &InputVolume, scope: &mut ArtifactScope) -> Result<Published, PrepError> {
        let mut published = Published::default();

        if let Err(e) = self.publish_into(input, scope, &mut published) {
            for path in [&published.matrix, &published.mask].into_iter().flatten() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!("Could not roll back {}: {}", path.display(), e);
                }
            }
            return Err(e);
        }
        Ok(published)
    }

    fn publish_into(
        &self,
        input: &InputVolume,
        scope: &mut ArtifactScope,
        published: &mut Published,
    ) -> Result<(), PrepError> {
        published.matrix = Some(scope.publish(
            ArtifactKind::RegistrationMatrix,
            &self.output_dir.join(input.matrix_file_name()),
        )?);

        let mask = self.output_dir.join(input.mask_file_name());
        match self.mask_policy {
            MaskPolicy::Retain => {
                published.mask = Some(scope.publish(ArtifactKind::ExtractedMask, &mask)?);
            }
            // A mask kept by an earlier run would not match the new output
            MaskPolicy::Discard => self.remove_stale(&mask),
        }

        published.output = Some(scope.publish(
            ArtifactKind::Extracted,
            &self.output_dir.join(input.output_file_name()),
        )?);
        Ok(())
    }
}

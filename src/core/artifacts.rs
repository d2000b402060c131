//! Temporary working artifacts for one input volume
//!
//! Every intermediate file of a volume's pipeline is acquired through an
//! [`ArtifactScope`]. Paths are keyed by the input stem so concurrent
//! pipelines never collide, and the scope deletes whatever it still tracks
//! when it is dropped: after success, after a stage failure, and while
//! unwinding from a panic.

use crate::core::error::{ArtifactCleanupError, PrepError};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Prefix shared by every working file name
pub const TEMP_PREFIX: &str = "tmp_";

/// Kinds of intermediate file produced while processing one volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ArtifactKind {
    /// `flirt` output in template space
    Registered,
    /// `flirt -omat` affine matrix
    RegistrationMatrix,
    /// Registered volume after intensity normalization
    Normalized,
    /// Normalized volume on the isotropic grid
    Resampled,
    /// `bet` output before publication
    Extracted,
    /// `bet -m` mask before publication
    ExtractedMask,
}

impl ArtifactKind {
    /// Working file name for this kind of artifact
    pub fn file_name(&self, stem: &str) -> String {
        match self {
            ArtifactKind::Registered => format!("{TEMP_PREFIX}reg_{stem}.nii.gz"),
            ArtifactKind::RegistrationMatrix => format!("{TEMP_PREFIX}reg_{stem}_mat.mat"),
            ArtifactKind::Normalized => format!("{TEMP_PREFIX}norm_{stem}.nii.gz"),
            ArtifactKind::Resampled => format!("{TEMP_PREFIX}res_{stem}.nii.gz"),
            ArtifactKind::Extracted => format!("{TEMP_PREFIX}bet_{stem}.nii.gz"),
            // bet derives the mask name from its output name
            ArtifactKind::ExtractedMask => format!("{TEMP_PREFIX}bet_{stem}_mask.nii.gz"),
        }
    }
}

/// Owner of the intermediate files of one volume's pipeline
#[derive(Debug)]
pub struct ArtifactScope {
    work_dir: PathBuf,
    stem: String,
    tracked: BTreeMap<ArtifactKind, PathBuf>,
}

impl ArtifactScope {
    pub fn new(work_dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            work_dir: work_dir.into(),
            stem: stem.into(),
            tracked: BTreeMap::new(),
        }
    }

    /// Get the working path for `kind` and start tracking it
    ///
    /// A file left at that path by an earlier, interrupted run is removed first
    /// so that a tool which silently fails cannot be mistaken for a success.
    pub fn acquire(&mut self, kind: ArtifactKind) -> PathBuf {
        if let Some(path) = self.tracked.get(&kind) {
            return path.clone();
        }

        let path = self.work_dir.join(kind.file_name(&self.stem));
        if let Err(e) = remove_if_present(&path) {
            warn!("{}", e);
        }
        debug!("Acquired artifact {}", path.display());
        self.tracked.insert(kind, path.clone());
        path
    }

    /// Path of a tracked artifact
    pub fn path(&self, kind: ArtifactKind) -> Option<&Path> {
        self.tracked.get(&kind).map(PathBuf::as_path)
    }

    /// Paths currently owned by this scope
    pub fn tracked_paths(&self) -> Vec<PathBuf> {
        self.tracked.values().cloned().collect()
    }

    /// Move a tracked artifact to its final name and stop tracking it
    ///
    /// The rename stays inside one directory, so the final name either
    /// appears complete or not at all.
    pub fn publish(&mut self, kind: ArtifactKind, dest: &Path) -> Result<PathBuf, PrepError> {
        let from = self.tracked_for_publish(kind, dest)?;
        std::fs::rename(&from, dest).map_err(|source| PrepError::Publication {
            from: from.clone(),
            to: dest.to_path_buf(),
            source,
        })?;
        self.tracked.remove(&kind);
        debug!("Published {} as {}", from.display(), dest.display());
        Ok(dest.to_path_buf())
    }

    fn tracked_for_publish(&self, kind: ArtifactKind, dest: &Path) -> Result<PathBuf, PrepError> {
        self.tracked
            .get(&kind)
            .cloned()
            .ok_or_else(|| PrepError::Publication {
                from: self.work_dir.join(kind.file_name(&self.stem)),
                to: dest.to_path_buf(),
                source: std::io::Error::new(ErrorKind::NotFound, "artifact was never acquired"),
            })
    }

    /// Delete every tracked artifact
    ///
    /// Already-absent files are not errors. Files that cannot be deleted are
    /// reported and forgotten; they never fail the pipeline.
    pub fn release(&mut self) -> Vec<ArtifactCleanupError> {
        let mut errors = Vec::new();
        for (_, path) in std::mem::take(&mut self.tracked) {
            match remove_if_present(&path) {
                Ok(true) => debug!("Removed artifact {}", path.display()),
                Ok(false) => {}
                Err(e) => errors.push(e),
            }
        }
        errors
    }
}

impl Drop for ArtifactScope {
    fn drop(&mut self) {
        for e in self.release() {
            warn!("{}", e);
        }
    }
}

/// Returns whether a file was actually removed
pub(crate) fn remove_if_present(path: &Path) -> Result<bool, ArtifactCleanupError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(source) => Err(ArtifactCleanupError {
            path: path.to_path_buf(),
            source,
        }),
    }
}

//! Input volumes and the file names derived from them

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Extensions accepted as NIfTI input, longest first
pub const NIFTI_EXTENSIONS: [&str; 2] = [".nii.gz", ".nii"];

/// Suffix forced onto every published volume
pub const OUTPUT_EXTENSION: &str = ".nii.gz";

/// A volume discovered in the dataset, identified by its stem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputVolume {
    path: PathBuf,
    stem: String,
}

impl InputVolume {
    /// Build an input volume from a `.nii` or `.nii.gz` path
    ///
    /// Returns `None` if the file name is not UTF-8, has another extension,
    /// or has nothing left once the extension is removed.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let file_name = path.file_name()?.to_str()?;
        let stem = nifti_stem(file_name)?.to_string();
        Some(Self { path, stem })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// `<stem>.nii.gz`, whatever the input extension was
    pub fn output_file_name(&self) -> String {
        format!("{}{}", self.stem, OUTPUT_EXTENSION)
    }

    /// `<stem>_mat.mat`
    pub fn matrix_file_name(&self) -> String {
        format!("{}_mat.mat", self.stem)
    }

    /// `<stem>_mask.nii.gz`
    pub fn mask_file_name(&self) -> String {
        format!("{}_mask{}", self.stem, OUTPUT_EXTENSION)
    }
}

/// Strip a NIfTI extension from a file name
pub fn nifti_stem(file_name: &str) -> Option<&str> {
    NIFTI_EXTENSIONS
        .iter()
        .find_map(|ext| file_name.strip_suffix(ext))
        .filter(|stem| !stem.is_empty())
}

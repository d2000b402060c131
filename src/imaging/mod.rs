//! In-process image handling: NIfTI I/O and intensity normalization

pub mod nifti_io;
pub mod normalize;

pub use nifti_io::{NiftiVolume, VolumeError};
pub use normalize::{normalize_file, zscore_foreground, ForegroundStats, NormalizationReport};

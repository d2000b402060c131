//! NIfTI volume I/O
//!
//! Loads `.nii` / `.nii.gz` files into a float64 ndarray and writes them back
//! with the original header, so the affine (sform/qform), voxel sizes and the
//! remaining metadata survive every in-process stage untouched.

use ndarray::ArrayD;
use nifti::volume::ndarray::IntoNdArray;
use nifti::writer::WriterOptions;
use nifti::{NiftiHeader, NiftiObject, ReaderOptions};
use std::path::Path;
use thiserror::Error;

/// Errors while reading or writing a NIfTI file
#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: nifti::NiftiError,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: nifti::NiftiError,
    },
}

/// A volume held in memory: header plus voxel values in float64
#[derive(Debug, Clone)]
pub struct NiftiVolume {
    pub header: NiftiHeader,
    pub data: ArrayD<f64>,
}

impl NiftiVolume {
    /// Create a volume from a header and voxel data
    pub fn new(header: NiftiHeader, data: ArrayD<f64>) -> Self {
        Self { header, data }
    }

    /// Load a volume; gzip is picked from the `.gz` extension
    ///
    /// Values are returned with the header's slope/intercept already applied.
    pub fn load(path: &Path) -> Result<Self, VolumeError> {
        let read_err = |source| VolumeError::Read {
            path: path.display().to_string(),
            source,
        };

        let obj = ReaderOptions::new().read_file(path).map_err(read_err)?;
        let header = obj.header().clone();
        let data = obj.into_volume().into_ndarray::<f64>().map_err(read_err)?;

        Ok(Self { header, data })
    }

    /// Write the volume as float64, keeping every other header field
    ///
    /// The data already carries any scaling, so slope and intercept are reset.
    pub fn save(&self, path: &Path) -> Result<(), VolumeError> {
        let mut header = self.header.clone();
        header.scl_slope = 1.0;
        header.scl_inter = 0.0;

        WriterOptions::new(path)
            .reference_header(&header)
            .write_nifti(&self.data)
            .map_err(|source| VolumeError::Write {
                path: path.display().to_string(),
                source,
            })
    }

    /// Same header, new voxel values
    pub fn with_data(&self, data: ArrayD<f64>) -> Self {
        Self {
            header: self.header.clone(),
            data,
        }
    }
}

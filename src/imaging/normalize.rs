//! Foreground z-score intensity normalization

use crate::core::PrepError;
use crate::imaging::NiftiVolume;
use ndarray::{Array, ArrayBase, Data, Dimension};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

/// Statistics over foreground voxels (value strictly greater than zero)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForegroundStats {
    pub count: usize,
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
}

/// What normalization did to a volume
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum NormalizationReport {
    /// Foreground rescaled to zero mean and unit variance
    Applied(ForegroundStats),
    /// Degenerate foreground (empty, constant, or non-finite spread); data unchanged
    Skipped(Option<ForegroundStats>),
}

/// Mean and standard deviation over voxels `> 0`, or `None` without foreground
pub fn foreground_stats<S, D>(data: &ArrayBase<S, D>) -> Option<ForegroundStats>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let (count, sum) = data
        .iter()
        .filter(|v| **v > 0.0)
        .fold((0usize, 0.0f64), |(n, s), v| (n + 1, s + v));

    if count == 0 {
        return None;
    }

    let mean = sum / count as f64;
    let sum_sq = data
        .iter()
        .filter(|v| **v > 0.0)
        .map(|v| (v - mean) * (v - mean))
        .sum::<f64>();

    Some(ForegroundStats {
        count,
        mean,
        std: (sum_sq / count as f64).sqrt(),
    })
}

/// Z-score the foreground of `data`, returning a new array
///
/// Voxels `<= 0` (and NaN) are copied through bit for bit. When the foreground
/// spread is zero or not finite, every value is copied unchanged instead of
/// dividing by it.
pub fn zscore_foreground<S, D>(data: &ArrayBase<S, D>) -> (Array<f64, D>, NormalizationReport)
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let stats = foreground_stats(data);
    match stats {
        Some(stats) if stats.std > 0.0 && stats.std.is_finite() => {
            let ForegroundStats { mean, std, .. } = stats;
            let normalized = data.mapv(|v| if v > 0.0 { (v - mean) / std } else { v });
            (normalized, NormalizationReport::Applied(stats))
        }
        _ => (data.to_owned(), NormalizationReport::Skipped(stats)),
    }
}

/// Normalize a volume, keeping its header
pub fn normalize_volume(volume: &NiftiVolume) -> (NiftiVolume, NormalizationReport) {
    let (data, report) = zscore_foreground(&volume.data);
    (volume.with_data(data), report)
}

/// Load `input`, normalize it and write the result to `output`
pub fn normalize_file(input: &Path, output: &Path) -> Result<NormalizationReport, PrepError> {
    let to_error = |reason: String| PrepError::Normalization {
        path: input.to_path_buf(),
        reason,
    };

    let volume = NiftiVolume::load(input).map_err(|e| to_error(e.to_string()))?;
    let (normalized, report) = normalize_volume(&volume);

    match &report {
        NormalizationReport::Applied(stats) => debug!(
            "Normalized {} foreground voxels (mean {:.4}, std {:.4})",
            stats.count,
            stats.mean,
            stats.std
        ),
        NormalizationReport::Skipped(stats) => info!(
            "Foreground of {} has no spread ({} voxels), intensities left unchanged",
            input.display(),
            stats.map(|s| s.count).unwrap_or(0)
        ),
    }

    normalized
        .save(output)
        .map_err(|e| to_error(e.to_string()))?;
    Ok(report)
}

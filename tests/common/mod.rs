//! Shared fixtures for the pipeline scenarios

#![allow(dead_code)]


pub use mock_fsl::{Fault, MockFsl, Tool};

use flairprep::core::{MaskPolicy, RunConfig, RunSettings, VolumeOutcome};
use flairprep::imaging::NiftiVolume;
use flairprep::{BatchEngine, BatchSummary, InputVolume};
use ndarray::{ArrayD, IxDyn};
use nifti::NiftiHeader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Shape of every synthetic volume
pub const SHAPE: [usize; 3] = [4, 4, 4];

/// A dataset directory with `images/`, an output directory and a reference
pub struct Dataset {
    pub root: TempDir,
}

impl Dataset {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("images")).unwrap();
        std::fs::create_dir(root.path().join("out")).unwrap();
        let dataset = Self { root };
        write_volume(&dataset.reference(), &brain_values(100.0));
        dataset
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn images(&self) -> PathBuf {
        self.root.path().join("images")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.path().join("out")
    }

    pub fn reference(&self) -> PathBuf {
        self.root.path().join("MNI152_T1_1mm.nii.gz")
    }

    /// Write a FLAIR-like volume into `images/` and return it as an input
    pub fn add_volume(&self, file_name: &str) -> InputVolume {
        self.add_volume_with(file_name, &brain_values(50.0))
    }

    pub fn add_volume_with(&self, file_name: &str, values: &[f64]) -> InputVolume {
        let path = self.images().join(file_name);
        write_volume(&path, values);
        InputVolume::from_path(path).unwrap()
    }

    pub fn config(&self) -> RunConfig {
        RunConfig {
            reference_template: Some(self.reference()),
            output_dir: Some(self.output_dir()),
            ..RunConfig::default()
        }
    }

    pub fn settings(&self) -> RunSettings {
        self.config().resolve().unwrap()
    }

    pub fn settings_with(&self, jobs: usize, mask_policy: MaskPolicy) -> RunSettings {
        RunConfig {
            jobs: Some(jobs),
            mask_policy: Some(mask_policy),
            ..self.config()
        }
        .resolve()
        .unwrap()
    }

    /// Sorted file names in the output directory
    pub fn output_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.output_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Working files still present in the output directory
    pub fn leftover_temp_files(&self) -> Vec<String> {
        self.output_files()
            .into_iter()
            .filter(|n| n.starts_with("tmp_"))
            .collect()
    }
}

/// Background of zeros with a varied positive block in the middle
pub fn brain_values(scale: f64) -> Vec<f64> {
    let mut values = vec![0.0; SHAPE.iter().product()];
    for (i, v) in values.iter_mut().enumerate() {
        let (x, y, z) = (i / 16, (i / 4) % 4, i % 4);
        if (1..3).contains(&x) && (1..3).contains(&y) {
            *v = scale + (z as f64) * 7.0 + (x * y) as f64;
        }
    }
    values
}

pub fn write_volume(path: &Path, values: &[f64]) {
    let mut header = NiftiHeader::default();
    header.sform_code = 1;
    header.srow_x = [1.0, 0.0, 0.0, -2.0];
    header.srow_y = [0.0, 1.0, 0.0, -2.0];
    header.srow_z = [0.0, 0.0, 1.0, -2.0];
    header.pixdim = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];

    let data = ArrayD::from_shape_vec(IxDyn(&SHAPE), values.to_vec()).unwrap();
    NiftiVolume::new(header, data).save(path).unwrap();
}

pub fn read_values(path: &Path) -> Vec<f64> {
    NiftiVolume::load(path).unwrap().data.iter().copied().collect()
}

/// Run a batch through the mock tools
pub async fn run_batch(
    settings: &RunSettings,
    tools: Arc<MockFsl>,
    inputs: Vec<InputVolume>,
) -> BatchSummary {
    BatchEngine::new(tools, settings).run(inputs).await
}

pub fn outcome_for<'a>(summary: &'a BatchSummary, stem: &str) -> &'a VolumeOutcome {
    summary
        .outcomes
        .iter()
        .find(|o| o.stem == stem)
        .unwrap_or_else(|| panic!("no outcome for {}", stem))
}

pub fn assert_done(outcome: &VolumeOutcome) {
    assert!(
        outcome.is_done(),
        "{} should be done, got {}: {:?}",
        outcome.stem,
        outcome.state,
        outcome.failure()
    );
    let output = outcome.output.as_ref().expect("done volume has an output");
    assert!(output.is_file(), "{} missing", output.display());
}

/// Mean and population std over the given values
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

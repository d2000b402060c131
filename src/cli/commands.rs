//! CLI command definitions

use crate::core::{MaskPolicy, RunConfig};
use clap::Args;
use std::path::PathBuf;

/// Preprocess a dataset
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Dataset directory; inputs are read from its `images` sub-directory
    #[arg(short, long)]
    pub dataset_dir: PathBuf,

    /// Path to a YAML run configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Reference template volume
    #[arg(long)]
    pub ref_template: Option<PathBuf>,

    /// Directory receiving the outputs
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Isotropic voxel size in mm
    #[arg(long)]
    pub voxel_size: Option<f64>,

    /// bet fractional intensity threshold, in (0, 1]
    #[arg(long)]
    pub bet_frac: Option<f64>,

    /// Number of volumes processed concurrently
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Per-tool timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Keep or delete the brain mask
    #[arg(long, value_enum)]
    pub mask_policy: Option<MaskPolicyArg>,

    /// Don't write the batch summary JSON
    #[arg(long)]
    pub no_summary: bool,
}

impl RunCommand {
    /// Flags given on the command line, as a config layer
    pub fn overrides(&self) -> RunConfig {
        RunConfig {
            reference_template: self.ref_template.clone(),
            output_dir: self.output_dir.clone(),
            voxel_size: self.voxel_size,
            bet_fraction: self.bet_frac,
            jobs: self.jobs,
            tool_timeout_secs: self.timeout,
            mask_policy: self.mask_policy.map(MaskPolicy::from),
            ..RunConfig::default()
        }
    }
}

/// List candidate inputs
#[derive(Debug, Args, Clone)]
pub struct ScanCommand {
    /// Dataset directory; inputs are read from its `images` sub-directory
    #[arg(short, long)]
    pub dataset_dir: PathBuf,

    /// Path to a YAML run configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Validate the run configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to a YAML run configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Mask policy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MaskPolicyArg {
    Retain,
    Discard,
}

impl From<MaskPolicyArg> for MaskPolicy {
    fn from(arg: MaskPolicyArg) -> Self {
        match arg {
            MaskPolicyArg::Retain => MaskPolicy::Retain,
            MaskPolicyArg::Discard => MaskPolicy::Discard,
        }
    }
}

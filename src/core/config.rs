//! Run configuration from YAML and command-line overrides

use crate::core::error::PrepError;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// `bet -g` vertical gradient. Fixed for every run.
pub const BET_GRADIENT: f64 = 0.0;

pub const DEFAULT_REFERENCE_TEMPLATE: &str = "./resources/MNI152_T1_1mm.nii.gz";
pub const DEFAULT_OUTPUT_DIR: &str = "./Processed";
pub const DEFAULT_VOXEL_SIZE_MM: f64 = 1.0;
pub const DEFAULT_BET_FRACTION: f64 = 0.5;
pub const DEFAULT_JOBS: usize = 1;
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 3600;
pub const DEFAULT_NAME_PATTERN: &str = "(?i)flair";

/// Config file looked up in the working directory when `--config` is absent
pub const LOCAL_CONFIG_FILE: &str = "flairprep.yaml";

/// Per-run processing parameters shared read-only by every pipeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProcessingConfig {
    voxel_size_mm: f64,
    bet_fraction: f64,
}

impl ProcessingConfig {
    /// Create a validated processing config
    ///
    /// `voxel_size_mm` must be finite and positive, `bet_fraction` must lie in (0, 1].
    pub fn new(voxel_size_mm: f64, bet_fraction: f64) -> Result<Self, PrepError> {
        if !voxel_size_mm.is_finite() || voxel_size_mm <= 0.0 {
            return Err(PrepError::Config(format!(
                "voxel size must be a positive number of millimetres, got {}",
                voxel_size_mm
            )));
        }
        if !(bet_fraction > 0.0 && bet_fraction <= 1.0) {
            return Err(PrepError::Config(format!(
                "bet fraction must be in (0, 1], got {}",
                bet_fraction
            )));
        }
        Ok(Self {
            voxel_size_mm,
            bet_fraction,
        })
    }

    pub fn voxel_size_mm(&self) -> f64 {
        self.voxel_size_mm
    }

    pub fn bet_fraction(&self) -> f64 {
        self.bet_fraction
    }

    pub fn gradient(&self) -> f64 {
        BET_GRADIENT
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            voxel_size_mm: DEFAULT_VOXEL_SIZE_MM,
            bet_fraction: DEFAULT_BET_FRACTION,
        }
    }
}

/// What happens to the brain mask written by `bet -m`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskPolicy {
    /// Publish the mask next to the output as `<stem>_mask.nii.gz`
    #[default]
    Retain,
    /// Delete the mask together with the other intermediates
    Discard,
}

/// Program names or paths of the external FSL tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    #[serde(default = "default_flirt")]
    pub flirt: String,

    #[serde(default = "default_bet")]
    pub bet: String,
}

fn default_flirt() -> String {
    "flirt".to_string()
}

fn default_bet() -> String {
    "bet".to_string()
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            flirt: default_flirt(),
            bet: default_bet(),
        }
    }
}

/// Run configuration as written in YAML. Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default)]
    pub reference_template: Option<PathBuf>,

    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Target isotropic voxel size in mm
    #[serde(default)]
    pub voxel_size: Option<f64>,

    /// `bet -f` fractional intensity threshold
    #[serde(default)]
    pub bet_fraction: Option<f64>,

    /// Number of volumes processed concurrently
    #[serde(default)]
    pub jobs: Option<usize>,

    /// Timeout for every external tool invocation (in seconds)
    #[serde(default)]
    pub tool_timeout_secs: Option<u64>,

    #[serde(default)]
    pub mask_policy: Option<MaskPolicy>,

    /// Regex a file name must match to be picked up by the scanner
    #[serde(default)]
    pub name_pattern: Option<String>,

    #[serde(default)]
    pub tools: Option<ToolPaths>,
}

impl RunConfig {
    /// Load run configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse run configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to an empty mapping
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: RunConfig = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Load the explicit config file, or the first default location that exists
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match default_config_path() {
            Some(path) => {
                tracing::debug!("Using config file {}", path.display());
                Self::from_file(path)
            }
            None => Ok(Self::default()),
        }
    }

    /// Overlay `other` on top of `self`; values set in `other` win
    pub fn overlay(self, other: RunConfig) -> Self {
        Self {
            reference_template: other.reference_template.or(self.reference_template),
            output_dir: other.output_dir.or(self.output_dir),
            voxel_size: other.voxel_size.or(self.voxel_size),
            bet_fraction: other.bet_fraction.or(self.bet_fraction),
            jobs: other.jobs.or(self.jobs),
            tool_timeout_secs: other.tool_timeout_secs.or(self.tool_timeout_secs),
            mask_policy: other.mask_policy.or(self.mask_policy),
            name_pattern: other.name_pattern.or(self.name_pattern),
            tools: other.tools.or(self.tools),
        }
    }

    /// Fill in defaults and validate, producing the settings for one run
    pub fn resolve(self) -> Result<RunSettings> {
        let processing = ProcessingConfig::new(
            self.voxel_size.unwrap_or(DEFAULT_VOXEL_SIZE_MM),
            self.bet_fraction.unwrap_or(DEFAULT_BET_FRACTION),
        )?;

        let jobs = self.jobs.unwrap_or(DEFAULT_JOBS);
        if jobs == 0 {
            anyhow::bail!("jobs must be at least 1");
        }

        let tool_timeout_secs = self.tool_timeout_secs.unwrap_or(DEFAULT_TOOL_TIMEOUT_SECS);
        if tool_timeout_secs == 0 {
            anyhow::bail!("tool_timeout_secs must be at least 1");
        }

        let pattern = self
            .name_pattern
            .unwrap_or_else(|| DEFAULT_NAME_PATTERN.to_string());
        let name_pattern = Regex::new(&pattern)
            .with_context(|| format!("Invalid name_pattern '{}'", pattern))?;

        let tools = self.tools.unwrap_or_default();
        if tools.flirt.trim().is_empty() || tools.bet.trim().is_empty() {
            anyhow::bail!("tool paths must not be empty");
        }

        Ok(RunSettings {
            reference_template: self
                .reference_template
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REFERENCE_TEMPLATE)),
            output_dir: self
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            processing,
            jobs,
            tool_timeout_secs,
            mask_policy: self.mask_policy.unwrap_or_default(),
            name_pattern,
            tools,
        })
    }
}

/// `./flairprep.yaml`, then `<config dir>/flairprep/config.yaml`
fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("flairprep").join("config.yaml"))
        .filter(|path| path.is_file())
}

/// Fully resolved, validated settings for one run. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct RunSettings {
    pub reference_template: PathBuf,
    pub output_dir: PathBuf,
    pub processing: ProcessingConfig,
    pub jobs: usize,
    pub tool_timeout_secs: u64,
    pub mask_policy: MaskPolicy,
    #[serde(serialize_with = "serialize_regex")]
    pub name_pattern: Regex,
    pub tools: ToolPaths,
}

impl RunSettings {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// Check that the reference template exists before any volume is touched
    pub fn check_reference(&self) -> Result<()> {
        if !self.reference_template.is_file() {
            anyhow::bail!(
                "Reference template not found: {}",
                self.reference_template.display()
            );
        }
        Ok(())
    }
}

fn serialize_regex<S: Serializer>(regex: &Regex, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(regex.as_str())
}

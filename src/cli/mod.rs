//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{RunCommand, ScanCommand, ValidateCommand};
use std::ffi::OsString;

/// Batch FLAIR MRI preprocessing with FSL
#[derive(Debug, Parser, Clone)]
#[command(name = "flairprep")]
#[command(author = "flairprep contributors")]
#[command(version)]
#[command(
    about = "Register, normalize, resample and skull-strip FLAIR volumes",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Preprocess every FLAIR volume of a dataset
    Run(RunCommand),

    /// List the volumes a run would process
    Scan(ScanCommand),

    /// Check the merged settings and the reference template
    Validate(ValidateCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

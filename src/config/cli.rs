//! Command-line argument parsing
//!
//! Arguments are grouped by category for clarity.

use clap::Parser;
use std::path::PathBuf;

/// Stream records out of an indexed sample repository
#[derive(Parser, Debug, Clone)]
#[command(name = "datarepo-read")]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    // ===== Source Options =====
    /// Data file, or a per-sample file pattern such as img_%02d.png
    #[arg(short = 'l', long = "location")]
    pub location: PathBuf,

    /// Index document describing the data file (JSON, or YAML by extension)
    #[arg(short = 'j', long = "json")]
    pub json: Option<PathBuf>,

    /// Inline format descriptor, used when no index document is given
    #[arg(long = "caps")]
    pub caps: Option<String>,

    // ===== Iteration Options =====
    /// First sample index to read
    #[arg(long = "start", default_value_t = 0, allow_negative_numbers = true)]
    pub start_sample_index: i64,

    /// Last sample index to read (inclusive, defaults to the last sample)
    #[arg(long = "stop", allow_negative_numbers = true)]
    pub stop_sample_index: Option<i64>,

    /// Number of passes over the sample range
    #[arg(short = 'e', long = "epochs", default_value_t = 1, allow_negative_numbers = true)]
    pub epochs: i64,

    /// Tensors to emit and their order, e.g. "1,0"
    #[arg(short = 't', long = "tensors-sequence")]
    pub tensors_sequence: Option<String>,

    /// Read samples in ascending order instead of shuffling each epoch
    #[arg(long = "no-shuffle")]
    pub no_shuffle: bool,

    /// Seed for reproducible shuffling
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    // ===== Output Options =====
    /// Write records (raw bytes, concatenated) to this file
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    /// Verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Quiet mode (only errors)
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl CliArgs {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate argument combinations
    pub fn validate(&self) -> Result<(), String> {
        if self.json.is_none() && self.caps.is_none() {
            return Err("either --json or --caps must be specified".to_string());
        }

        if self.verbose && self.quiet {
            return Err("--verbose and --quiet are mutually exclusive".to_string());
        }

        Ok(())
    }
}

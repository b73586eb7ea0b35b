//! Reader options
//!
//! Scalar options are clamped at set time: a value outside its domain
//! (a negative index, an epoch count below one) reverts to the default and
//! is logged. Whether the options make sense together is only checked when
//! a session starts.

use std::path::{Path, PathBuf};

use tracing::warn;

use super::cli::CliArgs;
use crate::sampling::TensorSelection;
use crate::utils::Result;

pub const DEFAULT_START_SAMPLE_INDEX: u64 = 0;
pub const DEFAULT_STOP_SAMPLE_INDEX: u64 = 0;
pub const DEFAULT_EPOCHS: u32 = 1;
pub const DEFAULT_SHUFFLE: bool = true;

/// Options of one reader
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderConfig {
    location: Option<PathBuf>,
    index_path: Option<PathBuf>,
    descriptor: Option<String>,
    start_sample_index: u64,
    stop_sample_index: u64,
    epochs: u32,
    /// `None` selects every tensor in declared order
    tensors_sequence: Option<TensorSelection>,
    shuffle: bool,
    seed: Option<u64>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            location: None,
            index_path: None,
            descriptor: None,
            start_sample_index: DEFAULT_START_SAMPLE_INDEX,
            stop_sample_index: DEFAULT_STOP_SAMPLE_INDEX,
            epochs: DEFAULT_EPOCHS,
            tensors_sequence: None,
            shuffle: DEFAULT_SHUFFLE,
            seed: None,
        }
    }
}

impl ReaderConfig {
    /// Options for a data file described by an index document
    pub fn with_index<P1: AsRef<Path>, P2: AsRef<Path>>(location: P1, index_path: P2) -> Self {
        Self {
            location: Some(location.as_ref().to_path_buf()),
            index_path: Some(index_path.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    /// Options for a data file described by an inline format descriptor
    pub fn with_descriptor<P: AsRef<Path>>(location: P, descriptor: &str) -> Self {
        Self {
            location: Some(location.as_ref().to_path_buf()),
            descriptor: Some(descriptor.to_string()),
            ..Self::default()
        }
    }

    /// Create configuration from CLI arguments
    pub fn from_cli(args: &CliArgs) -> Result<Self> {
        let mut config = Self {
            location: Some(args.location.clone()),
            index_path: args.json.clone(),
            descriptor: args.caps.clone(),
            shuffle: !args.no_shuffle,
            seed: args.seed,
            ..Self::default()
        };
        config.set_start_sample_index(args.start_sample_index);
        if let Some(stop) = args.stop_sample_index {
            config.set_stop_sample_index(stop);
        }
        config.set_epochs(args.epochs);
        if let Some(ref seq) = args.tensors_sequence {
            config.set_tensors_sequence(seq)?;
        }
        Ok(config)
    }

    // === Setters ===

    pub fn set_location<P: AsRef<Path>>(&mut self, location: P) {
        self.location = Some(location.as_ref().to_path_buf());
    }

    pub fn set_index_path(&mut self, index_path: Option<PathBuf>) {
        self.index_path = index_path;
    }

    pub fn set_descriptor(&mut self, descriptor: Option<String>) {
        self.descriptor = descriptor;
    }

    /// Set the first sample index; negative values revert to 0
    pub fn set_start_sample_index(&mut self, value: i64) {
        self.start_sample_index =
            clamp_index("start-sample-index", value, DEFAULT_START_SAMPLE_INDEX);
    }

    /// Set the last sample index (inclusive); negative values revert to 0
    pub fn set_stop_sample_index(&mut self, value: i64) {
        self.stop_sample_index =
            clamp_index("stop-sample-index", value, DEFAULT_STOP_SAMPLE_INDEX);
    }

    /// Set the epoch count; values below 1 revert to 1
    pub fn set_epochs(&mut self, value: i64) {
        self.epochs = match u32::try_from(value) {
            Ok(v) if v >= 1 => v,
            _ => {
                warn!(
                    "epochs value {} is out of range, using default {}",
                    value, DEFAULT_EPOCHS
                );
                DEFAULT_EPOCHS
            }
        };
    }

    /// Set the tensor sequence from "1,0"-style text
    ///
    /// An empty string restores the default (all tensors in order).
    /// Non-numeric entries are rejected here; duplicate or out-of-range
    /// indices are rejected when the session starts.
    pub fn set_tensors_sequence(&mut self, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            self.tensors_sequence = None;
            return Ok(());
        }
        self.tensors_sequence = Some(value.parse()?);
        Ok(())
    }

    pub fn set_shuffle(&mut self, shuffle: bool) {
        self.shuffle = shuffle;
    }

    pub fn set_seed(&mut self, seed: Option<u64>) {
        self.seed = seed;
    }

    // === Getters ===

    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    pub fn index_path(&self) -> Option<&Path> {
        self.index_path.as_deref()
    }

    pub fn descriptor(&self) -> Option<&str> {
        self.descriptor.as_deref()
    }

    pub fn start_sample_index(&self) -> u64 {
        self.start_sample_index
    }

    pub fn stop_sample_index(&self) -> u64 {
        self.stop_sample_index
    }

    pub fn epochs(&self) -> u32 {
        self.epochs
    }

    /// Explicit tensor selection, if one was set
    pub fn tensors_sequence(&self) -> Option<&TensorSelection> {
        self.tensors_sequence.as_ref()
    }

    /// Tensor selection in effect for a sample of `tensors_per_sample` tensors
    pub fn selection_for(&self, tensors_per_sample: u32) -> TensorSelection {
        self.tensors_sequence
            .clone()
            .unwrap_or_else(|| TensorSelection::identity(tensors_per_sample))
    }

    pub fn is_shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}

fn clamp_index(name: &str, value: i64, default: u64) -> u64 {
    match u64::try_from(value) {
        Ok(v) => v,
        Err(_) => {
            warn!(
                "{} value {} is out of range, using default {}",
                name, value, default
            );
            default
        }
    }
}

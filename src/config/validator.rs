//! Activation-time configuration checks
//!
//! Runs once before a session becomes active. Every failure here is fatal:
//! the session refuses to start and reports the first problem found.

use tracing::{debug, info};

use super::reader_config::ReaderConfig;
use crate::index::{IndexMetadata, StorageFormat};
use crate::sampling::{SampleRange, TensorSelection};
use crate::utils::{RepoError, Result};

/// Everything a session needs to start iterating
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPlan {
    pub range: SampleRange,
    pub epochs: u32,
    pub selection: TensorSelection,
    pub shuffle: bool,
    pub seed: Option<u64>,
}

impl ValidatedPlan {
    /// Records the session will produce
    pub fn total_records(&self) -> u64 {
        self.range.len() * self.epochs as u64
    }
}

/// Cross-check the options against the parsed index
pub fn validate(
    config: &ReaderConfig,
    metadata: &IndexMetadata,
    sample_lengths: Option<&[u64]>,
) -> Result<ValidatedPlan> {
    if config.location().is_none() {
        return Err(RepoError::config("no data location configured"));
    }

    let range = SampleRange::new(
        config.start_sample_index(),
        config.stop_sample_index(),
        metadata.total_samples,
    )?;

    // Setters already clamp, this only guards direct construction
    let epochs = config.epochs().max(1);

    let selection = config.selection_for(metadata.tensors_per_sample);
    selection.validate(metadata.tensors_per_sample)?;

    match metadata.storage_format {
        StorageFormat::Static => {}
        StorageFormat::Flexible | StorageFormat::Sparse => {
            let lengths = sample_lengths.ok_or_else(|| {
                RepoError::format(format!(
                    "{} storage needs per-sample lengths, which a format descriptor cannot supply",
                    metadata.storage_format.as_str()
                ))
            })?;
            if let Some(pos) = lengths.iter().position(|&len| len == 0) {
                return Err(RepoError::format(format!(
                    "sample {} has a non-positive length",
                    pos
                )));
            }
        }
    }

    if metadata.storage_format == StorageFormat::Sparse
        && !selection.is_identity(metadata.tensors_per_sample)
    {
        return Err(RepoError::sequence(format!(
            "sparse samples are opaque, tensor sequence '{}' must select every tensor in order",
            selection
        )));
    }

    debug!(
        "Validated range {}..={}, {} epoch(s), tensors '{}'",
        range.start, range.stop, epochs, selection
    );
    let plan = ValidatedPlan {
        range,
        epochs,
        selection,
        shuffle: config.is_shuffle(),
        seed: config.seed(),
    };
    info!(
        "Session plan: {} record(s), shuffle={}",
        plan.total_records(),
        plan.shuffle
    );
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{ElementType, Framerate, TensorInfo};
    use crate::utils::ErrorKind;

    fn metadata(format: StorageFormat, total: u64) -> IndexMetadata {
        IndexMetadata {
            total_samples: total,
            tensors_per_sample: 2,
            tensors: vec![
                TensorInfo::new(vec![1, 1, 784, 1], ElementType::Float32),
                TensorInfo::new(vec![1, 1, 10, 1], ElementType::Float32),
            ],
            storage_format: format,
            framerate: Framerate::default(),
        }
    }

    fn config() -> ReaderConfig {
        ReaderConfig::with_index("mnist.data", "mnist.json")
    }

    #[test]
    fn test_valid_plan() {
        let mut cfg = config();
        cfg.set_stop_sample_index(9);
        cfg.set_epochs(2);
        let plan = validate(&cfg, &metadata(StorageFormat::Static, 10), None).unwrap();
        assert_eq!(plan.range, SampleRange { start: 0, stop: 9 });
        assert_eq!(plan.total_records(), 20);
        assert_eq!(plan.selection.indices(), &[0, 1]);
        assert!(plan.shuffle);
    }

    #[test]
    fn test_range_errors() {
        let meta = metadata(StorageFormat::Static, 10);

        let mut cfg = config();
        cfg.set_start_sample_index(1000);
        cfg.set_stop_sample_index(1000);
        let err = validate(&cfg, &meta, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);

        let mut cfg = config();
        cfg.set_start_sample_index(5);
        cfg.set_stop_sample_index(2);
        let err = validate(&cfg, &meta, None).unwrap_err();
        assert!(matches!(err, RepoError::InvalidRange { start: 5, stop: 2 }));
    }

    #[test]
    fn test_clamped_start_passes() {
        let mut cfg = config();
        cfg.set_start_sample_index(-1);
        cfg.set_stop_sample_index(3);
        let plan = validate(&cfg, &metadata(StorageFormat::Static, 10), None).unwrap();
        assert_eq!(plan.range.start, 0);
    }

    #[test]
    fn test_selection_errors() {
        let meta = metadata(StorageFormat::Static, 10);

        let mut cfg = config();
        cfg.set_tensors_sequence("1,0,2").unwrap();
        let err = validate(&cfg, &meta, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Sequence);

        let mut cfg = config();
        cfg.set_tensors_sequence("1,1").unwrap();
        let err = validate(&cfg, &meta, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Sequence);

        let mut cfg = config();
        cfg.set_tensors_sequence("1").unwrap();
        let plan = validate(&cfg, &meta, None).unwrap();
        assert_eq!(plan.selection.indices(), &[1]);
    }

    #[test]
    fn test_sparse_requires_identity() {
        let meta = metadata(StorageFormat::Sparse, 2);
        let lengths = [10u64, 20];

        let mut cfg = config();
        cfg.set_stop_sample_index(1);
        assert!(validate(&cfg, &meta, Some(&lengths)).is_ok());

        cfg.set_tensors_sequence("1,0").unwrap();
        let err = validate(&cfg, &meta, Some(&lengths)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Sequence);
    }

    #[test]
    fn test_variable_formats_need_lengths() {
        let cfg = config();
        for format in [StorageFormat::Flexible, StorageFormat::Sparse] {
            let meta = metadata(format, 2);
            let err = validate(&cfg, &meta, None).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format);

            let err = validate(&cfg, &meta, Some(&[4, 0])).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format);
        }
    }

    #[test]
    fn test_missing_location() {
        let mut cfg = ReaderConfig::default();
        cfg.set_index_path(Some("x.json".into()));
        let err = validate(&cfg, &metadata(StorageFormat::Static, 10), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}

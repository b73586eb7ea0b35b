//! Index resolution
//!
//! Turns either an index document or an inline format descriptor into the
//! canonical `IndexMetadata`. The distinction between the two sources is
//! dropped once parsing succeeds.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::descriptor::FormatDescriptor;
use super::document::IndexDocument;
use super::model::{Framerate, IndexMetadata, StorageFormat, TensorInfo};
use crate::utils::{RepoError, Result};

/// Where the index comes from
#[derive(Debug, Clone, PartialEq)]
pub enum IndexSource {
    /// Index document on disk, optionally cross-checked against a descriptor
    Document {
        path: PathBuf,
        descriptor: Option<String>,
    },
    /// Inline descriptor only (static layouts)
    Descriptor(String),
}

/// Result of index parsing
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedIndex {
    pub metadata: IndexMetadata,
    /// Per-sample byte lengths (flexible/sparse)
    pub sample_lengths: Option<Vec<u64>>,
}

impl IndexSource {
    /// Pick the index source from the configured options
    pub fn from_options(index_path: Option<&Path>, descriptor: Option<&str>) -> Result<Self> {
        let descriptor = descriptor.map(str::trim).filter(|d| !d.is_empty());
        match (index_path, descriptor) {
            (Some(path), descriptor) => Ok(IndexSource::Document {
                path: path.to_path_buf(),
                descriptor: descriptor.map(str::to_string),
            }),
            (None, Some(descriptor)) => Ok(IndexSource::Descriptor(descriptor.to_string())),
            (None, None) => Err(RepoError::config(
                "either an index document or a format descriptor is required",
            )),
        }
    }

    /// Parse the index
    ///
    /// `sample_capacity` is only consulted on the descriptor path: given the
    /// static sample stride it returns how many whole samples the data holds.
    pub fn parse<F>(&self, sample_capacity: F) -> Result<ParsedIndex>
    where
        F: FnOnce(u64) -> Result<u64>,
    {
        match self {
            IndexSource::Document { path, descriptor } => {
                let doc = IndexDocument::load(path)?;
                let parsed = parse_document(&doc)?;
                if let Some(descriptor) = descriptor {
                    check_descriptor_agrees(&parsed.metadata, descriptor)?;
                }
                Ok(parsed)
            }
            IndexSource::Descriptor(descriptor) => parse_descriptor(descriptor, sample_capacity),
        }
    }
}

/// Build the metadata from a loaded document
pub fn parse_document(doc: &IndexDocument) -> Result<ParsedIndex> {
    let total_samples = doc
        .total_samples
        .ok_or_else(|| RepoError::format("index document is missing 'total_samples'"))?;

    let (tensors, caps_format, caps_framerate, caps_count) = match (&doc.tensors, &doc.caps) {
        (Some(_), Some(_)) => {
            return Err(RepoError::format(
                "index document declares both 'tensors' and 'caps'",
            ))
        }
        (None, None) => {
            return Err(RepoError::format(
                "index document is missing 'tensors' (or 'caps')",
            ))
        }
        (Some(defs), None) => {
            let tensors: Vec<TensorInfo> = defs
                .iter()
                .map(|d| TensorInfo::new(d.dimensions.clone(), d.element_type))
                .collect();
            (tensors, None, None, None)
        }
        (None, Some(caps)) => {
            let desc = FormatDescriptor::parse(caps)?;
            // Shape-less caps (flexible/sparse) only count via num_tensors
            let count = desc
                .num_tensors
                .or_else(|| (!desc.tensors.is_empty()).then_some(desc.tensors.len() as u32));
            (
                desc.tensors,
                Some(desc.storage_format),
                Some(desc.framerate),
                count,
            )
        }
    };

    let storage_format = match (doc.format, caps_format) {
        (Some(a), Some(b)) if a != b => {
            return Err(RepoError::format(format!(
                "index format '{}' disagrees with caps format '{}'",
                a.as_str(),
                b.as_str()
            )))
        }
        (Some(f), _) | (None, Some(f)) => f,
        (None, None) => StorageFormat::Static,
    };

    let framerate = match &doc.framerate {
        Some(f) => f.parse()?,
        None => caps_framerate.unwrap_or_default(),
    };

    let tensors_per_sample = match (doc.tensors_per_sample, caps_count) {
        (Some(a), Some(b)) if a != b => {
            return Err(RepoError::format(format!(
                "tensors_per_sample is {} but caps declares num_tensors={}",
                a, b
            )))
        }
        (Some(n), _) | (None, Some(n)) => n,
        // A sparse sample is one opaque blob
        (None, None) if storage_format == StorageFormat::Sparse => 1,
        (None, None) => {
            return Err(RepoError::format(
                "index document is missing 'tensors_per_sample'",
            ))
        }
    };

    let metadata = IndexMetadata {
        total_samples,
        tensors_per_sample,
        tensors,
        storage_format,
        framerate,
    };
    metadata.validate()?;

    let sample_lengths = if storage_format.needs_sample_lengths() {
        let lengths = doc.sample_lengths.clone().ok_or_else(|| {
            RepoError::format(format!(
                "{} format requires 'sample_lengths' in the index document",
                storage_format.as_str()
            ))
        })?;
        if lengths.len() as u64 != total_samples {
            return Err(RepoError::format(format!(
                "index declares {} samples but lists {} sample lengths",
                total_samples,
                lengths.len()
            )));
        }
        Some(lengths)
    } else {
        if doc.sample_lengths.is_some() {
            debug!("Ignoring 'sample_lengths' for static format");
        }
        None
    };

    Ok(ParsedIndex {
        metadata,
        sample_lengths,
    })
}

/// Build the metadata from an inline descriptor
fn parse_descriptor<F>(descriptor: &str, sample_capacity: F) -> Result<ParsedIndex>
where
    F: FnOnce(u64) -> Result<u64>,
{
    let desc = FormatDescriptor::parse(descriptor)?;
    if desc.storage_format != StorageFormat::Static {
        return Err(RepoError::format(format!(
            "{} format cannot be described by a format descriptor alone, \
             an index document is required",
            desc.storage_format.as_str()
        )));
    }

    let mut metadata = IndexMetadata {
        total_samples: 0,
        tensors_per_sample: desc.tensor_count(),
        tensors: desc.tensors,
        storage_format: StorageFormat::Static,
        framerate: desc.framerate,
    };
    metadata.validate()?;

    let stride = metadata
        .sample_byte_size()
        .ok_or_else(|| RepoError::format("sample size overflows"))?;
    metadata.total_samples = sample_capacity(stride)?;
    if metadata.total_samples == 0 {
        return Err(RepoError::format(format!(
            "data holds no complete sample of {} bytes",
            stride
        )));
    }

    Ok(ParsedIndex {
        metadata,
        sample_lengths: None,
    })
}

/// A descriptor given next to a document must not contradict it
fn check_descriptor_agrees(metadata: &IndexMetadata, descriptor: &str) -> Result<()> {
    let desc = FormatDescriptor::parse(descriptor)?;
    if desc.storage_format != metadata.storage_format {
        return Err(RepoError::config(format!(
            "format descriptor declares '{}' but the index document declares '{}'",
            desc.storage_format.as_str(),
            metadata.storage_format.as_str()
        )));
    }
    if !desc.tensors.is_empty() && desc.tensors != metadata.tensors {
        return Err(RepoError::config(
            "format descriptor tensor layout disagrees with the index document",
        ));
    }
    if desc.framerate != Framerate::default() && desc.framerate != metadata.framerate {
        warn!(
            "Descriptor framerate {} ignored, index document declares {}",
            desc.framerate, metadata.framerate
        );
    }
    Ok(())
}

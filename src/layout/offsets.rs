//! Sample offset table
//!
//! Maps a sample index to its byte span in the data. Static layouts need a
//! single stride; flexible and sparse layouts keep a prefix-sum array built
//! once at open time, so every lookup is O(1).

use crate::index::{IndexMetadata, StorageFormat};
use crate::utils::{RepoError, Result};

/// Byte span of one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSpan {
    pub offset: u64,
    pub length: u64,
}

impl SampleSpan {
    /// First byte past the sample
    #[inline]
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Sample index to byte span mapping, one variant per storage format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OffsetTable {
    Static { stride: u64, total_samples: u64 },
    /// `cumulative[i]` is the offset of sample `i`, `cumulative[n]` the data length
    Flexible { cumulative: Vec<u64> },
    Sparse { cumulative: Vec<u64> },
}

impl OffsetTable {
    /// Build the table from the index
    ///
    /// `sample_lengths` is required for flexible and sparse layouts.
    pub fn build(metadata: &IndexMetadata, sample_lengths: Option<&[u64]>) -> Result<Self> {
        match metadata.storage_format {
            StorageFormat::Static => {
                let stride = metadata
                    .sample_byte_size()
                    .ok_or_else(|| RepoError::format("static sample size overflows"))?;
                if stride == 0 {
                    return Err(RepoError::format("static sample stride is zero"));
                }
                stride
                    .checked_mul(metadata.total_samples)
                    .ok_or_else(|| RepoError::format("static data size overflows"))?;
                Ok(OffsetTable::Static {
                    stride,
                    total_samples: metadata.total_samples,
                })
            }
            StorageFormat::Flexible | StorageFormat::Sparse => {
                let lengths = sample_lengths.ok_or_else(|| {
                    RepoError::format(format!(
                        "{} format requires per-sample lengths",
                        metadata.storage_format.as_str()
                    ))
                })?;
                if lengths.len() as u64 != metadata.total_samples {
                    return Err(RepoError::format(format!(
                        "index declares {} samples but lists {} sample lengths",
                        metadata.total_samples,
                        lengths.len()
                    )));
                }
                let cumulative = prefix_sums(lengths)?;
                Ok(match metadata.storage_format {
                    StorageFormat::Flexible => OffsetTable::Flexible { cumulative },
                    _ => OffsetTable::Sparse { cumulative },
                })
            }
        }
    }

    /// Number of samples addressed by the table
    pub fn total_samples(&self) -> u64 {
        match self {
            OffsetTable::Static { total_samples, .. } => *total_samples,
            OffsetTable::Flexible { cumulative } | OffsetTable::Sparse { cumulative } => {
                cumulative.len().saturating_sub(1) as u64
            }
        }
    }

    /// Total data length the index declares
    pub fn declared_len(&self) -> u64 {
        match self {
            OffsetTable::Static {
                stride,
                total_samples,
            } => stride * total_samples,
            OffsetTable::Flexible { cumulative } | OffsetTable::Sparse { cumulative } => {
                cumulative.last().copied().unwrap_or(0)
            }
        }
    }

    /// Check the declared layout against the actual data length
    ///
    /// Static data may carry trailing bytes; prefix-sum layouts must match
    /// exactly.
    pub fn verify_data_len(&self, data_len: u64) -> Result<()> {
        let declared = self.declared_len();
        match self {
            OffsetTable::Static { .. } if declared > data_len => Err(RepoError::format(format!(
                "index declares {} bytes of samples but the data file has {} bytes",
                declared, data_len
            ))),
            OffsetTable::Flexible { .. } | OffsetTable::Sparse { .. } if declared != data_len => {
                Err(RepoError::format(format!(
                    "sample lengths sum to {} bytes but the data file has {} bytes",
                    declared, data_len
                )))
            }
            _ => Ok(()),
        }
    }

    /// Resolve the byte span of a sample
    #[inline]
    pub fn resolve(&self, index: u64) -> Result<SampleSpan> {
        let total = self.total_samples();
        if index >= total {
            return Err(RepoError::SampleOutOfRange { index, total });
        }
        Ok(match self {
            OffsetTable::Static { stride, .. } => SampleSpan {
                offset: index * stride,
                length: *stride,
            },
            OffsetTable::Flexible { cumulative } | OffsetTable::Sparse { cumulative } => {
                let i = index as usize;
                SampleSpan {
                    offset: cumulative[i],
                    length: cumulative[i + 1] - cumulative[i],
                }
            }
        })
    }

    /// Storage format this table was built for
    pub fn storage_format(&self) -> StorageFormat {
        match self {
            OffsetTable::Static { .. } => StorageFormat::Static,
            OffsetTable::Flexible { .. } => StorageFormat::Flexible,
            OffsetTable::Sparse { .. } => StorageFormat::Sparse,
        }
    }
}

/// Prefix sums of strictly positive lengths
fn prefix_sums(lengths: &[u64]) -> Result<Vec<u64>> {
    let mut cumulative = Vec::with_capacity(lengths.len() + 1);
    let mut offset = 0u64;
    cumulative.push(offset);

    for (idx, &len) in lengths.iter().enumerate() {
        if len == 0 {
            return Err(RepoError::format(format!(
                "sample {} has a non-positive length",
                idx
            )));
        }
        offset = offset
            .checked_add(len)
            .ok_or_else(|| RepoError::format("sample lengths overflow"))?;
        cumulative.push(offset);
    }
    Ok(cumulative)
}

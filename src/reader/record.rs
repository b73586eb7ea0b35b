//! Record reading and reassembly
//!
//! Reads one sample from the source and assembles the selected tensors,
//! in selection order, into a single output record.

use std::ops::Range;

use tracing::debug;

use super::source::SampleSource;
use crate::index::{IndexMetadata, StorageFormat};
use crate::layout::{OffsetTable, SampleSpan, TensorLayout};
use crate::sampling::TensorSelection;
use crate::utils::{RepoError, Result};

/// Size of the length prefix in front of every flexible tensor
pub const FLEX_PREFIX_LEN: usize = 4;

/// One assembled output record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Global sample index the record was read from
    pub sample_index: u64,
    /// Epoch the record belongs to (0-based)
    pub epoch: u32,
    /// Selected tensor payloads, concatenated
    pub data: Vec<u8>,
    /// Byte size of every tensor in `data`, in output order
    pub tensor_sizes: Vec<usize>,
}

impl Record {
    pub fn num_tensors(&self) -> usize {
        self.tensor_sizes.len()
    }

    /// Total payload size
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Payload of output tensor `idx`
    pub fn tensor(&self, idx: usize) -> Option<&[u8]> {
        let size = *self.tensor_sizes.get(idx)?;
        let start: usize = self.tensor_sizes[..idx].iter().sum();
        Some(&self.data[start..start + size])
    }

    /// Iterate over the output tensors
    pub fn tensors(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let mut start = 0;
        self.tensor_sizes.iter().map(move |&size| {
            let slice = &self.data[start..start + size];
            start += size;
            slice
        })
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Reads samples and applies a tensor selection
pub struct RecordReader {
    source: Box<dyn SampleSource>,
    table: OffsetTable,
    /// Tensor slots of a static sample
    static_layout: Option<TensorLayout>,
    tensors_per_sample: u32,
}

impl RecordReader {
    pub fn new(
        source: Box<dyn SampleSource>,
        table: OffsetTable,
        metadata: &IndexMetadata,
    ) -> Self {
        let static_layout = match table {
            OffsetTable::Static { .. } => Some(TensorLayout::from_metadata(metadata)),
            _ => None,
        };
        Self {
            source,
            table,
            static_layout,
            tensors_per_sample: metadata.tensors_per_sample,
        }
    }

    pub fn table(&self) -> &OffsetTable {
        &self.table
    }

    /// Read sample `index` and assemble the selected tensors
    pub fn read(&mut self, index: u64, selection: &TensorSelection) -> Result<Record> {
        selection.validate(self.tensors_per_sample)?;
        let span = self.table.resolve(index)?;

        let (data, tensor_sizes) = match self.table.storage_format() {
            StorageFormat::Static => self.read_static(index, span, selection)?,
            StorageFormat::Flexible => self.read_flexible(index, span, selection)?,
            StorageFormat::Sparse => self.read_sparse(index, span, selection)?,
        };

        debug!(
            "Read sample {} ({} bytes at offset {}, {} tensors out)",
            index,
            data.len(),
            span.offset,
            tensor_sizes.len()
        );

        Ok(Record {
            sample_index: index,
            epoch: 0,
            data,
            tensor_sizes,
        })
    }

    fn read_whole(&mut self, index: u64, span: SampleSpan) -> Result<Vec<u8>> {
        let len = usize::try_from(span.length)
            .map_err(|_| RepoError::format(format!("sample {} is too large", index)))?;
        let mut buf = vec![0u8; len];
        self.source.read_at(index, span, 0, &mut buf)?;
        Ok(buf)
    }

    fn read_static(
        &mut self,
        index: u64,
        span: SampleSpan,
        selection: &TensorSelection,
    ) -> Result<(Vec<u8>, Vec<usize>)> {
        let layout = self
            .static_layout
            .as_ref()
            .ok_or_else(|| RepoError::format("static tensor layout missing"))?;
        let sizes: Vec<usize> = selection
            .indices()
            .iter()
            .map(|&i| {
                layout
                    .slot(i as usize)
                    .map(|s| s.size as usize)
                    .ok_or_else(|| {
                        RepoError::sequence(format!("tensor index {} out of range", i))
                    })
            })
            .collect::<Result<_>>()?;

        if selection.is_identity(self.tensors_per_sample) {
            let data = self.read_whole(index, span)?;
            return Ok((data, sizes));
        }

        // Strict subset or reorder: fetch only the selected tensors
        let slots: Vec<_> = selection
            .indices()
            .iter()
            .filter_map(|&i| layout.slot(i as usize).copied())
            .collect();
        let mut data = vec![0u8; sizes.iter().sum()];
        let mut pos = 0;
        for slot in slots {
            let size = slot.size as usize;
            self.source
                .read_at(index, span, slot.offset, &mut data[pos..pos + size])?;
            pos += size;
        }
        Ok((data, sizes))
    }

    fn read_flexible(
        &mut self,
        index: u64,
        span: SampleSpan,
        selection: &TensorSelection,
    ) -> Result<(Vec<u8>, Vec<usize>)> {
        let sample = self.read_whole(index, span)?;
        let ranges = split_flexible(index, &sample, self.tensors_per_sample as usize)?;

        if selection.is_identity(self.tensors_per_sample) {
            let mut data = Vec::with_capacity(sample.len());
            let mut sizes = Vec::with_capacity(ranges.len());
            for range in &ranges {
                data.extend_from_slice(&sample[range.clone()]);
                sizes.push(range.len());
            }
            return Ok((data, sizes));
        }

        let selected = selection.apply(&ranges).ok_or_else(|| {
            RepoError::sequence(format!(
                "selection '{}' does not fit sample {}",
                selection, index
            ))
        })?;
        let mut data = Vec::with_capacity(selected.iter().map(|r| r.len()).sum());
        let mut sizes = Vec::with_capacity(selected.len());
        for range in selected {
            data.extend_from_slice(&sample[range.clone()]);
            sizes.push(range.len());
        }
        Ok((data, sizes))
    }

    fn read_sparse(
        &mut self,
        index: u64,
        span: SampleSpan,
        selection: &TensorSelection,
    ) -> Result<(Vec<u8>, Vec<usize>)> {
        if !selection.is_identity(self.tensors_per_sample) {
            return Err(RepoError::sequence(format!(
                "sparse samples are opaque; selection '{}' must list all {} tensors in order",
                selection, self.tensors_per_sample
            )));
        }
        let data = self.read_whole(index, span)?;
        let len = data.len();
        Ok((data, vec![len]))
    }
}

/// Split a flexible sample into the payload ranges of its tensors
///
/// Prefixes are read in order; the sample must hold exactly `count`
/// tensors and nothing else.
pub fn split_flexible(index: u64, sample: &[u8], count: usize) -> Result<Vec<Range<usize>>> {
    let mut ranges = Vec::with_capacity(count);
    let mut pos = 0usize;

    for idx in 0..count {
        let prefix_end = pos + FLEX_PREFIX_LEN;
        if prefix_end > sample.len() {
            return Err(RepoError::format(format!(
                "sample {}: tensor {} length prefix runs past the sample",
                index, idx
            )));
        }
        let len_bytes = &sample[pos..prefix_end];
        let len =
            u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
        let end = prefix_end
            .checked_add(len)
            .filter(|&end| end <= sample.len())
            .ok_or_else(|| {
                RepoError::format(format!(
                    "sample {}: tensor {} of {} bytes runs past the sample",
                    index, idx, len
                ))
            })?;
        ranges.push(prefix_end..end);
        pos = end;
    }

    if pos != sample.len() {
        return Err(RepoError::format(format!(
            "sample {}: {} bytes left after {} tensors",
            index,
            sample.len() - pos,
            count
        )));
    }
    Ok(ranges)
}

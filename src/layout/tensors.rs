//! Tensor layout within a static sample
//!
//! Tensors are stored back to back; tensor `i` starts at the sum of the
//! sizes of the tensors before it.

use crate::index::IndexMetadata;

/// Byte range of one tensor relative to the start of its sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorSlot {
    pub offset: u64,
    pub size: u64,
}

/// Computed tensor layout of a static sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorLayout {
    /// Tensor slots in declared order
    pub slots: Vec<TensorSlot>,

    /// Total sample size in bytes
    pub total_size: u64,
}

impl TensorLayout {
    /// Compute the layout from per-tensor sizes
    pub fn from_sizes(sizes: &[u64]) -> Self {
        let mut slots = Vec::with_capacity(sizes.len());
        let mut offset = 0;

        for &size in sizes {
            slots.push(TensorSlot { offset, size });
            offset += size;
        }

        Self {
            slots,
            total_size: offset,
        }
    }

    /// Compute the layout declared by the index
    pub fn from_metadata(metadata: &IndexMetadata) -> Self {
        Self::from_sizes(&metadata.tensor_sizes())
    }

    #[inline]
    pub fn slot(&self, idx: usize) -> Option<&TensorSlot> {
        self.slots.get(idx)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

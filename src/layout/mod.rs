//! Byte layout of samples and tensors
//!
//! All offsets are computed at open time so that any sample, and any
//! tensor of a static sample, is addressed in O(1).

pub mod offsets;
pub mod tensors;

pub use offsets::{OffsetTable, SampleSpan};
pub use tensors::{TensorLayout, TensorSlot};

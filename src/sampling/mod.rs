//! Sample iteration and tensor selection

pub mod iterator;
pub mod selection;

pub use iterator::{Draw, IterationPhase, SampleIterator, SampleRange};
pub use selection::TensorSelection;

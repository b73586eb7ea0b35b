//! Record reading
//!
//! `RepoReader` drives a session; `RecordReader` turns one sample index into
//! an assembled record using a `SampleSource` for the raw bytes.

pub mod record;
pub mod repo;
pub mod source;

pub use record::{split_flexible, Record, RecordReader, FLEX_PREFIX_LEN};
pub use repo::{ReaderState, RepoReader};
pub use source::{open_source, FileSequenceSource, FileSource, SampleSource, SequencePattern};

//! Repository index parsing
//!
//! The index describes how many samples the data file holds, the shape and
//! type of every tensor in a sample, and the storage format. It can come
//! from a JSON/YAML index document or from an inline format descriptor.

pub mod descriptor;
pub mod document;
pub mod model;
pub mod parser;

pub use descriptor::FormatDescriptor;
pub use document::{IndexDocument, TensorDef};
pub use model::{ElementType, Framerate, IndexMetadata, StorageFormat, TensorInfo};
pub use parser::{IndexSource, ParsedIndex};

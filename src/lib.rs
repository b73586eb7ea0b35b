//! datarepo library
//!
//! Indexed sample repository reader: serves records (groups of tensors) out
//! of a flat binary data file laid out by a companion index, with bounded,
//! optionally shuffled, multi-epoch iteration and tensor selection.
//!
//! ```no_run
//! use datarepo::{ReaderConfig, RepoReader};
//!
//! let mut config = ReaderConfig::with_index("mnist.data", "mnist.json");
//! config.set_stop_sample_index(9);
//! config.set_epochs(2);
//!
//! let mut reader = RepoReader::new(config);
//! reader.start()?;
//! while let Some(record) = reader.next_record()? {
//!     println!("sample {} epoch {}: {} bytes", record.sample_index, record.epoch, record.len());
//! }
//! # Ok::<(), datarepo::RepoError>(())
//! ```

pub mod config;
pub mod index;
pub mod layout;
pub mod metrics;
pub mod reader;
pub mod sampling;
pub mod utils;

pub use config::ReaderConfig;
pub use reader::{ReaderState, Record, RepoReader};
pub use utils::{ErrorKind, RepoError, Result};

//! Utility modules

pub mod error;

pub use error::{ErrorKind, RepoError, Result};

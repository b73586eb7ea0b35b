//! Error types for the sample repository reader

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Coarse error classification reported to the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or contradictory configuration
    Config,
    /// Malformed index or layout inconsistent with the data file
    Format,
    /// Sample index or range outside the repository
    Range,
    /// Invalid tensor selection
    Sequence,
    /// File open/seek/read failure
    Io,
}

/// Top-level reader error
#[derive(Error, Debug)]
pub enum RepoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Sample index {index} out of range (total samples {total})")]
    SampleOutOfRange { index: u64, total: u64 },

    #[error("Invalid sample range: start {start} > stop {stop}")]
    InvalidRange { start: u64, stop: u64 },

    #[error("Invalid tensor sequence: {0}")]
    Sequence(String),

    #[error("IO error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

impl RepoError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            RepoError::Config(_) => ErrorKind::Config,
            RepoError::Format(_) => ErrorKind::Format,
            RepoError::SampleOutOfRange { .. } | RepoError::InvalidRange { .. } => {
                ErrorKind::Range
            }
            RepoError::Sequence(_) => ErrorKind::Sequence,
            RepoError::Io { .. } => ErrorKind::Io,
        }
    }

    /// Build a closure that wraps an `io::Error` with the path it happened on
    pub fn io(path: &Path) -> impl FnOnce(io::Error) -> RepoError + '_ {
        move |source| RepoError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        RepoError::Format(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        RepoError::Config(msg.into())
    }

    pub(crate) fn sequence(msg: impl Into<String>) -> Self {
        RepoError::Sequence(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, RepoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(RepoError::config("x").kind(), ErrorKind::Config);
        assert_eq!(RepoError::format("x").kind(), ErrorKind::Format);
        assert_eq!(RepoError::sequence("x").kind(), ErrorKind::Sequence);
        assert_eq!(
            RepoError::SampleOutOfRange { index: 10, total: 10 }.kind(),
            ErrorKind::Range
        );
        assert_eq!(
            RepoError::InvalidRange { start: 5, stop: 2 }.kind(),
            ErrorKind::Range
        );

        let err = RepoError::io(Path::new("/tmp/x.data"))(io::Error::from(
            io::ErrorKind::UnexpectedEof,
        ));
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("/tmp/x.data"));
    }

    #[test]
    fn test_range_message() {
        let err = RepoError::SampleOutOfRange { index: 12, total: 10 };
        assert_eq!(
            err.to_string(),
            "Sample index 12 out of range (total samples 10)"
        );
    }
}

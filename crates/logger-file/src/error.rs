//! Error types for file-based logging

use std::io;
use std::path::PathBuf;

/// Result type for file logger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during file logging
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configured log directory could not be inspected
    #[error("Failed to stat log directory at {path}: {source}")]
    StatDirectory {
        /// The directory that was inspected
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// The configured log directory exists but is not a directory
    #[error("Log path {0} is not a directory")]
    NotADirectory(PathBuf),

    /// The configured file name cannot name a file inside the log directory
    #[error("Invalid log file name: {0:?}")]
    InvalidFileName(String),

    /// The configured time layout is not a valid strftime layout
    #[error("Invalid rotation time layout: {0:?}")]
    InvalidTimeLayout(String),

    /// Failed to open the main log file
    #[error("Failed to open log file {path}: {source}")]
    Open {
        /// The file that failed to open
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// Failed to move the main log file out of the way
    #[error("Failed to rotate log file {from} to {to}: {source}")]
    Rename {
        /// The main log file
        from: PathBuf,
        /// The rotated file name
        to: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// Failed to flush and release the retired file handle
    #[error("Failed to close rotated log file {path}: {source}")]
    Close {
        /// Where the retired file now lives
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// Failed to read the size of the open log file
    #[error("Failed to stat open log file {path}: {source}")]
    Stat {
        /// The main log file
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// Checking whether the main log file exists failed for a reason other
    /// than the file being absent
    #[error("Unexpected filesystem fault checking {path}: {source}")]
    Environment {
        /// The main log file
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// Writing bytes to the resolved handle failed
    #[error("Failed to write to log file: {0}")]
    Write(#[source] io::Error),

    /// Compressing a rotated file failed
    #[error("Failed to compress rotated log file {path}: {source}")]
    Compress {
        /// The rotated file
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// Applying the retention policy failed
    #[error("Failed to apply retention in {path}: {source}")]
    Retention {
        /// The file or directory being cleaned up
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },
}

impl Error {
    /// Whether this error is an unexpected environment fault rather than an
    /// ordinary I/O failure.
    #[must_use]
    pub const fn is_environment_fault(&self) -> bool {
        matches!(self, Self::Environment { .. })
    }

    fn io_kind(&self) -> io::ErrorKind {
        match self {
            Self::StatDirectory { source, .. }
            | Self::Open { source, .. }
            | Self::Rename { source, .. }
            | Self::Close { source, .. }
            | Self::Stat { source, .. }
            | Self::Environment { source, .. }
            | Self::Compress { source, .. }
            | Self::Retention { source, .. }
            | Self::Write(source) => source.kind(),
            Self::NotADirectory(_) => io::ErrorKind::NotADirectory,
            Self::InvalidFileName(_) | Self::InvalidTimeLayout(_) => io::ErrorKind::InvalidInput,
        }
    }
}

impl From<Error> for io::Error {
    fn from(error: Error) -> Self {
        if let Error::Write(source) = error {
            return source;
        }
        Self::new(error.io_kind(), error)
    }
}

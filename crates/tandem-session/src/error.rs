//! Error types for session persistence.

use std::path::PathBuf;
use thiserror::Error;

use crate::format::SessionFormat;

/// Errors that can occur while loading or saving a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to move the temp file over the target
    #[error("failed to rename '{from}' to '{to}': {source}")]
    Rename {
        /// The temp file.
        from: PathBuf,
        /// The session file it was to replace.
        to: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The target is read-only
    #[error("file or directory is read-only: '{0}'")]
    ReadOnly(PathBuf),

    /// The file exists and is not empty but is neither format
    #[error("session file '{0}' exists but could not be parsed; refusing to replace it")]
    Unreadable(PathBuf),

    /// Failed to serialize a session
    #[error("failed to encode session as {format}: {source}")]
    Encode {
        /// Format that was being written.
        format: SessionFormat,
        /// Underlying serializer error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to deserialize a session
    #[error("failed to decode session file '{path}': {reason}")]
    Decode {
        /// Path of the file that could not be decoded.
        path: PathBuf,
        /// Description of why decoding failed.
        reason: String,
    },

    /// The session has not been given a file yet
    #[error("session has no file to save to")]
    NoFile,

    /// The user cancelled the operation
    #[error("save cancelled")]
    Cancelled,

    /// Failed to start the background writer
    #[error("failed to start session writer thread: {0}")]
    WriterThread(#[source] std::io::Error),
}

impl SessionError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SessionError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SessionError::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// Create a rename error.
    pub fn rename(
        from: impl Into<PathBuf>,
        to: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        SessionError::Rename {
            from: from.into(),
            to: to.into(),
            source,
        }
    }

    /// Create an encode error.
    pub fn encode(
        format: SessionFormat,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        SessionError::Encode {
            format,
            source: source.into(),
        }
    }

    /// Returns the file this error concerns, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::ReadFile { path, .. }
            | Self::WriteFile { path, .. }
            | Self::Decode { path, .. }
            | Self::ReadOnly(path)
            | Self::Unreadable(path) => Some(path),
            Self::Rename { to, .. } => Some(to),
            Self::Encode { .. } | Self::NoFile | Self::Cancelled | Self::WriterThread(_) => None,
        }
    }
}

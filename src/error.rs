//! Unified error type for all settings operations.

use std::path::PathBuf;
use thiserror::Error;

/// Things that can go wrong when reading or writing settings.
///
/// Payloads are owned and `Clone` so an error raised on the privileged side
/// of a [`transport`](crate::transport) channel reaches the caller intact.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A structured key path contained something other than a string or a
    /// non-negative integer.
    #[error("invalid path segment: {0}")]
    InvalidPathSegment(String),

    /// Tried to replace the whole document with a non-object.
    #[error("the settings root must be an object, got {0}")]
    InvalidRootValue(&'static str),

    /// An index step could not be satisfied while setting a value. `len` is
    /// `None` when the node at that step is not an array at all.
    #[error("invalid array index {index} (array length: {len:?})")]
    InvalidArrayIndex {
        /// Index taken from the key path.
        index: usize,
        /// Length of the array found at that step, if any.
        len: Option<usize>,
    },

    /// The backing file exists but does not hold a JSON object.
    #[error("corrupt settings document at {}: {message}", .path.display())]
    CorruptDocument {
        /// File that failed to parse.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// File system problem (mkdir, read, write, rename).
    #[error("i/o error: {0}")]
    Io(String),

    /// Failed to turn a value into JSON.
    #[error("serialization error: {0}")]
    Serialize(String),

    /// Bad configuration (missing transport, unusable directory, etc.).
    #[error("config error: {0}")]
    Config(String),

    /// The privilege-boundary channel went away.
    #[error("transport error: {0}")]
    Transport(String),
}

impl Error {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::CorruptDocument {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Error::Io(err.to_string())
        } else {
            Error::Serialize(err.to_string())
        }
    }
}

/// Result alias using our [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

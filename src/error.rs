//! Custom error types and result handling for evidoc operations.
//!
//! Only failures that end a run surface as [`Error`]. Unreadable folders, skipped
//! images and rejected embeds are recovered where they happen and reported as
//! diagnostics instead (see [`crate::diagnostics`]).
//!
use std::path::PathBuf;

/// Type alias for Results with evidoc errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for run-level evidoc operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O errors from the standard library
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Image decoding or encoding errors
    #[error(transparent)]
    Image(#[from] image::ImageError),
    /// ZIP package errors while writing the document
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    /// Async task join errors
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    EvidocBuilder(#[from] crate::evidoc::EvidocConfigBuilderError),
    /// Generation was requested without a source folder
    #[error("No source folder selected")]
    NoSourceSelected,
    /// A second generation was triggered while one is still running
    #[error("A generation run is already in progress")]
    RunInProgress,
    /// Error for invalid file or directory paths
    #[error("The given path '{0:?}' is invalid: {1}")]
    InvalidPath(PathBuf, String),
    /// Path could not be represented as UTF-8
    #[error("Path is not valid UTF-8: {0:?}")]
    PathUtf8Error(PathBuf),
    /// Error for failed asynchronous tasks
    #[error("Asynchronous task failed: {0}")]
    AsyncTaskError(String),
    /// Error for unsupported operations or formats (e.g., unknown image encoding)
    #[error("Unsupported: {0}")]
    Unsupported(String),
    /// Error for resources that couldn't be found
    #[error("Not found: {0}")]
    NotFound(String),
    /// Other errors that don't fit into specific categories
    #[error("Other error: {0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(error: String) -> Self {
        Error::Other(error)
    }
}

impl From<&str> for Error {
    fn from(error: &str) -> Self {
        Error::Other(error.to_string())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

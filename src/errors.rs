//! Storage error types.
//!
//! Every variant belongs to one [`ErrorKind`].  Backends return
//! `Err(StorageError::..)` and never swallow failures; the HTTP adapter
//! layer turns a kind into a response class via [`StorageError::status_code`].

use http::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse error classification shared by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The bucket or object does not exist.
    NotFound,
    /// The request is structurally invalid.
    InvalidArgument,
    /// The storage medium failed.
    Io,
    /// A stored entry could not be decoded.
    Encoding,
}

/// Errors returned by [`crate::storage::backend::Storage`] operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The specified bucket does not exist.
    #[error("bucket not found: {bucket}")]
    BucketNotFound { bucket: String },

    /// The specified object does not exist.
    #[error("object not found: {bucket}/{name}")]
    ObjectNotFound { bucket: String, name: String },

    /// A request argument is invalid.
    #[error("{message}")]
    InvalidArgument { message: String },

    /// Disk read/write, permission, or directory listing failure.
    #[error("storage I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// A stored object document is corrupt.
    #[error("failed to decode object at {path}: {source}")]
    Encoding {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A file or directory inside the tree is not a valid encoded name.
    #[error("unrecognized entry in storage tree: {path}")]
    ForeignEntry { path: PathBuf },
}

/// Convenience alias for storage results.
pub type Result<T, E = StorageError> = std::result::Result<T, E>;

impl StorageError {
    /// Shorthand for [`StorageError::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        StorageError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::BucketNotFound { .. } => ErrorKind::NotFound,
            StorageError::ObjectNotFound { .. } => ErrorKind::NotFound,
            StorageError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            StorageError::Io(_) => ErrorKind::Io,
            StorageError::Encoding { .. } => ErrorKind::Encoding,
            StorageError::ForeignEntry { .. } => ErrorKind::Encoding,
        }
    }

    /// True for either not-found variant.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Short machine-readable code, used for log fields and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::BucketNotFound { .. } => "BucketNotFound",
            StorageError::ObjectNotFound { .. } => "ObjectNotFound",
            StorageError::InvalidArgument { .. } => "InvalidArgument",
            StorageError::Io(_) => "IoError",
            StorageError::Encoding { .. } => "EncodingError",
            StorageError::ForeignEntry { .. } => "ForeignEntry",
        }
    }

    /// HTTP status an adapter should answer with.
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorKind::Encoding => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Io => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

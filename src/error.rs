//! Error taxonomy for the backend.
//!
//! Kinds mirror outcomes a higher-level backup engine needs to branch on:
//! an item being absent, a generic transport failure, a malformed response,
//! a fragmented upload aborting mid-flight, or cooperative cancellation.

use reqwest::StatusCode;

/// An alias to `Result` of [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Error produced by any backend operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The targeted item (file or folder) does not exist.
    ///
    /// Raised by the pipeline's classification step; operations that know
    /// which kind of item they were looking for translate it into
    /// `FileMissing` or `FolderMissing` before it reaches the caller.
    #[error("item not found")]
    ItemNotFound,

    /// A file operation (`get`/`delete`/`rename`) targeted a name that
    /// doesn't exist under the resolved root.
    #[error("file not found: {name}")]
    FileMissing { name: String },

    /// The resolved root path itself doesn't exist (surfaced by `test()`
    /// and by enumeration hitting a missing root).
    #[error("folder not found: {path}")]
    FolderMissing { path: String },

    /// Any other non-2xx response, or an underlying transport failure.
    #[error("request failed with {status}: {reason}")]
    Transport {
        status: StatusCode,
        reason: String,
        /// Truncated response body, kept short for diagnostics.
        body_snippet: String,
    },

    /// The response body was expected to be JSON of a particular shape but
    /// was missing, truncated, or malformed.
    #[error("failed to parse response body: {0}")]
    Parse(#[source] serde_json::Error),

    /// A chunked upload aborted; the underlying session has already been
    /// deleted server-side by the time this is raised.
    #[error("upload session aborted at fragment {fragment_index}/{fragment_count}: {source}")]
    UploadSession {
        fragment_index: usize,
        fragment_count: usize,
        #[source]
        source: Box<Error>,
    },

    /// Cooperative cancellation requested by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// A malformed or un-buildable URL.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// Underlying HTTP client failure (connect, TLS, body read, etc.)
    /// that isn't better expressed as `Transport`.
    #[error("http client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

impl Error {
    /// HTTP status code carried by this error, if any.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Error::ItemNotFound | Error::FileMissing { .. } | Error::FolderMissing { .. } => {
                Some(StatusCode::NOT_FOUND)
            }
            Error::Transport { status, .. } => Some(*status),
            Error::Reqwest(source) => source.status(),
            Error::Parse(_) | Error::UploadSession { .. } | Error::Cancelled | Error::Url(_) => {
                None
            }
        }
    }
}

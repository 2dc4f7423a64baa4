use reqwest::StatusCode;

/// Errors that can happen within the stampfill-client
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Any error emitted from the underlying [`reqwest`] client, including failures to decode a
    /// response body.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    /// The node answered with a non-success status code.
    #[error("node responded with {status}: {message}")]
    UnexpectedStatus {
        /// The HTTP status returned by the node.
        status: StatusCode,
        /// The error message reported by the node, or the raw response body.
        message: String,
    },
    /// Error when URL manipulation fails.
    #[error("{message}")]
    InvalidUrl {
        /// The URL error message.
        message: String,
    },
    /// A batch identifier was empty.
    #[error("invalid batch id: {0:?}")]
    InvalidBatchId(String),
    /// An upload was sent without binding it to a postage batch.
    #[error("upload is missing a postage batch")]
    MissingBatch,
    /// Invalid header value.
    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
}

/// A convenience alias that defaults our [`Error`] type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

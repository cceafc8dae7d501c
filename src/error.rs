use thiserror::Error;

/// Opaque failure of a single transport send (connection refused, timeout, TLS, ...).
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Classified outcome of a failed resource fetch.
///
/// The set is closed: every failure a [`ResourceRetriever`](crate::retriever::ResourceRetriever)
/// can produce maps to exactly one of these.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetrieverError {
    /// No usable response: transport failure or missing response
    #[error("no usable response received")]
    Unknown,

    /// Success status but nothing in the body
    #[error("response body is empty")]
    EmptyBody,

    /// Body present but the resource builder rejected it
    #[error("response body could not be decoded")]
    CouldNotDecode,

    /// Any status outside of 2xx, including 304
    #[error("non success status code: {0}")]
    NonSuccessStatus(u16),
}

impl RetrieverError {
    /// Transient failures that are worth another attempt:
    /// no response, 408, 429 and any 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            RetrieverError::Unknown => true,
            RetrieverError::NonSuccessStatus(code) => {
                matches!(code, 408 | 429) || (500..600).contains(code)
            }
            _ => false
        }
    }

    /// `true` for a 304 answer to a conditional request.
    pub fn is_not_modified(&self) -> bool {
        matches!(self, RetrieverError::NonSuccessStatus(304))
    }
}

/// Errors raised by a [`DiskStorage`](crate::storage::DiskStorage) implementation.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

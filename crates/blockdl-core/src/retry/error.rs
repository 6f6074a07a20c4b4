//! Error types for range requests and block fetches.

use thiserror::Error;

use super::classify::{classify_curl_error, classify_http_status};
use super::policy::ErrorKind;

/// Failure while issuing a range request (before any body bytes are read).
#[derive(Debug, Error)]
pub enum RequestError {
    /// Curl reported an error (timeout, connection, etc.).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// HTTP response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// Transport-level failure from a non-curl transport.
    #[error("transport: {0}")]
    Transport(String),
}

impl RequestError {
    /// Retry classification of this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RequestError::Curl(e) => classify_curl_error(e),
            RequestError::Http(code) => classify_http_status(*code),
            RequestError::Transport(_) => ErrorKind::Connection,
        }
    }
}

/// Failure while reading the body of an issued range request.
#[derive(Debug, Error)]
pub enum BodyError {
    /// The body ended before the announced length; carries what did arrive.
    #[error("incomplete body: received {} bytes", .received.len())]
    Incomplete { received: Vec<u8> },
    /// Curl failed mid-transfer.
    #[error("{0}")]
    Curl(curl::Error),
    /// Transport-level failure from a non-curl transport.
    #[error("transport: {0}")]
    Transport(String),
}

/// Terminal outcome of one block fetch, as seen by the worker pool.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be issued within its attempt budget (or failed
    /// with a non-retryable error).
    #[error("request failed after {attempts} attempt(s): {source}")]
    Request {
        attempts: u32,
        #[source]
        source: RequestError,
    },
    /// The body could not be read within its attempt budget.
    #[error("body read failed after {attempts} attempt(s): {source}")]
    Read {
        attempts: u32,
        #[source]
        source: BodyError,
    },
    /// The server sent more than the requested range (Range header ignored).
    #[error("server ignored range: expected {expected} bytes, got {received}")]
    RangeIgnored { expected: u64, received: u64 },
}

//! HTTP transport seam.
//!
//! The engine issues exactly two kinds of requests: one metadata probe per
//! job and one `Range` GET per block attempt. [`Transport`] abstracts both so
//! the job controller can run against libcurl ([`CurlTransport`]) or a
//! scripted transport in tests.

mod libcurl;

pub use libcurl::CurlTransport;

use crate::fetch_head::HeadResult;
use crate::retry::{BodyError, RequestError};

/// Issues the probe and range requests for a job.
pub trait Transport: Send + Sync {
    /// HEAD-style metadata probe for `url`.
    fn probe(&self, url: &str) -> anyhow::Result<HeadResult>;

    /// Issue `GET url` with `Range: bytes=start-end` (inclusive). Returns once
    /// the response status is known; the body is read through [`RangeBody`].
    fn send_range(&self, url: &str, start: u64, end: u64)
        -> Result<Box<dyn RangeBody>, RequestError>;
}

/// Body of an issued range request.
pub trait RangeBody {
    /// Read the whole body. After a failure the caller may call this again to
    /// re-read the same request.
    fn read_body(&mut self) -> Result<Vec<u8>, BodyError>;
}

#[cfg(test)]
pub(crate) mod scripted;

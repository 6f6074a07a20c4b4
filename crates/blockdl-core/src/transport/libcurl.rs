//! libcurl-backed transport (one Easy handle per range request).

use std::time::Duration;

use curl::easy::Easy;

use super::{RangeBody, Transport};
use crate::fetch_head::{self, HeadResult};
use crate::retry::{BodyError, RequestError};

/// Upper bound on the up-front body allocation.
const MAX_PREALLOC: usize = 16 * 1024 * 1024;

/// Production transport: blocking libcurl Easy handles on the caller's thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurlTransport;

impl CurlTransport {
    pub fn new() -> Self {
        CurlTransport
    }

    fn range_handle(url: &str, start: u64, end: u64) -> Result<Easy, curl::Error> {
        let mut easy = Easy::new();
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.connect_timeout(Duration::from_secs(30))?;
        // Abort if throughput drops below 1 KiB/s for 60s rather than using a
        // short wall-clock timeout that would kill large blocks on slow links.
        easy.low_speed_limit(1024)?;
        easy.low_speed_time(Duration::from_secs(60))?;
        easy.timeout(Duration::from_secs(3600))?;
        // curl expects "start-end" (inclusive), not "bytes=start-end".
        easy.range(&format!("{}-{}", start, end))?;
        Ok(easy)
    }
}

impl Transport for CurlTransport {
    fn probe(&self, url: &str) -> anyhow::Result<HeadResult> {
        fetch_head::probe(url)
    }

    fn send_range(
        &self,
        url: &str,
        start: u64,
        end: u64,
    ) -> Result<Box<dyn RangeBody>, RequestError> {
        let mut easy = Self::range_handle(url, start, end)?;
        let limit = (end - start + 1) as usize;
        let outcome = perform(&mut easy, limit);

        // No status line at all: the request never got a response.
        if outcome.status == 0 {
            return Err(match outcome.error {
                Some(e) => RequestError::Curl(e),
                None => RequestError::Transport("no response".to_string()),
            });
        }
        if !(200..300).contains(&outcome.status) {
            return Err(RequestError::Http(outcome.status));
        }

        let first = outcome.into_body(limit);
        Ok(Box::new(CurlRangeBody {
            easy,
            limit,
            first: Some(first),
        }))
    }
}

/// Body of a curl range request. The first read returns the buffered result
/// of the initial transfer; later reads re-perform the same request.
struct CurlRangeBody {
    easy: Easy,
    /// Expected range length.
    limit: usize,
    first: Option<Result<Vec<u8>, BodyError>>,
}

impl RangeBody for CurlRangeBody {
    fn read_body(&mut self) -> Result<Vec<u8>, BodyError> {
        if let Some(first) = self.first.take() {
            return first;
        }
        let outcome = perform(&mut self.easy, self.limit);
        if outcome.status != 0 && !(200..300).contains(&outcome.status) {
            return Err(BodyError::Transport(format!("HTTP {}", outcome.status)));
        }
        outcome.into_body(self.limit)
    }
}

struct Outcome {
    status: u32,
    body: Vec<u8>,
    error: Option<curl::Error>,
}

impl Outcome {
    /// A body longer than `limit` was cut off on purpose; hand it back so the
    /// fetcher reports the ignored range.
    fn into_body(self, limit: usize) -> Result<Vec<u8>, BodyError> {
        if self.body.len() > limit {
            return Ok(self.body);
        }
        match self.error {
            None => Ok(self.body),
            Some(e) if e.is_partial_file() => Err(BodyError::Incomplete {
                received: self.body,
            }),
            Some(e) => Err(BodyError::Curl(e)),
        }
    }
}

/// Run the transfer, buffering at most `limit + 1` body bytes. A server that
/// ignores `Range` is cut off at that point instead of being read to the end.
fn perform(easy: &mut Easy, limit: usize) -> Outcome {
    let mut body = Vec::with_capacity(limit.min(MAX_PREALLOC));
    let result = {
        let mut transfer = easy.transfer();
        match transfer.write_function(|data| {
            let room = (limit + 1).saturating_sub(body.len());
            if data.len() > room {
                body.extend_from_slice(&data[..room]);
                // Short count aborts the transfer.
                return Ok(0);
            }
            body.extend_from_slice(data);
            Ok(data.len())
        }) {
            Ok(()) => transfer.perform(),
            Err(e) => Err(e),
        }
    };
    let status = easy.response_code().unwrap_or(0);
    Outcome {
        status,
        body,
        error: result.err(),
    }
}

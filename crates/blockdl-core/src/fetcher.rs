//! Range fetcher: one block's bytes over a `Range` GET.
//!
//! Issuing the request and reading its body have separate attempt budgets.
//! A body that arrives short (cut off or ended early) is zero-padded to the
//! requested length and returned as a success; the resume scan will see the
//! padded region as written data.

use std::sync::Arc;

use crate::retry::{run_with_retry, BodyError, ErrorKind, FetchError, RequestError, RetryPolicy};
use crate::transport::Transport;

/// Fetches byte ranges of one URL with bounded retries.
#[derive(Clone)]
pub struct RangeFetcher {
    transport: Arc<dyn Transport>,
    url: String,
    request_policy: RetryPolicy,
    read_policy: RetryPolicy,
}

impl RangeFetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        url: impl Into<String>,
        request_policy: RetryPolicy,
        read_policy: RetryPolicy,
    ) -> Self {
        RangeFetcher {
            transport,
            url: url.into(),
            request_policy,
            read_policy,
        }
    }

    /// Fetch `[start, end]` (inclusive). On success the returned buffer is
    /// exactly `end - start + 1` bytes long.
    pub fn fetch(&self, start: u64, end: u64) -> Result<Vec<u8>, FetchError> {
        let expected = end - start + 1;

        let mut requests = 0;
        let mut body = run_with_retry(&self.request_policy, RequestError::kind, |attempt| {
            requests = attempt;
            self.transport
                .send_range(&self.url, start, end)
                .inspect_err(|e| tracing::debug!(start, end, attempt, "range request failed: {}", e))
        })
        .map_err(|source| FetchError::Request {
            attempts: requests,
            source,
        })?;

        let mut reads = 0;
        let data = run_with_retry(
            &self.read_policy,
            |_: &BodyError| ErrorKind::Connection,
            |attempt| {
                reads = attempt;
                match body.read_body() {
                    Err(BodyError::Incomplete { received }) => {
                        tracing::warn!(
                            start,
                            end,
                            received = received.len(),
                            "incomplete body, zero-padding to range length"
                        );
                        Ok(received)
                    }
                    Err(e) => {
                        tracing::debug!(start, end, attempt, "body read failed: {}", e);
                        Err(e)
                    }
                    ok => ok,
                }
            },
        )
        .map_err(|source| FetchError::Read {
            attempts: reads,
            source,
        })?;

        pad_to_range(data, expected)
    }
}

/// Zero-pad a short body to `expected` bytes; reject a body that overshoots.
fn pad_to_range(mut data: Vec<u8>, expected: u64) -> Result<Vec<u8>, FetchError> {
    let received = data.len() as u64;
    if received > expected {
        return Err(FetchError::RangeIgnored { expected, received });
    }
    data.resize(expected as usize, 0);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::scripted::{Reply, ScriptedTransport};
    use std::time::Duration;

    fn body() -> Vec<u8> {
        (1u8..=200).cycle().take(4000).collect()
    }

    fn fetcher(transport: Arc<ScriptedTransport>) -> RangeFetcher {
        RangeFetcher::new(
            transport,
            "http://test/object",
            RetryPolicy::new(5, Duration::ZERO),
            RetryPolicy::new(10, Duration::ZERO),
        )
    }

    #[test]
    fn returns_exact_range() {
        let t = Arc::new(ScriptedTransport::new(body()));
        let data = fetcher(t.clone()).fetch(1000, 1999).unwrap();
        assert_eq!(data, body()[1000..2000]);
        assert_eq!(t.calls_for(1000), 1);
    }

    #[test]
    fn incomplete_body_is_zero_padded() {
        let t = Arc::new(ScriptedTransport::new(body()).with_responder(|_, _| Reply::Incomplete(300)));
        let data = fetcher(t.clone()).fetch(0, 999).unwrap();
        assert_eq!(data.len(), 1000);
        assert_eq!(data[..300], body()[..300]);
        assert!(data[300..].iter().all(|&b| b == 0));
        assert_eq!(t.calls_for(0), 1);
    }

    #[test]
    fn short_body_is_zero_padded() {
        let t = Arc::new(ScriptedTransport::new(body()).with_responder(|_, _| Reply::Short(10)));
        let data = fetcher(t).fetch(500, 599).unwrap();
        assert_eq!(data.len(), 100);
        assert_eq!(data[..10], body()[500..510]);
        assert!(data[10..].iter().all(|&b| b == 0));
    }

    #[test]
    fn request_retried_five_times_then_fails() {
        let t = Arc::new(ScriptedTransport::new(body()).with_responder(|_, _| Reply::Status(503)));
        let err = fetcher(t.clone()).fetch(0, 99).unwrap_err();
        assert!(matches!(err, FetchError::Request { attempts: 5, .. }));
        assert_eq!(t.calls_for(0), 5);
    }

    #[test]
    fn request_recovers_within_budget() {
        let t = Arc::new(ScriptedTransport::new(body()).with_responder(|_, call| {
            if call < 5 {
                Reply::Status(500)
            } else {
                Reply::Full
            }
        }));
        let data = fetcher(t.clone()).fetch(0, 99).unwrap();
        assert_eq!(data, body()[..100]);
        assert_eq!(t.calls_for(0), 5);
    }

    #[test]
    fn non_transient_status_fails_immediately() {
        let t = Arc::new(ScriptedTransport::new(body()).with_responder(|_, _| Reply::Status(404)));
        let err = fetcher(t.clone()).fetch(0, 99).unwrap_err();
        assert!(matches!(err, FetchError::Request { attempts: 1, .. }));
        assert_eq!(t.calls_for(0), 1);
    }

    #[test]
    fn flaky_reads_recover_without_new_request() {
        let t = Arc::new(ScriptedTransport::new(body()).with_responder(|_, _| Reply::FlakyRead(9)));
        let data = fetcher(t.clone()).fetch(100, 199).unwrap();
        assert_eq!(data, body()[100..200]);
        assert_eq!(t.calls_for(100), 1);
    }

    #[test]
    fn read_budget_is_ten_attempts() {
        let t = Arc::new(ScriptedTransport::new(body()).with_responder(|_, _| Reply::BrokenRead));
        let err = fetcher(t).fetch(0, 99).unwrap_err();
        assert!(matches!(err, FetchError::Read { attempts: 10, .. }));
    }

    #[test]
    fn oversized_body_is_rejected() {
        let t = Arc::new(ScriptedTransport::new(body()).with_responder(|_, _| Reply::WholeObject));
        let err = fetcher(t).fetch(0, 99).unwrap_err();
        assert!(matches!(
            err,
            FetchError::RangeIgnored {
                expected: 100,
                received: 4000
            }
        ));
    }
}

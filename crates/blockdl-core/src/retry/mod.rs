//! Retry policy and error classification.
//!
//! Encapsulates the fixed-delay attempt budgets used by the metadata probe
//! and the range fetcher, plus the classification of request failures
//! (timeouts, throttling, connection failures) into retryable kinds.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify_curl_error, classify_http_status};
pub use error::{BodyError, FetchError, RequestError};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;

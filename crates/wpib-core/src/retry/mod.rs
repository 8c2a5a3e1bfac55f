//! Retry and backoff policy for file transfers.
//!
//! This module encapsulates error classification (timeouts, connection
//! failures, integrity failures) and exponential backoff decisions. Protocol
//! and HTTP status errors are never retried.

mod classify;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;

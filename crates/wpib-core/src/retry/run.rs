//! Retry loop: run a closure until success or policy says stop.

use super::classify;
use super::policy::{RetryDecision, RetryPolicy};
use crate::control::CancelToken;
use crate::error::{Error, Result};

/// Runs a closure until it succeeds or the retry policy says to stop.
/// On retryable failure, sleeps for the backoff duration then tries again.
/// The closure receives the 1-based attempt number.
pub fn run_with_retry<T, F>(
    policy: &RetryPolicy,
    cancel: &CancelToken,
    label: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut(u32) -> Result<T>,
{
    let mut attempt = 1u32;
    loop {
        match f(attempt) {
            Ok(value) => return Ok(value),
            Err(e) => {
                let kind = classify::classify(&e);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => return Err(e),
                    RetryDecision::RetryAfter(d) => {
                        tracing::warn!(attempt, ?kind, "{} failed, retrying in {:?}: {}", label, d, e);
                        if !cancel.sleep(d) {
                            return Err(Error::Cancelled(label.to_string()));
                        }
                        attempt += 1;
                    }
                }
            }
        }
    }
}

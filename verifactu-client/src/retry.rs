//! The retry-with-backoff loop (§4.5.1).
//!
//! Grounded on `lexe-api::rest::RestClient::send_with_retries_inner`'s
//! shape: a bounded `for` loop over attempts, sleeping on
//! `verifactu_std::backoff` durations between them, with the last attempt
//! falling out of the loop rather than sleeping again.

use std::future::Future;

use verifactu_std::cancel::CancelToken;
use verifactu_types::error::{ErrorKind, VerifactuError};

use crate::config::RetryPolicy;

/// Runs `attempt` up to `policy.max_retries + 1` times total, sleeping
/// between re-attempts per the policy's backoff/jitter parameters (or the
/// failing error's own suggested delay, if any). Stops early the first time
/// `policy.should_retry` says no for the latest error.
///
/// `before_retry` runs just before each re-attempt (after the sleep) — used
/// by the submission client to roll the chain back to its pre-call
/// snapshot (§4.5 `submitWithRetry` step 2).
pub async fn with_retry<Attempt, AttemptFut, T, BeforeRetry, BeforeFut>(
    policy: &RetryPolicy,
    cancel: Option<&CancelToken>,
    mut attempt: Attempt,
    mut before_retry: BeforeRetry,
) -> Result<T, VerifactuError>
where
    Attempt: FnMut() -> AttemptFut,
    AttemptFut: Future<Output = Result<T, VerifactuError>>,
    BeforeRetry: FnMut() -> BeforeFut,
    BeforeFut: Future<Output = ()>,
{
    let mut attempt_index: u32 = 0;
    loop {
        if let Some(token) = cancel {
            if token.is_cancelled() {
                return Err(cancelled_error());
            }
        }

        match attempt().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt_index >= policy.max_retries || !policy.should_retry(&error) {
                    return Err(error);
                }

                if let Some(on_retry) = &policy.on_retry {
                    on_retry(attempt_index, &error);
                }

                let delay = error
                    .retry_hint
                    .and_then(|hint| hint.suggested_delay)
                    .unwrap_or_else(|| computed_delay(policy, attempt_index));

                let cancelled = match cancel {
                    Some(token) => {
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => false,
                            _ = token.cancelled() => true,
                        }
                    }
                    None => {
                        tokio::time::sleep(delay).await;
                        false
                    }
                };
                if cancelled {
                    return Err(cancelled_error());
                }

                before_retry().await;
                attempt_index += 1;
            }
        }
    }
}

fn computed_delay(policy: &RetryPolicy, attempt_index: u32) -> std::time::Duration {
    verifactu_std::backoff::delay_with_jitter(
        attempt_index,
        policy.initial_delay.as_millis() as u64,
        policy.max_delay.as_millis() as u64,
        policy.backoff_multiplier,
        policy.jitter_factor,
        rand::random(),
    )
}

/// §5's "distinct cancelled error": modeled as a non-retryable `Timeout`
/// kind with its own code, rather than a new taxonomy branch, the same way
/// the limiter's queue timeout gets its own code under the same kind.
fn cancelled_error() -> VerifactuError {
    VerifactuError::new(
        ErrorKind::Timeout,
        "timeout_error/cancelled",
        "operation was cancelled",
    )
}

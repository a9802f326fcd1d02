//! # `verifactu-limiter`
//!
//! The Concurrency Limiter (§4.4): bounds how many submissions are in
//! flight against the authority at once, queuing callers past that bound
//! and failing a queued wait past a configurable timeout.
//!
//! Grounded on `tokio::sync::Semaphore`'s documented FIFO fairness (waiters
//! are granted permits in the order they called `acquire`), racing the
//! acquire against `tokio::time::timeout`.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::sync::Semaphore;
use verifactu_types::{ErrorKind, VerifactuError};

/// How many submissions may be in flight against the authority at once.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MaxConcurrency {
    Unlimited,
    Limited(usize),
}

impl MaxConcurrency {
    /// A bound of zero makes no sense (nothing would ever run), so it's
    /// floored to one rather than treated as a caller error.
    pub fn limited(n: usize) -> Self {
        MaxConcurrency::Limited(n.max(1))
    }
}

/// A point-in-time snapshot of the limiter's load, for callers that want to
/// observe backpressure without instrumenting every submission.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LimiterStats {
    pub active: usize,
    pub queued: usize,
    pub max: Option<usize>,
    pub is_at_capacity: bool,
}

/// Bounds concurrent access to a scarce resource (the authority's endpoint)
/// with a FIFO wait queue and a per-wait timeout.
///
/// `MaxConcurrency::Unlimited` makes every method a pass-through with no
/// bookkeeping cost, so callers don't need a separate code path for the
/// unbounded case.
pub struct ConcurrencyLimiter {
    semaphore: Option<Arc<Semaphore>>,
    max: Option<usize>,
    queue_timeout: Duration,
    queued: Arc<AtomicUsize>,
}

impl ConcurrencyLimiter {
    pub fn new(max_concurrency: MaxConcurrency, queue_timeout: Duration) -> Self {
        let (semaphore, max) = match max_concurrency {
            MaxConcurrency::Unlimited => (None, None),
            MaxConcurrency::Limited(n) => (Some(Arc::new(Semaphore::new(n))), Some(n)),
        };
        ConcurrencyLimiter {
            semaphore,
            max,
            queue_timeout,
            queued: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Runs `thunk` once a slot is available, waiting in FIFO order behind
    /// any earlier callers. Fails with a non-retryable timeout error if no
    /// slot opens up within the configured queue timeout; the queue
    /// timeout is distinct from (and orthogonal to) the transport timeout
    /// applied once `thunk` actually starts running.
    pub async fn execute<F, Fut, T>(&self, thunk: F) -> Result<T, VerifactuError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let Some(semaphore) = self.semaphore.clone() else {
            return Ok(thunk().await);
        };

        self.queued.fetch_add(1, Ordering::SeqCst);
        let permit = tokio::time::timeout(self.queue_timeout, semaphore.acquire_owned()).await;
        // `fetch_sub` returns the pre-decrement count, i.e. the queue length
        // (including this caller) at the moment `permit` resolved.
        let queue_depth_at_failure = self.queued.fetch_sub(1, Ordering::SeqCst);

        let _permit = match permit {
            Ok(Ok(permit)) => permit,
            Ok(Err(_closed)) => {
                return Err(VerifactuError::new(
                    ErrorKind::Chain,
                    "chain_error/limiter_closed",
                    "concurrency limiter was closed while a caller was queued",
                ))
            }
            Err(_elapsed) => {
                let mut err = VerifactuError::timeout(format!(
                    "queue wait exceeded {:?} with the concurrency limit already saturated \
                     ({queue_depth_at_failure} callers queued, including this one)",
                    self.queue_timeout
                ));
                err.code = "timeout_error/queue";
                return Err(err);
            }
        };

        Ok(thunk().await)
    }

    /// A snapshot of current load. `active` is derived from the semaphore's
    /// available-permit count, so it only reflects permits acquired through
    /// this limiter, not any other consumer of the same `Semaphore`.
    pub fn stats(&self) -> LimiterStats {
        match (&self.semaphore, self.max) {
            (Some(semaphore), Some(max)) => {
                let available = semaphore.available_permits();
                let active = max.saturating_sub(available);
                let queued = self.queued.load(Ordering::SeqCst);
                LimiterStats {
                    active,
                    queued,
                    max: Some(max),
                    is_at_capacity: active >= max,
                }
            }
            _ => LimiterStats {
                active: 0,
                queued: 0,
                max: None,
                is_at_capacity: false,
            },
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn unlimited_never_queues() {
        let limiter = ConcurrencyLimiter::new(MaxConcurrency::Unlimited, Duration::from_millis(1));
        let result = limiter.execute(|| async { 42 }).await.unwrap();
        assert_eq!(result, 42);
        assert_eq!(limiter.stats().max, None);
    }

    #[tokio::test]
    async fn third_task_times_out_while_two_are_in_flight() {
        let limiter = Arc::new(ConcurrencyLimiter::new(
            MaxConcurrency::limited(2),
            Duration::from_millis(50),
        ));
        let completed = Arc::new(AtomicUsize::new(0));

        let spawn_holder = |limiter: Arc<ConcurrencyLimiter>, completed: Arc<AtomicUsize>| {
            tokio::spawn(async move {
                limiter
                    .execute(|| async {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        completed.fetch_add(1, Ordering::SeqCst);
                    })
                    .await
            })
        };

        let t1 = spawn_holder(limiter.clone(), completed.clone());
        let t2 = spawn_holder(limiter.clone(), completed.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;

        let t3 = limiter.execute(|| async { unreachable!("third task must not run") });
        let t3_result = t3.await;
        assert!(t3_result.is_err());
        let err = t3_result.unwrap_err();
        assert_eq!(err.code, "timeout_error/queue");
        assert!(!err.default_retryable());

        t1.await.unwrap().unwrap();
        t2.await.unwrap().unwrap();
        assert_eq!(completed.load(Ordering::SeqCst), 2);

        let stats = limiter.stats();
        assert_eq!(stats.active, 0);
        assert_eq!(stats.queued, 0);
    }

    #[tokio::test]
    async fn stats_report_capacity_while_saturated() {
        let limiter = Arc::new(ConcurrencyLimiter::new(
            MaxConcurrency::limited(1),
            Duration::from_millis(500),
        ));
        let limiter2 = limiter.clone();
        let holder = tokio::spawn(async move {
            limiter2
                .execute(|| async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                })
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let stats = limiter.stats();
        assert!(stats.is_at_capacity);
        assert_eq!(stats.active, 1);

        holder.await.unwrap().unwrap();
        assert!(!limiter.stats().is_at_capacity);
    }
}

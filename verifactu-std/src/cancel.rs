//! A cooperative cancellation token, signaled at most once.
//!
//! Grounded on the same "closed zero-permit semaphore" trick used for
//! shutdown signaling elsewhere in the ecosystem: a [`Semaphore`] starting
//! at zero permits never yields a permit, only an [`AcquireError`] once
//! [`Semaphore::close`] is called — so `acquire` doubles as "wait for
//! cancellation".
//!
//! [`AcquireError`]: tokio::sync::AcquireError

use std::sync::Arc;

use tokio::sync::Semaphore;

/// A multi-producer, multi-consumer, fire-once cancellation signal.
///
/// Any clone can call [`CancelToken::cancel`]; every clone (existing or
/// cloned afterward) observes it via [`CancelToken::cancelled`] or
/// [`CancelToken::is_cancelled`].
#[derive(Clone, Debug)]
pub struct CancelToken {
    inner: Arc<Semaphore>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken {
            inner: Arc::new(Semaphore::new(0)),
        }
    }

    /// Signals cancellation. Safe to call more than once.
    pub fn cancel(&self) {
        self.inner.close();
    }

    /// Resolves once [`CancelToken::cancel`] has been called on this token or
    /// any of its clones. If cancellation already happened, resolves
    /// immediately.
    pub async fn cancelled(&self) {
        let _ = self.inner.acquire().await;
    }

    /// Non-blocking check, for call sites that poll rather than await.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_closed()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

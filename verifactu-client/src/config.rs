//! Client and retry-policy configuration (§4.5, §4.5.1).

use std::{sync::Arc, time::Duration};

use verifactu_types::{error::VerifactuError, ChainState, Environment, SoftwareDescriptor};

use crate::credentials::TransportCredentials;

/// The default transport and queue timeouts (§5 Timeouts).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// `ClientConfig` mirrors §4.5's configuration shape.
pub struct ClientConfig {
    pub environment: Environment,
    pub transport_credentials: TransportCredentials,
    pub software: SoftwareDescriptor,
    pub request_timeout: Duration,
    pub initial_chain_state: Option<ChainState>,
    pub retry_policy: RetryPolicy,
    pub max_concurrency: verifactu_limiter::MaxConcurrency,
    pub queue_timeout: Duration,
}

impl ClientConfig {
    /// All optional fields default exactly as named in §4.5.1 and §6: 30s
    /// request timeout, 30s queue timeout, no concurrency cap, and the
    /// default retry policy.
    pub fn new(
        environment: Environment,
        transport_credentials: TransportCredentials,
        software: SoftwareDescriptor,
    ) -> Self {
        ClientConfig {
            environment,
            transport_credentials,
            software,
            request_timeout: DEFAULT_TIMEOUT,
            initial_chain_state: None,
            retry_policy: RetryPolicy::default(),
            max_concurrency: verifactu_limiter::MaxConcurrency::Unlimited,
            queue_timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_initial_chain_state(mut self, state: ChainState) -> Self {
        self.initial_chain_state = Some(state);
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: verifactu_limiter::MaxConcurrency) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    #[must_use]
    pub fn with_queue_timeout(mut self, timeout: Duration) -> Self {
        self.queue_timeout = timeout;
        self
    }
}

/// An override for the default retryability table (§4.5.1, §7).
pub type IsRetryableFn = Arc<dyn Fn(&VerifactuError) -> bool + Send + Sync>;

/// Invoked before each re-attempt's backoff sleep, for caller-side metrics
/// or logging beyond this crate's own `tracing` instrumentation.
pub type OnRetryFn = Arc<dyn Fn(u32, &VerifactuError) + Send + Sync>;

/// The retry policy from §4.5.1. All numeric values are sanitized on
/// construction to the domains named there.
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
    pub is_retryable: Option<IsRetryableFn>,
    pub on_retry: Option<OnRetryFn>,
}

impl RetryPolicy {
    pub fn new(
        max_retries: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
        jitter_factor: f64,
    ) -> Self {
        RetryPolicy {
            max_retries,
            initial_delay,
            max_delay: max_delay.max(initial_delay),
            backoff_multiplier: backoff_multiplier.max(1.0),
            jitter_factor: jitter_factor.clamp(0.0, 1.0),
            is_retryable: None,
            on_retry: None,
        }
    }

    #[must_use]
    pub fn with_is_retryable(mut self, f: IsRetryableFn) -> Self {
        self.is_retryable = Some(f);
        self
    }

    #[must_use]
    pub fn with_on_retry(mut self, f: OnRetryFn) -> Self {
        self.on_retry = Some(f);
        self
    }

    /// Whether `error` should be retried. A caller-supplied override takes
    /// final precedence when present; otherwise the error's own retry hint
    /// decides; otherwise the default retryability table (§4.5.1, §7).
    pub(crate) fn should_retry(&self, error: &VerifactuError) -> bool {
        if let Some(is_retryable) = &self.is_retryable {
            return is_retryable(error);
        }
        if let Some(hint) = error.retry_hint {
            return hint.retryable;
        }
        error.default_retryable()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(
            3,
            Duration::from_millis(1000),
            Duration::from_millis(30_000),
            2.0,
            0.1,
        )
    }
}

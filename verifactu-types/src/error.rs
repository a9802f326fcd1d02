//! The error taxonomy from the submission engine's error-handling design.
//!
//! Grounded on `lexe-api-core::error`'s split between a small `ErrorKind` enum
//! and one carrying struct, kept as a single [`thiserror`]-derived carrying
//! struct since the seven kinds here are fixed and don't need the teacher's
//! macro-generated per-service kind sets.

use std::time::Duration;

use thiserror::Error;

/// The seven error kinds from the error-handling design.
#[derive(Copy, Clone, Debug, Eq, PartialEq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Caller-supplied record violates a structural constraint.
    Validation,
    /// The underlying digest primitive failed.
    Hash,
    /// Attempt to restore from an incoherent snapshot, or a verify mismatch.
    Chain,
    /// Connection refused, DNS failure, reset, TLS handshake failure, etc.
    Network,
    /// Transport deadline exceeded, or the limiter's queue wait timed out.
    Timeout,
    /// The peer returned a valid SOAP envelope containing a `Fault`.
    Soap,
    /// Response was well-formed but semantically rejected by the authority.
    Aeat,
}

/// Whether a retryable error carries a concrete suggested delay, overriding
/// the retry policy's computed backoff (§4.5.1).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RetryHint {
    pub retryable: bool,
    pub suggested_delay: Option<Duration>,
}

impl RetryHint {
    pub const NOT_RETRYABLE: Self = RetryHint {
        retryable: false,
        suggested_delay: None,
    };

    pub const fn retryable() -> Self {
        RetryHint {
            retryable: true,
            suggested_delay: None,
        }
    }

    pub const fn retryable_after(delay: Duration) -> Self {
        RetryHint {
            retryable: true,
            suggested_delay: Some(delay),
        }
    }
}

/// A stable error code string, e.g. `"chain/incoherent_snapshot"`.
pub type ErrorCode = &'static str;

/// The common error type returned by every fallible operation in the
/// submission engine.
///
/// Carries a kind, a stable code, a human message, an optional cause, an
/// optional field pointer, and an optional retry hint, per the
/// error-handling design.
#[derive(Debug, Error)]
#[error("{kind} ({code}): {message}")]
pub struct VerifactuError {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub message: String,
    pub field: Option<&'static str>,
    pub retry_hint: Option<RetryHint>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl VerifactuError {
    pub fn new(kind: ErrorKind, code: ErrorCode, message: impl Into<String>) -> Self {
        VerifactuError {
            kind,
            code,
            message: message.into(),
            field: None,
            retry_hint: None,
            source: None,
        }
    }

    #[must_use]
    pub fn with_field(mut self, field: &'static str) -> Self {
        self.field = Some(field);
        self
    }

    #[must_use]
    pub fn with_retry_hint(mut self, hint: RetryHint) -> Self {
        self.retry_hint = Some(hint);
        self
    }

    #[must_use]
    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, "validation_error", message)
    }

    pub fn hash(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Hash, "hash_error", message)
    }

    pub fn chain(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Chain, "chain_error", message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, "network_error", message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, "timeout_error", message)
    }

    pub fn soap(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Soap, "soap_error", message)
    }

    pub fn aeat(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Aeat, "aeat_error", message)
    }

    /// The default retryability table from §4.5.1 and §7, consulted by the
    /// retry wrapper before any caller-supplied `is_retryable` override.
    pub fn default_retryable(&self) -> bool {
        match self.kind {
            ErrorKind::Network => self.code != "network_error/tls_handshake",
            ErrorKind::Timeout => self.code == "timeout_error/transport",
            ErrorKind::Validation
            | ErrorKind::Hash
            | ErrorKind::Chain
            | ErrorKind::Soap
            | ErrorKind::Aeat => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, VerifactuError>;

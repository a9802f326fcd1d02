//! # `verifactu`
//!
//! A client for Spain's Verifactu electronic invoice registration system:
//! builds the hash-chained invoice records, encodes the AEAT SOAP
//! envelopes, and submits them over a rate-limited, retrying mTLS
//! transport.
//!
//! This crate re-exports the public API of the underlying `verifactu-*`
//! crates so most callers only need this one dependency. Reach for the
//! underlying crates directly only if you need the envelope codec or hash
//! engine standalone (e.g. to verify a fingerprint offline).
//!
//! ```no_run
//! use verifactu::{ClientConfig, Environment, TransportCredentials, VerifactuClient};
//!
//! # async fn run() -> Result<(), verifactu::VerifactuError> {
//! let credentials = TransportCredentials::from_der(vec![/* cert chain */], vec![/* key */]);
//! let config = ClientConfig::new(Environment::Sandbox, credentials, todo!());
//! let client = VerifactuClient::new(config)?;
//! # Ok(())
//! # }
//! ```

pub use verifactu_chain::{check_snapshot_coherent, RecordChain};
pub use verifactu_client::{
    qr, ClientConfig, IsRetryableFn, OnRetryFn, QueryResponse, RetryPolicy, SubmitResponse,
    Transport, TransportCredentials, VerifactuClient, DEFAULT_TIMEOUT,
};
pub use verifactu_hash::{canonical_input, fingerprint, fingerprint_of_input, format_amount};
pub use verifactu_limiter::{ConcurrencyLimiter, LimiterStats, MaxConcurrency};
pub use verifactu_std::cancel::CancelToken;
pub use verifactu_types::{
    error, Cancellation, ChainReference, ChainState, Environment, ErrorKind, ExemptLine,
    Fingerprint, InvoiceIdentity, NonSubjectLine, Operation, ProcessedRecord, Recipient,
    RecipientTaxId, Record, RectificationInfo, RectificationKind, Registration, RetryHint,
    SoftwareDescriptor, TaxBreakdown, VatLine, VerifactuError,
};
pub use verifactu_xml::{
    build_cancel, build_query, build_register, parse_response, ParsedResponse, ResponseState,
};

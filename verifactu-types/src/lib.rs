//! # `verifactu-types`
//!
//! The shared data model (records, tax breakdowns, chain state) and error
//! taxonomy for the Verifactu submission engine. No I/O.

pub mod chain;
pub mod environment;
pub mod error;
pub mod record;

pub use chain::{ChainReference, ChainState, Fingerprint, ProcessedRecord};
pub use environment::{Environment, Operation};
pub use error::{ErrorKind, RetryHint, VerifactuError};
pub use record::{
    Cancellation, ExemptLine, InvoiceIdentity, NonSubjectLine, Recipient, RecipientTaxId, Record,
    RectificationInfo, RectificationKind, Registration, SoftwareDescriptor, TaxBreakdown, VatLine,
};

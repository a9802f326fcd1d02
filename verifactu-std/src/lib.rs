//! # `verifactu-std`
//!
//! Small, dependency-light extensions shared by the other `verifactu-*`
//! crates: backoff math, display helpers, and a cooperative cancellation
//! token (`tokio::sync` is the one dependency pulled in, for the latter).

pub mod backoff;
pub mod cancel;
pub mod fmt;

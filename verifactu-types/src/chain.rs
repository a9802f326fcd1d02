//! The record chain's state and related wire-adjacent types (§3).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::record::Record;

/// A 256-bit digest expressed as a fixed-length base64 string. Opaque to
/// consumers; compared only by string equality (or constant-time string
/// equality in security-sensitive contexts — see [`Fingerprint::verify_eq`]).
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Constant-time string equality, for use in security-sensitive
    /// verification contexts (§4.2 `verify`).
    pub fn verify_eq(&self, other: &Fingerprint) -> bool {
        let a = self.0.as_bytes();
        let b = other.0.as_bytes();
        if a.len() != b.len() {
            return false;
        }
        let mut diff: u8 = 0;
        for (x, y) in a.iter().zip(b.iter()) {
            diff |= x ^ y;
        }
        diff == 0
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Fingerprint(s)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reference to the previously submitted record, populated on every
/// advance after the first.
///
/// `previous_date` is the *invoice issue date* of the previous record (not
/// its generation instant) — §8 scenario 2 renders `RegistroAnterior` with a
/// bare date (`2024-01-15`), which only the invoice identity carries; the
/// generation instant is never persisted past the record it was computed
/// for.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChainReference {
    pub previous_fingerprint: Fingerprint,
    pub previous_date: NaiveDate,
    pub previous_series: Option<String>,
    pub previous_number: String,
}

/// Immutable decoration of an input record with its fingerprint and (if the
/// chain wasn't first) a reference to the previous record.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessedRecord {
    pub record: Record,
    pub fingerprint: Fingerprint,
    pub chain_reference: Option<ChainReference>,
}

/// The chain's durable, caller-persisted state.
///
/// Lifecycle: created empty (`is_first=true`, empty strings, epoch date,
/// count 0); mutated only by a successful advance; destroyed when the owning
/// client is discarded. Serializable — this is the caller's durable handle.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChainState {
    pub previous_fingerprint: Fingerprint,
    pub previous_date: NaiveDate,
    pub previous_series: Option<String>,
    pub previous_number: String,
    pub record_count: u64,
    pub is_first: bool,
}

impl ChainState {
    /// The empty initial state.
    pub fn new() -> Self {
        ChainState {
            previous_fingerprint: Fingerprint::default(),
            previous_date: epoch(),
            previous_series: None,
            previous_number: String::new(),
            record_count: 0,
            is_first: true,
        }
    }
}

impl Default for ChainState {
    fn default() -> Self {
        Self::new()
    }
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).expect("unix epoch is a valid date")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_state_is_first_and_empty() {
        let state = ChainState::new();
        assert!(state.is_first);
        assert_eq!(state.record_count, 0);
        assert_eq!(state.previous_fingerprint.as_str(), "");
        assert_eq!(state.previous_number, "");
    }

    #[test]
    fn fingerprint_verify_eq() {
        let a = Fingerprint::from("abc".to_string());
        let b = Fingerprint::from("abc".to_string());
        let c = Fingerprint::from("abd".to_string());
        assert!(a.verify_eq(&b));
        assert!(!a.verify_eq(&c));
    }

    #[test]
    fn chain_state_roundtrips_through_json() {
        let state = ChainState::new();
        let json = serde_json::to_string(&state).unwrap();
        let back: ChainState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }
}

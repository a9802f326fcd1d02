//! # `verifactu-chain`
//!
//! The Record Chain (§4.2): an in-memory state object holding the
//! last-accepted record's fingerprint, identity, and date. Has no I/O and no
//! intrinsic errors beyond "restore from an incoherent snapshot" — it never
//! retries, never surfaces recoverable failures.

use chrono::{DateTime, FixedOffset};
use verifactu_types::{
    error::VerifactuError, ChainReference, ChainState, ProcessedRecord, Record,
};

/// The chain's state machine. Owns its [`ChainState`] exclusively; a
/// snapshot is an owned copy the caller holds for rollback.
#[derive(Clone, Debug, Default)]
pub struct RecordChain {
    state: ChainState,
}

impl RecordChain {
    pub fn new() -> Self {
        RecordChain {
            state: ChainState::new(),
        }
    }

    /// Resumes a chain from a caller-persisted [`ChainState`].
    pub fn from_state(state: ChainState) -> Self {
        RecordChain { state }
    }

    pub fn is_first(&self) -> bool {
        self.state.is_first
    }

    pub fn record_count(&self) -> u64 {
        self.state.record_count
    }

    /// A value-copy of the current state, for later [`RecordChain::restore`].
    pub fn snapshot(&self) -> ChainState {
        self.state.clone()
    }

    /// Replaces the state wholesale from a previously captured snapshot.
    pub fn restore(&mut self, snapshot: ChainState) {
        self.state = snapshot;
    }

    /// Processes `record`, assigning its previous-reference and new
    /// fingerprint, and advances the state. §4.2 steps 1-6.
    pub fn process(&mut self, record: Record, generated_at: DateTime<FixedOffset>) -> ProcessedRecord {
        let was_first = self.state.is_first;
        let previous_fingerprint = if was_first {
            String::new()
        } else {
            self.state.previous_fingerprint.as_str().to_string()
        };

        let chain_reference = if was_first {
            None
        } else {
            Some(ChainReference {
                previous_fingerprint: self.state.previous_fingerprint.clone(),
                previous_date: self.state.previous_date,
                previous_series: self.state.previous_series.clone(),
                previous_number: self.state.previous_number.clone(),
            })
        };

        let new_fingerprint =
            verifactu_hash::fingerprint(&record, &previous_fingerprint, generated_at);

        self.state = ChainState {
            previous_fingerprint: new_fingerprint.clone(),
            previous_date: record.invoice().issue_date,
            previous_series: record.invoice().series.clone(),
            previous_number: record.invoice().number.clone(),
            record_count: self.state.record_count + 1,
            is_first: false,
        };

        ProcessedRecord {
            record,
            fingerprint: new_fingerprint,
            chain_reference,
        }
    }

    /// Recomputes the fingerprint for `record` given `previous_fingerprint`
    /// and `generated_at`, and compares it to `claimed` by constant-time
    /// string equality (§4.2 `verify`, used in security-sensitive contexts).
    pub fn verify(
        record: &Record,
        claimed: &verifactu_types::Fingerprint,
        previous_fingerprint: &str,
        generated_at: DateTime<FixedOffset>,
    ) -> bool {
        let recomputed = verifactu_hash::fingerprint(record, previous_fingerprint, generated_at);
        recomputed.verify_eq(claimed)
    }
}

/// Raised by callers that restore an externally-sourced [`ChainState`] they
/// can't vouch for — the chain itself never returns this; it's a helper for
/// orchestrators layering extra checks on top of caller-supplied snapshots.
pub fn check_snapshot_coherent(state: &ChainState) -> Result<(), VerifactuError> {
    if state.is_first && state.record_count != 0 {
        return Err(VerifactuError::chain(
            "snapshot claims is_first but has a non-zero record_count",
        ));
    }
    if !state.is_first && state.previous_fingerprint.as_str().is_empty() {
        return Err(VerifactuError::chain(
            "snapshot claims not-first but has an empty previous_fingerprint",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use verifactu_types::{InvoiceIdentity, Registration, TaxBreakdown, VatLine};

    use super::*;

    fn instant(hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 15, hour, 0, 0)
            .unwrap()
    }

    fn registration(number: &str) -> Record {
        let breakdown = TaxBreakdown::new(
            vec![VatLine {
                tax_base: dec!(100.00),
                rate: dec!(21),
                vat_amount: dec!(21.00),
                equivalence_surcharge_rate: None,
                equivalence_surcharge_amount: None,
            }],
            vec![],
            vec![],
        )
        .unwrap();
        Record::Registration(Registration {
            issuer_tax_id: "B12345678".into(),
            issuer_name: "Test Co SL".into(),
            invoice: InvoiceIdentity::new(
                Some("A"),
                number,
                chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            ),
            invoice_type: "F1".into(),
            recipients: vec![],
            description: None,
            operation_regimes: vec!["01".into()],
            breakdown,
            total_amount: dec!(121.00),
            rectification: None,
            software: None,
        })
    }

    #[test]
    fn first_record_has_no_chain_reference() {
        let mut chain = RecordChain::new();
        let processed = chain.process(registration("001"), instant(10));
        assert!(processed.chain_reference.is_none());
        assert!(!chain.is_first());
        assert_eq!(chain.record_count(), 1);
    }

    #[test]
    fn second_record_references_the_first() {
        let mut chain = RecordChain::new();
        let first = chain.process(registration("001"), instant(10));
        let second = chain.process(registration("002"), instant(11));

        let reference = second.chain_reference.unwrap();
        assert_eq!(reference.previous_fingerprint, first.fingerprint);
        assert_eq!(reference.previous_number, "001");
    }

    #[test]
    fn record_count_increases_by_exactly_one() {
        let mut chain = RecordChain::new();
        for (i, n) in ["001", "002", "003"].into_iter().enumerate() {
            chain.process(registration(n), instant(10));
            assert_eq!(chain.record_count(), (i + 1) as u64);
        }
    }

    #[test]
    fn snapshot_restore_reproduces_identical_fingerprint() {
        let mut chain = RecordChain::new();
        chain.process(registration("001"), instant(10));
        let snapshot = chain.snapshot();

        let record = registration("002");
        let original = chain.process(record.clone(), instant(11));

        chain.restore(snapshot);
        let replayed = chain.process(record, instant(11));

        assert_eq!(original.fingerprint, replayed.fingerprint);
        assert_eq!(original.chain_reference, replayed.chain_reference);
    }

    #[test]
    fn is_first_never_reverts_after_first_advance() {
        let mut chain = RecordChain::new();
        chain.process(registration("001"), instant(10));
        assert!(!chain.is_first());
        let snapshot_before_first = ChainState::new();
        // restoring an initial-looking snapshot is a caller decision; the
        // chain itself just reflects whatever state it's given.
        chain.restore(snapshot_before_first);
        assert!(chain.is_first());
    }

    #[test]
    fn verify_accepts_correct_fingerprint() {
        let mut chain = RecordChain::new();
        let record = registration("001");
        let processed = chain.process(record.clone(), instant(10));
        assert!(RecordChain::verify(
            &record,
            &processed.fingerprint,
            "",
            instant(10)
        ));
    }

    #[test]
    fn verify_rejects_tampered_fingerprint() {
        let record = registration("001");
        let bogus = verifactu_types::Fingerprint::from("not-a-real-hash".to_string());
        assert!(!RecordChain::verify(&record, &bogus, "", instant(10)));
    }

    proptest::proptest! {
        #[test]
        fn record_count_monotonic(n in 1usize..20) {
            let mut chain = RecordChain::new();
            for i in 0..n {
                chain.process(registration(&format!("{i:03}")), instant(10));
                proptest::prop_assert_eq!(chain.record_count(), (i + 1) as u64);
            }
        }
    }
}

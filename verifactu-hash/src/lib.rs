//! # `verifactu-hash`
//!
//! The Hash Engine (§4.1): a pure function from a record, a previous
//! fingerprint string, and a generation instant to a canonical input string
//! and its SHA-256 digest. No I/O, no state.

use base64::Engine as _;
use chrono::{DateTime, FixedOffset};
use ring::digest;
use verifactu_types::{record::round2, Fingerprint, Record};

/// Builds the canonical, `&`-joined `KEY=VALUE` input string for `record`.
///
/// Field order, key spelling, amount formatting, and timestamp formatting
/// are part of the wire contract and must never vary (§4.1 Determinism).
pub fn canonical_input(
    record: &Record,
    previous_fingerprint: &str,
    generated_at: DateTime<FixedOffset>,
) -> String {
    let mut fields = Vec::with_capacity(8);
    fields.push(format!("IDEmisorFactura={}", record.issuer_tax_id()));
    fields.push(format!(
        "NumSerieFactura={}",
        record.invoice().concatenated_series_number()
    ));
    fields.push(format!(
        "FechaExpedicionFactura={}",
        record.invoice().issue_date.format("%Y-%m-%d")
    ));

    if let Record::Registration(reg) = record {
        fields.push(format!("TipoFactura={}", reg.invoice_type));
        fields.push(format!(
            "CuotaTotal={}",
            format_amount(reg.breakdown.total_vat())
        ));
        fields.push(format!("ImporteTotal={}", format_amount(reg.total_amount)));
    }

    fields.push(format!("Huella={previous_fingerprint}"));
    fields.push(format!(
        "FechaHoraHusoGenRegistro={}",
        generated_at.format("%Y-%m-%dT%H:%M:%S%:z")
    ));

    fields.join("&")
}

/// Formats a monetary amount with exactly two decimals, a dot separator, and
/// an optional leading minus — the shared format used by the fingerprint
/// input and the XML envelope.
pub fn format_amount(amount: rust_decimal::Decimal) -> String {
    round2(amount).to_string()
}

/// SHA-256 of the UTF-8 bytes of [`canonical_input`], standard base64
/// encoded (with `+`, `/`, and `=` padding). The result is the fingerprint.
pub fn fingerprint(
    record: &Record,
    previous_fingerprint: &str,
    generated_at: DateTime<FixedOffset>,
) -> Fingerprint {
    let input = canonical_input(record, previous_fingerprint, generated_at);
    fingerprint_of_input(&input)
}

/// Hashes an already-built canonical input string. Exposed separately so
/// callers needing to verify a claimed fingerprint don't have to rebuild the
/// record first.
pub fn fingerprint_of_input(input: &str) -> Fingerprint {
    let digest = digest::digest(&digest::SHA256, input.as_bytes());
    let encoded = base64::engine::general_purpose::STANDARD.encode(digest.as_ref());
    Fingerprint::from(encoded)
}

//! The QR verification URL builder (§6).
//!
//! Promoted to a first-class, independently callable operation rather than
//! folded into `submit`, since callers render the QR code client-side and
//! may need the URL well after the original submission (e.g. reprinting an
//! invoice).

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use rust_decimal::Decimal;
use verifactu_types::{record::round2, Environment, Fingerprint, InvoiceIdentity};

/// Characters reserved in a URL query component, beyond the base
/// [`CONTROLS`] set — mirrors `percent_encoding`'s own `NON_ALPHANUMERIC`
/// guidance but keeps `-`, `.`, `_`, `~` unescaped per RFC 3986 unreserved
/// characters.
const QUERY_COMPONENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'/')
    .add(b':')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Builds the customer-facing QR verification URL for a registered invoice.
///
/// Note the date is `DD-MM-YYYY` with hyphen separators here, unlike the
/// XML envelope's `YYYY-MM-DD` (§6).
pub fn verification_url(
    environment: Environment,
    issuer_tax_id: &str,
    invoice: &InvoiceIdentity,
    total_amount: Decimal,
    fingerprint: &Fingerprint,
) -> String {
    let base = environment.qr_base_url();
    let concatenated = invoice.concatenated_series_number();
    let date = invoice.issue_date.format("%d-%m-%Y").to_string();
    let amount = round2(total_amount).to_string();

    format!(
        "{base}?nif={}&numserie={}&fecha={}&importe={}&huella={}",
        encode(issuer_tax_id),
        encode(&concatenated),
        encode(&date),
        encode(&amount),
        encode(fingerprint.as_str()),
    )
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, QUERY_COMPONENT).to_string()
}

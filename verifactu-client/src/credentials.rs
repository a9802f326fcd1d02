//! mTLS client credentials (§6 External Interfaces).
//!
//! Grounded on `lexe-tls::types::CertWithKey`, trimmed to DER-bytes-only
//! construction: loading certificates from PEM files or a keystore is an
//! external certificate provider's concern, explicitly out of scope (§1
//! Non-goals).

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

/// The client's X.509 certificate chain and PKCS#8 private key, DER-encoded.
#[derive(Clone)]
pub struct TransportCredentials {
    cert_chain: Vec<CertificateDer<'static>>,
    key: Vec<u8>,
}

impl TransportCredentials {
    /// `cert_chain_der` is the leaf certificate followed by any
    /// intermediates, each DER-encoded; `key_der` is the leaf's private key
    /// in PKCS#8 DER form.
    pub fn from_der(cert_chain_der: Vec<Vec<u8>>, key_der: Vec<u8>) -> Self {
        TransportCredentials {
            cert_chain: cert_chain_der.into_iter().map(CertificateDer::from).collect(),
            key: key_der,
        }
    }

    pub(crate) fn into_chain_and_key(self) -> (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>) {
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.key));
        (self.cert_chain, key)
    }
}

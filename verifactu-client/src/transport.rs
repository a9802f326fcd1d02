//! The HTTPS + mutual-TLS transport (§6 External Interfaces).
//!
//! Grounded on `lexe-api::rest::RestClient` for the client-builder/logging
//! shape, and on `node-client::client::RunRestClient` and
//! `lexe-tls-core::client_config_builder`/`WEBPKI_ROOT_CERTS` for wiring
//! `use_preconfigured_tls` with a client-auth certificate.

use std::{sync::Arc, time::Duration};

use verifactu_std::fmt::DisplayMs;
use verifactu_types::{
    error::{RetryHint, VerifactuError},
    Environment, Operation,
};

use crate::credentials::TransportCredentials;

/// TLS 1.2 and 1.3 are both accepted; the authority's endpoint is a standard
/// webpki-verified server, nothing exotic like the teacher's Ed25519-only
/// attestation verifier is needed here.
static TLS_PROTOCOL_VERSIONS: &[&rustls::SupportedProtocolVersion] =
    &[&rustls::version::TLS12, &rustls::version::TLS13];

/// Sends pre-built SOAP envelopes over HTTPS with mutual TLS and reads back
/// the raw response body. Holds no chain or retry state; see
/// [`crate::retry`] and `crate::client` for those.
pub struct Transport {
    client: reqwest::Client,
    environment: Environment,
}

impl Transport {
    pub fn new(
        environment: Environment,
        credentials: TransportCredentials,
        request_timeout: Duration,
    ) -> Result<Self, VerifactuError> {
        let tls_config = build_tls_config(credentials)?;
        let client = reqwest::Client::builder()
            .use_preconfigured_tls(tls_config)
            .https_only(true)
            .timeout(request_timeout)
            .build()
            .map_err(|e| VerifactuError::network("failed to build HTTPS client").with_source(e))?;
        Ok(Transport { client, environment })
    }

    /// POSTs `body` to `operation`'s endpoint for this transport's
    /// environment, with `Content-Type` and a quoted `SOAPAction` header per
    /// §6, and returns the raw UTF-8 response body.
    pub async fn send(&self, operation: Operation, body: String) -> Result<String, VerifactuError> {
        let url = self.environment.endpoint_url(operation);
        let soap_action = format!("\"{}\"", Environment::soap_action(operation));
        let start = std::time::Instant::now();

        tracing::debug!(%url, operation = ?operation_label(operation), "sending envelope");

        let response = self
            .client
            .post(&url)
            .header(http::header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", soap_action)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                let elapsed = DisplayMs(start.elapsed());
                tracing::warn!(%elapsed, error = %e, "transport send failed");
                classify_reqwest_error(e)
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            VerifactuError::network("failed to read response body").with_source(e)
        })?;

        let elapsed = DisplayMs(start.elapsed());
        if status.is_success() {
            tracing::debug!(%status, %elapsed, "received response");
        } else {
            tracing::warn!(%status, %elapsed, "non-success HTTP status");
        }

        Ok(text)
    }
}

fn operation_label(operation: Operation) -> &'static str {
    match operation {
        Operation::Register => "register",
        Operation::Cancel => "cancel",
        Operation::Query => "query",
    }
}

/// Classifies a `reqwest` failure per §7's `NetworkError`/`TimeoutError`
/// split: a TLS handshake failure (detected by walking the error's source
/// chain for a [`rustls::Error`]) is not retryable; other connect/timeout
/// failures are.
fn classify_reqwest_error(e: reqwest::Error) -> VerifactuError {
    if e.is_timeout() {
        let mut err = VerifactuError::timeout("transport request exceeded its deadline");
        err.code = "timeout_error/transport";
        err.retry_hint = Some(RetryHint::retryable());
        err
    } else if is_tls_handshake_failure(&e) {
        let mut err = VerifactuError::network(format!("TLS handshake failed: {e}"));
        err.code = "network_error/tls_handshake";
        err
    } else if e.is_connect() {
        VerifactuError::network(format!("connection failed: {e}"))
            .with_retry_hint(RetryHint::retryable())
    } else {
        VerifactuError::network(format!("request failed: {e}"))
    }
}

fn is_tls_handshake_failure(e: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(e);
    while let Some(err) = source {
        if err.downcast_ref::<rustls::Error>().is_some() {
            return true;
        }
        source = err.source();
    }
    false
}

fn build_tls_config(credentials: TransportCredentials) -> Result<rustls::ClientConfig, VerifactuError> {
    let roots = webpki_root_store();
    let (cert_chain, key) = credentials.into_chain_and_key();
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    rustls::ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(TLS_PROTOCOL_VERSIONS)
        .expect("TLS_PROTOCOL_VERSIONS is a valid, non-empty version list")
        .with_root_certificates(roots)
        .with_client_auth_cert(cert_chain, key)
        .map_err(|e| VerifactuError::network("invalid client certificate/key").with_source(e))
}

fn webpki_root_store() -> rustls::RootCertStore {
    let mut store = rustls::RootCertStore::empty();
    store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    store
}

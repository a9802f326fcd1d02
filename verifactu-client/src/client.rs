//! The Submission Client (§4.5): owns and composes the chain, codec,
//! limiter, and transport; holds the process-wide "last successful state"
//! via its chain.

use chrono::{DateTime, FixedOffset};
use tokio::sync::Mutex;
use verifactu_chain::RecordChain;
use verifactu_limiter::{ConcurrencyLimiter, LimiterStats};
use verifactu_std::cancel::CancelToken;
use verifactu_types::{
    error::VerifactuError, Cancellation, ChainState, Environment, InvoiceIdentity, Operation,
    ProcessedRecord, Record, SoftwareDescriptor,
};
use verifactu_xml::ResponseState;

use crate::{config::ClientConfig, config::RetryPolicy, retry, transport::Transport};

/// The outcome of a `submit`/`cancel` call (§4.5 steps 6).
#[derive(Clone, Debug)]
pub struct SubmitResponse {
    pub accepted: bool,
    pub state: ResponseState,
    pub verification_code: Option<String>,
    pub error_code: Option<String>,
    pub error_description: Option<String>,
    pub processed_record: ProcessedRecord,
}

/// The outcome of a `queryStatus` call. Read-only; never advances the chain.
#[derive(Clone, Debug)]
pub struct QueryResponse {
    pub accepted: bool,
    pub state: ResponseState,
    pub verification_code: Option<String>,
    pub error_code: Option<String>,
    pub error_description: Option<String>,
    pub registration_instant: Option<String>,
}

pub struct VerifactuClient {
    environment: Environment,
    software: SoftwareDescriptor,
    chain: Mutex<RecordChain>,
    transport: Transport,
    limiter: ConcurrencyLimiter,
    default_retry_policy: RetryPolicy,
}

impl VerifactuClient {
    pub fn new(config: ClientConfig) -> Result<Self, VerifactuError> {
        let chain = match config.initial_chain_state {
            Some(state) => RecordChain::from_state(state),
            None => RecordChain::new(),
        };
        let transport = Transport::new(
            config.environment,
            config.transport_credentials,
            config.request_timeout,
        )?;
        let limiter = ConcurrencyLimiter::new(config.max_concurrency, config.queue_timeout);
        Ok(VerifactuClient {
            environment: config.environment,
            software: config.software,
            chain: Mutex::new(chain),
            transport,
            limiter,
            default_retry_policy: config.retry_policy,
        })
    }

    /// §4.5 `submit`.
    pub async fn submit(&self, record: Record) -> Result<SubmitResponse, VerifactuError> {
        self.submit_once(record).await
    }

    /// §4.5 `cancel`: analogous to `submit`, using the cancel envelope.
    pub async fn cancel(
        &self,
        invoice: InvoiceIdentity,
        issuer_tax_id: impl Into<String>,
        reason: Option<String>,
    ) -> Result<SubmitResponse, VerifactuError> {
        let record = Record::Cancellation(Cancellation {
            invoice,
            issuer_tax_id: issuer_tax_id.into(),
            reason,
        });
        self.submit_once(record).await
    }

    /// §4.5 `queryStatus`: read-only, does not advance the chain.
    pub async fn query_status(
        &self,
        invoice: &InvoiceIdentity,
        issuer_tax_id: &str,
    ) -> Result<QueryResponse, VerifactuError> {
        let body = verifactu_xml::build_query(issuer_tax_id, invoice);
        let raw_xml = self
            .limiter
            .execute(|| self.transport.send(Operation::Query, body))
            .await??;
        let parsed = verifactu_xml::parse_response(&raw_xml)?;
        Ok(QueryResponse {
            accepted: parsed.state.accepted(),
            state: parsed.state,
            verification_code: parsed.verification_code,
            error_code: parsed.error_code,
            error_description: parsed.error_description,
            registration_instant: parsed.registration_instant,
        })
    }

    /// §4.5 `submitWithRetry`: captures a pre-call chain snapshot, retries
    /// `submit` per `policy` (or this client's default), restoring the
    /// snapshot before each re-attempt.
    pub async fn submit_with_retry(
        &self,
        record: Record,
        policy: Option<&RetryPolicy>,
        cancel: Option<&CancelToken>,
    ) -> Result<SubmitResponse, VerifactuError> {
        let policy = policy.unwrap_or(&self.default_retry_policy);
        let snapshot = self.chain_state().await;
        retry::with_retry(
            policy,
            cancel,
            move || {
                let record = record.clone();
                async move { self.submit_once(record).await }
            },
            || async { self.chain.lock().await.restore(snapshot.clone()) },
        )
        .await
    }

    /// §4.5 `cancelWithRetry`: mirrors `submitWithRetry`.
    pub async fn cancel_with_retry(
        &self,
        invoice: InvoiceIdentity,
        issuer_tax_id: impl Into<String>,
        reason: Option<String>,
        policy: Option<&RetryPolicy>,
        cancel: Option<&CancelToken>,
    ) -> Result<SubmitResponse, VerifactuError> {
        let issuer_tax_id = issuer_tax_id.into();
        let record = Record::Cancellation(Cancellation {
            invoice,
            issuer_tax_id,
            reason,
        });
        let policy = policy.unwrap_or(&self.default_retry_policy);
        let snapshot = self.chain_state().await;
        retry::with_retry(
            policy,
            cancel,
            move || {
                let record = record.clone();
                async move { self.submit_once(record).await }
            },
            || async { self.chain.lock().await.restore(snapshot.clone()) },
        )
        .await
    }

    /// §4.5 `queryStatusWithRetry`: no rollback needed, the chain is never
    /// touched.
    pub async fn query_status_with_retry(
        &self,
        invoice: &InvoiceIdentity,
        issuer_tax_id: &str,
        policy: Option<&RetryPolicy>,
        cancel: Option<&CancelToken>,
    ) -> Result<QueryResponse, VerifactuError> {
        let policy = policy.unwrap_or(&self.default_retry_policy);
        retry::with_retry(
            policy,
            cancel,
            || async { self.query_status(invoice, issuer_tax_id).await },
            || async {},
        )
        .await
    }

    /// §4.5 `chainState`: a pure read of the chain's current snapshot.
    pub async fn chain_state(&self) -> ChainState {
        self.chain.lock().await.snapshot()
    }

    /// §4.5 `softwareDescriptor`: a pure read of the embedded software
    /// descriptor attached to every registration this client submits.
    pub fn software_descriptor(&self) -> &SoftwareDescriptor {
        &self.software
    }

    /// §4.5 `concurrencyStats`: a pure, non-blocking read of the limiter's
    /// current load.
    pub fn concurrency_stats(&self) -> LimiterStats {
        self.limiter.stats()
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// §4.5 `submit`/`cancel` steps 1-6, shared by both operations since a
    /// cancellation is processed through the chain exactly like a
    /// registration, just with the cancel envelope and SOAPAction.
    async fn submit_once(&self, mut record: Record) -> Result<SubmitResponse, VerifactuError> {
        if let Record::Registration(reg) = &mut record {
            reg.software = Some(self.software.clone());
            reg.validate()?;
        }

        let operation = match &record {
            Record::Registration(_) => Operation::Register,
            Record::Cancellation(_) => Operation::Cancel,
        };
        let generated_at = now();

        let processed = {
            let mut chain = self.chain.lock().await;
            chain.process(record, generated_at)
        };

        let body = build_envelope(&processed, operation, generated_at);

        let raw_xml = self
            .limiter
            .execute(|| self.transport.send(operation, body))
            .await??;
        let parsed = verifactu_xml::parse_response(&raw_xml)?;

        Ok(SubmitResponse {
            accepted: parsed.state.accepted(),
            state: parsed.state,
            verification_code: parsed.verification_code,
            error_code: parsed.error_code,
            error_description: parsed.error_description,
            processed_record: processed,
        })
    }
}

fn build_envelope(
    processed: &ProcessedRecord,
    operation: Operation,
    generated_at: DateTime<FixedOffset>,
) -> String {
    match operation {
        Operation::Register => verifactu_xml::build_register(processed, generated_at),
        Operation::Cancel => verifactu_xml::build_cancel(processed, generated_at),
        Operation::Query => unreachable!("query doesn't go through submit_once"),
    }
}

/// The generation instant: local wall-clock time with an explicit UTC
/// offset, per the wire contract's `FechaHoraHusoGenRegistro` field.
fn now() -> DateTime<FixedOffset> {
    chrono::Local::now().fixed_offset()
}

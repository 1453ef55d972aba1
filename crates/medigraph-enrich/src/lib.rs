//! External enrichment for reconstructed knowledge graphs.
//!
//! Everything in this crate sits behind a seam defined by
//! `medigraph-query`: the identifier-normalization client implements
//! `IdentifierNormalizer`, the propagated-weight client implements
//! `WeightProvider`, and the annotators implement `EnrichmentAdapter`.
//! All network I/O is blocking (the engine is synchronous per request) and
//! every client owns an explicit response cache, so nothing here is a
//! process-wide singleton.
//!
//! Failure policy: adapters are best-effort by contract. They surface
//! errors to the engine, which logs and restores the pre-adapter graph;
//! they never panic and never partially commit beyond attribute appends.

pub mod correlation;
pub mod frequency;
pub mod normalizer;
pub mod textmine;
pub mod weights;

use thiserror::Error;

pub use correlation::{CorrelationSource, ExpressionCorrelationAdapter, ExpressionCorrelationClient};
pub use frequency::{ClinicalFrequencyAdapter, ClinicalFrequencyClient, FrequencySource};
pub use normalizer::NodeNormalizerClient;
pub use textmine::{CooccurrenceSource, TextMiningAdapter, TextMiningClient};
pub use weights::PropagatedWeightClient;

/// Transport-level failures shared by the service clients.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request to {service} failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} answered {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("{service} returned an unreadable payload: {source}")]
    Decode {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

/// Shared blocking-client construction: modest timeout, no redirects
/// surprises.
pub(crate) fn build_http_client(
    timeout: std::time::Duration,
) -> anyhow::Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build http client: {e}"))
}

pub(crate) const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15);

//! Literature co-occurrence adapter.
//!
//! Adds a normalized-distance co-occurrence attribute to edges whose
//! endpoints both carry display names, from a text-mining service.

use medigraph_query::{
    Attribute, EnrichmentAdapter, KnowledgeGraph, QueryPlan, QueryResult,
    ATTRIBUTE_LITERATURE_COOCCURRENCE,
};
use serde::Deserialize;
use url::Url;

use crate::{build_http_client, ServiceError, DEFAULT_TIMEOUT};

const SERVICE: &str = "text-mining";
const SOURCE_NAME: &str = "text-mining-service";

pub trait CooccurrenceSource {
    /// Normalized co-occurrence distance for a pair of entity names; `None`
    /// when the service has not seen the pair.
    fn cooccurrence(&self, subject: &str, object: &str) -> anyhow::Result<Option<f64>>;
}

// ============================================================================
// Adapter
// ============================================================================

pub struct TextMiningAdapter<S> {
    source: S,
}

impl<S> TextMiningAdapter<S> {
    pub fn new(source: S) -> Self {
        TextMiningAdapter { source }
    }
}

impl<S: CooccurrenceSource> EnrichmentAdapter for TextMiningAdapter<S> {
    fn name(&self) -> &str {
        "text-mining"
    }

    fn annotate(
        &self,
        _plan: &QueryPlan,
        knowledge_graph: &mut KnowledgeGraph,
        _results: &[QueryResult],
    ) -> anyhow::Result<()> {
        // gather first: the node map is read while the edge map is edited
        let mut named_pairs: Vec<(String, String, String)> = Vec::new();
        for (edge_id, edge) in &knowledge_graph.edges {
            let subject_name = knowledge_graph
                .nodes
                .get(&edge.subject)
                .and_then(|n| n.name.clone());
            let object_name = knowledge_graph
                .nodes
                .get(&edge.object)
                .and_then(|n| n.name.clone());
            if let (Some(subject), Some(object)) = (subject_name, object_name) {
                named_pairs.push((edge_id.clone(), subject, object));
            }
        }
        if named_pairs.is_empty() {
            tracing::info!("no named node pairs for text-mining annotation");
            return Ok(());
        }

        for (edge_id, subject, object) in named_pairs {
            match self.source.cooccurrence(&subject, &object) {
                Ok(Some(value)) => {
                    if let Some(edge) = knowledge_graph.edges.get_mut(&edge_id) {
                        edge.attributes.push(
                            Attribute::new(ATTRIBUTE_LITERATURE_COOCCURRENCE, value)
                                .with_source(SOURCE_NAME),
                        );
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!("text-mining lookup failed for {subject}/{object}: {err}");
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// HTTP client
// ============================================================================

#[derive(Debug, Deserialize)]
struct CooccurrenceResponse {
    #[serde(default)]
    max_ngd: Option<f64>,
}

pub struct TextMiningClient {
    base_url: Url,
    client: reqwest::blocking::Client,
}

impl TextMiningClient {
    pub fn new(base_url: Url) -> anyhow::Result<Self> {
        Ok(TextMiningClient {
            base_url,
            client: build_http_client(DEFAULT_TIMEOUT)?,
        })
    }
}

impl CooccurrenceSource for TextMiningClient {
    fn cooccurrence(&self, subject: &str, object: &str) -> anyhow::Result<Option<f64>> {
        let url = self
            .base_url
            .join("cooccurrence")
            .map_err(|e| anyhow::anyhow!("invalid base url: {e}"))?;
        let response = self
            .client
            .get(url)
            .query(&[("subject", subject), ("object", object)])
            .send()
            .map_err(|source| ServiceError::Transport {
                service: SERVICE,
                source,
            })?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(ServiceError::Status {
                service: SERVICE,
                status,
                body,
            }
            .into());
        }
        let payload: CooccurrenceResponse =
            response.json().map_err(|source| ServiceError::Decode {
                service: SERVICE,
                source,
            })?;
        Ok(payload.max_ngd)
    }
}

//! Tissue-specific expression-correlation adapter.
//!
//! Gene-gene edges in the traversal get a correlation attribute from a
//! cross-dataset expression service. Correlation keys are unordered pairs;
//! both subject-object orders are tried when annotating.

use std::collections::BTreeMap;

use medigraph_ontology::CATEGORY_GENE;
use medigraph_query::{
    Attribute, EnrichmentAdapter, KnowledgeGraph, QueryPlan, QueryResult,
    ATTRIBUTE_EXPR_CORRELATION,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{build_http_client, ServiceError, DEFAULT_TIMEOUT};

const SERVICE: &str = "expression-correlation";
const SOURCE_NAME: &str = "expression-correlation-service";

/// Where the adapter gets its correlations. Keys are `"gene1-gene2"`.
pub trait CorrelationSource {
    fn correlations(
        &self,
        genes: &[String],
        tissues: &[String],
    ) -> anyhow::Result<BTreeMap<String, f64>>;
}

// ============================================================================
// Adapter
// ============================================================================

pub struct ExpressionCorrelationAdapter<S> {
    source: S,
    tissues: Vec<String>,
}

impl<S> ExpressionCorrelationAdapter<S> {
    pub fn new(source: S, tissues: Vec<String>) -> Self {
        ExpressionCorrelationAdapter { source, tissues }
    }
}

fn is_gene_node(plan: &QueryPlan, key: &str) -> bool {
    plan.nodes
        .get(key)
        .map(|node| {
            node.expanded_categories.iter().any(|c| c == CATEGORY_GENE)
                || node.categories.iter().any(|c| c == CATEGORY_GENE)
        })
        .unwrap_or(false)
}

impl<S: CorrelationSource> EnrichmentAdapter for ExpressionCorrelationAdapter<S> {
    fn name(&self) -> &str {
        "expression-correlation"
    }

    fn annotate(
        &self,
        plan: &QueryPlan,
        knowledge_graph: &mut KnowledgeGraph,
        results: &[QueryResult],
    ) -> anyhow::Result<()> {
        // gene-gene hops in the query graph, by key
        let gene_hops: Vec<(&str, &str, &str)> = plan
            .order
            .triples()
            .into_iter()
            .filter(|(subject, _, object)| {
                is_gene_node(plan, subject) && is_gene_node(plan, object)
            })
            .collect();
        if gene_hops.is_empty() {
            tracing::info!("no gene-gene hops appropriate for correlation annotation");
            return Ok(());
        }

        let mut genes: Vec<String> = Vec::new();
        let mut edge_ids: Vec<String> = Vec::new();
        for result in results {
            for (subject_key, edge_key, object_key) in &gene_hops {
                for node_key in [subject_key, object_key] {
                    if let Some(bound) = result.node_bindings.get(*node_key) {
                        if !genes.contains(bound) {
                            genes.push(bound.clone());
                        }
                    }
                }
                if let Some(bound) = result.edge_bindings.get(*edge_key) {
                    if !edge_ids.contains(bound) {
                        edge_ids.push(bound.clone());
                    }
                }
            }
        }
        if genes.is_empty() || edge_ids.is_empty() {
            return Ok(());
        }

        let correlations = self.source.correlations(&genes, &self.tissues)?;
        if correlations.is_empty() {
            tracing::info!("no correlations returned for {} gene(s)", genes.len());
            return Ok(());
        }

        for edge_id in edge_ids {
            let Some(edge) = knowledge_graph.edges.get_mut(&edge_id) else {
                continue;
            };
            let forward = format!("{}-{}", edge.subject, edge.object);
            let reverse = format!("{}-{}", edge.object, edge.subject);
            let correlation = correlations
                .get(&forward)
                .or_else(|| correlations.get(&reverse));
            if let Some(value) = correlation {
                edge.attributes.push(
                    Attribute::new(ATTRIBUTE_EXPR_CORRELATION, *value).with_source(SOURCE_NAME),
                );
            }
        }
        Ok(())
    }
}

// ============================================================================
// HTTP client
// ============================================================================

#[derive(Debug, Serialize)]
struct CorrelationRequest<'a> {
    genes: &'a [String],
    tissues: &'a [String],
}

#[derive(Debug, Deserialize)]
struct CorrelationResponse {
    #[serde(default)]
    correlations: BTreeMap<String, f64>,
}

pub struct ExpressionCorrelationClient {
    base_url: Url,
    client: reqwest::blocking::Client,
}

impl ExpressionCorrelationClient {
    pub fn new(base_url: Url) -> anyhow::Result<Self> {
        Ok(ExpressionCorrelationClient {
            base_url,
            client: build_http_client(DEFAULT_TIMEOUT)?,
        })
    }
}

impl CorrelationSource for ExpressionCorrelationClient {
    fn correlations(
        &self,
        genes: &[String],
        tissues: &[String],
    ) -> anyhow::Result<BTreeMap<String, f64>> {
        let url = self
            .base_url
            .join("correlations")
            .map_err(|e| anyhow::anyhow!("invalid base url: {e}"))?;
        let response = self
            .client
            .post(url)
            .json(&CorrelationRequest { genes, tissues })
            .send()
            .map_err(|source| ServiceError::Transport {
                service: SERVICE,
                source,
            })?;
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
        let payload: CorrelationResponse =
            response.json().map_err(|source| ServiceError::Decode {
                service: SERVICE,
                source,
            })?;
        Ok(payload.correlations)
    }
}

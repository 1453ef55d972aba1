//! Clinical co-occurrence frequency adapter.
//!
//! Annotates edges whose endpoints are both clinical concepts (diseases and
//! chemicals) with paired-concept frequency and association statistics from
//! an observational-health-data service. The frequency attribute feeds the
//! default scoring registry.

use std::collections::BTreeMap;

use dashmap::DashMap;
use medigraph_ontology::{
    CATEGORY_CHEMICAL_ENTITY, CATEGORY_DISEASE, CATEGORY_DRUG, CATEGORY_SMALL_MOLECULE,
};
use medigraph_query::{
    Attribute, EnrichmentAdapter, KnowledgeGraph, QueryPlan, QueryResult,
    ATTRIBUTE_CLINICAL_FREQUENCY,
};
use serde::Deserialize;
use url::Url;

use crate::{build_http_client, ServiceError, DEFAULT_TIMEOUT};

const SERVICE: &str = "clinical-frequency";
const ATTRIBUTE_CHI_SQUARE: &str = "clinical_association_chi_square";
const SOURCE_NAME: &str = "clinical-frequency-service";

const CLINICAL_CATEGORIES: &[&str] = &[
    CATEGORY_DISEASE,
    CATEGORY_CHEMICAL_ENTITY,
    CATEGORY_SMALL_MOLECULE,
    CATEGORY_DRUG,
];

/// Where the adapter gets its numbers; the HTTP client below in
/// production, a stub in tests.
pub trait FrequencySource {
    /// Map a graph identifier to the service's concept space.
    fn concept_for(&self, identifier: &str) -> anyhow::Result<Option<String>>;

    fn paired_frequency(&self, concept_1: &str, concept_2: &str) -> anyhow::Result<Option<f64>>;

    fn chi_square(&self, concept_1: &str, concept_2: &str) -> anyhow::Result<Option<f64>>;
}

// ============================================================================
// Adapter
// ============================================================================

pub struct ClinicalFrequencyAdapter<S> {
    source: S,
}

impl<S> ClinicalFrequencyAdapter<S> {
    pub fn new(source: S) -> Self {
        ClinicalFrequencyAdapter { source }
    }
}

fn is_clinical(knowledge_graph: &KnowledgeGraph, node_id: &str) -> bool {
    knowledge_graph
        .nodes
        .get(node_id)
        .map(|node| {
            node.categories
                .iter()
                .any(|c| CLINICAL_CATEGORIES.contains(&c.as_str()))
        })
        .unwrap_or(false)
}

impl<S: FrequencySource> EnrichmentAdapter for ClinicalFrequencyAdapter<S> {
    fn name(&self) -> &str {
        "clinical-frequency"
    }

    fn annotate(
        &self,
        _plan: &QueryPlan,
        knowledge_graph: &mut KnowledgeGraph,
        _results: &[QueryResult],
    ) -> anyhow::Result<()> {
        let queryable: Vec<(String, String, String)> = knowledge_graph
            .edges
            .iter()
            .filter(|(_, edge)| {
                is_clinical(knowledge_graph, &edge.subject)
                    && is_clinical(knowledge_graph, &edge.object)
            })
            .map(|(id, edge)| (edge.subject.clone(), id.clone(), edge.object.clone()))
            .collect();

        if queryable.is_empty() {
            tracing::info!("no edges appropriate for clinical-frequency annotation");
            return Ok(());
        }

        for (subject, edge_id, object) in queryable {
            // a miss for one pair should not cost the others their signal
            match self.annotate_pair(&subject, &object) {
                Ok(attributes) => {
                    if let Some(edge) = knowledge_graph.edges.get_mut(&edge_id) {
                        edge.attributes.extend(attributes);
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        "clinical-frequency lookup failed for {subject}/{object}: {err}"
                    );
                }
            }
        }
        Ok(())
    }
}

impl<S: FrequencySource> ClinicalFrequencyAdapter<S> {
    fn annotate_pair(&self, subject: &str, object: &str) -> anyhow::Result<Vec<Attribute>> {
        let (Some(concept_1), Some(concept_2)) = (
            self.source.concept_for(subject)?,
            self.source.concept_for(object)?,
        ) else {
            return Ok(Vec::new());
        };

        let mut attributes = Vec::new();
        if let Some(frequency) = self.source.paired_frequency(&concept_1, &concept_2)? {
            attributes.push(
                Attribute::new(ATTRIBUTE_CLINICAL_FREQUENCY, frequency).with_source(SOURCE_NAME),
            );
        }
        if let Some(chi_square) = self.source.chi_square(&concept_1, &concept_2)? {
            attributes
                .push(Attribute::new(ATTRIBUTE_CHI_SQUARE, chi_square).with_source(SOURCE_NAME));
        }
        Ok(attributes)
    }
}

// ============================================================================
// HTTP client
// ============================================================================

#[derive(Debug, Deserialize)]
struct ConceptResponse {
    #[serde(default)]
    concept_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FrequencyResponse {
    #[serde(default)]
    concept_frequency: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChiSquareResponse {
    #[serde(default)]
    chi_square: Option<f64>,
}

pub struct ClinicalFrequencyClient {
    base_url: Url,
    client: reqwest::blocking::Client,
    concept_cache: DashMap<String, Option<String>>,
}

impl ClinicalFrequencyClient {
    pub fn new(base_url: Url) -> anyhow::Result<Self> {
        Ok(ClinicalFrequencyClient {
            base_url,
            client: build_http_client(DEFAULT_TIMEOUT)?,
            concept_cache: DashMap::new(),
        })
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ServiceError> {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|_| ServiceError::Status {
                service: SERVICE,
                status: 0,
                body: "invalid base url".to_string(),
            })?;
        let response = self
            .client
            .get(url)
            .query(query)
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
            });
        }
        response.json().map_err(|source| ServiceError::Decode {
            service: SERVICE,
            source,
        })
    }
}

impl FrequencySource for ClinicalFrequencyClient {
    fn concept_for(&self, identifier: &str) -> anyhow::Result<Option<String>> {
        if let Some(hit) = self.concept_cache.get(identifier) {
            return Ok(hit.clone());
        }
        let response: ConceptResponse =
            self.get_json("concepts", &[("identifier", identifier)])?;
        self.concept_cache
            .insert(identifier.to_string(), response.concept_id.clone());
        Ok(response.concept_id)
    }

    fn paired_frequency(&self, concept_1: &str, concept_2: &str) -> anyhow::Result<Option<f64>> {
        let response: FrequencyResponse = self.get_json(
            "frequencies",
            &[("concept_1", concept_1), ("concept_2", concept_2)],
        )?;
        Ok(response.concept_frequency)
    }

    fn chi_square(&self, concept_1: &str, concept_2: &str) -> anyhow::Result<Option<f64>> {
        let response: ChiSquareResponse = self.get_json(
            "chi_square",
            &[("concept_1", concept_1), ("concept_2", concept_2)],
        )?;
        Ok(response.chi_square)
    }
}

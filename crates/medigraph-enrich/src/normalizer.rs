//! Batch identifier-normalization client.
//!
//! Looks up canonical identities and equivalent identifiers for curies the
//! backend does not store directly. Responses are cached per curie for the
//! life of the client (misses included, so a flaky curie is not re-queried
//! on every request), and lookups are chunked to stay inside the service's
//! request-size guidance.

use std::collections::BTreeMap;

use dashmap::DashMap;
use medigraph_query::{IdentifierNormalizer, NormalizedIdentity};
use serde::Deserialize;
use url::Url;

use crate::{build_http_client, ServiceError, DEFAULT_TIMEOUT};

const SERVICE: &str = "node-normalization";
const NORMALIZED_NODES_ENDPOINT: &str = "get_normalized_nodes";
const CHUNK_SIZE: usize = 1000;

#[derive(Debug, Deserialize)]
struct NormalizedNodeResponse {
    id: NormalizedIdentifier,
    #[serde(default)]
    equivalent_identifiers: Vec<NormalizedIdentifier>,
}

#[derive(Debug, Deserialize)]
struct NormalizedIdentifier {
    identifier: String,
}

pub struct NodeNormalizerClient {
    base_url: Url,
    client: reqwest::blocking::Client,
    cache: DashMap<String, Option<NormalizedIdentity>>,
}

impl NodeNormalizerClient {
    pub fn new(base_url: Url) -> anyhow::Result<Self> {
        Ok(NodeNormalizerClient {
            base_url,
            client: build_http_client(DEFAULT_TIMEOUT)?,
            cache: DashMap::new(),
        })
    }

    fn fetch_chunk(
        &self,
        curies: &[String],
    ) -> Result<BTreeMap<String, Option<NormalizedIdentity>>, ServiceError> {
        let url = self
            .base_url
            .join(NORMALIZED_NODES_ENDPOINT)
            .map_err(|_| ServiceError::Status {
                service: SERVICE,
                status: 0,
                body: "invalid base url".to_string(),
            })?;
        let query: Vec<(&str, &str)> = curies.iter().map(|c| ("curie", c.as_str())).collect();
        let response = self
            .client
            .get(url)
            .query(&query)
            .send()
            .map_err(|source| ServiceError::Transport {
                service: SERVICE,
                source,
            })?;

        // a 404 means "none of these are known", which is an answer
        if response.status().as_u16() == 404 {
            tracing::warn!("no normalized identities for {} curie(s)", curies.len());
            return Ok(curies.iter().map(|c| (c.clone(), None)).collect());
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(ServiceError::Status {
                service: SERVICE,
                status,
                body,
            });
        }

        let payload: BTreeMap<String, Option<NormalizedNodeResponse>> =
            response.json().map_err(|source| ServiceError::Decode {
                service: SERVICE,
                source,
            })?;

        let mut identities = BTreeMap::new();
        for curie in curies {
            let identity = payload.get(curie).and_then(|entry| {
                entry.as_ref().map(|node| NormalizedIdentity {
                    canonical: node.id.identifier.clone(),
                    equivalents: node
                        .equivalent_identifiers
                        .iter()
                        .map(|eq| eq.identifier.clone())
                        .collect(),
                })
            });
            identities.insert(curie.clone(), identity);
        }
        Ok(identities)
    }
}

impl IdentifierNormalizer for NodeNormalizerClient {
    fn normalize(
        &self,
        curies: &[String],
    ) -> anyhow::Result<BTreeMap<String, Option<NormalizedIdentity>>> {
        let mut results = BTreeMap::new();
        let mut missing: Vec<String> = Vec::new();
        for curie in curies {
            match self.cache.get(curie) {
                Some(hit) => {
                    results.insert(curie.clone(), hit.clone());
                }
                None => missing.push(curie.clone()),
            }
        }

        for chunk in missing.chunks(CHUNK_SIZE) {
            tracing::info!("normalizing {} identifier(s)", chunk.len());
            let fetched = self.fetch_chunk(chunk)?;
            for (curie, identity) in fetched {
                self.cache.insert(curie.clone(), identity.clone());
                results.insert(curie, identity);
            }
        }
        Ok(results)
    }
}

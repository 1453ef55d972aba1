//! Propagated-weight service client.
//!
//! The service holds precomputed embedding weights for backend nodes under
//! a context concept (typically the disease a request is reasoning about).
//! The engine consumes this as a `WeightProvider` during reconstruction;
//! lookup failures degrade to zero weights there, so this client only has
//! to be honest about errors, not clever.

use std::collections::BTreeMap;

use dashmap::DashMap;
use medigraph_query::WeightProvider;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{build_http_client, ServiceError, DEFAULT_TIMEOUT};

const SERVICE: &str = "propagated-weight";
const SCORES_ENDPOINT: &str = "scores";

#[derive(Debug, Serialize)]
struct WeightRequest<'a> {
    concept: &'a str,
    identifiers: &'a [String],
}

#[derive(Debug, Deserialize)]
struct WeightResponse {
    #[serde(default)]
    scores: BTreeMap<String, f64>,
}

pub struct PropagatedWeightClient {
    base_url: Url,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
    /// (context, identifier) -> weight
    cache: DashMap<(String, String), f64>,
}

impl PropagatedWeightClient {
    pub fn new(base_url: Url, api_key: Option<String>) -> anyhow::Result<Self> {
        Ok(PropagatedWeightClient {
            base_url,
            api_key,
            client: build_http_client(DEFAULT_TIMEOUT)?,
            cache: DashMap::new(),
        })
    }

    fn fetch(
        &self,
        context: &str,
        identifiers: &[String],
    ) -> Result<BTreeMap<String, f64>, ServiceError> {
        let url = self
            .base_url
            .join(SCORES_ENDPOINT)
            .map_err(|_| ServiceError::Status {
                service: SERVICE,
                status: 0,
                body: "invalid base url".to_string(),
            })?;
        let mut request = self.client.post(url).json(&WeightRequest {
            concept: context,
            identifiers,
        });
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }
        let response = request.send().map_err(|source| ServiceError::Transport {
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
        let payload: WeightResponse = response.json().map_err(|source| ServiceError::Decode {
            service: SERVICE,
            source,
        })?;
        Ok(payload.scores)
    }
}

impl WeightProvider for PropagatedWeightClient {
    fn propagated_weights(
        &self,
        context: &str,
        identifiers: &[String],
    ) -> anyhow::Result<BTreeMap<String, f64>> {
        let mut weights = BTreeMap::new();
        let mut missing: Vec<String> = Vec::new();
        for identifier in identifiers {
            let key = (context.to_string(), identifier.clone());
            match self.cache.get(&key) {
                Some(weight) => {
                    weights.insert(identifier.clone(), *weight);
                }
                None => missing.push(identifier.clone()),
            }
        }

        if !missing.is_empty() {
            tracing::info!(
                "fetching {} propagated weight(s) for context {context}",
                missing.len()
            );
            let fetched = self.fetch(context, &missing)?;
            for identifier in &missing {
                let weight = fetched.get(identifier).copied().unwrap_or(0.0);
                self.cache
                    .insert((context.to_string(), identifier.clone()), weight);
                weights.insert(identifier.clone(), weight);
            }
        }
        Ok(weights)
    }
}

//! The top-level query engine: resolve -> linearize -> compile -> execute
//! -> reconstruct -> enrich -> score.
//!
//! The engine owns its configuration (ontology table, scoring registry,
//! constraint handlers) and holds every external collaborator behind a
//! seam. Validation-class failures surface before the backend round-trip;
//! enrichment failures are contained to the failing adapter.

use std::collections::BTreeMap;

use medigraph_ontology::OntologyMap;
use serde::{Deserialize, Serialize};

use crate::collaborators::{
    EnrichmentAdapter, IdentifierNormalizer, TemplateQueryHandler, WeightProvider,
};
use crate::compile::{self, CompiledQuery};
use crate::constraints::ConstraintHandlers;
use crate::error::QueryError;
use crate::linearize;
use crate::model::{KnowledgeGraph, KnowledgeType, QueryGraph, QueryResult, TraversalOrder};
use crate::reconstruct::{self, Reconstruction, Reconstructor};
use crate::resolve::{self, ResolvedEdge, ResolvedNode};
use crate::score::{self, ScoringRegistry};
use crate::session::GraphSession;

/// Recognized request options, beyond the query graph itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Context concept for the propagated-weight signal (e.g. the disease
    /// the caller is reasoning about).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment_context: Option<String>,
    /// Whether to consult third-party enrichment adapters after
    /// reconstruction.
    #[serde(default)]
    pub enable_third_party_enrichment: bool,
}

/// Everything derivable from a query graph before execution: the resolved
/// nodes/edges, the traversal order, and the compiled query.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub nodes: BTreeMap<String, ResolvedNode>,
    pub edges: BTreeMap<String, ResolvedEdge>,
    pub order: TraversalOrder,
    pub compiled: CompiledQuery,
}

pub struct QueryEngine {
    ontology: OntologyMap,
    registry: ScoringRegistry,
    handlers: ConstraintHandlers,
    normalize_scores: bool,
    normalizer: Option<Box<dyn IdentifierNormalizer>>,
    weights: Option<Box<dyn WeightProvider>>,
    adapters: Vec<Box<dyn EnrichmentAdapter>>,
    templates: Vec<Box<dyn TemplateQueryHandler>>,
}

impl QueryEngine {
    pub fn new(ontology: OntologyMap) -> Self {
        QueryEngine {
            ontology,
            registry: ScoringRegistry::default_registry(),
            handlers: ConstraintHandlers::default_handlers(),
            normalize_scores: true,
            normalizer: None,
            weights: None,
            adapters: Vec::new(),
            templates: Vec::new(),
        }
    }

    pub fn with_scoring_registry(mut self, registry: ScoringRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_constraint_handlers(mut self, handlers: ConstraintHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn with_score_normalization(mut self, enabled: bool) -> Self {
        self.normalize_scores = enabled;
        self
    }

    pub fn with_identifier_normalizer(
        mut self,
        normalizer: Box<dyn IdentifierNormalizer>,
    ) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    pub fn with_weight_provider(mut self, provider: Box<dyn WeightProvider>) -> Self {
        self.weights = Some(provider);
        self
    }

    pub fn with_enrichment_adapter(mut self, adapter: Box<dyn EnrichmentAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn with_template_handler(mut self, handler: Box<dyn TemplateQueryHandler>) -> Self {
        self.templates.push(handler);
        self
    }

    pub fn ontology(&self) -> &OntologyMap {
        &self.ontology
    }

    /// Resolve, linearize, and compile without executing. This is the
    /// whole validation surface: a plan that comes back `Ok` will not fail
    /// for client-input reasons later.
    pub fn plan(
        &self,
        graph: &QueryGraph,
        max_results: Option<usize>,
    ) -> Result<QueryPlan, QueryError> {
        let nodes = resolve::resolve_nodes(&self.ontology, &graph.nodes, self.normalizer.as_deref())?;
        let edges = resolve::resolve_edges(&self.ontology, &graph.edges, &nodes)?;
        if let Some(edge) = edges
            .values()
            .find(|e| e.knowledge_type == KnowledgeType::Inferred)
        {
            return Err(QueryError::UnsupportedKnowledgeType(format!(
                "query edge {} requests inferred knowledge, but no template handler \
                 recognizes this query shape",
                edge.key
            )));
        }
        let order = linearize::linearize(&nodes, &edges)?;
        let limit = compile::clamp_max_results(max_results);
        let compiled = compile::compile(&order, &nodes, &edges, &self.ontology, &self.handlers, limit)?;
        Ok(QueryPlan {
            nodes,
            edges,
            order,
            compiled,
        })
    }

    /// Full pipeline over one graph session; returns ranked results plus
    /// the deduplicated knowledge graph they bind into.
    pub fn run_query(
        &self,
        graph: &QueryGraph,
        options: &QueryOptions,
        max_results: Option<usize>,
        session: &dyn GraphSession,
    ) -> Result<(Vec<QueryResult>, KnowledgeGraph), QueryError> {
        if graph
            .edges
            .values()
            .any(|e| e.knowledge_type == KnowledgeType::Inferred)
        {
            if let Some(handler) = self.templates.iter().find(|h| h.supports(graph)) {
                tracing::info!("dispatching query to template handler {}", handler.name());
                return handler.run(graph, compile::clamp_max_results(max_results), session);
            }
        }

        let plan = self.plan(graph, max_results)?;
        tracing::debug!(query = %plan.compiled.cypher, "running compiled query");
        let records = session
            .run(&plan.compiled.cypher, &plan.compiled.params)
            .map_err(QueryError::Backend)?;
        tracing::info!("backend returned {} records", records.len());

        let mut reconstructor = Reconstructor::new(&self.ontology);
        if let (Some(provider), Some(context)) = (
            self.weights.as_deref(),
            options.enrichment_context.as_deref(),
        ) {
            reconstructor = reconstructor.with_weights(provider, context);
        }
        let Reconstruction {
            mut results,
            mut knowledge_graph,
        } = reconstructor.reconstruct(&records, &plan.compiled.aliases)?;

        self.canonicalize_identifiers(&mut knowledge_graph, &mut results);

        if options.enable_third_party_enrichment {
            for adapter in &self.adapters {
                let snapshot = knowledge_graph.clone();
                if let Err(err) = adapter.annotate(&plan, &mut knowledge_graph, &results) {
                    tracing::warn!(
                        "enrichment adapter {} failed: {err}; continuing without its signal",
                        adapter.name()
                    );
                    knowledge_graph = snapshot;
                }
            }
        }

        for result in &mut results {
            result.score = score::score_result(result, &knowledge_graph, &self.registry);
            result.score_name = Some(score::SCORE_METHOD_WEIGHTED_SUM.to_string());
        }
        score::rank_results(&mut results, plan.compiled.limit);
        if self.normalize_scores {
            score::normalize_scores(&mut results);
        }

        Ok((results, knowledge_graph))
    }

    /// Replace backend identifiers with canonical external identifiers via
    /// one batched normalizer call. Best-effort: on failure the graph keeps
    /// its backend identifiers.
    fn canonicalize_identifiers(
        &self,
        knowledge_graph: &mut KnowledgeGraph,
        results: &mut [QueryResult],
    ) {
        let Some(normalizer) = self.normalizer.as_deref() else {
            return;
        };
        if knowledge_graph.nodes.is_empty() {
            return;
        }

        // external curie guess -> backend identifier
        let mut external: BTreeMap<String, String> = BTreeMap::new();
        for (id, node) in &knowledge_graph.nodes {
            let Some(category) = node.categories.first() else {
                continue;
            };
            let Some(mapping) = self.ontology.node_mapping(category) else {
                continue;
            };
            external
                .entry(mapping.external_identifier(id))
                .or_insert_with(|| id.clone());
        }

        let curies: Vec<String> = external.keys().cloned().collect();
        let identities = match normalizer.normalize(&curies) {
            Ok(identities) => identities,
            Err(err) => {
                tracing::warn!("canonical identifier lookup failed: {err}");
                return;
            }
        };

        let mut rename: BTreeMap<String, String> = BTreeMap::new();
        for (curie, backend_id) in &external {
            match identities.get(curie) {
                Some(Some(identity)) if identity.canonical != *backend_id => {
                    rename.insert(backend_id.clone(), identity.canonical.clone());
                }
                // no identity known: fall back to the external guess so
                // reported identifiers are at least curie-shaped
                _ if curie != backend_id => {
                    rename.insert(backend_id.clone(), curie.clone());
                }
                _ => {}
            }
        }
        reconstruct::apply_canonical_identifiers(knowledge_graph, results, &rename);
    }
}

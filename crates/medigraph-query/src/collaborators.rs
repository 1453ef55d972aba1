//! Seams for the external collaborators the engine consumes.
//!
//! Implementations live outside this crate (network clients in
//! `medigraph-enrich`, template queries with the service glue); the engine
//! takes them as injected trait objects so their lifetime, caching, and
//! failure policy stay explicit and testable.

use std::collections::BTreeMap;

use crate::engine::QueryPlan;
use crate::error::QueryError;
use crate::model::{KnowledgeGraph, QueryGraph, QueryResult};
use crate::session::GraphSession;

/// One normalized identity: the canonical form plus every equivalent
/// identifier known for the searched curie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedIdentity {
    pub canonical: String,
    pub equivalents: Vec<String>,
}

/// Batch identifier-normalization service. `None` for a curie means the
/// service knows no identity for it; that is not an error.
pub trait IdentifierNormalizer {
    fn normalize(
        &self,
        curies: &[String],
    ) -> anyhow::Result<BTreeMap<String, Option<NormalizedIdentity>>>;
}

/// Precomputed propagated-weight (embedding) service: weights for a set of
/// node identifiers under one context concept.
pub trait WeightProvider {
    fn propagated_weights(
        &self,
        context: &str,
        identifiers: &[String],
    ) -> anyhow::Result<BTreeMap<String, f64>>;
}

/// Post-reconstruction annotator adding attributes to knowledge-graph
/// edges or nodes. Best-effort by contract: the engine snapshots the graph
/// before each adapter and restores it if `annotate` errors, so a failing
/// adapter only costs its own signal.
pub trait EnrichmentAdapter {
    fn name(&self) -> &str;

    fn annotate(
        &self,
        plan: &QueryPlan,
        knowledge_graph: &mut KnowledgeGraph,
        results: &[QueryResult],
    ) -> anyhow::Result<()>;
}

/// Handler for inferred-knowledge edges, which compile to a family of
/// template queries rather than a direct lookup.
pub trait TemplateQueryHandler {
    fn name(&self) -> &str;

    /// Whether this handler recognizes the query graph's shape.
    fn supports(&self, graph: &QueryGraph) -> bool;

    fn run(
        &self,
        graph: &QueryGraph,
        max_results: usize,
        session: &dyn GraphSession,
    ) -> Result<(Vec<QueryResult>, KnowledgeGraph), QueryError>;
}

//! Query compiler and result-scoring engine for graph-shaped biomedical
//! queries.
//!
//! A caller-supplied query graph (typed nodes, predicate-labeled edges) is
//! answered against a backing property graph in five stages:
//!
//! 1. **Resolution** (`resolve`): categories become native label sets,
//!    literal identifiers become backend-form literals, predicates become
//!    native edge-type sets. All client-input validation happens here.
//! 2. **Linearization** (`linearize`): the graph is checked to be a single
//!    simple path and flattened into a node-edge-node… traversal order.
//! 3. **Compilation** (`compile`, `constraints`): the traversal order
//!    becomes one Cypher path query with aliased elements and a WHERE
//!    conjunction.
//! 4. **Reconstruction** (`reconstruct`): raw records become typed results
//!    bound into a deduplicated knowledge graph, optionally annotated by
//!    enrichment collaborators.
//! 5. **Scoring** (`score`): each result's score is the weighted sum of
//!    its bound attributes; results are stably ranked and truncated.
//!
//! [`QueryEngine`] wires the stages together; everything external (the
//! graph session, identifier normalization, enrichment services, template
//! queries) enters through the seams in `collaborators` and `session`.

pub mod collaborators;
pub mod compile;
pub mod constraints;
pub mod engine;
pub mod error;
pub mod linearize;
pub mod model;
pub mod reconstruct;
pub mod resolve;
pub mod score;
pub mod session;

pub use collaborators::{
    EnrichmentAdapter, IdentifierNormalizer, NormalizedIdentity, TemplateQueryHandler,
    WeightProvider,
};
pub use compile::{alias_for, clamp_max_results, AliasBindings, CompiledQuery, MAX_RESULTS_CEILING};
pub use constraints::{ConstraintHandlers, SUPPORTED_CONSTRAINT_SLOTS};
pub use engine::{QueryEngine, QueryOptions, QueryPlan};
pub use error::QueryError;
pub use linearize::linearize;
pub use model::{
    Attribute, AttributeConstraint, ConstraintOperator, ConstraintValue, KnowledgeGraph,
    KnowledgeType, PropertyValue, QualifierConstraint, QueryEdge, QueryGraph, QueryNode,
    QueryResult, ResultEdge, ResultNode, Step, TraversalOrder,
};
pub use reconstruct::{Reconstruction, Reconstructor, ATTRIBUTE_PROPAGATED_WEIGHT};
pub use resolve::{ResolvedEdge, ResolvedNode};
pub use score::{
    normalize_scores, rank_results, score_result, ScoringRegistry,
    ATTRIBUTE_CLINICAL_FREQUENCY, ATTRIBUTE_EXPR_CORRELATION, ATTRIBUTE_FEATURE_IMPORTANCE,
    ATTRIBUTE_LITERATURE_COOCCURRENCE, SCORE_METHOD_WEIGHTED_SUM,
};
pub use session::{
    native_edge, native_node, FailingSession, FixtureSession, GraphSession, NativeEdge,
    NativeEntity, NativeNode, Params, Record,
};

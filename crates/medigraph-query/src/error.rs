//! Error taxonomy for query compilation and execution.
//!
//! Validation-class errors are raised before any backend round-trip;
//! backend failures propagate untransformed. Which kinds an HTTP layer
//! should map to a successful-but-empty response (rather than a client
//! error) is captured by [`QueryError::is_empty_response`].

use medigraph_ontology::MappingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    /// The query graph is not a single simple path (branching, cyclic, or
    /// disconnected). Benign: callers answer with an empty message.
    #[error("query graph is not a linear path: {0}")]
    NonLinearQuery(String),

    /// The query graph references a node or edge that is not present in the
    /// supplied sets.
    #[error("missing query graph component: {0}")]
    MissingComponent(String),

    /// A requested category or predicate has no native mapping.
    #[error("unsupported category or predicate: {0}")]
    UnsupportedType(String),

    /// A predicate maps to several native edge types and the query graph
    /// lacks the categories needed to pick one.
    #[error("{0}")]
    AmbiguousPredicate(String),

    #[error("unsupported constraint: {0}")]
    UnsupportedConstraint(String),

    #[error("unsupported qualifier: {0}")]
    UnsupportedQualifier(String),

    #[error("unsupported knowledge type: {0}")]
    UnsupportedKnowledgeType(String),

    /// A pinned node had identifiers, but none could be matched to the
    /// backend, even after normalization.
    #[error("no identifiers could be matched for query node(s): {0}")]
    UnmatchedIdentifier(String),

    /// The graph session failed while executing the compiled query.
    /// Propagated unchanged; the engine does not retry.
    #[error("backend query execution failed: {0}")]
    Backend(#[source] anyhow::Error),
}

impl QueryError {
    /// Kinds the excluded HTTP layer answers with 200-and-empty instead of
    /// a client error.
    pub fn is_empty_response(&self) -> bool {
        matches!(
            self,
            QueryError::NonLinearQuery(_)
                | QueryError::UnsupportedType(_)
                | QueryError::UnsupportedQualifier(_)
                | QueryError::UnmatchedIdentifier(_)
        )
    }
}

impl From<MappingError> for QueryError {
    fn from(err: MappingError) -> Self {
        match err {
            MappingError::UnsupportedPredicate(_) => QueryError::UnsupportedType(err.to_string()),
            MappingError::AmbiguousPredicate(_) => QueryError::AmbiguousPredicate(err.to_string()),
        }
    }
}

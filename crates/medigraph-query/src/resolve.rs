//! Validation and native resolution of query graphs.
//!
//! Resolution happens entirely before any backend round-trip: categories
//! become native label sets, literal identifiers become backend-form query
//! literals (with a normalization fallback for identifiers the backend does
//! not store directly), and predicates become native edge-type sets. Every
//! validation-class error in the taxonomy is raised from here.

use std::collections::{BTreeMap, BTreeSet};

use medigraph_ontology::{
    EntityKind, OntologyMap, PropertyFloor, CATEGORY_DISEASE, CATEGORY_DRUG,
    CATEGORY_NAMED_THING, CATEGORY_SMALL_MOLECULE, PREDICATE_TREATS,
};

use crate::collaborators::IdentifierNormalizer;
use crate::constraints;
use crate::error::QueryError;
use crate::model::{AttributeConstraint, KnowledgeType, QueryEdge, QueryNode};

/// A query node with its native resolution attached.
#[derive(Debug, Clone, Default)]
pub struct ResolvedNode {
    pub key: String,
    /// Categories as requested by the caller.
    pub categories: Vec<String>,
    /// Mapped categories after hierarchy expansion; empty means wildcard.
    pub expanded_categories: Vec<String>,
    /// Native labels; empty means any label.
    pub labels: Vec<String>,
    /// Requested literal identifiers, as given.
    pub ids: Vec<String>,
    /// Backend-form query literal -> the input identifier it came from.
    /// One input identifier may fan out into several literals.
    pub literal_filters: BTreeMap<String, String>,
    /// Numeric property filters required by the resolved categories.
    pub required_floors: Vec<PropertyFloor>,
    pub constraints: Vec<AttributeConstraint>,
}

impl ResolvedNode {
    /// An unconstrained node; used by tests and fixtures.
    pub fn wildcard(key: impl Into<String>) -> Self {
        ResolvedNode {
            key: key.into(),
            ..ResolvedNode::default()
        }
    }
}

/// A query edge with its native edge-type set attached. An empty set means
/// the edge matches any native type.
#[derive(Debug, Clone)]
pub struct ResolvedEdge {
    pub key: String,
    pub subject: String,
    pub object: String,
    pub predicates: Vec<String>,
    pub edge_types: BTreeSet<String>,
    pub constraints: Vec<AttributeConstraint>,
    pub knowledge_type: KnowledgeType,
}

impl ResolvedEdge {
    /// An unconstrained edge between two node keys; used by tests and
    /// fixtures.
    pub fn between(
        key: impl Into<String>,
        subject: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        ResolvedEdge {
            key: key.into(),
            subject: subject.into(),
            object: object.into(),
            predicates: Vec::new(),
            edge_types: BTreeSet::new(),
            constraints: Vec::new(),
            knowledge_type: KnowledgeType::Lookup,
        }
    }
}

// ============================================================================
// Nodes
// ============================================================================

pub fn resolve_nodes(
    ontology: &OntologyMap,
    nodes: &BTreeMap<String, QueryNode>,
    normalizer: Option<&dyn IdentifierNormalizer>,
) -> Result<BTreeMap<String, ResolvedNode>, QueryError> {
    let mut resolved = BTreeMap::new();
    // (input curie, node key) pairs that need the normalization fallback
    let mut pending: Vec<(String, String)> = Vec::new();

    for (key, node) in nodes {
        let mut rn = resolve_labels(ontology, key, node)?;
        for curie in &node.ids {
            match match_curie(ontology, &rn.expanded_categories, curie) {
                Some(literal) => {
                    rn.literal_filters.insert(literal, curie.clone());
                }
                None => pending.push((curie.clone(), key.clone())),
            }
        }
        resolved.insert(key.clone(), rn);
    }

    if !pending.is_empty() {
        if let Some(normalizer) = normalizer {
            normalize_pending(ontology, normalizer, &pending, &mut resolved);
        }
    }

    let unmatched: Vec<&str> = resolved
        .values()
        .filter(|rn| !rn.ids.is_empty() && rn.literal_filters.is_empty())
        .map(|rn| rn.key.as_str())
        .collect();
    if !unmatched.is_empty() {
        return Err(QueryError::UnmatchedIdentifier(unmatched.join(", ")));
    }

    // constraint support needs the resolved labels, so this comes last
    for rn in resolved.values() {
        for constraint in &rn.constraints {
            constraints::validate_node_constraint(ontology, &rn.labels, constraint)?;
        }
    }

    Ok(resolved)
}

fn resolve_labels(
    ontology: &OntologyMap,
    key: &str,
    node: &QueryNode,
) -> Result<ResolvedNode, QueryError> {
    let mut rn = ResolvedNode {
        key: key.to_string(),
        categories: node.categories.clone(),
        ids: node.ids.clone(),
        constraints: node.constraints.clone(),
        ..ResolvedNode::default()
    };
    if node.categories.is_empty() {
        return Ok(rn);
    }

    let expanded = ontology.supported_descendants(&node.categories, EntityKind::Node);
    if expanded.is_empty() {
        return Err(QueryError::UnsupportedType(format!(
            "no native node mapping for categories [{}] on query node {key}",
            node.categories.join(", ")
        )));
    }
    if expanded.contains(CATEGORY_NAMED_THING) {
        // wildcard member swallows the rest
        return Ok(rn);
    }

    for category in &expanded {
        let Some(mapping) = ontology.node_mapping(category) else {
            continue;
        };
        for label in &mapping.labels {
            if !rn.labels.contains(label) {
                rn.labels.push(label.clone());
            }
        }
        rn.expanded_categories.push(category.clone());
    }
    if rn.labels.is_empty() {
        return Err(QueryError::UnsupportedType(format!(
            "no native node mapping for categories [{}] on query node {key}",
            node.categories.join(", ")
        )));
    }

    // floors come from the requested categories themselves, never from
    // hierarchy expansion: a query for the broad chemical space must not
    // inherit the approval gate its drug descendant carries. With several
    // requested categories (OR semantics), a floor applies only when every
    // mapped category requires it.
    let mut floors: Option<Vec<PropertyFloor>> = None;
    for category in &node.categories {
        let Some(mapping) = ontology.node_mapping(category) else {
            continue;
        };
        let required: Vec<PropertyFloor> = mapping.required_floor.clone().into_iter().collect();
        floors = Some(match floors {
            None => required,
            Some(kept) => kept.into_iter().filter(|f| required.contains(f)).collect(),
        });
    }
    rn.required_floors = floors.unwrap_or_default();
    Ok(rn)
}

/// Try to turn an input identifier into a backend-form literal for any of
/// the node's categories (or, for wildcard nodes, any label at all).
fn match_curie(ontology: &OntologyMap, categories: &[String], curie: &str) -> Option<String> {
    if categories.is_empty() {
        // wildcard node: accept the identifier only if some label recognizes
        // it exactly as supplied
        for label in ontology.label_names() {
            if ontology.matches_label(label, curie) {
                let kind = ontology.identifier_kind_for_label(label);
                return Some(medigraph_ontology::curie::render_literal(kind, curie));
            }
        }
        return None;
    }

    for category in categories {
        let mapping = ontology.node_mapping(category)?;
        // a prefixed curie only split-matches a category that declares that
        // prefix; a bare suffix pattern must not accept foreign vocabularies
        if let Some(prefix) = &mapping.canonical_prefix {
            if curie.contains(':') && !curie.starts_with(prefix.as_str()) {
                continue;
            }
        }
        let formatted = mapping.format_curie(curie);
        for label in &mapping.labels {
            if ontology.matches_label(label, &formatted.backend_value) {
                return Some(formatted.literal);
            }
        }
    }
    None
}

/// Ask the normalization service for equivalent identifiers for everything
/// the first pass could not match, and re-run the match over the
/// equivalents. Failures here degrade to "still unmatched" rather than
/// aborting resolution.
fn normalize_pending(
    ontology: &OntologyMap,
    normalizer: &dyn IdentifierNormalizer,
    pending: &[(String, String)],
    resolved: &mut BTreeMap<String, ResolvedNode>,
) {
    let mut unique: Vec<String> = Vec::new();
    for (curie, _) in pending {
        if !unique.contains(curie) {
            unique.push(curie.clone());
        }
    }

    let identities = match normalizer.normalize(&unique) {
        Ok(identities) => identities,
        Err(err) => {
            tracing::warn!("identifier normalization failed: {err}");
            return;
        }
    };

    for (curie, node_key) in pending {
        let Some(Some(identity)) = identities.get(curie) else {
            continue;
        };
        let Some(rn) = resolved.get_mut(node_key) else {
            continue;
        };
        let mut candidates = vec![identity.canonical.clone()];
        candidates.extend(identity.equivalents.iter().cloned());
        for candidate in candidates {
            if let Some(literal) = match_curie(ontology, &rn.expanded_categories, &candidate) {
                rn.literal_filters.insert(literal, curie.clone());
            }
        }
    }
}

// ============================================================================
// Edges
// ============================================================================

pub fn resolve_edges(
    ontology: &OntologyMap,
    edges: &BTreeMap<String, QueryEdge>,
    nodes: &BTreeMap<String, ResolvedNode>,
) -> Result<BTreeMap<String, ResolvedEdge>, QueryError> {
    let mut resolved = BTreeMap::new();
    for (key, edge) in edges {
        let subject = nodes.get(&edge.subject).ok_or_else(|| {
            QueryError::MissingComponent(format!(
                "query edge {key} references unknown subject node {}",
                edge.subject
            ))
        })?;
        let object = nodes.get(&edge.object).ok_or_else(|| {
            QueryError::MissingComponent(format!(
                "query edge {key} references unknown object node {}",
                edge.object
            ))
        })?;

        validate_knowledge_type(key, edge, subject, object)?;

        let mut edge_types =
            ontology.edge_types_for_predicates(&edge.predicates, &subject.categories, &object.categories)?;

        for qualifier in &edge.qualifier_constraints {
            let refined = ontology
                .qualified_edge_types(
                    &edge.predicates,
                    &qualifier.qualifier_type_id,
                    &qualifier.qualifier_value,
                )
                .ok_or_else(|| {
                    QueryError::UnsupportedQualifier(format!(
                        "qualifier {} is not supported for predicates [{}]",
                        qualifier.qualifier_type_id,
                        edge.predicates.join(", ")
                    ))
                })?;
            edge_types = if edge_types.is_empty() {
                refined
            } else {
                edge_types.intersection(&refined).cloned().collect()
            };
            if edge_types.is_empty() {
                return Err(QueryError::UnsupportedQualifier(format!(
                    "no native edge type satisfies qualifier {}={} on query edge {key}",
                    qualifier.qualifier_type_id, qualifier.qualifier_value
                )));
            }
        }

        for constraint in &edge.constraints {
            constraints::validate_edge_constraint(ontology, &edge_types, constraint)?;
        }

        resolved.insert(
            key.clone(),
            ResolvedEdge {
                key: key.clone(),
                subject: edge.subject.clone(),
                object: edge.object.clone(),
                predicates: edge.predicates.clone(),
                edge_types,
                constraints: edge.constraints.clone(),
                knowledge_type: edge.knowledge_type,
            },
        );
    }
    Ok(resolved)
}

/// Inferred knowledge is only recognized for the drug-treats-disease shape;
/// everything else is rejected up front.
fn validate_knowledge_type(
    key: &str,
    edge: &QueryEdge,
    subject: &ResolvedNode,
    object: &ResolvedNode,
) -> Result<(), QueryError> {
    if edge.knowledge_type != KnowledgeType::Inferred {
        return Ok(());
    }
    if edge.predicates != [PREDICATE_TREATS.to_string()] {
        return Err(QueryError::UnsupportedKnowledgeType(format!(
            "only a single {PREDICATE_TREATS} predicate is supported for inferred \
             knowledge on query edge {key}"
        )));
    }
    let drug_like = [CATEGORY_DRUG, CATEGORY_SMALL_MOLECULE];
    if !subject
        .categories
        .iter()
        .all(|cat| drug_like.contains(&cat.as_str()))
    {
        return Err(QueryError::UnsupportedKnowledgeType(format!(
            "inferred {PREDICATE_TREATS} only supports subject categories [{}]",
            drug_like.join(", ")
        )));
    }
    if object.categories != [CATEGORY_DISEASE.to_string()] {
        return Err(QueryError::UnsupportedKnowledgeType(format!(
            "inferred {PREDICATE_TREATS} only supports the object category {CATEGORY_DISEASE}"
        )));
    }
    Ok(())
}

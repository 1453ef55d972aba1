//! Result reconstruction: raw traversal records -> typed, deduplicated
//! results.
//!
//! Records are walked alias-by-alias in traversal order. The knowledge
//! graph acts as the identity cache: a backend node or edge identifier maps
//! to exactly one reconstructed object no matter how many records (or
//! bindings within a record) reference it. Native labels, edge types, and
//! properties are translated through the ontology table; properties the
//! table does not know are dropped, never fabricated.

use std::collections::BTreeMap;

use medigraph_ontology::{OntologyMap, CATEGORY_NAMED_THING};

use crate::collaborators::WeightProvider;
use crate::compile::AliasBindings;
use crate::error::QueryError;
use crate::model::{
    Attribute, KnowledgeGraph, QualifierConstraint, QueryResult, ResultEdge, ResultNode,
};
use crate::session::{NativeEdge, NativeNode, NativeEntity, Record};

/// Attribute type carrying the propagated-weight (embedding) signal; the
/// default scoring registry knows this name.
pub const ATTRIBUTE_PROPAGATED_WEIGHT: &str = "propagated_weight";

pub struct Reconstruction {
    pub results: Vec<QueryResult>,
    pub knowledge_graph: KnowledgeGraph,
}

pub struct Reconstructor<'a> {
    ontology: &'a OntologyMap,
    weights: Option<&'a dyn WeightProvider>,
    enrichment_context: Option<&'a str>,
}

impl<'a> Reconstructor<'a> {
    pub fn new(ontology: &'a OntologyMap) -> Self {
        Reconstructor {
            ontology,
            weights: None,
            enrichment_context: None,
        }
    }

    /// Attach propagated weights for `context` to every reconstructed node.
    pub fn with_weights(mut self, provider: &'a dyn WeightProvider, context: &'a str) -> Self {
        self.weights = Some(provider);
        self.enrichment_context = Some(context);
        self
    }

    pub fn reconstruct(
        &self,
        records: &[Record],
        aliases: &AliasBindings,
    ) -> Result<Reconstruction, QueryError> {
        let weight_map = self.fetch_weights(records, aliases);

        let mut knowledge_graph = KnowledgeGraph::default();
        let mut results = Vec::with_capacity(records.len());

        for record in records {
            let mut result = QueryResult::default();
            for alias in &aliases.order {
                let entity = record.get(alias).ok_or_else(|| {
                    QueryError::Backend(anyhow::anyhow!(
                        "backend record is missing alias {alias}"
                    ))
                })?;
                match entity {
                    NativeEntity::Node(node) => {
                        let qnode_key = aliases.nodes.get(alias).ok_or_else(|| {
                            QueryError::Backend(anyhow::anyhow!(
                                "backend returned a node under edge alias {alias}"
                            ))
                        })?;
                        let id = node.identifier.identifier_string();
                        knowledge_graph
                            .nodes
                            .entry(id.clone())
                            .or_insert_with(|| self.build_node(&id, node, weight_map.as_ref()));
                        result.node_bindings.insert(qnode_key.clone(), id);
                    }
                    NativeEntity::Edge(edge) => {
                        let qedge_key = aliases.edges.get(alias).ok_or_else(|| {
                            QueryError::Backend(anyhow::anyhow!(
                                "backend returned a relationship under node alias {alias}"
                            ))
                        })?;
                        let id = edge.identifier.to_string();
                        knowledge_graph
                            .edges
                            .entry(id.clone())
                            .or_insert_with(|| self.build_edge(edge));
                        result.edge_bindings.insert(qedge_key.clone(), id);
                    }
                }
            }
            results.push(result);
        }

        Ok(Reconstruction {
            results,
            knowledge_graph,
        })
    }

    /// One batched weight lookup for every node identifier in the record
    /// set. `None` means the signal is not configured; a failed lookup
    /// degrades to zero weights rather than aborting reconstruction.
    fn fetch_weights(
        &self,
        records: &[Record],
        aliases: &AliasBindings,
    ) -> Option<BTreeMap<String, f64>> {
        let provider = self.weights?;
        let context = self.enrichment_context?;

        let mut identifiers: Vec<String> = Vec::new();
        for record in records {
            for alias in aliases.nodes.keys() {
                if let Some(NativeEntity::Node(node)) = record.get(alias) {
                    let id = node.identifier.identifier_string();
                    if !identifiers.contains(&id) {
                        identifiers.push(id);
                    }
                }
            }
        }

        match provider.propagated_weights(context, &identifiers) {
            Ok(weights) => Some(weights),
            Err(err) => {
                tracing::warn!("propagated-weight lookup failed for {context}: {err}");
                Some(BTreeMap::new())
            }
        }
    }

    fn build_node(
        &self,
        id: &str,
        node: &NativeNode,
        weights: Option<&BTreeMap<String, f64>>,
    ) -> ResultNode {
        let mut categories: Vec<String> = Vec::new();
        for label in &node.labels {
            let category = self.ontology.category_for_label(label).to_string();
            if !categories.contains(&category) {
                categories.push(category);
            }
        }
        if categories.is_empty() {
            categories.push(CATEGORY_NAMED_THING.to_string());
        }

        let name = node
            .properties
            .get("name")
            .and_then(|v| v.as_text())
            .map(str::to_string);

        let mut attributes = Vec::new();
        for (property, value) in &node.properties {
            if let Some(attribute_type) = self.ontology.node_attribute_type(&node.labels, property)
            {
                attributes.push(Attribute::new(attribute_type, value.clone()));
            }
        }
        if let Some(weights) = weights {
            attributes.push(
                Attribute::new(
                    ATTRIBUTE_PROPAGATED_WEIGHT,
                    weights.get(id).copied().unwrap_or(0.0),
                )
                .with_source("propagated-weight-service"),
            );
        }

        ResultNode {
            categories,
            name,
            attributes,
        }
    }

    fn build_edge(&self, edge: &NativeEdge) -> ResultEdge {
        let predicate = self
            .ontology
            .predicate_for_edge_type(&edge.edge_type)
            .to_string();

        let mut attributes = Vec::new();
        for (property, value) in &edge.properties {
            if let Some(attribute_type) =
                self.ontology.edge_attribute_type(&edge.edge_type, property)
            {
                attributes.push(Attribute::new(attribute_type, value.clone()));
            }
        }

        let qualifiers = self
            .ontology
            .qualifiers_for_edge_type(&edge.edge_type)
            .into_iter()
            .map(|(qualifier_type_id, qualifier_value)| QualifierConstraint {
                qualifier_type_id,
                qualifier_value,
            })
            .collect();

        ResultEdge {
            predicate,
            subject: edge.subject_identifier.identifier_string(),
            object: edge.object_identifier.identifier_string(),
            attributes,
            qualifiers,
        }
    }
}

/// Apply a global identifier rename (backend identifier -> canonical
/// external identifier) consistently across the knowledge graph and every
/// result's bindings. A source identifier renames to at most one canonical
/// form; should two sources collapse onto the same canonical identifier,
/// the first reconstruction wins and the duplicate is dropped.
pub fn apply_canonical_identifiers(
    knowledge_graph: &mut KnowledgeGraph,
    results: &mut [QueryResult],
    rename: &BTreeMap<String, String>,
) {
    if rename.is_empty() {
        return;
    }
    let renamed = |id: &String| rename.get(id).cloned().unwrap_or_else(|| id.clone());

    let nodes = std::mem::take(&mut knowledge_graph.nodes);
    for (id, node) in nodes {
        knowledge_graph.nodes.entry(renamed(&id)).or_insert(node);
    }

    for edge in knowledge_graph.edges.values_mut() {
        edge.subject = renamed(&edge.subject);
        edge.object = renamed(&edge.object);
    }

    for result in results {
        for bound in result.node_bindings.values_mut() {
            *bound = renamed(bound);
        }
    }
}

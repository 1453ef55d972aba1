//! Cypher compilation: traversal order -> one parameterized path query.
//!
//! Each traversal element gets a short alphabetic alias in order (`a`, `b`,
//! `c`, … then `aa`, `ab`, …), the per-element filters become one WHERE
//! conjunction, and the result count is clamped to a hard ceiling so a
//! permissive caller cannot melt the backend.

use std::collections::BTreeMap;

use medigraph_ontology::OntologyMap;

use crate::constraints::{self, ConstraintHandlers};
use crate::error::QueryError;
use crate::model::{format_number, Step, TraversalOrder};
use crate::resolve::{ResolvedEdge, ResolvedNode};
use crate::session::Params;

/// Hard ceiling on the compiled LIMIT, whatever the caller asked for.
pub const MAX_RESULTS_CEILING: usize = 200;

pub fn clamp_max_results(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(MAX_RESULTS_CEILING)
        .min(MAX_RESULTS_CEILING)
}

/// alias -> query key, both directions the reconstructor needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasBindings {
    pub nodes: BTreeMap<String, String>,
    pub edges: BTreeMap<String, String>,
    /// Aliases in traversal order.
    pub order: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub cypher: String,
    pub aliases: AliasBindings,
    pub params: Params,
    pub limit: usize,
}

/// `a`..`z`, then `aa`, `ab`, …; comfortably beyond twice any plausible
/// traversal diameter.
pub fn alias_for(index: usize) -> String {
    const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
    if index < 26 {
        (LETTERS[index] as char).to_string()
    } else {
        let first = LETTERS[(index / 26 - 1) % 26] as char;
        let second = LETTERS[index % 26] as char;
        format!("{first}{second}")
    }
}

pub fn compile(
    order: &TraversalOrder,
    nodes: &BTreeMap<String, ResolvedNode>,
    edges: &BTreeMap<String, ResolvedEdge>,
    ontology: &OntologyMap,
    handlers: &ConstraintHandlers,
    max_results: usize,
) -> Result<CompiledQuery, QueryError> {
    let mut pattern = Vec::with_capacity(order.len());
    let mut filters: Vec<String> = Vec::new();
    let mut aliases = AliasBindings::default();

    for (index, step) in order.steps.iter().enumerate() {
        let alias = alias_for(index);
        aliases.order.push(alias.clone());
        match step {
            Step::Node(key) => {
                let node = nodes.get(key).ok_or_else(|| {
                    QueryError::MissingComponent(format!(
                        "traversal order references unknown node {key}"
                    ))
                })?;
                aliases.nodes.insert(alias.clone(), key.clone());
                pattern.push(node_pattern(&alias, node));
                node_filters(ontology, handlers, &alias, node, &mut filters)?;
            }
            Step::Edge(key) => {
                let edge = edges.get(key).ok_or_else(|| {
                    QueryError::MissingComponent(format!(
                        "traversal order references unknown edge {key}"
                    ))
                })?;
                aliases.edges.insert(alias.clone(), key.clone());
                pattern.push(edge_pattern(&alias, edge));
                for constraint in &edge.constraints {
                    if let Some(clause) = constraints::edge_constraint_clause(
                        ontology,
                        handlers,
                        &alias,
                        &edge.edge_types,
                        constraint,
                    )? {
                        filters.push(clause);
                    }
                }
            }
        }
    }

    let mut cypher = format!("MATCH p = {}", pattern.join("-"));
    if !filters.is_empty() {
        cypher.push_str(" WHERE ");
        cypher.push_str(&filters.join(" AND "));
    }
    cypher.push_str(&format!(" RETURN * LIMIT {max_results}"));

    Ok(CompiledQuery {
        cypher,
        aliases,
        params: Params::new(),
        limit: max_results,
    })
}

/// A node matches inline on its label only when exactly one label resolved;
/// the multi-label disjunction lives in WHERE.
fn node_pattern(alias: &str, node: &ResolvedNode) -> String {
    if node.labels.len() == 1 {
        format!("({alias}:{})", node.labels[0])
    } else {
        format!("({alias})")
    }
}

fn edge_pattern(alias: &str, edge: &ResolvedEdge) -> String {
    if edge.edge_types.is_empty() {
        format!("[{alias}]")
    } else {
        let types: Vec<&str> = edge.edge_types.iter().map(String::as_str).collect();
        format!("[{alias}:{}]", types.join("|"))
    }
}

fn label_disjunction(alias: &str, labels: &[&str]) -> String {
    let parts: Vec<String> = labels.iter().map(|l| format!("{alias}:{l}")).collect();
    if parts.len() == 1 {
        parts.into_iter().next().unwrap_or_default()
    } else {
        format!("({})", parts.join(" OR "))
    }
}

fn node_filters(
    ontology: &OntologyMap,
    handlers: &ConstraintHandlers,
    alias: &str,
    node: &ResolvedNode,
    filters: &mut Vec<String>,
) -> Result<(), QueryError> {
    if !node.literal_filters.is_empty() {
        filters.push(identifier_filter(ontology, alias, node));
    } else if node.labels.len() > 1 {
        let labels: Vec<&str> = node.labels.iter().map(String::as_str).collect();
        filters.push(label_disjunction(alias, &labels));
    }

    for floor in &node.required_floors {
        filters.push(format!(
            "{alias}.{} > {}",
            floor.property,
            format_number(floor.minimum)
        ));
    }

    for constraint in &node.constraints {
        if let Some(clause) = constraints::node_constraint_clause(
            ontology,
            handlers,
            alias,
            &node.labels,
            constraint,
        )? {
            filters.push(clause);
        }
    }
    Ok(())
}

/// The identifier membership filter. Labels sharing an identifier property
/// share one membership test; labels with differing identifier properties
/// are OR-combined, each guarded by its own label predicate.
fn identifier_filter(ontology: &OntologyMap, alias: &str, node: &ResolvedNode) -> String {
    let literals: Vec<&str> = node.literal_filters.keys().map(String::as_str).collect();
    let membership = |property: &str| format!("{alias}.{property} IN [{}]", literals.join(", "));

    if node.labels.is_empty() {
        return membership("identifier");
    }
    if node.labels.len() == 1 {
        return membership(ontology.identifier_property(&node.labels[0]));
    }

    // group labels by their identifier property, preserving label order
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    for label in &node.labels {
        let property = ontology.identifier_property(label);
        match groups.iter_mut().find(|(p, _)| *p == property) {
            Some((_, labels)) => labels.push(label),
            None => groups.push((property, vec![label])),
        }
    }

    if groups.len() == 1 {
        let (property, labels) = &groups[0];
        return format!(
            "({} AND {})",
            label_disjunction(alias, labels),
            membership(property)
        );
    }

    let parts: Vec<String> = groups
        .iter()
        .map(|(property, labels)| {
            format!(
                "({} AND {})",
                label_disjunction(alias, labels),
                membership(property)
            )
        })
        .collect();
    format!("({})", parts.join(" OR "))
}

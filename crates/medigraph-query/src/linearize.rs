//! Query-graph linearization: a validated node-edge-node… walk.
//!
//! Only query graphs forming a single simple path are compilable. The walk
//! starts from a terminal (degree-1) node and consumes edges from an
//! explicit working set, so termination is auditable: every iteration
//! either appends one step and shrinks the set, or fails.
//!
//! Tie-breaks are lexicographic on key order throughout (the node and edge
//! maps are ordered), which keeps the traversal order, and therefore the
//! compiled alias names, reproducible for identical inputs.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::QueryError;
use crate::model::{Step, TraversalOrder};
use crate::resolve::{ResolvedEdge, ResolvedNode};

pub fn linearize(
    nodes: &BTreeMap<String, ResolvedNode>,
    edges: &BTreeMap<String, ResolvedEdge>,
) -> Result<TraversalOrder, QueryError> {
    if nodes.is_empty() {
        return Err(QueryError::NonLinearQuery(
            "query graph has no nodes".to_string(),
        ));
    }
    if edges.is_empty() {
        if nodes.len() > 1 {
            return Err(QueryError::NonLinearQuery(
                "query graph has multiple nodes but no connecting edges".to_string(),
            ));
        }
        let only = nodes.keys().next().cloned().unwrap_or_default();
        return Ok(TraversalOrder {
            steps: vec![Step::Node(only)],
        });
    }

    // every referenced endpoint must exist before anything else
    for (key, edge) in edges {
        for endpoint in [&edge.subject, &edge.object] {
            if !nodes.contains_key(endpoint) {
                return Err(QueryError::MissingComponent(format!(
                    "query edge {key} references unknown node {endpoint}"
                )));
            }
        }
    }

    let mut degree: BTreeMap<&str, usize> = BTreeMap::new();
    for edge in edges.values() {
        *degree.entry(edge.subject.as_str()).or_default() += 1;
        *degree.entry(edge.object.as_str()).or_default() += 1;
    }
    if degree.len() != nodes.len() {
        let stranded: Vec<&str> = nodes
            .keys()
            .filter(|k| !degree.contains_key(k.as_str()))
            .map(String::as_str)
            .collect();
        return Err(QueryError::NonLinearQuery(format!(
            "query node(s) {} are not connected to any edge",
            stranded.join(", ")
        )));
    }

    let start = if edges.len() == 1 {
        // either endpoint works for a single edge; the subject is the
        // documented pick
        edges.values().next().map(|e| e.subject.clone()).unwrap_or_default()
    } else {
        if let Some((key, _)) = degree.iter().find(|(_, d)| **d > 2) {
            return Err(QueryError::NonLinearQuery(format!(
                "query node {key} branches into more than two edges"
            )));
        }
        let terminals: Vec<&str> = degree
            .iter()
            .filter(|(_, d)| **d == 1)
            .map(|(k, _)| *k)
            .collect();
        if terminals.len() != 2 {
            return Err(QueryError::NonLinearQuery(format!(
                "expected exactly two terminal nodes, found {}",
                terminals.len()
            )));
        }
        terminals[0].to_string()
    };

    // walk outward, consuming edges from the working set; the walk may only
    // stop on a node, so a trailing edge still gets its far endpoint checked
    let mut remaining: BTreeSet<&String> = edges.keys().collect();
    let mut steps = vec![Step::Node(start)];
    let target = nodes.len() + edges.len();

    while steps.len() < target || matches!(steps.last(), Some(Step::Edge(_))) {
        match steps.last().cloned() {
            Some(Step::Node(node_key)) => {
                let next_edge = remaining
                    .iter()
                    .find(|key| {
                        let edge = &edges[key.as_str()];
                        edge.subject == node_key || edge.object == node_key
                    })
                    .copied()
                    .cloned();
                match next_edge {
                    Some(edge_key) => {
                        remaining.remove(&edge_key);
                        steps.push(Step::Edge(edge_key));
                    }
                    None => {
                        return Err(QueryError::NonLinearQuery(format!(
                            "no unvisited edge continues the path at query node {node_key}"
                        )));
                    }
                }
            }
            Some(Step::Edge(edge_key)) => {
                let edge = &edges[&edge_key];
                let previous = match steps.get(steps.len().wrapping_sub(2)) {
                    Some(Step::Node(key)) => key.as_str(),
                    _ => "",
                };
                let mut other: Vec<&str> = Vec::new();
                for endpoint in [edge.subject.as_str(), edge.object.as_str()] {
                    if endpoint != previous {
                        other.push(endpoint);
                    }
                }
                if other.len() != 1 {
                    return Err(QueryError::MissingComponent(format!(
                        "query edge {edge_key} does not continue the path past node {previous}"
                    )));
                }
                steps.push(Step::Node(other[0].to_string()));
            }
            None => unreachable!("walk always starts with a node"),
        }
    }

    Ok(TraversalOrder { steps })
}

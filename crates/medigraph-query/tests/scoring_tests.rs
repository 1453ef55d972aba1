//! Scoring-engine properties: purity, monotonicity, registry injection.

use std::collections::BTreeMap;

use approx::assert_relative_eq;
use medigraph_query::{
    score_result, Attribute, KnowledgeGraph, QueryResult, ResultEdge, ResultNode,
    ScoringRegistry, ATTRIBUTE_EXPR_CORRELATION, ATTRIBUTE_PROPAGATED_WEIGHT,
};

fn node_with(attributes: Vec<Attribute>) -> ResultNode {
    ResultNode {
        categories: vec!["biolink:Gene".to_string()],
        name: Some("GENE1".to_string()),
        attributes,
    }
}

fn one_hop_graph(node_attributes: Vec<Attribute>, edge_attributes: Vec<Attribute>) -> KnowledgeGraph {
    let mut graph = KnowledgeGraph::default();
    graph.nodes.insert("100".to_string(), node_with(vec![]));
    graph.nodes.insert("200".to_string(), node_with(node_attributes));
    graph.edges.insert(
        "9000".to_string(),
        ResultEdge {
            predicate: "biolink:associated_with".to_string(),
            subject: "100".to_string(),
            object: "200".to_string(),
            attributes: edge_attributes,
            qualifiers: vec![],
        },
    );
    graph
}

fn bound_result() -> QueryResult {
    QueryResult {
        node_bindings: BTreeMap::from([
            ("n0".to_string(), "100".to_string()),
            ("n1".to_string(), "200".to_string()),
        ]),
        edge_bindings: BTreeMap::from([("e0".to_string(), "9000".to_string())]),
        score: 0.0,
        score_name: None,
    }
}

#[test]
fn scoring_is_pure() {
    let registry = ScoringRegistry::default_registry();
    let graph = one_hop_graph(
        vec![Attribute::new(ATTRIBUTE_PROPAGATED_WEIGHT, 0.0003)],
        vec![Attribute::new(ATTRIBUTE_EXPR_CORRELATION, 0.41)],
    );
    let result = bound_result();
    let first = score_result(&result, &graph, &registry);
    let second = score_result(&result, &graph, &registry);
    assert_eq!(first, second);
    assert_relative_eq!(first, 0.0003 * 10000.0 + 0.41);
}

#[test]
fn registered_attribute_strictly_increases_score() {
    let registry = ScoringRegistry::default_registry();
    let without = one_hop_graph(vec![], vec![]);
    let with = one_hop_graph(
        vec![Attribute::new(ATTRIBUTE_PROPAGATED_WEIGHT, 0.0001)],
        vec![],
    );
    let result = bound_result();
    let baseline = score_result(&result, &without, &registry);
    let boosted = score_result(&result, &with, &registry);
    assert!(boosted > baseline);
}

#[test]
fn unregistered_attributes_do_not_move_the_score() {
    let registry = ScoringRegistry::default_registry();
    let graph = one_hop_graph(
        vec![Attribute::new("biolink:description", "irrelevant")],
        vec![Attribute::new("loader_notes", "also irrelevant")],
    );
    let result = bound_result();
    assert_eq!(score_result(&result, &graph, &registry), 0.0);
}

#[test]
fn custom_registry_overrides_the_signal_set() {
    let mut registry = ScoringRegistry::new();
    registry.register("gwas_association", |a| a.value.as_f64().unwrap_or(0.0) * 2.0);

    let graph = one_hop_graph(
        // ignored under the custom registry
        vec![Attribute::new(ATTRIBUTE_PROPAGATED_WEIGHT, 0.5)],
        vec![Attribute::new("gwas_association", 3.0)],
    );
    let result = bound_result();
    assert_relative_eq!(score_result(&result, &graph, &registry), 6.0);
}

#[test]
fn unbound_identifiers_contribute_nothing() {
    let registry = ScoringRegistry::default_registry();
    let graph = one_hop_graph(vec![Attribute::new(ATTRIBUTE_PROPAGATED_WEIGHT, 1.0)], vec![]);
    let mut result = bound_result();
    result.node_bindings.insert("n1".to_string(), "missing".to_string());
    assert_eq!(score_result(&result, &graph, &registry), 0.0);
}

//! Data model: caller-facing query graphs and reconstructed results.
//!
//! The query-graph shapes (`QueryGraph`, `QueryNode`, `QueryEdge`) mirror
//! what a translator-standard HTTP layer deserializes from a request; the
//! result shapes (`KnowledgeGraph`, `QueryResult`) are what it serializes
//! back. Both sides are plain serde structs so that layer stays glue.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// Property values
// ============================================================================

/// A native property value as stored in the backend graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl PropertyValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Integer(i) => Some(*i as f64),
            PropertyValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// String form used as a knowledge-graph identifier key.
    pub fn identifier_string(&self) -> String {
        match self {
            PropertyValue::Text(s) => s.clone(),
            PropertyValue::Integer(i) => i.to_string(),
            PropertyValue::Float(f) => f.to_string(),
            PropertyValue::Bool(b) => b.to_string(),
        }
    }

    /// Render as a query literal: text quoted, everything else bare.
    pub fn render_literal(&self) -> String {
        match self {
            PropertyValue::Text(s) => format!("'{s}'"),
            PropertyValue::Integer(i) => i.to_string(),
            PropertyValue::Float(f) => format_number(*f),
            PropertyValue::Bool(b) => b.to_string(),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Integer(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        PropertyValue::Float(f)
    }
}

/// Format a float without a trailing `.0` when it is integral.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

// ============================================================================
// Query graph (input)
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeType {
    #[default]
    Lookup,
    Inferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintOperator {
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "matches")]
    Matches,
}

/// Scalar-or-list constraint value, as callers are allowed to send either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstraintValue {
    One(PropertyValue),
    Many(Vec<PropertyValue>),
}

impl ConstraintValue {
    pub fn values(&self) -> Vec<PropertyValue> {
        match self {
            ConstraintValue::One(v) => vec![v.clone()],
            ConstraintValue::Many(vs) => vs.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeConstraint {
    /// External attribute slot the constraint applies to.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub operator: ConstraintOperator,
    pub value: ConstraintValue,
    #[serde(default, rename = "not")]
    pub negated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualifierConstraint {
    pub qualifier_type_id: String,
    pub qualifier_value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryNode {
    /// Literal source identifiers (curies); empty means unpinned.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
    /// External categories; empty means any category.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<AttributeConstraint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryEdge {
    pub subject: String,
    pub object: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub predicates: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<AttributeConstraint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qualifier_constraints: Vec<QualifierConstraint>,
    #[serde(default)]
    pub knowledge_type: KnowledgeType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryGraph {
    pub nodes: BTreeMap<String, QueryNode>,
    pub edges: BTreeMap<String, QueryEdge>,
}

// ============================================================================
// Traversal order
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum Step {
    Node(String),
    Edge(String),
}

impl Step {
    pub fn key(&self) -> &str {
        match self {
            Step::Node(k) | Step::Edge(k) => k,
        }
    }
}

/// The node-edge-node… sequence a linear query is both compiled from and
/// re-walked in during reconstruction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalOrder {
    pub steps: Vec<Step>,
}

impl TraversalOrder {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn node_keys(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().filter_map(|s| match s {
            Step::Node(k) => Some(k.as_str()),
            Step::Edge(_) => None,
        })
    }

    pub fn edge_keys(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().filter_map(|s| match s {
            Step::Edge(k) => Some(k.as_str()),
            Step::Node(_) => None,
        })
    }

    /// Consecutive (node, edge, node) key triples along the path.
    pub fn triples(&self) -> Vec<(&str, &str, &str)> {
        self.steps
            .windows(3)
            .filter_map(|window| match window {
                [Step::Node(a), Step::Edge(e), Step::Node(b)] => {
                    Some((a.as_str(), e.as_str(), b.as_str()))
                }
                _ => None,
            })
            .collect()
    }
}

// ============================================================================
// Results (output)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub attribute_type_id: String,
    pub value: PropertyValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Attribute {
    pub fn new(attribute_type_id: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        Attribute {
            attribute_type_id: attribute_type_id.into(),
            value: value.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultNode {
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEdge {
    pub predicate: String,
    pub subject: String,
    pub object: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qualifiers: Vec<QualifierConstraint>,
}

/// Deduplicated union of every node and edge matched across all results.
/// A backend entity appears exactly once no matter how many results
/// reference it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub nodes: BTreeMap<String, ResultNode>,
    pub edges: BTreeMap<String, ResultEdge>,
}

/// One matched traversal: bindings from query keys back to knowledge-graph
/// identifiers, plus a score that stays mutable until the final sort.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub node_bindings: BTreeMap<String, String>,
    pub edge_bindings: BTreeMap<String, String>,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_value_literals() {
        assert_eq!(PropertyValue::from("DOID:1234").render_literal(), "'DOID:1234'");
        assert_eq!(PropertyValue::from(42i64).render_literal(), "42");
        assert_eq!(PropertyValue::from(2.0f64).render_literal(), "2");
        assert_eq!(PropertyValue::from(2.5f64).render_literal(), "2.5");
    }

    #[test]
    fn constraint_value_accepts_scalar_and_list() {
        let scalar: ConstraintValue = serde_json::from_str("\"clinical_trial_phase_3\"").unwrap();
        assert_eq!(scalar.values().len(), 1);
        let list: ConstraintValue = serde_json::from_str("[1, 2]").unwrap();
        assert_eq!(list.values().len(), 2);
    }

    #[test]
    fn query_graph_deserializes_translator_shape() {
        let graph: QueryGraph = serde_json::from_str(
            r#"{
                "nodes": {
                    "n0": {"ids": ["DOID:1234"], "categories": ["biolink:Disease"]},
                    "n1": {"categories": ["biolink:Gene"]}
                },
                "edges": {
                    "e0": {"subject": "n0", "object": "n1", "predicates": ["biolink:related_to"]}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges["e0"].knowledge_type, KnowledgeType::Lookup);
    }

    #[test]
    fn traversal_triples_walk_the_path() {
        let order = TraversalOrder {
            steps: vec![
                Step::Node("n0".into()),
                Step::Edge("e0".into()),
                Step::Node("n1".into()),
                Step::Edge("e1".into()),
                Step::Node("n2".into()),
            ],
        };
        assert_eq!(
            order.triples(),
            vec![("n0", "e0", "n1"), ("n1", "e1", "n2")]
        );
    }
}

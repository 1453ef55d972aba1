//! Scoring: weighted attribute contributions, ranking, normalization.
//!
//! A [`ScoringRegistry`] maps attribute-type names to numeric transforms.
//! Scoring a result sums the transforms of every attribute on its bound
//! nodes and edges; attributes without a registered transform contribute
//! nothing. The registry is plain data built at startup and injected, so a
//! score is a pure function of the result's bound attributes.

use std::collections::BTreeMap;

use crate::model::{Attribute, KnowledgeGraph, QueryResult};
use crate::reconstruct::ATTRIBUTE_PROPAGATED_WEIGHT;

pub const SCORE_METHOD_WEIGHTED_SUM: &str = "weighted attribute sum";

pub const ATTRIBUTE_CLINICAL_FREQUENCY: &str = "clinical_frequency_paired_concept";
pub const ATTRIBUTE_FEATURE_IMPORTANCE: &str = "feature_importance";
pub const ATTRIBUTE_EXPR_CORRELATION: &str = "expr_correlation_spearman";
pub const ATTRIBUTE_LITERATURE_COOCCURRENCE: &str = "literature_cooccurrence_ngd";

pub type AttributeTransform = fn(&Attribute) -> f64;

pub struct ScoringRegistry {
    transforms: BTreeMap<String, AttributeTransform>,
}

impl ScoringRegistry {
    pub fn new() -> Self {
        ScoringRegistry {
            transforms: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, attribute_type: impl Into<String>, transform: AttributeTransform) {
        self.transforms.insert(attribute_type.into(), transform);
    }

    /// The historical signal set: clinical co-occurrence frequencies and
    /// propagated weights are rescaled onto a comparable magnitude, the
    /// remaining signals pass through.
    pub fn default_registry() -> Self {
        let mut registry = ScoringRegistry::new();
        registry.register(ATTRIBUTE_CLINICAL_FREQUENCY, |a| {
            a.value.as_f64().unwrap_or(0.0) * 1000.0
        });
        registry.register(ATTRIBUTE_PROPAGATED_WEIGHT, |a| {
            a.value.as_f64().unwrap_or(0.0) * 10000.0
        });
        registry.register(ATTRIBUTE_FEATURE_IMPORTANCE, |a| {
            a.value.as_f64().unwrap_or(0.0)
        });
        registry.register(ATTRIBUTE_EXPR_CORRELATION, |a| {
            a.value.as_f64().unwrap_or(0.0)
        });
        registry.register(ATTRIBUTE_LITERATURE_COOCCURRENCE, |a| {
            a.value.as_f64().unwrap_or(0.0)
        });
        registry
    }

    pub fn contribution(&self, attribute: &Attribute) -> f64 {
        match self.transforms.get(&attribute.attribute_type_id) {
            Some(transform) => transform(attribute),
            None => 0.0,
        }
    }
}

impl Default for ScoringRegistry {
    fn default() -> Self {
        ScoringRegistry::default_registry()
    }
}

/// Sum of registered contributions across every bound node and edge.
pub fn score_result(
    result: &QueryResult,
    knowledge_graph: &KnowledgeGraph,
    registry: &ScoringRegistry,
) -> f64 {
    let mut score = 0.0;
    for bound in result.node_bindings.values() {
        if let Some(node) = knowledge_graph.nodes.get(bound) {
            for attribute in &node.attributes {
                score += registry.contribution(attribute);
            }
        }
    }
    for bound in result.edge_bindings.values() {
        if let Some(edge) = knowledge_graph.edges.get(bound) {
            for attribute in &edge.attributes {
                score += registry.contribution(attribute);
            }
        }
    }
    score
}

/// Sort descending by score and truncate. The sort is stable, so equal
/// scores keep their original record order.
pub fn rank_results(results: &mut Vec<QueryResult>, max_results: usize) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(max_results);
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Linearly rescale scores into [0.01, 1], preserving rank order. All-zero
/// score sets are left alone; an all-equal (or single) score set collapses
/// to the constant 1.
pub fn normalize_scores(results: &mut [QueryResult]) {
    if results.is_empty() {
        return;
    }
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for result in results.iter() {
        min = min.min(result.score);
        max = max.max(result.score);
    }
    if min == 0.0 && max == 0.0 {
        return;
    }
    if results.len() == 1 || (max - min).abs() < f64::EPSILON {
        for result in results.iter_mut() {
            result.score = 1.0;
        }
        return;
    }

    let desired_max = 1.0;
    let desired_min = 0.01;
    let m = (desired_max - desired_min) / (max - min);
    let b = desired_min - m * min;
    for result in results.iter_mut() {
        result.score = round3(m * result.score + b);
    }
}

//! Full-pipeline tests against fixture sessions.

use std::collections::BTreeMap;

use approx::assert_relative_eq;
use medigraph_ontology::OntologyMap;
use medigraph_query::{
    native_edge, native_node, Attribute, EnrichmentAdapter, FailingSession, FixtureSession,
    GraphSession, IdentifierNormalizer, KnowledgeGraph, NormalizedIdentity, PropertyValue,
    QueryEngine, QueryError, QueryGraph, QueryOptions, QueryPlan, QueryResult, Record,
    TemplateQueryHandler, WeightProvider, ATTRIBUTE_EXPR_CORRELATION, SCORE_METHOD_WEIGHTED_SUM,
};

fn graph(json: &str) -> QueryGraph {
    serde_json::from_str(json).expect("test graph should deserialize")
}

fn disease_gene_graph() -> QueryGraph {
    graph(
        r#"{
            "nodes": {
                "n0": {"ids": ["DOID:1234"], "categories": ["biolink:Disease"]},
                "n1": {"categories": ["biolink:Gene"]}
            },
            "edges": {
                "e0": {"subject": "n0", "object": "n1", "predicates": ["biolink:associated_with"]}
            }
        }"#,
    )
}

fn hop_record(disease_id: &str, edge_id: i64, gene_id: i64, symbol: &str) -> Record {
    let mut record = Record::new();
    record.insert(
        "a",
        native_node(
            disease_id,
            &["Disease"],
            &[("name", PropertyValue::from("a disease"))],
        ),
    );
    record.insert(
        "b",
        native_edge(edge_id, "ASSOCIATES_DaG", disease_id, gene_id, &[]),
    );
    record.insert(
        "c",
        native_node(gene_id, &["Gene"], &[("name", PropertyValue::from(symbol))]),
    );
    record
}

fn three_gene_records() -> Vec<Record> {
    vec![
        hop_record("1234", 9000, 5468, "PON1"),
        hop_record("1234", 9001, 5444, "LPO"),
        hop_record("1234", 9002, 1803, "DPP4"),
    ]
}

struct CannedWeights;

impl WeightProvider for CannedWeights {
    fn propagated_weights(
        &self,
        _context: &str,
        identifiers: &[String],
    ) -> anyhow::Result<BTreeMap<String, f64>> {
        let known: BTreeMap<&str, f64> =
            [("5468", 0.0004), ("5444", 0.0001), ("1803", 0.0009)]
                .into_iter()
                .collect();
        Ok(identifiers
            .iter()
            .map(|id| (id.clone(), known.get(id.as_str()).copied().unwrap_or(0.0)))
            .collect())
    }
}

#[test]
fn end_to_end_ranking_and_normalization() {
    let engine = QueryEngine::new(OntologyMap::default_map())
        .with_weight_provider(Box::new(CannedWeights));
    let session = FixtureSession::new(three_gene_records());
    let options = QueryOptions {
        enrichment_context: Some("DOID:1234".to_string()),
        enable_third_party_enrichment: false,
    };

    let (results, knowledge_graph) = engine
        .run_query(&disease_gene_graph(), &options, Some(10), &session)
        .unwrap();

    // shared disease node reconstructed once across all three records
    assert_eq!(knowledge_graph.nodes.len(), 4);
    assert_eq!(knowledge_graph.edges.len(), 3);

    // ranked by propagated weight, rescaled into [0.01, 1]
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].node_bindings["n1"], "1803");
    assert_eq!(results[1].node_bindings["n1"], "5468");
    assert_eq!(results[2].node_bindings["n1"], "5444");
    assert_relative_eq!(results[0].score, 1.0);
    assert_relative_eq!(results[1].score, 0.381);
    assert_relative_eq!(results[2].score, 0.01);
    assert_eq!(
        results[0].score_name.as_deref(),
        Some(SCORE_METHOD_WEIGHTED_SUM)
    );

    // and the session saw the compiled query
    let queries = session.seen_queries();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].contains("(a:Disease)"));
}

#[test]
fn raw_scores_survive_when_normalization_is_disabled() {
    let engine = QueryEngine::new(OntologyMap::default_map())
        .with_weight_provider(Box::new(CannedWeights))
        .with_score_normalization(false);
    let session = FixtureSession::new(three_gene_records());
    let options = QueryOptions {
        enrichment_context: Some("DOID:1234".to_string()),
        enable_third_party_enrichment: false,
    };

    let (results, _) = engine
        .run_query(&disease_gene_graph(), &options, Some(10), &session)
        .unwrap();
    assert_relative_eq!(results[0].score, 9.0);
    assert_relative_eq!(results[1].score, 4.0);
    assert_relative_eq!(results[2].score, 1.0);
}

#[test]
fn truncation_respects_requested_maximum() {
    let engine = QueryEngine::new(OntologyMap::default_map())
        .with_weight_provider(Box::new(CannedWeights));
    let session = FixtureSession::new(three_gene_records());
    let options = QueryOptions {
        enrichment_context: Some("DOID:1234".to_string()),
        enable_third_party_enrichment: false,
    };
    let (results, _) = engine
        .run_query(&disease_gene_graph(), &options, Some(2), &session)
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].node_bindings["n1"], "1803");
}

#[test]
fn backend_failure_propagates_untransformed() {
    let engine = QueryEngine::new(OntologyMap::default_map());
    let session = FailingSession("bolt connection reset".to_string());
    let err = engine
        .run_query(
            &disease_gene_graph(),
            &QueryOptions::default(),
            None,
            &session,
        )
        .unwrap_err();
    match err {
        QueryError::Backend(inner) => {
            assert!(inner.to_string().contains("bolt connection reset"));
        }
        other => panic!("expected a backend error, got {other:?}"),
    }
}

// ============================================================================
// Enrichment adapters
// ============================================================================

struct PoisonedAdapter;

impl EnrichmentAdapter for PoisonedAdapter {
    fn name(&self) -> &str {
        "poisoned"
    }

    fn annotate(
        &self,
        _plan: &QueryPlan,
        knowledge_graph: &mut KnowledgeGraph,
        _results: &[QueryResult],
    ) -> anyhow::Result<()> {
        // mutate, then fail: the engine must restore the pre-adapter graph
        for edge in knowledge_graph.edges.values_mut() {
            edge.attributes
                .push(Attribute::new(ATTRIBUTE_EXPR_CORRELATION, 99.0));
        }
        anyhow::bail!("enrichment service timed out")
    }
}

struct CorrelationStub;

impl EnrichmentAdapter for CorrelationStub {
    fn name(&self) -> &str {
        "correlation-stub"
    }

    fn annotate(
        &self,
        _plan: &QueryPlan,
        knowledge_graph: &mut KnowledgeGraph,
        _results: &[QueryResult],
    ) -> anyhow::Result<()> {
        for edge in knowledge_graph.edges.values_mut() {
            edge.attributes
                .push(Attribute::new(ATTRIBUTE_EXPR_CORRELATION, 0.25));
        }
        Ok(())
    }
}

#[test]
fn failing_adapter_leaves_graph_as_it_stood() {
    let engine = QueryEngine::new(OntologyMap::default_map())
        .with_enrichment_adapter(Box::new(PoisonedAdapter));
    let session = FixtureSession::new(three_gene_records());
    let options = QueryOptions {
        enrichment_context: None,
        enable_third_party_enrichment: true,
    };

    let (results, knowledge_graph) = engine
        .run_query(&disease_gene_graph(), &options, None, &session)
        .unwrap();
    for edge in knowledge_graph.edges.values() {
        assert!(edge.attributes.is_empty(), "poisoned attributes survived");
    }
    // nothing contributed a signal, so scores stay zero and untouched
    assert!(results.iter().all(|r| r.score == 0.0));
}

#[test]
fn successful_adapter_contributes_to_scores() {
    let engine = QueryEngine::new(OntologyMap::default_map())
        .with_enrichment_adapter(Box::new(CorrelationStub))
        .with_score_normalization(false);
    let session = FixtureSession::new(three_gene_records());
    let options = QueryOptions {
        enrichment_context: None,
        enable_third_party_enrichment: true,
    };

    let (results, _) = engine
        .run_query(&disease_gene_graph(), &options, None, &session)
        .unwrap();
    for result in &results {
        assert_relative_eq!(result.score, 0.25);
    }
}

#[test]
fn adapters_are_skipped_unless_enabled() {
    let engine = QueryEngine::new(OntologyMap::default_map())
        .with_enrichment_adapter(Box::new(CorrelationStub))
        .with_score_normalization(false);
    let session = FixtureSession::new(three_gene_records());
    let (results, _) = engine
        .run_query(
            &disease_gene_graph(),
            &QueryOptions::default(),
            None,
            &session,
        )
        .unwrap();
    assert!(results.iter().all(|r| r.score == 0.0));
}

// ============================================================================
// Identifier normalization
// ============================================================================

struct StubNormalizer {
    identities: BTreeMap<String, NormalizedIdentity>,
}

impl IdentifierNormalizer for StubNormalizer {
    fn normalize(
        &self,
        curies: &[String],
    ) -> anyhow::Result<BTreeMap<String, Option<NormalizedIdentity>>> {
        Ok(curies
            .iter()
            .map(|c| (c.clone(), self.identities.get(c).cloned()))
            .collect())
    }
}

#[test]
fn unmatched_curie_resolves_through_equivalent_identifiers() {
    let normalizer = StubNormalizer {
        identities: BTreeMap::from([(
            "UMLS:C0011849".to_string(),
            NormalizedIdentity {
                canonical: "MONDO:0005148".to_string(),
                equivalents: vec!["DOID:9352".to_string()],
            },
        )]),
    };
    let engine = QueryEngine::new(OntologyMap::default_map())
        .with_identifier_normalizer(Box::new(normalizer));

    let q = graph(
        r#"{
            "nodes": {
                "n0": {"ids": ["UMLS:C0011849"], "categories": ["biolink:Disease"]},
                "n1": {"categories": ["biolink:Gene"]}
            },
            "edges": {
                "e0": {"subject": "n0", "object": "n1", "predicates": ["biolink:associated_with"]}
            }
        }"#,
    );
    let plan = engine.plan(&q, None).unwrap();
    // DOID:9352 split-formats to the backend literal
    assert!(
        plan.compiled.cypher.contains("a.identifier IN ['9352']"),
        "cypher was: {}",
        plan.compiled.cypher
    );
}

#[test]
fn knowledge_graph_identifiers_are_canonicalized() {
    let normalizer = StubNormalizer {
        identities: BTreeMap::from([(
            "DOID:1234".to_string(),
            NormalizedIdentity {
                canonical: "MONDO:0004979".to_string(),
                equivalents: vec!["DOID:1234".to_string()],
            },
        )]),
    };
    let engine = QueryEngine::new(OntologyMap::default_map())
        .with_identifier_normalizer(Box::new(normalizer));
    let session = FixtureSession::new(vec![hop_record("1234", 9000, 5468, "PON1")]);

    let (results, knowledge_graph) = engine
        .run_query(
            &disease_gene_graph(),
            &QueryOptions::default(),
            None,
            &session,
        )
        .unwrap();

    // the disease renamed to its canonical identity; the gene fell back to
    // its curie-shaped external form
    assert!(knowledge_graph.nodes.contains_key("MONDO:0004979"));
    assert!(knowledge_graph.nodes.contains_key("NCBIGene:5468"));
    assert!(!knowledge_graph.nodes.contains_key("1234"));
    let edge = &knowledge_graph.edges["9000"];
    assert_eq!(edge.subject, "MONDO:0004979");
    assert_eq!(edge.object, "NCBIGene:5468");
    assert_eq!(results[0].node_bindings["n0"], "MONDO:0004979");
    assert_eq!(results[0].node_bindings["n1"], "NCBIGene:5468");
}

// ============================================================================
// Inferred knowledge
// ============================================================================

fn inferred_graph() -> QueryGraph {
    graph(
        r#"{
            "nodes": {
                "n0": {"categories": ["biolink:Drug"]},
                "n1": {"ids": ["DOID:1234"], "categories": ["biolink:Disease"]}
            },
            "edges": {
                "e0": {
                    "subject": "n0",
                    "object": "n1",
                    "predicates": ["biolink:treats"],
                    "knowledge_type": "inferred"
                }
            }
        }"#,
    )
}

struct TemplateStub;

impl TemplateQueryHandler for TemplateStub {
    fn name(&self) -> &str {
        "drug-treats-disease"
    }

    fn supports(&self, q: &QueryGraph) -> bool {
        q.edges.len() == 1
    }

    fn run(
        &self,
        _q: &QueryGraph,
        _max_results: usize,
        _session: &dyn GraphSession,
    ) -> Result<(Vec<QueryResult>, KnowledgeGraph), QueryError> {
        let mut result = QueryResult::default();
        result.score = 42.0;
        Ok((vec![result], KnowledgeGraph::default()))
    }
}

#[test]
fn inferred_knowledge_without_handler_is_rejected() {
    let engine = QueryEngine::new(OntologyMap::default_map());
    let session = FixtureSession::new(vec![]);
    let err = engine
        .run_query(&inferred_graph(), &QueryOptions::default(), None, &session)
        .unwrap_err();
    assert!(matches!(err, QueryError::UnsupportedKnowledgeType(_)));
}

#[test]
fn inferred_knowledge_dispatches_to_template_handler() {
    let engine = QueryEngine::new(OntologyMap::default_map())
        .with_template_handler(Box::new(TemplateStub));
    let session = FixtureSession::new(vec![]);
    let (results, _) = engine
        .run_query(&inferred_graph(), &QueryOptions::default(), None, &session)
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].score, 42.0);
    // the template owned the whole query: nothing was compiled or run
    assert!(session.seen_queries().is_empty());
}

//! Reconstruction tests: raw records -> deduplicated knowledge graphs.

use std::collections::BTreeMap;

use medigraph_ontology::OntologyMap;
use medigraph_query::{
    native_edge, native_node, AliasBindings, PropertyValue, Record, Reconstructor,
    WeightProvider, ATTRIBUTE_PROPAGATED_WEIGHT,
};

fn bindings_for_hop() -> AliasBindings {
    AliasBindings {
        nodes: BTreeMap::from([
            ("a".to_string(), "n0".to_string()),
            ("c".to_string(), "n1".to_string()),
        ]),
        edges: BTreeMap::from([("b".to_string(), "e0".to_string())]),
        order: vec!["a".to_string(), "b".to_string(), "c".to_string()],
    }
}

fn hop_record(disease_id: &str, edge_id: i64, gene_id: i64) -> Record {
    let mut record = Record::new();
    record.insert(
        "a",
        native_node(
            disease_id,
            &["Disease"],
            &[
                ("name", PropertyValue::from("a disease")),
                ("description", PropertyValue::from("described")),
                ("internal_flag", PropertyValue::from("dropme")),
            ],
        ),
    );
    record.insert(
        "b",
        native_edge(
            edge_id,
            "ASSOCIATES_DaG",
            disease_id,
            gene_id,
            &[
                ("gwas", PropertyValue::from(3i64)),
                ("loader_ts", PropertyValue::from("2024-01-01")),
            ],
        ),
    );
    record.insert(
        "c",
        native_node(
            gene_id,
            &["Gene"],
            &[("name", PropertyValue::from("GENE1"))],
        ),
    );
    record
}

#[test]
fn repeated_backend_entities_reconstruct_once() {
    let ontology = OntologyMap::default_map();
    let records = vec![hop_record("100", 9000, 5468), hop_record("100", 9001, 5444)];
    let reconstruction = Reconstructor::new(&ontology)
        .reconstruct(&records, &bindings_for_hop())
        .unwrap();

    // the shared disease node exists exactly once
    assert_eq!(reconstruction.knowledge_graph.nodes.len(), 3);
    assert!(reconstruction.knowledge_graph.nodes.contains_key("100"));

    // and both results bind to that one identifier
    assert_eq!(reconstruction.results.len(), 2);
    for result in &reconstruction.results {
        assert_eq!(result.node_bindings["n0"], "100");
    }
    assert_eq!(reconstruction.results[0].node_bindings["n1"], "5468");
    assert_eq!(reconstruction.results[1].node_bindings["n1"], "5444");
}

#[test]
fn native_labels_translate_and_unknown_properties_drop() {
    let ontology = OntologyMap::default_map();
    let records = vec![hop_record("100", 9000, 5468)];
    let reconstruction = Reconstructor::new(&ontology)
        .reconstruct(&records, &bindings_for_hop())
        .unwrap();

    let disease = &reconstruction.knowledge_graph.nodes["100"];
    assert_eq!(disease.categories, vec!["biolink:Disease".to_string()]);
    assert_eq!(disease.name.as_deref(), Some("a disease"));
    // mapped property survives, unmapped property is dropped
    assert!(disease
        .attributes
        .iter()
        .any(|a| a.attribute_type_id == "biolink:description"));
    assert!(!disease
        .attributes
        .iter()
        .any(|a| a.attribute_type_id == "internal_flag"));

    let edge = &reconstruction.knowledge_graph.edges["9000"];
    assert_eq!(edge.predicate, "biolink:associated_with");
    assert_eq!(edge.subject, "100");
    assert_eq!(edge.object, "5468");
    assert!(edge
        .attributes
        .iter()
        .any(|a| a.attribute_type_id == "gwas_association"));
    assert!(!edge
        .attributes
        .iter()
        .any(|a| a.attribute_type_id == "loader_ts"));
}

#[test]
fn unknown_edge_type_defaults_to_related_to() {
    let ontology = OntologyMap::default_map();
    let mut record = Record::new();
    record.insert("a", native_node("100", &["Disease"], &[]));
    record.insert(
        "b",
        native_edge(77, "MYSTERIOUS_MdX", "100", "200", &[]),
    );
    record.insert("c", native_node("200", &["Oddity"], &[]));

    let reconstruction = Reconstructor::new(&ontology)
        .reconstruct(&[record], &bindings_for_hop())
        .unwrap();
    assert_eq!(
        reconstruction.knowledge_graph.edges["77"].predicate,
        "biolink:related_to"
    );
    // unknown label collapses to the wildcard category
    assert_eq!(
        reconstruction.knowledge_graph.nodes["200"].categories,
        vec!["biolink:NamedThing".to_string()]
    );
}

struct CannedWeights(BTreeMap<String, f64>);

impl WeightProvider for CannedWeights {
    fn propagated_weights(
        &self,
        _context: &str,
        identifiers: &[String],
    ) -> anyhow::Result<BTreeMap<String, f64>> {
        Ok(identifiers
            .iter()
            .filter_map(|id| self.0.get(id).map(|w| (id.clone(), *w)))
            .collect())
    }
}

struct BrokenWeights;

impl WeightProvider for BrokenWeights {
    fn propagated_weights(
        &self,
        _context: &str,
        _identifiers: &[String],
    ) -> anyhow::Result<BTreeMap<String, f64>> {
        anyhow::bail!("weight service is down")
    }
}

#[test]
fn weights_attach_to_every_node_when_context_is_set() {
    let ontology = OntologyMap::default_map();
    let provider = CannedWeights(BTreeMap::from([("5468".to_string(), 0.0002)]));
    let records = vec![hop_record("100", 9000, 5468)];
    let reconstruction = Reconstructor::new(&ontology)
        .with_weights(&provider, "DOID:1234")
        .reconstruct(&records, &bindings_for_hop())
        .unwrap();

    let weight_of = |id: &str| {
        reconstruction.knowledge_graph.nodes[id]
            .attributes
            .iter()
            .find(|a| a.attribute_type_id == ATTRIBUTE_PROPAGATED_WEIGHT)
            .and_then(|a| a.value.as_f64())
            .expect("weight attribute should be present")
    };
    assert_eq!(weight_of("5468"), 0.0002);
    // unknown identifiers degrade to zero, not to a missing attribute
    assert_eq!(weight_of("100"), 0.0);
}

#[test]
fn weight_service_failure_degrades_to_zero() {
    let ontology = OntologyMap::default_map();
    let records = vec![hop_record("100", 9000, 5468)];
    let reconstruction = Reconstructor::new(&ontology)
        .with_weights(&BrokenWeights, "DOID:1234")
        .reconstruct(&records, &bindings_for_hop())
        .unwrap();
    let gene = &reconstruction.knowledge_graph.nodes["5468"];
    let weight = gene
        .attributes
        .iter()
        .find(|a| a.attribute_type_id == ATTRIBUTE_PROPAGATED_WEIGHT)
        .and_then(|a| a.value.as_f64());
    assert_eq!(weight, Some(0.0));
}

#[test]
fn canonical_rename_is_globally_consistent() {
    let ontology = OntologyMap::default_map();
    let records = vec![hop_record("100", 9000, 5468)];
    let mut reconstruction = Reconstructor::new(&ontology)
        .reconstruct(&records, &bindings_for_hop())
        .unwrap();

    let rename = BTreeMap::from([
        ("100".to_string(), "DOID:100".to_string()),
        ("5468".to_string(), "NCBIGene:5468".to_string()),
    ]);
    medigraph_query::reconstruct::apply_canonical_identifiers(
        &mut reconstruction.knowledge_graph,
        &mut reconstruction.results,
        &rename,
    );

    assert!(reconstruction.knowledge_graph.nodes.contains_key("DOID:100"));
    assert!(!reconstruction.knowledge_graph.nodes.contains_key("100"));
    let edge = &reconstruction.knowledge_graph.edges["9000"];
    assert_eq!(edge.subject, "DOID:100");
    assert_eq!(edge.object, "NCBIGene:5468");
    assert_eq!(reconstruction.results[0].node_bindings["n0"], "DOID:100");
    assert_eq!(
        reconstruction.results[0].node_bindings["n1"],
        "NCBIGene:5468"
    );
}

//! Mapping-table behavior through the public API: identifier round-trips,
//! site-specific tables, and the compiled-literal injection guard.

use medigraph_ontology::{
    EntityKind, OntologyMap, CATEGORY_CHEMICAL_ENTITY, CATEGORY_DISEASE, CATEGORY_GENE,
    LABEL_COMPOUND, LABEL_DISEASE, PREDICATE_AFFECTS, PREDICATE_REGULATES,
};

// ============================================================================
// Identifier round-trips
// ============================================================================

#[test]
fn chembl_identifier_round_trips_through_split_mode() {
    let map = OntologyMap::default_map();
    let mapping = map.node_mapping(CATEGORY_CHEMICAL_ENTITY).unwrap();

    // no prefix to strip: split mode passes the identifier through intact
    let formatted = mapping.format_curie("CHEMBL1234");
    assert_eq!(formatted.backend_value, "CHEMBL1234");
    assert_eq!(formatted.literal, "'CHEMBL1234'");
    assert!(map.matches_label(LABEL_COMPOUND, &formatted.backend_value));

    // and the reported form is the same identifier
    assert_eq!(mapping.external_identifier(&formatted.backend_value), "CHEMBL1234");
}

#[test]
fn prefixed_identifier_round_trips_to_its_canonical_form() {
    let map = OntologyMap::default_map();
    let mapping = map.node_mapping(CATEGORY_DISEASE).unwrap();

    let formatted = mapping.format_curie("DOID:1234");
    assert_eq!(formatted.backend_value, "1234");
    assert!(map.matches_label(LABEL_DISEASE, &formatted.backend_value));
    assert_eq!(mapping.external_identifier(&formatted.backend_value), "DOID:1234");
}

#[test]
fn numeric_identifier_kind_emits_bare_literals() {
    let map = OntologyMap::default_map();
    let mapping = map.node_mapping(CATEGORY_GENE).unwrap();
    assert_eq!(mapping.format_curie("NCBIGene:5468").literal, "5468");
}

// ============================================================================
// Injection guard
// ============================================================================

#[test]
fn query_metacharacters_never_match_a_label() {
    let map = OntologyMap::default_map();
    for hostile in [
        "1234' OR true//",
        "1234] RETURN *",
        "1234\" DETACH DELETE n",
    ] {
        assert!(
            !map.matches_label(LABEL_DISEASE, hostile),
            "{hostile} should have been rejected"
        );
        // unknown labels fall back to the generic guard
        assert!(!map.matches_label("NoSuchLabel", hostile));
    }
}

// ============================================================================
// Predicate hierarchy
// ============================================================================

#[test]
fn predicate_descendants_expand_before_resolution() {
    let map = OntologyMap::default_map();
    let expanded =
        map.supported_descendants(&[PREDICATE_AFFECTS.to_string()], EntityKind::Edge);
    assert!(expanded.contains(PREDICATE_AFFECTS));
    assert!(expanded.contains(PREDICATE_REGULATES));
}

// ============================================================================
// Site-specific tables
// ============================================================================

const SITE_TABLE: &str = r#"{
    "nodes": {
        "ex:Assay": {
            "labels": ["Assay"],
            "curie_mode": "split_prefix",
            "identifier_kind": "text",
            "canonical_prefix": "ASSAY:"
        }
    },
    "labels": {
        "Assay": {
            "category": "ex:Assay",
            "identifier_pattern": "^[0-9]{1,6}$",
            "attributes": {"readout": "ex:assay_readout"}
        }
    },
    "predicates": {
        "ex:Assay": {
            "ex:Assay": {
                "ex:derived_from": ["DERIVED_AdA"]
            }
        }
    },
    "edge_types": {
        "DERIVED_AdA": {"predicate": "ex:derived_from"}
    }
}"#;

#[test]
fn site_specific_table_loads_and_answers_lookups() {
    let map: OntologyMap = serde_json::from_str(SITE_TABLE).unwrap();
    map.validate().unwrap();

    let mapping = map.node_mapping("ex:Assay").unwrap();
    let formatted = mapping.format_curie("ASSAY:4711");
    assert_eq!(formatted.backend_value, "4711");
    assert!(map.matches_label("Assay", "4711"));
    assert_eq!(mapping.external_identifier("4711"), "ASSAY:4711");

    assert_eq!(map.category_for_label("Assay"), "ex:Assay");
    assert_eq!(
        map.node_attribute_type(&["Assay".to_string()], "readout"),
        Some("ex:assay_readout")
    );

    let types = map
        .edge_types_for_predicates(&["ex:derived_from".to_string()], &[], &[])
        .unwrap();
    assert_eq!(types.len(), 1);
    assert!(types.contains("DERIVED_AdA"));
    assert_eq!(map.predicate_for_edge_type("DERIVED_AdA"), "ex:derived_from");
}

#[test]
fn invalid_identifier_pattern_fails_validation() {
    let broken = SITE_TABLE.replace("^[0-9]{1,6}$", "^[0-9)(");
    let map: OntologyMap = serde_json::from_str(&broken).unwrap();
    assert!(map.validate().is_err());
}

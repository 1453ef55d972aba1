//! Ontology mapping table: biolink vocabulary <-> native graph vocabulary.
//!
//! The translator-facing side of the system speaks biolink categories and
//! predicates; the backing property graph speaks its own node labels and
//! edge types. This crate owns the bidirectional mapping between the two,
//! plus the per-category identifier (curie) formatting rules that decide how
//! a caller-supplied identifier becomes a literal the backend will match.
//!
//! Everything here is configuration data: an [`OntologyMap`] is built once at
//! startup (either [`OntologyMap::default_map`] or deserialized from JSON)
//! and passed by reference into the query engine. There are no process-wide
//! registries; memoized lookups (descendant closures, compiled identifier
//! patterns) live in caches owned by the map itself.

pub mod curie;

use std::collections::{BTreeMap, BTreeSet};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use curie::{CurieMode, FormattedCurie, IdentifierKind};

// ============================================================================
// Vocabulary
// ============================================================================

pub const CATEGORY_NAMED_THING: &str = "biolink:NamedThing";
pub const CATEGORY_ANATOMICAL_ENTITY: &str = "biolink:AnatomicalEntity";
pub const CATEGORY_BIOLOGICAL_PROCESS: &str = "biolink:BiologicalProcess";
pub const CATEGORY_CELL: &str = "biolink:Cell";
pub const CATEGORY_CELLULAR_COMPONENT: &str = "biolink:CellularComponent";
pub const CATEGORY_CHEMICAL_ENTITY: &str = "biolink:ChemicalEntity";
pub const CATEGORY_DISEASE: &str = "biolink:Disease";
pub const CATEGORY_DRUG: &str = "biolink:Drug";
pub const CATEGORY_GENE: &str = "biolink:Gene";
pub const CATEGORY_MOLECULAR_ACTIVITY: &str = "biolink:MolecularActivity";
pub const CATEGORY_ORGANISM_TAXON: &str = "biolink:OrganismTaxon";
pub const CATEGORY_PATHWAY: &str = "biolink:Pathway";
pub const CATEGORY_PHENOTYPIC_FEATURE: &str = "biolink:PhenotypicFeature";
pub const CATEGORY_PROTEIN: &str = "biolink:Protein";
pub const CATEGORY_SMALL_MOLECULE: &str = "biolink:SmallMolecule";

pub const PREDICATE_RELATED_TO: &str = "biolink:related_to";
pub const PREDICATE_AFFECTS: &str = "biolink:affects";
pub const PREDICATE_ASSOCIATED_WITH: &str = "biolink:associated_with";
pub const PREDICATE_CONTRAINDICATED_FOR: &str = "biolink:contraindicated_for";
pub const PREDICATE_COEXPRESSED_WITH: &str = "biolink:coexpressed_with";
pub const PREDICATE_EXPRESSES: &str = "biolink:expresses";
pub const PREDICATE_HAS_PHENOTYPE: &str = "biolink:has_phenotype";
pub const PREDICATE_INTERACTS_WITH: &str = "biolink:interacts_with";
pub const PREDICATE_LOCATED_IN: &str = "biolink:located_in";
pub const PREDICATE_PALLIATES: &str = "biolink:palliates";
pub const PREDICATE_PARTICIPATES_IN: &str = "biolink:participates_in";
pub const PREDICATE_REGULATES: &str = "biolink:regulates";
pub const PREDICATE_RESEMBLES: &str = "biolink:resembles";
pub const PREDICATE_TREATS: &str = "biolink:treats";

pub const SLOT_MAX_RESEARCH_PHASE: &str = "biolink:max_research_phase";
pub const SLOT_HIGHEST_APPROVAL_STATUS: &str = "biolink:highest_approval_status";

pub const LABEL_ANATOMY: &str = "Anatomy";
pub const LABEL_BIOLOGICAL_PROCESS: &str = "BiologicalProcess";
pub const LABEL_CELL_TYPE: &str = "CellType";
pub const LABEL_CELLULAR_COMPONENT: &str = "CellularComponent";
pub const LABEL_COMPOUND: &str = "Compound";
pub const LABEL_DISEASE: &str = "Disease";
pub const LABEL_GENE: &str = "Gene";
pub const LABEL_MOLECULAR_FUNCTION: &str = "MolecularFunction";
pub const LABEL_ORGANISM: &str = "Organism";
pub const LABEL_PATHWAY: &str = "Pathway";
pub const LABEL_PROTEIN: &str = "Protein";
pub const LABEL_SYMPTOM: &str = "Symptom";

/// Whether a vocabulary entity names a node category or an edge predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Node,
    Edge,
}

// ============================================================================
// Mapping table entries
// ============================================================================

/// A numeric property filter a category requires on top of its label,
/// compiled as `alias.property > minimum` (strictly greater).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyFloor {
    pub property: String,
    pub minimum: f64,
}

/// How a biolink category maps onto the backend graph.
///
/// An empty `labels` list is the wildcard: the category matches any native
/// label and compiles without a label filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeMapping {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub curie_mode: CurieMode,
    #[serde(default)]
    pub identifier_kind: IdentifierKind,
    /// Prefix restored when a backend identifier is reported externally,
    /// e.g. `DOID:` for a disease stored as a bare suffix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_prefix: Option<String>,
    /// See [`PropertyFloor`]; used for approval-gated categories such as
    /// drugs, which share a label with the wider chemical space.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_floor: Option<PropertyFloor>,
}

fn default_identifier_property() -> String {
    "identifier".to_string()
}

/// Per-native-label configuration: reverse category mapping, identifier
/// property/pattern, and the attribute translation tables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelConfig {
    pub category: String,
    #[serde(default = "default_identifier_property")]
    pub identifier_property: String,
    /// Anchored pattern the backend-form identifier must match before it is
    /// inlined into a compiled query. Doubles as an injection guard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier_pattern: Option<String>,
    /// native property name -> external attribute type. Properties absent
    /// from this table are dropped during reconstruction.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// external constraint slot -> native properties it can be checked
    /// against for nodes of this label.
    #[serde(default)]
    pub constraint_properties: BTreeMap<String, Vec<String>>,
}

/// Per-native-edge-type configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EdgeTypeConfig {
    pub predicate: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub constraint_properties: BTreeMap<String, Vec<String>>,
}

/// predicate -> qualifier type -> qualifier value -> native edge types.
pub type QualifiedEdgeTypes = BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<String>>>>;

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("no native mapping for predicate(s) {0}")]
    UnsupportedPredicate(String),
    #[error(
        "predicate {0} maps to multiple native edge types; specify a subject \
         or object category to disambiguate"
    )]
    AmbiguousPredicate(String),
}

// ============================================================================
// The mapping table
// ============================================================================

/// The full bidirectional vocabulary mapping, plus identifier formatting
/// rules. Serializable so deployments can ship a site-specific table; the
/// derived caches are rebuilt lazily after deserialization.
#[derive(Debug, Serialize, Deserialize)]
pub struct OntologyMap {
    /// biolink category -> backend mapping.
    nodes: BTreeMap<String, NodeMapping>,
    /// native label -> reverse mapping + attribute tables.
    labels: BTreeMap<String, LabelConfig>,
    /// subject category -> object category -> predicate -> native edge types.
    predicates: BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<String>>>>,
    /// native edge type -> reverse mapping + attribute tables.
    edge_types: BTreeMap<String, EdgeTypeConfig>,
    /// predicate -> qualifier refinements.
    #[serde(default)]
    qualified_edge_types: QualifiedEdgeTypes,
    /// category -> direct child categories.
    #[serde(default)]
    category_children: BTreeMap<String, Vec<String>>,
    /// predicate -> direct child predicates.
    #[serde(default)]
    predicate_children: BTreeMap<String, Vec<String>>,
    /// external approval/phase enum token -> backend numeric phase.
    #[serde(default)]
    phase_enum_values: BTreeMap<String, f64>,

    /// Memoized descendant closures, keyed by entity name.
    #[serde(skip)]
    descendant_cache: DashMap<String, BTreeSet<String>>,
    /// Lazily compiled identifier patterns, keyed by label.
    #[serde(skip)]
    pattern_cache: DashMap<String, Option<regex::Regex>>,
}

impl OntologyMap {
    // ------------------------------------------------------------------
    // Node-side lookups
    // ------------------------------------------------------------------

    pub fn node_mapping(&self, category: &str) -> Option<&NodeMapping> {
        self.nodes.get(category)
    }

    pub fn label_config(&self, label: &str) -> Option<&LabelConfig> {
        self.labels.get(label)
    }

    /// Reverse lookup; unknown labels collapse to the wildcard category.
    pub fn category_for_label(&self, label: &str) -> &str {
        self.labels
            .get(label)
            .map(|cfg| cfg.category.as_str())
            .unwrap_or(CATEGORY_NAMED_THING)
    }

    pub fn label_names(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(String::as_str)
    }

    /// Identifier kind of the category a label reverse-maps to; used when a
    /// wildcard node pins a literal identifier.
    pub fn identifier_kind_for_label(&self, label: &str) -> IdentifierKind {
        let category = self.category_for_label(label);
        self.nodes
            .get(category)
            .map(|mapping| mapping.identifier_kind)
            .unwrap_or_default()
    }

    pub fn identifier_property(&self, label: &str) -> &str {
        self.labels
            .get(label)
            .map(|cfg| cfg.identifier_property.as_str())
            .unwrap_or("identifier")
    }

    /// Translate a native node property to its external attribute type,
    /// trying each of the node's labels in order.
    pub fn node_attribute_type(&self, node_labels: &[String], property: &str) -> Option<&str> {
        node_labels
            .iter()
            .filter_map(|label| self.labels.get(label))
            .find_map(|cfg| cfg.attributes.get(property))
            .map(String::as_str)
    }

    /// Native properties an external constraint slot can be checked against
    /// for the given label.
    pub fn constraint_properties(&self, label: &str, slot: &str) -> &[String] {
        self.labels
            .get(label)
            .and_then(|cfg| cfg.constraint_properties.get(slot))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn edge_constraint_properties(&self, edge_type: &str, slot: &str) -> &[String] {
        self.edge_types
            .get(edge_type)
            .and_then(|cfg| cfg.constraint_properties.get(slot))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    // ------------------------------------------------------------------
    // Edge-side lookups
    // ------------------------------------------------------------------

    /// Reverse lookup; unknown edge types collapse to `related_to`. This
    /// must never fail: an edge type seen in a result exists in the graph
    /// whether or not the table knows it.
    pub fn predicate_for_edge_type(&self, edge_type: &str) -> &str {
        self.edge_types
            .get(edge_type)
            .map(|cfg| cfg.predicate.as_str())
            .unwrap_or(PREDICATE_RELATED_TO)
    }

    pub fn edge_attribute_type(&self, edge_type: &str, property: &str) -> Option<&str> {
        self.edge_types
            .get(edge_type)
            .and_then(|cfg| cfg.attributes.get(property))
            .map(String::as_str)
    }

    /// Resolve external predicates to the set of native edge types they may
    /// match, narrowing by endpoint categories when given.
    ///
    /// An empty return set means "no type restriction" (wildcard predicate).
    /// Raises [`MappingError::AmbiguousPredicate`] when the flattened
    /// mapping is one-to-many and neither endpoint carries a category to
    /// narrow it.
    pub fn edge_types_for_predicates(
        &self,
        predicates: &[String],
        subject_categories: &[String],
        object_categories: &[String],
    ) -> Result<BTreeSet<String>, MappingError> {
        if predicates.is_empty() {
            return Ok(BTreeSet::new());
        }

        let expanded = self.supported_descendants(predicates, EntityKind::Edge);
        if expanded.is_empty() {
            return Err(MappingError::UnsupportedPredicate(predicates.join(", ")));
        }
        if expanded.contains(PREDICATE_RELATED_TO) {
            return Ok(BTreeSet::new());
        }

        let subject_space = self.category_space(subject_categories);
        let object_space = self.category_space(object_categories);

        let mut resolved = BTreeSet::new();
        for (subject, objects) in &self.predicates {
            if let Some(space) = &subject_space {
                if !self.space_covers(space, subject) {
                    continue;
                }
            }
            for (object, by_predicate) in objects {
                if let Some(space) = &object_space {
                    if !self.space_covers(space, object) {
                        continue;
                    }
                }
                for predicate in &expanded {
                    if let Some(types) = by_predicate.get(predicate) {
                        resolved.extend(types.iter().cloned());
                    }
                }
            }
        }

        if resolved.is_empty() {
            return Err(MappingError::UnsupportedPredicate(predicates.join(", ")));
        }
        if subject_space.is_none() && object_space.is_none() && resolved.len() > 1 {
            return Err(MappingError::AmbiguousPredicate(predicates.join(", ")));
        }
        Ok(resolved)
    }

    /// Narrow an edge-type set by a qualifier constraint. `None` means the
    /// qualifier type or value is unknown for every requested predicate.
    pub fn qualified_edge_types(
        &self,
        predicates: &[String],
        qualifier_type: &str,
        qualifier_value: &str,
    ) -> Option<BTreeSet<String>> {
        let expanded = self.supported_descendants(predicates, EntityKind::Edge);
        let mut refined = BTreeSet::new();
        let mut recognized = false;
        for predicate in &expanded {
            let Some(by_type) = self.qualified_edge_types.get(predicate) else {
                continue;
            };
            let Some(by_value) = by_type.get(qualifier_type) else {
                continue;
            };
            recognized = true;
            if let Some(types) = by_value.get(qualifier_value) {
                refined.extend(types.iter().cloned());
            }
        }
        if recognized {
            Some(refined)
        } else {
            None
        }
    }

    /// Qualifier pairs a native edge type implies, reverse-derived from the
    /// qualified predicate table. Used when reporting result edges.
    pub fn qualifiers_for_edge_type(&self, edge_type: &str) -> Vec<(String, String)> {
        let mut qualifiers = Vec::new();
        for by_type in self.qualified_edge_types.values() {
            for (qualifier_type, by_value) in by_type {
                for (qualifier_value, types) in by_value {
                    if types.iter().any(|t| t == edge_type) {
                        let pair = (qualifier_type.clone(), qualifier_value.clone());
                        if !qualifiers.contains(&pair) {
                            qualifiers.push(pair);
                        }
                    }
                }
            }
        }
        qualifiers
    }

    // ------------------------------------------------------------------
    // Hierarchy
    // ------------------------------------------------------------------

    /// Expand entities through the hierarchy, keeping those with a native
    /// mapping. Wildcard members short-circuit to just the wildcard.
    pub fn supported_descendants(
        &self,
        entities: &[String],
        kind: EntityKind,
    ) -> BTreeSet<String> {
        let wildcard = match kind {
            EntityKind::Node => CATEGORY_NAMED_THING,
            EntityKind::Edge => PREDICATE_RELATED_TO,
        };
        if entities.iter().any(|e| e == wildcard) {
            return BTreeSet::from([wildcard.to_string()]);
        }

        let mut supported = BTreeSet::new();
        for entity in entities {
            for descendant in self.descendants(entity, kind) {
                if self.is_mapped(&descendant, kind) {
                    supported.insert(descendant);
                }
            }
        }
        supported
    }

    fn descendants(&self, entity: &str, kind: EntityKind) -> BTreeSet<String> {
        let cache_key = match kind {
            EntityKind::Node => format!("node:{entity}"),
            EntityKind::Edge => format!("edge:{entity}"),
        };
        if let Some(hit) = self.descendant_cache.get(&cache_key) {
            return hit.clone();
        }

        let children = match kind {
            EntityKind::Node => &self.category_children,
            EntityKind::Edge => &self.predicate_children,
        };
        let mut closure = BTreeSet::from([entity.to_string()]);
        let mut frontier = vec![entity.to_string()];
        while let Some(current) = frontier.pop() {
            for child in children.get(&current).into_iter().flatten() {
                if closure.insert(child.clone()) {
                    frontier.push(child.clone());
                }
            }
        }
        self.descendant_cache.insert(cache_key, closure.clone());
        closure
    }

    fn is_mapped(&self, entity: &str, kind: EntityKind) -> bool {
        match kind {
            EntityKind::Node => self.nodes.contains_key(entity),
            EntityKind::Edge => self
                .predicates
                .values()
                .flat_map(|objects| objects.values())
                .any(|by_predicate| by_predicate.contains_key(entity)),
        }
    }

    /// Whether a predicate-table key applies to a narrowed category space.
    /// A key covers the space when the space names it directly or names one
    /// of its descendants (a table entry for a parent category applies to
    /// every category under it).
    fn space_covers(&self, space: &BTreeSet<String>, table_key: &str) -> bool {
        if space.contains(table_key) {
            return true;
        }
        self.descendants(table_key, EntityKind::Node)
            .iter()
            .any(|descendant| space.contains(descendant))
    }

    /// Expanded category space used to narrow the predicate table, or
    /// `None` when the endpoint is unconstrained.
    fn category_space(&self, categories: &[String]) -> Option<BTreeSet<String>> {
        if categories.is_empty() {
            return None;
        }
        let expanded = self.supported_descendants(categories, EntityKind::Node);
        if expanded.contains(CATEGORY_NAMED_THING) {
            return None;
        }
        Some(expanded)
    }

    // ------------------------------------------------------------------
    // Phase enums
    // ------------------------------------------------------------------

    pub fn phase_value(&self, token: &str) -> Option<f64> {
        self.phase_enum_values.get(token).copied()
    }

    // ------------------------------------------------------------------
    // Identifier patterns
    // ------------------------------------------------------------------

    /// Check a backend-form identifier against the label's anchored pattern.
    /// Labels without a pattern fall back to a conservative guard that
    /// keeps query metacharacters out of compiled literals.
    pub fn matches_label(&self, label: &str, backend_value: &str) -> bool {
        let compiled = self
            .pattern_cache
            .entry(label.to_string())
            .or_insert_with(|| {
                let pattern = self
                    .labels
                    .get(label)
                    .and_then(|cfg| cfg.identifier_pattern.as_deref())
                    .unwrap_or(curie::GENERIC_IDENTIFIER_GUARD);
                match regex::Regex::new(pattern) {
                    Ok(re) => Some(re),
                    Err(err) => {
                        tracing::warn!("invalid identifier pattern for label {label}: {err}");
                        None
                    }
                }
            });
        match compiled.value() {
            Some(re) => re.is_match(backend_value),
            None => false,
        }
    }

    /// Verify every configured identifier pattern compiles. Called after
    /// deserializing a site-specific table.
    pub fn validate(&self) -> Result<(), regex::Error> {
        for cfg in self.labels.values() {
            if let Some(pattern) = &cfg.identifier_pattern {
                regex::Regex::new(pattern)?;
            }
        }
        Ok(())
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }
}

// ============================================================================
// Default table
// ============================================================================

fn text_mapping(label: &str, prefix: Option<&str>, mode: CurieMode) -> NodeMapping {
    NodeMapping {
        labels: vec![label.to_string()],
        curie_mode: mode,
        identifier_kind: IdentifierKind::Text,
        canonical_prefix: prefix.map(str::to_string),
        required_floor: None,
    }
}

impl OntologyMap {
    /// The built-in biomedical table used by the CLI and the test suites.
    pub fn default_map() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            CATEGORY_NAMED_THING.to_string(),
            NodeMapping {
                labels: vec![],
                curie_mode: CurieMode::AsIs,
                identifier_kind: IdentifierKind::Text,
                canonical_prefix: None,
                required_floor: None,
            },
        );
        nodes.insert(
            CATEGORY_ANATOMICAL_ENTITY.to_string(),
            text_mapping(LABEL_ANATOMY, None, CurieMode::AsIs),
        );
        nodes.insert(
            CATEGORY_BIOLOGICAL_PROCESS.to_string(),
            text_mapping(LABEL_BIOLOGICAL_PROCESS, None, CurieMode::AsIs),
        );
        nodes.insert(
            CATEGORY_CELL.to_string(),
            text_mapping(LABEL_CELL_TYPE, None, CurieMode::AsIs),
        );
        nodes.insert(
            CATEGORY_CELLULAR_COMPONENT.to_string(),
            text_mapping(LABEL_CELLULAR_COMPONENT, None, CurieMode::AsIs),
        );
        nodes.insert(
            CATEGORY_CHEMICAL_ENTITY.to_string(),
            text_mapping(LABEL_COMPOUND, None, CurieMode::SplitPrefix),
        );
        nodes.insert(
            CATEGORY_SMALL_MOLECULE.to_string(),
            text_mapping(LABEL_COMPOUND, None, CurieMode::SplitPrefix),
        );
        nodes.insert(CATEGORY_DRUG.to_string(), {
            let mut mapping = text_mapping(LABEL_COMPOUND, None, CurieMode::SplitPrefix);
            mapping.required_floor = Some(PropertyFloor {
                property: "max_phase".to_string(),
                minimum: 0.0,
            });
            mapping
        });
        nodes.insert(
            CATEGORY_DISEASE.to_string(),
            text_mapping(LABEL_DISEASE, Some("DOID:"), CurieMode::SplitPrefix),
        );
        nodes.insert(
            CATEGORY_GENE.to_string(),
            NodeMapping {
                labels: vec![LABEL_GENE.to_string()],
                curie_mode: CurieMode::SplitPrefix,
                identifier_kind: IdentifierKind::Numeric,
                canonical_prefix: Some("NCBIGene:".to_string()),
                required_floor: None,
            },
        );
        nodes.insert(
            CATEGORY_MOLECULAR_ACTIVITY.to_string(),
            text_mapping(LABEL_MOLECULAR_FUNCTION, None, CurieMode::AsIs),
        );
        nodes.insert(
            CATEGORY_ORGANISM_TAXON.to_string(),
            NodeMapping {
                labels: vec![LABEL_ORGANISM.to_string()],
                curie_mode: CurieMode::SplitPrefix,
                identifier_kind: IdentifierKind::Numeric,
                canonical_prefix: Some("NCBITaxon:".to_string()),
                required_floor: None,
            },
        );
        nodes.insert(
            CATEGORY_PATHWAY.to_string(),
            text_mapping(LABEL_PATHWAY, None, CurieMode::SplitPrefix),
        );
        nodes.insert(
            CATEGORY_PHENOTYPIC_FEATURE.to_string(),
            text_mapping(LABEL_SYMPTOM, Some("MESH:"), CurieMode::SplitPrefix),
        );
        nodes.insert(
            CATEGORY_PROTEIN.to_string(),
            text_mapping(LABEL_PROTEIN, Some("UniProtKB:"), CurieMode::SplitPrefix),
        );

        let labels = default_labels();
        let predicates = default_predicates();
        let edge_types = default_edge_types();
        let qualified_edge_types = default_qualified_edge_types();

        let category_children = BTreeMap::from([
            (
                "biolink:ChemicalEntity".to_string(),
                vec![CATEGORY_SMALL_MOLECULE.to_string(), CATEGORY_DRUG.to_string()],
            ),
            (
                "biolink:DiseaseOrPhenotypicFeature".to_string(),
                vec![
                    CATEGORY_DISEASE.to_string(),
                    CATEGORY_PHENOTYPIC_FEATURE.to_string(),
                ],
            ),
            (
                "biolink:GeneOrGeneProduct".to_string(),
                vec![CATEGORY_GENE.to_string(), CATEGORY_PROTEIN.to_string()],
            ),
            (
                "biolink:BiologicalProcessOrActivity".to_string(),
                vec![
                    CATEGORY_BIOLOGICAL_PROCESS.to_string(),
                    CATEGORY_MOLECULAR_ACTIVITY.to_string(),
                ],
            ),
        ]);
        let predicate_children = BTreeMap::from([(
            PREDICATE_AFFECTS.to_string(),
            vec![PREDICATE_REGULATES.to_string()],
        )]);

        let phase_enum_values = BTreeMap::from([
            ("pre_clinical_research_phase".to_string(), 0.5),
            ("clinical_trial_phase_1".to_string(), 1.0),
            ("clinical_trial_phase_2".to_string(), 2.0),
            ("clinical_trial_phase_3".to_string(), 3.0),
            ("clinical_trial_phase_4".to_string(), 4.0),
            ("regular_approval".to_string(), 4.0),
            ("not_provided".to_string(), 0.0),
        ]);

        OntologyMap {
            nodes,
            labels,
            predicates,
            edge_types,
            qualified_edge_types,
            category_children,
            predicate_children,
            phase_enum_values,
            descendant_cache: DashMap::new(),
            pattern_cache: DashMap::new(),
        }
    }
}

fn label_config(
    category: &str,
    pattern: &str,
    attributes: &[(&str, &str)],
    constraint_properties: &[(&str, &[&str])],
) -> LabelConfig {
    LabelConfig {
        category: category.to_string(),
        identifier_property: default_identifier_property(),
        identifier_pattern: Some(pattern.to_string()),
        attributes: attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        constraint_properties: constraint_properties
            .iter()
            .map(|(slot, props)| {
                (
                    slot.to_string(),
                    props.iter().map(|p| p.to_string()).collect(),
                )
            })
            .collect(),
    }
}

fn default_labels() -> BTreeMap<String, LabelConfig> {
    let mut labels = BTreeMap::new();
    labels.insert(
        LABEL_ANATOMY.to_string(),
        label_config(
            CATEGORY_ANATOMICAL_ENTITY,
            "^UBERON:[0-9]{7}$",
            &[("description", "biolink:description"), ("mesh_id", "biolink:xref")],
            &[],
        ),
    );
    labels.insert(
        LABEL_BIOLOGICAL_PROCESS.to_string(),
        label_config(
            CATEGORY_BIOLOGICAL_PROCESS,
            "^GO:[0-9]{7}$",
            &[("description", "biolink:description")],
            &[],
        ),
    );
    labels.insert(
        LABEL_CELL_TYPE.to_string(),
        label_config(CATEGORY_CELL, "^CL:[0-9]{7}$", &[], &[]),
    );
    labels.insert(
        LABEL_CELLULAR_COMPONENT.to_string(),
        label_config(
            CATEGORY_CELLULAR_COMPONENT,
            "^GO:[0-9]{7}$",
            &[("description", "biolink:description")],
            &[],
        ),
    );
    labels.insert(
        LABEL_COMPOUND.to_string(),
        label_config(
            CATEGORY_CHEMICAL_ENTITY,
            "^CHEMBL[0-9]{1,7}$|^(DB|C|D|G)[0-9]{5}$",
            &[
                ("description", "biolink:description"),
                ("max_phase", SLOT_MAX_RESEARCH_PHASE),
                ("synonyms", "biolink:synonym"),
            ],
            &[
                (SLOT_MAX_RESEARCH_PHASE, &["max_phase"]),
                (SLOT_HIGHEST_APPROVAL_STATUS, &["max_phase"]),
            ],
        ),
    );
    labels.insert(
        LABEL_DISEASE.to_string(),
        label_config(
            CATEGORY_DISEASE,
            "^[0-9]{1,7}$",
            &[
                ("description", "biolink:description"),
                ("mesh_id", "biolink:xref"),
                ("sources", "biolink:provider"),
            ],
            &[],
        ),
    );
    labels.insert(
        LABEL_GENE.to_string(),
        label_config(
            CATEGORY_GENE,
            "^[0-9]{1,9}$",
            &[
                ("chromosome", "chromosome_location"),
                ("description", "biolink:description"),
                ("ensembl_id", "biolink:xref"),
            ],
            &[],
        ),
    );
    labels.insert(
        LABEL_MOLECULAR_FUNCTION.to_string(),
        label_config(CATEGORY_MOLECULAR_ACTIVITY, "^GO:[0-9]{7}$", &[], &[]),
    );
    labels.insert(
        LABEL_ORGANISM.to_string(),
        label_config(CATEGORY_ORGANISM_TAXON, "^[0-9]{2,7}$", &[], &[]),
    );
    labels.insert(
        LABEL_PATHWAY.to_string(),
        label_config(
            CATEGORY_PATHWAY,
            "^[A-Za-z0-9+_-]+$",
            &[("description", "biolink:description")],
            &[],
        ),
    );
    labels.insert(
        LABEL_PROTEIN.to_string(),
        label_config(
            CATEGORY_PROTEIN,
            "^[OPQ][0-9][A-Z0-9]{3}[0-9]$|^[A-NR-Z][0-9]([A-Z][A-Z0-9]{2}[0-9]){1,2}$",
            &[("description", "biolink:description")],
            &[],
        ),
    );
    labels.insert(
        LABEL_SYMPTOM.to_string(),
        label_config(
            CATEGORY_PHENOTYPIC_FEATURE,
            "^D[0-9]{5,9}$",
            &[("mesh_id", "biolink:xref")],
            &[],
        ),
    );
    labels
}

type PredicateTable = BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<String>>>>;

fn insert_predicate(
    table: &mut PredicateTable,
    subject: &str,
    object: &str,
    predicate: &str,
    edge_types: &[&str],
) {
    table
        .entry(subject.to_string())
        .or_default()
        .entry(object.to_string())
        .or_default()
        .entry(predicate.to_string())
        .or_default()
        .extend(edge_types.iter().map(|t| t.to_string()));
}

fn default_predicates() -> PredicateTable {
    let mut table = PredicateTable::new();
    insert_predicate(
        &mut table,
        CATEGORY_CHEMICAL_ENTITY,
        CATEGORY_DISEASE,
        PREDICATE_TREATS,
        &["TREATS_CtD"],
    );
    insert_predicate(
        &mut table,
        CATEGORY_CHEMICAL_ENTITY,
        CATEGORY_DISEASE,
        PREDICATE_PALLIATES,
        &["PALLIATES_CpD"],
    );
    insert_predicate(
        &mut table,
        CATEGORY_CHEMICAL_ENTITY,
        CATEGORY_DISEASE,
        PREDICATE_CONTRAINDICATED_FOR,
        &["CONTRAINDICATES_CcD"],
    );
    insert_predicate(
        &mut table,
        CATEGORY_CHEMICAL_ENTITY,
        CATEGORY_GENE,
        PREDICATE_AFFECTS,
        &["UPREGULATES_CuG", "DOWNREGULATES_CdG"],
    );
    insert_predicate(
        &mut table,
        CATEGORY_CHEMICAL_ENTITY,
        CATEGORY_PROTEIN,
        PREDICATE_INTERACTS_WITH,
        &["INTERACTS_CiP"],
    );
    insert_predicate(
        &mut table,
        CATEGORY_DISEASE,
        CATEGORY_GENE,
        PREDICATE_ASSOCIATED_WITH,
        &["ASSOCIATES_DaG"],
    );
    insert_predicate(
        &mut table,
        CATEGORY_DISEASE,
        CATEGORY_GENE,
        PREDICATE_AFFECTS,
        &["UPREGULATES_DuG", "DOWNREGULATES_DdG"],
    );
    insert_predicate(
        &mut table,
        CATEGORY_DISEASE,
        CATEGORY_ANATOMICAL_ENTITY,
        PREDICATE_LOCATED_IN,
        &["LOCALIZES_DlA"],
    );
    insert_predicate(
        &mut table,
        CATEGORY_DISEASE,
        CATEGORY_PHENOTYPIC_FEATURE,
        PREDICATE_HAS_PHENOTYPE,
        &["PRESENTS_DpS"],
    );
    insert_predicate(
        &mut table,
        CATEGORY_DISEASE,
        CATEGORY_DISEASE,
        PREDICATE_RESEMBLES,
        &["RESEMBLES_DrD"],
    );
    insert_predicate(
        &mut table,
        CATEGORY_ANATOMICAL_ENTITY,
        CATEGORY_GENE,
        PREDICATE_EXPRESSES,
        &["EXPRESSES_AeG"],
    );
    insert_predicate(
        &mut table,
        CATEGORY_GENE,
        CATEGORY_GENE,
        PREDICATE_INTERACTS_WITH,
        &["INTERACTS_GiG"],
    );
    insert_predicate(
        &mut table,
        CATEGORY_GENE,
        CATEGORY_GENE,
        PREDICATE_COEXPRESSED_WITH,
        &["COVARIES_GcG"],
    );
    insert_predicate(
        &mut table,
        CATEGORY_GENE,
        CATEGORY_GENE,
        PREDICATE_REGULATES,
        &["REGULATES_GrG"],
    );
    insert_predicate(
        &mut table,
        CATEGORY_GENE,
        CATEGORY_PATHWAY,
        PREDICATE_PARTICIPATES_IN,
        &["PARTICIPATES_GpPW"],
    );
    insert_predicate(
        &mut table,
        CATEGORY_GENE,
        CATEGORY_BIOLOGICAL_PROCESS,
        PREDICATE_PARTICIPATES_IN,
        &["PARTICIPATES_GpBP"],
    );
    insert_predicate(
        &mut table,
        CATEGORY_GENE,
        CATEGORY_MOLECULAR_ACTIVITY,
        PREDICATE_PARTICIPATES_IN,
        &["PARTICIPATES_GpMF"],
    );
    insert_predicate(
        &mut table,
        CATEGORY_GENE,
        CATEGORY_CELLULAR_COMPONENT,
        PREDICATE_PARTICIPATES_IN,
        &["PARTICIPATES_GpCC"],
    );
    insert_predicate(
        &mut table,
        CATEGORY_PROTEIN,
        CATEGORY_PROTEIN,
        PREDICATE_INTERACTS_WITH,
        &["INTERACTS_PiP"],
    );
    table
}

fn edge_type_config(predicate: &str, attributes: &[(&str, &str)]) -> EdgeTypeConfig {
    EdgeTypeConfig {
        predicate: predicate.to_string(),
        attributes: attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        constraint_properties: BTreeMap::new(),
    }
}

fn default_edge_types() -> BTreeMap<String, EdgeTypeConfig> {
    let mut types = BTreeMap::new();
    types.insert(
        "TREATS_CtD".to_string(),
        edge_type_config(
            PREDICATE_TREATS,
            &[("phase", SLOT_MAX_RESEARCH_PHASE), ("sources", "biolink:provider")],
        ),
    );
    types.insert(
        "PALLIATES_CpD".to_string(),
        edge_type_config(PREDICATE_PALLIATES, &[("sources", "biolink:provider")]),
    );
    types.insert(
        "CONTRAINDICATES_CcD".to_string(),
        edge_type_config(PREDICATE_CONTRAINDICATED_FOR, &[]),
    );
    types.insert(
        "UPREGULATES_CuG".to_string(),
        edge_type_config(PREDICATE_AFFECTS, &[("zscore", "expression_zscore")]),
    );
    types.insert(
        "DOWNREGULATES_CdG".to_string(),
        edge_type_config(PREDICATE_AFFECTS, &[("zscore", "expression_zscore")]),
    );
    types.insert(
        "UPREGULATES_DuG".to_string(),
        edge_type_config(PREDICATE_AFFECTS, &[]),
    );
    types.insert(
        "DOWNREGULATES_DdG".to_string(),
        edge_type_config(PREDICATE_AFFECTS, &[]),
    );
    types.insert(
        "INTERACTS_CiP".to_string(),
        edge_type_config(PREDICATE_INTERACTS_WITH, &[("affinity_nm", "binding_affinity")]),
    );
    types.insert(
        "ASSOCIATES_DaG".to_string(),
        edge_type_config(
            PREDICATE_ASSOCIATED_WITH,
            &[("gwas", "gwas_association"), ("sources", "biolink:provider")],
        ),
    );
    types.insert(
        "LOCALIZES_DlA".to_string(),
        edge_type_config(PREDICATE_LOCATED_IN, &[("cooccur", "cooccurrence_count")]),
    );
    types.insert(
        "PRESENTS_DpS".to_string(),
        edge_type_config(PREDICATE_HAS_PHENOTYPE, &[("cooccur", "cooccurrence_count")]),
    );
    types.insert(
        "RESEMBLES_DrD".to_string(),
        edge_type_config(PREDICATE_RESEMBLES, &[]),
    );
    types.insert(
        "EXPRESSES_AeG".to_string(),
        edge_type_config(PREDICATE_EXPRESSES, &[("expression_rank", "expression_rank")]),
    );
    types.insert(
        "INTERACTS_GiG".to_string(),
        edge_type_config(PREDICATE_INTERACTS_WITH, &[("zscore", "interaction_zscore")]),
    );
    types.insert(
        "COVARIES_GcG".to_string(),
        edge_type_config(PREDICATE_COEXPRESSED_WITH, &[("correlation", "expr_correlation_spearman")]),
    );
    types.insert(
        "REGULATES_GrG".to_string(),
        edge_type_config(PREDICATE_REGULATES, &[]),
    );
    types.insert(
        "PARTICIPATES_GpPW".to_string(),
        edge_type_config(PREDICATE_PARTICIPATES_IN, &[]),
    );
    types.insert(
        "PARTICIPATES_GpBP".to_string(),
        edge_type_config(PREDICATE_PARTICIPATES_IN, &[]),
    );
    types.insert(
        "PARTICIPATES_GpMF".to_string(),
        edge_type_config(PREDICATE_PARTICIPATES_IN, &[]),
    );
    types.insert(
        "PARTICIPATES_GpCC".to_string(),
        edge_type_config(PREDICATE_PARTICIPATES_IN, &[]),
    );
    types.insert(
        "INTERACTS_PiP".to_string(),
        edge_type_config(PREDICATE_INTERACTS_WITH, &[]),
    );
    types
}

fn default_qualified_edge_types() -> QualifiedEdgeTypes {
    let mut qualified = QualifiedEdgeTypes::new();
    let mut by_value = BTreeMap::new();
    by_value.insert(
        "increased".to_string(),
        vec!["UPREGULATES_CuG".to_string(), "UPREGULATES_DuG".to_string()],
    );
    by_value.insert(
        "decreased".to_string(),
        vec!["DOWNREGULATES_CdG".to_string(), "DOWNREGULATES_DdG".to_string()],
    );
    let mut by_type = BTreeMap::new();
    by_type.insert("biolink:object_direction_qualifier".to_string(), by_value);
    qualified.insert(PREDICATE_AFFECTS.to_string(), by_type);
    qualified
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_category_maps_to_no_labels() {
        let map = OntologyMap::default_map();
        let mapping = map.node_mapping(CATEGORY_NAMED_THING).unwrap();
        assert!(mapping.labels.is_empty());
    }

    #[test]
    fn descendants_expand_through_hierarchy() {
        let map = OntologyMap::default_map();
        let expanded = map.supported_descendants(
            &["biolink:ChemicalEntity".to_string()],
            EntityKind::Node,
        );
        assert!(expanded.contains(CATEGORY_CHEMICAL_ENTITY));
        assert!(expanded.contains(CATEGORY_SMALL_MOLECULE));
        assert!(expanded.contains(CATEGORY_DRUG));
    }

    #[test]
    fn wildcard_shortcircuits_descendants() {
        let map = OntologyMap::default_map();
        let expanded = map.supported_descendants(
            &[CATEGORY_NAMED_THING.to_string(), CATEGORY_GENE.to_string()],
            EntityKind::Node,
        );
        assert_eq!(expanded.len(), 1);
        assert!(expanded.contains(CATEGORY_NAMED_THING));
    }

    #[test]
    fn predicate_resolution_narrows_by_categories() {
        let map = OntologyMap::default_map();
        let types = map
            .edge_types_for_predicates(
                &[PREDICATE_INTERACTS_WITH.to_string()],
                &[CATEGORY_GENE.to_string()],
                &[],
            )
            .unwrap();
        assert_eq!(types, BTreeSet::from(["INTERACTS_GiG".to_string()]));
    }

    #[test]
    fn predicate_table_entries_cover_descendant_categories() {
        let map = OntologyMap::default_map();
        let types = map
            .edge_types_for_predicates(
                &[PREDICATE_TREATS.to_string()],
                &[CATEGORY_DRUG.to_string()],
                &[CATEGORY_DISEASE.to_string()],
            )
            .unwrap();
        assert_eq!(types, BTreeSet::from(["TREATS_CtD".to_string()]));
    }

    #[test]
    fn unconstrained_one_to_many_predicate_is_ambiguous() {
        let map = OntologyMap::default_map();
        let err = map
            .edge_types_for_predicates(&[PREDICATE_INTERACTS_WITH.to_string()], &[], &[])
            .unwrap_err();
        assert!(matches!(err, MappingError::AmbiguousPredicate(_)));
    }

    #[test]
    fn related_to_is_a_wildcard_predicate() {
        let map = OntologyMap::default_map();
        let types = map
            .edge_types_for_predicates(&[PREDICATE_RELATED_TO.to_string()], &[], &[])
            .unwrap();
        assert!(types.is_empty());
    }

    #[test]
    fn unknown_predicate_is_unsupported() {
        let map = OntologyMap::default_map();
        let err = map
            .edge_types_for_predicates(&["biolink:caused_by".to_string()], &[], &[])
            .unwrap_err();
        assert!(matches!(err, MappingError::UnsupportedPredicate(_)));
    }

    #[test]
    fn qualifier_refines_edge_types() {
        let map = OntologyMap::default_map();
        let refined = map
            .qualified_edge_types(
                &[PREDICATE_AFFECTS.to_string()],
                "biolink:object_direction_qualifier",
                "increased",
            )
            .unwrap();
        assert!(refined.contains("UPREGULATES_CuG"));
        assert!(!refined.contains("DOWNREGULATES_CdG"));
    }

    #[test]
    fn unknown_qualifier_type_is_unrecognized() {
        let map = OntologyMap::default_map();
        assert!(map
            .qualified_edge_types(
                &[PREDICATE_AFFECTS.to_string()],
                "biolink:species_context_qualifier",
                "human",
            )
            .is_none());
    }

    #[test]
    fn unknown_edge_type_falls_back_to_related_to() {
        let map = OntologyMap::default_map();
        assert_eq!(
            map.predicate_for_edge_type("CONTAINS_FcCM"),
            PREDICATE_RELATED_TO
        );
    }

    #[test]
    fn table_round_trips_through_json() {
        let map = OntologyMap::default_map();
        let json = serde_json::to_string(&map).unwrap();
        let restored: OntologyMap = serde_json::from_str(&json).unwrap();
        restored.validate().unwrap();
        assert_eq!(
            restored.category_for_label(LABEL_DISEASE),
            CATEGORY_DISEASE
        );
        assert!(restored.matches_label(LABEL_GENE, "5468"));
    }
}

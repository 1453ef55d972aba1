//! Attribute-constraint validation and compilation.
//!
//! Constraints are validated during resolution (so bad ones fail before any
//! backend round-trip) and compiled into WHERE fragments alongside the rest
//! of the query. Special constraint values (approval/phase enums that the
//! backend stores numerically) are rewritten by handlers registered in an
//! explicit [`ConstraintHandlers`] map built at startup and injected,
//! rather than collected through import-time side effects.

use std::collections::{BTreeMap, BTreeSet};

use medigraph_ontology::{OntologyMap, SLOT_HIGHEST_APPROVAL_STATUS, SLOT_MAX_RESEARCH_PHASE};

use crate::error::QueryError;
use crate::model::{
    format_number, AttributeConstraint, ConstraintOperator, PropertyValue,
};

/// External slots constraints may target. Everything else is rejected at
/// validation time.
pub const SUPPORTED_CONSTRAINT_SLOTS: &[&str] =
    &[SLOT_HIGHEST_APPROVAL_STATUS, SLOT_MAX_RESEARCH_PHASE];

pub type ConstraintValueTransform =
    fn(&OntologyMap, &PropertyValue) -> Result<PropertyValue, QueryError>;

/// slot -> value rewrite. Slots without a handler pass values through.
pub struct ConstraintHandlers {
    transforms: BTreeMap<String, ConstraintValueTransform>,
}

impl ConstraintHandlers {
    pub fn new() -> Self {
        ConstraintHandlers {
            transforms: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, slot: impl Into<String>, transform: ConstraintValueTransform) {
        self.transforms.insert(slot.into(), transform);
    }

    /// Handlers for the built-in table: both approval/phase slots rewrite
    /// their enum tokens to the backend's numeric phase.
    pub fn default_handlers() -> Self {
        let mut handlers = ConstraintHandlers::new();
        handlers.register(SLOT_MAX_RESEARCH_PHASE, phase_enum_transform);
        handlers.register(SLOT_HIGHEST_APPROVAL_STATUS, phase_enum_transform);
        handlers
    }

    fn transform(
        &self,
        ontology: &OntologyMap,
        slot: &str,
        value: &PropertyValue,
    ) -> Result<PropertyValue, QueryError> {
        match self.transforms.get(slot) {
            Some(transform) => transform(ontology, value),
            None => Ok(value.clone()),
        }
    }
}

impl Default for ConstraintHandlers {
    fn default() -> Self {
        ConstraintHandlers::default_handlers()
    }
}

fn phase_enum_transform(
    ontology: &OntologyMap,
    value: &PropertyValue,
) -> Result<PropertyValue, QueryError> {
    let token = value.as_text().ok_or_else(|| {
        QueryError::UnsupportedConstraint(
            "approval/phase constraint values must be enum strings".to_string(),
        )
    })?;
    ontology
        .phase_value(token)
        .map(PropertyValue::Float)
        .ok_or_else(|| {
            QueryError::UnsupportedConstraint(format!(
                "cannot handle \"{token}\" as an approval/phase value"
            ))
        })
}

// ============================================================================
// Validation
// ============================================================================

fn validate_common(constraint: &AttributeConstraint) -> Result<(), QueryError> {
    if constraint.unit_id.is_some() || constraint.unit_name.is_some() {
        return Err(QueryError::UnsupportedConstraint(
            "constraints with units are not supported".to_string(),
        ));
    }
    if !SUPPORTED_CONSTRAINT_SLOTS.contains(&constraint.id.as_str()) {
        return Err(QueryError::UnsupportedConstraint(format!(
            "constraints on {} are not supported",
            constraint.id
        )));
    }
    Ok(())
}

/// A constraint on a labeled node must be answerable by at least one of the
/// node's labels; wildcard nodes pass (the property check happens per
/// matched label at reconstruction time anyway).
pub fn validate_node_constraint(
    ontology: &OntologyMap,
    labels: &[String],
    constraint: &AttributeConstraint,
) -> Result<(), QueryError> {
    validate_common(constraint)?;
    if labels.is_empty() {
        return Ok(());
    }
    let mut inspected = Vec::new();
    for label in labels {
        if !ontology.constraint_properties(label, &constraint.id).is_empty() {
            return Ok(());
        }
        inspected.push(ontology.category_for_label(label).to_string());
    }
    Err(QueryError::UnsupportedConstraint(format!(
        "constraints on {} are not supported for node categories [{}]",
        constraint.id,
        inspected.join(", ")
    )))
}

pub fn validate_edge_constraint(
    ontology: &OntologyMap,
    edge_types: &BTreeSet<String>,
    constraint: &AttributeConstraint,
) -> Result<(), QueryError> {
    validate_common(constraint)?;
    if edge_types.is_empty() {
        return Ok(());
    }
    for edge_type in edge_types {
        if !ontology
            .edge_constraint_properties(edge_type, &constraint.id)
            .is_empty()
        {
            return Ok(());
        }
    }
    Err(QueryError::UnsupportedConstraint(format!(
        "constraints on {} are not supported for edge types [{}]",
        constraint.id,
        edge_types.iter().cloned().collect::<Vec<_>>().join(", ")
    )))
}

// ============================================================================
// Compilation
// ============================================================================

pub fn node_constraint_clause(
    ontology: &OntologyMap,
    handlers: &ConstraintHandlers,
    alias: &str,
    labels: &[String],
    constraint: &AttributeConstraint,
) -> Result<Option<String>, QueryError> {
    let mut properties: Vec<&str> = Vec::new();
    for label in labels {
        for property in ontology.constraint_properties(label, &constraint.id) {
            if !properties.contains(&property.as_str()) {
                properties.push(property);
            }
        }
    }
    if properties.is_empty() {
        return Ok(None);
    }
    build_clause(ontology, handlers, alias, &properties, constraint).map(Some)
}

pub fn edge_constraint_clause(
    ontology: &OntologyMap,
    handlers: &ConstraintHandlers,
    alias: &str,
    edge_types: &BTreeSet<String>,
    constraint: &AttributeConstraint,
) -> Result<Option<String>, QueryError> {
    let mut properties: Vec<&str> = Vec::new();
    for edge_type in edge_types {
        for property in ontology.edge_constraint_properties(edge_type, &constraint.id) {
            if !properties.contains(&property.as_str()) {
                properties.push(property);
            }
        }
    }
    if properties.is_empty() {
        return Ok(None);
    }
    build_clause(ontology, handlers, alias, &properties, constraint).map(Some)
}

/// Map the external operator (plus optional negation) to the backend's
/// comparison operator. Regex matches reject negation: the complement of a
/// pattern cannot be expressed reliably.
fn cypher_operator(constraint: &AttributeConstraint) -> Result<&'static str, QueryError> {
    if constraint.negated {
        return match constraint.operator {
            ConstraintOperator::Matches => Err(QueryError::UnsupportedConstraint(
                "a regular-expression match cannot be reliably inverted".to_string(),
            )),
            ConstraintOperator::Equal => Ok("<>"),
            ConstraintOperator::GreaterThan => Ok("<="),
            ConstraintOperator::LessThan => Ok(">="),
        };
    }
    Ok(match constraint.operator {
        ConstraintOperator::Equal => "=",
        ConstraintOperator::Matches => "=~",
        ConstraintOperator::GreaterThan => ">",
        ConstraintOperator::LessThan => "<",
    })
}

fn build_clause(
    ontology: &OntologyMap,
    handlers: &ConstraintHandlers,
    alias: &str,
    properties: &[&str],
    constraint: &AttributeConstraint,
) -> Result<String, QueryError> {
    let operator = cypher_operator(constraint)?;
    let values: Vec<PropertyValue> = constraint
        .value
        .values()
        .iter()
        .map(|v| handlers.transform(ontology, &constraint.id, v))
        .collect::<Result<_, _>>()?;
    if values.is_empty() {
        return Err(QueryError::UnsupportedConstraint(format!(
            "constraint on {} has no values",
            constraint.id
        )));
    }

    let mut fragments = Vec::new();
    for property in properties {
        let lhs = format!("{alias}.{property}");
        let fragment = match operator {
            ">" | ">=" => format!("({lhs} {operator} {})", numeric_bound(&values, true, constraint)?),
            "<" | "<=" => format!("({lhs} {operator} {})", numeric_bound(&values, false, constraint)?),
            "=~" => {
                let pattern = regex_pattern(&values, constraint)?;
                format!("({lhs} =~ '{pattern}')")
            }
            "=" => format!("({lhs} IN [{}])", literal_list(&values)),
            "<>" => format!("(NOT {lhs} IN [{}])", literal_list(&values)),
            _ => unreachable!("operator set is closed"),
        };
        fragments.push(fragment);
    }

    Ok(if fragments.len() == 1 {
        fragments.remove(0)
    } else {
        format!("({})", fragments.join(" OR "))
    })
}

/// Collapse a value list to a single bound: the max for lower-bound
/// comparisons, the min for upper-bound ones.
fn numeric_bound(
    values: &[PropertyValue],
    take_max: bool,
    constraint: &AttributeConstraint,
) -> Result<String, QueryError> {
    let mut bound: Option<f64> = None;
    for value in values {
        let number = value.as_f64().ok_or_else(|| {
            QueryError::UnsupportedConstraint(format!(
                "numeric comparison on {} requires numeric values",
                constraint.id
            ))
        })?;
        bound = Some(match bound {
            None => number,
            Some(current) if take_max => current.max(number),
            Some(current) => current.min(number),
        });
    }
    // values is non-empty, checked by the caller
    Ok(format_number(bound.unwrap_or_default()))
}

fn regex_pattern(
    values: &[PropertyValue],
    constraint: &AttributeConstraint,
) -> Result<String, QueryError> {
    let mut parts = Vec::new();
    for value in values {
        let text = value.as_text().ok_or_else(|| {
            QueryError::UnsupportedConstraint(format!(
                "match constraints on {} require string values",
                constraint.id
            ))
        })?;
        parts.push(text.to_string());
    }
    Ok(parts.join("|"))
}

/// Render a membership list: text quoted, numbers bare.
fn literal_list(values: &[PropertyValue]) -> String {
    values
        .iter()
        .map(PropertyValue::render_literal)
        .collect::<Vec<_>>()
        .join(", ")
}

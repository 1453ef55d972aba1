//! Curie formatting: caller-supplied identifiers -> backend-form literals.
//!
//! Each category declares how its identifiers are stored in the backend:
//! whether the curie prefix is stripped ([`CurieMode`]) and whether the
//! stored value is text or numeric ([`IdentifierKind`], which decides
//! quoting in compiled literals). The reverse direction restores a
//! canonical prefix when backend identifiers are reported externally.

use serde::{Deserialize, Serialize};

use crate::NodeMapping;

/// Fallback pattern for labels without a configured identifier pattern.
/// Deliberately excludes quotes, whitespace, and brackets so unvetted
/// values cannot smuggle query syntax into a compiled literal.
pub const GENERIC_IDENTIFIER_GUARD: &str = "^[A-Za-z0-9][A-Za-z0-9:._+-]*$";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CurieMode {
    /// Stored exactly as supplied, prefix included (e.g. `GO:0140206`).
    #[default]
    AsIs,
    /// Stored without the leading `PREFIX:`; embedded colons past the first
    /// are kept (e.g. `DOID:1234` -> `1234`).
    SplitPrefix,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    /// Quoted in compiled literals.
    #[default]
    Text,
    /// Bare in compiled literals (the backend stores an integer).
    Numeric,
}

/// A curie formatted for the backend: the stored value and the ready-to-use
/// query literal (quoted or bare per [`IdentifierKind`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedCurie {
    pub backend_value: String,
    pub literal: String,
}

/// The portion of a curie after the first colon, or the whole curie when no
/// prefix is present.
pub fn split_suffix(curie: &str) -> &str {
    match curie.split_once(':') {
        Some((_, rest)) if !rest.is_empty() => rest,
        _ => curie,
    }
}

impl NodeMapping {
    /// Format a caller-supplied curie for this category.
    pub fn format_curie(&self, curie: &str) -> FormattedCurie {
        let backend_value = match self.curie_mode {
            CurieMode::AsIs => curie.to_string(),
            CurieMode::SplitPrefix => split_suffix(curie).to_string(),
        };
        let literal = render_literal(self.identifier_kind, &backend_value);
        FormattedCurie {
            backend_value,
            literal,
        }
    }

    /// Restore the canonical external form of a backend identifier.
    pub fn external_identifier(&self, backend_value: &str) -> String {
        match &self.canonical_prefix {
            Some(prefix) if !backend_value.starts_with(prefix.as_str()) => {
                format!("{prefix}{backend_value}")
            }
            _ => backend_value.to_string(),
        }
    }
}

/// Render a backend value as a query literal. Numeric identifiers are bare
/// only when they actually look numeric; anything else stays quoted.
pub fn render_literal(kind: IdentifierKind, backend_value: &str) -> String {
    match kind {
        IdentifierKind::Numeric
            if !backend_value.is_empty()
                && backend_value.bytes().all(|b| b.is_ascii_digit()) =>
        {
            backend_value.to_string()
        }
        _ => format!("'{backend_value}'"),
    }
}

//! The graph-session seam: how compiled queries reach a backend store.
//!
//! The engine only ever sees this trait; the production implementation
//! (a bolt/neo4j driver session) lives with the service glue, while tests
//! and the CLI demo use [`FixtureSession`].

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::model::PropertyValue;

pub type Params = BTreeMap<String, PropertyValue>;

/// A node as returned by the backend: its identifier property, native
/// label set, and remaining properties.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeNode {
    pub identifier: PropertyValue,
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, PropertyValue>,
}

/// A relationship as returned by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeEdge {
    pub identifier: i64,
    pub edge_type: String,
    pub subject_identifier: PropertyValue,
    pub object_identifier: PropertyValue,
    pub properties: BTreeMap<String, PropertyValue>,
}

/// A matched value under one alias. Reconstruction matches exhaustively on
/// this; there is no runtime type sniffing.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeEntity {
    Node(NativeNode),
    Edge(NativeEdge),
}

/// One traversal record: alias -> matched entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: BTreeMap<String, NativeEntity>,
}

impl Record {
    pub fn new() -> Self {
        Record::default()
    }

    pub fn insert(&mut self, alias: impl Into<String>, entity: NativeEntity) {
        self.entries.insert(alias.into(), entity);
    }

    pub fn get(&self, alias: &str) -> Option<&NativeEntity> {
        self.entries.get(alias)
    }
}

/// A live connection to the backing property graph.
pub trait GraphSession {
    fn run(&self, query: &str, params: &Params) -> anyhow::Result<Vec<Record>>;
}

// ============================================================================
// Fixture session
// ============================================================================

/// Session returning canned records, recording every query it was asked to
/// run. Used by the test suites and the CLI demo.
#[derive(Default)]
pub struct FixtureSession {
    records: Vec<Record>,
    queries: Mutex<Vec<String>>,
}

impl FixtureSession {
    pub fn new(records: Vec<Record>) -> Self {
        FixtureSession {
            records,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Queries observed so far, in order.
    pub fn seen_queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

impl GraphSession for FixtureSession {
    fn run(&self, query: &str, _params: &Params) -> anyhow::Result<Vec<Record>> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.to_string());
        }
        Ok(self.records.clone())
    }
}

/// Session that always fails, for exercising backend-error propagation.
pub struct FailingSession(pub String);

impl GraphSession for FailingSession {
    fn run(&self, _query: &str, _params: &Params) -> anyhow::Result<Vec<Record>> {
        Err(anyhow::anyhow!("{}", self.0))
    }
}

// ============================================================================
// Record construction helpers
// ============================================================================

/// Build a [`NativeNode`] from literal parts; convenient in fixtures.
pub fn native_node(
    identifier: impl Into<PropertyValue>,
    labels: &[&str],
    properties: &[(&str, PropertyValue)],
) -> NativeEntity {
    NativeEntity::Node(NativeNode {
        identifier: identifier.into(),
        labels: labels.iter().map(|l| l.to_string()).collect(),
        properties: properties
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    })
}

/// Build a [`NativeEdge`] from literal parts; convenient in fixtures.
pub fn native_edge(
    identifier: i64,
    edge_type: &str,
    subject_identifier: impl Into<PropertyValue>,
    object_identifier: impl Into<PropertyValue>,
    properties: &[(&str, PropertyValue)],
) -> NativeEntity {
    NativeEntity::Edge(NativeEdge {
        identifier,
        edge_type: edge_type.to_string(),
        subject_identifier: subject_identifier.into(),
        object_identifier: object_identifier.into(),
        properties: properties
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    })
}

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::{EntityId, EntityRef};

/// Relationship edge kinds. `inherits`, `implements` and `uses-trait` are
/// emitted while sealing the model; the rest come from the Relationship
/// Detector and the Flow Analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    Inherits,
    Implements,
    UsesTrait,
    Imports,
    Composes,
    Aggregates,
    Associates,
    Calls,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inherits => "inherits",
            Self::Implements => "implements",
            Self::UsesTrait => "uses-trait",
            Self::Imports => "imports",
            Self::Composes => "composes",
            Self::Aggregates => "aggregates",
            Self::Associates => "associates",
            Self::Calls => "calls",
        }
    }

    /// Kinds the Relationship Detector may be configured to compute.
    pub fn detector_owned(&self) -> bool {
        matches!(
            self,
            Self::Imports | Self::Composes | Self::Aggregates | Self::Associates
        )
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    Many,
}

/// Where an edge was first inferred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: EntityId,
    pub target: EntityRef,
    pub kind: EdgeKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cardinality: Option<Cardinality>,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub optional: bool,
    pub provenance: Provenance,
}

/// Flat edge table. Entities never hold outgoing reference collections;
/// cycles live here without cross-pointers between entity records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipGraph {
    edges: Vec<Edge>,
}

impl RelationshipGraph {
    pub fn push(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub(crate) fn edges_mut(&mut self) -> &mut [Edge] {
        &mut self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    pub fn outgoing<'a>(&'a self, source: &'a EntityId) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| &e.source == source)
    }

    /// Whether any edge of `kind` already links the pair. Rules fire at most
    /// once per (source, target) pair.
    pub fn has(&self, source: &EntityId, target: &EntityRef, kind: EdgeKind) -> bool {
        self.edges
            .iter()
            .any(|e| e.kind == kind && &e.source == source && &e.target == target)
    }

    /// Whether any relationship of the listed kinds links the pair.
    pub fn has_any(&self, source: &EntityId, target: &EntityRef, kinds: &[EdgeKind]) -> bool {
        self.edges
            .iter()
            .any(|e| kinds.contains(&e.kind) && &e.source == source && &e.target == target)
    }
}

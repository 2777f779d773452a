use std::collections::BTreeMap;

use serde::Serialize;

use crate::diagnostics::{Diagnostic, Summary};
use crate::error::Result;
use crate::model::{Edge, EdgeKind, EntityId, EntityKind, FlowEntry, SemanticModel, Terminal};

/// The outcome of one analysis run: the sealed model, accumulated
/// diagnostics, run counters, and the completeness flag (false only when a
/// cancellation fired mid-run).
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub model: SemanticModel,
    pub diagnostics: Vec<Diagnostic>,
    pub summary: Summary,
    pub complete: bool,
}

impl AnalysisResult {
    /// Identifiers of one entity kind, in stable order.
    pub fn ids_of(&self, kind: EntityKind) -> Vec<&EntityId> {
        match kind {
            EntityKind::Module => self.model.modules.keys().collect(),
            EntityKind::Type => self.model.types.keys().collect(),
            EntityKind::Routine => self.model.routines.keys().collect(),
            EntityKind::Attribute => self.model.attributes.keys().collect(),
        }
    }

    pub fn edges_of(&self, kind: EdgeKind) -> impl Iterator<Item = &Edge> {
        self.model.relationships.of_kind(kind)
    }

    pub fn flows(&self) -> &[FlowEntry] {
        &self.model.flows
    }

    /// Serialise the result as the structured document consumed by
    /// downstream renderers: one section per entity kind, a flat
    /// relationship list, and flows grouped by entry routine. Ordered maps
    /// and stable sorts make the output byte-identical across runs.
    pub fn to_json(&self) -> Result<String> {
        let document = Document {
            modules: &self.model.modules,
            types: &self.model.types,
            routines: &self.model.routines,
            attributes: &self.model.attributes,
            relationships: self.model.relationships.edges(),
            flows: FlowsSection {
                entries: &self.model.flows,
            },
            diagnostics: &self.diagnostics,
            summary: &self.summary,
            complete: self.complete,
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }
}

#[derive(Serialize)]
struct Document<'a> {
    modules: &'a BTreeMap<EntityId, crate::model::ModuleEntity>,
    types: &'a BTreeMap<EntityId, crate::model::TypeDecl>,
    routines: &'a BTreeMap<EntityId, crate::model::Routine>,
    attributes: &'a BTreeMap<EntityId, crate::model::Attribute>,
    relationships: &'a [Edge],
    flows: FlowsSection<'a>,
    diagnostics: &'a [Diagnostic],
    summary: &'a Summary,
    complete: bool,
}

#[derive(Serialize)]
struct FlowsSection<'a> {
    entries: &'a [FlowEntry],
}

/// Counts per entity kind, edge kind, and terminal marker.
pub(crate) fn summarize(model: &SemanticModel, files_parsed: usize, files_failed: usize) -> Summary {
    let mut summary = Summary {
        files_parsed,
        files_failed,
        ..Summary::default()
    };
    summary
        .entities
        .insert("modules".to_string(), model.modules.len());
    summary.entities.insert("types".to_string(), model.types.len());
    summary
        .entities
        .insert("routines".to_string(), model.routines.len());
    summary
        .entities
        .insert("attributes".to_string(), model.attributes.len());

    for edge in model.relationships.edges() {
        *summary.edges.entry(edge.kind.as_str().to_string()).or_insert(0) += 1;
    }
    for marker in [
        Terminal::DepthLimit,
        Terminal::Leaf,
        Terminal::CycleBreak,
        Terminal::Unresolved,
    ] {
        let count = model
            .flows
            .iter()
            .flat_map(|entry| entry.traces.iter())
            .filter(|trace| trace.terminal == marker)
            .count();
        if count > 0 {
            summary.terminals.insert(marker.as_str().to_string(), count);
        }
    }
    summary
}

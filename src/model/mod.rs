//! The semantic model: entity tables, the relationship multigraph, and flow
//! traces. Built once by the pipeline, read-only afterwards.

mod entity;
mod flow;
mod graph;
mod ids;

pub use entity::{
    AttrInit, Attribute, AttributeKind, CallSite, Decorator, Doc, DocParam, Import, ImportShape,
    ImportedName, Language, LocalHint, ModuleConstant, ModuleEntity, Param, Receiver, Routine,
    RoutineFlags, RoutineKind, RoutineOwner, TypeDecl, TypeKind, TypeRef, Visibility,
};
pub use flow::{FlowEntry, FlowTrace, Hop, Terminal};
pub use graph::{Cardinality, Edge, EdgeKind, Provenance, RelationshipGraph};
pub use ids::{EntityId, EntityKind, EntityRef};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The unified, cross-language project representation.
///
/// Entity tables are ordered maps so iteration, identifier listings and the
/// serialised document are deterministic for a fixed input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemanticModel {
    pub modules: BTreeMap<EntityId, ModuleEntity>,
    pub types: BTreeMap<EntityId, TypeDecl>,
    pub routines: BTreeMap<EntityId, Routine>,
    pub attributes: BTreeMap<EntityId, Attribute>,
    pub relationships: RelationshipGraph,
    pub flows: Vec<FlowEntry>,
}

impl SemanticModel {
    pub fn module(&self, id: &EntityId) -> Option<&ModuleEntity> {
        self.modules.get(id)
    }

    pub fn type_decl(&self, id: &EntityId) -> Option<&TypeDecl> {
        self.types.get(id)
    }

    pub fn routine(&self, id: &EntityId) -> Option<&Routine> {
        self.routines.get(id)
    }

    pub fn attribute(&self, id: &EntityId) -> Option<&Attribute> {
        self.attributes.get(id)
    }

    pub fn entity_count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Module => self.modules.len(),
            EntityKind::Type => self.types.len(),
            EntityKind::Routine => self.routines.len(),
            EntityKind::Attribute => self.attributes.len(),
        }
    }

    /// Whether an id belongs to any entity table.
    pub fn contains(&self, id: &EntityId) -> bool {
        self.modules.contains_key(id)
            || self.types.contains_key(id)
            || self.routines.contains_key(id)
            || self.attributes.contains_key(id)
    }

    /// The owning TypeDecl of a routine, when it is a method.
    pub fn owner_type(&self, routine: &Routine) -> Option<&TypeDecl> {
        match &routine.owner {
            RoutineOwner::Type(id) => self.types.get(id),
            RoutineOwner::Module(_) => None,
        }
    }

    /// Method resolution order for a type: the type itself, then its bases
    /// left-to-right depth-first with duplicate suppression. External bases
    /// are skipped; they cannot contribute methods.
    pub fn mro(&self, start: &EntityId) -> Vec<EntityId> {
        let mut order = Vec::new();
        let mut stack = vec![start.clone()];
        while let Some(id) = stack.pop() {
            if order.contains(&id) {
                continue;
            }
            let Some(decl) = self.types.get(&id) else {
                continue;
            };
            order.push(id);
            // Bases are pushed in reverse so the left-most pops first.
            let mut bases: Vec<EntityId> = decl
                .bases
                .iter()
                .chain(decl.uses_traits.iter())
                .filter_map(|r| r.target.entity().cloned())
                .collect();
            bases.reverse();
            stack.extend(bases);
        }
        order
    }

    /// Find a method by name along the MRO of `type_id`. Returns the routine
    /// id and whether the match came from a base rather than the type itself.
    pub fn resolve_method(&self, type_id: &EntityId, name: &str) -> Option<(EntityId, bool)> {
        for (index, candidate) in self.mro(type_id).iter().enumerate() {
            let decl = self.types.get(candidate)?;
            for method_id in &decl.methods {
                if let Some(routine) = self.routines.get(method_id) {
                    if routine.name == name {
                        return Some((method_id.clone(), index > 0));
                    }
                }
            }
        }
        None
    }
}

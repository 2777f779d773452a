//! Model Builder: merges per-file Raw Entity Records into the Semantic
//! Model. Assigns stable identifiers, builds per-file import bindings,
//! resolves intra-project references through the file-imports → namespace →
//! project-tree cascade, and seals text references into identifier
//! references. Resolution failure is never fatal; unresolved references bind
//! to External with their textual form preserved.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::diagnostics::{Diagnostic, DiagnosticCategory};
use crate::error::{AtlasError, Result};
use crate::model::{
    AttrInit, Attribute, Edge, EdgeKind, EntityId, EntityKind, EntityRef, Import, ImportShape,
    Language, LocalHint, ModuleEntity, Param, Provenance, Routine, RoutineOwner, SemanticModel,
    TypeDecl, TypeRef,
};
use crate::record::{FileRecord, RawAttrInit, RawRoutine, RawTypeDecl};
use crate::typeexpr;

/// Build the sealed model from the full record stream. Records must already
/// be in stable path order.
pub fn build(records: &[FileRecord], diagnostics: &mut Vec<Diagnostic>) -> Result<SemanticModel> {
    let mut builder = Builder::default();
    for record in records {
        builder.assemble_file(record)?;
    }
    builder.seal(records);
    builder.break_inheritance_cycles();
    debug!(
        modules = builder.model.modules.len(),
        types = builder.model.types.len(),
        routines = builder.model.routines.len(),
        "model sealed"
    );
    diagnostics.append(&mut builder.diagnostics);
    Ok(builder.model)
}

#[derive(Debug, Clone)]
enum Binding {
    Module(EntityId),
    Type(EntityId),
    Routine(EntityId),
    /// Imported, but from outside the project; shadows further lookup.
    External,
}

#[derive(Default)]
struct SymbolIndex {
    /// module_name → module id (first declaration wins).
    modules_by_name: BTreeMap<String, EntityId>,
    /// module path → module id.
    modules_by_path: BTreeMap<String, EntityId>,
    /// (module path, simple type name) → type id.
    file_types: BTreeMap<(String, String), EntityId>,
    /// fully qualified type name → type id.
    global_types: BTreeMap<String, EntityId>,
    /// simple type name → all ids carrying it.
    simple_types: BTreeMap<String, Vec<EntityId>>,
    /// (namespace, simple type name) → type id.
    namespace_types: BTreeMap<(String, String), EntityId>,
    /// (module path, function name) → routine id.
    module_fns: BTreeMap<(String, String), EntityId>,
}

#[derive(Default)]
struct Builder {
    model: SemanticModel,
    index: SymbolIndex,
    diagnostics: Vec<Diagnostic>,
}

/// Per-file resolution context derived from the module header.
struct FileContext {
    path: String,
    module_name: String,
    namespace: Option<String>,
    language: Language,
    bindings: BTreeMap<String, Binding>,
}

impl Builder {
    // -- Pass 1: identifier assignment and entity assembly -----------------

    fn assemble_file(&mut self, record: &FileRecord) -> Result<()> {
        let mut used: BTreeSet<EntityId> = BTreeSet::new();
        let module_id = EntityId::new(EntityKind::Module, &record.path, &record.module_name);
        used.insert(module_id.clone());

        let mut module = ModuleEntity {
            id: module_id.clone(),
            path: record.path.clone(),
            language: record.language,
            name: record.module_name.clone(),
            namespace: record.namespace.clone(),
            imports: record
                .imports
                .iter()
                .map(|i| Import {
                    module: i.module.clone(),
                    shape: i.shape.clone(),
                    names: i.names.clone(),
                    resolved: None,
                    line: i.line,
                })
                .collect(),
            constants: record.constants.clone(),
            functions: Vec::new(),
            types: Vec::new(),
            doc: record.doc.clone(),
            content_hash: record.content_hash.clone(),
            external_dependencies: Vec::new(),
            best_effort: record.best_effort,
        };

        self.index
            .modules_by_name
            .entry(record.module_name.clone())
            .or_insert_with(|| module_id.clone());
        self.index
            .modules_by_path
            .insert(record.path.clone(), module_id.clone());

        for raw_type in &record.types {
            let type_id = self.assemble_type(record, raw_type, &module_id, &mut used)?;
            module.types.push(type_id);
        }

        for raw_fn in &record.routines {
            let qualified = qualify_routine(record.language, &record.module_name, &raw_fn.name);
            let routine_id = self.assemble_routine(
                record,
                raw_fn,
                RoutineOwner::Module(module_id.clone()),
                qualified,
                &mut used,
            )?;
            self.index
                .module_fns
                .entry((record.path.clone(), raw_fn.name.clone()))
                .or_insert_with(|| routine_id.clone());
            module.functions.push(routine_id);
        }

        if self.model.modules.insert(module_id.clone(), module).is_some() {
            return Err(AtlasError::IdentifierCollision {
                id: module_id.to_string(),
                first: record.path.clone(),
                second: record.path.clone(),
            });
        }
        Ok(())
    }

    fn assemble_type(
        &mut self,
        record: &FileRecord,
        raw: &RawTypeDecl,
        module_id: &EntityId,
        used: &mut BTreeSet<EntityId>,
    ) -> Result<EntityId> {
        let qualified = qualify_type(record.language, record, &raw.name);
        let type_id = self.unique_id(EntityKind::Type, &record.path, &qualified, used);

        let simple = raw.name.rsplit(['.', '\\']).next().unwrap_or(&raw.name);
        self.index
            .file_types
            .entry((record.path.clone(), raw.name.clone()))
            .or_insert_with(|| type_id.clone());
        if simple != raw.name {
            self.index
                .file_types
                .entry((record.path.clone(), simple.to_string()))
                .or_insert_with(|| type_id.clone());
        }
        self.index
            .global_types
            .entry(qualified.clone())
            .or_insert_with(|| type_id.clone());
        self.index
            .simple_types
            .entry(simple.to_string())
            .or_default()
            .push(type_id.clone());
        if let Some(namespace) = &record.namespace {
            self.index
                .namespace_types
                .entry((namespace.clone(), simple.to_string()))
                .or_insert_with(|| type_id.clone());
        }

        let mut decl = TypeDecl {
            id: type_id.clone(),
            name: raw.name.clone(),
            qualified_name: qualified.clone(),
            module: module_id.clone(),
            kind: raw.kind,
            bases: raw.bases.iter().map(|t| unresolved(t)).collect(),
            implements: raw.implements.iter().map(|t| unresolved(t)).collect(),
            uses_traits: raw.uses_traits.iter().map(|t| unresolved(t)).collect(),
            methods: Vec::new(),
            attributes: Vec::new(),
            span: raw.span,
            doc: raw.doc.clone(),
            visibility: raw.visibility,
            is_abstract: raw.is_abstract,
            is_final: raw.is_final,
            decorators: raw.decorators.clone(),
            best_effort: record.best_effort,
        };

        for raw_method in &raw.methods {
            let qualified_method =
                qualify_member(record.language, &qualified, &raw_method.name);
            let method_id = self.assemble_routine(
                record,
                raw_method,
                RoutineOwner::Type(type_id.clone()),
                qualified_method,
                used,
            )?;
            decl.methods.push(method_id);
        }

        for raw_attr in &raw.attributes {
            let qualified_attr = qualify_member(record.language, &qualified, &raw_attr.name);
            let attr_id = self.unique_id(EntityKind::Attribute, &record.path, &qualified_attr, used);
            let attribute = Attribute {
                id: attr_id.clone(),
                name: raw_attr.name.clone(),
                owner: type_id.clone(),
                kind: raw_attr.kind,
                declared_type: raw_attr.declared_type.as_deref().map(unresolved),
                default: raw_attr.default.clone(),
                init: raw_attr.init.as_ref().map(|init| match init {
                    RawAttrInit::Constructed { ty } => AttrInit::Constructed {
                        ty: unresolved(ty),
                    },
                    RawAttrInit::FromParam { param } => AttrInit::FromParam {
                        param: param.clone(),
                    },
                }),
                visibility: raw_attr.visibility,
                is_static: raw_attr.is_static,
                line: raw_attr.line,
                doc: raw_attr.doc.clone(),
            };
            if self.model.attributes.insert(attr_id.clone(), attribute).is_some() {
                return Err(collision(&attr_id, &record.path));
            }
            decl.attributes.push(attr_id);
        }

        if self.model.types.insert(type_id.clone(), decl).is_some() {
            return Err(collision(&type_id, &record.path));
        }
        Ok(type_id)
    }

    fn assemble_routine(
        &mut self,
        record: &FileRecord,
        raw: &RawRoutine,
        owner: RoutineOwner,
        qualified: String,
        used: &mut BTreeSet<EntityId>,
    ) -> Result<EntityId> {
        let routine_id = self.unique_id(EntityKind::Routine, &record.path, &qualified, used);
        let routine = Routine {
            id: routine_id.clone(),
            name: raw.name.clone(),
            qualified_name: qualified,
            owner,
            kind: raw.kind,
            receiver: raw.receiver,
            params: raw
                .params
                .iter()
                .map(|p| Param {
                    name: p.name.clone(),
                    ty: p.ty.as_deref().map(unresolved),
                    has_default: p.has_default,
                    variadic: p.variadic,
                })
                .collect(),
            return_type: raw.return_type.as_deref().map(unresolved),
            flags: raw.flags,
            span: raw.span,
            doc: raw.doc.clone(),
            visibility: raw.visibility,
            calls: raw.calls.clone(),
            locals: raw
                .locals
                .iter()
                .map(|l| LocalHint {
                    name: l.name.clone(),
                    ty: unresolved(&l.ty),
                    line: l.line,
                })
                .collect(),
            decorators: raw.decorators.clone(),
            best_effort: record.best_effort,
        };
        if self.model.routines.insert(routine_id.clone(), routine).is_some() {
            return Err(collision(&routine_id, &record.path));
        }
        Ok(routine_id)
    }

    /// Assign an id, adding a deterministic ordinal suffix on collision. The
    /// original qualified name stays on the entity.
    fn unique_id(
        &mut self,
        kind: EntityKind,
        path: &str,
        qualified: &str,
        used: &mut BTreeSet<EntityId>,
    ) -> EntityId {
        let base = EntityId::new(kind, path, qualified);
        if used.insert(base.clone()) {
            return base;
        }
        let mut ordinal = 2;
        loop {
            let candidate = base.with_ordinal(ordinal);
            if used.insert(candidate.clone()) {
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCategory::IdentifierDisambiguated,
                        format!("`{base}` already assigned; `{candidate}` used instead"),
                    )
                    .with_path(path.to_string()),
                );
                return candidate;
            }
            ordinal += 1;
        }
    }

    // -- Pass 2: import bindings and reference sealing ---------------------

    fn seal(&mut self, records: &[FileRecord]) {
        let mut contexts: BTreeMap<EntityId, FileContext> = BTreeMap::new();

        // Import bindings first: the cascade consults them before anything
        // else, and they also seal the module import lists.
        for record in records {
            let Some(module_id) = self.index.modules_by_path.get(&record.path).cloned() else {
                continue;
            };
            let context = self.bind_imports(&module_id, record);
            contexts.insert(module_id, context);
        }

        // Seal type references and emit inheritance-family edges.
        let type_ids: Vec<EntityId> = self.model.types.keys().cloned().collect();
        let mut edges: Vec<Edge> = Vec::new();
        for type_id in &type_ids {
            let (module_id, span, name) = {
                let decl = &self.model.types[type_id];
                (decl.module.clone(), decl.span, decl.name.clone())
            };
            let Some(context) = contexts.get(&module_id) else {
                continue;
            };

            for (field, kind) in [
                ("bases", EdgeKind::Inherits),
                ("implements", EdgeKind::Implements),
                ("uses_traits", EdgeKind::UsesTrait),
            ] {
                let texts: Vec<String> = {
                    let decl = &self.model.types[type_id];
                    let refs = match field {
                        "bases" => &decl.bases,
                        "implements" => &decl.implements,
                        _ => &decl.uses_traits,
                    };
                    refs.iter().map(|r| r.text.clone()).collect()
                };
                let mut sealed: Vec<TypeRef> = Vec::new();
                let mut seen: BTreeSet<String> = BTreeSet::new();
                for text in texts {
                    let target = self.resolve_type_text(&text, context);
                    let reference = TypeRef {
                        text: text.clone(),
                        target: target.clone(),
                    };
                    // Duplicate references coalesce; order is preserved.
                    if !seen.insert(reference.target.id_string()) {
                        continue;
                    }
                    if target.is_external() {
                        self.diagnostics.push(
                            Diagnostic::new(
                                DiagnosticCategory::ResolutionMiss,
                                format!("`{text}` referenced by `{name}` is external"),
                            )
                            .with_path(context.path.clone())
                            .with_line(span.0),
                        );
                    }
                    edges.push(Edge {
                        source: type_id.clone(),
                        target: target.clone(),
                        kind,
                        cardinality: None,
                        optional: false,
                        provenance: Provenance {
                            file: context.path.clone(),
                            line: span.0,
                        },
                    });
                    sealed.push(reference);
                }
                let decl = self.model.types.get_mut(type_id).expect("type exists");
                match field {
                    "bases" => decl.bases = sealed,
                    "implements" => decl.implements = sealed,
                    _ => decl.uses_traits = sealed,
                }
            }
        }
        for edge in edges {
            self.model.relationships.push(edge);
        }

        // Seal routine and attribute type references.
        let routine_ids: Vec<EntityId> = self.model.routines.keys().cloned().collect();
        for routine_id in routine_ids {
            let module_id = {
                let routine = &self.model.routines[&routine_id];
                match &routine.owner {
                    RoutineOwner::Module(id) => id.clone(),
                    RoutineOwner::Type(id) => self.model.types[id].module.clone(),
                }
            };
            let Some(context) = contexts.get(&module_id) else {
                continue;
            };
            let resolve = |text: &str, this: &Builder| this.resolve_type_text(text, context);

            let params: Vec<Option<EntityRef>> = {
                let routine = &self.model.routines[&routine_id];
                routine
                    .params
                    .iter()
                    .map(|p| p.ty.as_ref().map(|t| resolve(&t.text, self)))
                    .collect()
            };
            let return_target = {
                let routine = &self.model.routines[&routine_id];
                routine.return_type.as_ref().map(|t| resolve(&t.text, self))
            };
            let locals: Vec<EntityRef> = {
                let routine = &self.model.routines[&routine_id];
                routine
                    .locals
                    .iter()
                    .map(|l| resolve(&l.ty.text, self))
                    .collect()
            };

            let routine = self.model.routines.get_mut(&routine_id).expect("routine");
            for (param, target) in routine.params.iter_mut().zip(params) {
                if let (Some(ty), Some(target)) = (param.ty.as_mut(), target) {
                    ty.target = target;
                }
            }
            if let (Some(ty), Some(target)) = (routine.return_type.as_mut(), return_target) {
                ty.target = target;
            }
            for (local, target) in routine.locals.iter_mut().zip(locals) {
                local.ty.target = target;
            }
        }

        let attr_ids: Vec<EntityId> = self.model.attributes.keys().cloned().collect();
        for attr_id in attr_ids {
            let module_id = {
                let attribute = &self.model.attributes[&attr_id];
                self.model.types[&attribute.owner].module.clone()
            };
            let Some(context) = contexts.get(&module_id) else {
                continue;
            };
            let (declared, constructed) = {
                let attribute = &self.model.attributes[&attr_id];
                (
                    attribute
                        .declared_type
                        .as_ref()
                        .map(|t| self.resolve_type_text(&t.text, context)),
                    match &attribute.init {
                        Some(AttrInit::Constructed { ty }) => {
                            Some(self.resolve_type_text(&ty.text, context))
                        }
                        _ => None,
                    },
                )
            };
            let attribute = self.model.attributes.get_mut(&attr_id).expect("attribute");
            if let (Some(ty), Some(target)) = (attribute.declared_type.as_mut(), declared) {
                ty.target = target;
            }
            if let (Some(AttrInit::Constructed { ty }), Some(target)) =
                (attribute.init.as_mut(), constructed)
            {
                ty.target = target;
            }
        }
    }

    /// Build the binding map for one module and seal its import list.
    fn bind_imports(&mut self, module_id: &EntityId, record: &FileRecord) -> FileContext {
        let mut bindings: BTreeMap<String, Binding> = BTreeMap::new();
        let mut sealed: Vec<Import> = Vec::new();
        let mut external_deps: Vec<String> = Vec::new();

        let imports = self.model.modules[module_id].imports.clone();
        for mut import in imports {
            match (&import.shape, record.language) {
                (ImportShape::Plain, Language::Php) => {
                    // `use A\B [as C]` binds a type (or stays external).
                    let qualified = import.module.trim_start_matches('\\').to_string();
                    let alias = import
                        .names
                        .first()
                        .and_then(|n| n.alias.clone())
                        .unwrap_or_else(|| {
                            qualified
                                .rsplit('\\')
                                .next()
                                .unwrap_or(&qualified)
                                .to_string()
                        });
                    match self.index.global_types.get(&qualified) {
                        Some(type_id) => {
                            import.resolved =
                                Some(self.model.types[type_id].module.clone());
                            bindings.insert(alias, Binding::Type(type_id.clone()));
                        }
                        None => {
                            bindings.insert(alias, Binding::External);
                            external_deps.push(import.module.clone());
                        }
                    }
                }
                (ImportShape::Plain, _) => {
                    // Python `import a.b [as c]`, JS side-effect import.
                    match self.index.modules_by_name.get(&import.module) {
                        Some(target) => {
                            import.resolved = Some(target.clone());
                            let key = import
                                .names
                                .first()
                                .and_then(|n| n.alias.clone())
                                .unwrap_or_else(|| import.module.clone());
                            bindings.insert(key, Binding::Module(target.clone()));
                        }
                        None => {
                            if let Some(name) = import.names.first() {
                                let key = name
                                    .alias
                                    .clone()
                                    .unwrap_or_else(|| import.module.clone());
                                bindings.insert(key, Binding::External);
                            } else {
                                bindings.insert(import.module.clone(), Binding::External);
                            }
                            external_deps.push(import.module.clone());
                        }
                    }
                }
                (ImportShape::Named, _) | (ImportShape::Relative { .. }, _) => {
                    let target_name = match &import.shape {
                        ImportShape::Relative { depth } => relative_target(
                            record.namespace.as_deref(),
                            *depth,
                            &import.module,
                        ),
                        _ => {
                            if record.language == Language::JavaScript
                                || record.language == Language::TypeScript
                            {
                                js_target(&record.path, &import.module)
                            } else {
                                Some(import.module.clone())
                            }
                        }
                    };
                    let target_module = target_name.as_ref().and_then(|name| {
                        self.index
                            .modules_by_name
                            .get(name)
                            .or_else(|| {
                                self.index.modules_by_name.get(&format!("{name}/index"))
                            })
                            .cloned()
                    });

                    match &target_module {
                        Some(target) => {
                            import.resolved = Some(target.clone());
                            let target_path = self.model.modules[target].path.clone();
                            for name in &import.names {
                                let key = name.alias.clone().unwrap_or_else(|| name.name.clone());
                                if name.name == "*" || name.name == "default" {
                                    bindings.insert(key, Binding::Module(target.clone()));
                                    continue;
                                }
                                let binding = self
                                    .index
                                    .file_types
                                    .get(&(target_path.clone(), name.name.clone()))
                                    .map(|id| Binding::Type(id.clone()))
                                    .or_else(|| {
                                        self.index
                                            .module_fns
                                            .get(&(target_path.clone(), name.name.clone()))
                                            .map(|id| Binding::Routine(id.clone()))
                                    })
                                    .or_else(|| {
                                        let submodule = format!(
                                            "{}.{}",
                                            target_name.as_deref().unwrap_or(""),
                                            name.name
                                        );
                                        self.index
                                            .modules_by_name
                                            .get(&submodule)
                                            .map(|id| Binding::Module(id.clone()))
                                    })
                                    .unwrap_or(Binding::External);
                                bindings.insert(key, binding);
                            }
                        }
                        None => {
                            for name in &import.names {
                                let key = name.alias.clone().unwrap_or_else(|| name.name.clone());
                                bindings.insert(key, Binding::External);
                            }
                            external_deps.push(import.module.clone());
                        }
                    }
                }
            }

            if import.resolved.is_none() {
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCategory::ResolutionMiss,
                        format!("import `{}` does not resolve inside the project", import.module),
                    )
                    .with_path(record.path.clone())
                    .with_line(import.line),
                );
            }
            sealed.push(import);
        }

        let module = self.model.modules.get_mut(module_id).expect("module");
        module.imports = sealed;
        module.external_dependencies = external_deps;

        FileContext {
            path: record.path.clone(),
            module_name: record.module_name.clone(),
            namespace: record.namespace.clone(),
            language: record.language,
            bindings,
        }
    }

    /// The resolution cascade for a declared type text: (a) file imports,
    /// (b) current namespace, (c) project-wide tree; otherwise External.
    fn resolve_type_text(&self, text: &str, context: &FileContext) -> EntityRef {
        let shape = typeexpr::analyze(text);
        let core = shape.core.trim_start_matches('\\');
        if core.is_empty() || !is_name_like(core) {
            return EntityRef::External(text.to_string());
        }

        // (a) import bindings, exact name first.
        if let Some(binding) = context.bindings.get(core) {
            return match binding {
                Binding::Type(id) => EntityRef::Entity(id.clone()),
                _ => EntityRef::External(text.to_string()),
            };
        }
        // Dotted references through an imported module (`m.Class`).
        if core.contains('.') {
            let mut split = core.len();
            while let Some(pos) = core[..split].rfind('.') {
                split = pos;
                let (prefix, rest) = (&core[..pos], &core[pos + 1..]);
                if let Some(binding) = context.bindings.get(prefix) {
                    return match binding {
                        Binding::Module(module_id) => {
                            let path = &self.model.modules[module_id].path;
                            match self
                                .index
                                .file_types
                                .get(&(path.clone(), rest.to_string()))
                            {
                                Some(id) => EntityRef::Entity(id.clone()),
                                None => EntityRef::External(text.to_string()),
                            }
                        }
                        Binding::Type(id) => {
                            // Nested type reference `Outer.Inner`.
                            let qualified =
                                format!("{}.{}", self.model.types[id].qualified_name, rest);
                            match self.index.global_types.get(&qualified) {
                                Some(id) => EntityRef::Entity(id.clone()),
                                None => EntityRef::External(text.to_string()),
                            }
                        }
                        _ => EntityRef::External(text.to_string()),
                    };
                }
            }
        }

        // (b) the current file, then the current namespace.
        if let Some(id) = self
            .index
            .file_types
            .get(&(context.path.clone(), core.to_string()))
        {
            return EntityRef::Entity(id.clone());
        }
        if let Some(namespace) = &context.namespace {
            if let Some(id) = self
                .index
                .namespace_types
                .get(&(namespace.clone(), core.to_string()))
            {
                return EntityRef::Entity(id.clone());
            }
            // PHP: a bare name inside a namespace qualifies against it.
            if context.language == Language::Php {
                let qualified = format!("{namespace}\\{core}");
                if let Some(id) = self.index.global_types.get(&qualified) {
                    return EntityRef::Entity(id.clone());
                }
            }
        }

        // (c) the project-wide tree: exact qualified name, then a unique
        // simple-name match.
        if let Some(id) = self.index.global_types.get(core) {
            return EntityRef::Entity(id.clone());
        }
        let simple = core.rsplit(['.', '\\']).next().unwrap_or(core);
        if simple == core {
            if let Some(ids) = self.index.simple_types.get(simple) {
                if ids.len() == 1 {
                    return EntityRef::Entity(ids[0].clone());
                }
            }
        }

        EntityRef::External(text.to_string())
    }

    /// Restore invariant 3 on malformed input: redirect inheritance edges
    /// that close a project-internal cycle to External.
    fn break_inheritance_cycles(&mut self) {
        let mut adjacency: BTreeMap<EntityId, Vec<(usize, EntityId)>> = BTreeMap::new();
        for (index, edge) in self.model.relationships.edges().iter().enumerate() {
            if !matches!(edge.kind, EdgeKind::Inherits | EdgeKind::Implements) {
                continue;
            }
            if let EntityRef::Entity(target) = &edge.target {
                if self.model.types.contains_key(target) {
                    adjacency
                        .entry(edge.source.clone())
                        .or_default()
                        .push((index, target.clone()));
                }
            }
        }

        let mut color: BTreeMap<EntityId, u8> = BTreeMap::new();
        let mut back_edges: Vec<usize> = Vec::new();
        let nodes: Vec<EntityId> = self.model.types.keys().cloned().collect();
        for node in &nodes {
            if !color.contains_key(node) {
                dfs_back_edges(node, &adjacency, &mut color, &mut back_edges);
            }
        }

        back_edges.sort_unstable();
        for index in back_edges {
            let (source, old_target) = {
                let edge = &self.model.relationships.edges()[index];
                (edge.source.clone(), edge.target.clone())
            };
            let text = match &old_target {
                EntityRef::Entity(id) => self
                    .model
                    .types
                    .get(id)
                    .map(|t| t.name.clone())
                    .unwrap_or_else(|| id.to_string()),
                EntityRef::External(text) => text.clone(),
            };
            self.diagnostics.push(Diagnostic::new(
                DiagnosticCategory::ResolutionMiss,
                format!(
                    "inheritance cycle through `{source}` broken; `{text}` treated as external"
                ),
            ));
            // Rewrite both the edge and the declaration reference.
            if let Some(decl) = self.model.types.get_mut(&source) {
                for reference in decl.bases.iter_mut().chain(decl.implements.iter_mut()) {
                    if reference.target == old_target {
                        reference.target = EntityRef::External(text.clone());
                    }
                }
            }
            let edge = &mut self.model.relationships.edges_mut()[index];
            edge.target = EntityRef::External(text);
        }
    }
}

fn dfs_back_edges(
    node: &EntityId,
    adjacency: &BTreeMap<EntityId, Vec<(usize, EntityId)>>,
    color: &mut BTreeMap<EntityId, u8>,
    back_edges: &mut Vec<usize>,
) {
    color.insert(node.clone(), 1);
    if let Some(next) = adjacency.get(node) {
        for (index, target) in next {
            match color.get(target) {
                Some(1) => back_edges.push(*index),
                Some(_) => {}
                None => dfs_back_edges(target, adjacency, color, back_edges),
            }
        }
    }
    color.insert(node.clone(), 2);
}

fn collision(id: &EntityId, path: &str) -> AtlasError {
    AtlasError::IdentifierCollision {
        id: id.to_string(),
        first: path.to_string(),
        second: path.to_string(),
    }
}

fn unresolved(text: &str) -> TypeRef {
    TypeRef {
        text: text.to_string(),
        target: EntityRef::External(text.to_string()),
    }
}

fn is_name_like(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '\\' | '$'))
}

fn qualify_type(language: Language, record: &FileRecord, name: &str) -> String {
    match language {
        Language::Php => match &record.namespace {
            Some(namespace) => format!("{namespace}\\{name}"),
            None => name.to_string(),
        },
        _ => format!("{}.{}", record.module_name, name),
    }
}

fn qualify_member(language: Language, type_qualified: &str, name: &str) -> String {
    match language {
        Language::Php => format!("{type_qualified}::{name}"),
        _ => format!("{type_qualified}.{name}"),
    }
}

fn qualify_routine(language: Language, module_name: &str, name: &str) -> String {
    match language {
        Language::Php => format!("{module_name}\\{name}"),
        _ => format!("{module_name}.{name}"),
    }
}

/// Base module for a Python relative import: the containing package minus
/// `depth - 1` trailing components, plus the written suffix.
fn relative_target(namespace: Option<&str>, depth: u32, suffix: &str) -> Option<String> {
    let mut parts: Vec<&str> = namespace
        .map(|n| n.split('.').collect())
        .unwrap_or_default();
    for _ in 1..depth {
        if parts.pop().is_none() {
            return None;
        }
    }
    if !suffix.is_empty() {
        parts.extend(suffix.split('.'));
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("."))
}

/// Normalise a JS relative specifier against the importing file's directory.
fn js_target(importer_path: &str, specifier: &str) -> Option<String> {
    if !specifier.starts_with('.') {
        return None;
    }
    let mut parts: Vec<&str> = importer_path.split('/').collect();
    parts.pop(); // the file itself
    for segment in specifier.split('/') {
        match segment {
            "." | "" => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    let stripped = joined
        .strip_suffix(".js")
        .or_else(|| joined.strip_suffix(".ts"))
        .unwrap_or(&joined);
    Some(stripped.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ImportedName, RoutineKind, TypeKind};
    use crate::record::{RawImport, RawParam};

    fn python_record(path: &str, module: &str) -> FileRecord {
        let mut record = FileRecord::new(path, Language::Python, module);
        record.namespace = module.rsplit_once('.').map(|(ns, _)| ns.to_string());
        record
    }

    #[test]
    fn seals_same_file_inheritance() {
        let mut record = python_record("a.py", "a");
        record.types.push(RawTypeDecl::new("A", TypeKind::Class, (1, 2)));
        let mut b = RawTypeDecl::new("B", TypeKind::Class, (4, 5));
        b.bases.push("A".to_string());
        record.types.push(b);

        let mut diagnostics = Vec::new();
        let model = build(&[record], &mut diagnostics).unwrap();
        assert_eq!(model.types.len(), 2);

        let inherits: Vec<_> = model.relationships.of_kind(EdgeKind::Inherits).collect();
        assert_eq!(inherits.len(), 1);
        let target = inherits[0].target.entity().unwrap();
        assert_eq!(model.types[target].name, "A");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn resolves_across_files_through_imports() {
        let mut a = python_record("m/a.py", "m.a");
        a.types.push(RawTypeDecl::new("A", TypeKind::Class, (1, 2)));

        let mut b = python_record("m/b.py", "m.b");
        b.imports.push(RawImport {
            module: "a".to_string(),
            shape: ImportShape::Relative { depth: 1 },
            names: vec![ImportedName {
                name: "A".to_string(),
                alias: None,
            }],
            line: 1,
        });
        let mut decl = RawTypeDecl::new("B", TypeKind::Class, (3, 4));
        decl.bases.push("A".to_string());
        b.types.push(decl);

        let mut diagnostics = Vec::new();
        let model = build(&[a, b], &mut diagnostics).unwrap();

        let module_b = model
            .modules
            .values()
            .find(|m| m.path == "m/b.py")
            .unwrap();
        let resolved = module_b.imports[0].resolved.as_ref().unwrap();
        assert_eq!(model.modules[resolved].path, "m/a.py");

        let inherits: Vec<_> = model.relationships.of_kind(EdgeKind::Inherits).collect();
        assert_eq!(inherits.len(), 1);
        assert!(!inherits[0].target.is_external());
    }

    #[test]
    fn unresolved_base_becomes_external_with_diagnostic() {
        let mut record = python_record("a.py", "a");
        let mut decl = RawTypeDecl::new("B", TypeKind::Class, (1, 2));
        decl.bases.push("Missing".to_string());
        record.types.push(decl);

        let mut diagnostics = Vec::new();
        let model = build(&[record], &mut diagnostics).unwrap();
        let decl = model.types.values().next().unwrap();
        assert_eq!(
            decl.bases[0].target,
            EntityRef::External("Missing".to_string())
        );
        assert!(diagnostics
            .iter()
            .any(|d| d.category == DiagnosticCategory::ResolutionMiss));
    }

    #[test]
    fn duplicate_names_get_ordinal_suffixes() {
        let mut record = python_record("a.py", "a");
        let mut f1 = RawRoutine::new("run", RoutineKind::Function, (1, 2));
        f1.params.push(RawParam {
            name: "x".to_string(),
            ty: None,
            has_default: false,
            variadic: false,
        });
        let f2 = RawRoutine::new("run", RoutineKind::Function, (4, 5));
        record.routines.push(f1);
        record.routines.push(f2);

        let mut diagnostics = Vec::new();
        let model = build(&[record], &mut diagnostics).unwrap();
        assert_eq!(model.routines.len(), 2);
        let ids: Vec<&str> = model.routines.keys().map(|k| k.as_str()).collect();
        assert!(ids.contains(&"routine:a.py:a.run"));
        assert!(ids.contains(&"routine:a.py:a.run:2"));
        // Both keep the original qualified name.
        for routine in model.routines.values() {
            assert_eq!(routine.qualified_name, "a.run");
        }
    }

    #[test]
    fn inheritance_cycles_are_broken() {
        let mut record = python_record("a.py", "a");
        let mut x = RawTypeDecl::new("X", TypeKind::Class, (1, 2));
        x.bases.push("Y".to_string());
        let mut y = RawTypeDecl::new("Y", TypeKind::Class, (3, 4));
        y.bases.push("X".to_string());
        record.types.push(x);
        record.types.push(y);

        let mut diagnostics = Vec::new();
        let model = build(&[record], &mut diagnostics).unwrap();

        let internal: Vec<_> = model
            .relationships
            .of_kind(EdgeKind::Inherits)
            .filter(|e| !e.target.is_external())
            .collect();
        assert_eq!(internal.len(), 1, "one edge of the cycle must be cut");
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("inheritance cycle")));
    }

    #[test]
    fn php_namespace_qualification() {
        let mut record = FileRecord::new("src/Car.php", Language::Php, "App");
        record.namespace = Some("App".to_string());
        let mut decl = RawTypeDecl::new("Car", TypeKind::Class, (3, 9));
        decl.bases.push("Vehicle".to_string());
        record.types.push(decl);
        record.types.push(RawTypeDecl::new("Vehicle", TypeKind::Class, (11, 12)));

        let mut diagnostics = Vec::new();
        let model = build(&[record], &mut diagnostics).unwrap();
        let car = model.types.values().find(|t| t.name == "Car").unwrap();
        assert_eq!(car.qualified_name, "App\\Car");
        assert!(!car.bases[0].target.is_external());
    }

    #[test]
    fn js_relative_import_resolution() {
        let mut engine = FileRecord::new("src/engine.ts", Language::TypeScript, "src/engine");
        engine
            .types
            .push(RawTypeDecl::new("Engine", TypeKind::Class, (1, 5)));

        let mut car = FileRecord::new("src/car.ts", Language::TypeScript, "src/car");
        car.imports.push(RawImport {
            module: "./engine".to_string(),
            shape: ImportShape::Named,
            names: vec![ImportedName {
                name: "Engine".to_string(),
                alias: None,
            }],
            line: 1,
        });
        let mut decl = RawTypeDecl::new("Car", TypeKind::Class, (3, 8));
        decl.bases.push("Engine".to_string());
        car.types.push(decl);

        let mut diagnostics = Vec::new();
        let model = build(&[car, engine], &mut diagnostics).unwrap();
        let car = model.types.values().find(|t| t.name == "Car").unwrap();
        assert!(!car.bases[0].target.is_external());
    }

    #[test]
    fn container_annotations_resolve_their_element_type() {
        let mut record = python_record("a.py", "a");
        record
            .types
            .push(RawTypeDecl::new("Wheel", TypeKind::Class, (1, 2)));
        let mut car = RawTypeDecl::new("Car", TypeKind::Class, (4, 8));
        let mut run = RawRoutine::new("run", RoutineKind::Method, (5, 7));
        run.params.push(RawParam {
            name: "wheels".to_string(),
            ty: Some("List[Wheel]".to_string()),
            has_default: false,
            variadic: false,
        });
        car.methods.push(run);
        record.types.push(car);

        let mut diagnostics = Vec::new();
        let model = build(&[record], &mut diagnostics).unwrap();
        let run = model.routines.values().find(|r| r.name == "run").unwrap();
        let ty = run.params[0].ty.as_ref().unwrap();
        assert_eq!(ty.text, "List[Wheel]");
        let target = ty.target.entity().unwrap();
        assert_eq!(model.types[target].name, "Wheel");
    }
}

//! Flow Analyzer: reconstructs bounded call chains rooted at entry
//! routines. One trace is emitted per top-level call site of an entry, as a
//! depth-first hop sequence; expansion stops at the depth limit, cycles,
//! leaves, and unresolved callees. Calls are never followed through External
//! and never across language boundaries.

use std::collections::{BTreeMap, BTreeSet};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{EntryPointSpec, FlowConfig};
use crate::model::{
    EntityId, EntityRef, FlowEntry, FlowTrace, Hop, Language, Routine, RoutineOwner,
    SemanticModel, Terminal,
};

/// Run flow analysis, appending traces to the model. Returns `false` when
/// the cancellation token fired before all entries were processed.
pub fn analyze(model: &mut SemanticModel, config: &FlowConfig, cancel: &CancellationToken) -> bool {
    let resolver = Resolver::new(model);
    let resolutions = resolver.resolve_all();

    let entries = match &config.entry_points {
        Some(explicit) => explicit_entries(model, explicit),
        None => default_entries(model, &resolutions),
    };
    debug!(entries = entries.len(), "flow analysis starting");

    let mut flows: Vec<FlowEntry> = Vec::new();
    let mut complete = true;
    for entry_id in entries {
        if cancel.is_cancelled() {
            complete = false;
            break;
        }
        let traces = trace_entry(&resolutions, &entry_id, config.max_depth);
        if !traces.is_empty() {
            flows.push(FlowEntry {
                routine_id: entry_id,
                traces,
            });
        }
    }

    model.flows = flows;
    complete
}

/// A call site after resolution.
#[derive(Debug, Clone)]
enum ResolvedTarget {
    Routine(EntityId, Option<String>),
    External(String),
}

#[derive(Debug, Clone)]
struct ResolvedSite {
    line: u32,
    target: ResolvedTarget,
}

/// Default entries: public routines that no resolved project call targets.
/// Each seeds one sequence diagram per outgoing call site.
fn default_entries(
    model: &SemanticModel,
    resolutions: &BTreeMap<EntityId, Vec<ResolvedSite>>,
) -> Vec<EntityId> {
    let mut called: BTreeSet<&EntityId> = BTreeSet::new();
    for sites in resolutions.values() {
        for site in sites {
            if let ResolvedTarget::Routine(id, _) = &site.target {
                called.insert(id);
            }
        }
    }
    model
        .routines
        .values()
        .filter(|r| r.is_public() && r.name != "constructor" && !called.contains(&r.id))
        .map(|r| r.id.clone())
        .collect()
}

fn explicit_entries(model: &SemanticModel, specs: &[EntryPointSpec]) -> Vec<EntityId> {
    let mut entries = Vec::new();
    for spec in specs {
        let found = match spec {
            EntryPointSpec::Method { class, method } => model
                .types
                .values()
                .find(|t| &t.name == class || &t.qualified_name == class)
                .and_then(|t| model.resolve_method(&t.id, method))
                .map(|(id, _)| id),
            EntryPointSpec::Function { module, function } => model
                .modules
                .values()
                .find(|m| &m.name == module || &m.path == module)
                .and_then(|m| {
                    m.functions
                        .iter()
                        .find(|id| model.routines.get(id).map(|r| &r.name == function) == Some(true))
                })
                .cloned(),
        };
        match found {
            Some(id) => entries.push(id),
            None => debug!(?spec, "explicit entry point not found in model"),
        }
    }
    entries
}

fn trace_entry(
    resolutions: &BTreeMap<EntityId, Vec<ResolvedSite>>,
    entry_id: &EntityId,
    max_depth: usize,
) -> Vec<FlowTrace> {
    let Some(sites) = resolutions.get(entry_id) else {
        return Vec::new();
    };
    let mut traces = Vec::new();
    for site in sites {
        let mut hops = Vec::new();
        let mut path = vec![entry_id.clone()];
        expand_site(resolutions, entry_id, site, 1, max_depth, &mut path, &mut hops);
        if hops.is_empty() {
            continue;
        }
        let depth = hops.iter().map(|h| h.depth).max().unwrap_or(0);
        let terminal = hops
            .last()
            .and_then(|h| h.terminal)
            .unwrap_or(Terminal::Leaf);
        traces.push(FlowTrace {
            entry: entry_id.clone(),
            hops,
            depth,
            terminal,
        });
    }
    traces
}

#[allow(clippy::too_many_arguments)]
fn expand_site(
    resolutions: &BTreeMap<EntityId, Vec<ResolvedSite>>,
    caller: &EntityId,
    site: &ResolvedSite,
    depth: usize,
    max_depth: usize,
    path: &mut Vec<EntityId>,
    hops: &mut Vec<Hop>,
) {
    match &site.target {
        ResolvedTarget::External(text) => {
            hops.push(Hop {
                caller: caller.clone(),
                callee: EntityRef::External(text.clone()),
                line: site.line,
                depth: depth as u32,
                terminal: Some(Terminal::Unresolved),
                note: None,
            });
        }
        ResolvedTarget::Routine(callee_id, note) => {
            let mut hop = Hop {
                caller: caller.clone(),
                callee: EntityRef::Entity(callee_id.clone()),
                line: site.line,
                depth: depth as u32,
                terminal: None,
                note: note.clone(),
            };
            let callee_sites = resolutions.get(callee_id);
            let has_calls = callee_sites.map(|s| !s.is_empty()).unwrap_or(false);

            if path.contains(callee_id) {
                hop.terminal = Some(Terminal::CycleBreak);
                hops.push(hop);
            } else if !has_calls {
                hop.terminal = Some(Terminal::Leaf);
                hops.push(hop);
            } else if depth >= max_depth {
                hop.terminal = Some(Terminal::DepthLimit);
                hops.push(hop);
            } else {
                hops.push(hop);
                path.push(callee_id.clone());
                let sites = callee_sites.cloned().unwrap_or_default();
                for next in &sites {
                    expand_site(resolutions, callee_id, next, depth + 1, max_depth, path, hops);
                }
                path.pop();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Call-site resolution
// ---------------------------------------------------------------------------

struct Resolver<'a> {
    model: &'a SemanticModel,
    /// (module, function name) → routine.
    module_fns: BTreeMap<(EntityId, String), EntityId>,
    /// (module, simple type name) → type.
    module_types: BTreeMap<(EntityId, String), EntityId>,
    /// Per module: imported binding name → target.
    imported_modules: BTreeMap<EntityId, BTreeMap<String, EntityId>>,
    imported_types: BTreeMap<EntityId, BTreeMap<String, EntityId>>,
    imported_fns: BTreeMap<EntityId, BTreeMap<String, EntityId>>,
}

impl<'a> Resolver<'a> {
    fn new(model: &'a SemanticModel) -> Self {
        let mut resolver = Self {
            model,
            module_fns: BTreeMap::new(),
            module_types: BTreeMap::new(),
            imported_modules: BTreeMap::new(),
            imported_types: BTreeMap::new(),
            imported_fns: BTreeMap::new(),
        };

        for module in model.modules.values() {
            for fn_id in &module.functions {
                if let Some(routine) = model.routines.get(fn_id) {
                    resolver
                        .module_fns
                        .entry((module.id.clone(), routine.name.clone()))
                        .or_insert_with(|| fn_id.clone());
                }
            }
            for type_id in &module.types {
                if let Some(decl) = model.types.get(type_id) {
                    let simple = decl.name.rsplit(['.', '\\']).next().unwrap_or(&decl.name);
                    resolver
                        .module_types
                        .entry((module.id.clone(), simple.to_string()))
                        .or_insert_with(|| type_id.clone());
                }
            }

            let modules_entry = resolver.imported_modules.entry(module.id.clone()).or_default();
            let mut types_entry: BTreeMap<String, EntityId> = BTreeMap::new();
            let mut fns_entry: BTreeMap<String, EntityId> = BTreeMap::new();
            for import in &module.imports {
                if module.language == Language::Php {
                    // PHP `use` bindings are type imports; handled below.
                    continue;
                }
                let Some(target) = &import.resolved else {
                    continue;
                };
                if import.names.is_empty() {
                    modules_entry.insert(import.module.clone(), target.clone());
                    continue;
                }
                for name in &import.names {
                    let key = name.alias.clone().unwrap_or_else(|| name.name.clone());
                    if name.name == "*" || name.name == "default" || name.name == import.module {
                        modules_entry.insert(key, target.clone());
                        continue;
                    }
                    let simple = name.name.rsplit('\\').next().unwrap_or(&name.name);
                    if let Some(target_module) = model.modules.get(target) {
                        if let Some(type_id) = target_module.types.iter().find(|id| {
                            model
                                .types
                                .get(id)
                                .map(|t| {
                                    t.name == name.name
                                        || t.name.rsplit('\\').next() == Some(simple)
                                })
                                .unwrap_or(false)
                        }) {
                            types_entry.insert(key, type_id.clone());
                            continue;
                        }
                        if let Some(fn_id) = target_module.functions.iter().find(|id| {
                            model.routines.get(id).map(|r| r.name == name.name) == Some(true)
                        }) {
                            fns_entry.insert(key, fn_id.clone());
                        }
                    }
                }
            }
            // PHP `use A\B` has its binding in `names[0]` with the full path.
            if let Some(module_entity) = model.modules.get(&module.id) {
                if module_entity.language == Language::Php {
                    for import in &module_entity.imports {
                        let Some(target) = &import.resolved else {
                            continue;
                        };
                        let qualified = import.module.trim_start_matches('\\');
                        let simple = qualified.rsplit('\\').next().unwrap_or(qualified);
                        let key = import
                            .names
                            .first()
                            .and_then(|n| n.alias.clone())
                            .unwrap_or_else(|| simple.to_string());
                        if let Some(target_module) = model.modules.get(target) {
                            if let Some(type_id) = target_module.types.iter().find(|id| {
                                model.types.get(id).map(|t| t.name == simple) == Some(true)
                            }) {
                                types_entry.insert(key, type_id.clone());
                            }
                        }
                    }
                }
            }
            resolver.imported_types.insert(module.id.clone(), types_entry);
            resolver.imported_fns.insert(module.id.clone(), fns_entry);
        }
        resolver
    }

    /// Resolve every call site of every routine once, up front. The same
    /// table then drives entry detection and trace expansion.
    fn resolve_all(&self) -> BTreeMap<EntityId, Vec<ResolvedSite>> {
        let mut out = BTreeMap::new();
        for routine in self.model.routines.values() {
            let sites = routine
                .calls
                .iter()
                .map(|site| ResolvedSite {
                    line: site.line,
                    target: self.resolve_site(routine, &site.callee, site.receiver.as_deref()),
                })
                .collect();
            out.insert(routine.id.clone(), sites);
        }
        out
    }

    fn module_of(&self, routine: &Routine) -> EntityId {
        match &routine.owner {
            RoutineOwner::Module(id) => id.clone(),
            RoutineOwner::Type(id) => self.model.types[id].module.clone(),
        }
    }

    fn language_of(&self, module_id: &EntityId) -> Option<Language> {
        self.model.modules.get(module_id).map(|m| m.language)
    }

    /// The constructor routine of a type, by its language's name.
    fn constructor_of(&self, type_id: &EntityId) -> Option<EntityId> {
        for name in ["__init__", "__construct", "constructor"] {
            if let Some((id, _)) = self.model.resolve_method(type_id, name) {
                return Some(id);
            }
        }
        None
    }

    /// Resolve a method against a type's MRO, attaching the left-most-base
    /// note when the match came from one of several bases.
    fn method_in(&self, type_id: &EntityId, name: &str) -> Option<(EntityId, Option<String>)> {
        let (id, from_base) = self.model.resolve_method(type_id, name)?;
        let note = if from_base {
            let base_count = self
                .model
                .types
                .get(type_id)
                .map(|t| t.bases.len())
                .unwrap_or(0);
            if base_count > 1 {
                Some("left-most base wins".to_string())
            } else {
                None
            }
        } else {
            None
        };
        Some((id, note))
    }

    /// Resolution cascade for one call site.
    fn resolve_site(
        &self,
        caller: &Routine,
        callee: &str,
        receiver: Option<&str>,
    ) -> ResolvedTarget {
        let module_id = self.module_of(caller);
        let caller_language = self.language_of(&module_id);
        let method_name = callee
            .rsplit(['.', ':'])
            .next()
            .map(|n| n.rsplit("->").next().unwrap_or(n))
            .unwrap_or(callee)
            .to_string();
        let external = || ResolvedTarget::External(callee.to_string());

        let check_language = |id: EntityId, note: Option<String>| {
            // Calls are never followed across language boundaries, even when
            // an import appears to link them.
            let target_module = match &self.model.routines[&id].owner {
                RoutineOwner::Module(m) => m.clone(),
                RoutineOwner::Type(t) => self.model.types[t].module.clone(),
            };
            if self.language_of(&target_module).map(|l| l.frontend_family())
                == caller_language.map(|l| l.frontend_family())
            {
                ResolvedTarget::Routine(id, note)
            } else {
                ResolvedTarget::External(callee.to_string())
            }
        };

        match receiver {
            None => {
                // (a) direct name in the enclosing scope: local wins over
                // imported.
                if let Some(id) = self.module_fns.get(&(module_id.clone(), method_name.clone())) {
                    return check_language(id.clone(), None);
                }
                if let Some(type_id) =
                    self.module_types.get(&(module_id.clone(), method_name.clone()))
                {
                    return match self.constructor_of(type_id) {
                        Some(id) => check_language(id, None),
                        None => external(),
                    };
                }
                if let Some(id) = self
                    .imported_fns
                    .get(&module_id)
                    .and_then(|m| m.get(&method_name))
                {
                    return check_language(id.clone(), None);
                }
                if let Some(type_id) = self
                    .imported_types
                    .get(&module_id)
                    .and_then(|m| m.get(&method_name))
                {
                    return match self.constructor_of(type_id) {
                        Some(id) => check_language(id, None),
                        None => external(),
                    };
                }
                external()
            }
            Some(receiver) => {
                // (b) the owner type for `self` / `this` / `$this` / `cls`.
                if matches!(receiver, "self" | "this" | "$this" | "cls") {
                    if let RoutineOwner::Type(owner) = &caller.owner {
                        if let Some((id, note)) = self.method_in(owner, &method_name) {
                            return check_language(id, note);
                        }
                    }
                    return external();
                }

                // An attribute of the owner: `self.engine.start()`.
                let attr_name = receiver
                    .strip_prefix("self.")
                    .or_else(|| receiver.strip_prefix("this."))
                    .or_else(|| receiver.strip_prefix("$this->"));
                if let Some(attr_name) = attr_name {
                    if attr_name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                        if let RoutineOwner::Type(owner) = &caller.owner {
                            if let Some(type_id) = self.attribute_type(owner, attr_name) {
                                if let Some((id, note)) = self.method_in(&type_id, &method_name) {
                                    return check_language(id, note);
                                }
                            }
                        }
                    }
                    return external();
                }

                if !receiver.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$') {
                    return external();
                }
                let bare = receiver.trim_start_matches('$');

                // An imported module used as a receiver: `osp.join()`.
                if let Some(target_module) = self
                    .imported_modules
                    .get(&module_id)
                    .and_then(|m| m.get(bare))
                {
                    if let Some(id) = self
                        .module_fns
                        .get(&(target_module.clone(), method_name.clone()))
                    {
                        return check_language(id.clone(), None);
                    }
                    return external();
                }

                // (c) a receiver with a declared or evident type: parameter
                // annotations, then local constructor assignments/annotations.
                let receiver_type = caller
                    .params
                    .iter()
                    .find(|p| p.name == bare)
                    .and_then(|p| p.ty.as_ref())
                    .and_then(|t| t.target.entity().cloned())
                    .or_else(|| {
                        caller
                            .locals
                            .iter()
                            .find(|l| l.name == bare)
                            .and_then(|l| l.ty.target.entity().cloned())
                    })
                    .or_else(|| {
                        // A type used as receiver: static/class-level calls.
                        self.module_types
                            .get(&(module_id.clone(), bare.to_string()))
                            .cloned()
                            .or_else(|| {
                                self.imported_types
                                    .get(&module_id)
                                    .and_then(|m| m.get(bare))
                                    .cloned()
                            })
                    });

                match receiver_type {
                    Some(type_id) => match self.method_in(&type_id, &method_name) {
                        Some((id, note)) => check_language(id, note),
                        None => external(),
                    },
                    None => external(),
                }
            }
        }
    }

    /// The declared or evident type of an attribute, searched along the MRO.
    fn attribute_type(&self, owner: &EntityId, attr_name: &str) -> Option<EntityId> {
        for candidate in self.model.mro(owner) {
            let decl = self.model.types.get(&candidate)?;
            for attr_id in &decl.attributes {
                let Some(attribute) = self.model.attributes.get(attr_id) else {
                    continue;
                };
                if attribute.name != attr_name {
                    continue;
                }
                if let Some(ty) = &attribute.declared_type {
                    if let Some(id) = ty.target.entity() {
                        return Some(id.clone());
                    }
                }
                if let Some(crate::model::AttrInit::Constructed { ty }) = &attribute.init {
                    if let Some(id) = ty.target.entity() {
                        return Some(id.clone());
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder;
    use crate::model::{AttributeKind, Language, RoutineKind, TypeKind};
    use crate::record::{
        FileRecord, RawAttrInit, RawAttribute, RawParam, RawRoutine, RawTypeDecl,
    };

    fn chain_record(names: &[&str]) -> FileRecord {
        // a calls b calls c … the last one is a leaf.
        let mut record = FileRecord::new("chain.py", Language::Python, "chain");
        for (index, window) in names.windows(2).enumerate() {
            let mut routine = RawRoutine::new(
                window[0],
                RoutineKind::Function,
                (index as u32 * 3 + 1, index as u32 * 3 + 2),
            );
            routine.calls.push(crate::model::CallSite {
                callee: window[1].to_string(),
                receiver: None,
                line: index as u32 * 3 + 1,
            });
            record.routines.push(routine);
        }
        record.routines.push(RawRoutine::new(
            *names.last().unwrap(),
            RoutineKind::Function,
            (50, 51),
        ));
        record
    }

    fn run(model: &mut SemanticModel, config: &FlowConfig) {
        let cancel = CancellationToken::new();
        assert!(analyze(model, config, &cancel));
    }

    #[test]
    fn depth_bounded_chain() {
        let record = chain_record(&["a", "b", "c", "d", "e", "f"]);
        let mut diagnostics = Vec::new();
        let mut model = builder::build(&[record], &mut diagnostics).unwrap();
        let config = FlowConfig {
            max_depth: 3,
            entry_points: None,
        };
        run(&mut model, &config);

        assert_eq!(model.flows.len(), 1, "only `a` has no callers");
        let entry = &model.flows[0];
        assert_eq!(model.routines[&entry.routine_id].name, "a");
        assert_eq!(entry.traces.len(), 1);

        let trace = &entry.traces[0];
        assert_eq!(trace.terminal, Terminal::DepthLimit);
        assert_eq!(trace.hops.len(), 3);
        let hop_names: Vec<String> = trace
            .hops
            .iter()
            .map(|h| match &h.callee {
                EntityRef::Entity(id) => model.routines[id].name.clone(),
                EntityRef::External(text) => text.clone(),
            })
            .collect();
        assert_eq!(hop_names, vec!["b", "c", "d"]);
        assert!(trace.hops[..2].iter().all(|h| h.terminal.is_none()));
        assert_eq!(trace.hops[2].terminal, Some(Terminal::DepthLimit));
    }

    #[test]
    fn leaf_and_unresolved_terminals() {
        let mut record = FileRecord::new("m.py", Language::Python, "m");
        let mut main = RawRoutine::new("main", RoutineKind::Function, (1, 4));
        main.calls.push(crate::model::CallSite {
            callee: "helper".to_string(),
            receiver: None,
            line: 2,
        });
        main.calls.push(crate::model::CallSite {
            callee: "missing".to_string(),
            receiver: None,
            line: 3,
        });
        record.routines.push(main);
        record
            .routines
            .push(RawRoutine::new("helper", RoutineKind::Function, (6, 7)));

        let mut diagnostics = Vec::new();
        let mut model = builder::build(&[record], &mut diagnostics).unwrap();
        run(&mut model, &FlowConfig::default());

        let entry = &model.flows[0];
        assert_eq!(entry.traces.len(), 2, "one trace per call site");
        assert_eq!(entry.traces[0].terminal, Terminal::Leaf);
        assert_eq!(entry.traces[1].terminal, Terminal::Unresolved);
        match &entry.traces[1].hops[0].callee {
            EntityRef::External(text) => assert_eq!(text, "missing"),
            other => panic!("expected external callee, got {other:?}"),
        }
    }

    #[test]
    fn cycles_break_and_do_not_recurse() {
        let mut record = FileRecord::new("m.py", Language::Python, "m");
        let mut ping = RawRoutine::new("ping", RoutineKind::Function, (1, 2));
        ping.calls.push(crate::model::CallSite {
            callee: "pong".to_string(),
            receiver: None,
            line: 1,
        });
        let mut pong = RawRoutine::new("pong", RoutineKind::Function, (4, 5));
        pong.calls.push(crate::model::CallSite {
            callee: "ping".to_string(),
            receiver: None,
            line: 4,
        });
        record.routines.push(ping);
        record.routines.push(pong);

        let mut diagnostics = Vec::new();
        let mut model = builder::build(&[record], &mut diagnostics).unwrap();
        let config = FlowConfig {
            max_depth: 10,
            entry_points: Some(vec![EntryPointSpec::Function {
                module: "m".to_string(),
                function: "ping".to_string(),
            }]),
        };
        run(&mut model, &config);

        let trace = &model.flows[0].traces[0];
        assert_eq!(trace.terminal, Terminal::CycleBreak);
        assert_eq!(trace.hops.len(), 2);
    }

    #[test]
    fn method_resolution_through_receiver_attribute() {
        let mut record = FileRecord::new("car.py", Language::Python, "car");
        let mut engine = RawTypeDecl::new("Engine", TypeKind::Class, (1, 4));
        engine
            .methods
            .push(RawRoutine::new("start", RoutineKind::Method, (2, 3)));
        record.types.push(engine);

        let mut car = RawTypeDecl::new("Car", TypeKind::Class, (6, 14));
        let mut engine_attr = RawAttribute::new("engine", AttributeKind::Instance, 8);
        engine_attr.init = Some(RawAttrInit::Constructed {
            ty: "Engine".to_string(),
        });
        car.attributes.push(engine_attr);
        let mut drive = RawRoutine::new("drive", RoutineKind::Method, (10, 13));
        drive.receiver = Some(crate::model::Receiver::Instance);
        drive.calls.push(crate::model::CallSite {
            callee: "self.engine.start".to_string(),
            receiver: Some("self.engine".to_string()),
            line: 11,
        });
        car.methods.push(drive);
        record.types.push(car);

        let mut diagnostics = Vec::new();
        let mut model = builder::build(&[record], &mut diagnostics).unwrap();
        run(&mut model, &FlowConfig::default());

        let entry = model
            .flows
            .iter()
            .find(|f| model.routines[&f.routine_id].name == "drive")
            .expect("drive is an entry");
        let trace = &entry.traces[0];
        assert_eq!(trace.terminal, Terminal::Leaf);
        match &trace.hops[0].callee {
            EntityRef::Entity(id) => assert_eq!(model.routines[id].name, "start"),
            other => panic!("expected resolved callee, got {other:?}"),
        }
    }

    #[test]
    fn inherited_method_resolves_via_mro() {
        let mut record = FileRecord::new("m.py", Language::Python, "m");
        let mut base = RawTypeDecl::new("Base", TypeKind::Class, (1, 4));
        base.methods
            .push(RawRoutine::new("greet", RoutineKind::Method, (2, 3)));
        record.types.push(base);

        let mut child = RawTypeDecl::new("Child", TypeKind::Class, (6, 10));
        child.bases.push("Base".to_string());
        let mut hello = RawRoutine::new("hello", RoutineKind::Method, (7, 9));
        hello.receiver = Some(crate::model::Receiver::Instance);
        hello.calls.push(crate::model::CallSite {
            callee: "self.greet".to_string(),
            receiver: Some("self".to_string()),
            line: 8,
        });
        child.methods.push(hello);
        record.types.push(child);

        let mut diagnostics = Vec::new();
        let mut model = builder::build(&[record], &mut diagnostics).unwrap();
        run(&mut model, &FlowConfig::default());

        let entry = model
            .flows
            .iter()
            .find(|f| model.routines[&f.routine_id].name == "hello")
            .expect("hello is an entry");
        match &entry.traces[0].hops[0].callee {
            EntityRef::Entity(id) => assert_eq!(model.routines[id].name, "greet"),
            other => panic!("expected greet, got {other:?}"),
        }
    }

    #[test]
    fn cancellation_marks_run_incomplete() {
        let record = chain_record(&["a", "b"]);
        let mut diagnostics = Vec::new();
        let mut model = builder::build(&[record], &mut diagnostics).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!analyze(&mut model, &FlowConfig::default(), &cancel));
        assert!(model.flows.is_empty());
    }
}

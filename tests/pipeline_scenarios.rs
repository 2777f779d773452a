//! End-to-end pipeline scenarios over temporary fixture trees: entity
//! extraction, cross-file resolution, relationship rules, bounded flows,
//! multi-language aggregation, and degraded-mode behaviour.

use std::fs;
use std::path::Path;

use anyhow::Result;
use codeatlas::model::{EdgeKind, EntityRef, Terminal};
use codeatlas::{analyse, AnalysisConfig, DiagnosticCategory};
use tempfile::TempDir;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn type_name(result: &codeatlas::AnalysisResult, reference: &EntityRef) -> String {
    match reference {
        EntityRef::Entity(id) => result.model.types[id].name.clone(),
        EntityRef::External(text) => format!("external:{text}"),
    }
}

// =============================================================================
// Single-language inheritance
// =============================================================================

#[tokio::test]
async fn single_file_inheritance() -> Result<()> {
    init_logging();
    let dir = TempDir::new()?;
    write(dir.path(), "shapes.py", "class A:\n    pass\n\nclass B(A):\n    pass\n");

    let result = analyse(dir.path(), AnalysisConfig::default()).await?;
    assert!(result.complete);
    assert_eq!(result.model.types.len(), 2);

    let inherits: Vec<_> = result.edges_of(EdgeKind::Inherits).collect();
    assert_eq!(inherits.len(), 1);
    assert_eq!(type_name(&result, &inherits[0].target), "A");
    assert_eq!(result.model.types[&inherits[0].source].name, "B");

    for kind in [EdgeKind::Composes, EdgeKind::Aggregates, EdgeKind::Associates] {
        assert_eq!(result.edges_of(kind).count(), 0, "no {kind} edges expected");
    }
    for decl in result.model.types.values() {
        assert!(decl.methods.is_empty());
    }
    Ok(())
}

// =============================================================================
// Cross-file resolution
// =============================================================================

#[tokio::test]
async fn cross_file_import_and_inheritance() -> Result<()> {
    let dir = TempDir::new()?;
    write(dir.path(), "m/__init__.py", "");
    write(dir.path(), "m/a.py", "class A:\n    pass\n");
    write(
        dir.path(),
        "m/b.py",
        "from .a import A\n\nclass B(A):\n    pass\n",
    );

    let result = analyse(dir.path(), AnalysisConfig::default()).await?;

    let imports: Vec<_> = result.edges_of(EdgeKind::Imports).collect();
    assert_eq!(imports.len(), 1);
    assert_eq!(result.model.modules[&imports[0].source].path, "m/b.py");
    match &imports[0].target {
        EntityRef::Entity(id) => assert_eq!(result.model.modules[id].path, "m/a.py"),
        other => panic!("imports edge should resolve, got {other:?}"),
    }

    let inherits: Vec<_> = result.edges_of(EdgeKind::Inherits).collect();
    assert_eq!(inherits.len(), 1);
    assert!(
        !inherits[0].target.is_external(),
        "B's base must resolve to the identifier of A, not External"
    );
    assert_eq!(type_name(&result, &inherits[0].target), "A");
    Ok(())
}

// =============================================================================
// Composition vs aggregation
// =============================================================================

const CARS_PY: &str = r#"class Engine:
    def start(self):
        pass


class Driver:
    pass


class Car:
    def __init__(self, driver: Driver):
        self.engine = Engine()
        self.driver = driver

    def drive(self, speed):
        self.engine.start()
"#;

#[tokio::test]
async fn composition_vs_aggregation() -> Result<()> {
    let dir = TempDir::new()?;
    write(dir.path(), "cars.py", CARS_PY);

    let result = analyse(dir.path(), AnalysisConfig::default()).await?;

    let composes: Vec<_> = result
        .edges_of(EdgeKind::Composes)
        .map(|e| {
            (
                result.model.types[&e.source].name.clone(),
                type_name(&result, &e.target),
            )
        })
        .collect();
    assert_eq!(composes, vec![("Car".to_string(), "Engine".to_string())]);

    let aggregates: Vec<_> = result
        .edges_of(EdgeKind::Aggregates)
        .map(|e| {
            (
                result.model.types[&e.source].name.clone(),
                type_name(&result, &e.target),
            )
        })
        .collect();
    assert_eq!(aggregates, vec![("Car".to_string(), "Driver".to_string())]);

    // No further relationship edges among the three types.
    assert_eq!(result.edges_of(EdgeKind::Associates).count(), 0);
    Ok(())
}

// =============================================================================
// Depth-bounded flow
// =============================================================================

#[tokio::test]
async fn depth_bounded_flow_trace() -> Result<()> {
    let dir = TempDir::new()?;
    write(
        dir.path(),
        "chain.py",
        "def a():\n    b()\n\ndef b():\n    c()\n\ndef c():\n    d()\n\ndef d():\n    e()\n\ndef e():\n    f()\n\ndef f():\n    pass\n",
    );

    let mut config = AnalysisConfig::default();
    config.flow.max_depth = 3;
    let result = analyse(dir.path(), config).await?;

    assert_eq!(result.flows().len(), 1, "only `a` is uncalled");
    let entry = &result.flows()[0];
    assert_eq!(result.model.routines[&entry.routine_id].name, "a");
    assert_eq!(entry.traces.len(), 1);

    let trace = &entry.traces[0];
    assert_eq!(trace.terminal, Terminal::DepthLimit);
    let hops: Vec<(String, String)> = trace
        .hops
        .iter()
        .map(|h| {
            let caller = result.model.routines[&h.caller].name.clone();
            let callee = match &h.callee {
                EntityRef::Entity(id) => result.model.routines[id].name.clone(),
                EntityRef::External(text) => text.clone(),
            };
            (caller, callee)
        })
        .collect();
    assert_eq!(
        hops,
        vec![
            ("a".to_string(), "b".to_string()),
            ("b".to_string(), "c".to_string()),
            ("c".to_string(), "d".to_string()),
        ]
    );
    assert!(trace.hops.iter().all(|h| h.depth <= 3));
    Ok(())
}

// =============================================================================
// Multi-language aggregation (stub helper stands in for Node)
// =============================================================================

#[cfg(unix)]
#[tokio::test]
async fn multi_language_projects_share_one_result() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new()?;
    write(dir.path(), "app.py", "class PyThing:\n    pass\n");
    write(dir.path(), "web/car.ts", "export class Car {}\n");

    // A protocol-conformant stand-in for the Node helper: one canned tree
    // per request, ids assigned in request order.
    let stub = dir.path().join("helper-stub.sh");
    fs::write(
        &stub,
        "#!/bin/sh\necho '{\"ok\":true,\"ready\":true}'\nn=0\nwhile IFS= read -r line; do\n  n=$((n+1))\n  printf '{\"ok\":true,\"id\":%d,\"tree\":{\"classes\":[{\"name\":\"Car\",\"line\":1,\"end_line\":1,\"methods\":[],\"properties\":[]}]}}\\n' \"$n\"\ndone\n",
    )?;
    fs::set_permissions(&stub, fs::Permissions::from_mode(0o755))?;

    let mut config = AnalysisConfig::default();
    config.js_helper.command = stub.to_string_lossy().into_owned();
    let result = analyse(dir.path(), config).await?;

    let names: Vec<&str> = result
        .model
        .types
        .values()
        .map(|t| t.name.as_str())
        .collect();
    assert!(names.contains(&"PyThing"));
    assert!(names.contains(&"Car"));

    // Identifiers namespace the two languages by file path.
    let ids: Vec<&str> = result.model.types.keys().map(|k| k.as_str()).collect();
    assert!(ids.iter().any(|id| id.contains("app.py")));
    assert!(ids.iter().any(|id| id.contains("web/car.ts")));

    // No cross-language edges.
    for edge in result.model.relationships.edges() {
        if let EntityRef::Entity(target) = &edge.target {
            let source_lang = entity_language(&result, &edge.source);
            let target_lang = entity_language(&result, target);
            assert_eq!(source_lang, target_lang, "cross-language edge inferred");
        }
    }
    Ok(())
}

#[cfg(unix)]
fn entity_language(
    result: &codeatlas::AnalysisResult,
    id: &codeatlas::model::EntityId,
) -> codeatlas::model::Language {
    if let Some(module) = result.model.modules.get(id) {
        return module.language;
    }
    if let Some(decl) = result.model.types.get(id) {
        return result.model.modules[&decl.module].language;
    }
    panic!("unknown entity {id}");
}

// =============================================================================
// Degraded JS
// =============================================================================

#[tokio::test]
async fn missing_helper_degrades_js_frontend() -> Result<()> {
    init_logging();
    let dir = TempDir::new()?;
    write(dir.path(), "app.py", "class PyThing:\n    pass\n");
    write(dir.path(), "a.ts", "export class Widget {}\n");
    write(dir.path(), "b.ts", "export class Gadget {}\n");

    let mut config = AnalysisConfig::default();
    config.js_helper.command = "definitely-not-a-real-binary".to_string();
    let result = analyse(dir.path(), config).await?;

    assert!(result.complete, "the run completes despite the missing helper");
    let helper_diags: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| d.category == DiagnosticCategory::HelperUnavailable)
        .collect();
    assert_eq!(helper_diags.len(), 1, "exactly one HelperUnavailable entry");

    // No TS entities, and no per-file parse failures for the TS files.
    assert!(result
        .model
        .types
        .values()
        .all(|t| t.name != "Widget" && t.name != "Gadget"));
    assert_eq!(
        result
            .diagnostics
            .iter()
            .filter(|d| d.category == DiagnosticCategory::ParseFailure)
            .count(),
        0
    );

    // Other languages analyse normally.
    assert!(result.model.types.values().any(|t| t.name == "PyThing"));
    Ok(())
}

// =============================================================================
// Fault tolerance and determinism
// =============================================================================

#[tokio::test]
async fn one_invalid_file_fails_alone() -> Result<()> {
    let dir = TempDir::new()?;
    write(dir.path(), "good.py", "class Fine:\n    pass\n");
    write(dir.path(), "bad.py", "def broken(:\n");

    let result = analyse(dir.path(), AnalysisConfig::default()).await?;

    let parse_failures: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| d.category == DiagnosticCategory::ParseFailure)
        .collect();
    assert_eq!(parse_failures.len(), 1);
    assert_eq!(parse_failures[0].path.as_deref(), Some("bad.py"));

    assert_eq!(result.model.modules.len(), 1);
    assert!(result.model.types.values().any(|t| t.name == "Fine"));
    assert_eq!(result.summary.files_failed, 1);
    assert_eq!(result.summary.files_parsed, 1);
    Ok(())
}

#[tokio::test]
async fn two_runs_serialise_identically() -> Result<()> {
    let dir = TempDir::new()?;
    write(dir.path(), "m/__init__.py", "");
    write(dir.path(), "m/a.py", "class A:\n    pass\n");
    write(
        dir.path(),
        "m/b.py",
        "from .a import A\n\nclass B(A):\n    def run(self):\n        self.helper()\n\n    def helper(self):\n        pass\n",
    );
    write(dir.path(), "cars.py", CARS_PY);

    let first = analyse(dir.path(), AnalysisConfig::default()).await?.to_json()?;
    let second = analyse(dir.path(), AnalysisConfig::default()).await?.to_json()?;
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn identifiers_are_unique_and_owned_once() -> Result<()> {
    let dir = TempDir::new()?;
    write(dir.path(), "cars.py", CARS_PY);
    write(
        dir.path(),
        "garage.py",
        "from cars import Car\n\nclass Garage:\n    def admit(self, car: Car):\n        car.drive(10)\n",
    );

    let result = analyse(dir.path(), AnalysisConfig::default()).await?;

    let mut seen = std::collections::BTreeSet::new();
    for id in result
        .ids_of(codeatlas::model::EntityKind::Module)
        .into_iter()
        .chain(result.ids_of(codeatlas::model::EntityKind::Type))
        .chain(result.ids_of(codeatlas::model::EntityKind::Routine))
        .chain(result.ids_of(codeatlas::model::EntityKind::Attribute))
    {
        assert!(seen.insert(id.clone()), "duplicate identifier {id}");
    }

    // Ownership exclusivity: every routine appears in exactly one list.
    let mut owned = std::collections::BTreeMap::new();
    for module in result.model.modules.values() {
        for id in &module.functions {
            *owned.entry(id.clone()).or_insert(0usize) += 1;
        }
    }
    for decl in result.model.types.values() {
        for id in &decl.methods {
            *owned.entry(id.clone()).or_insert(0usize) += 1;
        }
    }
    for routine_id in result.model.routines.keys() {
        assert_eq!(owned.get(routine_id), Some(&1), "routine {routine_id} ownership");
    }

    // Edge referential integrity.
    for edge in result.model.relationships.edges() {
        assert!(result.model.contains(&edge.source));
        if let EntityRef::Entity(target) = &edge.target {
            assert!(result.model.contains(target), "dangling edge target {target}");
        }
    }
    Ok(())
}

// =============================================================================
// PHP front-end through the full pipeline
// =============================================================================

#[cfg(feature = "php-ast")]
#[tokio::test]
async fn php_project_relationships() -> Result<()> {
    let dir = TempDir::new()?;
    write(
        dir.path(),
        "src/Engine.php",
        "<?php\nnamespace App;\n\nclass Engine {\n    public function start(): bool {\n        return true;\n    }\n}\n",
    );
    write(
        dir.path(),
        "src/Car.php",
        "<?php\nnamespace App;\n\nuse App\\Engine;\n\nclass Car {\n    private Engine $engine;\n\n    public function __construct() {\n        $this->engine = new Engine();\n    }\n\n    public function drive(): void {\n        $this->engine->start();\n    }\n}\n",
    );

    let result = analyse(dir.path(), AnalysisConfig::default()).await?;

    let composes: Vec<_> = result.edges_of(EdgeKind::Composes).collect();
    assert_eq!(composes.len(), 1);
    assert_eq!(result.model.types[&composes[0].source].name, "Car");
    assert_eq!(type_name(&result, &composes[0].target), "Engine");

    let imports: Vec<_> = result.edges_of(EdgeKind::Imports).collect();
    assert_eq!(imports.len(), 1);

    // drive() is public and uncalled: it seeds a flow ending in Engine::start.
    let entry = result
        .flows()
        .iter()
        .find(|f| result.model.routines[&f.routine_id].name == "drive")
        .expect("drive seeds a flow");
    let trace = &entry.traces[0];
    assert_eq!(trace.terminal, Terminal::Leaf);
    match &trace.hops[0].callee {
        EntityRef::Entity(id) => assert_eq!(result.model.routines[id].name, "start"),
        other => panic!("expected resolved hop, got {other:?}"),
    }
    Ok(())
}

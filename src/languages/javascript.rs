use std::io::Write;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use super::{content_hash, FrontEnd, FrontEndFailure, FrontEndOptions};
use crate::config::HelperConfig;
use crate::model::{
    AttributeKind, CallSite, Decorator, ImportShape, ImportedName, Language, ModuleConstant,
    Receiver, RoutineKind, TypeKind, Visibility,
};
use crate::record::{
    FileRecord, RawAttrInit, RawAttribute, RawImport, RawLocalHint, RawParam, RawRoutine,
    RawTypeDecl,
};
use crate::walker::WalkedFile;

const HELPER_SCRIPT: &str = include_str!("js_helper.js");

/// JS/TS front-end.
///
/// Parsing is delegated to an out-of-process Node helper speaking one JSON
/// request per file over stdin/stdout. The helper is launched once per
/// analysis pass and reused; when it cannot be launched the front-end is
/// disabled for the run and the pipeline records a single diagnostic.
pub struct JavaScriptFrontEnd {
    options: FrontEndOptions,
    config: HelperConfig,
    state: HelperState,
}

enum HelperState {
    Untried,
    Ready(JsHelper),
    Unavailable,
}

impl JavaScriptFrontEnd {
    pub fn new(options: FrontEndOptions, config: HelperConfig) -> Self {
        Self {
            options,
            config,
            state: HelperState::Untried,
        }
    }

    /// Launch the helper if that has not been attempted yet. Called by the
    /// pipeline at the start of the Parse phase; an error here disables the
    /// front-end (degraded, not fatal).
    pub async fn ensure_available(&mut self) -> std::result::Result<(), String> {
        if matches!(self.state, HelperState::Untried) {
            match JsHelper::launch(&self.config).await {
                Ok(helper) => {
                    debug!(command = %self.config.command, "JS helper ready");
                    self.state = HelperState::Ready(helper);
                }
                Err(message) => {
                    warn!(command = %self.config.command, %message, "JS helper unavailable");
                    self.state = HelperState::Unavailable;
                    return Err(message);
                }
            }
        }
        match self.state {
            HelperState::Unavailable => Err("helper unavailable".to_string()),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl FrontEnd for JavaScriptFrontEnd {
    fn name(&self) -> &'static str {
        "javascript"
    }

    async fn parse_file(
        &mut self,
        source: &str,
        file: &WalkedFile,
    ) -> std::result::Result<FileRecord, FrontEndFailure> {
        let helper = match &mut self.state {
            HelperState::Ready(helper) => helper,
            _ => return Err(FrontEndFailure::parse("helper not available")),
        };
        let typescript = file.language == Language::TypeScript;
        let jsx = file.relative.ends_with("jsx") || file.relative.ends_with("tsx");
        let tree = helper
            .request(&file.relative, source, typescript, jsx)
            .await
            .map_err(FrontEndFailure::parse)?;

        let mut record = interpret(&tree, &file.relative, file.language, self.options);
        record.content_hash = content_hash(source);
        Ok(record)
    }

    async fn shutdown(&mut self) {
        if let HelperState::Ready(helper) = &mut self.state {
            helper.shutdown().await;
        }
        self.state = HelperState::Untried;
    }
}

/// The helper process plus its line-delimited JSON channel.
struct JsHelper {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    timeout: Duration,
    // Keeps the materialised script alive for the helper's lifetime.
    _script: tempfile::NamedTempFile,
}

#[derive(Serialize)]
struct HelperRequest<'a> {
    id: u64,
    path: &'a str,
    source: &'a str,
    typescript: bool,
    jsx: bool,
}

#[derive(Deserialize)]
struct HelperResponse {
    ok: bool,
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    ready: Option<bool>,
    #[serde(default)]
    tree: Option<JsTree>,
    #[serde(default)]
    error: Option<String>,
}

impl JsHelper {
    async fn launch(config: &HelperConfig) -> std::result::Result<Self, String> {
        let mut script = tempfile::Builder::new()
            .prefix("js-helper")
            .suffix(".js")
            .tempfile()
            .map_err(|e| format!("cannot materialise helper script: {e}"))?;
        script
            .write_all(HELPER_SCRIPT.as_bytes())
            .map_err(|e| format!("cannot write helper script: {e}"))?;

        let mut child = Command::new(&config.command)
            .arg(script.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("cannot spawn `{}`: {e}", config.command))?;

        let stdin = child.stdin.take().ok_or("helper stdin not captured")?;
        let stdout = child.stdout.take().ok_or("helper stdout not captured")?;
        let mut lines = BufReader::new(stdout).lines();

        let timeout = Duration::from_millis(config.timeout_ms);
        let ready = tokio::time::timeout(timeout, lines.next_line())
            .await
            .map_err(|_| "helper did not report readiness in time".to_string())
            .and_then(|r| r.map_err(|e| format!("helper readiness read failed: {e}")))
            .and_then(|line| line.ok_or_else(|| "helper exited before readiness".to_string()))?;

        let response: HelperResponse = serde_json::from_str(&ready)
            .map_err(|e| format!("malformed readiness line: {e}"))?;
        if !response.ok || response.ready != Some(true) {
            return Err(response
                .error
                .unwrap_or_else(|| "helper reported not ready".to_string()));
        }

        Ok(Self {
            child,
            stdin,
            lines,
            next_id: 0,
            timeout,
            _script: script,
        })
    }

    /// One synchronous request per file. An expired request only fails that
    /// file; stale responses are skipped by id on the next call.
    async fn request(
        &mut self,
        path: &str,
        source: &str,
        typescript: bool,
        jsx: bool,
    ) -> std::result::Result<JsTree, String> {
        self.next_id += 1;
        let id = self.next_id;
        let request = HelperRequest {
            id,
            path,
            source,
            typescript,
            jsx,
        };
        let mut payload = serde_json::to_string(&request).map_err(|e| e.to_string())?;
        payload.push('\n');

        let timeout = self.timeout;
        let exchange = async {
            self.stdin
                .write_all(payload.as_bytes())
                .await
                .map_err(|e| format!("helper write failed: {e}"))?;
            loop {
                let line = self
                    .lines
                    .next_line()
                    .await
                    .map_err(|e| format!("helper read failed: {e}"))?
                    .ok_or_else(|| "helper closed its stdout".to_string())?;
                let response: HelperResponse = match serde_json::from_str(&line) {
                    Ok(response) => response,
                    Err(_) => continue,
                };
                // A response from an earlier, timed-out request.
                if response.id.is_some() && response.id != Some(id) {
                    continue;
                }
                if !response.ok {
                    return Err(response
                        .error
                        .unwrap_or_else(|| "helper reported failure".to_string()));
                }
                return response.tree.ok_or_else(|| "response without tree".to_string());
            }
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| "helper request timed out".to_string())?
    }

    async fn shutdown(&mut self) {
        let _ = self.child.kill().await;
    }
}

// ---------------------------------------------------------------------------
// Normalised tree schema emitted by the helper.
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub(crate) struct JsTree {
    #[serde(default)]
    doc: Option<String>,
    #[serde(default)]
    imports: Vec<JsImport>,
    #[serde(default)]
    classes: Vec<JsClass>,
    #[serde(default)]
    interfaces: Vec<JsInterface>,
    #[serde(default)]
    enums: Vec<JsEnum>,
    #[serde(default)]
    functions: Vec<JsFunction>,
    #[serde(default)]
    constants: Vec<JsConstant>,
}

#[derive(Debug, Default, Deserialize)]
struct JsImport {
    module: String,
    #[serde(default)]
    names: Vec<JsImportName>,
    #[serde(default)]
    line: u32,
}

#[derive(Debug, Default, Deserialize)]
struct JsImportName {
    name: String,
    #[serde(default)]
    alias: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct JsDecorator {
    name: String,
    #[serde(default)]
    args: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct JsClass {
    name: String,
    #[serde(default)]
    line: u32,
    #[serde(default)]
    end_line: u32,
    #[serde(default)]
    doc: Option<String>,
    #[serde(rename = "abstract", default)]
    is_abstract: bool,
    #[serde(default)]
    extends: Option<String>,
    #[serde(default)]
    implements: Vec<String>,
    #[serde(default)]
    decorators: Vec<JsDecorator>,
    #[serde(default)]
    methods: Vec<JsMethod>,
    #[serde(default)]
    properties: Vec<JsProperty>,
}

#[derive(Debug, Default, Deserialize)]
struct JsMethod {
    name: String,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    line: u32,
    #[serde(default)]
    end_line: u32,
    #[serde(rename = "static", default)]
    is_static: bool,
    #[serde(rename = "async", default)]
    is_async: bool,
    #[serde(default)]
    generator: bool,
    #[serde(rename = "abstract", default)]
    is_abstract: bool,
    #[serde(default)]
    accessibility: Option<String>,
    #[serde(default)]
    doc: Option<String>,
    #[serde(default)]
    decorators: Vec<JsDecorator>,
    #[serde(default)]
    params: Vec<JsParam>,
    #[serde(default)]
    return_type: Option<String>,
    #[serde(default)]
    calls: Vec<JsCall>,
    #[serde(default)]
    locals: Vec<JsLocal>,
    #[serde(default)]
    assigns: Vec<JsAssign>,
}

#[derive(Debug, Default, Deserialize)]
struct JsParam {
    name: String,
    #[serde(default)]
    #[serde(rename = "type")]
    ty: Option<String>,
    #[serde(default)]
    default: bool,
    #[serde(default)]
    variadic: bool,
}

#[derive(Debug, Default, Deserialize)]
struct JsCall {
    callee: String,
    #[serde(default)]
    receiver: Option<String>,
    #[serde(default)]
    line: u32,
}

#[derive(Debug, Default, Deserialize)]
struct JsLocal {
    name: String,
    #[serde(default)]
    #[serde(rename = "type")]
    ty: Option<String>,
    #[serde(default)]
    line: u32,
}

#[derive(Debug, Default, Deserialize)]
struct JsAssign {
    name: String,
    #[serde(default)]
    line: u32,
    #[serde(default)]
    init_kind: Option<String>,
    #[serde(default)]
    init_type: Option<String>,
    #[serde(default)]
    param: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct JsProperty {
    name: String,
    #[serde(default)]
    #[serde(rename = "type")]
    ty: Option<String>,
    #[serde(default)]
    line: u32,
    #[serde(rename = "static", default)]
    is_static: bool,
    #[serde(default)]
    accessibility: Option<String>,
    #[serde(default)]
    init_kind: Option<String>,
    #[serde(default)]
    init_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct JsInterface {
    name: String,
    #[serde(default)]
    line: u32,
    #[serde(default)]
    end_line: u32,
    #[serde(default)]
    doc: Option<String>,
    #[serde(default)]
    extends: Vec<String>,
    #[serde(default)]
    properties: Vec<JsProperty>,
    #[serde(default)]
    methods: Vec<JsMethod>,
}

#[derive(Debug, Default, Deserialize)]
struct JsEnum {
    name: String,
    #[serde(default)]
    line: u32,
    #[serde(default)]
    end_line: u32,
    #[serde(default)]
    doc: Option<String>,
    #[serde(default)]
    members: Vec<JsEnumMember>,
}

#[derive(Debug, Default, Deserialize)]
struct JsEnumMember {
    name: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    line: u32,
}

#[derive(Debug, Default, Deserialize)]
struct JsFunction {
    name: String,
    #[serde(default)]
    line: u32,
    #[serde(default)]
    end_line: u32,
    #[serde(default)]
    doc: Option<String>,
    #[serde(rename = "async", default)]
    is_async: bool,
    #[serde(default)]
    generator: bool,
    #[serde(default)]
    arrow: bool,
    #[serde(default)]
    params: Vec<JsParam>,
    #[serde(default)]
    return_type: Option<String>,
    #[serde(default)]
    calls: Vec<JsCall>,
    #[serde(default)]
    locals: Vec<JsLocal>,
}

#[derive(Debug, Default, Deserialize)]
struct JsConstant {
    name: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    line: u32,
}

// ---------------------------------------------------------------------------
// Tree interpretation into the common record schema. Kept separate from the
// transport so it is testable without a Node runtime.
// ---------------------------------------------------------------------------

/// The effective module path: directory + filename, extension stripped.
fn module_name_of(relative: &str) -> String {
    match relative.rsplit_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => relative.to_string(),
    }
}

fn doc_of(raw: &Option<String>, options: FrontEndOptions) -> Option<crate::model::Doc> {
    if !options.detect_docstrings {
        return None;
    }
    raw.as_ref()
        .filter(|text| !text.trim().is_empty())
        .map(|text| crate::docparse::parse_doc(text))
}

fn visibility_of(accessibility: &Option<String>) -> Visibility {
    match accessibility.as_deref() {
        Some("private") => Visibility::Private,
        Some("protected") => Visibility::Protected,
        _ => Visibility::Public,
    }
}

fn decorators_of(raw: &[JsDecorator]) -> Vec<Decorator> {
    raw.iter()
        .map(|d| Decorator {
            name: d.name.clone(),
            args: d.args.clone(),
        })
        .collect()
}

fn params_of(raw: &[JsParam], options: FrontEndOptions) -> Vec<RawParam> {
    raw.iter()
        .filter(|p| p.name != "this")
        .map(|p| RawParam {
            name: p.name.clone(),
            ty: if options.detect_types {
                p.ty.clone()
            } else {
                None
            },
            has_default: p.default,
            variadic: p.variadic,
        })
        .collect()
}

fn calls_of(raw: &[JsCall]) -> Vec<CallSite> {
    raw.iter()
        .map(|c| CallSite {
            callee: c.callee.clone(),
            receiver: c.receiver.clone(),
            line: c.line,
        })
        .collect()
}

fn locals_of(raw: &[JsLocal], options: FrontEndOptions) -> Vec<RawLocalHint> {
    if !options.detect_types {
        return Vec::new();
    }
    raw.iter()
        .filter_map(|l| {
            l.ty.as_ref().map(|ty| RawLocalHint {
                name: l.name.clone(),
                ty: ty.clone(),
                line: l.line,
            })
        })
        .collect()
}

fn method_of(raw: &JsMethod, options: FrontEndOptions) -> RawRoutine {
    let mut routine = RawRoutine::new(&raw.name, RoutineKind::Method, (raw.line, raw.end_line));
    routine.visibility = visibility_of(&raw.accessibility);
    routine.flags.is_static = raw.is_static;
    routine.flags.is_async = raw.is_async;
    routine.flags.is_generator = raw.generator;
    routine.flags.is_abstract = raw.is_abstract;
    if !raw.is_static {
        routine.receiver = Some(Receiver::Instance);
    }
    routine.params = params_of(&raw.params, options);
    if options.detect_types {
        routine.return_type = raw.return_type.clone();
    }
    routine.doc = doc_of(&raw.doc, options);
    routine.decorators = decorators_of(&raw.decorators);
    routine.calls = calls_of(&raw.calls);
    routine.locals = locals_of(&raw.locals, options);
    routine
}

pub(crate) fn interpret(
    tree: &JsTree,
    relative: &str,
    language: Language,
    options: FrontEndOptions,
) -> FileRecord {
    let mut record = FileRecord::new(relative, language, module_name_of(relative));
    record.doc = doc_of(&tree.doc, options);

    for import in &tree.imports {
        let names: Vec<ImportedName> = import
            .names
            .iter()
            .map(|n| ImportedName {
                name: n.name.clone(),
                alias: n.alias.clone(),
            })
            .collect();
        record.imports.push(RawImport {
            module: import.module.clone(),
            shape: if names.is_empty() {
                ImportShape::Plain
            } else {
                ImportShape::Named
            },
            names,
            line: import.line,
        });
    }

    for constant in &tree.constants {
        record.constants.push(ModuleConstant {
            name: constant.name.clone(),
            value: constant.value.clone(),
            line: constant.line,
        });
    }

    for function in &tree.functions {
        let kind = if function.arrow {
            RoutineKind::Lambda
        } else {
            RoutineKind::Function
        };
        let mut routine = RawRoutine::new(&function.name, kind, (function.line, function.end_line));
        routine.flags.is_async = function.is_async;
        routine.flags.is_generator = function.generator;
        routine.params = params_of(&function.params, options);
        if options.detect_types {
            routine.return_type = function.return_type.clone();
        }
        routine.doc = doc_of(&function.doc, options);
        routine.calls = calls_of(&function.calls);
        routine.locals = locals_of(&function.locals, options);
        record.routines.push(routine);
    }

    for class in &tree.classes {
        let mut decl = RawTypeDecl::new(&class.name, TypeKind::Class, (class.line, class.end_line));
        decl.is_abstract = class.is_abstract;
        decl.doc = doc_of(&class.doc, options);
        decl.decorators = decorators_of(&class.decorators);
        if let Some(base) = &class.extends {
            decl.bases.push(base.clone());
        }
        decl.implements = class.implements.clone();

        for property in &class.properties {
            let mut attribute =
                RawAttribute::new(&property.name, AttributeKind::Property, property.line);
            attribute.visibility = visibility_of(&property.accessibility);
            attribute.is_static = property.is_static;
            if options.detect_types {
                attribute.declared_type = property.ty.clone();
            }
            if property.init_kind.as_deref() == Some("constructed") {
                if let Some(ty) = &property.init_type {
                    attribute.init = Some(RawAttrInit::Constructed { ty: ty.clone() });
                }
            }
            decl.attributes.push(attribute);
        }

        for method in &class.methods {
            let routine = method_of(method, options);
            if method.kind == "constructor" {
                for assign in &method.assigns {
                    // A constructor assignment to a declared field attaches
                    // its origin to the existing attribute.
                    if let Some(existing) = decl
                        .attributes
                        .iter_mut()
                        .find(|a| a.name == assign.name)
                    {
                        attach_init(existing, assign, &routine);
                        continue;
                    }
                    let mut attribute =
                        RawAttribute::new(&assign.name, AttributeKind::Instance, assign.line);
                    attach_init(&mut attribute, assign, &routine);
                    if options.detect_types && attribute.declared_type.is_none() {
                        if let Some(ty) = &assign.init_type {
                            if assign.init_kind.as_deref() == Some("param") {
                                attribute.declared_type = Some(ty.clone());
                            }
                        }
                    }
                    decl.attributes.push(attribute);
                }
            }
            decl.methods.push(routine);
        }
        record.types.push(decl);
    }

    for interface in &tree.interfaces {
        let mut decl = RawTypeDecl::new(
            &interface.name,
            TypeKind::Interface,
            (interface.line, interface.end_line),
        );
        decl.doc = doc_of(&interface.doc, options);
        decl.bases = interface.extends.clone();
        for property in &interface.properties {
            let mut attribute =
                RawAttribute::new(&property.name, AttributeKind::Property, property.line);
            if options.detect_types {
                attribute.declared_type = property.ty.clone();
            }
            decl.attributes.push(attribute);
        }
        for method in &interface.methods {
            let mut routine = method_of(method, options);
            routine.flags.is_abstract = true;
            decl.methods.push(routine);
        }
        record.types.push(decl);
    }

    for enum_decl in &tree.enums {
        let mut decl = RawTypeDecl::new(
            &enum_decl.name,
            TypeKind::Enum,
            (enum_decl.line, enum_decl.end_line),
        );
        decl.doc = doc_of(&enum_decl.doc, options);
        for member in &enum_decl.members {
            let mut attribute =
                RawAttribute::new(&member.name, AttributeKind::Constant, member.line);
            attribute.is_static = true;
            attribute.default = member.value.clone();
            decl.attributes.push(attribute);
        }
        record.types.push(decl);
    }

    record
}

fn attach_init(attribute: &mut RawAttribute, assign: &JsAssign, constructor: &RawRoutine) {
    match assign.init_kind.as_deref() {
        Some("constructed") => {
            if let Some(ty) = &assign.init_type {
                attribute.init = Some(RawAttrInit::Constructed { ty: ty.clone() });
            }
        }
        Some("param") => {
            if let Some(param) = &assign.param {
                attribute.init = Some(RawAttrInit::FromParam {
                    param: param.clone(),
                });
                if attribute.declared_type.is_none() {
                    attribute.declared_type = constructor
                        .params
                        .iter()
                        .find(|p| p.name == *param)
                        .and_then(|p| p.ty.clone());
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(json: &str) -> JsTree {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn interprets_classes_with_constructor_assignments() {
        let tree = tree(
            r#"{
            "classes": [{
                "name": "Car", "line": 3, "end_line": 20,
                "doc": "A drivable car.\n@param {Driver} driver - who drives",
                "extends": "Vehicle", "implements": ["Drivable"],
                "properties": [{"name": "engine", "type": "Engine", "line": 4}],
                "methods": [
                    {"name": "constructor", "kind": "constructor", "line": 5, "end_line": 9,
                     "params": [{"name": "driver", "type": "Driver"}],
                     "assigns": [
                        {"name": "engine", "line": 6, "init_kind": "constructed", "init_type": "Engine"},
                        {"name": "driver", "line": 7, "init_kind": "param", "param": "driver"}
                     ]},
                    {"name": "drive", "kind": "method", "line": 11, "end_line": 14, "async": true,
                     "params": [{"name": "speed", "type": "number"}],
                     "return_type": "Promise<void>",
                     "calls": [{"callee": "this.engine.start", "receiver": "this.engine", "line": 12}]}
                ]
            }]
        }"#,
        );
        let record = interpret(
            &tree,
            "src/car.ts",
            Language::TypeScript,
            FrontEndOptions::default(),
        );
        assert_eq!(record.module_name, "src/car");
        let car = &record.types[0];
        assert_eq!(car.bases, vec!["Vehicle".to_string()]);
        assert_eq!(car.implements, vec!["Drivable".to_string()]);

        let engine = car.attributes.iter().find(|a| a.name == "engine").unwrap();
        assert_eq!(engine.declared_type.as_deref(), Some("Engine"));
        assert!(matches!(
            engine.init,
            Some(RawAttrInit::Constructed { ref ty }) if ty == "Engine"
        ));
        let driver = car.attributes.iter().find(|a| a.name == "driver").unwrap();
        assert_eq!(driver.declared_type.as_deref(), Some("Driver"));
        assert!(matches!(driver.init, Some(RawAttrInit::FromParam { .. })));

        let drive = car.methods.iter().find(|m| m.name == "drive").unwrap();
        assert!(drive.flags.is_async);
        assert_eq!(drive.receiver, Some(Receiver::Instance));
        assert_eq!(drive.return_type.as_deref(), Some("Promise<void>"));
        assert_eq!(drive.calls[0].receiver.as_deref(), Some("this.engine"));

        let doc = car.doc.as_ref().unwrap();
        assert_eq!(doc.params[0].name, "driver");
    }

    #[test]
    fn interprets_interfaces_enums_and_functions() {
        let tree = tree(
            r#"{
            "imports": [{"module": "./engine", "names": [{"name": "Engine"}], "line": 1}],
            "interfaces": [{"name": "Drivable", "line": 3, "end_line": 6,
                "methods": [{"name": "drive", "params": [], "line": 4}]}],
            "enums": [{"name": "Gear", "line": 8, "end_line": 11,
                "members": [{"name": "Park", "value": "0", "line": 9}]}],
            "functions": [
                {"name": "main", "line": 13, "end_line": 16,
                 "calls": [{"callee": "helper", "line": 14}]},
                {"name": "helper", "line": 18, "end_line": 19, "arrow": true}
            ],
            "constants": [{"name": "MAX_GEAR", "value": "6", "line": 2}]
        }"#,
        );
        let record = interpret(
            &tree,
            "src/index.ts",
            Language::TypeScript,
            FrontEndOptions::default(),
        );
        assert_eq!(record.imports[0].shape, ImportShape::Named);
        assert_eq!(record.imports[0].names[0].name, "Engine");

        let drivable = record.types.iter().find(|t| t.name == "Drivable").unwrap();
        assert_eq!(drivable.kind, TypeKind::Interface);
        assert!(drivable.methods[0].flags.is_abstract);

        let gear = record.types.iter().find(|t| t.name == "Gear").unwrap();
        assert_eq!(gear.kind, TypeKind::Enum);
        assert_eq!(gear.attributes[0].kind, AttributeKind::Constant);

        assert_eq!(record.routines.len(), 2);
        assert_eq!(record.routines[1].kind, RoutineKind::Lambda);
        assert_eq!(record.constants[0].name, "MAX_GEAR");
    }

    #[test]
    fn untyped_locals_are_dropped_when_types_disabled() {
        let tree = tree(
            r#"{"functions": [{"name": "go", "line": 1, "end_line": 3,
                "locals": [{"name": "e", "type": "Engine", "line": 2}]}]}"#,
        );
        let options = FrontEndOptions {
            detect_docstrings: true,
            detect_types: false,
        };
        let record = interpret(&tree, "a.js", Language::JavaScript, options);
        assert!(record.routines[0].locals.is_empty());
    }
}

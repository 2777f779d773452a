//! Raw Entity Records: the per-file output schema shared by every front-end,
//! prior to merging by the Model Builder. References are plain text here;
//! the builder rewrites them to identifiers during sealing.

use serde::{Deserialize, Serialize};

use crate::model::{
    CallSite, Decorator, Doc, ImportShape, ImportedName, Language, ModuleConstant, Receiver,
    RoutineFlags, RoutineKind, TypeKind, Visibility,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Forward-slash path relative to the project root.
    pub path: String,
    pub language: Language,
    /// Dotted / namespaced module name derived by the front-end.
    pub module_name: String,
    /// Declared namespace (PHP) if any; Python/JS derive it from the path.
    pub namespace: Option<String>,
    pub doc: Option<Doc>,
    pub imports: Vec<RawImport>,
    pub constants: Vec<ModuleConstant>,
    pub routines: Vec<RawRoutine>,
    pub types: Vec<RawTypeDecl>,
    pub content_hash: String,
    /// Produced by a degraded reader; downstream consumers treat these
    /// records cautiously.
    pub best_effort: bool,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, language: Language, module_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            language,
            module_name: module_name.into(),
            namespace: None,
            doc: None,
            imports: Vec::new(),
            constants: Vec::new(),
            routines: Vec::new(),
            types: Vec::new(),
            content_hash: String::new(),
            best_effort: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawImport {
    pub module: String,
    pub shape: ImportShape,
    pub names: Vec<ImportedName>,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTypeDecl {
    pub name: String,
    pub kind: TypeKind,
    /// Base type expressions, verbatim where complex, dotted where simple.
    pub bases: Vec<String>,
    pub implements: Vec<String>,
    pub uses_traits: Vec<String>,
    pub methods: Vec<RawRoutine>,
    pub attributes: Vec<RawAttribute>,
    pub span: (u32, u32),
    pub doc: Option<Doc>,
    pub visibility: Visibility,
    pub is_abstract: bool,
    pub is_final: bool,
    pub decorators: Vec<Decorator>,
}

impl RawTypeDecl {
    pub fn new(name: impl Into<String>, kind: TypeKind, span: (u32, u32)) -> Self {
        Self {
            name: name.into(),
            kind,
            bases: Vec::new(),
            implements: Vec::new(),
            uses_traits: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
            span,
            doc: None,
            visibility: Visibility::Public,
            is_abstract: false,
            is_final: false,
            decorators: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawParam {
    pub name: String,
    pub ty: Option<String>,
    pub has_default: bool,
    pub variadic: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLocalHint {
    pub name: String,
    pub ty: String,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRoutine {
    pub name: String,
    pub kind: RoutineKind,
    pub receiver: Option<Receiver>,
    pub params: Vec<RawParam>,
    pub return_type: Option<String>,
    pub flags: RoutineFlags,
    pub span: (u32, u32),
    pub doc: Option<Doc>,
    pub visibility: Visibility,
    pub calls: Vec<CallSite>,
    pub locals: Vec<RawLocalHint>,
    pub decorators: Vec<Decorator>,
}

impl RawRoutine {
    pub fn new(name: impl Into<String>, kind: RoutineKind, span: (u32, u32)) -> Self {
        Self {
            name: name.into(),
            kind,
            receiver: None,
            params: Vec::new(),
            return_type: None,
            flags: RoutineFlags::default(),
            span,
            doc: None,
            visibility: Visibility::Public,
            calls: Vec::new(),
            locals: Vec::new(),
            decorators: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawAttrInit {
    Constructed { ty: String },
    FromParam { param: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAttribute {
    pub name: String,
    pub kind: crate::model::AttributeKind,
    pub declared_type: Option<String>,
    pub default: Option<String>,
    pub init: Option<RawAttrInit>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub line: u32,
    pub doc: Option<Doc>,
}

impl RawAttribute {
    pub fn new(name: impl Into<String>, kind: crate::model::AttributeKind, line: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            declared_type: None,
            default: None,
            init: None,
            visibility: Visibility::Public,
            is_static: false,
            line,
            doc: None,
        }
    }
}

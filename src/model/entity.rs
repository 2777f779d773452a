use serde::{Deserialize, Serialize};

use super::ids::{EntityId, EntityRef};

/// Language a source file was parsed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Python,
    Php,
    JavaScript,
    TypeScript,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Php => "php",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
        }
    }

    /// JS and TS share one front-end.
    pub fn frontend_family(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Php => "php",
            Self::JavaScript | Self::TypeScript => "javascript",
        }
    }
}

/// Documentation attached to an entity: the verbatim text plus the parameter
/// section parsed out of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Doc {
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub params: Vec<DocParam>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub returns: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub raises: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocParam {
    pub name: String,
    pub description: String,
}

/// A decorator as written: raw name plus raw argument list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decorator {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub args: Vec<String>,
}

/// A type reference after sealing: the original textual form plus the
/// identifier it resolved to (or External).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRef {
    pub text: String,
    pub target: EntityRef,
}

/// Import shape as written in the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportShape {
    /// `import x.y` / `use A\B;` / `import "./x"` without bindings.
    Plain,
    /// `from X import a, b` / named ES imports.
    Named,
    /// Python relative import; `depth` counts the leading dots.
    Relative { depth: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedName {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub alias: Option<String>,
}

/// One import statement of a module, sealed against the project tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    /// Module path exactly as written.
    pub module: String,
    pub shape: ImportShape,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub names: Vec<ImportedName>,
    /// The project module this import resolved to, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub resolved: Option<EntityId>,
    pub line: u32,
}

/// Module-level constant (top-level uppercase assignment, `const`, …).
/// These stay inline on the module: only TypeDecls own Attribute entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConstant {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<String>,
    pub line: u32,
}

/// A source file in the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleEntity {
    pub id: EntityId,
    /// Forward-slash path relative to the project root.
    pub path: String,
    pub language: Language,
    /// Detected module/package name (dotted or namespaced).
    pub name: String,
    /// Namespace the module belongs to, root-relative.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub namespace: Option<String>,
    pub imports: Vec<Import>,
    pub constants: Vec<ModuleConstant>,
    /// Top-level functions, in declaration order.
    pub functions: Vec<EntityId>,
    /// Top-level type declarations, in declaration order.
    pub types: Vec<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub doc: Option<Doc>,
    /// SHA-256 of the source text, for downstream change detection.
    pub content_hash: String,
    /// Textual imports that resolved to nothing inside the project.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub external_dependencies: Vec<String>,
    /// Set when the record came from a degraded (regex fallback) reader.
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub best_effort: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Class,
    Interface,
    Trait,
    Enum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

/// A class, interface, trait, or enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDecl {
    pub id: EntityId,
    pub name: String,
    pub qualified_name: String,
    pub module: EntityId,
    pub kind: TypeKind,
    /// Base types, order preserved, duplicates coalesced.
    pub bases: Vec<TypeRef>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub implements: Vec<TypeRef>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub uses_traits: Vec<TypeRef>,
    /// Methods in declaration order.
    pub methods: Vec<EntityId>,
    /// Properties and constants in declaration order.
    pub attributes: Vec<EntityId>,
    pub span: (u32, u32),
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub doc: Option<Doc>,
    pub visibility: Visibility,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub is_abstract: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub is_final: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub decorators: Vec<Decorator>,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub best_effort: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutineKind {
    Function,
    Method,
    /// Arrow function or lambda bound to a name.
    Lambda,
}

/// Implicit receiver of a method, recorded instead of a first parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Receiver {
    /// `self` / `$this` / `this`.
    Instance,
    /// `cls` on Python classmethods.
    Class,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineFlags {
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub is_static: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub is_abstract: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub is_async: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub is_generator: bool,
    /// Python `@property` accessor.
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub is_property: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ty: Option<TypeRef>,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub has_default: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub variadic: bool,
}

/// One syntactic call expression inside a routine body. This is the body
/// reference the Flow Analyzer works from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSite {
    /// Callee expression verbatim (`helper`, `self.start`, `engine.run`).
    pub callee: String,
    /// Receiver expression, when the call has one.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub receiver: Option<String>,
    pub line: u32,
}

/// Type evidence for a local variable: an annotation or a constructor
/// assignment observed in the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalHint {
    pub name: String,
    pub ty: TypeRef,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutineOwner {
    Module(EntityId),
    Type(EntityId),
}

impl RoutineOwner {
    pub fn id(&self) -> &EntityId {
        match self {
            Self::Module(id) | Self::Type(id) => id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Routine {
    pub id: EntityId,
    pub name: String,
    pub qualified_name: String,
    pub owner: RoutineOwner,
    pub kind: RoutineKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub receiver: Option<Receiver>,
    pub params: Vec<Param>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub return_type: Option<TypeRef>,
    #[serde(default)]
    pub flags: RoutineFlags,
    pub span: (u32, u32),
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub doc: Option<Doc>,
    pub visibility: Visibility,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub calls: Vec<CallSite>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub locals: Vec<LocalHint>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub decorators: Vec<Decorator>,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub best_effort: bool,
}

impl Routine {
    /// Entry-point eligibility: public visibility and no leading underscore.
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public && !self.name.starts_with('_')
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Instance,
    ClassLevel,
    Property,
    Constant,
}

/// How a constructor initialises an attribute, when that was syntactically
/// observable. Drives composition/aggregation inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrInit {
    /// `self.x = T(...)`: freshly constructed in the initialiser.
    Constructed { ty: TypeRef },
    /// `self.x = param` where `param` is a constructor parameter.
    FromParam { param: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub id: EntityId,
    pub name: String,
    /// Owning TypeDecl. Module-level constants are not Attribute entities.
    pub owner: EntityId,
    pub kind: AttributeKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub declared_type: Option<TypeRef>,
    /// Default/constant expression, verbatim.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub init: Option<AttrInit>,
    pub visibility: Visibility,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub is_static: bool,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub doc: Option<Doc>,
}

use async_trait::async_trait;
use tree_sitter::{Node, Parser};

use super::{content_hash, FrontEnd, FrontEndFailure, FrontEndOptions};
use crate::docparse;
use crate::error::{AtlasError, Result};
use crate::model::{
    AttributeKind, CallSite, Doc, ImportShape, ImportedName, Language, ModuleConstant, Receiver,
    RoutineKind, TypeKind, Visibility,
};
use crate::record::{
    FileRecord, RawAttrInit, RawAttribute, RawImport, RawLocalHint, RawParam, RawRoutine,
    RawTypeDecl,
};
use crate::walker::WalkedFile;

/// Python front-end: a static syntactic parse, no evaluation.
pub struct PythonFrontEnd {
    parser: Parser,
    options: FrontEndOptions,
}

impl PythonFrontEnd {
    pub fn new(options: FrontEndOptions) -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| AtlasError::Config(format!("failed to load Python grammar: {e}")))?;
        Ok(Self { parser, options })
    }
}

#[async_trait]
impl FrontEnd for PythonFrontEnd {
    fn name(&self) -> &'static str {
        "python"
    }

    async fn parse_file(
        &mut self,
        source: &str,
        file: &WalkedFile,
    ) -> std::result::Result<FileRecord, FrontEndFailure> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| FrontEndFailure::parse("tree-sitter returned no tree"))?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(FrontEndFailure::parse("file contains syntax errors"));
        }

        let (module_name, namespace) = module_name_of(&file.relative);
        let mut record = FileRecord::new(&file.relative, Language::Python, module_name);
        record.namespace = namespace;
        record.content_hash = content_hash(source);

        let extractor = Extractor {
            source,
            options: self.options,
        };
        extractor.extract_module(root, &mut record);
        Ok(record)
    }
}

/// Dotted module name from a relative path; `__init__.py` names the package
/// itself.
fn module_name_of(relative: &str) -> (String, Option<String>) {
    let mut parts: Vec<&str> = relative.split('/').collect();
    let file = parts.pop().unwrap_or(relative);
    let stem = file.strip_suffix(".py").unwrap_or(file);
    let mut dotted = parts.clone();
    if stem != "__init__" {
        dotted.push(stem);
    }
    let name = if dotted.is_empty() {
        stem.to_string()
    } else {
        dotted.join(".")
    };
    let namespace = if parts.is_empty() {
        None
    } else {
        Some(parts.join("."))
    };
    (name, namespace)
}

struct Extractor<'a> {
    source: &'a str,
    options: FrontEndOptions,
}

impl<'a> Extractor<'a> {
    fn text(&self, node: Node) -> String {
        self.source[node.byte_range()].to_string()
    }

    fn line(&self, node: Node) -> u32 {
        node.start_position().row as u32 + 1
    }

    fn span(&self, node: Node) -> (u32, u32) {
        (
            node.start_position().row as u32 + 1,
            node.end_position().row as u32 + 1,
        )
    }

    fn extract_module(&self, root: Node, record: &mut FileRecord) {
        if self.options.detect_docstrings {
            record.doc = self.leading_docstring(root);
        }

        let mut cursor = root.walk();
        let mut first_statement = true;
        for child in root.children(&mut cursor) {
            match child.kind() {
                "import_statement" => self.extract_plain_import(child, record),
                "import_from_statement" | "future_import_statement" => {
                    self.extract_from_import(child, record)
                }
                "expression_statement" => {
                    if !(first_statement && self.is_string_statement(child)) {
                        self.extract_module_assignment(child, record);
                    }
                }
                "class_definition" => {
                    self.extract_class(child, None, None, record);
                }
                "function_definition" => {
                    record.routines.push(self.extract_routine(
                        child,
                        RoutineKind::Function,
                        &[],
                        false,
                    ));
                }
                "decorated_definition" => {
                    let decorators = self.decorator_names(child);
                    if let Some(definition) = child.child_by_field_name("definition") {
                        match definition.kind() {
                            "class_definition" => {
                                self.extract_class(definition, None, Some(&decorators), record)
                            }
                            "function_definition" => record.routines.push(self.extract_routine(
                                definition,
                                RoutineKind::Function,
                                &decorators,
                                false,
                            )),
                            _ => {}
                        }
                    }
                }
                "comment" => continue,
                _ => {}
            }
            if child.kind() != "comment" {
                first_statement = false;
            }
        }
    }

    /// `import a.b` and `import a.b as c`; one record per imported module.
    fn extract_plain_import(&self, node: Node, record: &mut FileRecord) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "dotted_name" => record.imports.push(RawImport {
                    module: self.text(child),
                    shape: ImportShape::Plain,
                    names: Vec::new(),
                    line: self.line(node),
                }),
                "aliased_import" => {
                    let name = child
                        .child_by_field_name("name")
                        .map(|n| self.text(n))
                        .unwrap_or_default();
                    let alias = child.child_by_field_name("alias").map(|n| self.text(n));
                    record.imports.push(RawImport {
                        module: name.clone(),
                        shape: ImportShape::Plain,
                        names: vec![ImportedName { name, alias }],
                        line: self.line(node),
                    });
                }
                _ => {}
            }
        }
    }

    /// `from X import a, b as c` and relative forms `from .x import y`.
    fn extract_from_import(&self, node: Node, record: &mut FileRecord) {
        let mut module = String::new();
        let mut shape = ImportShape::Named;
        if let Some(module_node) = node.child_by_field_name("module_name") {
            match module_node.kind() {
                "relative_import" => {
                    let text = self.text(module_node);
                    let depth = text.chars().take_while(|c| *c == '.').count() as u32;
                    module = text.trim_start_matches('.').to_string();
                    shape = ImportShape::Relative { depth };
                }
                _ => module = self.text(module_node),
            }
        }

        let mut names = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            // The module_name field also matches dotted_name; skip it.
            if Some(child) == node.child_by_field_name("module_name") {
                continue;
            }
            match child.kind() {
                "dotted_name" => names.push(ImportedName {
                    name: self.text(child),
                    alias: None,
                }),
                "aliased_import" => names.push(ImportedName {
                    name: child
                        .child_by_field_name("name")
                        .map(|n| self.text(n))
                        .unwrap_or_default(),
                    alias: child.child_by_field_name("alias").map(|n| self.text(n)),
                }),
                "wildcard_import" => names.push(ImportedName {
                    name: "*".to_string(),
                    alias: None,
                }),
                _ => {}
            }
        }

        record.imports.push(RawImport {
            module,
            shape,
            names,
            line: self.line(node),
        });
    }

    /// Module constants: a top-level assignment whose target is a single
    /// uppercase identifier.
    fn extract_module_assignment(&self, statement: Node, record: &mut FileRecord) {
        let Some(assignment) = statement.child(0).filter(|c| c.kind() == "assignment") else {
            return;
        };
        let Some(left) = assignment.child_by_field_name("left") else {
            return;
        };
        if left.kind() != "identifier" {
            return;
        }
        let name = self.text(left);
        if !is_constant_name(&name) {
            return;
        }
        let value = assignment
            .child_by_field_name("right")
            .map(|n| self.text(n));
        record.constants.push(ModuleConstant {
            name,
            value,
            line: self.line(statement),
        });
    }

    fn extract_class(
        &self,
        node: Node,
        outer: Option<&str>,
        decorators: Option<&[String]>,
        record: &mut FileRecord,
    ) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let simple_name = self.text(name_node);
        let name = match outer {
            Some(outer) => format!("{outer}.{simple_name}"),
            None => simple_name.clone(),
        };

        let mut decl = RawTypeDecl::new(&name, TypeKind::Class, self.span(node));
        if simple_name.starts_with('_') {
            decl.visibility = Visibility::Private;
        }
        if let Some(decorators) = decorators {
            // abstractmethod never applies to classes; ABC bases carry the
            // abstract-ness and are kept verbatim in `bases`.
            decl.is_abstract = decorators.iter().any(|d| d == "abstractmethod");
        }

        // Base class expressions, verbatim; simple name/attribute chains are
        // already in dotted form.
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            for base in superclasses.children(&mut cursor) {
                match base.kind() {
                    "identifier" | "attribute" | "subscript" => {
                        decl.bases.push(self.text(base));
                    }
                    "keyword_argument" => continue,
                    _ => {}
                }
            }
        }

        if self.options.detect_docstrings {
            if let Some(body) = node.child_by_field_name("body") {
                decl.doc = self.leading_docstring(body);
            }
        }

        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            let mut first_statement = true;
            for child in body.children(&mut cursor) {
                match child.kind() {
                    "function_definition" => {
                        decl.methods
                            .push(self.extract_routine(child, RoutineKind::Method, &[], true));
                    }
                    "decorated_definition" => {
                        let method_decorators = self.decorator_names(child);
                        if let Some(definition) = child.child_by_field_name("definition") {
                            match definition.kind() {
                                "function_definition" => decl.methods.push(self.extract_routine(
                                    definition,
                                    RoutineKind::Method,
                                    &method_decorators,
                                    true,
                                )),
                                "class_definition" => self.extract_class(
                                    definition,
                                    Some(&name),
                                    Some(&method_decorators),
                                    record,
                                ),
                                _ => {}
                            }
                        }
                    }
                    "class_definition" => {
                        self.extract_class(child, Some(&name), None, record);
                    }
                    "expression_statement" => {
                        if !(first_statement && self.is_string_statement(child)) {
                            if let Some(attribute) = self.class_level_attribute(child) {
                                decl.attributes.push(attribute);
                            }
                        }
                    }
                    _ => {}
                }
                if child.kind() != "comment" {
                    first_statement = false;
                }
            }
        }

        // Instance attributes come from `self.<name> = …` in the initialiser.
        let init_attrs = self.initializer_attributes(node);
        decl.attributes.extend(init_attrs);

        record.types.push(decl);
    }

    /// Class-body assignment → class-level attribute (constant when the
    /// target is uppercase).
    fn class_level_attribute(&self, statement: Node) -> Option<RawAttribute> {
        let assignment = statement.child(0).filter(|c| c.kind() == "assignment")?;
        let left = assignment.child_by_field_name("left")?;
        if left.kind() != "identifier" {
            return None;
        }
        let name = self.text(left);
        let kind = if is_constant_name(&name) {
            AttributeKind::Constant
        } else {
            AttributeKind::ClassLevel
        };
        let mut attribute = RawAttribute::new(&name, kind, self.line(statement));
        if name.starts_with('_') {
            attribute.visibility = Visibility::Private;
        }
        if self.options.detect_types {
            attribute.declared_type = assignment
                .child_by_field_name("type")
                .map(|n| self.text(n));
        }
        attribute.default = assignment
            .child_by_field_name("right")
            .map(|n| self.text(n));
        attribute.is_static = true;
        Some(attribute)
    }

    /// Scan `__init__` for `self.<name> = …`, recording whether the value is
    /// freshly constructed or comes from a constructor parameter.
    fn initializer_attributes(&self, class_node: Node) -> Vec<RawAttribute> {
        let mut attributes = Vec::new();
        let Some(body) = class_node.child_by_field_name("body") else {
            return attributes;
        };

        let mut init_node = None;
        let mut cursor = body.walk();
        for child in body.children(&mut cursor) {
            let function = match child.kind() {
                "function_definition" => Some(child),
                "decorated_definition" => child
                    .child_by_field_name("definition")
                    .filter(|d| d.kind() == "function_definition"),
                _ => None,
            };
            if let Some(function) = function {
                if function
                    .child_by_field_name("name")
                    .map(|n| self.text(n) == "__init__")
                    .unwrap_or(false)
                {
                    init_node = Some(function);
                    break;
                }
            }
        }
        let Some(init) = init_node else {
            return attributes;
        };

        let param_types = self.parameter_annotations(init);
        let Some(init_body) = init.child_by_field_name("body") else {
            return attributes;
        };

        let mut seen = Vec::new();
        self.walk_self_assignments(init_body, &param_types, &mut seen, &mut attributes);
        attributes
    }

    /// Parameter name → annotation text for the initialiser.
    fn parameter_annotations(&self, function: Node) -> Vec<(String, Option<String>)> {
        let mut params = Vec::new();
        let Some(parameters) = function.child_by_field_name("parameters") else {
            return params;
        };
        let mut cursor = parameters.walk();
        for child in parameters.children(&mut cursor) {
            match child.kind() {
                "identifier" => params.push((self.text(child), None)),
                "typed_parameter" => {
                    let name = child
                        .child(0)
                        .filter(|c| c.kind() == "identifier")
                        .map(|c| self.text(c));
                    let ty = child.child_by_field_name("type").map(|n| self.text(n));
                    if let Some(name) = name {
                        params.push((name, ty));
                    }
                }
                "default_parameter" | "typed_default_parameter" => {
                    let name = child
                        .child_by_field_name("name")
                        .filter(|c| c.kind() == "identifier")
                        .map(|c| self.text(c));
                    let ty = child.child_by_field_name("type").map(|n| self.text(n));
                    if let Some(name) = name {
                        params.push((name, ty));
                    }
                }
                _ => {}
            }
        }
        params
    }

    fn walk_self_assignments(
        &self,
        node: Node,
        params: &[(String, Option<String>)],
        seen: &mut Vec<String>,
        out: &mut Vec<RawAttribute>,
    ) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if matches!(child.kind(), "function_definition" | "lambda") {
                continue;
            }
            if child.kind() == "assignment" {
                if let Some(attribute) = self.self_assignment(child, params) {
                    if !seen.contains(&attribute.name) {
                        seen.push(attribute.name.clone());
                        out.push(attribute);
                    }
                    continue;
                }
            }
            self.walk_self_assignments(child, params, seen, out);
        }
    }

    fn self_assignment(
        &self,
        assignment: Node,
        params: &[(String, Option<String>)],
    ) -> Option<RawAttribute> {
        let left = assignment.child_by_field_name("left")?;
        if left.kind() != "attribute" {
            return None;
        }
        let object = left.child_by_field_name("object")?;
        if object.kind() != "identifier" || self.text(object) != "self" {
            return None;
        }
        let name = self.text(left.child_by_field_name("attribute")?);

        let mut attribute = RawAttribute::new(&name, AttributeKind::Instance, self.line(assignment));
        if name.starts_with('_') {
            attribute.visibility = Visibility::Private;
        }
        if self.options.detect_types {
            attribute.declared_type = assignment
                .child_by_field_name("type")
                .map(|n| self.text(n));
        }

        if let Some(right) = assignment.child_by_field_name("right") {
            match right.kind() {
                "call" => {
                    if let Some(function) = right.child_by_field_name("function") {
                        if matches!(function.kind(), "identifier" | "attribute") {
                            attribute.init = Some(RawAttrInit::Constructed {
                                ty: self.text(function),
                            });
                        }
                    }
                }
                "identifier" => {
                    let value = self.text(right);
                    if let Some((param, ty)) = params.iter().find(|(p, _)| *p == value) {
                        attribute.init = Some(RawAttrInit::FromParam {
                            param: param.clone(),
                        });
                        if attribute.declared_type.is_none() && self.options.detect_types {
                            attribute.declared_type = ty.clone();
                        }
                    }
                }
                _ => {}
            }
        }
        Some(attribute)
    }

    fn extract_routine(
        &self,
        node: Node,
        kind: RoutineKind,
        decorators: &[String],
        in_class: bool,
    ) -> RawRoutine {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n))
            .unwrap_or_default();
        let mut routine = RawRoutine::new(&name, kind, self.span(node));

        if name.starts_with('_') {
            routine.visibility = Visibility::Private;
        }
        routine.flags.is_static = decorators.iter().any(|d| d == "staticmethod");
        routine.flags.is_abstract = decorators.iter().any(|d| d == "abstractmethod");
        routine.flags.is_property = decorators.iter().any(|d| d == "property");
        let classmethod = decorators.iter().any(|d| d == "classmethod");

        // Async marker is a plain token child of the definition.
        let mut cursor = node.walk();
        routine.flags.is_async = node.children(&mut cursor).any(|c| c.kind() == "async");

        if in_class && !routine.flags.is_static {
            routine.receiver = Some(if classmethod {
                Receiver::Class
            } else {
                Receiver::Instance
            });
        }

        if let Some(parameters) = node.child_by_field_name("parameters") {
            self.extract_parameters(parameters, &mut routine);
        }
        if self.options.detect_types {
            routine.return_type = node
                .child_by_field_name("return_type")
                .map(|n| self.text(n));
        }
        if self.options.detect_docstrings {
            if let Some(body) = node.child_by_field_name("body") {
                routine.doc = self.leading_docstring(body);
            }
        }
        if let Some(body) = node.child_by_field_name("body") {
            routine.flags.is_generator = self.contains_yield(body);
            self.collect_calls(body, &mut routine.calls);
            self.collect_locals(body, &mut routine.locals);
        }
        routine
    }

    fn extract_parameters(&self, parameters: Node, routine: &mut RawRoutine) {
        let mut cursor = parameters.walk();
        let mut first = true;
        for child in parameters.children(&mut cursor) {
            let param = match child.kind() {
                "identifier" => Some(RawParam {
                    name: self.text(child),
                    ty: None,
                    has_default: false,
                    variadic: false,
                }),
                "typed_parameter" => {
                    let name = child
                        .child(0)
                        .map(|c| match c.kind() {
                            "identifier" => self.text(c),
                            // `*args: T` / `**kwargs: T`
                            _ => self.text(c).trim_start_matches('*').to_string(),
                        })
                        .unwrap_or_default();
                    let variadic = child
                        .child(0)
                        .map(|c| {
                            matches!(c.kind(), "list_splat_pattern" | "dictionary_splat_pattern")
                        })
                        .unwrap_or(false);
                    Some(RawParam {
                        name,
                        ty: if self.options.detect_types {
                            child.child_by_field_name("type").map(|n| self.text(n))
                        } else {
                            None
                        },
                        has_default: false,
                        variadic,
                    })
                }
                "default_parameter" | "typed_default_parameter" => Some(RawParam {
                    name: child
                        .child_by_field_name("name")
                        .map(|n| self.text(n))
                        .unwrap_or_default(),
                    ty: if self.options.detect_types {
                        child.child_by_field_name("type").map(|n| self.text(n))
                    } else {
                        None
                    },
                    has_default: true,
                    variadic: false,
                }),
                "list_splat_pattern" | "dictionary_splat_pattern" => Some(RawParam {
                    name: self.text(child).trim_start_matches('*').to_string(),
                    ty: None,
                    has_default: false,
                    variadic: true,
                }),
                _ => None,
            };
            if let Some(param) = param {
                // The implicit receiver is recorded as a flag, not a
                // parameter.
                if first
                    && routine.receiver.is_some()
                    && matches!(param.name.as_str(), "self" | "cls")
                {
                    first = false;
                    continue;
                }
                first = false;
                routine.params.push(param);
            }
        }
    }

    /// Syntactic call expressions in a body, skipping nested definitions.
    fn collect_calls(&self, node: Node, out: &mut Vec<CallSite>) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if matches!(child.kind(), "function_definition" | "class_definition") {
                continue;
            }
            if child.kind() == "call" {
                if let Some(function) = child.child_by_field_name("function") {
                    match function.kind() {
                        "identifier" => out.push(CallSite {
                            callee: self.text(function),
                            receiver: None,
                            line: self.line(child),
                        }),
                        "attribute" => {
                            let receiver = function
                                .child_by_field_name("object")
                                .map(|n| self.text(n));
                            out.push(CallSite {
                                callee: self.text(function),
                                receiver,
                                line: self.line(child),
                            });
                        }
                        _ => {}
                    }
                }
            }
            self.collect_calls(child, out);
        }
    }

    /// Local type evidence: annotated assignments and constructor
    /// assignments to simple names.
    fn collect_locals(&self, node: Node, out: &mut Vec<RawLocalHint>) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if matches!(child.kind(), "function_definition" | "class_definition") {
                continue;
            }
            if child.kind() == "assignment" {
                if let Some(left) = child.child_by_field_name("left") {
                    if left.kind() == "identifier" {
                        let name = self.text(left);
                        if self.options.detect_types {
                            if let Some(ty) = child.child_by_field_name("type") {
                                out.push(RawLocalHint {
                                    name: name.clone(),
                                    ty: self.text(ty),
                                    line: self.line(child),
                                });
                                continue;
                            }
                        }
                        if let Some(right) = child.child_by_field_name("right") {
                            if right.kind() == "call" {
                                if let Some(function) = right.child_by_field_name("function") {
                                    if matches!(function.kind(), "identifier" | "attribute") {
                                        out.push(RawLocalHint {
                                            name,
                                            ty: self.text(function),
                                            line: self.line(child),
                                        });
                                        continue;
                                    }
                                }
                            }
                        }
                    }
                }
            }
            self.collect_locals(child, out);
        }
    }

    fn contains_yield(&self, node: Node) -> bool {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if matches!(child.kind(), "function_definition" | "lambda") {
                continue;
            }
            if child.kind() == "yield" || self.contains_yield(child) {
                return true;
            }
        }
        false
    }

    fn decorator_names(&self, decorated: Node) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = decorated.walk();
        for child in decorated.children(&mut cursor) {
            if child.kind() != "decorator" {
                continue;
            }
            // `@name`, `@mod.name`, `@name(args)`: keep the trailing
            // identifier so `abc.abstractmethod` matches `abstractmethod`.
            let mut expr = None;
            let mut inner = child.walk();
            for part in child.children(&mut inner) {
                if matches!(part.kind(), "identifier" | "attribute" | "call") {
                    expr = Some(part);
                }
            }
            if let Some(expr) = expr {
                let target = match expr.kind() {
                    "call" => expr.child_by_field_name("function"),
                    _ => Some(expr),
                };
                if let Some(target) = target {
                    let text = self.text(target);
                    let last = text.rsplit('.').next().unwrap_or(&text);
                    names.push(last.to_string());
                }
            }
        }
        names
    }

    fn is_string_statement(&self, statement: Node) -> bool {
        statement
            .child(0)
            .map(|c| c.kind() == "string")
            .unwrap_or(false)
    }

    /// The leading string literal of a block, parsed into structured form.
    fn leading_docstring(&self, body: Node) -> Option<Doc> {
        let mut cursor = body.walk();
        for child in body.children(&mut cursor) {
            if child.kind() == "comment" {
                continue;
            }
            if child.kind() == "expression_statement" {
                if let Some(string) = child.child(0).filter(|c| c.kind() == "string") {
                    let cleaned = strip_string_literal(&self.text(string));
                    if cleaned.is_empty() {
                        return None;
                    }
                    return Some(docparse::parse_doc(&cleaned));
                }
            }
            return None;
        }
        None
    }
}

fn is_constant_name(name: &str) -> bool {
    name.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false)
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Strip quote markers and string prefixes from a literal.
fn strip_string_literal(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.trim_start_matches(|c| matches!(c, 'r' | 'b' | 'u' | 'f' | 'R' | 'B' | 'U' | 'F'));
    for delim in ["\"\"\"", "'''", "\"", "'"] {
        if trimmed.starts_with(delim) && trimmed.ends_with(delim) && trimmed.len() >= delim.len() * 2
        {
            return trimmed[delim.len()..trimmed.len() - delim.len()]
                .trim()
                .to_string();
        }
    }
    trimmed.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Language;
    use crate::walker::WalkedFile;

    async fn parse(source: &str) -> FileRecord {
        parse_at(source, "app/main.py").await
    }

    async fn parse_at(source: &str, relative: &str) -> FileRecord {
        let mut frontend = PythonFrontEnd::new(FrontEndOptions::default()).unwrap();
        let file = WalkedFile {
            absolute: relative.into(),
            relative: relative.to_string(),
            language: Language::Python,
        };
        frontend.parse_file(source, &file).await.unwrap()
    }

    #[tokio::test]
    async fn extracts_classes_and_bases() {
        let record = parse("class A:\n    pass\n\nclass B(A):\n    pass\n").await;
        assert_eq!(record.types.len(), 2);
        assert_eq!(record.types[0].name, "A");
        assert_eq!(record.types[1].name, "B");
        assert_eq!(record.types[1].bases, vec!["A".to_string()]);
    }

    #[tokio::test]
    async fn methods_drop_self_and_keep_flags() {
        let record = parse(
            "class Service:\n    @staticmethod\n    def build():\n        pass\n\n    async def run(self, speed: int, *args, **kwargs):\n        pass\n",
        )
        .await;
        let service = &record.types[0];
        assert_eq!(service.methods.len(), 2);
        let build = &service.methods[0];
        assert!(build.flags.is_static);
        assert!(build.receiver.is_none());
        let run = &service.methods[1];
        assert!(run.flags.is_async);
        assert_eq!(run.receiver, Some(Receiver::Instance));
        assert_eq!(run.params.len(), 3);
        assert_eq!(run.params[0].name, "speed");
        assert_eq!(run.params[0].ty.as_deref(), Some("int"));
        assert!(run.params[1].variadic);
        assert!(run.params[2].variadic);
    }

    #[tokio::test]
    async fn initializer_attributes_record_their_origin() {
        let record = parse(
            "class Car:\n    def __init__(self, driver: Driver):\n        self.engine = Engine()\n        self.driver = driver\n",
        )
        .await;
        let car = &record.types[0];
        assert_eq!(car.attributes.len(), 2);
        let engine = &car.attributes[0];
        assert_eq!(engine.kind, AttributeKind::Instance);
        assert!(matches!(
            engine.init,
            Some(RawAttrInit::Constructed { ref ty }) if ty == "Engine"
        ));
        let driver = &car.attributes[1];
        assert!(matches!(
            driver.init,
            Some(RawAttrInit::FromParam { ref param }) if param == "driver"
        ));
        assert_eq!(driver.declared_type.as_deref(), Some("Driver"));
    }

    #[tokio::test]
    async fn module_constants_and_docstring() {
        let record = parse("\"\"\"Entry module.\"\"\"\n\nMAX_SPEED = 120\nlimit = 5\n").await;
        assert_eq!(record.doc.as_ref().unwrap().text, "Entry module.");
        assert_eq!(record.constants.len(), 1);
        assert_eq!(record.constants[0].name, "MAX_SPEED");
        assert_eq!(record.constants[0].value.as_deref(), Some("120"));
    }

    #[tokio::test]
    async fn import_shapes() {
        let record = parse(
            "import os\nimport os.path as osp\nfrom collections import OrderedDict, defaultdict as dd\nfrom .sibling import Thing\n",
        )
        .await;
        assert_eq!(record.imports.len(), 4);
        assert_eq!(record.imports[0].shape, ImportShape::Plain);
        assert_eq!(record.imports[0].module, "os");
        assert_eq!(record.imports[1].names[0].alias.as_deref(), Some("osp"));
        assert_eq!(record.imports[2].shape, ImportShape::Named);
        assert_eq!(record.imports[2].names.len(), 2);
        assert_eq!(
            record.imports[3].shape,
            ImportShape::Relative { depth: 1 }
        );
        assert_eq!(record.imports[3].module, "sibling");
        assert_eq!(record.imports[3].names[0].name, "Thing");
    }

    #[tokio::test]
    async fn call_sites_and_locals() {
        let record = parse(
            "def main():\n    engine = Engine()\n    engine.start()\n    helper(1)\n\ndef helper(x):\n    pass\n",
        )
        .await;
        let main = &record.routines[0];
        assert_eq!(main.locals.len(), 1);
        assert_eq!(main.locals[0].ty, "Engine");
        let callees: Vec<&str> = main.calls.iter().map(|c| c.callee.as_str()).collect();
        assert!(callees.contains(&"Engine"));
        assert!(callees.contains(&"engine.start"));
        assert!(callees.contains(&"helper"));
    }

    #[tokio::test]
    async fn generator_and_docstring_params() {
        let record = parse(
            "def gen(n):\n    \"\"\"Yield numbers.\n\n    Args:\n        n: Upper bound.\n    \"\"\"\n    yield n\n",
        )
        .await;
        let gen = &record.routines[0];
        assert!(gen.flags.is_generator);
        let doc = gen.doc.as_ref().unwrap();
        assert_eq!(doc.params.len(), 1);
        assert_eq!(doc.params[0].name, "n");
    }

    #[tokio::test]
    async fn package_module_names() {
        let record = parse_at("class A:\n    pass\n", "pkg/sub/__init__.py").await;
        assert_eq!(record.module_name, "pkg.sub");
        let record = parse_at("class A:\n    pass\n", "pkg/mod.py").await;
        assert_eq!(record.module_name, "pkg.mod");
        assert_eq!(record.namespace.as_deref(), Some("pkg"));
    }

    #[tokio::test]
    async fn private_names_get_private_visibility() {
        let record = parse("def _internal():\n    pass\n\ndef public():\n    pass\n").await;
        assert_eq!(record.routines[0].visibility, Visibility::Private);
        assert_eq!(record.routines[1].visibility, Visibility::Public);
    }
}

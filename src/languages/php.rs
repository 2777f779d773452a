use async_trait::async_trait;

use super::{content_hash, FrontEnd, FrontEndFailure, FrontEndOptions};
use crate::error::Result;
use crate::model::Language;
use crate::record::FileRecord;
use crate::walker::WalkedFile;

/// PHP front-end.
///
/// Parses with tree-sitter-php when the `php-ast` feature is compiled in;
/// otherwise a regex-based reader extracts a strict subset and the records
/// carry the `best_effort` flag.
pub struct PhpFrontEnd {
    options: FrontEndOptions,
    #[cfg(feature = "php-ast")]
    parser: tree_sitter::Parser,
}

impl PhpFrontEnd {
    #[cfg(feature = "php-ast")]
    pub fn new(options: FrontEndOptions) -> Result<Self> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_php::LANGUAGE_PHP.into())
            .map_err(|e| crate::error::AtlasError::Config(format!("failed to load PHP grammar: {e}")))?;
        Ok(Self { options, parser })
    }

    #[cfg(not(feature = "php-ast"))]
    pub fn new(options: FrontEndOptions) -> Result<Self> {
        Ok(Self { options })
    }
}

#[async_trait]
impl FrontEnd for PhpFrontEnd {
    fn name(&self) -> &'static str {
        "php"
    }

    async fn parse_file(
        &mut self,
        source: &str,
        file: &WalkedFile,
    ) -> std::result::Result<FileRecord, FrontEndFailure> {
        #[cfg(feature = "php-ast")]
        {
            let tree = self
                .parser
                .parse(source, None)
                .ok_or_else(|| FrontEndFailure::parse("tree-sitter returned no tree"))?;
            if tree.root_node().has_error() {
                return Err(FrontEndFailure::parse("file contains syntax errors"));
            }
            let mut record = ast::extract(tree.root_node(), source, &file.relative, self.options);
            record.content_hash = content_hash(source);
            Ok(record)
        }
        #[cfg(not(feature = "php-ast"))]
        {
            let mut record = fallback::extract(source, &file.relative, self.options);
            record.content_hash = content_hash(source);
            Ok(record)
        }
    }
}

fn module_name_of(relative: &str) -> String {
    let file = relative.rsplit('/').next().unwrap_or(relative);
    file.strip_suffix(".php").unwrap_or(file).to_string()
}

fn blank_record(relative: &str) -> FileRecord {
    FileRecord::new(relative, Language::Php, module_name_of(relative))
}

#[cfg(feature = "php-ast")]
mod ast {
    use tree_sitter::Node;

    use super::{blank_record, FrontEndOptions};
    use crate::docparse;
    use crate::model::{
        AttributeKind, CallSite, Doc, ImportShape, ImportedName, Receiver, RoutineKind, TypeKind,
        Visibility,
    };
    use crate::record::{
        FileRecord, RawAttrInit, RawAttribute, RawImport, RawLocalHint, RawParam, RawRoutine,
        RawTypeDecl,
    };

    pub fn extract(root: Node, source: &str, relative: &str, options: FrontEndOptions) -> FileRecord {
        let mut record = blank_record(relative);
        let walker = Walker { source, options };
        walker.walk_program(root, &mut record);
        record
    }

    struct Walker<'a> {
        source: &'a str,
        options: FrontEndOptions,
    }

    impl<'a> Walker<'a> {
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

        fn walk_program(&self, root: Node, record: &mut FileRecord) {
            let mut cursor = root.walk();
            for child in root.children(&mut cursor) {
                self.visit_top_level(child, record);
            }
        }

        fn visit_top_level(&self, node: Node, record: &mut FileRecord) {
            match node.kind() {
                "namespace_definition" => {
                    if let Some(name) = node.child_by_field_name("name") {
                        let namespace = self.text(name);
                        record.namespace = Some(namespace.clone());
                        record.module_name = namespace;
                    }
                    // Braced namespace bodies nest their declarations.
                    if let Some(body) = node.child_by_field_name("body") {
                        let mut cursor = body.walk();
                        for child in body.children(&mut cursor) {
                            self.visit_top_level(child, record);
                        }
                    }
                }
                "namespace_use_declaration" => self.extract_use(node, record),
                "class_declaration" => {
                    record.types.push(self.extract_class(node, TypeKind::Class))
                }
                "interface_declaration" => {
                    record.types.push(self.extract_class(node, TypeKind::Interface))
                }
                "trait_declaration" => {
                    record.types.push(self.extract_class(node, TypeKind::Trait))
                }
                "enum_declaration" => {
                    record.types.push(self.extract_class(node, TypeKind::Enum))
                }
                "function_definition" => {
                    record
                        .routines
                        .push(self.extract_routine(node, RoutineKind::Function, false));
                }
                "const_declaration" => {
                    let mut cursor = node.walk();
                    for element in node.children(&mut cursor) {
                        if element.kind() == "const_element" {
                            let name = element
                                .child(0)
                                .map(|n| self.text(n))
                                .unwrap_or_default();
                            let value = element.child(2).map(|n| self.text(n));
                            record.constants.push(crate::model::ModuleConstant {
                                name,
                                value,
                                line: self.line(element),
                            });
                        }
                    }
                }
                _ => {}
            }
        }

        /// `use A\B\C;` and `use A\B as C;`. All subsequent symbols qualify
        /// against these bindings.
        fn extract_use(&self, node: Node, record: &mut FileRecord) {
            let mut cursor = node.walk();
            for clause in node.children(&mut cursor) {
                if clause.kind() != "namespace_use_clause" {
                    continue;
                }
                let mut name = String::new();
                let mut alias = None;
                let mut inner = clause.walk();
                for part in clause.children(&mut inner) {
                    match part.kind() {
                        "qualified_name" | "name" => {
                            if name.is_empty() {
                                name = self.text(part);
                            }
                        }
                        "namespace_aliasing_clause" => {
                            alias = part.child(1).map(|n| self.text(n));
                        }
                        _ => {}
                    }
                }
                if name.is_empty() {
                    continue;
                }
                record.imports.push(RawImport {
                    module: name.clone(),
                    shape: ImportShape::Plain,
                    names: vec![ImportedName { name, alias }],
                    line: self.line(node),
                });
            }
        }

        fn doc_before(&self, node: Node) -> Option<Doc> {
            if !self.options.detect_docstrings {
                return None;
            }
            let prev = node.prev_sibling()?;
            if prev.kind() != "comment" {
                return None;
            }
            let raw = self.text(prev);
            if !raw.starts_with("/**") {
                return None;
            }
            let cleaned = docparse::strip_block_comment(&raw);
            if cleaned.is_empty() {
                return None;
            }
            Some(docparse::parse_doc(&cleaned))
        }

        fn extract_class(&self, node: Node, kind: TypeKind) -> RawTypeDecl {
            let name = node
                .child_by_field_name("name")
                .map(|n| self.text(n))
                .unwrap_or_default();
            let mut decl = RawTypeDecl::new(&name, kind, self.span(node));
            decl.doc = self.doc_before(node);

            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                match child.kind() {
                    "abstract_modifier" => decl.is_abstract = true,
                    "final_modifier" => decl.is_final = true,
                    "base_clause" => {
                        let mut inner = child.walk();
                        for base in child.children(&mut inner) {
                            if matches!(base.kind(), "name" | "qualified_name") {
                                decl.bases.push(self.text(base));
                            }
                        }
                    }
                    "class_interface_clause" => {
                        let mut inner = child.walk();
                        for iface in child.children(&mut inner) {
                            if matches!(iface.kind(), "name" | "qualified_name") {
                                decl.implements.push(self.text(iface));
                            }
                        }
                    }
                    _ => {}
                }
            }

            if let Some(body) = node.child_by_field_name("body") {
                let mut cursor = body.walk();
                for member in body.children(&mut cursor) {
                    match member.kind() {
                        "method_declaration" => {
                            let routine = self.extract_routine(member, RoutineKind::Method, true);
                            if routine.name == "__construct" {
                                self.promote_constructor_attributes(member, &routine, &mut decl);
                            }
                            decl.methods.push(routine);
                        }
                        "property_declaration" => {
                            self.extract_properties(member, &mut decl);
                        }
                        "const_declaration" => {
                            self.extract_class_constants(member, &mut decl);
                        }
                        "use_declaration" => {
                            let mut inner = member.walk();
                            for trait_name in member.children(&mut inner) {
                                if matches!(trait_name.kind(), "name" | "qualified_name") {
                                    decl.uses_traits.push(self.text(trait_name));
                                }
                            }
                        }
                        "enum_case" => {
                            let name = member
                                .child_by_field_name("name")
                                .map(|n| self.text(n))
                                .unwrap_or_default();
                            let mut attribute = RawAttribute::new(
                                &name,
                                AttributeKind::Constant,
                                self.line(member),
                            );
                            attribute.is_static = true;
                            decl.attributes.push(attribute);
                        }
                        _ => {}
                    }
                }
            }
            decl
        }

        fn visibility_of(&self, node: Node) -> (Visibility, bool, bool, bool) {
            let mut visibility = Visibility::Public;
            let mut is_static = false;
            let mut is_abstract = false;
            let mut is_final = false;
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                match child.kind() {
                    "visibility_modifier" => {
                        visibility = match self.text(child).as_str() {
                            "private" => Visibility::Private,
                            "protected" => Visibility::Protected,
                            _ => Visibility::Public,
                        }
                    }
                    "static_modifier" => is_static = true,
                    "abstract_modifier" => is_abstract = true,
                    "final_modifier" => is_final = true,
                    _ => {}
                }
            }
            (visibility, is_static, is_abstract, is_final)
        }

        fn extract_properties(&self, node: Node, decl: &mut RawTypeDecl) {
            let (visibility, is_static, _, _) = self.visibility_of(node);
            let declared_type = if self.options.detect_types {
                node.child_by_field_name("type").map(|n| self.text(n))
            } else {
                None
            };
            let doc = self.doc_before(node);

            let mut cursor = node.walk();
            for element in node.children(&mut cursor) {
                if element.kind() != "property_element" {
                    continue;
                }
                let Some(variable) = element.child(0).filter(|c| c.kind() == "variable_name")
                else {
                    continue;
                };
                let name = self.text(variable).trim_start_matches('$').to_string();
                let mut attribute =
                    RawAttribute::new(&name, AttributeKind::Property, self.line(element));
                attribute.visibility = visibility;
                attribute.is_static = is_static;
                attribute.declared_type = declared_type.clone();
                attribute.doc = doc.clone();
                attribute.default = element.child(2).map(|n| self.text(n));
                decl.attributes.push(attribute);
            }
        }

        fn extract_class_constants(&self, node: Node, decl: &mut RawTypeDecl) {
            let (visibility, _, _, _) = self.visibility_of(node);
            let mut cursor = node.walk();
            for element in node.children(&mut cursor) {
                if element.kind() != "const_element" {
                    continue;
                }
                let name = element.child(0).map(|n| self.text(n)).unwrap_or_default();
                let mut attribute =
                    RawAttribute::new(&name, AttributeKind::Constant, self.line(element));
                attribute.visibility = visibility;
                attribute.is_static = true;
                attribute.default = element.child(2).map(|n| self.text(n));
                decl.attributes.push(attribute);
            }
        }

        /// `$this->x = …` in the constructor, plus PHP 8 promoted
        /// constructor parameters, become instance attributes.
        fn promote_constructor_attributes(
            &self,
            method: Node,
            routine: &RawRoutine,
            decl: &mut RawTypeDecl,
        ) {
            if let Some(parameters) = method.child_by_field_name("parameters") {
                let mut cursor = parameters.walk();
                for param in parameters.children(&mut cursor) {
                    if param.kind() != "property_promotion_parameter" {
                        continue;
                    }
                    let Some(variable) = param.child_by_field_name("name") else {
                        continue;
                    };
                    let name = self.text(variable).trim_start_matches('$').to_string();
                    let (visibility, _, _, _) = self.visibility_of(param);
                    let mut attribute =
                        RawAttribute::new(&name, AttributeKind::Instance, self.line(param));
                    attribute.visibility = visibility;
                    attribute.declared_type = if self.options.detect_types {
                        param.child_by_field_name("type").map(|n| self.text(n))
                    } else {
                        None
                    };
                    attribute.init = Some(RawAttrInit::FromParam {
                        param: name.clone(),
                    });
                    decl.attributes.push(attribute);
                }
            }

            let Some(body) = method.child_by_field_name("body") else {
                return;
            };
            let params: Vec<&str> = routine.params.iter().map(|p| p.name.as_str()).collect();
            let mut seen = Vec::new();
            self.walk_this_assignments(body, &params, routine, &mut seen, decl);
        }

        fn walk_this_assignments(
            &self,
            node: Node,
            params: &[&str],
            routine: &RawRoutine,
            seen: &mut Vec<String>,
            decl: &mut RawTypeDecl,
        ) {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() == "assignment_expression" {
                    if let Some(attribute) = self.this_assignment(child, params, routine) {
                        if !seen.contains(&attribute.name) {
                            seen.push(attribute.name.clone());
                            decl.attributes.push(attribute);
                        }
                        continue;
                    }
                }
                self.walk_this_assignments(child, params, routine, seen, decl);
            }
        }

        fn this_assignment(
            &self,
            assignment: Node,
            params: &[&str],
            routine: &RawRoutine,
        ) -> Option<RawAttribute> {
            let left = assignment.child_by_field_name("left")?;
            if left.kind() != "member_access_expression" {
                return None;
            }
            let object = left.child_by_field_name("object")?;
            if self.text(object) != "$this" {
                return None;
            }
            let name = self.text(left.child_by_field_name("name")?);

            let mut attribute =
                RawAttribute::new(&name, AttributeKind::Instance, self.line(assignment));
            if let Some(right) = assignment.child_by_field_name("right") {
                match right.kind() {
                    "object_creation_expression" => {
                        let mut inner = right.walk();
                        for part in right.children(&mut inner) {
                            if matches!(part.kind(), "name" | "qualified_name") {
                                attribute.init = Some(RawAttrInit::Constructed {
                                    ty: self.text(part),
                                });
                                break;
                            }
                        }
                    }
                    "variable_name" => {
                        let value = self.text(right);
                        let bare = value.trim_start_matches('$');
                        if params.contains(&bare) {
                            attribute.init = Some(RawAttrInit::FromParam {
                                param: bare.to_string(),
                            });
                            if self.options.detect_types {
                                attribute.declared_type = routine
                                    .params
                                    .iter()
                                    .find(|p| p.name == bare)
                                    .and_then(|p| p.ty.clone());
                            }
                        }
                    }
                    _ => {}
                }
            }
            Some(attribute)
        }

        fn extract_routine(&self, node: Node, kind: RoutineKind, in_class: bool) -> RawRoutine {
            let name = node
                .child_by_field_name("name")
                .map(|n| self.text(n))
                .unwrap_or_default();
            let mut routine = RawRoutine::new(&name, kind, self.span(node));
            routine.doc = self.doc_before(node);

            let (visibility, is_static, is_abstract, _) = self.visibility_of(node);
            routine.visibility = visibility;
            routine.flags.is_static = is_static;
            routine.flags.is_abstract = is_abstract;
            if in_class && !is_static {
                routine.receiver = Some(Receiver::Instance);
            }

            if let Some(parameters) = node.child_by_field_name("parameters") {
                let mut cursor = parameters.walk();
                for param in parameters.children(&mut cursor) {
                    match param.kind() {
                        "simple_parameter" | "property_promotion_parameter" => {
                            let name = param
                                .child_by_field_name("name")
                                .map(|n| self.text(n).trim_start_matches('$').to_string())
                                .unwrap_or_default();
                            routine.params.push(RawParam {
                                name,
                                ty: if self.options.detect_types {
                                    param.child_by_field_name("type").map(|n| self.text(n))
                                } else {
                                    None
                                },
                                has_default: param.child_by_field_name("default_value").is_some(),
                                variadic: false,
                            });
                        }
                        "variadic_parameter" => {
                            let name = param
                                .child_by_field_name("name")
                                .map(|n| self.text(n).trim_start_matches('$').to_string())
                                .unwrap_or_default();
                            routine.params.push(RawParam {
                                name,
                                ty: if self.options.detect_types {
                                    param.child_by_field_name("type").map(|n| self.text(n))
                                } else {
                                    None
                                },
                                has_default: false,
                                variadic: true,
                            });
                        }
                        _ => {}
                    }
                }
            }
            if self.options.detect_types {
                routine.return_type = node
                    .child_by_field_name("return_type")
                    .map(|n| self.text(n).trim_start_matches(':').trim().to_string());
            }
            if let Some(body) = node.child_by_field_name("body") {
                self.collect_calls(body, &mut routine.calls);
                self.collect_locals(body, &mut routine.locals);
            }
            routine
        }

        fn collect_calls(&self, node: Node, out: &mut Vec<CallSite>) {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                match child.kind() {
                    "function_call_expression" => {
                        if let Some(function) = child.child_by_field_name("function") {
                            if matches!(function.kind(), "name" | "qualified_name") {
                                out.push(CallSite {
                                    callee: self.text(function),
                                    receiver: None,
                                    line: self.line(child),
                                });
                            }
                        }
                    }
                    "member_call_expression" => {
                        let receiver = child.child_by_field_name("object").map(|n| self.text(n));
                        if let Some(name) = child.child_by_field_name("name") {
                            let callee = match &receiver {
                                Some(obj) => format!("{obj}->{}", self.text(name)),
                                None => self.text(name),
                            };
                            out.push(CallSite {
                                callee,
                                receiver,
                                line: self.line(child),
                            });
                        }
                    }
                    "scoped_call_expression" => {
                        let scope = child.child_by_field_name("scope").map(|n| self.text(n));
                        if let Some(name) = child.child_by_field_name("name") {
                            let callee = match &scope {
                                Some(scope) => format!("{scope}::{}", self.text(name)),
                                None => self.text(name),
                            };
                            out.push(CallSite {
                                callee,
                                receiver: scope,
                                line: self.line(child),
                            });
                        }
                    }
                    "object_creation_expression" => {
                        let mut inner = child.walk();
                        for part in child.children(&mut inner) {
                            if matches!(part.kind(), "name" | "qualified_name") {
                                out.push(CallSite {
                                    callee: self.text(part),
                                    receiver: None,
                                    line: self.line(child),
                                });
                                break;
                            }
                        }
                    }
                    _ => {}
                }
                self.collect_calls(child, out);
            }
        }

        fn collect_locals(&self, node: Node, out: &mut Vec<RawLocalHint>) {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() == "assignment_expression" {
                    let left = child.child_by_field_name("left");
                    let right = child.child_by_field_name("right");
                    if let (Some(left), Some(right)) = (left, right) {
                        if left.kind() == "variable_name"
                            && right.kind() == "object_creation_expression"
                        {
                            let mut inner = right.walk();
                            for part in right.children(&mut inner) {
                                if matches!(part.kind(), "name" | "qualified_name") {
                                    out.push(RawLocalHint {
                                        name: self
                                            .text(left)
                                            .trim_start_matches('$')
                                            .to_string(),
                                        ty: self.text(part),
                                        line: self.line(child),
                                    });
                                    break;
                                }
                            }
                        }
                    }
                }
                self.collect_locals(child, out);
            }
        }
    }
}

/// Regex-based reader used when the syntactic parser is compiled out.
/// Extracts a strict subset; records carry the `best_effort` flag.
#[cfg_attr(feature = "php-ast", allow(dead_code))]
pub(crate) mod fallback {
    use std::sync::OnceLock;

    use regex::Regex;

    use super::{blank_record, FrontEndOptions};
    use crate::docparse;
    use crate::model::{ImportShape, ImportedName, RoutineKind, TypeKind, Visibility};
    use crate::record::{FileRecord, RawImport, RawParam, RawRoutine, RawTypeDecl};

    static NAMESPACE: OnceLock<Regex> = OnceLock::new();
    static USE: OnceLock<Regex> = OnceLock::new();
    static CLASS: OnceLock<Regex> = OnceLock::new();
    static FUNCTION: OnceLock<Regex> = OnceLock::new();

    fn re(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
        cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
    }

    pub fn extract(source: &str, relative: &str, options: FrontEndOptions) -> FileRecord {
        let namespace_re = re(&NAMESPACE, r"^\s*namespace\s+([\w\\]+)\s*;");
        let use_re = re(&USE, r"^\s*use\s+([\w\\]+)(?:\s+as\s+(\w+))?\s*;");
        let class_re = re(
            &CLASS,
            r"^\s*(?:abstract\s+|final\s+)*(class|interface|trait|enum)\s+(\w+)(?:\s+extends\s+([\w\\,\s]+?))?(?:\s+implements\s+([\w\\,\s]+?))?\s*\{?\s*$",
        );
        let function_re = re(
            &FUNCTION,
            r"^\s*(?:(public|protected|private)\s+)?(static\s+)?function\s+(\w+)\s*\(([^)]*)\)",
        );

        let mut record = blank_record(relative);
        record.best_effort = true;

        let mut doc_buffer: Vec<String> = Vec::new();
        let mut in_doc = false;
        let mut pending_doc: Option<String> = None;
        let mut depth: i32 = 0;
        let mut current_type: Option<RawTypeDecl> = None;
        // Depth outside the current type body; set once its brace opens.
        let mut body_open_depth: Option<i32> = None;

        for (index, line) in source.lines().enumerate() {
            let line_no = index as u32 + 1;
            let trimmed = line.trim();

            if in_doc {
                if trimmed.ends_with("*/") {
                    in_doc = false;
                    doc_buffer.push(trimmed.to_string());
                    pending_doc = Some(doc_buffer.join("\n"));
                    doc_buffer.clear();
                } else {
                    doc_buffer.push(trimmed.to_string());
                }
                continue;
            }
            if trimmed.starts_with("/**") {
                if trimmed.ends_with("*/") && trimmed.len() > 4 {
                    pending_doc = Some(trimmed.to_string());
                } else {
                    in_doc = true;
                    doc_buffer.push(trimmed.to_string());
                }
                continue;
            }

            if let Some(caps) = namespace_re.captures(line) {
                let namespace = caps[1].to_string();
                record.namespace = Some(namespace.clone());
                record.module_name = namespace;
            } else if let Some(caps) = use_re.captures(line) {
                if depth == 0 {
                    let name = caps[1].to_string();
                    let alias = caps.get(2).map(|m| m.as_str().to_string());
                    record.imports.push(RawImport {
                        module: name.clone(),
                        shape: ImportShape::Plain,
                        names: vec![ImportedName { name, alias }],
                        line: line_no,
                    });
                }
            } else if let Some(caps) = class_re.captures(line) {
                if let Some(decl) = current_type.take() {
                    record.types.push(decl);
                }
                body_open_depth = None;
                let kind = match &caps[1] {
                    "interface" => TypeKind::Interface,
                    "trait" => TypeKind::Trait,
                    "enum" => TypeKind::Enum,
                    _ => TypeKind::Class,
                };
                let mut decl = RawTypeDecl::new(&caps[2], kind, (line_no, line_no));
                decl.is_abstract = trimmed.starts_with("abstract");
                decl.is_final = trimmed.starts_with("final");
                if let Some(extends) = caps.get(3) {
                    decl.bases = extends
                        .as_str()
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect();
                }
                if let Some(implements) = caps.get(4) {
                    decl.implements = implements
                        .as_str()
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect();
                }
                if options.detect_docstrings {
                    decl.doc = pending_doc
                        .take()
                        .map(|raw| docparse::parse_doc(&docparse::strip_block_comment(&raw)));
                }
                current_type = Some(decl);
            } else if let Some(caps) = function_re.captures(line) {
                let mut routine = RawRoutine::new(
                    &caps[3],
                    if current_type.is_some() {
                        RoutineKind::Method
                    } else {
                        RoutineKind::Function
                    },
                    (line_no, line_no),
                );
                routine.visibility = match caps.get(1).map(|m| m.as_str()) {
                    Some("private") => Visibility::Private,
                    Some("protected") => Visibility::Protected,
                    _ => Visibility::Public,
                };
                routine.flags.is_static = caps.get(2).is_some();
                for raw_param in caps[4].split(',') {
                    let raw_param = raw_param.trim();
                    if raw_param.is_empty() {
                        continue;
                    }
                    let has_default = raw_param.contains('=');
                    let mut ty = None;
                    let mut name = String::new();
                    for token in raw_param.split_whitespace() {
                        if let Some(bare) = token.strip_prefix('$') {
                            name = bare
                                .trim_end_matches(|c: char| !c.is_alphanumeric() && c != '_')
                                .to_string();
                            break;
                        }
                        if ty.is_none() && !token.starts_with('=') {
                            ty = Some(token.to_string());
                        }
                    }
                    if name.is_empty() {
                        continue;
                    }
                    routine.params.push(RawParam {
                        name,
                        ty: if options.detect_types { ty } else { None },
                        has_default,
                        variadic: raw_param.contains("..."),
                    });
                }
                if options.detect_docstrings {
                    routine.doc = pending_doc
                        .take()
                        .map(|raw| docparse::parse_doc(&docparse::strip_block_comment(&raw)));
                }
                match current_type.as_mut() {
                    Some(decl) => decl.methods.push(routine),
                    None => record.routines.push(routine),
                }
            } else if !trimmed.is_empty() && !trimmed.starts_with("//") {
                pending_doc = None;
            }

            let before = depth;
            depth += line.matches('{').count() as i32;
            depth -= line.matches('}').count() as i32;
            if current_type.is_some() {
                match body_open_depth {
                    None if depth > before => body_open_depth = Some(before),
                    Some(open) if depth <= open => {
                        if let Some(decl) = current_type.take() {
                            record.types.push(decl);
                        }
                        body_open_depth = None;
                    }
                    _ => {}
                }
            }
        }
        if let Some(decl) = current_type.take() {
            record.types.push(decl);
        }
        record
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        const SOURCE: &str = r#"<?php

namespace App\Garage;

use App\Parts\Engine;
use App\Parts\Wheel as Rim;

/**
 * A drivable car.
 *
 * @param Engine $engine The engine to mount
 */
class Car extends Vehicle implements Drivable
{
    /**
     * Start the car.
     *
     * @param int $speed Initial speed
     * @return bool
     */
    public function start(int $speed = 0): bool
    {
        return true;
    }

    private static function wash($soap)
    {
    }
}

interface Drivable
{
}
"#;

        #[test]
        fn extracts_strict_subset() {
            let record = extract(SOURCE, "app/Car.php", FrontEndOptions::default());
            assert!(record.best_effort);
            assert_eq!(record.namespace.as_deref(), Some("App\\Garage"));
            assert_eq!(record.imports.len(), 2);
            assert_eq!(record.imports[1].names[0].alias.as_deref(), Some("Rim"));

            assert_eq!(record.types.len(), 2);
            let car = &record.types[0];
            assert_eq!(car.name, "Car");
            assert_eq!(car.kind, TypeKind::Class);
            assert_eq!(car.bases, vec!["Vehicle".to_string()]);
            assert_eq!(car.implements, vec!["Drivable".to_string()]);
            assert!(car.doc.as_ref().unwrap().text.starts_with("A drivable car."));

            assert_eq!(car.methods.len(), 2);
            let start = &car.methods[0];
            assert_eq!(start.name, "start");
            assert_eq!(start.visibility, Visibility::Public);
            assert_eq!(start.params.len(), 1);
            assert_eq!(start.params[0].name, "speed");
            assert_eq!(start.params[0].ty.as_deref(), Some("int"));
            assert!(start.params[0].has_default);
            let doc = start.doc.as_ref().unwrap();
            assert_eq!(doc.params[0].name, "speed");
            assert_eq!(doc.returns.as_deref(), Some("bool"));

            let wash = &car.methods[1];
            assert_eq!(wash.visibility, Visibility::Private);
            assert!(wash.flags.is_static);

            assert_eq!(record.types[1].kind, TypeKind::Interface);
        }
    }
}

#[cfg(all(test, feature = "php-ast"))]
mod tests {
    use super::*;
    use crate::model::{AttributeKind, Receiver, RoutineKind, TypeKind, Visibility};
    use crate::record::RawAttrInit;

    async fn parse(source: &str) -> FileRecord {
        let mut frontend = PhpFrontEnd::new(FrontEndOptions::default()).unwrap();
        let file = WalkedFile {
            absolute: "src/Car.php".into(),
            relative: "src/Car.php".to_string(),
            language: Language::Php,
        };
        frontend.parse_file(source, &file).await.unwrap()
    }

    #[tokio::test]
    async fn extracts_namespaced_class() {
        let record = parse(
            "<?php\nnamespace App;\n\nuse Lib\\Base;\n\nclass Car extends Base implements Drivable {\n    private Engine $engine;\n    const WHEELS = 4;\n\n    public function __construct(Driver $driver) {\n        $this->engine = new Engine();\n        $this->driver = $driver;\n    }\n\n    public function drive(int $speed): bool {\n        $this->engine->start();\n        return true;\n    }\n}\n",
        )
        .await;

        assert_eq!(record.namespace.as_deref(), Some("App"));
        assert_eq!(record.imports.len(), 1);
        assert_eq!(record.types.len(), 1);

        let car = &record.types[0];
        assert_eq!(car.kind, TypeKind::Class);
        assert_eq!(car.bases, vec!["Base".to_string()]);
        assert_eq!(car.implements, vec!["Drivable".to_string()]);

        let engine_prop = car
            .attributes
            .iter()
            .find(|a| a.name == "engine" && a.kind == AttributeKind::Property)
            .unwrap();
        assert_eq!(engine_prop.declared_type.as_deref(), Some("Engine"));
        assert_eq!(engine_prop.visibility, Visibility::Private);

        let wheels = car.attributes.iter().find(|a| a.name == "WHEELS").unwrap();
        assert_eq!(wheels.kind, AttributeKind::Constant);
        assert_eq!(wheels.default.as_deref(), Some("4"));

        let engine_init = car
            .attributes
            .iter()
            .find(|a| a.name == "engine" && a.kind == AttributeKind::Instance)
            .unwrap();
        assert!(matches!(
            engine_init.init,
            Some(RawAttrInit::Constructed { ref ty }) if ty == "Engine"
        ));
        let driver = car
            .attributes
            .iter()
            .find(|a| a.name == "driver")
            .unwrap();
        assert!(matches!(
            driver.init,
            Some(RawAttrInit::FromParam { ref param }) if param == "driver"
        ));
        assert_eq!(driver.declared_type.as_deref(), Some("Driver"));

        let drive = car.methods.iter().find(|m| m.name == "drive").unwrap();
        assert_eq!(drive.kind, RoutineKind::Method);
        assert_eq!(drive.receiver, Some(Receiver::Instance));
        assert_eq!(drive.params[0].ty.as_deref(), Some("int"));
        assert!(drive
            .calls
            .iter()
            .any(|c| c.callee.contains("start") && c.receiver.as_deref() == Some("$this->engine")));
    }

    #[tokio::test]
    async fn traits_and_docblocks() {
        let record = parse(
            "<?php\ntrait Honks {\n    public function honk() {}\n}\n\n/**\n * Uses the horn.\n */\nclass Truck {\n    use Honks;\n}\n",
        )
        .await;
        assert_eq!(record.types.len(), 2);
        assert_eq!(record.types[0].kind, TypeKind::Trait);
        let truck = &record.types[1];
        assert_eq!(truck.uses_traits, vec!["Honks".to_string()]);
        assert_eq!(truck.doc.as_ref().unwrap().text, "Uses the horn.");
    }
}

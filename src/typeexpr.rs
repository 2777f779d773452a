//! Normalisation of declared type expressions.
//!
//! Reduces annotation text (`Optional[List[Engine]]`, `Engine[]`,
//! `Map<string, Engine>`, `?Engine`) to the core type name plus container
//! and nullability markers. Only declared or syntactically evident types are
//! handled; anything irreducible keeps its full text as the core.

/// Shape of a declared type expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeShape {
    /// The element/core type name the expression is about.
    pub core: String,
    /// The expression is a container of the core type.
    pub many: bool,
    /// The expression carries an optional/nullable marker.
    pub optional: bool,
}

const LIST_LIKE: &[&str] = &[
    "List", "list", "Set", "set", "FrozenSet", "frozenset", "Sequence", "Iterable", "Tuple",
    "tuple", "Array", "ReadonlyArray",
];
const MAP_LIKE: &[&str] = &["Dict", "dict", "Mapping", "MutableMapping", "Map", "Record"];
const NULLS: &[&str] = &["None", "null", "undefined", "void"];

pub fn analyze(raw: &str) -> TypeShape {
    let mut many = false;
    let mut optional = false;
    let mut text = raw.trim().to_string();

    loop {
        let current = text.trim().to_string();

        // PHP nullable prefix.
        if let Some(rest) = current.strip_prefix('?') {
            optional = true;
            text = rest.to_string();
            continue;
        }

        // Union types: drop null-like members, keep the first real one.
        if let Some(parts) = split_top_level(&current, '|') {
            let real: Vec<&String> = parts.iter().filter(|p| !NULLS.contains(&p.trim())).collect();
            if real.len() < parts.len() {
                optional = true;
            }
            match real.first() {
                Some(first) => {
                    if real.len() != 1 || first.trim() != current {
                        text = first.trim().to_string();
                        continue;
                    }
                }
                None => {
                    return TypeShape {
                        core: current,
                        many,
                        optional,
                    }
                }
            }
        }

        // Array suffix: `Engine[]`.
        if let Some(rest) = current.strip_suffix("[]") {
            many = true;
            text = rest.to_string();
            continue;
        }

        // Generic wrappers: `Name[...]` / `Name<...>`.
        if let Some((head, args)) = split_generic(&current) {
            if head == "Optional" {
                optional = true;
                text = args.first().cloned().unwrap_or_default();
                continue;
            }
            if LIST_LIKE.contains(&head.as_str()) {
                many = true;
                text = args.first().cloned().unwrap_or_default();
                continue;
            }
            if MAP_LIKE.contains(&head.as_str()) {
                many = true;
                text = args.get(1).or_else(|| args.first()).cloned().unwrap_or_default();
                continue;
            }
            // Unknown generic: the head is the type that matters.
            return TypeShape {
                core: head,
                many,
                optional,
            };
        }

        if current == "array" || current == "iterable" {
            // PHP bare containers carry no element type; nothing to resolve.
            return TypeShape {
                core: current,
                many: true,
                optional,
            };
        }

        return TypeShape {
            core: current,
            many,
            optional,
        };
    }
}

/// Split on a separator at bracket depth zero; None when the separator does
/// not occur there.
fn split_top_level(text: &str, sep: char) -> Option<Vec<String>> {
    let mut depth = 0i32;
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut found = false;
    for c in text.chars() {
        match c {
            '[' | '<' | '(' => depth += 1,
            ']' | '>' | ')' => depth -= 1,
            _ => {}
        }
        if c == sep && depth == 0 {
            found = true;
            parts.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(c);
        }
    }
    if !found {
        return None;
    }
    parts.push(current.trim().to_string());
    Some(parts)
}

/// `Name[A, B]` / `Name<A, B>` → (Name, [A, B]).
fn split_generic(text: &str) -> Option<(String, Vec<String>)> {
    let open = text.find(['[', '<'])?;
    let close_char = if text.as_bytes()[open] == b'[' { ']' } else { '>' };
    if !text.trim_end().ends_with(close_char) {
        return None;
    }
    let head = text[..open].trim().to_string();
    if head.is_empty() || !head.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '\\') {
        return None;
    }
    let inner = &text[open + 1..text.trim_end().len() - 1];
    let args = match split_top_level(inner, ',') {
        Some(parts) => parts,
        None => vec![inner.trim().to_string()],
    };
    Some((head, args))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(core: &str, many: bool, optional: bool) -> TypeShape {
        TypeShape {
            core: core.to_string(),
            many,
            optional,
        }
    }

    #[test]
    fn plain_names_pass_through() {
        assert_eq!(analyze("Engine"), shape("Engine", false, false));
        assert_eq!(analyze("App\\Engine"), shape("App\\Engine", false, false));
    }

    #[test]
    fn python_containers() {
        assert_eq!(analyze("List[Engine]"), shape("Engine", true, false));
        assert_eq!(analyze("dict[str, Engine]"), shape("Engine", true, false));
        assert_eq!(analyze("Optional[Engine]"), shape("Engine", false, true));
        assert_eq!(analyze("Optional[List[Engine]]"), shape("Engine", true, true));
        assert_eq!(analyze("Engine | None"), shape("Engine", false, true));
    }

    #[test]
    fn typescript_containers() {
        assert_eq!(analyze("Engine[]"), shape("Engine", true, false));
        assert_eq!(analyze("Array<Engine>"), shape("Engine", true, false));
        assert_eq!(analyze("Map<string, Engine>"), shape("Engine", true, false));
        assert_eq!(analyze("Engine | null"), shape("Engine", false, true));
    }

    #[test]
    fn php_nullable() {
        assert_eq!(analyze("?Engine"), shape("Engine", false, true));
        assert_eq!(analyze("Engine[]"), shape("Engine", true, false));
        assert_eq!(analyze("array"), shape("array", true, false));
    }
}

//! Structured documentation reader.
//!
//! Recognises parameter sections in the three conventional docstring styles
//! (keyword-led `Args:`, colon-led `:param x:`, field-led NumPy tables) and
//! the `@tag` vocabulary of doc-block comments. Tag parsing is
//! order-insensitive; section headers are style-specific.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::{Doc, DocParam};

fn re(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

static JS_PARAM: OnceLock<Regex> = OnceLock::new();
static PHP_PARAM: OnceLock<Regex> = OnceLock::new();
static BARE_PARAM: OnceLock<Regex> = OnceLock::new();
static RETURN_TAG: OnceLock<Regex> = OnceLock::new();
static THROWS_TAG: OnceLock<Regex> = OnceLock::new();
static COLON_PARAM: OnceLock<Regex> = OnceLock::new();
static COLON_RETURN: OnceLock<Regex> = OnceLock::new();
static COLON_RAISES: OnceLock<Regex> = OnceLock::new();
static KEYWORD_ENTRY: OnceLock<Regex> = OnceLock::new();
static FIELD_ENTRY: OnceLock<Regex> = OnceLock::new();

/// Parse documentation text into its verbatim form plus the structured
/// parameter map. The text is expected to be already stripped of quote or
/// comment markers.
pub fn parse_doc(text: &str) -> Doc {
    let mut doc = Doc {
        text: text.to_string(),
        ..Doc::default()
    };

    parse_tags(text, &mut doc);
    parse_colon_led(text, &mut doc);
    parse_keyword_led(text, &mut doc);
    parse_field_led(text, &mut doc);

    doc
}

/// Strip `/** … */` markers and per-line leading asterisks from a doc-block.
pub fn strip_block_comment(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("/**").unwrap_or(trimmed);
    let trimmed = trimmed.strip_prefix("/*").unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("*/").unwrap_or(trimmed);
    let mut lines = Vec::new();
    for line in trimmed.lines() {
        let line = line.trim();
        let line = line.strip_prefix('*').unwrap_or(line);
        lines.push(line.strip_prefix(' ').unwrap_or(line));
    }
    lines.join("\n").trim().to_string()
}

fn push_param(doc: &mut Doc, name: &str, description: &str) {
    // First sighting wins; styles never conflict in practice but a tag and a
    // section can both mention the same parameter.
    if doc.params.iter().any(|p| p.name == name) {
        return;
    }
    doc.params.push(DocParam {
        name: name.to_string(),
        description: description.trim().to_string(),
    });
}

/// `@param {type} name - desc` / `@param type $name desc` / `@param name desc`,
/// plus `@return(s)` and `@throws`.
fn parse_tags(text: &str, doc: &mut Doc) {
    let js = re(&JS_PARAM, r"(?m)^\s*@param\s+\{[^}]*\}\s+\[?([\w.$]+)\]?\s*(?:-\s*)?(.*)$");
    let php = re(&PHP_PARAM, r"(?m)^\s*@param\s+([\\\w|\[\]<>]+)\s+\$(\w+)\s*(.*)$");
    let bare = re(&BARE_PARAM, r"(?m)^\s*@param\s+\$?([\w.$]+)\s*(?:-\s*)?(.*)$");
    let ret = re(&RETURN_TAG, r"(?m)^\s*@returns?\s+(.*)$");
    let throws = re(&THROWS_TAG, r"(?m)^\s*@throws?\s+(\S+)(?:\s+.*)?$");

    for line in text.lines() {
        if let Some(caps) = js.captures(line) {
            push_param(doc, &caps[1], &caps[2]);
        } else if let Some(caps) = php.captures(line) {
            push_param(doc, &caps[2], &caps[3]);
        } else if let Some(caps) = bare.captures(line) {
            push_param(doc, &caps[1], &caps[2]);
        }
    }
    if doc.returns.is_none() {
        if let Some(caps) = ret.captures(text) {
            doc.returns = Some(caps[1].trim().to_string());
        }
    }
    for caps in throws.captures_iter(text) {
        let name = caps[1].to_string();
        if !doc.raises.contains(&name) {
            doc.raises.push(name);
        }
    }
}

/// Sphinx style: `:param name: desc`, `:returns: desc`, `:raises X: desc`.
fn parse_colon_led(text: &str, doc: &mut Doc) {
    let param = re(&COLON_PARAM, r"(?m)^\s*:param\s+(?:[\w\[\]., ]+\s+)??(\w+):\s*(.*)$");
    let ret = re(&COLON_RETURN, r"(?m)^\s*:returns?:\s*(.*)$");
    let raises = re(&COLON_RAISES, r"(?m)^\s*:raises?\s+(\S+?):");

    for caps in param.captures_iter(text) {
        push_param(doc, &caps[1], &caps[2]);
    }
    if doc.returns.is_none() {
        if let Some(caps) = ret.captures(text) {
            doc.returns = Some(caps[1].trim().to_string());
        }
    }
    for caps in raises.captures_iter(text) {
        let name = caps[1].to_string();
        if !doc.raises.contains(&name) {
            doc.raises.push(name);
        }
    }
}

fn is_keyword_header(line: &str) -> Option<&'static str> {
    match line.trim().trim_end_matches(':') {
        "Args" | "Arguments" | "Params" | "Parameters" if line.trim().ends_with(':') => {
            Some("params")
        }
        "Returns" | "Yields" if line.trim().ends_with(':') => Some("returns"),
        "Raises" if line.trim().ends_with(':') => Some("raises"),
        "Attributes" | "Example" | "Examples" | "Note" | "Notes" | "Warning"
            if line.trim().ends_with(':') =>
        {
            Some("other")
        }
        _ => None,
    }
}

/// Google style: an `Args:` header followed by indented `name: description`
/// entries until a blank line or the next recognised header.
fn parse_keyword_led(text: &str, doc: &mut Doc) {
    let entry = re(&KEYWORD_ENTRY, r"^\s+\*{0,2}(\w+)\s*(?:\([^)]*\))?\s*:\s*(.*)$");
    let mut section: Option<&str> = None;

    for line in text.lines() {
        if let Some(header) = is_keyword_header(line) {
            section = Some(header);
            continue;
        }
        match section {
            Some("params") => {
                if line.trim().is_empty() {
                    section = None;
                } else if let Some(caps) = entry.captures(line) {
                    push_param(doc, &caps[1], &caps[2]);
                }
            }
            Some("returns") => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    section = None;
                } else if doc.returns.is_none() {
                    doc.returns = Some(trimmed.to_string());
                }
            }
            Some("raises") => {
                if line.trim().is_empty() {
                    section = None;
                } else if let Some(caps) = entry.captures(line) {
                    let name = caps[1].to_string();
                    if !doc.raises.contains(&name) {
                        doc.raises.push(name);
                    }
                }
            }
            _ => {}
        }
    }
}

/// NumPy style: a `Parameters` header underlined with dashes, entries shaped
/// `name : type` with indented description lines.
fn parse_field_led(text: &str, doc: &mut Doc) {
    let entry = re(&FIELD_ENTRY, r"^(\w+)\s*:\s*.*$");
    let lines: Vec<&str> = text.lines().collect();

    let mut i = 0;
    while i + 1 < lines.len() {
        let header = lines[i].trim();
        let underline = lines[i + 1].trim();
        if (header == "Parameters" || header == "Other Parameters")
            && !underline.is_empty()
            && underline.chars().all(|c| c == '-')
        {
            let mut j = i + 2;
            let mut current: Option<(String, Vec<String>)> = None;
            while j < lines.len() {
                let line = lines[j];
                let trimmed = line.trim();
                // The section ends at a blank line followed by another
                // underlined header, or at the end of the text.
                if trimmed.is_empty() {
                    j += 1;
                    continue;
                }
                if j + 1 < lines.len()
                    && lines[j + 1].trim().chars().all(|c| c == '-')
                    && !lines[j + 1].trim().is_empty()
                {
                    break;
                }
                if !line.starts_with(' ') {
                    if let Some((name, desc)) = current.take() {
                        push_param(doc, &name, &desc.join(" "));
                    }
                    if let Some(caps) = entry.captures(trimmed) {
                        current = Some((caps[1].to_string(), Vec::new()));
                    }
                } else if let Some((_, desc)) = current.as_mut() {
                    desc.push(trimmed.to_string());
                }
                j += 1;
            }
            if let Some((name, desc)) = current.take() {
                push_param(doc, &name, &desc.join(" "));
            }
            i = j;
        } else {
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_led_params() {
        let doc = parse_doc(
            "Start the engine.\n\nArgs:\n    speed: Target speed.\n    mode (str): Drive mode.\n\nReturns:\n    Whether it started.\n",
        );
        assert_eq!(doc.params.len(), 2);
        assert_eq!(doc.params[0].name, "speed");
        assert_eq!(doc.params[0].description, "Target speed.");
        assert_eq!(doc.params[1].name, "mode");
        assert_eq!(doc.returns.as_deref(), Some("Whether it started."));
    }

    #[test]
    fn colon_led_params() {
        let doc = parse_doc(
            "Do things.\n\n:param count: How many.\n:param str label: A label.\n:returns: The result.\n:raises ValueError: On bad input.\n",
        );
        assert_eq!(doc.params.len(), 2);
        assert_eq!(doc.params[0].name, "count");
        assert_eq!(doc.params[1].name, "label");
        assert_eq!(doc.returns.as_deref(), Some("The result."));
        assert_eq!(doc.raises, vec!["ValueError".to_string()]);
    }

    #[test]
    fn field_led_params() {
        let doc = parse_doc(
            "Compute.\n\nParameters\n----------\nx : int\n    The first operand.\ny : int\n    The second operand.\n\nReturns\n-------\nint\n",
        );
        assert_eq!(doc.params.len(), 2);
        assert_eq!(doc.params[0].name, "x");
        assert_eq!(doc.params[0].description, "The first operand.");
    }

    #[test]
    fn jsdoc_tags() {
        let doc = parse_doc(
            "Drives the car.\n@param {number} speed - Target speed\n@param {string} mode Drive mode\n@returns {boolean} success\n@throws RangeError\n",
        );
        assert_eq!(doc.params.len(), 2);
        assert_eq!(doc.params[0].name, "speed");
        assert_eq!(doc.params[0].description, "Target speed");
        assert!(doc.returns.is_some());
        assert_eq!(doc.raises, vec!["RangeError".to_string()]);
    }

    #[test]
    fn phpdoc_tags() {
        let doc = parse_doc(
            "Stores a value.\n@param string $key The cache key\n@param mixed $value\n@return bool\n",
        );
        assert_eq!(doc.params.len(), 2);
        assert_eq!(doc.params[0].name, "key");
        assert_eq!(doc.params[0].description, "The cache key");
        assert_eq!(doc.returns.as_deref(), Some("bool"));
    }

    #[test]
    fn strips_block_comments() {
        let cleaned = strip_block_comment("/**\n * Summary line.\n *\n * @param string $x\n */");
        assert!(cleaned.starts_with("Summary line."));
        assert!(cleaned.contains("@param string $x"));
    }

    #[test]
    fn block_stops_at_blank_line() {
        let doc = parse_doc("Args:\n    a: First.\n\n    b: not a param anymore\n");
        assert_eq!(doc.params.len(), 1);
        assert_eq!(doc.params[0].name, "a");
    }
}

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};
use crate::model::EdgeKind;

/// Configuration for one analysis run.
///
/// The crate never reads this from disk; callers build it in memory (or
/// deserialize it themselves) and pass it to [`crate::analyse`]. Validation
/// runs before any file is opened and violations are fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Directory names pruned during the walk, in order.
    pub exclude_dirs: Vec<String>,

    /// Filename globs skipped during the walk, in order.
    pub exclude_files: Vec<String>,

    /// Per-language front-end settings.
    pub languages: LanguagesConfig,

    /// Files larger than this many bytes are skipped with a diagnostic.
    pub max_file_size: usize,

    /// Call-chain reconstruction settings.
    pub flow: FlowConfig,

    /// Which relationship edge kinds the detector computes.
    pub relationships: RelationshipConfig,

    /// JS/TS helper process settings.
    pub js_helper: HelperConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguagesConfig {
    pub python: LanguageConfig,
    pub php: LanguageConfig,
    pub javascript: LanguageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageConfig {
    /// Whether this front-end participates in the run.
    pub enabled: bool,

    /// Extensions (without the dot) the walker associates with this front-end.
    pub extensions: Vec<String>,

    /// Capture documentation text and parameter sections.
    pub detect_docstrings: bool,

    /// Capture declared type annotations.
    pub detect_types: bool,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            extensions: Vec::new(),
            detect_docstrings: true,
            detect_types: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Bounds call-chain recursion. Must be >= 1.
    pub max_depth: usize,

    /// Explicit entry points; when absent every public routine is an entry.
    pub entry_points: Option<Vec<EntryPointSpec>>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            entry_points: None,
        }
    }
}

/// An explicitly requested flow entry: a method of a type, or a module-level
/// function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryPointSpec {
    Method { class: String, method: String },
    Function { module: String, function: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipConfig {
    /// Edge kinds to compute. Only the detector-owned kinds are meaningful
    /// here; inheritance edges always exist once the model is sealed.
    pub detect: BTreeSet<EdgeKind>,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        let mut detect = BTreeSet::new();
        detect.insert(EdgeKind::Imports);
        detect.insert(EdgeKind::Composes);
        detect.insert(EdgeKind::Aggregates);
        detect.insert(EdgeKind::Associates);
        Self { detect }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HelperConfig {
    /// Executable used to run the embedded helper script.
    pub command: String,

    /// Per-request timeout in milliseconds; an expired request counts as a
    /// parse failure for that file only.
    pub timeout_ms: u64,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            command: "node".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl Default for LanguagesConfig {
    fn default() -> Self {
        Self {
            python: LanguageConfig {
                extensions: vec!["py".into()],
                ..LanguageConfig::default()
            },
            php: LanguageConfig {
                extensions: vec!["php".into()],
                ..LanguageConfig::default()
            },
            javascript: LanguageConfig {
                extensions: vec!["js".into(), "jsx".into(), "ts".into(), "tsx".into()],
                ..LanguageConfig::default()
            },
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            exclude_dirs: vec![
                ".git".into(),
                "node_modules".into(),
                "vendor".into(),
                "__pycache__".into(),
                ".venv".into(),
                "venv".into(),
                "dist".into(),
                "build".into(),
            ],
            exclude_files: vec!["*.min.js".into(), "*.d.ts".into()],
            languages: LanguagesConfig::default(),
            max_file_size: 1024 * 1024,
            flow: FlowConfig::default(),
            relationships: RelationshipConfig::default(),
            js_helper: HelperConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Check the configuration before the pipeline touches any file.
    pub fn validate(&self) -> Result<()> {
        if self.flow.max_depth < 1 {
            return Err(AtlasError::Config(
                "flow.max_depth must be at least 1".to_string(),
            ));
        }
        if self.max_file_size == 0 {
            return Err(AtlasError::Config(
                "max_file_size must be positive".to_string(),
            ));
        }
        for (name, lang) in [
            ("python", &self.languages.python),
            ("php", &self.languages.php),
            ("javascript", &self.languages.javascript),
        ] {
            if lang.enabled && lang.extensions.is_empty() {
                return Err(AtlasError::Config(format!(
                    "languages.{name} is enabled but has no extensions"
                )));
            }
            for ext in &lang.extensions {
                if ext.is_empty() || ext.starts_with('.') {
                    return Err(AtlasError::Config(format!(
                        "languages.{name}: extension `{ext}` must be non-empty and written without the dot"
                    )));
                }
            }
        }
        for kind in &self.relationships.detect {
            if !kind.detector_owned() {
                return Err(AtlasError::Config(format!(
                    "relationships.detect may only list detector-owned kinds, got `{kind}`"
                )));
            }
        }
        if self.js_helper.command.is_empty() {
            return Err(AtlasError::Config(
                "js_helper.command must not be empty".to_string(),
            ));
        }
        if self.js_helper.timeout_ms == 0 {
            return Err(AtlasError::Config(
                "js_helper.timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        AnalysisConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_zero_depth() {
        let mut config = AnalysisConfig::default();
        config.flow.max_depth = 0;
        assert!(matches!(config.validate(), Err(AtlasError::Config(_))));
    }

    #[test]
    fn rejects_enabled_language_without_extensions() {
        let mut config = AnalysisConfig::default();
        config.languages.php.extensions.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_dotted_extension() {
        let mut config = AnalysisConfig::default();
        config.languages.python.extensions = vec![".py".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_builder_owned_edge_kind() {
        let mut config = AnalysisConfig::default();
        config.relationships.detect.insert(EdgeKind::Inherits);
        assert!(config.validate().is_err());
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Category of a per-run diagnostic. One entry is recorded for every skipped
/// file, degraded front-end, or unresolved reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCategory {
    /// An entry could not be accessed or was skipped before parsing.
    WalkFailure,
    /// A front-end could not build records for a file.
    ParseFailure,
    /// A reference bound to the External sentinel.
    ResolutionMiss,
    /// Two entities claimed the same identifier; the ordinal suffix resolved
    /// it but the original name is recorded here.
    IdentifierDisambiguated,
    /// The JS/TS helper could not be started; the front-end is disabled.
    HelperUnavailable,
}

impl DiagnosticCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WalkFailure => "walk_failure",
            Self::ParseFailure => "parse_failure",
            Self::ResolutionMiss => "resolution_miss",
            Self::IdentifierDisambiguated => "identifier_disambiguated",
            Self::HelperUnavailable => "helper_unavailable",
        }
    }
}

/// Front-end stage in which a parse failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStage {
    Tokenize,
    Parse,
    Extract,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(category: DiagnosticCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            path: None,
            line: None,
            message: message.into(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Parse failures carry the front-end name and the stage that failed.
    pub fn parse_failure(
        frontend: &str,
        stage: ParseStage,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let stage = match stage {
            ParseStage::Tokenize => "tokenize",
            ParseStage::Parse => "parse",
            ParseStage::Extract => "extract",
        };
        Self {
            category: DiagnosticCategory::ParseFailure,
            path: Some(path.into()),
            line: None,
            message: format!("{frontend} ({stage}): {}", message.into()),
        }
    }
}

/// Run-level counters exposed through the analysis result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    /// Entity counts keyed by kind (`modules`, `types`, `routines`,
    /// `attributes`).
    pub entities: BTreeMap<String, usize>,
    /// Relationship edge counts keyed by edge kind.
    pub edges: BTreeMap<String, usize>,
    /// Flow trace counts keyed by terminal marker.
    pub terminals: BTreeMap<String, usize>,
    pub files_parsed: usize,
    pub files_failed: usize,
}

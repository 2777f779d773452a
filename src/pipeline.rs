//! Pipeline orchestration: Walk → Parse → Build → Detect → Analyze, with
//! hard phase boundaries. Parsing is sequential in stable walk order so
//! identifiers never depend on completion order. Cancellation is honoured
//! between phases and at file boundaries inside the Parse phase; a cancelled
//! run returns the partial model marked incomplete.

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::builder;
use crate::config::AnalysisConfig;
use crate::diagnostics::{Diagnostic, DiagnosticCategory};
use crate::error::Result;
use crate::flow;
use crate::languages::{
    FrontEnd, FrontEndOptions, JavaScriptFrontEnd, PhpFrontEnd, PythonFrontEnd,
};
use crate::model::{Language, SemanticModel};
use crate::record::FileRecord;
use crate::relations;
use crate::result::{summarize, AnalysisResult};
use crate::walker::SourceWalker;

/// The analysis engine: owns a validated configuration and runs the
/// five-phase pipeline over a project root.
pub struct Analyzer {
    config: AnalysisConfig,
}

impl Analyzer {
    /// Validate the configuration up front; violations are fatal before any
    /// file is opened.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub async fn analyse(&self, root: &Path) -> Result<AnalysisResult> {
        self.analyse_with_cancel(root, CancellationToken::new())
            .await
    }

    pub async fn analyse_with_cancel(
        &self,
        root: &Path,
        cancel: CancellationToken,
    ) -> Result<AnalysisResult> {
        info!(root = %root.display(), "analysis starting");

        // Phase 1: Walk.
        let walker = SourceWalker::from_config(root, &self.config)?;
        let (files, mut diagnostics) = walker.walk();
        if cancel.is_cancelled() {
            return Ok(incomplete(SemanticModel::default(), diagnostics, 0, 0));
        }

        // Phase 2: Parse. Front-ends are constructed per run; the JS helper
        // is acquired here and released on every exit path once the phase
        // ends.
        let mut python = match self.config.languages.python.enabled {
            true => Some(PythonFrontEnd::new(options_of(
                &self.config.languages.python,
            ))?),
            false => None,
        };
        let mut php = match self.config.languages.php.enabled {
            true => Some(PhpFrontEnd::new(options_of(&self.config.languages.php))?),
            false => None,
        };
        let mut javascript = self.config.languages.javascript.enabled.then(|| {
            JavaScriptFrontEnd::new(
                options_of(&self.config.languages.javascript),
                self.config.js_helper.clone(),
            )
        });

        let wants_js = files.iter().any(|f| {
            matches!(f.language, Language::JavaScript | Language::TypeScript)
        });
        let mut js_available = false;
        if wants_js {
            if let Some(js) = javascript.as_mut() {
                match js.ensure_available().await {
                    Ok(()) => js_available = true,
                    Err(message) => {
                        diagnostics.push(Diagnostic::new(
                            DiagnosticCategory::HelperUnavailable,
                            format!("JS/TS front-end disabled: {message}"),
                        ));
                    }
                }
            }
        }

        let mut records: Vec<FileRecord> = Vec::new();
        let mut files_failed = 0usize;
        let mut cancelled = false;
        for file in &files {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let frontend: Option<&mut dyn FrontEnd> = match file.language {
                Language::Python => python.as_mut().map(|f| f as &mut dyn FrontEnd),
                Language::Php => php.as_mut().map(|f| f as &mut dyn FrontEnd),
                Language::JavaScript | Language::TypeScript => {
                    if js_available {
                        javascript.as_mut().map(|f| f as &mut dyn FrontEnd)
                    } else {
                        None
                    }
                }
            };
            let Some(frontend) = frontend else {
                continue;
            };

            let source = match std::fs::read_to_string(&file.absolute) {
                Ok(source) => source,
                Err(e) => {
                    diagnostics.push(
                        Diagnostic::new(DiagnosticCategory::WalkFailure, e.to_string())
                            .with_path(file.relative.clone()),
                    );
                    continue;
                }
            };

            let name = frontend.name();
            match frontend.parse_file(&source, file).await {
                Ok(record) => records.push(record),
                Err(failure) => {
                    // A parse failure never propagates beyond its file.
                    warn!(path = %file.relative, frontend = name, "parse failed");
                    files_failed += 1;
                    diagnostics.push(Diagnostic::parse_failure(
                        name,
                        failure.stage,
                        file.relative.clone(),
                        failure.message,
                    ));
                }
            }
        }
        // The helper pool never outlives the Parse phase.
        if let Some(js) = javascript.as_mut() {
            js.shutdown().await;
        }
        let files_parsed = records.len();
        debug!(files_parsed, files_failed, "parse phase complete");
        if cancelled {
            return Ok(incomplete(
                SemanticModel::default(),
                diagnostics,
                files_parsed,
                files_failed,
            ));
        }

        // Phase 3: Build. Identifier collisions surviving disambiguation are
        // the one fatal outcome past configuration checking.
        let mut model = builder::build(&records, &mut diagnostics)?;
        if cancel.is_cancelled() {
            return Ok(incomplete(model, diagnostics, files_parsed, files_failed));
        }

        // Phase 4: Detect relationships over the fully sealed model.
        relations::detect(&mut model, &self.config.relationships);
        if cancel.is_cancelled() {
            return Ok(incomplete(model, diagnostics, files_parsed, files_failed));
        }

        // Phase 5: Flow analysis over the fully edged model.
        let complete = flow::analyze(&mut model, &self.config.flow, &cancel);

        let summary = summarize(&model, files_parsed, files_failed);
        info!(
            modules = model.modules.len(),
            types = model.types.len(),
            routines = model.routines.len(),
            edges = model.relationships.len(),
            complete,
            "analysis finished"
        );
        Ok(AnalysisResult {
            model,
            diagnostics,
            summary,
            complete,
        })
    }
}

fn options_of(config: &crate::config::LanguageConfig) -> FrontEndOptions {
    FrontEndOptions {
        detect_docstrings: config.detect_docstrings,
        detect_types: config.detect_types,
    }
}

fn incomplete(
    model: SemanticModel,
    diagnostics: Vec<Diagnostic>,
    files_parsed: usize,
    files_failed: usize,
) -> AnalysisResult {
    let summary = summarize(&model, files_parsed, files_failed);
    AnalysisResult {
        model,
        diagnostics,
        summary,
        complete: false,
    }
}

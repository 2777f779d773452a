//! codeatlas analyses a source tree in Python, PHP, JavaScript and
//! TypeScript into a language-neutral semantic model: entities (modules,
//! types, routines, attributes), their containment, directional
//! relationships (inheritance, implementation, trait use, composition,
//! aggregation, association, imports), and bounded inter-procedural call
//! flows that seed sequence diagrams.
//!
//! The crate is the analysis pipeline only. It never reads configuration
//! files, parses command-line flags, renders output formats, or touches the
//! network; callers construct an [`AnalysisConfig`] in memory and consume
//! the [`AnalysisResult`] (or its serialised document) themselves.
//!
//! ```no_run
//! use codeatlas::{analyse, AnalysisConfig};
//!
//! # async fn run() -> codeatlas::Result<()> {
//! let result = analyse("path/to/project", AnalysisConfig::default()).await?;
//! println!("{} types", result.model.types.len());
//! println!("{}", result.to_json()?);
//! # Ok(())
//! # }
//! ```

mod builder;
mod config;
mod diagnostics;
mod docparse;
mod error;
mod flow;
mod languages;
pub mod model;
mod pipeline;
mod record;
mod relations;
mod result;
mod typeexpr;
mod walker;

pub use config::{
    AnalysisConfig, EntryPointSpec, FlowConfig, HelperConfig, LanguageConfig, LanguagesConfig,
    RelationshipConfig,
};
pub use diagnostics::{Diagnostic, DiagnosticCategory, ParseStage, Summary};
pub use error::{AtlasError, Result};
pub use pipeline::Analyzer;
pub use result::AnalysisResult;

use std::path::Path;

use tokio_util::sync::CancellationToken;

/// Analyse a project root with the given configuration.
pub async fn analyse(root: impl AsRef<Path>, config: AnalysisConfig) -> Result<AnalysisResult> {
    Analyzer::new(config)?.analyse(root.as_ref()).await
}

/// Analyse with a cancellation token. Cancellation is cooperative at phase,
/// file, and entry boundaries; a cancelled run returns a partial result with
/// `complete == false`.
pub async fn analyse_with_cancel(
    root: impl AsRef<Path>,
    config: AnalysisConfig,
    cancel: CancellationToken,
) -> Result<AnalysisResult> {
    Analyzer::new(config)?
        .analyse_with_cancel(root.as_ref(), cancel)
        .await
}

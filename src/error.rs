use thiserror::Error;

/// Fatal failures of the analysis pipeline.
///
/// Recoverable conditions (unreadable files, parse failures, unresolved
/// references, a missing JS helper) are not errors; they are recorded as
/// [`crate::diagnostics::Diagnostic`] values and the run completes.
#[derive(Error, Debug)]
pub enum AtlasError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Identifier collision: `{id}` claimed by both {first} and {second}")]
    IdentifierCollision {
        id: String,
        first: String,
        second: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AtlasError>;

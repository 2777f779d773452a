//! Language front-ends.
//!
//! Each front-end converts one source file into a [`FileRecord`] in the
//! common schema. They share the capability contract below but differ
//! radically in how they obtain the records: Python and PHP parse in
//! process, JS/TS delegates to an out-of-process helper.

mod javascript;
mod php;
mod python;

pub use javascript::JavaScriptFrontEnd;
pub use php::PhpFrontEnd;
pub use python::PythonFrontEnd;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::diagnostics::ParseStage;
use crate::record::FileRecord;
use crate::walker::WalkedFile;

/// Per-front-end extraction toggles, taken from the language config.
#[derive(Debug, Clone, Copy)]
pub struct FrontEndOptions {
    pub detect_docstrings: bool,
    pub detect_types: bool,
}

impl Default for FrontEndOptions {
    fn default() -> Self {
        Self {
            detect_docstrings: true,
            detect_types: true,
        }
    }
}

/// A per-file failure inside a front-end. Never propagates beyond the file;
/// the pipeline converts it into a ParseFailure diagnostic.
#[derive(Debug, Clone)]
pub struct FrontEndFailure {
    pub stage: ParseStage,
    pub message: String,
}

impl FrontEndFailure {
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            stage: ParseStage::Parse,
            message: message.into(),
        }
    }

    pub fn extract(message: impl Into<String>) -> Self {
        Self {
            stage: ParseStage::Extract,
            message: message.into(),
        }
    }
}

/// Capability contract shared by all front-ends.
#[async_trait]
pub trait FrontEnd: Send {
    /// Front-end identity used in diagnostics.
    fn name(&self) -> &'static str;

    /// Convert one source file into records. A failure here affects only
    /// this file.
    async fn parse_file(
        &mut self,
        source: &str,
        file: &WalkedFile,
    ) -> Result<FileRecord, FrontEndFailure>;

    /// Release any resources whose lifetime spans the Parse phase.
    async fn shutdown(&mut self) {}
}

/// SHA-256 of the source text, recorded on every module for downstream
/// change detection.
pub fn content_hash(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

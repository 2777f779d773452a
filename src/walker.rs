use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::AnalysisConfig;
use crate::diagnostics::{Diagnostic, DiagnosticCategory};
use crate::error::{AtlasError, Result};
use crate::model::Language;

/// A file selected for parsing.
#[derive(Debug, Clone)]
pub struct WalkedFile {
    pub absolute: PathBuf,
    /// Forward-slash path relative to the project root.
    pub relative: String,
    pub language: Language,
}

/// Enumerates source files under a root, applying exclude rules and language
/// extension mapping before any file is opened. Symbolic links are never
/// followed.
pub struct SourceWalker {
    root: PathBuf,
    exclude_dirs: Vec<String>,
    exclude_files: GlobSet,
    extensions: BTreeMap<String, Language>,
    max_file_size: u64,
}

impl SourceWalker {
    pub fn from_config(root: &Path, config: &AnalysisConfig) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.exclude_files {
            let glob = Glob::new(pattern).map_err(|e| {
                AtlasError::Config(format!("invalid exclude_files glob `{pattern}`: {e}"))
            })?;
            builder.add(glob);
        }
        let exclude_files = builder
            .build()
            .map_err(|e| AtlasError::Config(format!("exclude_files: {e}")))?;

        let mut extensions = BTreeMap::new();
        if config.languages.python.enabled {
            for ext in &config.languages.python.extensions {
                extensions.insert(ext.clone(), Language::Python);
            }
        }
        if config.languages.php.enabled {
            for ext in &config.languages.php.extensions {
                extensions.insert(ext.clone(), Language::Php);
            }
        }
        if config.languages.javascript.enabled {
            for ext in &config.languages.javascript.extensions {
                let language = if ext.starts_with("ts") || ext.ends_with("ts") {
                    Language::TypeScript
                } else {
                    Language::JavaScript
                };
                extensions.insert(ext.clone(), language);
            }
        }

        Ok(Self {
            root: root.to_path_buf(),
            exclude_dirs: config.exclude_dirs.clone(),
            exclude_files,
            extensions,
            max_file_size: config.max_file_size as u64,
        })
    }

    /// Produce the stable file list: lexicographic by relative path, so
    /// downstream identifier assignment is deterministic. Unreadable entries
    /// become diagnostics, never errors.
    pub fn walk(&self) -> (Vec<WalkedFile>, Vec<Diagnostic>) {
        let mut files = Vec::new();
        let mut diagnostics = Vec::new();

        let exclude_dirs = self.exclude_dirs.clone();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(move |entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                !exclude_dirs.iter().any(|d| d.as_str() == name)
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| self.relative_of(p))
                        .unwrap_or_else(|| "<unknown>".to_string());
                    diagnostics.push(
                        Diagnostic::new(DiagnosticCategory::WalkFailure, e.to_string())
                            .with_path(path),
                    );
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if self.exclude_files.is_match(name.as_ref()) {
                continue;
            }
            let Some(language) = self.language_of(entry.path()) else {
                continue;
            };
            let relative = self.relative_of(entry.path());

            match entry.metadata() {
                Ok(meta) if meta.len() > self.max_file_size => {
                    diagnostics.push(
                        Diagnostic::new(
                            DiagnosticCategory::WalkFailure,
                            format!("file exceeds max_file_size ({} bytes)", meta.len()),
                        )
                        .with_path(relative),
                    );
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    diagnostics.push(
                        Diagnostic::new(DiagnosticCategory::WalkFailure, e.to_string())
                            .with_path(relative),
                    );
                    continue;
                }
            }

            files.push(WalkedFile {
                absolute: entry.path().to_path_buf(),
                relative,
                language,
            });
        }

        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        debug!(count = files.len(), "source walk complete");
        (files, diagnostics)
    }

    fn language_of(&self, path: &Path) -> Option<Language> {
        let ext = path.extension()?.to_str()?;
        self.extensions.get(ext).copied()
    }

    fn relative_of(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        parts.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn walk_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "b.py", "x = 1\n");
        write(root, "a.py", "y = 2\n");
        write(root, "node_modules/skip.js", "var x;\n");
        write(root, "pkg/c.php", "<?php\n");
        write(root, "notes.txt", "hello\n");
        write(root, "lib.min.js", "var y;\n");

        let walker = SourceWalker::from_config(root, &AnalysisConfig::default()).unwrap();
        let (files, diagnostics) = walker.walk();

        let relatives: Vec<&str> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(relatives, vec!["a.py", "b.py", "pkg/c.php"]);
        assert_eq!(files[0].language, Language::Python);
        assert_eq!(files[2].language, Language::Php);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn typescript_extensions_get_their_own_tag() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "a.ts", "export {};\n");
        write(root, "b.js", "var x;\n");

        let walker = SourceWalker::from_config(root, &AnalysisConfig::default()).unwrap();
        let (files, _) = walker.walk();
        assert_eq!(files[0].language, Language::TypeScript);
        assert_eq!(files[1].language, Language::JavaScript);
    }

    #[test]
    fn oversized_files_are_skipped_with_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "big.py", &"# filler\n".repeat(100));

        let mut config = AnalysisConfig::default();
        config.max_file_size = 16;
        let walker = SourceWalker::from_config(root, &config).unwrap();
        let (files, diagnostics) = walker.walk();
        assert!(files.is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].category, DiagnosticCategory::WalkFailure);
    }

    #[test]
    fn disabled_language_is_not_walked() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "a.py", "x = 1\n");
        write(root, "b.php", "<?php\n");

        let mut config = AnalysisConfig::default();
        config.languages.php.enabled = false;
        let walker = SourceWalker::from_config(root, &config).unwrap();
        let (files, _) = walker.walk();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative, "a.py");
    }
}

//! Source discovery and loading.

use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Per-file failure while reading a source document
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not valid UTF-8 (first invalid byte at offset {offset})", .path.display())]
    InvalidEncoding { path: PathBuf, offset: usize },
}

impl LoadError {
    pub fn path(&self) -> &Path {
        match self {
            LoadError::Unreadable { path, .. } | LoadError::InvalidEncoding { path, .. } => path,
        }
    }
}

/// Raw text of one discovered file, before front matter parsing
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the content root, with forward slashes
    pub rel_path: String,
    pub text: String,
}

/// Walks a content root and reads recognized source files
#[derive(Debug, Clone)]
pub struct ContentLoader {
    root: PathBuf,
    extensions: Vec<String>,
    ignore: Vec<Regex>,
}

impl ContentLoader {
    pub fn new(root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            root: root.into(),
            extensions,
            ignore: Vec::new(),
        }
    }

    pub fn with_ignore_patterns(mut self, ignore: Vec<Regex>) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check that the root itself can be listed.
    ///
    /// This is the one failure that stops a whole run.
    pub fn check_root(&self) -> io::Result<()> {
        fs::read_dir(&self.root).map(|_| ())
    }

    /// Discover source paths under the root, sorted for stable runs.
    ///
    /// Entries the walker cannot descend into are logged and skipped.
    pub fn discover(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!("Skipping unreadable entry under {:?}: {}", self.root, err);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.has_source_extension(entry.path()) {
                continue;
            }

            let rel = self.rel_path(entry.path());
            if self.ignore.iter().any(|re| re.is_match(&rel)) {
                tracing::debug!("Ignoring {} due to ignore_patterns", rel);
                continue;
            }

            files.push(entry.into_path());
        }

        files.sort();
        files
    }

    /// Read one source file
    pub fn load(&self, path: &Path) -> Result<SourceFile, LoadError> {
        let bytes = fs::read(path).map_err(|source| LoadError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        let text = String::from_utf8(bytes).map_err(|err| LoadError::InvalidEncoding {
            path: path.to_path_buf(),
            offset: err.utf8_error().valid_up_to(),
        })?;

        Ok(SourceFile {
            path: path.to_path_buf(),
            rel_path: self.rel_path(path),
            text,
        })
    }

    fn has_source_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.extensions
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    fn rel_path(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn loader(root: &Path) -> ContentLoader {
        ContentLoader::new(root, vec!["md".to_string()])
    }

    #[test]
    fn test_discovers_only_source_files() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("2024/images")).unwrap();
        fs::write(dir.path().join("a.md"), "a").unwrap();
        fs::write(dir.path().join("2024/b.MD"), "b").unwrap();
        fs::write(dir.path().join("2024/images/c.png"), [0u8, 1, 2]).unwrap();

        let found = loader(dir.path()).discover();
        assert_eq!(
            found,
            vec![dir.path().join("2024/b.MD"), dir.path().join("a.md")]
        );
    }

    #[test]
    fn test_ignore_patterns_use_relative_paths() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("drafts")).unwrap();
        fs::write(dir.path().join("keep.md"), "x").unwrap();
        fs::write(dir.path().join("drafts/skip.md"), "x").unwrap();

        let loader =
            loader(dir.path()).with_ignore_patterns(vec![Regex::new("^drafts/").unwrap()]);
        assert_eq!(loader.discover(), vec![dir.path().join("keep.md")]);
    }

    #[test]
    fn test_invalid_utf8_is_per_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bad.md"), [b'o', b'k', 0xff, 0xfe]).unwrap();
        fs::write(dir.path().join("good.md"), "fine").unwrap();

        let loader = loader(dir.path());
        let results: Vec<_> = loader
            .discover()
            .iter()
            .map(|path| loader.load(path))
            .collect();
        assert_eq!(results.len(), 2);

        match &results[0] {
            Err(LoadError::InvalidEncoding { path, offset }) => {
                assert!(path.ends_with("bad.md"));
                assert_eq!(*offset, 2);
            }
            other => panic!("expected InvalidEncoding, got {:?}", other),
        }
        let good = results[1].as_ref().unwrap();
        assert_eq!(good.rel_path, "good.md");
        assert_eq!(good.text, "fine");
    }

    #[test]
    fn test_missing_root_fails_check() {
        let dir = tempdir().unwrap();
        let loader = loader(&dir.path().join("nope"));
        assert!(loader.check_root().is_err());
    }
}

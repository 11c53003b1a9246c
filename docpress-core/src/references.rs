//! Reference resolution for images, includes, and inter-document links.
//!
//! Every directive found in a body becomes a [`Reference`]. A target that
//! does not exist is recorded as broken instead of failing the document, so a
//! whole run's broken references can be fixed in one pass.

use crate::config::Config;
use crate::directives::{self, Directive};
use crate::models::{Document, Reference, ReferenceKind, ResolutionStatus};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Attribute prefix that points an include at the snippets root
pub const SNIPPETS_ATTR: &str = "{snippets}";

/// Non-fatal report entry for a reference whose target was missing
#[derive(Error, Debug, Clone, Serialize)]
#[error("broken {kind} reference '{target}' in {} (looked for {})", .document.display(), .resolved.display())]
pub struct BrokenReferenceWarning {
    pub document: PathBuf,
    pub kind: ReferenceKind,
    pub target: String,
    pub resolved: PathBuf,
}

impl BrokenReferenceWarning {
    pub fn from_reference(document: &Document, reference: &Reference) -> Self {
        Self {
            document: document.source_path.clone(),
            kind: reference.kind(),
            target: reference.raw().to_string(),
            resolved: reference.target().clone(),
        }
    }
}

/// Resolves directive targets against the content, asset and snippet roots
#[derive(Debug, Clone)]
pub struct ReferenceResolver {
    content_root: PathBuf,
    asset_root: PathBuf,
    snippets_root: Option<PathBuf>,
    document_extensions: Vec<String>,
}

impl ReferenceResolver {
    pub fn new(content_root: impl Into<PathBuf>, asset_root: impl Into<PathBuf>) -> Self {
        Self {
            content_root: content_root.into(),
            asset_root: asset_root.into(),
            snippets_root: None,
            document_extensions: vec!["md".to_string(), "markdown".to_string()],
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            content_root: config.content_dir(),
            asset_root: config.assets_dir(),
            snippets_root: config.snippets_dir(),
            document_extensions: config.extensions.clone(),
        }
    }

    pub fn with_snippets_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.snippets_root = Some(root.into());
        self
    }

    /// Attach a reference for every directive in the document body
    pub fn resolve(&self, mut document: Document) -> Document {
        let directives = self.scan(&document.body);
        let base_dir = document
            .source_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.content_root.clone());

        document.references = directives
            .into_iter()
            .map(|directive| self.resolve_directive(&directive, &base_dir))
            .collect();

        for broken in document.broken_references() {
            tracing::debug!(
                "Broken {} reference '{}' in {}",
                broken.kind(),
                broken.raw(),
                document.rel_path
            );
        }

        document
    }

    /// All directives in a body, in line order
    pub fn scan(&self, body: &str) -> Vec<Directive> {
        let mut found = directives::scan_line_directives(body);
        found.extend(directives::scan_markdown_targets(body, |path| {
            self.is_document_path(path)
        }));
        // Stable sort keeps same-line directives in scan order
        found.sort_by_key(|d| d.line);
        found
    }

    fn resolve_directive(&self, directive: &Directive, base_dir: &Path) -> Reference {
        let candidates = match directive.kind {
            ReferenceKind::Image => self.image_candidates(&directive.target, base_dir),
            ReferenceKind::Include => self.include_candidates(&directive.target, base_dir),
            ReferenceKind::Link => self.link_candidates(&directive.target, base_dir),
        };

        let hit = candidates.iter().find(|p| p.is_file()).cloned();
        let (target, status) = match hit {
            Some(path) => (path, ResolutionStatus::Resolved),
            // Report the first place we looked
            None => (
                candidates
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| PathBuf::from(&directive.target)),
                ResolutionStatus::Broken,
            ),
        };

        Reference::new(directive.kind, directive.target.clone(), target, status)
    }

    fn image_candidates(&self, target: &str, base_dir: &Path) -> Vec<PathBuf> {
        let path = directives::strip_fragment(target);
        match path.strip_prefix('/') {
            Some(rooted) => vec![join_clean(&self.asset_root, rooted)],
            None => vec![
                join_clean(&self.asset_root, path),
                join_clean(base_dir, path),
            ],
        }
    }

    fn include_candidates(&self, target: &str, base_dir: &Path) -> Vec<PathBuf> {
        if let Some(rest) = target.strip_prefix(SNIPPETS_ATTR) {
            return match &self.snippets_root {
                Some(root) => vec![join_clean(root, rest.trim_start_matches('/'))],
                None => Vec::new(),
            };
        }
        vec![join_clean(base_dir, target)]
    }

    fn link_candidates(&self, target: &str, base_dir: &Path) -> Vec<PathBuf> {
        let path = directives::strip_fragment(target);
        match path.strip_prefix('/') {
            Some(rooted) => vec![join_clean(&self.content_root, rooted)],
            None => vec![join_clean(base_dir, path)],
        }
    }

    fn is_document_path(&self, path: &str) -> bool {
        Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.document_extensions
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

/// Join `rel` onto `base`, folding `.` and `..` lexically
fn join_clean(base: &Path, rel: &str) -> PathBuf {
    let mut out = base.to_path_buf();
    for component in Path::new(rel).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
            Component::RootDir | Component::Prefix(_) => {}
        }
    }
    out
}

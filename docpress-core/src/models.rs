//! Content model structs for documents, code blocks, and references.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A parsed source document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Absolute path of the source file (document identity)
    pub source_path: PathBuf,

    /// Path relative to the content root, with forward slashes
    pub rel_path: String,

    /// URL slug (front matter `slug`, else the file stem)
    pub slug: String,

    pub title: String,

    /// Publication timestamp; date-only values are midnight UTC
    pub date: DateTime<Utc>,

    pub draft: bool,

    /// Tags in front matter order
    pub tags: Vec<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub updated: Option<NaiveDate>,

    /// Markdown body without the front matter block
    pub body: String,

    /// Filled in by the reference resolver
    #[serde(default)]
    pub references: Vec<Reference>,
}

impl Document {
    /// Relative output path for this document (no leading slash)
    pub fn output_rel_path(&self) -> String {
        format!("{}.html", self.slug)
    }

    pub fn url_with_base(&self, base_url: &str) -> String {
        format!(
            "{}{}",
            crate::config::normalize_base_url(base_url),
            self.output_rel_path()
        )
    }

    pub fn broken_references(&self) -> impl Iterator<Item = &Reference> {
        self.references.iter().filter(|r| r.is_broken())
    }

    /// Look up the reference recorded for a raw directive target
    pub fn reference(&self, kind: ReferenceKind, raw: &str) -> Option<&Reference> {
        self.references
            .iter()
            .find(|r| r.kind == kind && r.raw == raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Image,
    Include,
    Link,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Image => "image",
            ReferenceKind::Include => "include",
            ReferenceKind::Link => "link",
        }
    }
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    Resolved,
    Broken,
}

/// A pointer from a document to an asset, snippet, or other document.
///
/// Status is decided once by the resolver; fields are read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    kind: ReferenceKind,
    /// Target exactly as written in the directive
    raw: String,
    /// Filesystem path the target resolved (or failed to resolve) to
    target: PathBuf,
    status: ResolutionStatus,
}

impl Reference {
    pub(crate) fn new(
        kind: ReferenceKind,
        raw: impl Into<String>,
        target: PathBuf,
        status: ResolutionStatus,
    ) -> Self {
        Self {
            kind,
            raw: raw.into(),
            target,
            status,
        }
    }

    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn target(&self) -> &PathBuf {
        &self.target
    }

    pub fn status(&self) -> ResolutionStatus {
        self.status
    }

    pub fn is_broken(&self) -> bool {
        self.status == ResolutionStatus::Broken
    }
}

/// A fenced code block extracted from a document body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub text: String,
    /// Callout numbers in order of appearance
    pub callouts: Vec<u32>,
}

/// A document with its rendered HTML
#[derive(Debug, Clone, Serialize)]
pub struct RenderedDocument {
    pub document: Document,
    pub html: String,
    pub toc_html: Option<String>,
    #[serde(skip)]
    pub callout_errors: Vec<crate::markdown::callouts::MalformedCalloutError>,
}

impl RenderedDocument {
    pub fn is_draft(&self) -> bool {
        self.document.draft
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
}

/// Flat report entry for text or JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    pub severity: DiagnosticSeverity,
    pub source_path: Option<String>,
    pub context: Option<String>,
}

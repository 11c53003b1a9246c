//! # docpress-core
//!
//! Core library for the docpress publishing pipeline.
//!
//! This crate loads source documents, parses their front matter, resolves
//! image, include and link references, renders Markdown with highlighted
//! code and callouts, and filters what is ready to publish.

pub mod config;
pub mod directives;
pub mod frontmatter;
pub mod loader;
pub mod markdown;
pub mod models;
pub mod pipeline;
pub mod publish;
pub mod references;
pub mod report;
pub mod slug;

pub use config::{Config, ConfigError};
pub use frontmatter::{parse_document, MalformedFrontMatterError};
pub use loader::{ContentLoader, LoadError, SourceFile};
pub use markdown::callouts::MalformedCalloutError;
pub use markdown::Renderer;
pub use models::{
    CodeBlock, Diagnostic, DiagnosticSeverity, Document, Reference, ReferenceKind,
    RenderedDocument, ResolutionStatus,
};
pub use pipeline::{CancellationToken, Pipeline, PipelineError, PublishOutcome};
pub use references::{BrokenReferenceWarning, ReferenceResolver};
pub use report::PublishReport;
pub use slug::slugify;

//! Publish pipeline connecting all stages
//!
//! Flow: Load → Parse front matter → Resolve references → Render
//!       (one rayon task per document), then Filter + Report (serial fold)

use crate::config::{Config, ConfigError};
use crate::frontmatter::{parse_document, MalformedFrontMatterError};
use crate::loader::{ContentLoader, LoadError};
use crate::markdown::Renderer;
use crate::models::RenderedDocument;
use crate::publish;
use crate::references::{BrokenReferenceWarning, ReferenceResolver};
use crate::report::PublishReport;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors that stop a whole run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("cannot read content root {}: {source}", .path.display())]
    ContentRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Shared flag asking a run to stop starting new documents.
///
/// Documents already in flight finish; the rest are counted as skipped.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What happened to one discovered file
#[derive(Debug)]
pub enum DocumentOutcome {
    Rendered(Box<RenderedDocument>),
    LoadFailed(LoadError),
    Malformed(MalformedFrontMatterError),
    Skipped(PathBuf),
}

/// Published documents plus the report for one run
#[derive(Debug)]
pub struct PublishOutcome {
    pub published: Vec<RenderedDocument>,
    pub report: PublishReport,
}

/// The configured stages of a publish run
#[derive(Debug, Clone)]
pub struct Pipeline {
    loader: ContentLoader,
    resolver: ReferenceResolver,
    renderer: Renderer,
}

impl Pipeline {
    pub fn new(loader: ContentLoader, resolver: ReferenceResolver, renderer: Renderer) -> Self {
        Self {
            loader,
            resolver,
            renderer,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let loader = ContentLoader::new(config.content_dir(), config.extensions.clone())
            .with_ignore_patterns(config.compiled_ignore_patterns()?);
        Ok(Self::new(
            loader,
            ReferenceResolver::from_config(config),
            Renderer::from_config(config),
        ))
    }

    /// Load, parse, resolve and render one file
    pub fn process(&self, path: &Path) -> DocumentOutcome {
        let source = match self.loader.load(path) {
            Ok(source) => source,
            Err(err) => {
                tracing::warn!("{}", err);
                return DocumentOutcome::LoadFailed(err);
            }
        };

        let document = match parse_document(source) {
            Ok(document) => document,
            Err(err) => {
                tracing::warn!("{}", err);
                return DocumentOutcome::Malformed(err);
            }
        };

        let document = self.resolver.resolve(document);
        DocumentOutcome::Rendered(Box::new(self.renderer.render(document)))
    }

    /// Run every stage over the content root.
    ///
    /// Fails only when the root itself cannot be listed; everything else is
    /// collected into the report.
    pub fn run(
        &self,
        now: DateTime<Utc>,
        token: &CancellationToken,
    ) -> Result<PublishOutcome, PipelineError> {
        self.run_with_progress(now, token, |path| {
            tracing::debug!("Finished {}", path.display())
        })
    }

    /// Like [`Pipeline::run`], calling `progress` from the worker thread
    /// each time a started document finishes
    pub fn run_with_progress(
        &self,
        now: DateTime<Utc>,
        token: &CancellationToken,
        progress: impl Fn(&Path) + Sync,
    ) -> Result<PublishOutcome, PipelineError> {
        self.loader
            .check_root()
            .map_err(|source| PipelineError::ContentRoot {
                path: self.loader.root().to_path_buf(),
                source,
            })?;

        let paths = self.loader.discover();
        tracing::info!(
            "Found {} source documents in {}",
            paths.len(),
            self.loader.root().display()
        );

        let outcomes: Vec<DocumentOutcome> = paths
            .par_iter()
            .map(|path| {
                if token.is_cancelled() {
                    return DocumentOutcome::Skipped(path.clone());
                }
                let outcome = self.process(path);
                progress(path);
                outcome
            })
            .collect();

        let mut report = PublishReport {
            discovered: paths.len(),
            ..Default::default()
        };
        let mut rendered = Vec::new();

        for outcome in outcomes {
            match outcome {
                DocumentOutcome::Rendered(doc) => {
                    let mut doc = *doc;
                    report.broken_references.extend(
                        doc.document
                            .broken_references()
                            .map(|r| BrokenReferenceWarning::from_reference(&doc.document, r)),
                    );
                    report.callout_errors.append(&mut doc.callout_errors);
                    rendered.push(doc);
                }
                DocumentOutcome::LoadFailed(err) => report.load_errors.push(err),
                DocumentOutcome::Malformed(err) => report.front_matter_errors.push(err),
                DocumentOutcome::Skipped(path) => {
                    tracing::debug!("Skipped {} after cancellation", path.display());
                    report.skipped += 1;
                }
            }
        }

        report.rendered = rendered.len();
        report.cancelled = token.is_cancelled();

        let filtered = publish::filter(rendered, now);
        report.published = filtered.published.len();
        report.drafts = filtered.drafts;
        report.scheduled = filtered.scheduled;

        if report.cancelled {
            tracing::warn!("Run cancelled; {} documents skipped", report.skipped);
        }
        tracing::info!(
            "Published {} of {} documents ({} errors, {} warnings)",
            report.published,
            report.discovered,
            report.error_count(),
            report.warning_count()
        );

        Ok(PublishOutcome {
            published: filtered.published,
            report,
        })
    }
}

//! Shared pipeline invocation with Ctrl-C cancellation.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use docpress_core::{
    CancellationToken, Config, Diagnostic, DiagnosticSeverity, Pipeline, PublishOutcome,
    PublishReport,
};
use serde::Serialize;

/// Run the publish pipeline on a blocking thread.
///
/// Ctrl-C stops new documents from starting; documents already in flight
/// finish and the partial outcome is still returned.
pub async fn run_pipeline(config: &Config, now: DateTime<Utc>) -> Result<PublishOutcome> {
    let pipeline = Pipeline::from_config(config).context("Failed to set up pipeline")?;
    let token = CancellationToken::new();

    let interrupt = {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted; finishing documents already in progress");
                token.cancel();
            }
        })
    };

    let outcome = tokio::task::spawn_blocking(move || pipeline.run(now, &token))
        .await
        .context("Pipeline task failed")?
        .context("Publish run failed")?;

    interrupt.abort();
    Ok(outcome)
}

/// Serializable run summary for report.json and `check --json`
#[derive(Serialize)]
pub struct RunSummary {
    pub discovered: usize,
    pub rendered: usize,
    pub published: usize,
    pub skipped: usize,
    pub cancelled: bool,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl RunSummary {
    /// Summarize a report plus any diagnostics raised after the run
    pub fn new(report: &PublishReport, extra: Vec<Diagnostic>) -> Self {
        let mut diagnostics = report.diagnostics();
        diagnostics.extend(extra);

        let count = |severity: DiagnosticSeverity| {
            diagnostics
                .iter()
                .filter(|d| d.severity == severity)
                .count()
        };

        Self {
            discovered: report.discovered,
            rendered: report.rendered,
            published: report.published,
            skipped: report.skipped,
            cancelled: report.cancelled,
            errors: count(DiagnosticSeverity::Error),
            warnings: count(DiagnosticSeverity::Warning),
            infos: count(DiagnosticSeverity::Info),
            diagnostics,
        }
    }
}

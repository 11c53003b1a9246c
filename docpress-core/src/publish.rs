//! Publication filtering.

use crate::models::{Document, RenderedDocument};
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Whether a document is eligible for publication at `now`
pub fn is_publishable(document: &Document, now: DateTime<Utc>) -> bool {
    !document.draft && document.date <= now
}

/// Result of filtering one run's rendered documents
#[derive(Debug, Default)]
pub struct FilterOutcome {
    /// Eligible documents, newest first then by source path
    pub published: Vec<RenderedDocument>,
    /// Source paths held back because they are drafts
    pub drafts: Vec<PathBuf>,
    /// Source paths held back because their date is after `now`
    pub scheduled: Vec<PathBuf>,
}

/// Keep non-draft documents dated at or before `now`.
///
/// Deterministic for a given input set and `now`, whatever order the
/// documents arrive in.
pub fn filter(documents: Vec<RenderedDocument>, now: DateTime<Utc>) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();

    for rendered in documents {
        if is_publishable(&rendered.document, now) {
            outcome.published.push(rendered);
        } else if rendered.is_draft() {
            outcome.drafts.push(rendered.document.source_path.clone());
        } else {
            outcome.scheduled.push(rendered.document.source_path.clone());
        }
    }

    outcome.published.sort_by(|a, b| {
        b.document
            .date
            .cmp(&a.document.date)
            .then_with(|| a.document.source_path.cmp(&b.document.source_path))
    });
    outcome.drafts.sort();
    outcome.scheduled.sort();

    outcome
}

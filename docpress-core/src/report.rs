//! End-of-run report.

use crate::frontmatter::MalformedFrontMatterError;
use crate::loader::LoadError;
use crate::markdown::callouts::MalformedCalloutError;
use crate::models::{Diagnostic, DiagnosticSeverity};
use crate::references::BrokenReferenceWarning;
use std::fmt;
use std::path::{Path, PathBuf};

/// Everything that went wrong (or was held back) during one run.
///
/// Load and front matter errors exclude a document; callout errors and
/// broken references are warnings on documents that still rendered.
#[derive(Debug, Default)]
pub struct PublishReport {
    /// Source files discovered under the content root
    pub discovered: usize,
    pub rendered: usize,
    pub published: usize,
    pub load_errors: Vec<LoadError>,
    pub front_matter_errors: Vec<MalformedFrontMatterError>,
    pub callout_errors: Vec<MalformedCalloutError>,
    pub broken_references: Vec<BrokenReferenceWarning>,
    pub drafts: Vec<PathBuf>,
    pub scheduled: Vec<PathBuf>,
    /// Documents never started because the run was cancelled
    pub skipped: usize,
    pub cancelled: bool,
}

impl PublishReport {
    pub fn error_count(&self) -> usize {
        self.load_errors.len() + self.front_matter_errors.len()
    }

    pub fn warning_count(&self) -> usize {
        self.callout_errors.len() + self.broken_references.len()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Flatten the report for text or JSON output, errors first
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut out = Vec::new();

        for err in &self.load_errors {
            out.push(diagnostic(
                "load-error",
                DiagnosticSeverity::Error,
                err.to_string(),
                Some(err.path()),
                None,
            ));
        }
        for err in &self.front_matter_errors {
            out.push(diagnostic(
                "malformed-front-matter",
                DiagnosticSeverity::Error,
                err.issue.to_string(),
                Some(&err.path),
                None,
            ));
        }
        for err in &self.callout_errors {
            let context = match &err.language {
                Some(lang) => format!("code block {} ({})", err.block, lang),
                None => format!("code block {}", err.block),
            };
            out.push(diagnostic(
                "malformed-callout",
                DiagnosticSeverity::Warning,
                err.issue.to_string(),
                Some(&err.path),
                Some(context),
            ));
        }
        for warning in &self.broken_references {
            out.push(diagnostic(
                "broken-reference",
                DiagnosticSeverity::Warning,
                format!("{} target '{}' not found", warning.kind, warning.target),
                Some(&warning.document),
                Some(format!("looked for {}", warning.resolved.display())),
            ));
        }
        if self.cancelled {
            out.push(diagnostic(
                "cancelled",
                DiagnosticSeverity::Info,
                format!("run cancelled; {} documents skipped", self.skipped),
                None,
                None,
            ));
        }

        out
    }
}

fn diagnostic(
    code: &str,
    severity: DiagnosticSeverity,
    message: String,
    source: Option<&Path>,
    context: Option<String>,
) -> Diagnostic {
    Diagnostic {
        code: code.to_string(),
        message,
        severity,
        source_path: source.map(|p| p.display().to_string()),
        context,
    }
}

impl fmt::Display for PublishReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} discovered, {} rendered, {} published ({} drafts, {} scheduled)",
            self.discovered,
            self.rendered,
            self.published,
            self.drafts.len(),
            self.scheduled.len()
        )?;
        writeln!(
            f,
            "{} errors, {} warnings",
            self.error_count(),
            self.warning_count()
        )?;

        for diag in self.diagnostics() {
            let source = diag
                .source_path
                .as_deref()
                .map(|s| format!(" ({})", s))
                .unwrap_or_default();
            writeln!(
                f,
                "- {:?} {}{}: {}",
                diag.severity, diag.code, source, diag.message
            )?;
            if let Some(ctx) = &diag.context {
                writeln!(f, "  context: {}", ctx)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::FrontMatterIssue;
    use crate::markdown::callouts::CalloutIssue;
    use crate::models::ReferenceKind;

    fn sample() -> PublishReport {
        PublishReport {
            discovered: 3,
            rendered: 2,
            published: 1,
            front_matter_errors: vec![MalformedFrontMatterError {
                path: PathBuf::from("/content/untitled.md"),
                issue: FrontMatterIssue::MissingField("title"),
            }],
            callout_errors: vec![MalformedCalloutError {
                path: PathBuf::from("/content/a.md"),
                block: 2,
                language: Some("java".into()),
                issue: CalloutIssue::Gap {
                    expected: 2,
                    found: 3,
                },
            }],
            broken_references: vec![BrokenReferenceWarning {
                document: PathBuf::from("/content/b.md"),
                kind: ReferenceKind::Image,
                target: "images/gone.png".into(),
                resolved: PathBuf::from("/assets/images/gone.png"),
            }],
            drafts: vec![PathBuf::from("/content/wip.md")],
            ..Default::default()
        }
    }

    #[test]
    fn test_counts() {
        let report = sample();
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.warning_count(), 2);
        assert!(report.has_errors());
        assert!(!PublishReport::default().has_errors());
    }

    #[test]
    fn test_diagnostics_order_and_fields() {
        let diags = sample().diagnostics();
        let codes: Vec<_> = diags.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(
            codes,
            vec!["malformed-front-matter", "malformed-callout", "broken-reference"]
        );
        assert_eq!(diags[0].severity, DiagnosticSeverity::Error);
        assert_eq!(diags[0].source_path.as_deref(), Some("/content/untitled.md"));
        assert_eq!(diags[1].context.as_deref(), Some("code block 2 (java)"));
        assert_eq!(diags[2].message, "image target 'images/gone.png' not found");
    }

    #[test]
    fn test_cancelled_is_reported() {
        let report = PublishReport {
            skipped: 4,
            cancelled: true,
            ..Default::default()
        };
        let diags = report.diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, DiagnosticSeverity::Info);
        assert_eq!(diags[0].message, "run cancelled; 4 documents skipped");
    }

    #[test]
    fn test_text_summary() {
        insta::assert_snapshot!(sample().to_string().trim_end(), @r"
        3 discovered, 2 rendered, 1 published (1 drafts, 0 scheduled)
        1 errors, 2 warnings
        - Error malformed-front-matter (/content/untitled.md): missing required field: title
        - Warning malformed-callout (/content/a.md): expected marker <2> but found <3>
          context: code block 2 (java)
        - Warning broken-reference (/content/b.md): image target 'images/gone.png' not found
          context: looked for /assets/images/gone.png
        ");
    }
}

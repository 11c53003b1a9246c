//! Build command implementation.

use super::run::{run_pipeline, RunSummary};
use anyhow::{Context, Result};
use askama::Template;
use chrono::{DateTime, Datelike, Utc};
use docpress_core::{Config, Diagnostic, DiagnosticSeverity, RenderedDocument};
use docpress_render::{IndexTemplate, PostTemplate, SiteContext};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Build the site: pages for published documents, index.html and report.json
pub async fn build_site(config_path: &Path, now: DateTime<Utc>) -> Result<()> {
    tracing::info!("Loading config from {:?}", config_path);
    let config = Config::from_file(config_path).context("Failed to load configuration")?;

    tracing::info!("Building site: {}", config.site.title);
    let outcome = run_pipeline(&config, now).await?;

    let output_dir = config.output_dir();
    fs::create_dir_all(&output_dir).context("Failed to create output directory")?;

    let (pages, mut diagnostics) = dedupe_slugs(outcome.published);
    let site = SiteContext::from_config(&config, now.year());

    // Assets go first so nothing copied can replace a generated page
    let generated = generated_paths(&pages);
    diagnostics.extend(copy_assets(&config, &output_dir, &generated)?);

    for rendered in &pages {
        render_post_page(&output_dir, rendered, &site)?;
    }
    render_index_page(&output_dir, &pages, &site)?;

    let summary = RunSummary::new(&outcome.report, diagnostics);
    let report_path = output_dir.join(REPORT_FILE);
    fs::write(&report_path, serde_json::to_string_pretty(&summary)?)
        .with_context(|| format!("Failed to write {:?}", report_path))?;

    println!(
        "Built {} pages in {:?} ({} errors, {} warnings)",
        pages.len(),
        output_dir,
        summary.errors,
        summary.warnings
    );
    if summary.cancelled {
        println!("Build was interrupted; {} documents skipped", summary.skipped);
    }

    Ok(())
}

/// Output files written by the build itself
const INDEX_PAGE: &str = "index.html";
const REPORT_FILE: &str = "report.json";

/// Slugs whose page would land on a file the build writes itself
const RESERVED_SLUGS: &[&str] = &["index"];

/// Keep one document per slug; the first by source path wins.
///
/// Reserved slugs never get a page.
fn dedupe_slugs(published: Vec<RenderedDocument>) -> (Vec<RenderedDocument>, Vec<Diagnostic>) {
    let mut owners: HashMap<&str, &Path> = HashMap::new();
    let mut by_path: Vec<&RenderedDocument> = published.iter().collect();
    by_path.sort_by(|a, b| a.document.source_path.cmp(&b.document.source_path));
    for rendered in by_path {
        owners
            .entry(rendered.document.slug.as_str())
            .or_insert(rendered.document.source_path.as_path());
    }

    let winners: HashMap<String, PathBuf> = owners
        .into_iter()
        .map(|(slug, path)| (slug.to_string(), path.to_path_buf()))
        .collect();

    let mut pages = Vec::with_capacity(published.len());
    let mut duplicates = Vec::new();
    for rendered in published {
        let doc = &rendered.document;
        if RESERVED_SLUGS.contains(&doc.slug.as_str()) {
            tracing::warn!(
                "Slug '{}' of {} is reserved; page not written",
                doc.slug,
                doc.source_path.display()
            );
            duplicates.push(Diagnostic {
                code: "duplicate-slug".to_string(),
                message: format!("slug '{}' is reserved for a generated page; page not written", doc.slug),
                severity: DiagnosticSeverity::Warning,
                source_path: Some(doc.source_path.display().to_string()),
                context: Some(format!("reserved by {}", doc.output_rel_path())),
            });
            continue;
        }
        match winners.get(&doc.slug) {
            Some(owner) if *owner != doc.source_path => {
                tracing::warn!(
                    "Duplicate slug '{}': {} is already used by {}",
                    doc.slug,
                    doc.source_path.display(),
                    owner.display()
                );
                duplicates.push(Diagnostic {
                    code: "duplicate-slug".to_string(),
                    message: format!("slug '{}' is already used; page not written", doc.slug),
                    severity: DiagnosticSeverity::Warning,
                    source_path: Some(doc.source_path.display().to_string()),
                    context: Some(format!("kept {}", owner.display())),
                });
            }
            _ => pages.push(rendered),
        }
    }

    (pages, duplicates)
}

fn generated_paths(pages: &[RenderedDocument]) -> HashSet<PathBuf> {
    pages
        .iter()
        .map(|r| PathBuf::from(r.document.output_rel_path()))
        .chain([PathBuf::from(INDEX_PAGE), PathBuf::from(REPORT_FILE)])
        .collect()
}

fn render_post_page(output_dir: &Path, rendered: &RenderedDocument, site: &SiteContext) -> Result<()> {
    let html = PostTemplate::new(rendered, site)
        .render()
        .with_context(|| format!("Failed to render template for {}", rendered.document.slug))?;

    let output_path = output_dir.join(rendered.document.output_rel_path());
    fs::write(&output_path, html)
        .with_context(|| format!("Failed to write {:?}", output_path))?;

    tracing::debug!("Wrote {:?}", output_path);
    Ok(())
}

fn render_index_page(output_dir: &Path, pages: &[RenderedDocument], site: &SiteContext) -> Result<()> {
    let html = IndexTemplate::new(pages, site)
        .render()
        .context("Failed to render index template")?;

    let output_path = output_dir.join(INDEX_PAGE);
    fs::write(&output_path, html).with_context(|| format!("Failed to write {:?}", output_path))?;
    Ok(())
}

/// Copy non-source files from the asset and content roots into the output.
///
/// Files that would replace a generated page are skipped with a warning.
fn copy_assets(
    config: &Config,
    output_dir: &Path,
    generated: &HashSet<PathBuf>,
) -> Result<Vec<Diagnostic>> {
    let mut roots = vec![config.assets_dir()];
    if !roots.contains(&config.content_dir()) {
        roots.push(config.content_dir());
    }

    let mut copied = 0usize;
    let mut collisions = Vec::new();
    for root in roots.iter().rev().filter(|r| r.is_dir()) {
        for entry in WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| !e.path().starts_with(output_dir))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!("Skipping unreadable asset under {:?}: {}", root, err);
                    continue;
                }
            };
            if !entry.file_type().is_file() || is_source(config, entry.path()) {
                continue;
            }

            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if generated.contains(rel) {
                tracing::warn!(
                    "Not copying {:?}: it would overwrite generated {}",
                    entry.path(),
                    rel.display()
                );
                collisions.push(Diagnostic {
                    code: "asset-collision".to_string(),
                    message: format!("{} would overwrite a generated page; not copied", rel.display()),
                    severity: DiagnosticSeverity::Warning,
                    source_path: Some(entry.path().display().to_string()),
                    context: None,
                });
                continue;
            }
            let dest = output_dir.join(rel);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {:?}", parent))?;
            }
            fs::copy(entry.path(), &dest)
                .with_context(|| format!("Failed to copy {:?}", entry.path()))?;
            copied += 1;
        }
    }

    tracing::info!("Copied {} asset files", copied);
    Ok(collisions)
}

fn is_source(config: &Config, path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| config.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use docpress_core::Document;

    fn rendered(path: &str, slug: &str) -> RenderedDocument {
        RenderedDocument {
            document: Document {
                source_path: PathBuf::from(path),
                rel_path: path.trim_start_matches('/').to_string(),
                slug: slug.to_string(),
                title: slug.to_string(),
                date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                draft: false,
                tags: vec![],
                description: None,
                updated: None,
                body: String::new(),
                references: vec![],
            },
            html: String::new(),
            toc_html: None,
            callout_errors: vec![],
        }
    }

    #[test]
    fn test_first_source_path_wins_slug() {
        let published = vec![
            rendered("/content/b/post.md", "post"),
            rendered("/content/a/post.md", "post"),
            rendered("/content/other.md", "other"),
        ];

        let (pages, duplicates) = dedupe_slugs(published);
        let kept: Vec<_> = pages
            .iter()
            .map(|r| r.document.source_path.to_str().unwrap())
            .collect();
        assert_eq!(kept, vec!["/content/a/post.md", "/content/other.md"]);

        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].code, "duplicate-slug");
        assert_eq!(
            duplicates[0].source_path.as_deref(),
            Some("/content/b/post.md")
        );
    }

    #[test]
    fn test_index_slug_is_reserved() {
        let published = vec![rendered("/content/index.md", "index"), rendered("/content/foo.md", "foo")];

        let (pages, duplicates) = dedupe_slugs(published);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].document.slug, "foo");
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].source_path.as_deref(), Some("/content/index.md"));

        let generated = generated_paths(&pages);
        assert!(generated.contains(Path::new("foo.html")));
        assert!(generated.contains(Path::new("index.html")));
        assert!(generated.contains(Path::new("report.json")));
    }
}

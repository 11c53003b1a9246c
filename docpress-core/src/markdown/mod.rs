//! Markdown rendering with includes, highlighting and callouts.

pub mod callouts;
pub mod highlight;
pub mod includes;

use crate::config::{normalize_base_url, Config};
use crate::directives::{is_remote, strip_fragment};
use crate::models::{Document, ReferenceKind, RenderedDocument};
use crate::slug::slugify;
use callouts::{CalloutOutput, CalloutTransformer, MalformedCalloutError};
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub use highlight::Highlighter;

#[derive(Debug, Clone)]
struct TocItem {
    level: u32,
    title: String,
    id: String,
}

/// HTML produced for one Markdown body
#[derive(Debug, Clone, Default)]
pub struct RenderOutput {
    pub html: String,
    pub toc_html: Option<String>,
    pub callout_errors: Vec<MalformedCalloutError>,
}

/// Markdown renderer with custom extensions
#[derive(Debug, Clone)]
pub struct Renderer {
    options: Options,
    highlighter: Highlighter,
    base_url: String,
    document_extensions: Vec<String>,
    /// Roots that published image URLs are made relative to
    site_roots: Vec<PathBuf>,
}

impl Renderer {
    pub fn new(base_url: &str, highlight_theme: &str) -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

        Self {
            options,
            highlighter: Highlighter::new(highlight_theme),
            base_url: normalize_base_url(base_url),
            document_extensions: vec!["md".to_string(), "markdown".to_string()],
            site_roots: Vec::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut renderer = Self::new(&config.base_url, &config.highlight_theme)
            .with_site_roots(vec![config.assets_dir(), config.content_dir()]);
        renderer.document_extensions = config.extensions.clone();
        renderer
    }

    /// Rewrite resolved images under these roots to site URLs.
    ///
    /// Earlier roots win when a target sits under several.
    pub fn with_site_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.site_roots = roots;
        self
    }

    /// Render a resolved document.
    ///
    /// Never fails: broken includes become placeholders and malformed
    /// callouts are recorded on the result.
    pub fn render(&self, document: Document) -> RenderedDocument {
        let source = includes::expand(&document);
        let image_urls = self.image_urls(&document);
        let output = self.convert_with_images(&source, &document.source_path, &image_urls);

        tracing::debug!(
            "Rendered {} ({} bytes, {} callout errors)",
            document.rel_path,
            output.html.len(),
            output.callout_errors.len()
        );

        RenderedDocument {
            document,
            html: output.html,
            toc_html: output.toc_html,
            callout_errors: output.callout_errors,
        }
    }

    /// Convert Markdown to HTML with all custom transforms
    pub fn convert(&self, markdown: &str, path: &Path) -> RenderOutput {
        self.convert_with_images(markdown, path, &HashMap::new())
    }

    fn convert_with_images(
        &self,
        markdown: &str,
        path: &Path,
        image_urls: &HashMap<String, String>,
    ) -> RenderOutput {
        let events: Vec<Event<'static>> = Parser::new_ext(markdown, self.options)
            .map(Event::into_static)
            .collect();

        // Collect headings for TOC and later ID injection
        let headings = collect_headings(&events);

        let events = self.rewrite_document_links(events);
        let events = rewrite_image_sources(events, image_urls);

        let events = attach_heading_ids(events, &headings);
        let events = add_heading_anchors(events);

        // Code blocks last; they become raw HTML
        let CalloutOutput { events, errors, .. } =
            CalloutTransformer::new(&self.highlighter, path).transform(events);

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());

        let toc_html = if headings.is_empty() {
            None
        } else {
            Some(render_toc(&headings))
        };

        RenderOutput {
            html: html_output,
            toc_html,
            callout_errors: errors,
        }
    }

    /// Point local links at sibling documents to their rendered pages
    fn rewrite_document_links(&self, events: Vec<Event<'static>>) -> Vec<Event<'static>> {
        events
            .into_iter()
            .map(|event| match event {
                Event::Start(Tag::Link {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => {
                    let dest_url = match self.page_url(&dest_url) {
                        Some(url) => CowStr::Boxed(url.into_boxed_str()),
                        None => dest_url,
                    };
                    Event::Start(Tag::Link {
                        link_type,
                        dest_url,
                        title,
                        id,
                    })
                }
                other => other,
            })
            .collect()
    }

    /// Site URLs for the document's resolved images, keyed by raw target
    fn image_urls(&self, document: &Document) -> HashMap<String, String> {
        document
            .references
            .iter()
            .filter(|r| r.kind() == ReferenceKind::Image && !r.is_broken())
            .filter_map(|r| {
                let rel = self
                    .site_roots
                    .iter()
                    .find_map(|root| r.target().strip_prefix(root).ok())?;
                let rel = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                Some((r.raw().to_string(), format!("{}{}", self.base_url, rel)))
            })
            .collect()
    }

    fn page_url(&self, dest: &str) -> Option<String> {
        if dest.starts_with('#') || is_remote(dest) {
            return None;
        }
        let path = Path::new(strip_fragment(dest));
        let ext = path.extension().and_then(|e| e.to_str())?;
        if !self
            .document_extensions
            .iter()
            .any(|wanted| wanted.eq_ignore_ascii_case(ext))
        {
            return None;
        }

        let stem = path.file_stem().and_then(|s| s.to_str())?;
        let suffix = &dest[strip_fragment(dest).len()..];
        Some(format!("{}{}.html{}", self.base_url, slugify(stem), suffix))
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new("/", "InspiredGitHub")
    }
}

fn rewrite_image_sources(
    events: Vec<Event<'static>>,
    image_urls: &HashMap<String, String>,
) -> Vec<Event<'static>> {
    if image_urls.is_empty() {
        return events;
    }
    events
        .into_iter()
        .map(|event| match event {
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => {
                let dest_url = match image_urls.get(dest_url.as_ref()) {
                    Some(url) => CowStr::Boxed(url.clone().into_boxed_str()),
                    None => dest_url,
                };
                Event::Start(Tag::Image {
                    link_type,
                    dest_url,
                    title,
                    id,
                })
            }
            other => other,
        })
        .collect()
}

fn collect_headings(events: &[Event]) -> Vec<TocItem> {
    let mut toc = Vec::new();
    // Explicit `{#id}`s are claimed up front so generated ids never reuse them
    let mut taken: HashSet<String> = events
        .iter()
        .filter_map(|event| match event {
            Event::Start(Tag::Heading { id: Some(id), .. }) => Some(id.to_string()),
            _ => None,
        })
        .collect();
    let mut current: Option<(u32, Option<String>, String)> = None;

    for event in events {
        match event {
            Event::Start(Tag::Heading { level, id, .. }) => {
                current = Some((*level as u32, id.as_ref().map(|s| s.to_string()), String::new()));
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, _, ref mut title)) = current {
                    title.push_str(text.as_ref());
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, explicit, title)) = current.take() {
                    let id = explicit.unwrap_or_else(|| unique_id(slugify(&title), &mut taken));
                    toc.push(TocItem { level, title, id });
                }
            }
            _ => {}
        }
    }

    toc
}

fn unique_id(base: String, taken: &mut HashSet<String>) -> String {
    let mut candidate = base.clone();
    let mut n = 1;
    while taken.contains(&candidate) {
        candidate = format!("{}-{}", base, n);
        n += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

fn attach_heading_ids(events: Vec<Event<'static>>, headings: &[TocItem]) -> Vec<Event<'static>> {
    let mut heading_iter = headings.iter();
    let mut result = Vec::with_capacity(events.len());

    for event in events {
        match event {
            Event::Start(Tag::Heading {
                level,
                mut id,
                classes,
                attrs,
            }) => {
                let next = heading_iter.next();
                if id.is_none() {
                    id = next.map(|h| CowStr::Boxed(h.id.clone().into_boxed_str()));
                }
                result.push(Event::Start(Tag::Heading {
                    level,
                    id,
                    classes,
                    attrs,
                }));
            }
            _ => result.push(event),
        }
    }

    result
}

fn add_heading_anchors(events: Vec<Event<'static>>) -> Vec<Event<'static>> {
    let mut result = Vec::with_capacity(events.len());
    let mut current_id: Option<String> = None;

    for event in events {
        match event {
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => {
                current_id = id.as_ref().map(|s| s.to_string());
                result.push(Event::Start(Tag::Heading {
                    level,
                    id,
                    classes,
                    attrs,
                }));
            }
            Event::End(TagEnd::Heading(level)) => {
                if let Some(id) = current_id.take() {
                    let anchor = format!(
                        "<a class=\"heading-anchor\" href=\"#{}\" aria-label=\"Link to heading\">#</a>",
                        html_escape(&id)
                    );
                    result.push(Event::Html(CowStr::Boxed(anchor.into_boxed_str())));
                }
                result.push(Event::End(TagEnd::Heading(level)));
            }
            other => result.push(other),
        }
    }

    result
}

fn render_toc(headings: &[TocItem]) -> String {
    let mut html = String::from(r#"<nav class="toc-nav"><h3>Contents</h3><ul class="toc-list">"#);
    for h in headings {
        html.push_str(&format!(
            r##"<li class="toc-level-{}"><a href="#{}">{}</a></li>"##,
            h.level,
            html_escape(&h.id),
            html_escape(&h.title)
        ));
    }
    html.push_str("</ul></nav>");
    html
}

pub(crate) fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

//! Askama template definitions.

use askama::Template;
use docpress_core::{Config, RenderedDocument};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Site-wide values shared by every page
#[derive(Debug, Clone)]
pub struct SiteContext {
    pub title: String,
    pub description: String,
    pub author: String,
    pub base_url: String,
    pub year: i32,
}

impl SiteContext {
    pub fn from_config(config: &Config, year: i32) -> Self {
        Self {
            title: config.site.title.clone(),
            description: config.site.description.clone(),
            author: config.site.author.clone(),
            base_url: config.normalized_base_url(),
            year,
        }
    }
}

/// A published post as listed on the index page
#[derive(Debug, Clone)]
pub struct PostEntry {
    pub url: String,
    pub title: String,
    pub date: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

impl PostEntry {
    pub fn from_rendered(rendered: &RenderedDocument, base_url: &str) -> Self {
        let doc = &rendered.document;
        Self {
            url: doc.url_with_base(base_url),
            title: doc.title.clone(),
            date: doc.date.format(DATE_FORMAT).to_string(),
            description: doc.description.clone(),
            tags: doc.tags.clone(),
        }
    }
}

/// Post page template
#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    // Page metadata
    pub title: String,
    pub description: String,
    pub date: String,
    pub updated: Option<String>,
    pub tags: Vec<String>,

    // Content
    pub content: String,
    pub toc_html: Option<String>,

    // Site metadata
    pub site_title: String,
    pub site_author: String,
    pub year: i32,

    pub base_url: String,
    pub slug: String,
}

impl PostTemplate {
    pub fn new(rendered: &RenderedDocument, site: &SiteContext) -> Self {
        let doc = &rendered.document;
        Self {
            title: doc.title.clone(),
            description: doc.description.clone().unwrap_or_default(),
            date: doc.date.format(DATE_FORMAT).to_string(),
            updated: doc.updated.map(|d| d.format(DATE_FORMAT).to_string()),
            tags: doc.tags.clone(),
            content: rendered.html.clone(),
            toc_html: rendered.toc_html.clone(),
            site_title: site.title.clone(),
            site_author: site.author.clone(),
            year: site.year,
            base_url: site.base_url.clone(),
            slug: doc.slug.clone(),
        }
    }
}

/// Index page template
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    // Site metadata
    pub site_title: String,
    pub site_description: String,
    pub site_author: String,
    pub year: i32,

    /// Published posts, newest first
    pub items: Vec<PostEntry>,

    pub base_url: String,
}

impl IndexTemplate {
    pub fn new(published: &[RenderedDocument], site: &SiteContext) -> Self {
        Self {
            site_title: site.title.clone(),
            site_description: site.description.clone(),
            site_author: site.author.clone(),
            year: site.year,
            items: published
                .iter()
                .map(|r| PostEntry::from_rendered(r, &site.base_url))
                .collect(),
            base_url: site.base_url.clone(),
        }
    }
}

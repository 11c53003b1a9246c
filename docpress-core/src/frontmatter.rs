//! Front matter parsing from source documents.
//!
//! A document starts with a YAML block between two `---` marker lines:
//!
//! ```text
//! ---
//! title: Problem Details with Spring Boot
//! date: 2024-05-01
//! tags: [spring, errors]
//! ---
//! Body text...
//! ```

use crate::loader::SourceFile;
use crate::models::Document;
use crate::slug::slugify;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

const MARKER: &str = "---";

/// What was wrong with a document's front matter
#[derive(Error, Debug)]
pub enum FrontMatterIssue {
    #[error("no front matter block (expected a leading `---` line)")]
    MissingBlock,

    #[error("front matter opened on line 1 but never closed with `---`")]
    Unbalanced,

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("unparseable {field} '{value}'")]
    InvalidDate { field: &'static str, value: String },
}

/// Front matter failure for one document; excludes only that document
#[derive(Error, Debug)]
#[error("malformed front matter in {}: {issue}", .path.display())]
pub struct MalformedFrontMatterError {
    pub path: PathBuf,
    #[source]
    pub issue: FrontMatterIssue,
}

/// Header fields as written in the YAML block
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrontMatter {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub date: Option<String>,

    #[serde(default)]
    pub draft: bool,

    #[serde(default)]
    pub tags: Option<TagList>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub slug: Option<String>,

    #[serde(default)]
    pub updated: Option<String>,
}

/// Tags may be a YAML list or a comma-separated string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagList {
    List(Vec<String>),
    Joined(String),
}

impl TagList {
    /// Ordered, trimmed tags with empty entries removed
    pub fn into_vec(self) -> Vec<String> {
        let raw = match self {
            TagList::List(items) => items,
            TagList::Joined(s) => s.split(',').map(str::to_string).collect(),
        };
        raw.into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// Split the front matter block from the body.
///
/// Returns the YAML text and the body that follows the closing marker.
pub fn split_front_matter(content: &str) -> Result<(&str, &str), FrontMatterIssue> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut lines = content.split_inclusive('\n');
    let first = lines.next().ok_or(FrontMatterIssue::MissingBlock)?;
    if first.trim_end() != MARKER {
        return Err(FrontMatterIssue::MissingBlock);
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for line in lines {
        if line.trim_end() == MARKER {
            let yaml = &content[yaml_start..offset];
            let body = &content[offset + line.len()..];
            return Ok((yaml, body));
        }
        offset += line.len();
    }

    Err(FrontMatterIssue::Unbalanced)
}

/// Parse front matter from document text
///
/// ```
/// use docpress_core::frontmatter::parse_front_matter;
///
/// let content = "---\ntitle: My Post\ndate: 2025-01-01\n---\n# Hello World\n";
///
/// let (fm, body) = parse_front_matter(content).unwrap();
/// assert_eq!(fm.title.as_deref(), Some("My Post"));
/// assert!(body.starts_with("# Hello World"));
/// ```
pub fn parse_front_matter(content: &str) -> Result<(FrontMatter, &str), FrontMatterIssue> {
    let (yaml, body) = split_front_matter(content)?;

    // An empty block is valid YAML for "null"; treat it as an empty mapping
    let front_matter = if yaml.trim().is_empty() {
        FrontMatter::default()
    } else {
        serde_yaml::from_str(yaml)?
    };

    Ok((front_matter, body))
}

/// Coerce a front matter date to a UTC timestamp.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS]` (read as UTC) and plain
/// `YYYY-MM-DD` (midnight UTC).
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Build a `Document` from a loaded source file
pub fn parse_document(source: SourceFile) -> Result<Document, MalformedFrontMatterError> {
    let malformed = |issue| MalformedFrontMatterError {
        path: source.path.clone(),
        issue,
    };

    let (front_matter, body) = parse_front_matter(&source.text).map_err(malformed)?;

    let title = front_matter
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| malformed(FrontMatterIssue::MissingField("title")))?
        .to_string();

    let raw_date = front_matter
        .date
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| malformed(FrontMatterIssue::MissingField("date")))?;
    let date = parse_date(raw_date).ok_or_else(|| {
        malformed(FrontMatterIssue::InvalidDate {
            field: "date",
            value: raw_date.to_string(),
        })
    })?;

    let updated = match front_matter.updated.as_deref() {
        Some(raw) => Some(parse_date(raw).map(|dt| dt.date_naive()).ok_or_else(|| {
            malformed(FrontMatterIssue::InvalidDate {
                field: "updated",
                value: raw.to_string(),
            })
        })?),
        None => None,
    };

    let slug = document_slug(front_matter.slug.as_deref(), &source.path, &title);
    let body = body.to_string();

    Ok(Document {
        source_path: source.path,
        rel_path: source.rel_path,
        slug,
        title,
        date,
        draft: front_matter.draft,
        tags: front_matter.tags.map(TagList::into_vec).unwrap_or_default(),
        description: front_matter.description,
        updated,
        body,
        references: Vec::new(),
    })
}

fn document_slug(explicit: Option<&str>, path: &Path, title: &str) -> String {
    let candidates = [
        explicit.map(slugify),
        path.file_stem().and_then(|s| s.to_str()).map(slugify),
    ];
    candidates
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| slugify(title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn source(name: &str, text: &str) -> SourceFile {
        SourceFile {
            path: PathBuf::from(format!("/content/{name}")),
            rel_path: name.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_parse_valid_document() {
        let text = r#"---
title: Error Handling with Problem Details
date: 2024-05-01
tags:
  - spring
  - errors
description: A tour of the library
---

# Intro

Body text."#;

        let doc = parse_document(source("problem-details.md", text)).unwrap();
        assert_eq!(doc.title, "Error Handling with Problem Details");
        assert_eq!(doc.date, Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
        assert_eq!(doc.tags, vec!["spring", "errors"]);
        assert_eq!(doc.description.as_deref(), Some("A tour of the library"));
        assert_eq!(doc.slug, "problem-details");
        assert!(!doc.draft);
        assert!(doc.body.starts_with("\n# Intro"));
        assert!(doc.body.ends_with("Body text."));
    }

    #[test]
    fn test_tags_as_comma_separated_string() {
        let text = "---\ntitle: T\ndate: 2024-01-01\ntags: testcontainers, cypress, ,java\n---\n";
        let doc = parse_document(source("t.md", text)).unwrap();
        assert_eq!(doc.tags, vec!["testcontainers", "cypress", "java"]);
    }

    #[test]
    fn test_explicit_slug_and_draft() {
        let text = "---\ntitle: T\ndate: 2024-01-01\nslug: Custom Slug\ndraft: true\n---\nx";
        let doc = parse_document(source("file-name.md", text)).unwrap();
        assert_eq!(doc.slug, "custom-slug");
        assert!(doc.draft);
    }

    #[test]
    fn test_date_formats() {
        let dt = parse_date("2024-05-01 14:30").unwrap();
        assert_eq!(dt.hour(), 14);
        assert_eq!(dt.minute(), 30);

        let dt = parse_date("2024-05-01T10:00:00+02:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());

        assert!(parse_date("May 1st").is_none());
        assert!(parse_date("2024-13-01").is_none());
    }

    #[test]
    fn test_missing_title() {
        let text = "---\ndate: 2024-01-01\n---\nContent.";
        let err = parse_document(source("untitled.md", text)).unwrap_err();
        assert_eq!(err.path, PathBuf::from("/content/untitled.md"));
        assert!(matches!(err.issue, FrontMatterIssue::MissingField("title")));
    }

    #[test]
    fn test_blank_title_counts_as_missing() {
        let text = "---\ntitle: \"  \"\ndate: 2024-01-01\n---\n";
        let err = parse_document(source("blank.md", text)).unwrap_err();
        assert!(matches!(err.issue, FrontMatterIssue::MissingField("title")));
    }

    #[test]
    fn test_missing_date() {
        let text = "---\ntitle: No Date\n---\n";
        let err = parse_document(source("nodate.md", text)).unwrap_err();
        assert!(matches!(err.issue, FrontMatterIssue::MissingField("date")));
    }

    #[test]
    fn test_invalid_date() {
        let text = "---\ntitle: T\ndate: someday\n---\n";
        let err = parse_document(source("t.md", text)).unwrap_err();
        match err.issue {
            FrontMatterIssue::InvalidDate { field, value } => {
                assert_eq!(field, "date");
                assert_eq!(value, "someday");
            }
            other => panic!("expected InvalidDate, got {:?}", other),
        }
    }

    #[test]
    fn test_unbalanced_markers() {
        let text = "---\ntitle: T\ndate: 2024-01-01\n\nBody without closing marker";
        assert!(matches!(
            split_front_matter(text),
            Err(FrontMatterIssue::Unbalanced)
        ));
    }

    #[test]
    fn test_no_front_matter() {
        assert!(matches!(
            split_front_matter("# Just Content\n"),
            Err(FrontMatterIssue::MissingBlock)
        ));
        assert!(matches!(
            split_front_matter(""),
            Err(FrontMatterIssue::MissingBlock)
        ));
    }

    #[test]
    fn test_invalid_yaml() {
        let text = "---\ntitle: Test\ninvalid yaml: [unclosed\n---\nContent.";
        let err = parse_document(source("bad.md", text)).unwrap_err();
        assert!(matches!(err.issue, FrontMatterIssue::Yaml(_)));
    }

    #[test]
    fn test_body_keeps_later_markers() {
        let text = "---\ntitle: T\ndate: 2024-01-01\n---\nabove\n---\nbelow\n";
        let (_, body) = parse_front_matter(text).unwrap();
        assert_eq!(body, "above\n---\nbelow\n");
    }
}

//! Source-level expansion run before Markdown parsing.
//!
//! Include directives are replaced by the text of their resolved target and
//! Asciidoc image directives become Markdown images, so the parser only ever
//! sees plain Markdown.

use crate::directives::{self, CodeRanges, FenceTracker};
use crate::models::{Document, ReferenceKind};
use regex::{Captures, Regex};
use std::fs;
use std::sync::OnceLock;

static TAG_MARKER_RE: OnceLock<Regex> = OnceLock::new();

fn tag_marker_regex() -> &'static Regex {
    TAG_MARKER_RE.get_or_init(|| Regex::new(r"\b(tag|end)::([\w.-]+)\[\]").unwrap())
}

/// Expand includes and Asciidoc images in a resolved document's body
pub fn expand(document: &Document) -> String {
    let mut out = String::with_capacity(document.body.len());
    let mut fences = FenceTracker::new();
    let code = CodeRanges::scan(&document.body);
    let mut offset = 0;

    for line in document.body.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        if let Some(caps) = directives::include_regex().captures(line) {
            out.push_str(&include(document, &caps[1], &caps[2], fences.is_open()));
            continue;
        }

        if fences.observe(line) {
            out.push_str(line);
            continue;
        }

        if let Some(caps) = directives::block_image_regex().captures(line) {
            if !code.contains(line_start + caps.get(1).map_or(0, |m| m.start())) {
                out.push_str(&markdown_image(&caps));
                out.push('\n');
                continue;
            }
        }

        let converted = directives::inline_image_regex().replace_all(line, |caps: &Captures| {
            if code.contains(line_start + caps.get(0).map_or(0, |m| m.start())) {
                caps[0].to_string()
            } else {
                markdown_image(caps)
            }
        });
        out.push_str(&converted);
    }

    out
}

fn markdown_image(caps: &Captures) -> String {
    let target = &caps[1];
    format!("![{}]({})", directives::image_alt(target, &caps[2]), target)
}

fn include(document: &Document, target: &str, attrs: &str, in_fence: bool) -> String {
    let text = document
        .reference(ReferenceKind::Include, target)
        .filter(|r| !r.is_broken())
        .and_then(|r| match fs::read_to_string(r.target()) {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::warn!(
                    "Could not read include {} for {}: {}",
                    r.target().display(),
                    document.rel_path,
                    err
                );
                None
            }
        });

    let Some(text) = text else {
        return placeholder(target, in_fence);
    };

    let mut expanded = select_tags(&text, &requested_tags(attrs));
    if !expanded.is_empty() && !expanded.ends_with('\n') {
        expanded.push('\n');
    }
    expanded
}

fn placeholder(target: &str, in_fence: bool) -> String {
    if in_fence {
        format!("[missing include: {}]\n", target)
    } else {
        format!("<!-- missing include: {} -->\n", target.replace("--", "- -"))
    }
}

/// Tag names from `tag=name` or `tags=a;b` attributes
fn requested_tags(attrs: &str) -> Vec<String> {
    attrs
        .split(',')
        .filter_map(|attr| attr.split_once('='))
        .filter(|(key, _)| matches!(key.trim(), "tag" | "tags"))
        .flat_map(|(_, value)| value.trim().trim_matches('"').split(';'))
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Keep the lines inside the requested tagged regions.
///
/// Tag marker lines themselves are always dropped; with no requested tags
/// every other line is kept.
fn select_tags(text: &str, tags: &[String]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut open: Vec<&str> = Vec::new();

    for line in text.split_inclusive('\n') {
        if let Some(caps) = tag_marker_regex().captures(line) {
            let name = caps.get(2).map_or("", |m| m.as_str());
            if &caps[1] == "tag" {
                open.push(name);
            } else {
                open.retain(|t| *t != name);
            }
            continue;
        }

        let selected = tags.is_empty() || open.iter().any(|t| tags.iter().any(|w| w == t));
        if selected {
            out.push_str(line);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::references::ReferenceResolver;
    use chrono::{TimeZone, Utc};
    use std::path::Path;
    use tempfile::tempdir;

    fn resolved(root: &Path, body: &str) -> Document {
        let doc = Document {
            source_path: root.join("post.md"),
            rel_path: "post.md".into(),
            slug: "post".into(),
            title: "Post".into(),
            date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            draft: false,
            tags: vec![],
            description: None,
            updated: None,
            body: body.to_string(),
            references: vec![],
        };
        ReferenceResolver::new(root, root)
            .with_snippets_root(root.join("snippets"))
            .resolve(doc)
    }

    #[test]
    fn test_resolved_include_is_inlined() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("snippets")).unwrap();
        fs::write(dir.path().join("snippets/request.http"), "GET /users/1 HTTP/1.1").unwrap();

        let doc = resolved(
            dir.path(),
            "```http\ninclude::{snippets}/request.http[]\n```\n",
        );
        assert_eq!(expand(&doc), "```http\nGET /users/1 HTTP/1.1\n```\n");
    }

    #[test]
    fn test_broken_include_placeholder() {
        let dir = tempdir().unwrap();
        let doc = resolved(
            dir.path(),
            "```\ninclude::gone.java[]\n```\ninclude::gone.md[]\n",
        );
        assert_eq!(
            expand(&doc),
            "```\n[missing include: gone.java]\n```\n<!-- missing include: gone.md -->\n"
        );
    }

    #[test]
    fn test_tagged_regions() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("App.java"),
            "package demo;\n// tag::setup[]\nvar app = new App();\n// end::setup[]\napp.run();\n",
        )
        .unwrap();

        let doc = resolved(dir.path(), "include::App.java[tags=setup]\n");
        assert_eq!(expand(&doc), "var app = new App();\n");

        let doc = resolved(dir.path(), "include::App.java[]\n");
        assert_eq!(expand(&doc), "package demo;\nvar app = new App();\napp.run();\n");
    }

    #[test]
    fn test_asciidoc_images_outside_fences() {
        let dir = tempdir().unwrap();
        let doc = resolved(
            dir.path(),
            "image::images/arch.png[Architecture]\nSee image:icons/tip.svg[] here.\n```\nimage::kept.png[]\n```\n",
        );
        assert_eq!(
            expand(&doc),
            "![Architecture](images/arch.png)\nSee ![tip](icons/tip.svg) here.\n```\nimage::kept.png[]\n```\n"
        );
    }

    #[test]
    fn test_asciidoc_images_in_code_are_left_alone() {
        let dir = tempdir().unwrap();
        let body = "Write `image:diagram.png[]` to embed a picture.\n\n    image::shot.png[]\n";
        let doc = resolved(dir.path(), body);
        assert_eq!(expand(&doc), body);
        assert!(doc.references.is_empty());
    }

    #[test]
    fn test_requested_tags() {
        assert_eq!(requested_tags("tags=a;b, indent=0"), vec!["a", "b"]);
        assert_eq!(requested_tags("tag=setup"), vec!["setup"]);
        assert!(requested_tags("lines=1..4").is_empty());
    }
}

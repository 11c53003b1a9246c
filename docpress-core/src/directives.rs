//! Line-level directive scanning shared by the resolver and the renderer.
//!
//! Recognizes Asciidoc-style `include::target[attrs]` and
//! `image::target[attrs]` / `image:target[attrs]` directives embedded in
//! Markdown bodies, plus Markdown image and link destinations.

use crate::models::ReferenceKind;
use pulldown_cmark::{Event, Parser, Tag};
use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

/// A directive found in a document body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub kind: ReferenceKind,
    /// Target as written
    pub target: String,
    /// Bracketed attribute text (Asciidoc forms only)
    pub attrs: String,
    /// 1-based line number
    pub line: usize,
}

static INCLUDE_RE: OnceLock<Regex> = OnceLock::new();
static BLOCK_IMAGE_RE: OnceLock<Regex> = OnceLock::new();
static INLINE_IMAGE_RE: OnceLock<Regex> = OnceLock::new();
static SCHEME_RE: OnceLock<Regex> = OnceLock::new();

pub(crate) fn include_regex() -> &'static Regex {
    INCLUDE_RE.get_or_init(|| Regex::new(r"^\s*include::([^\[\s]+)\[([^\]]*)\]\s*$").unwrap())
}

pub(crate) fn block_image_regex() -> &'static Regex {
    BLOCK_IMAGE_RE.get_or_init(|| Regex::new(r"^\s*image::([^\[\s]+)\[([^\]]*)\]\s*$").unwrap())
}

pub(crate) fn inline_image_regex() -> &'static Regex {
    INLINE_IMAGE_RE
        .get_or_init(|| Regex::new(r"\bimage:([^:\[\s][^\[\s]*)\[([^\]]*)\]").unwrap())
}

fn scheme_regex() -> &'static Regex {
    SCHEME_RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap())
}

/// True for targets that point off-site (`https://`, `mailto:`, `data:`)
pub fn is_remote(target: &str) -> bool {
    scheme_regex().is_match(target) || target.starts_with("//")
}

/// Tracks whether a line sits inside a fenced code block.
#[derive(Debug, Default)]
pub struct FenceTracker {
    open: Option<(char, usize)>,
}

impl FenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Feed the next line. Returns true when the line is a fence delimiter
    /// or part of a fenced block's content.
    pub fn observe(&mut self, line: &str) -> bool {
        let trimmed = line.trim_start();
        let fence = ['`', '~'].into_iter().find_map(|ch| {
            let run = trimmed.chars().take_while(|c| *c == ch).count();
            (run >= 3).then_some((ch, run))
        });

        match (self.open, fence) {
            (None, Some(opener)) => {
                self.open = Some(opener);
                true
            }
            (Some((ch, len)), Some((fch, flen)))
                if ch == fch && flen >= len && trimmed[flen..].trim().is_empty() =>
            {
                self.open = None;
                true
            }
            (Some(_), _) => true,
            (None, None) => false,
        }
    }
}

/// Byte ranges of `body` that Markdown renders as code: inline code spans,
/// fenced blocks and indented blocks.
#[derive(Debug, Default)]
pub struct CodeRanges(Vec<Range<usize>>);

impl CodeRanges {
    pub fn scan(body: &str) -> Self {
        let ranges = Parser::new(body)
            .into_offset_iter()
            .filter_map(|(event, range)| match event {
                Event::Code(_) | Event::Start(Tag::CodeBlock(_)) => Some(range),
                _ => None,
            })
            .collect();
        Self(ranges)
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.0.iter().any(|range| range.contains(&offset))
    }
}

/// Scan include and Asciidoc image directives line by line.
///
/// Includes are recognized everywhere (they commonly pull source into a
/// fenced block); image directives only where Markdown would not render
/// them as code.
pub fn scan_line_directives(body: &str) -> Vec<Directive> {
    let mut found = Vec::new();
    let code = CodeRanges::scan(body);
    let mut offset = 0;

    for (idx, line) in body.split_inclusive('\n').enumerate() {
        let line_no = idx + 1;
        let line_start = offset;
        offset += line.len();

        if let Some(caps) = include_regex().captures(line) {
            found.push(Directive {
                kind: ReferenceKind::Include,
                target: caps[1].to_string(),
                attrs: caps[2].to_string(),
                line: line_no,
            });
            continue;
        }

        if let Some(caps) = block_image_regex().captures(line) {
            if !code.contains(line_start + caps.get(1).map_or(0, |m| m.start())) {
                found.push(Directive {
                    kind: ReferenceKind::Image,
                    target: caps[1].to_string(),
                    attrs: caps[2].to_string(),
                    line: line_no,
                });
            }
            continue;
        }

        for caps in inline_image_regex().captures_iter(line) {
            if code.contains(line_start + caps.get(0).map_or(0, |m| m.start())) {
                continue;
            }
            found.push(Directive {
                kind: ReferenceKind::Image,
                target: caps[1].to_string(),
                attrs: caps[2].to_string(),
                line: line_no,
            });
        }
    }

    found
}

/// Scan Markdown image and link destinations.
///
/// Remote destinations and same-page fragments are skipped; links are kept
/// only when `is_document_link` accepts the path.
pub fn scan_markdown_targets(body: &str, is_document_link: impl Fn(&str) -> bool) -> Vec<Directive> {
    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(body.match_indices('\n').map(|(i, _)| i + 1))
        .collect();
    let line_of = |offset: usize| line_starts.partition_point(|&start| start <= offset);

    let mut found = Vec::new();
    for (event, range) in Parser::new(body).into_offset_iter() {
        let (kind, dest) = match event {
            Event::Start(Tag::Image { dest_url, .. }) => (ReferenceKind::Image, dest_url),
            Event::Start(Tag::Link { dest_url, .. }) => (ReferenceKind::Link, dest_url),
            _ => continue,
        };

        let dest = dest.trim();
        if dest.is_empty() || dest.starts_with('#') || is_remote(dest) {
            continue;
        }
        if kind == ReferenceKind::Link && !is_document_link(strip_fragment(dest)) {
            continue;
        }

        found.push(Directive {
            kind,
            target: dest.to_string(),
            attrs: String::new(),
            line: line_of(range.start),
        });
    }

    found
}

/// Drop a trailing `#fragment` or `?query` from a link target
pub fn strip_fragment(target: &str) -> &str {
    let end = target.find(|c: char| c == '#' || c == '?').unwrap_or(target.len());
    &target[..end]
}

/// First positional attribute of an Asciidoc image directive, used as alt text
pub fn image_alt(target: &str, attrs: &str) -> String {
    let first = attrs.split(',').next().unwrap_or("").trim();
    if !first.is_empty() && !first.contains('=') {
        return first.trim_matches('"').to_string();
    }
    std::path::Path::new(target)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_tracking() {
        let mut fences = FenceTracker::new();
        assert!(!fences.observe("text"));
        assert!(fences.observe("```java"));
        assert!(fences.observe("image::inside.png[]"));
        // A shorter or different fence does not close the block
        assert!(fences.observe("~~~"));
        assert!(fences.observe("```"));
        assert!(!fences.observe("after"));

        let mut fences = FenceTracker::new();
        assert!(fences.observe("````"));
        assert!(fences.observe("```"));
        assert!(fences.observe("`````"));
        assert!(!fences.observe("out"));
    }

    #[test]
    fn test_scan_line_directives() {
        let body = "intro\n\
                    image::images/arch.png[Architecture, 600]\n\
                    See image:icons/tip.svg[] inline.\n\
                    ```java\n\
                    include::{snippets}/Demo.java[tags=setup]\n\
                    image::not-an-image.png[]\n\
                    ```\n";

        let found = scan_line_directives(body);
        let summary: Vec<_> = found
            .iter()
            .map(|d| (d.kind, d.target.as_str(), d.line))
            .collect();
        assert_eq!(
            summary,
            vec![
                (ReferenceKind::Image, "images/arch.png", 2),
                (ReferenceKind::Image, "icons/tip.svg", 3),
                (ReferenceKind::Include, "{snippets}/Demo.java", 5),
            ]
        );
        assert_eq!(found[2].attrs, "tags=setup");
    }

    #[test]
    fn test_image_directives_in_code_are_text() {
        let body = "Write `image:diagram.png[]` to embed a picture.\n\n\
                    Example:\n\n    image::shot.png[]\n\n\
                    ~~~\nimage:fenced.png[]\n~~~\n\n\
                    Real image:real.png[] here.\n";

        let targets: Vec<_> = scan_line_directives(body)
            .into_iter()
            .map(|d| d.target)
            .collect();
        assert_eq!(targets, vec!["real.png"]);
    }

    #[test]
    fn test_code_ranges() {
        let body = "plain `span` text\n\n```\nblock\n```\n";
        let code = CodeRanges::scan(body);
        assert!(!code.contains(0));
        assert!(code.contains(body.find("span").unwrap()));
        assert!(code.contains(body.find("block").unwrap()));
        assert!(!code.contains(body.find("text").unwrap()));
    }

    #[test]
    fn test_scan_markdown_targets() {
        let body = "![diagram](img/flow.png)\n\n\
                    [next post](testcontainers.md#setup) and [docs](https://spring.io)\n\n\
                    [anchor](#top) ![remote](https://example.com/x.png)\n\n\
                    [pdf](files/slides.pdf)\n\n\
                    `![not](code.png)`\n";

        let found = scan_markdown_targets(body, |p| p.ends_with(".md"));
        let summary: Vec<_> = found
            .iter()
            .map(|d| (d.kind, d.target.as_str(), d.line))
            .collect();
        assert_eq!(
            summary,
            vec![
                (ReferenceKind::Image, "img/flow.png", 1),
                (ReferenceKind::Link, "testcontainers.md#setup", 3),
            ]
        );
    }

    #[test]
    fn test_image_alt() {
        assert_eq!(image_alt("images/arch.png", "Architecture, 600"), "Architecture");
        assert_eq!(image_alt("images/arch.png", ""), "arch");
        assert_eq!(image_alt("images/arch.png", "width=300"), "arch");
    }

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://example.com"));
        assert!(is_remote("mailto:me@example.com"));
        assert!(is_remote("//cdn.example.com/x.js"));
        assert!(!is_remote("images/x.png"));
        assert!(!is_remote("/images/x.png"));
    }
}

//! Callout markers in code blocks.
//!
//! A code line may end in one or more `<N>` markers, optionally after a line
//! comment token:
//!
//! ```text
//! ```java
//! @RestControllerAdvice // <1>
//! class Handler extends ResponseEntityExceptionHandler { // <2>
//! ```
//! 1. Applies to every controller
//! 2. Inherits the default problem mappings
//! ```
//!
//! Markers must count up from 1 without gaps or repeats, and the ordered list
//! right after the block must hold one description per marker. Blocks that
//! break either rule are rendered as plain code and reported.

use super::highlight::Highlighter;
use super::html_escape;
use crate::models::CodeBlock;
use pulldown_cmark::{CodeBlockKind, CowStr, Event, Tag, TagEnd};
use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

/// Line comment tokens that may sit between the code and its markers
const COMMENT_TOKENS: [&str; 5] = ["//", "#", "--", ";;", "%"];

static MARKER_RE: OnceLock<Regex> = OnceLock::new();

fn marker_regex() -> &'static Regex {
    MARKER_RE.get_or_init(|| Regex::new(r"<(\d+)>$").unwrap())
}

/// Why a block's callouts were rejected
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CalloutIssue {
    #[error("expected marker <{expected}> but found <{found}>")]
    Gap { expected: u32, found: u32 },

    #[error("marker <{marker}> appears more than once")]
    Repeat { marker: u32 },

    #[error("marker <{marker}> is out of range; markers start at <1>")]
    OutOfRange { marker: u32 },

    #[error("{markers} markers but {descriptions} descriptions")]
    DescriptionMismatch { markers: usize, descriptions: usize },
}

/// A code block whose callouts could not be substituted
#[derive(Error, Debug, Clone, Serialize)]
#[error("malformed callouts in code block {block} of {}: {issue}", .path.display())]
pub struct MalformedCalloutError {
    pub path: PathBuf,
    /// 1-based position of the code block in the document
    pub block: usize,
    pub language: Option<String>,
    pub issue: CalloutIssue,
}

/// One code line with its trailing markers removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalloutLine {
    /// Line text without markers, always ending in `\n`
    pub code: String,
    pub markers: Vec<u32>,
}

/// Strip trailing `<N>` markers (and a comment token left bare) from a line
pub fn split_markers(line: &str) -> CalloutLine {
    let content = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
    let mut rest = content.trim_end();
    let mut markers = Vec::new();

    while let Some(caps) = marker_regex().captures(rest) {
        let (Some(whole), Some(num)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let Ok(n) = num.as_str().parse::<u32>() else {
            break;
        };
        markers.push(n);
        rest = rest[..whole.start()].trim_end();
    }

    if markers.is_empty() {
        return CalloutLine {
            code: format!("{content}\n"),
            markers,
        };
    }

    markers.reverse();
    if let Some(stripped) = COMMENT_TOKENS.iter().find_map(|t| rest.strip_suffix(t)) {
        rest = stripped.trim_end();
    }

    CalloutLine {
        code: format!("{rest}\n"),
        markers,
    }
}

/// Split a code block's text into lines with their markers
pub fn parse_lines(code: &str) -> Vec<CalloutLine> {
    code.split_inclusive('\n').map(split_markers).collect()
}

/// Extract a [`CodeBlock`] record from a language tag and raw text
pub fn code_block(language: Option<String>, text: &str) -> CodeBlock {
    let callouts = parse_lines(text)
        .into_iter()
        .flat_map(|line| line.markers)
        .collect();
    CodeBlock {
        language,
        text: text.to_string(),
        callouts,
    }
}

/// Check marker numbering and the description count.
///
/// Markers must be exactly `1, 2, ..., n` in order of appearance.
pub fn validate(markers: &[u32], descriptions: usize) -> Result<(), CalloutIssue> {
    let mut expected = 1;
    for &found in markers {
        if found == 0 {
            return Err(CalloutIssue::OutOfRange { marker: found });
        } else if found == expected {
            expected += 1;
        } else if found < expected {
            return Err(CalloutIssue::Repeat { marker: found });
        } else {
            return Err(CalloutIssue::Gap { expected, found });
        }
    }

    if markers.len() != descriptions {
        return Err(CalloutIssue::DescriptionMismatch {
            markers: markers.len(),
            descriptions,
        });
    }
    Ok(())
}

/// The ordered list following a code block
struct DescriptionList {
    /// Index of the list's closing event
    end: usize,
    items: Vec<String>,
}

fn description_list(events: &[Event<'static>], start: usize) -> Option<DescriptionList> {
    if !matches!(events.get(start), Some(Event::Start(Tag::List(Some(_))))) {
        return None;
    }

    let mut items: Vec<String> = Vec::new();
    let mut depth = 0usize;
    for (idx, event) in events.iter().enumerate().skip(start) {
        match event {
            Event::Start(Tag::List(_)) => depth += 1,
            Event::End(TagEnd::List(_)) => {
                depth -= 1;
                if depth == 0 {
                    let items = items.into_iter().map(|s| s.trim().to_string()).collect();
                    return Some(DescriptionList { end: idx, items });
                }
            }
            Event::Start(Tag::Item) if depth == 1 => items.push(String::new()),
            Event::Text(text) | Event::Code(text) => {
                if let Some(item) = items.last_mut() {
                    item.push_str(text);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some(item) = items.last_mut() {
                    item.push(' ');
                }
            }
            _ => {}
        }
    }
    None
}

fn callout_id(block: usize, marker: usize) -> String {
    format!("callout-{block}-{marker}")
}

fn html(s: String) -> Event<'static> {
    Event::Html(CowStr::Boxed(s.into_boxed_str()))
}

/// Renders code blocks, substituting valid callouts
pub struct CalloutTransformer<'a> {
    highlighter: &'a Highlighter,
    path: PathBuf,
}

/// Output of [`CalloutTransformer::transform`]
pub struct CalloutOutput {
    pub events: Vec<Event<'static>>,
    pub code_blocks: Vec<CodeBlock>,
    pub errors: Vec<MalformedCalloutError>,
}

impl<'a> CalloutTransformer<'a> {
    pub fn new(highlighter: &'a Highlighter, path: impl Into<PathBuf>) -> Self {
        Self {
            highlighter,
            path: path.into(),
        }
    }

    pub fn transform(&self, events: Vec<Event<'static>>) -> CalloutOutput {
        let mut out = Vec::with_capacity(events.len());
        let mut code_blocks = Vec::new();
        let mut errors = Vec::new();
        let mut idx = 0;

        while idx < events.len() {
            let language = match &events[idx] {
                Event::Start(Tag::CodeBlock(kind)) => match kind {
                    CodeBlockKind::Fenced(info) => {
                        info.split_whitespace().next().map(str::to_string)
                    }
                    CodeBlockKind::Indented => None,
                },
                other => {
                    out.push(other.clone());
                    idx += 1;
                    continue;
                }
            };

            let mut text = String::new();
            let mut close = idx + 1;
            while close < events.len() {
                match &events[close] {
                    Event::End(TagEnd::CodeBlock) => break,
                    Event::Text(t) => text.push_str(t),
                    _ => {}
                }
                close += 1;
            }

            let block_no = code_blocks.len() + 1;
            let block = code_block(language, &text);
            let list = description_list(&events, close + 1);

            if block.callouts.is_empty() {
                out.push(html(self.render_plain(&block)));
                idx = close + 1;
                code_blocks.push(block);
                continue;
            }

            let described = list.as_ref().map_or(0, |l| l.items.len());
            match (validate(&block.callouts, described), list) {
                (Ok(()), Some(list)) => {
                    out.push(html(self.render_annotated(&block, block_no, &list.items)));
                    out.extend(self.transform_list(&events[close + 1..=list.end], block_no));
                    idx = list.end + 1;
                }
                (result, _) => {
                    let issue = match result {
                        Err(issue) => issue,
                        // Valid numbering can only fail here for want of a list
                        Ok(()) => CalloutIssue::DescriptionMismatch {
                            markers: block.callouts.len(),
                            descriptions: 0,
                        },
                    };
                    let error = MalformedCalloutError {
                        path: self.path.clone(),
                        block: block_no,
                        language: block.language.clone(),
                        issue,
                    };
                    tracing::warn!("{}", error);
                    errors.push(error);
                    out.push(html(self.render_plain(&block)));
                    idx = close + 1;
                }
            }
            code_blocks.push(block);
        }

        CalloutOutput {
            events: out,
            code_blocks,
            errors,
        }
    }

    fn render_plain(&self, block: &CodeBlock) -> String {
        let highlighted = self
            .highlighter
            .highlight(&block.text, block.language.as_deref());
        wrap(block.language.as_deref(), highlighted.into_html())
    }

    fn render_annotated(&self, block: &CodeBlock, block_no: usize, descriptions: &[String]) -> String {
        let lines = parse_lines(&block.text);
        let code: String = lines.iter().map(|l| l.code.as_str()).collect();
        let mut highlighted = self.highlighter.highlight(&code, block.language.as_deref());

        for (line, rendered) in lines.iter().zip(highlighted.lines.iter_mut()) {
            let annotations: String = line
                .markers
                .iter()
                .map(|&n| {
                    let id = callout_id(block_no, n as usize);
                    let title = descriptions
                        .get(n as usize - 1)
                        .map(String::as_str)
                        .unwrap_or("");
                    format!(
                        r##" <a class="callout" id="{id}-ref" href="#{id}" title="{}">({n})</a>"##,
                        html_escape(title)
                    )
                })
                .collect();
            if annotations.is_empty() {
                continue;
            }
            let at = rendered.rfind('\n').unwrap_or(rendered.len());
            rendered.insert_str(at, &annotations);
        }

        wrap(block.language.as_deref(), highlighted.into_html())
    }

    /// Give the description list and its items ids matching the annotations
    fn transform_list(&self, list: &[Event<'static>], block_no: usize) -> Vec<Event<'static>> {
        let mut out = Vec::with_capacity(list.len());
        let mut depth = 0usize;
        let mut item = 0usize;

        for event in list {
            match event {
                Event::Start(Tag::List(_)) => {
                    depth += 1;
                    if depth == 1 {
                        out.push(html("<ol class=\"callout-list\">\n".to_string()));
                        continue;
                    }
                }
                Event::End(TagEnd::List(_)) => {
                    depth -= 1;
                    if depth == 0 {
                        out.push(html("</ol>\n".to_string()));
                        continue;
                    }
                }
                Event::Start(Tag::Item) if depth == 1 => {
                    item += 1;
                    out.push(html(format!("<li id=\"{}\">", callout_id(block_no, item))));
                    continue;
                }
                Event::End(TagEnd::Item) if depth == 1 => {
                    out.push(html("</li>\n".to_string()));
                    continue;
                }
                _ => {}
            }
            out.push(event.clone());
        }
        out
    }
}

fn wrap(language: Option<&str>, pre: String) -> String {
    match language {
        Some(lang) => format!(
            "<div class=\"code-block\" data-lang=\"{}\">{}</div>\n",
            html_escape(lang),
            pre
        ),
        None => format!("<div class=\"code-block\">{}</div>\n", pre),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulldown_cmark::{Options, Parser};

    fn run(markdown: &str) -> (String, CalloutOutput) {
        let events: Vec<Event<'static>> = Parser::new_ext(markdown, Options::empty())
            .map(Event::into_static)
            .collect();
        let highlighter = Highlighter::default();
        let output = CalloutTransformer::new(&highlighter, "/content/post.md").transform(events);
        let mut html = String::new();
        pulldown_cmark::html::push_html(&mut html, output.events.iter().cloned());
        (html, output)
    }

    #[test]
    fn test_split_markers() {
        assert_eq!(
            split_markers("foo(); // <1>\n"),
            CalloutLine {
                code: "foo();\n".into(),
                markers: vec![1]
            }
        );
        assert_eq!(split_markers("run: x # <2> <3>").markers, vec![2, 3]);
        assert_eq!(split_markers("run: x # <2> <3>").code, "run: x\n");
        assert_eq!(split_markers("SELECT 1; -- <4>\n").code, "SELECT 1;\n");
        assert_eq!(split_markers("List<String> xs;\n").markers, Vec::<u32>::new());
        assert_eq!(split_markers("a <1> b\n").markers, Vec::<u32>::new());
    }

    #[test]
    fn test_validate() {
        assert_eq!(validate(&[1, 2, 3], 3), Ok(()));
        assert_eq!(
            validate(&[1, 3], 2),
            Err(CalloutIssue::Gap {
                expected: 2,
                found: 3
            })
        );
        assert_eq!(
            validate(&[1, 2, 2], 3),
            Err(CalloutIssue::Repeat { marker: 2 })
        );
        assert_eq!(
            validate(&[2], 1),
            Err(CalloutIssue::Gap {
                expected: 1,
                found: 2
            })
        );
        assert_eq!(
            validate(&[0, 1], 2),
            Err(CalloutIssue::OutOfRange { marker: 0 })
        );
        assert_eq!(
            validate(&[1, 0], 2),
            Err(CalloutIssue::OutOfRange { marker: 0 })
        );
        assert_eq!(
            validate(&[1, 2], 3),
            Err(CalloutIssue::DescriptionMismatch {
                markers: 2,
                descriptions: 3
            })
        );
    }

    #[test]
    fn test_three_callouts_substituted() {
        let md = "```java\n\
                  @RestControllerAdvice // <1>\n\
                  class Handler { // <2>\n\
                  }  // <3>\n\
                  ```\n\
                  1. Applies to all controllers\n\
                  2. The handler class\n\
                  3. Closing brace\n";
        let (html, output) = run(md);

        assert!(output.errors.is_empty());
        assert_eq!(output.code_blocks.len(), 1);
        assert_eq!(output.code_blocks[0].callouts, vec![1, 2, 3]);
        assert_eq!(html.matches(r#"class="callout""#).count(), 3);
        assert!(html.contains(r##"href="#callout-1-1" title="Applies to all controllers""##));
        assert!(html.contains(r##"href="#callout-1-2" title="The handler class""##));
        assert!(html.contains(r##"href="#callout-1-3" title="Closing brace""##));
        assert!(html.contains(r#"<ol class="callout-list">"#));
        assert!(html.contains(r#"<li id="callout-1-3">Closing brace</li>"#));
        assert!(!html.contains("&lt;1&gt;"));
    }

    #[test]
    fn test_gap_renders_without_substitution() {
        let md = "```java\nfoo(); // <1>\nbar(); // <3>\n```\n1. Foo\n2. Bar\n";
        let (html, output) = run(md);

        assert_eq!(output.errors.len(), 1);
        let error = &output.errors[0];
        assert_eq!(error.path, PathBuf::from("/content/post.md"));
        assert_eq!(error.block, 1);
        assert_eq!(error.language.as_deref(), Some("java"));
        assert_eq!(
            error.issue,
            CalloutIssue::Gap {
                expected: 2,
                found: 3
            }
        );

        assert_eq!(html.matches(r#"class="callout""#).count(), 0);
        assert!(html.contains("&lt;3&gt;"));
        assert!(html.contains("<li>Foo</li>"));
    }

    #[test]
    fn test_missing_description_list() {
        let md = "```sh\necho hi # <1>\n```\n\nNo list here.\n";
        let (html, output) = run(md);
        assert_eq!(output.errors.len(), 1);
        assert_eq!(
            output.errors[0].issue,
            CalloutIssue::DescriptionMismatch {
                markers: 1,
                descriptions: 0
            }
        );
        assert!(html.contains("No list here."));
    }

    #[test]
    fn test_block_without_markers_keeps_following_list() {
        let md = "```\nplain\n```\n1. Ordinary list\n";
        let (html, output) = run(md);
        assert!(output.errors.is_empty());
        assert_eq!(output.code_blocks[0].language, None);
        assert!(html.contains("<ol>"));
        assert!(html.contains("plain"));
    }

    #[test]
    fn test_block_numbers_count_every_code_block() {
        let md = "```\nfirst\n```\n\n```py\nx = 1  # <1>\n```\n1. One\n";
        let (html, output) = run(md);
        assert!(output.errors.is_empty());
        assert!(html.contains(r##"href="#callout-2-1""##));
        assert!(html.contains(r#"data-lang="py""#));
    }
}

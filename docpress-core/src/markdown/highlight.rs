//! Code syntax highlighting using syntect.

use std::sync::OnceLock;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::{start_highlighted_html_snippet, styled_line_to_highlighted_html, IncludeBackground};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
static THEME_SET: OnceLock<ThemeSet> = OnceLock::new();

const FALLBACK_THEMES: [&str; 2] = ["InspiredGitHub", "base16-ocean.light"];

fn syntax_set() -> &'static SyntaxSet {
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn theme_set() -> &'static ThemeSet {
    THEME_SET.get_or_init(ThemeSet::load_defaults)
}

/// A highlighted code block, split per source line
#[derive(Debug, Clone)]
pub struct HighlightedBlock {
    /// Opening `<pre ...>` tag carrying the theme background
    pub open: String,
    /// One HTML fragment per line, each ending in `\n` when the source did
    pub lines: Vec<String>,
}

impl HighlightedBlock {
    pub fn into_html(self) -> String {
        let mut html = self.open;
        for line in self.lines {
            html.push_str(&line);
        }
        html.push_str("</pre>\n");
        html
    }
}

/// Syntax highlighter bound to one theme
#[derive(Debug, Clone)]
pub struct Highlighter {
    theme: Theme,
}

impl Highlighter {
    /// Look up a bundled syntect theme, falling back to a light default
    pub fn new(theme_name: &str) -> Self {
        let themes = &theme_set().themes;
        let theme = themes
            .get(theme_name)
            .or_else(|| {
                tracing::warn!("Unknown highlight theme '{}', using default", theme_name);
                FALLBACK_THEMES.iter().find_map(|name| themes.get(*name))
            })
            .cloned()
            .unwrap_or_default();
        Self { theme }
    }

    /// Resolve a fence language tag; unknown or missing tags get plain text
    pub fn syntax_for(&self, lang: Option<&str>) -> &'static SyntaxReference {
        let ss = syntax_set();
        lang.and_then(|l| {
            ss.find_syntax_by_token(l)
                .or_else(|| ss.find_syntax_by_extension(l))
        })
        .unwrap_or_else(|| ss.find_syntax_plain_text())
    }

    /// Highlight `code` line by line
    pub fn highlight(&self, code: &str, lang: Option<&str>) -> HighlightedBlock {
        let ss = syntax_set();
        let syntax = self.syntax_for(lang);
        let (open, background) = start_highlighted_html_snippet(&self.theme);
        let mut highlighter = HighlightLines::new(syntax, &self.theme);

        let lines = LinesWithEndings::from(code)
            .map(|line| {
                highlighter
                    .highlight_line(line, ss)
                    .and_then(|regions| {
                        styled_line_to_highlighted_html(
                            &regions[..],
                            IncludeBackground::IfDifferent(background),
                        )
                    })
                    .unwrap_or_else(|err| {
                        tracing::debug!("Highlighting failed, emitting plain line: {}", err);
                        super::html_escape(line)
                    })
            })
            .collect();

        HighlightedBlock { open, lines }
    }
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new(FALLBACK_THEMES[0])
    }
}

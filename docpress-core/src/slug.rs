//! Slug generation for document URLs and heading anchors.

use unicode_segmentation::UnicodeSegmentation;

/// Convert a string to a URL-safe slug
///
/// Lowercases, turns whitespace, underscores and dots between words into
/// single hyphens, and drops punctuation. Unicode letters are kept.
///
/// ```
/// use docpress_core::slugify;
///
/// assert_eq!(slugify("Problem Details in Spring Boot"), "problem-details-in-spring-boot");
/// assert_eq!(slugify("What's new?"), "whats-new");
/// ```
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for grapheme in input.graphemes(true) {
        let Some(c) = grapheme.chars().next() else {
            continue;
        };

        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push_str(&grapheme.to_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' || c == '/' {
            pending_hyphen = true;
        }
        // Anything else (punctuation, symbols) is dropped without a separator
    }

    slug
}

//! Utility functions and helpers.

pub mod http;

use unicode_segmentation::UnicodeSegmentation;
use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Collapse whitespace runs to single spaces and trim both ends.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Length in characters, the unit message limits are expressed in.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Keep whole grapheme clusters from the start of `s` up to `max_chars` characters.
pub fn truncate_graphemes(s: &str, max_chars: usize) -> &str {
    let mut used = 0;
    let mut end = 0;
    for (idx, grapheme) in s.grapheme_indices(true) {
        let width = grapheme.chars().count();
        if used + width > max_chars {
            break;
        }
        used += width;
        end = idx + grapheme.len();
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://www.glassdoor.com.br/Vaga/x.htm").unwrap();
        assert_eq!(
            resolve_url(&base, "/job-listing/123"),
            "https://www.glassdoor.com.br/job-listing/123"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x"),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \t b\n\nc  "), "a b c");
        assert_eq!(normalize_whitespace("   "), "");
    }

    #[test]
    fn test_truncate_graphemes_keeps_clusters_whole() {
        // "é" written as e + combining acute is one grapheme of two chars
        let s = "cafe\u{301} com leite";
        assert_eq!(truncate_graphemes(s, 4), "caf");
        assert_eq!(truncate_graphemes(s, 5), "cafe\u{301}");
        assert_eq!(truncate_graphemes(s, 100), s);
        assert_eq!(truncate_graphemes(s, 0), "");
    }

    #[test]
    fn test_char_len_counts_chars_not_bytes() {
        assert_eq!(char_len("Estágio"), 7);
    }
}

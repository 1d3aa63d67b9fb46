use regex::Regex;
use std::sync::LazyLock;

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^\)]+\)").expect("link regex"));
static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#+ ").expect("heading regex"));
static NEWLINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\r\n]+").expect("newline regex"));
static FENCED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("fence regex"));
static INLINE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`[^`]+`").expect("inline code regex"));
static INDENTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s{4}").expect("indent regex"));
static LIST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*[-*+]\s+").expect("list item regex"));

/// Measurements of a converted page body that feed the content heuristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContentMetrics {
    /// Characters of visible text once links, heading markers and line breaks are gone
    pub content_length: usize,
    /// Fenced blocks + inline code spans + four-space indented lines
    pub code_block_indicators: usize,
    /// Bullet list items
    pub list_items: usize,
}

impl ContentMetrics {
    pub fn measure(markdown: &str) -> Self {
        let without_links = LINK_RE.replace_all(markdown, "");
        let without_headings = HEADING_RE.replace_all(&without_links, "");
        let text = NEWLINES_RE.replace_all(&without_headings, " ");

        Self {
            content_length: text.trim().chars().count(),
            code_block_indicators: FENCED_RE.find_iter(markdown).count()
                + INLINE_CODE_RE.find_iter(markdown).count()
                + INDENTED_RE.find_iter(markdown).count(),
            list_items: LIST_ITEM_RE.find_iter(markdown).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_length_ignores_links_and_headings() {
        let markdown = "# Title\n\n[Guide](https://a/1) and [API](https://a/2)\nplain";
        let metrics = ContentMetrics::measure(markdown);

        // "Title" + " " + " and " + " " + "plain" collapses to "Title  and  plain"
        assert_eq!(metrics.content_length, "Title  and  plain".chars().count());
    }

    #[test]
    fn test_content_length_counts_characters_not_bytes() {
        let metrics = ContentMetrics::measure("概述");
        assert_eq!(metrics.content_length, 2);
    }

    #[test]
    fn test_code_indicators() {
        let markdown = "Use `ls` and `cd`.\n\n```bash\necho hi\n```\n\n    indented\n";
        let metrics = ContentMetrics::measure(markdown);

        assert!(metrics.code_block_indicators >= 4);
    }

    #[test]
    fn test_list_items() {
        let markdown = "- [A](https://a/1)\n- [B](https://a/2)\n* C\n+ D\nnot - a item";
        assert_eq!(ContentMetrics::measure(markdown).list_items, 4);
    }

    #[test]
    fn test_empty_body() {
        assert_eq!(ContentMetrics::measure(""), ContentMetrics::default());
    }
}

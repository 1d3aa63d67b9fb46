use chrono::{DateTime, Utc};
use htmd::{Element, HtmlToMarkdown};
use regex::{Captures, Regex};
use std::sync::LazyLock;
use url::Url;

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment regex"));
static STRIPPED_TAG_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["script", "style", "nav", "footer", "header"]
        .iter()
        .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).expect("tag regex"))
        .collect()
});
static TARGET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(!?\[[^\]]*\]\()([^)\s]+)").expect("target regex"));
static BLANK_LINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank line regex"));

static HTML_TO_MARKDOWN: LazyLock<HtmlToMarkdown> = LazyLock::new(|| {
    HtmlToMarkdown::builder()
        .add_handler(vec!["td", "th"], table_cell)
        .add_handler(vec!["tr"], table_row)
        .add_handler(vec!["table"], table)
        .build()
});

// Markers passed from cell and row handlers up to the table handler
const CELL: char = '\u{1f}';
const HEADER_CELL: char = '\u{1e}';
const ROW: char = '\u{1d}';

/// Turns a rendered body into Markdown
pub trait Converter: Send + Sync {
    /// Never fails: on error the raw input comes back behind an error marker
    fn to_markdown(&self, raw: &str, base_url: &Url) -> String;
}

/// HTML to Markdown via htmd
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownConverter;

impl Converter for MarkdownConverter {
    fn to_markdown(&self, raw: &str, base_url: &Url) -> String {
        let cleaned = COMMENT_RE.replace_all(raw, "");
        let cleaned = STRIPPED_TAG_RES
            .iter()
            .fold(cleaned.into_owned(), |html, re| re.replace_all(&html, "").into_owned());

        match HTML_TO_MARKDOWN.convert(&cleaned) {
            Ok(markdown) => tidy(&resolve_targets(&markdown, base_url)),
            Err(e) => {
                ::log::error!("Markdown conversion failed for {}: {}", base_url, e);
                format!("<!-- conversion failed: {} -->\n\n{}", e, raw)
            }
        }
    }
}

fn table_cell(element: Element) -> Option<String> {
    let marker = if element.tag == "th" { HEADER_CELL } else { CELL };
    let text = element
        .content
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "\\|");
    Some(format!("{}{}", marker, text))
}

fn table_row(element: Element) -> Option<String> {
    let mut cells = element.content.split([CELL, HEADER_CELL]);
    // Anything before the first cell is stray whitespace
    cells.next();
    let cells: Vec<&str> = cells.map(str::trim).collect();
    Some(format!("\n{}{}\n", ROW, cells.join(&CELL.to_string())))
}

/// GFM pipe table; the first row is the header
fn table(element: Element) -> Option<String> {
    let rows: Vec<Vec<&str>> = element
        .content
        .lines()
        .filter_map(|line| line.split_once(ROW).map(|(_, cells)| cells))
        .map(|cells| cells.split(CELL).collect())
        .collect();

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return Some(format!("\n\n{}\n\n", element.content));
    }

    let render = |cells: &[&str]| {
        let padded: Vec<&str> = (0..width)
            .map(|i| cells.get(i).copied().unwrap_or(""))
            .collect();
        format!("| {} |", padded.join(" | "))
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    for (i, row) in rows.iter().enumerate() {
        lines.push(render(row));
        if i == 0 {
            lines.push(render(&vec!["---"; width]));
        }
    }
    Some(format!("\n\n{}\n\n", lines.join("\n")))
}

/// Make relative link and image targets absolute against the page URL
pub fn resolve_targets(markdown: &str, base_url: &Url) -> String {
    TARGET_RE
        .replace_all(markdown, |caps: &Captures| {
            let target = &caps[2];
            let keep = target.starts_with('#') || Url::parse(target).is_ok();
            let resolved = if keep {
                target.to_string()
            } else {
                base_url
                    .join(target)
                    .map(|u| u.to_string())
                    .unwrap_or_else(|_| target.to_string())
            };
            format!("{}{}", &caps[1], resolved)
        })
        .into_owned()
}

/// Collapse runs of blank lines, drop trailing spaces, end with exactly one newline
fn tidy(markdown: &str) -> String {
    let trimmed: Vec<&str> = markdown.lines().map(str::trim_end).collect();
    let joined = trimmed.join("\n");
    let collapsed = BLANK_LINES_RE.replace_all(&joined, "\n\n");
    format!("{}\n", collapsed.trim())
}

/// The artifact written for a content page: heading, provenance lines, body
pub fn build_document(title: &str, url: &Url, markdown: &str, updated: DateTime<Utc>) -> String {
    let mut document = String::new();

    if !title.trim().is_empty() {
        document.push_str(&format!("# {}\n\n", title.trim()));
    }
    document.push_str(&format!("> Source: {}\n", url));
    document.push_str(&format!("> Updated: {}\n\n", updated.format("%Y-%m-%d %H:%M:%S")));
    document.push_str(markdown);

    document
}

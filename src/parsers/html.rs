use crate::classifier::StructuralSignals;
use crate::config::SiteSelectors;
use crate::error::CrawlError;
use crate::filter::Link;
use scraper::{ElementRef, Html, Selector};

/// Compiled selectors for one site
#[derive(Debug)]
pub struct PageSelectors {
    content: Selector,
    title: Selector,
    directory_marker: Selector,
    content_marker: Selector,
    links_scope: Selector,
    anchor: Selector,
}

impl PageSelectors {
    pub fn new(selectors: &SiteSelectors) -> Result<Self, CrawlError> {
        Ok(Self {
            content: compile(&selectors.content)?,
            title: compile(&selectors.title)?,
            directory_marker: compile(&selectors.directory_marker)?,
            content_marker: compile(&selectors.content_marker)?,
            links_scope: compile(&selectors.links_scope)?,
            anchor: compile("a[href]")?,
        })
    }
}

fn compile(selector: &str) -> Result<Selector, CrawlError> {
    Selector::parse(selector).map_err(|e| CrawlError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// What the crawl needs from one rendered document
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractedPage {
    pub title: String,
    pub signals: StructuralSignals,
    /// Inner HTML of the content element, if it exists and is non-empty
    pub body: Option<String>,
    /// Anchors inside the content element, or inside the links scope when there is none.
    /// Sidebars and tables of contents outside both are never read.
    pub links: Vec<Link>,
}

/// Pull title, body, links and structural markers out of a page source
pub fn extract_page(html: &str, selectors: &PageSelectors) -> ExtractedPage {
    let doc = Html::parse_document(html);

    let title = doc
        .select(&selectors.title)
        .next()
        .map(|e| collapse_whitespace(e.text()))
        .unwrap_or_default();

    let signals = StructuralSignals {
        has_directory_marker: doc.select(&selectors.directory_marker).next().is_some(),
        has_content_marker: doc.select(&selectors.content_marker).next().is_some(),
    };

    let content = doc.select(&selectors.content).next();
    let body = content
        .map(|e| e.inner_html())
        .filter(|inner| !inner.trim().is_empty());

    let links = content
        .or_else(|| doc.select(&selectors.links_scope).next())
        .map(|scope| anchors(scope, &selectors.anchor))
        .unwrap_or_default();

    ::log::debug!(
        "Extracted \"{}\": {} links, body {}, markers {:?}",
        title,
        links.len(),
        if body.is_some() { "present" } else { "missing" },
        signals
    );

    ExtractedPage {
        title,
        signals,
        body,
        links,
    }
}

fn anchors(scope: ElementRef<'_>, anchor: &Selector) -> Vec<Link> {
    scope
        .select(anchor)
        .filter_map(|e| {
            e.value()
                .attr("href")
                .map(|href| Link::new(collapse_whitespace(e.text()), href))
        })
        .collect()
}

fn collapse_whitespace<'a>(text: impl Iterator<Item = &'a str>) -> String {
    text.collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

//! Page-type classification.
//!
//! Structural markers found in the rendered page are authoritative and win over
//! everything else. Pages without markers fall through to a content heuristic
//! whose rules are tried in a fixed order; the first rule that fires decides.

pub mod metrics;

use crate::config::{ClassifierThresholds, SiteProfile};
use crate::filter::{Link, LinkFilter};
use crate::render::RenderedPage;
use crate::results::PageResult;
pub use metrics::ContentMetrics;
use serde::{Deserialize, Serialize};

/// What role a page plays in the site hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    Catalog,
    Content,
    Unknown,
}

/// Marker elements detected in the rendered page structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StructuralSignals {
    pub has_directory_marker: bool,
    pub has_content_marker: bool,
}

pub struct Classifier {
    thresholds: ClassifierThresholds,
    catalog_keywords: Vec<String>,
    filter: LinkFilter,
}

impl Classifier {
    pub fn new(profile: &SiteProfile) -> Result<Self, regex::Error> {
        Ok(Self {
            thresholds: profile.thresholds.clone(),
            catalog_keywords: profile.catalog_keywords.clone(),
            filter: LinkFilter::new(profile)?,
        })
    }

    pub fn filter(&self) -> &LinkFilter {
        &self.filter
    }

    /// Classify a page from its signals, converted body and already-filtered links
    pub fn classify(
        &self,
        signals: &StructuralSignals,
        body: Option<&str>,
        links: &[Link],
    ) -> PageKind {
        if signals.has_directory_marker {
            ::log::debug!("Directory marker present, classifying as catalog");
            return PageKind::Catalog;
        }

        if signals.has_content_marker {
            ::log::debug!("Content marker present, classifying as content");
            return PageKind::Content;
        }

        match body {
            Some(body) if !body.trim().is_empty() => self.classify_by_content(body, links),
            _ => PageKind::Unknown,
        }
    }

    /// Content heuristic for pages that carry no structural marker
    pub fn classify_by_content(&self, body: &str, links: &[Link]) -> PageKind {
        let t = &self.thresholds;
        let link_count = links.len();

        if link_count == 0 {
            return PageKind::Content;
        }

        let metrics = ContentMetrics::measure(body);
        let content_length = metrics.content_length;
        ::log::trace!("Content heuristic: {:?}, {} links", metrics, link_count);

        // Rich pages stay content regardless of how many links they carry
        if metrics.code_block_indicators >= t.rich_code_indicators
            || content_length >= t.rich_content_length
        {
            return PageKind::Content;
        }

        if content_length < t.tiny_content_length && link_count >= 1 {
            return PageKind::Catalog;
        }

        if content_length < t.short_content_length && link_count >= t.short_min_links {
            return PageKind::Catalog;
        }

        if content_length < t.medium_content_length && link_count >= t.medium_min_links {
            return PageKind::Catalog;
        }

        let link_density = if content_length > 0 {
            (link_count * 100) as f64 / content_length as f64
        } else {
            0.0
        };
        if link_density > t.link_density && link_count >= t.min_catalog_links {
            return PageKind::Catalog;
        }

        if self.mentions_catalog_keyword(body, links)
            && link_count >= t.min_catalog_links
            && content_length < t.keyword_content_length
        {
            return PageKind::Catalog;
        }

        if metrics.list_items >= t.min_list_items
            && link_count as f64 >= metrics.list_items as f64 * t.list_link_ratio
        {
            return PageKind::Catalog;
        }

        let link_text_length: usize = links.iter().map(|l| l.text.chars().count()).sum();
        let link_text_ratio = if content_length > 0 {
            link_text_length as f64 / content_length as f64
        } else {
            0.0
        };
        if link_text_ratio > t.link_text_ratio
            && link_count >= t.min_catalog_links
            && content_length < t.link_text_content_length
        {
            return PageKind::Catalog;
        }

        PageKind::Content
    }

    fn mentions_catalog_keyword(&self, body: &str, links: &[Link]) -> bool {
        self.catalog_keywords.iter().any(|keyword| {
            body.contains(keyword.as_str()) || links.iter().any(|l| l.text.contains(keyword.as_str()))
        })
    }

    /// Turn a rendered page and its converted body into a classified result.
    ///
    /// Only catalog results keep their links.
    pub fn analyze(&self, page: &RenderedPage, markdown: Option<String>) -> PageResult {
        let links = self.filter.valid_links(&page.links, &page.url);
        let kind = self.classify(&page.signals, markdown.as_deref(), &links);

        ::log::info!("Classified {} as {:?}: {}", page.url, kind, page.title);

        let url = page.url.clone();
        let title = page.title.clone();
        match kind {
            PageKind::Catalog => PageResult::Catalog { url, title, links },
            PageKind::Content => PageResult::Content {
                url,
                title,
                markdown: markdown.unwrap_or_default(),
            },
            PageKind::Unknown => PageResult::Unknown { url, title },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn classifier() -> Classifier {
        Classifier::new(&SiteProfile::default()).unwrap()
    }

    fn links(n: usize) -> Vec<Link> {
        (1..=n)
            .map(|i| Link::new(format!("Link {}", i), format!("/document_detail/{}.html", i)))
            .collect()
    }

    fn no_markers() -> StructuralSignals {
        StructuralSignals::default()
    }

    fn prose(len: usize) -> String {
        "x".repeat(len)
    }

    #[test]
    fn test_directory_marker_wins() {
        let signals = StructuralSignals {
            has_directory_marker: true,
            has_content_marker: true,
        };
        let body = prose(5000);
        assert_eq!(
            classifier().classify(&signals, Some(&body), &links(3)),
            PageKind::Catalog
        );
        assert_eq!(classifier().classify(&signals, None, &[]), PageKind::Catalog);
    }

    #[test]
    fn test_content_marker_without_links() {
        let signals = StructuralSignals {
            has_directory_marker: false,
            has_content_marker: true,
        };
        assert_eq!(
            classifier().classify(&signals, Some("tiny"), &links(10)),
            PageKind::Content
        );
    }

    #[test]
    fn test_missing_body_is_unknown() {
        let c = classifier();
        assert_eq!(c.classify(&no_markers(), None, &links(2)), PageKind::Unknown);
        assert_eq!(c.classify(&no_markers(), Some("  \n"), &links(2)), PageKind::Unknown);
    }

    #[test]
    fn test_no_links_is_content() {
        assert_eq!(
            classifier().classify(&no_markers(), Some("short"), &[]),
            PageKind::Content
        );
    }

    #[test]
    fn test_short_page_with_links_is_catalog() {
        let body = prose(50);
        assert_eq!(
            classifier().classify(&no_markers(), Some(&body), &links(2)),
            PageKind::Catalog
        );
    }

    #[test]
    fn test_rich_content_dominates_links() {
        let c = classifier();
        let long = prose(2000);
        assert_eq!(c.classify(&no_markers(), Some(&long), &links(40)), PageKind::Content);

        let code = "`a` `b` `c` `d` `e`";
        assert_eq!(c.classify(&no_markers(), Some(code), &links(4)), PageKind::Content);
    }

    #[test]
    fn test_length_tiers() {
        let c = classifier();
        assert_eq!(
            c.classify(&no_markers(), Some(&prose(250)), &links(2)),
            PageKind::Catalog
        );
        assert_eq!(
            c.classify(&no_markers(), Some(&prose(250)), &links(1)),
            PageKind::Content
        );
        assert_eq!(
            c.classify(&no_markers(), Some(&prose(700)), &links(5)),
            PageKind::Catalog
        );
        assert_eq!(
            c.classify(&no_markers(), Some(&prose(700)), &links(4)),
            PageKind::Content
        );
    }

    #[test]
    fn test_link_density() {
        // 20 links over 900 chars: density 2.2
        assert_eq!(
            classifier().classify(&no_markers(), Some(&prose(900)), &links(20)),
            PageKind::Catalog
        );
        // 3 links over 1500 chars: density 0.2
        assert_eq!(
            classifier().classify(&no_markers(), Some(&prose(1500)), &links(3)),
            PageKind::Content
        );
    }

    #[test]
    fn test_catalog_keyword() {
        let c = classifier();
        let body = format!("产品概述 {}", prose(900));
        assert_eq!(c.classify(&no_markers(), Some(&body), &links(3)), PageKind::Catalog);

        let mut keyword_links = links(3);
        keyword_links[0].text = "功能列表".to_string();
        assert_eq!(
            c.classify(&no_markers(), Some(&prose(900)), &keyword_links),
            PageKind::Catalog
        );
        assert_eq!(
            c.classify(&no_markers(), Some(&prose(900)), &links(3)),
            PageKind::Content
        );
    }

    #[test]
    fn test_list_item_ratio() {
        let body = format!(
            "{}\n- one\n- two\n- three\n- four",
            prose(1200)
        );
        assert_eq!(
            classifier().classify(&no_markers(), Some(&body), &links(3)),
            PageKind::Catalog
        );
        assert_eq!(
            classifier().classify(&no_markers(), Some(&body), &links(2)),
            PageKind::Content
        );
    }

    #[test]
    fn test_thresholds_are_configurable() {
        let profile = SiteProfile {
            thresholds: ClassifierThresholds {
                tiny_content_length: 10,
                short_content_length: 10,
                ..ClassifierThresholds::default()
            },
            ..SiteProfile::default()
        };
        let c = Classifier::new(&profile).unwrap();
        assert_eq!(
            c.classify(&no_markers(), Some(&prose(50)), &links(1)),
            PageKind::Content
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        let c = classifier();
        let body = format!("概述\n- [a](x)\n{}", prose(420));
        let first = c.classify(&no_markers(), Some(&body), &links(3));
        for _ in 0..20 {
            assert_eq!(c.classify(&no_markers(), Some(&body), &links(3)), first);
        }
    }

    #[test]
    fn test_analyze_keeps_links_only_for_catalogs() {
        let c = classifier();
        let page = RenderedPage {
            url: Url::parse("https://help.example.com/document_detail/1.html").unwrap(),
            title: "Products".to_string(),
            signals: StructuralSignals {
                has_directory_marker: true,
                has_content_marker: false,
            },
            raw_body: Some("<p>hi</p>".to_string()),
            links: vec![
                Link::new("One", "/document_detail/2.html"),
                Link::new("下一篇：Two", "/document_detail/3.html"),
                Link::new("Three", "/document_detail/4.html"),
            ],
        };

        match c.analyze(&page, Some("hi".to_string())) {
            PageResult::Catalog { links, title, .. } => {
                assert_eq!(title, "Products");
                assert_eq!(links.len(), 2);
                assert_eq!(links[1].text, "Three");
            }
            other => panic!("expected catalog, got {:?}", other),
        }

        let content_page = RenderedPage {
            signals: StructuralSignals::default(),
            links: vec![],
            ..page
        };
        match c.analyze(&content_page, Some("body".to_string())) {
            PageResult::Content { markdown, .. } => assert_eq!(markdown, "body"),
            other => panic!("expected content, got {:?}", other),
        }
    }
}

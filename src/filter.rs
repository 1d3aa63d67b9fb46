use crate::config::SiteProfile;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// An anchor found on a rendered page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Visible anchor text
    pub text: String,
    /// Target exactly as written in the page (may be relative)
    pub href: String,
}

impl Link {
    pub fn new(text: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            href: href.into(),
        }
    }
}

/// Decides which anchors of a page count as child links
#[derive(Debug)]
pub struct LinkFilter {
    navigation_regexes: Vec<Regex>,
    include_regexes: Vec<Regex>,
    exclude_regexes: Vec<Regex>,
}

impl Default for LinkFilter {
    fn default() -> Self {
        Self::new(&SiteProfile::default()).expect("Default regex patterns should be valid")
    }
}

impl LinkFilter {
    /// Create a new link filter from a site profile
    pub fn new(profile: &SiteProfile) -> Result<Self, regex::Error> {
        Ok(Self {
            navigation_regexes: compile(&profile.navigation_patterns)?,
            include_regexes: compile(&profile.link_include_patterns)?,
            exclude_regexes: compile(&profile.link_exclude_patterns)?,
        })
    }

    /// Keep the valid links of a page, in page order, with trimmed text and targets
    pub fn valid_links(&self, links: &[Link], page_url: &Url) -> Vec<Link> {
        let valid: Vec<Link> = links
            .iter()
            .filter(|link| self.is_valid(link, page_url))
            .map(|link| Link::new(link.text.trim(), link.href.trim()))
            .collect();

        ::log::debug!(
            "{} of {} links on {} are valid",
            valid.len(),
            links.len(),
            page_url
        );
        valid
    }

    /// Check a single anchor against every link rule
    pub fn is_valid(&self, link: &Link, page_url: &Url) -> bool {
        let text = link.text.trim();
        let href = link.href.trim();

        if text.is_empty() || href.is_empty() || href.starts_with('#') {
            return false;
        }

        if self.is_navigation(text) {
            return false;
        }

        let Some(target) = self.normalize_url(href, page_url) else {
            return false;
        };

        if target == self.normalize(page_url) {
            return false;
        }

        // Exclusions take precedence over inclusions
        let target_str = target.as_str();
        if self.exclude_regexes.iter().any(|r| r.is_match(target_str)) {
            return false;
        }

        self.include_regexes.is_empty() || self.include_regexes.iter().any(|r| r.is_match(target_str))
    }

    /// Whether the anchor text reads like "next article:" style navigation
    pub fn is_navigation(&self, text: &str) -> bool {
        let text = text.trim();
        self.navigation_regexes.iter().any(|r| r.is_match(text))
    }

    /// Resolve a link target against the page it was found on, dropping the fragment.
    ///
    /// Only http(s) targets are returned.
    pub fn normalize_url(&self, href: &str, base: &Url) -> Option<Url> {
        let resolved = match base.join(href.trim()) {
            Ok(url) => url,
            Err(e) => {
                ::log::warn!("Failed to resolve link {} against {}: {}", href, base, e);
                return None;
            }
        };

        match resolved.scheme() {
            "http" | "https" => Some(self.normalize(&resolved)),
            _ => None,
        }
    }

    /// Create a normalized version of the URL (e.g., removing fragments)
    pub fn normalize(&self, url: &Url) -> Url {
        let mut normalized = url.clone();
        normalized.set_fragment(None);
        normalized
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>, regex::Error> {
    patterns.iter().map(|p| Regex::new(p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://help.example.com/document_detail/100.html").unwrap()
    }

    fn open_filter() -> LinkFilter {
        let profile = SiteProfile {
            link_include_patterns: vec![],
            ..SiteProfile::default()
        };
        LinkFilter::new(&profile).unwrap()
    }

    #[test]
    fn test_rejects_empty_and_anchor_links() {
        let filter = open_filter();
        let url = page();

        assert!(!filter.is_valid(&Link::new("", "/document_detail/1.html"), &url));
        assert!(!filter.is_valid(&Link::new("   ", "/document_detail/1.html"), &url));
        assert!(!filter.is_valid(&Link::new("Intro", ""), &url));
        assert!(!filter.is_valid(&Link::new("Intro", "#section-2"), &url));
        assert!(filter.is_valid(&Link::new("Intro", "/document_detail/1.html"), &url));
    }

    #[test]
    fn test_rejects_self_links() {
        let filter = open_filter();
        let url = page();

        assert!(!filter.is_valid(&Link::new("Here", "/document_detail/100.html"), &url));
        assert!(!filter.is_valid(&Link::new("Here", "100.html#top"), &url));
        assert!(!filter.is_valid(&Link::new("Here", url.as_str()), &url));
    }

    #[test]
    fn test_rejects_navigation_phrases() {
        let filter = open_filter();
        let url = page();

        for text in [
            "上一篇：创建实例",
            "下一篇:删除实例",
            "相关文档",
            "详情请参见安装指南",
            "Previous article: Setup",
            "next article: Teardown",
            "See also",
            "For more information, see Quotas",
        ] {
            assert!(filter.is_navigation(text), "{} should be navigation", text);
            assert!(!filter.is_valid(&Link::new(text, "/document_detail/2.html"), &url));
        }
        assert!(!filter.is_navigation("Create an instance"));
    }

    #[test]
    fn test_default_include_pattern() {
        let filter = LinkFilter::default();
        let url = page();

        assert!(filter.is_valid(&Link::new("Doc", "/document_detail/7.html"), &url));
        assert!(!filter.is_valid(&Link::new("Pricing", "/pricing"), &url));
        assert!(!filter.is_valid(&Link::new("Logo", "/document_detail/logo.png"), &url));
    }

    #[test]
    fn test_non_http_targets_rejected() {
        let filter = open_filter();
        let url = page();

        assert!(!filter.is_valid(&Link::new("Mail", "mailto:docs@example.com"), &url));
        assert!(!filter.is_valid(&Link::new("Run", "javascript:void(0)"), &url));
    }

    #[test]
    fn test_valid_links_keep_order_and_trim() {
        let filter = open_filter();
        let links = vec![
            Link::new(" B ", " /document_detail/2.html "),
            Link::new("", "/document_detail/3.html"),
            Link::new("A", "/document_detail/1.html"),
        ];
        let valid = filter.valid_links(&links, &page());

        assert_eq!(
            valid,
            vec![
                Link::new("B", "/document_detail/2.html"),
                Link::new("A", "/document_detail/1.html"),
            ]
        );
    }

    #[test]
    fn test_normalize_url() {
        let filter = open_filter();
        let base = page();

        let resolved = filter.normalize_url("../other/5.html#frag", &base).unwrap();
        assert_eq!(resolved.as_str(), "https://help.example.com/other/5.html");

        let absolute = filter
            .normalize_url("https://elsewhere.com/x?y=1", &base)
            .unwrap();
        assert_eq!(absolute.as_str(), "https://elsewhere.com/x?y=1");
    }
}

use crate::filter::Link;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// A classified page; each variant carries only what its branch of the crawl needs
#[derive(Debug, Clone, PartialEq)]
pub enum PageResult {
    /// Navigation page: contributes child tasks and possibly a directory
    Catalog {
        url: Url,
        title: String,
        /// Valid links in page order
        links: Vec<Link>,
    },
    /// Leaf page persisted as one Markdown artifact
    Content {
        url: Url,
        title: String,
        markdown: String,
    },
    /// Neither marker nor body to judge by
    Unknown { url: Url, title: String },
}

impl PageResult {
    pub fn url(&self) -> &Url {
        match self {
            PageResult::Catalog { url, .. }
            | PageResult::Content { url, .. }
            | PageResult::Unknown { url, .. } => url,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            PageResult::Catalog { title, .. }
            | PageResult::Content { title, .. }
            | PageResult::Unknown { title, .. } => title,
        }
    }
}

/// One entry of the error log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub url: String,
    pub message: String,
}

/// Outcome of a whole run, reported once the scheduler goes quiet
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub processed: usize,
    pub errors: usize,
    pub retries: usize,
    pub visited: usize,
    /// Tasks left in the queue because the run was shut down early
    pub pending: usize,
    pub failures: Vec<FailureRecord>,
    pub elapsed: Duration,
}

impl CrawlSummary {
    /// Whether any page failed or was left unfinished
    pub fn is_partial(&self) -> bool {
        self.errors > 0 || self.pending > 0
    }
}

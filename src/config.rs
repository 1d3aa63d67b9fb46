use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for a mirroring run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// URL to start crawling from; may be left to the command line
    #[serde(default)]
    pub start_url: String,

    /// Root directory of the mirrored tree
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Number of concurrent workers (and WebDriver sessions)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Deepest catalog hop still followed (the start page is depth 0)
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Extra attempts granted to a fetch that failed transiently
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Base delay for the linear retry backoff
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Upper bound for a single page fetch
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Write a checkpoint after this many completed tasks
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,

    /// Run the browser without a window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Pick up from an existing checkpoint instead of starting fresh
    #[serde(default)]
    pub resume: bool,

    /// Site-specific selectors, phrases and thresholds
    #[serde(default)]
    pub site: SiteProfile,
}

/// Everything that ties the engine to one particular documentation site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteProfile {
    #[serde(default)]
    pub selectors: SiteSelectors,

    /// Regexes matched against trimmed link text; matches are navigation, not children
    #[serde(default = "default_navigation_patterns")]
    pub navigation_patterns: Vec<String>,

    /// Words that suggest a page is an index of other pages
    #[serde(default = "default_catalog_keywords")]
    pub catalog_keywords: Vec<String>,

    /// Link targets must match one of these (if any are given)
    #[serde(default = "default_link_include_patterns")]
    pub link_include_patterns: Vec<String>,

    /// Link targets matching any of these are dropped
    #[serde(default = "default_link_exclude_patterns")]
    pub link_exclude_patterns: Vec<String>,

    #[serde(default)]
    pub thresholds: ClassifierThresholds,
}

/// CSS selectors used to pull signals out of a rendered page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSelectors {
    /// Element holding the document body
    pub content: String,
    /// Element holding the page title
    pub title: String,
    /// Presence marks the page as a catalog
    pub directory_marker: String,
    /// Presence marks the page as a document
    pub content_marker: String,
    /// Fallback element to wait for when the content element never shows up
    pub links: String,
    /// Where links are read from on pages without a content element
    #[serde(default = "default_links_scope")]
    pub links_scope: String,
}

/// Numeric cutoffs of the content heuristic, tuned for the default site
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierThresholds {
    pub rich_code_indicators: usize,
    pub rich_content_length: usize,
    pub tiny_content_length: usize,
    pub short_content_length: usize,
    pub short_min_links: usize,
    pub medium_content_length: usize,
    pub medium_min_links: usize,
    pub link_density: f64,
    pub min_catalog_links: usize,
    pub keyword_content_length: usize,
    pub min_list_items: usize,
    pub list_link_ratio: f64,
    pub link_text_ratio: f64,
    pub link_text_content_length: usize,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            rich_code_indicators: 5,
            rich_content_length: 2000,
            tiny_content_length: 100,
            short_content_length: 300,
            short_min_links: 2,
            medium_content_length: 800,
            medium_min_links: 5,
            link_density: 2.0,
            min_catalog_links: 3,
            keyword_content_length: 1000,
            min_list_items: 3,
            list_link_ratio: 0.7,
            link_text_ratio: 0.5,
            link_text_content_length: 800,
        }
    }
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            content: ".aliyun-docs-content".to_string(),
            title: "h1".to_string(),
            directory_marker: ".markdown-body .directory".to_string(),
            content_marker: ".markdown-body .icms-help-docs-content[lang=\"zh\"]".to_string(),
            links: "a[href*=\"document_detail\"]".to_string(),
            links_scope: default_links_scope(),
        }
    }
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            selectors: SiteSelectors::default(),
            navigation_patterns: default_navigation_patterns(),
            catalog_keywords: default_catalog_keywords(),
            link_include_patterns: default_link_include_patterns(),
            link_exclude_patterns: default_link_exclude_patterns(),
            thresholds: ClassifierThresholds::default(),
        }
    }
}

impl CrawlerConfig {
    /// Create a new configuration with default values
    pub fn new(start_url: &str) -> Self {
        Self {
            start_url: start_url.to_string(),
            output_dir: default_output_dir(),
            concurrency: default_concurrency(),
            max_depth: default_max_depth(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            checkpoint_interval: default_checkpoint_interval(),
            headless: default_headless(),
            webdriver_url: default_webdriver_url(),
            resume: false,
            site: SiteProfile::default(),
        }
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config)
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Limit the crawl to the start page and its direct children
    pub fn dry_run(self) -> Self {
        self.with_max_depth(1)
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn with_webdriver_url(mut self, url: impl Into<String>) -> Self {
        self.webdriver_url = url.into();
        self
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_concurrency() -> usize {
    8
}

fn default_max_depth() -> usize {
    999
}

fn default_max_retries() -> usize {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_fetch_timeout_secs() -> u64 {
    20
}

fn default_checkpoint_interval() -> usize {
    10
}

fn default_headless() -> bool {
    true
}

/// Default value for webdriver_url
fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_navigation_patterns() -> Vec<String> {
    [
        r"^上一篇[:|：]",
        r"^下一篇[:|：]",
        r"^相关文档",
        r"^参考文档",
        r"^更多信息",
        r"^详情请参见",
        r"具体操作请参见",
        r"具体内容参见",
        r"(?i)^previous article:",
        r"(?i)^next article:",
        r"(?i)^see also",
        r"(?i)^for more information,? see",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

fn default_catalog_keywords() -> Vec<String> {
    [
        "目录", "列表", "导航", "索引", "指南", "概述", "分类", "目录列表", "功能列表", "产品",
        "服务",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect()
}

fn default_link_include_patterns() -> Vec<String> {
    vec!["document_detail".to_string()]
}

fn default_links_scope() -> String {
    ".markdown-body".to_string()
}

fn default_link_exclude_patterns() -> Vec<String> {
    vec![r"\.(jpg|jpeg|png|gif|css|js|ico|svg|woff|woff2|ttf|eot|pdf)$".to_string()]
}

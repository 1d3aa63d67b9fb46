//! Mirror a hierarchical documentation site into a directory tree of Markdown files.
//!
//! Catalog pages become numbered directories, content pages become numbered `.md`
//! files, and crawl progress is checkpointed so an interrupted run can resume.

pub mod classifier;
pub mod config;
pub mod crawler;
pub mod error;
pub mod filter;
pub mod parsers;
pub mod paths;
pub mod render;
pub mod results;
pub mod scheduler;
pub mod state;

// Re-export commonly used types for convenience
pub use config::{CrawlerConfig, SiteProfile};
pub use crawler::{Crawler, ShutdownHandle};
pub use error::{CrawlError, RenderError};
pub use render::{RenderSession, RenderedPage, Renderer, WebDriverRenderer};
pub use results::{CrawlSummary, PageResult};

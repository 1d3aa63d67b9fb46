//! Rendering collaborator: loads a page in a real browser and reports what it found.

pub mod webdriver;

use crate::classifier::StructuralSignals;
use crate::error::RenderError;
use crate::filter::Link;
use async_trait::async_trait;
use url::Url;

pub use webdriver::WebDriverRenderer;

/// A page as the browser saw it
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    /// Final URL after redirects
    pub url: Url,
    pub title: String,
    pub signals: StructuralSignals,
    /// Raw markup of the content area; `None` when nothing was extracted
    pub raw_body: Option<String>,
    pub links: Vec<Link>,
}

/// Hands out isolated rendering sessions, one per worker
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn RenderSession>, RenderError>;
}

/// A browser context owned by exactly one worker
#[async_trait]
pub trait RenderSession: Send {
    /// Load and inspect one page. Timeouts and network failures are transient errors.
    async fn fetch(&mut self, url: &Url) -> Result<RenderedPage, RenderError>;

    /// Release the browser resources behind this session
    async fn close(&mut self);
}

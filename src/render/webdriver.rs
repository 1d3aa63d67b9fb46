use super::{RenderSession, RenderedPage, Renderer};
use crate::config::CrawlerConfig;
use crate::error::{CrawlError, RenderError};
use crate::parsers::{PageSelectors, extract_page};
use async_trait::async_trait;
use fantoccini::error::CmdError;
use fantoccini::wd::Capabilities;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use url::Url;

/// How long to wait for the content element after navigation
const CONTENT_WAIT: Duration = Duration::from_secs(3);
/// How long to wait for document links when the content element never appears
const LINKS_WAIT: Duration = Duration::from_secs(2);

/// Common WebDriver endpoints tried when the configured one is unreachable
const FALLBACK_URLS: [&str; 4] = [
    "http://localhost:9515", // ChromeDriver default
    "http://localhost:4444", // Selenium / geckodriver default
    "http://127.0.0.1:4444", // Try with IP instead of localhost
    "http://localhost:4723", // Appium default
];

/// Opens one browser session per worker through a WebDriver server
pub struct WebDriverRenderer {
    webdriver_url: String,
    headless: bool,
    fetch_timeout: Duration,
    content_selector: String,
    links_selector: String,
    selectors: Arc<PageSelectors>,
    sessions_opened: AtomicUsize,
}

impl WebDriverRenderer {
    pub fn new(config: &CrawlerConfig) -> Result<Self, CrawlError> {
        Ok(Self {
            webdriver_url: config.webdriver_url.clone(),
            headless: config.headless,
            fetch_timeout: config.fetch_timeout(),
            content_selector: config.site.selectors.content.clone(),
            links_selector: config.site.selectors.links.clone(),
            selectors: Arc::new(PageSelectors::new(&config.site.selectors)?),
            sessions_opened: AtomicUsize::new(0),
        })
    }

    /// Browser capabilities for Chrome and Firefox drivers
    pub fn capabilities(&self) -> Capabilities {
        let mut chrome_args = vec![
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--disable-gpu",
            "--blink-settings=imagesEnabled=false",
        ];
        let mut firefox_args = Vec::new();
        if self.headless {
            chrome_args.push("--headless=new");
            firefox_args.push("-headless");
        }

        let mut caps = Capabilities::new();
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": chrome_args }));
        caps.insert("moz:firefoxOptions".to_string(), json!({ "args": firefox_args }));
        caps
    }
}

#[async_trait]
impl Renderer for WebDriverRenderer {
    async fn open_session(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        let session_id = self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        let capabilities = self.capabilities();
        let (client, webdriver_url) =
            connect_to_webdriver(session_id, &self.webdriver_url, &capabilities).await?;

        Ok(Box::new(WebDriverSession {
            session_id,
            client,
            webdriver_url,
            capabilities,
            fetch_timeout: self.fetch_timeout,
            content_selector: self.content_selector.clone(),
            links_selector: self.links_selector.clone(),
            selectors: Arc::clone(&self.selectors),
        }))
    }
}

/// Connects to the WebDriver instance, trying common alternatives before giving up
async fn connect_to_webdriver(
    session_id: usize,
    webdriver_url: &str,
    capabilities: &Capabilities,
) -> Result<(Client, String), RenderError> {
    let first_error = match connect(webdriver_url, capabilities).await {
        Ok(client) => {
            ::log::debug!(
                "Session {} connected to WebDriver at {}",
                session_id,
                webdriver_url
            );
            return Ok((client, webdriver_url.to_string()));
        }
        Err(e) => {
            ::log::error!(
                "Session {} failed to connect to WebDriver at {}: {}",
                session_id,
                webdriver_url,
                e
            );
            e
        }
    };

    for url in FALLBACK_URLS.iter().filter(|url| **url != webdriver_url) {
        ::log::info!("Session {} trying fallback WebDriver URL: {}", session_id, url);
        // Don't log errors for fallbacks to avoid log spam
        if let Ok(client) = connect(url, capabilities).await {
            ::log::debug!(
                "Session {} connected to fallback WebDriver at {}",
                session_id,
                url
            );
            return Ok((client, url.to_string()));
        }
    }

    ::log::error!(
        "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
    );
    Err(RenderError::Connect(format!("{}: {}", webdriver_url, first_error)))
}

async fn connect(
    webdriver_url: &str,
    capabilities: &Capabilities,
) -> Result<Client, fantoccini::error::NewSessionError> {
    let mut builder = ClientBuilder::native();
    builder.capabilities(capabilities.clone());
    builder.connect(webdriver_url).await
}

struct WebDriverSession {
    session_id: usize,
    client: Client,
    webdriver_url: String,
    capabilities: Capabilities,
    fetch_timeout: Duration,
    content_selector: String,
    links_selector: String,
    selectors: Arc<PageSelectors>,
}

impl WebDriverSession {
    /// Navigate and return the final URL plus the rendered source
    async fn load(&self, url: &Url) -> Result<(Url, String), CmdError> {
        self.client.goto(url.as_str()).await?;

        let content = self
            .client
            .wait()
            .at_most(CONTENT_WAIT)
            .for_element(Locator::Css(&self.content_selector))
            .await;
        if content.is_err() {
            // Catalog pages may have no content area; settle for the links
            let _ = self
                .client
                .wait()
                .at_most(LINKS_WAIT)
                .for_element(Locator::Css(&self.links_selector))
                .await;
        }

        let final_url = self
            .client
            .current_url()
            .await
            .unwrap_or_else(|_| url.clone());
        let source = self.client.source().await?;
        Ok((final_url, source))
    }

    /// Replace a dead WebDriver session
    async fn attempt_reconnect(&mut self) -> bool {
        ::log::warn!(
            "Session {} attempting to reconnect WebDriver session",
            self.session_id
        );
        match connect(&self.webdriver_url, &self.capabilities).await {
            Ok(client) => {
                self.client = client;
                ::log::info!("Session {} successfully reconnected", self.session_id);
                true
            }
            Err(e) => {
                ::log::error!("Session {} failed to reconnect: {}", self.session_id, e);
                false
            }
        }
    }
}

#[async_trait]
impl RenderSession for WebDriverSession {
    async fn fetch(&mut self, url: &Url) -> Result<RenderedPage, RenderError> {
        let started = Instant::now();
        ::log::debug!("Session {} rendering {}", self.session_id, url);

        let loaded = match timeout(self.fetch_timeout, self.load(url)).await {
            Ok(loaded) => loaded,
            Err(_) => {
                ::log::error!("Timeout rendering: {}", url);
                return Err(RenderError::Timeout(url.to_string()));
            }
        };

        let (final_url, source) = match loaded {
            Ok(loaded) => loaded,
            Err(e) if is_session_error(&e) => {
                ::log::warn!("Session {} lost while loading {}", self.session_id, url);
                self.attempt_reconnect().await;
                return Err(RenderError::Session(url.to_string()));
            }
            Err(e) => {
                return Err(RenderError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                });
            }
        };

        let extracted = extract_page(&source, &self.selectors);
        ::log::debug!(
            "Session {} rendered {} in {:.2} seconds",
            self.session_id,
            url,
            started.elapsed().as_secs_f64()
        );

        Ok(RenderedPage {
            url: final_url,
            title: extracted.title,
            signals: extracted.signals,
            raw_body: extracted.body,
            links: extracted.links,
        })
    }

    async fn close(&mut self) {
        if let Err(e) = self.client.clone().close().await {
            ::log::warn!("Session {} failed to close client: {}", self.session_id, e);
        }
    }
}

fn is_session_error(error: &CmdError) -> bool {
    let message = error.to_string();
    message.contains("Unable to find session") || message.contains("invalid session id")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_capabilities() {
        let config = CrawlerConfig::new("https://example.com").with_headless(true);
        let renderer = WebDriverRenderer::new(&config).unwrap();
        let caps = renderer.capabilities();

        let chrome_args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(chrome_args.iter().any(|a| a == "--headless=new"));
        let firefox_args = caps["moz:firefoxOptions"]["args"].as_array().unwrap();
        assert_eq!(firefox_args.len(), 1);
    }

    #[test]
    fn test_headed_capabilities() {
        let config = CrawlerConfig::new("https://example.com").with_headless(false);
        let caps = WebDriverRenderer::new(&config).unwrap().capabilities();

        let chrome_args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(!chrome_args.iter().any(|a| a == "--headless=new"));
    }

    #[test]
    fn test_invalid_selectors_fail_construction() {
        let mut config = CrawlerConfig::new("https://example.com");
        config.site.selectors.title = ":::".to_string();
        assert!(WebDriverRenderer::new(&config).is_err());
    }
}

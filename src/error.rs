use thiserror::Error;

/// Failures reported by a rendering session
#[derive(Debug, Error)]
pub enum RenderError {
    /// The WebDriver server could not be reached or refused a new session
    #[error("failed to open a rendering session: {0}")]
    Connect(String),

    /// The page did not finish loading in time
    #[error("timed out rendering {0}")]
    Timeout(String),

    /// Navigation or page-source retrieval failed
    #[error("failed to load {url}: {message}")]
    Navigation { url: String, message: String },

    /// The session died underneath us and could not be re-established
    #[error("rendering session lost while loading {0}")]
    Session(String),
}

impl RenderError {
    /// Whether retrying the same fetch may succeed
    pub fn is_transient(&self) -> bool {
        !matches!(self, RenderError::Connect(_))
    }
}

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("could not classify page {url}")]
    Unclassified { url: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid CSS selector {selector:?}: {message}")]
    Selector { selector: String, message: String },

    #[error("startup failed: {0}")]
    Startup(String),
}

impl CrawlError {
    /// Only rendering failures other than a refused connection are retried
    pub fn is_transient(&self) -> bool {
        match self {
            CrawlError::Render(err) => err.is_transient(),
            _ => false,
        }
    }
}

pub type Result<T, E = CrawlError> = std::result::Result<T, E>;

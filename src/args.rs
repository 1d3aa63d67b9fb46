use clap::Parser;
use doc_mirror::config::CrawlerConfig;
use doc_mirror::error::{CrawlError, Result};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "doc-mirror")]
#[command(about = "Mirror a documentation site into a directory tree of Markdown files")]
#[command(version)]
pub struct Args {
    /// Start URL of the documentation tree
    #[arg(short, long, required_unless_present = "config")]
    pub url: Option<String>,

    /// Root directory of the mirrored tree
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// Number of concurrent workers (one browser session each)
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Deepest catalog hop still followed
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Only crawl the start page and its direct children
    #[arg(long)]
    pub dry_run: bool,

    /// Run the browser without a window (true/false)
    #[arg(long)]
    pub headless: Option<bool>,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,

    /// Continue from the checkpoint in the output directory
    #[arg(long)]
    pub resume: bool,

    /// JSON configuration file; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// URL of the WebDriver server
    #[arg(long)]
    pub webdriver_url: Option<String>,
}

impl Args {
    /// Build the crawl configuration: file values, then `WEBDRIVER_URL`, then flags
    pub fn to_config(&self) -> Result<CrawlerConfig> {
        let mut config = match &self.config {
            Some(path) => CrawlerConfig::from_file(path)?,
            None => CrawlerConfig::new(""),
        };

        if let Some(url) = &self.url {
            config.start_url = url.clone();
        }
        if config.start_url.trim().is_empty() {
            return Err(CrawlError::Startup("no start URL given".to_string()));
        }

        // Override the WebDriver URL with an environment variable if provided
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                config.webdriver_url = webdriver_url;
            }
        }
        if let Some(webdriver_url) = &self.webdriver_url {
            config.webdriver_url = webdriver_url.clone();
        }

        if let Some(dir) = &self.out_dir {
            config = config.with_output_dir(dir);
        }
        if let Some(concurrency) = self.concurrency {
            config = config.with_concurrency(concurrency);
        }
        if let Some(max_depth) = self.max_depth {
            config = config.with_max_depth(max_depth);
        }
        if let Some(headless) = self.headless {
            config = config.with_headless(headless);
        }
        if self.resume {
            config = config.with_resume(true);
        }
        if self.dry_run {
            config = config.dry_run();
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("doc-mirror").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = parse(&[
            "--url",
            "https://help.example.com/document_detail/1.html",
            "--out-dir",
            "mirror",
            "--concurrency",
            "2",
            "--headless",
            "false",
            "--resume",
        ]);
        let config = args.to_config().unwrap();

        assert_eq!(config.start_url, "https://help.example.com/document_detail/1.html");
        assert_eq!(config.output_dir, PathBuf::from("mirror"));
        assert_eq!(config.concurrency, 2);
        assert!(!config.headless);
        assert!(config.resume);
        assert_eq!(config.max_depth, 999);
    }

    #[test]
    fn test_dry_run_wins_over_max_depth() {
        let args = parse(&["--url", "https://a.example", "--max-depth", "5", "--dry-run"]);
        assert_eq!(args.to_config().unwrap().max_depth, 1);
    }

    #[test]
    fn test_url_required_without_config() {
        assert!(Args::try_parse_from(["doc-mirror"]).is_err());
    }

    #[test]
    fn test_config_file_supplies_start_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.json");
        std::fs::write(
            &path,
            r#"{"start_url": "https://help.example.com/", "concurrency": 3}"#,
        )
        .unwrap();

        let args = parse(&["--config", path.to_str().unwrap(), "--concurrency", "5"]);
        let config = args.to_config().unwrap();

        assert_eq!(config.start_url, "https://help.example.com/");
        assert_eq!(config.concurrency, 5);
    }
}

pub mod error_log;
pub mod processor;


pub use error_log::{ERROR_LOG_FILE, ErrorLog};
pub use processor::{PageProcessor, TaskStage};

use crate::classifier::Classifier;
use crate::config::CrawlerConfig;
use crate::error::CrawlError;
use crate::parsers::{Converter, MarkdownConverter};
use crate::paths::PathAllocator;
use crate::render::{RenderSession, Renderer};
use crate::results::CrawlSummary;
use crate::scheduler::{CrawlTask, SchedulerConfig, TaskScheduler};
use crate::state::{CheckpointStore, ResumePolicy};
use std::sync::Arc;
use std::time::Instant;
use url::Url;

/// Mirrors a documentation site into a directory of Markdown files
pub struct Crawler {
    config: CrawlerConfig,
    renderer: Arc<dyn Renderer>,
    converter: Arc<dyn Converter>,
    scheduler: Arc<TaskScheduler>,
}

/// Asks a running crawl to stop taking new tasks
#[derive(Clone)]
pub struct ShutdownHandle {
    scheduler: Arc<TaskScheduler>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.scheduler.shutdown();
    }
}

impl Crawler {
    pub fn new(config: CrawlerConfig, renderer: Arc<dyn Renderer>) -> Self {
        let scheduler = Arc::new(TaskScheduler::new(SchedulerConfig::from(&config)));
        Self {
            config,
            renderer,
            converter: Arc::new(MarkdownConverter),
            scheduler,
        }
    }

    /// Swap the HTML to Markdown converter
    pub fn with_converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            scheduler: Arc::clone(&self.scheduler),
        }
    }

    /// Run the crawl to completion or shutdown.
    ///
    /// Errors are returned only for problems that stop the crawl before it starts:
    /// an unusable start URL or site profile, an output root that cannot be created,
    /// or a rendering session that cannot be opened. Per-page failures end up in the summary.
    pub async fn run(self) -> Result<CrawlSummary, CrawlError> {
        let started = Instant::now();
        let start_url = Url::parse(&self.config.start_url)?;
        let classifier = Classifier::new(&self.config.site)?;
        let start_url = classifier.filter().normalize(&start_url);

        let paths = PathAllocator::new(&self.config.output_dir);
        paths.ensure_dir(&[]).await.map_err(|e| {
            CrawlError::Startup(format!(
                "cannot create output directory {}: {}",
                self.config.output_dir.display(),
                e
            ))
        })?;

        let store = Arc::new(CheckpointStore::new(&self.config.output_dir));
        let error_log = Arc::new(ErrorLog::new(&self.config.output_dir));

        self.prepare_frontier(&store, &start_url).await;

        let sessions = self.open_sessions().await?;

        ::log::info!(
            "Starting crawl of {} with {} workers into {}",
            start_url,
            self.scheduler.config().concurrency,
            self.config.output_dir.display()
        );

        let processor = Arc::new(PageProcessor::new(
            Arc::clone(&self.scheduler),
            classifier,
            Arc::clone(&self.converter),
            paths,
            Arc::clone(&store),
            Arc::clone(&error_log),
            sessions,
        ));
        let stats = self.scheduler.run(Arc::clone(&processor)).await;
        processor.close_idle_sessions().await;

        if let Err(e) = store.save(&self.scheduler.snapshot().await).await {
            ::log::error!("Failed to save final checkpoint: {}", e);
        }

        let summary = CrawlSummary {
            processed: stats.processed,
            errors: stats.errors,
            retries: stats.retries,
            visited: stats.visited,
            pending: stats.pending,
            failures: error_log.records().await,
            elapsed: started.elapsed(),
        };

        ::log::info!(
            "Crawl finished in {:.2} seconds: {} processed, {} errors, {} pending",
            summary.elapsed.as_secs_f64(),
            summary.processed,
            summary.errors,
            summary.pending
        );
        Ok(summary)
    }

    /// Restore the checkpoint when resuming, then seed the start URL if it was never visited
    async fn prepare_frontier(&self, store: &CheckpointStore, start_url: &Url) {
        match ResumePolicy::from(self.config.resume) {
            ResumePolicy::Resume => match store.load().await {
                Some(state) => self.scheduler.restore(state).await,
                None => ::log::info!("No checkpoint found at {}, starting fresh", store.path().display()),
            },
            ResumePolicy::Fresh => {
                if store.path().exists() {
                    ::log::info!(
                        "Ignoring existing checkpoint {} (resume not requested)",
                        store.path().display()
                    );
                }
            }
        }

        if !self
            .scheduler
            .enqueue(CrawlTask::root(start_url.as_str()))
            .await
            && self.scheduler.queued().await == 0
        {
            ::log::info!("Checkpoint has no pending tasks, nothing left to crawl");
        }
    }

    /// One session per worker, all opened before any task runs
    async fn open_sessions(&self) -> Result<Vec<Box<dyn RenderSession>>, CrawlError> {
        let count = self.scheduler.config().concurrency;
        let mut sessions: Vec<Box<dyn RenderSession>> = Vec::with_capacity(count);

        for _ in 0..count {
            match self.renderer.open_session().await {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    for session in sessions.iter_mut() {
                        session.close().await;
                    }
                    return Err(CrawlError::Startup(format!(
                        "failed to open rendering session: {}",
                        e
                    )));
                }
            }
        }

        ::log::debug!("Opened {} rendering sessions", sessions.len());
        Ok(sessions)
    }
}

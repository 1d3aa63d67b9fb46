use super::error_log::ErrorLog;
use crate::classifier::Classifier;
use crate::error::CrawlError;
use crate::filter::Link;
use crate::parsers::{Converter, build_document};
use crate::paths::PathAllocator;
use crate::render::RenderSession;
use crate::results::PageResult;
use crate::scheduler::{CrawlTask, TaskHandler, TaskScheduler};
use crate::state::{CheckpointStore, CrawlState};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;

/// Where a task is in its life. Tasks only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStage {
    Queued,
    Fetching,
    Classifying,
    Recursing,
    Persisting,
    Failed,
    Done,
}

/// Runs the fetch → classify → recurse/persist protocol for one task at a time per worker
pub struct PageProcessor {
    scheduler: Arc<TaskScheduler>,
    classifier: Classifier,
    converter: Arc<dyn Converter>,
    paths: PathAllocator,
    store: Arc<CheckpointStore>,
    error_log: Arc<ErrorLog>,
    /// Sessions opened at startup, handed out one per worker
    sessions: Mutex<Vec<Box<dyn RenderSession>>>,
}

impl PageProcessor {
    pub fn new(
        scheduler: Arc<TaskScheduler>,
        classifier: Classifier,
        converter: Arc<dyn Converter>,
        paths: PathAllocator,
        store: Arc<CheckpointStore>,
        error_log: Arc<ErrorLog>,
        sessions: Vec<Box<dyn RenderSession>>,
    ) -> Self {
        Self {
            scheduler,
            classifier,
            converter,
            paths,
            store,
            error_log,
            sessions: Mutex::new(sessions),
        }
    }

    /// Process one task with the given session, returning the stage it ended in
    pub async fn process(
        &self,
        session: &mut dyn RenderSession,
        task: &CrawlTask,
    ) -> Result<TaskStage, CrawlError> {
        ::log::info!(
            "Processing {} (depth {}, order {})",
            task.url,
            task.depth,
            task.order
        );
        let url = Url::parse(&task.url)?;

        trace_stage(&task.url, TaskStage::Fetching);
        let page = session.fetch(&url).await?;

        trace_stage(&task.url, TaskStage::Classifying);
        let markdown = page
            .raw_body
            .as_deref()
            .map(|raw| self.converter.to_markdown(raw, &page.url));

        let stage = match self.classifier.analyze(&page, markdown) {
            PageResult::Catalog { url, title, links } => {
                trace_stage(&task.url, TaskStage::Recursing);
                self.recurse(task, &url, &title, &links).await;
                TaskStage::Done
            }
            PageResult::Content {
                url,
                title,
                markdown,
            } => {
                trace_stage(&task.url, TaskStage::Persisting);
                self.persist(task, &url, &title, &markdown).await;
                TaskStage::Done
            }
            PageResult::Unknown { url, .. } => {
                trace_stage(&task.url, TaskStage::Failed);
                return Err(CrawlError::Unclassified {
                    url: url.to_string(),
                });
            }
        };

        trace_stage(&task.url, stage);
        Ok(stage)
    }

    /// Catalog branch: maybe open a directory, then queue every valid link in page order
    async fn recurse(&self, task: &CrawlTask, page_url: &Url, title: &str, links: &[Link]) {
        let mut path_stack = task.path_stack.clone();

        if !title.trim().is_empty() && task.depth > 0 {
            path_stack.push(self.paths.dir_name(task.order, title));
            match self.paths.ensure_dir(&path_stack).await {
                Ok(dir) => ::log::info!("Created directory: {}", dir.display()),
                Err(e) => {
                    self.error_log
                        .record(
                            page_url.as_str(),
                            &format!("failed to create directory {}: {}", path_stack.join("/"), e),
                        )
                        .await
                }
            }
        }

        let mut queued = 0;
        for (i, link) in links.iter().enumerate() {
            let Some(target) = self.classifier.filter().normalize_url(&link.href, page_url) else {
                continue;
            };
            if self
                .scheduler
                .enqueue(task.child(target.as_str(), path_stack.clone(), i + 1))
                .await
            {
                trace_stage(target.as_str(), TaskStage::Queued);
                queued += 1;
            }
        }

        ::log::info!(
            "Catalog page \"{}\": {} links, {} new tasks",
            title,
            links.len(),
            queued
        );
    }

    /// Content branch: write the artifact. Write failures are logged, not retried.
    async fn persist(&self, task: &CrawlTask, page_url: &Url, title: &str, markdown: &str) {
        let name = self.paths.file_name(task.order, title);
        let document = build_document(title, page_url, markdown, Utc::now());

        match self
            .paths
            .write_artifact(&task.path_stack, &name, &document)
            .await
        {
            Ok(path) => ::log::info!("Saved: {}", path.display()),
            Err(e) => {
                self.error_log
                    .record(
                        page_url.as_str(),
                        &format!("failed to write {}: {}", name, e),
                    )
                    .await
            }
        }
    }

    /// Close any session no worker claimed
    pub async fn close_idle_sessions(&self) {
        let mut sessions = self.sessions.lock().await;
        for session in sessions.iter_mut() {
            session.close().await;
        }
        sessions.clear();
    }
}

fn trace_stage(url: &str, stage: TaskStage) {
    ::log::trace!("{} -> {:?}", url, stage);
}

#[async_trait]
impl TaskHandler for PageProcessor {
    type Worker = Box<dyn RenderSession>;

    async fn start_worker(&self, worker_id: usize) -> Result<Self::Worker, CrawlError> {
        self.sessions.lock().await.pop().ok_or_else(|| {
            CrawlError::Startup(format!("no rendering session left for worker {}", worker_id))
        })
    }

    async fn execute(
        &self,
        session: &mut Self::Worker,
        task: &CrawlTask,
    ) -> Result<(), CrawlError> {
        self.process(session.as_mut(), task).await.map(|_| ())
    }

    async fn task_failed(&self, task: &CrawlTask, error: &CrawlError) {
        self.error_log.record(&task.url, &error.to_string()).await;
    }

    async fn checkpoint(&self, state: CrawlState) {
        if let Err(e) = self.store.save(&state).await {
            ::log::error!("Failed to save checkpoint: {}", e);
        }
    }

    async fn stop_worker(&self, mut session: Self::Worker) {
        session.close().await;
    }
}

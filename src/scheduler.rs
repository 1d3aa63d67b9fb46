//! Bounded-concurrency task queue with deduplication, retry and quiescence detection.
//!
//! The visited set, the queue and the in-flight bookkeeping share one lock, so the
//! check-and-insert done by [`TaskScheduler::enqueue`] is atomic with respect to every
//! worker. Workers exit once the queue is empty and no other worker is mid-task.

use crate::config::CrawlerConfig;
use crate::error::CrawlError;
use crate::state::CrawlState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

/// One page to visit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlTask {
    pub url: String,
    /// Directory names from the output root down to this page's parent
    pub path_stack: Vec<String>,
    /// Catalog hops from the start page
    pub depth: usize,
    /// 1-based position among the siblings found on the parent page
    pub order: usize,
}

impl CrawlTask {
    pub fn new(url: impl Into<String>, path_stack: Vec<String>, depth: usize, order: usize) -> Self {
        Self {
            url: url.into(),
            path_stack,
            depth,
            order,
        }
    }

    /// The start page
    pub fn root(url: impl Into<String>) -> Self {
        Self::new(url, Vec::new(), 0, 1)
    }

    /// A page linked from this one
    pub fn child(&self, url: impl Into<String>, path_stack: Vec<String>, order: usize) -> Self {
        Self::new(url, path_stack, self.depth + 1, order)
    }
}

/// Limits and timings of the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub concurrency: usize,
    pub max_depth: usize,
    pub max_retries: usize,
    pub retry_delay: Duration,
    /// Checkpoint every this many completed tasks (0 disables periodic checkpoints)
    pub checkpoint_interval: usize,
}

impl SchedulerConfig {
    /// Delay before retry number `attempt` (1-based): linear in the attempt
    pub fn backoff(&self, attempt: usize) -> Duration {
        self.retry_delay.saturating_mul(attempt as u32)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_depth: usize::MAX,
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
            checkpoint_interval: 10,
        }
    }
}

impl From<&CrawlerConfig> for SchedulerConfig {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            max_depth: config.max_depth,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
            checkpoint_interval: config.checkpoint_interval,
        }
    }
}

/// The work a scheduler drives.
///
/// Each worker gets its own `Worker` context from [`TaskHandler::start_worker`] and keeps
/// it for its whole lifetime; contexts are never shared between workers.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    type Worker: Send + 'static;

    async fn start_worker(&self, worker_id: usize) -> Result<Self::Worker, CrawlError>;

    /// One attempt at a task. Transient errors are retried by the scheduler.
    async fn execute(&self, worker: &mut Self::Worker, task: &CrawlTask) -> Result<(), CrawlError>;

    /// Called once for every task that ends Failed
    async fn task_failed(&self, task: &CrawlTask, error: &CrawlError) {
        ::log::error!("Task failed for {}: {}", task.url, error);
    }

    /// Called every `checkpoint_interval` completed tasks
    async fn checkpoint(&self, _state: CrawlState) {}

    async fn stop_worker(&self, _worker: Self::Worker) {}
}

#[derive(Debug, Default)]
struct Frontier {
    visited: HashSet<String>,
    queue: VecDeque<CrawlTask>,
    in_flight: HashMap<String, CrawlTask>,
    active: usize,
}

/// Counter values at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub processed: usize,
    pub errors: usize,
    pub retries: usize,
    pub visited: usize,
    pub pending: usize,
}

#[derive(Debug)]
pub struct TaskScheduler {
    config: SchedulerConfig,
    frontier: Mutex<Frontier>,
    wakeup: Notify,
    processed: AtomicUsize,
    errors: AtomicUsize,
    retries: AtomicUsize,
    completed: AtomicUsize,
    shutting_down: AtomicBool,
}

impl TaskScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            frontier: Mutex::new(Frontier::default()),
            wakeup: Notify::new(),
            processed: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            retries: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Queue a task unless its URL was seen before or it is too deep.
    ///
    /// Returns whether a task was created. After shutdown new tasks are still recorded
    /// so the final checkpoint can hand them to a resumed run, but no worker picks them up.
    pub async fn enqueue(&self, task: CrawlTask) -> bool {
        if task.depth > self.config.max_depth {
            ::log::trace!("Skipping {} beyond max depth {}", task.url, self.config.max_depth);
            return false;
        }

        {
            let mut frontier = self.frontier.lock().await;
            if !frontier.visited.insert(task.url.clone()) {
                ::log::trace!("Skipping already visited: {}", task.url);
                return false;
            }
            ::log::debug!(
                "Queued {} (depth {}, order {})",
                task.url,
                task.depth,
                task.order
            );
            frontier.queue.push_back(task);
        }

        self.wakeup.notify_waiters();
        true
    }

    /// Apply a loaded checkpoint: visited URLs, counters and pending tasks
    pub async fn restore(&self, state: CrawlState) {
        let pending = state.pending_tasks.len();
        {
            let mut frontier = self.frontier.lock().await;
            frontier.visited.extend(state.visited_urls);
            for task in state.pending_tasks {
                frontier.visited.insert(task.url.clone());
                frontier.queue.push_back(task);
            }
            self.processed.store(state.processed_count, Ordering::SeqCst);
            self.errors.store(state.error_count, Ordering::SeqCst);
        }
        ::log::info!(
            "Restored checkpoint: {} processed, {} errors, {} pending",
            state.processed_count,
            state.error_count,
            pending
        );
        self.wakeup.notify_waiters();
    }

    /// Stop handing out tasks; running tasks finish normally
    pub fn shutdown(&self) {
        if !self.shutting_down.swap(true, Ordering::SeqCst) {
            ::log::info!("Scheduler shutting down, waiting for in-flight tasks");
        }
        self.wakeup.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Drain the queue with `concurrency` workers and return once the crawl is quiet
    pub async fn run<H: TaskHandler>(self: &Arc<Self>, handler: Arc<H>) -> SchedulerStats {
        let mut workers = Vec::with_capacity(self.config.concurrency);
        for worker_id in 0..self.config.concurrency {
            let scheduler = Arc::clone(self);
            let handler = Arc::clone(&handler);
            workers.push(tokio::spawn(async move {
                scheduler.worker_loop(worker_id, handler).await
            }));
        }

        for (worker_id, worker) in workers.into_iter().enumerate() {
            if let Err(e) = worker.await {
                ::log::error!("Worker {} terminated abnormally: {}", worker_id, e);
            }
        }

        let stats = self.stats().await;
        ::log::info!(
            "All {} workers have completed: {} processed, {} errors, {} pending",
            self.config.concurrency,
            stats.processed,
            stats.errors,
            stats.pending
        );
        stats
    }

    async fn worker_loop<H: TaskHandler>(&self, worker_id: usize, handler: Arc<H>) {
        let mut worker = match handler.start_worker(worker_id).await {
            Ok(worker) => worker,
            Err(e) => {
                ::log::error!("Worker {} failed to start: {}", worker_id, e);
                return;
            }
        };
        ::log::debug!("Worker {} started", worker_id);

        while let Some(task) = self.next_task(worker_id).await {
            let result = self
                .execute_with_retry(handler.as_ref(), &mut worker, worker_id, &task)
                .await;
            self.finish(handler.as_ref(), &task, result).await;
        }

        handler.stop_worker(worker).await;
        ::log::debug!("Worker {} completed processing loop", worker_id);
    }

    /// Next task for a worker, or `None` once the crawl is quiet or shutting down
    async fn next_task(&self, worker_id: usize) -> Option<CrawlTask> {
        loop {
            let notified = {
                let mut frontier = self.frontier.lock().await;
                if self.is_shutting_down() {
                    return None;
                }
                if let Some(task) = frontier.queue.pop_front() {
                    frontier.active += 1;
                    frontier.in_flight.insert(task.url.clone(), task.clone());
                    ::log::trace!("Worker {} took {}", worker_id, task.url);
                    return Some(task);
                }
                if frontier.active == 0 {
                    drop(frontier);
                    // Wake the other idle workers so they observe quiescence too
                    self.wakeup.notify_waiters();
                    return None;
                }
                // Registered before the lock is released, so no wakeup is lost
                self.wakeup.notified()
            };
            notified.await;
        }
    }

    async fn execute_with_retry<H: TaskHandler>(
        &self,
        handler: &H,
        worker: &mut H::Worker,
        worker_id: usize,
        task: &CrawlTask,
    ) -> Result<(), CrawlError> {
        let mut attempt = 0;
        loop {
            match handler.execute(worker, task).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.config.backoff(attempt);
                    ::log::warn!(
                        "Worker {} retrying {} ({}/{}) in {:?}: {}",
                        worker_id,
                        task.url,
                        attempt,
                        self.config.max_retries,
                        delay,
                        err
                    );
                    self.retries.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn finish<H: TaskHandler>(
        &self,
        handler: &H,
        task: &CrawlTask,
        result: Result<(), CrawlError>,
    ) {
        if let Err(err) = &result {
            handler.task_failed(task, err).await;
        }

        {
            let mut frontier = self.frontier.lock().await;
            match result {
                Ok(()) => self.processed.fetch_add(1, Ordering::SeqCst),
                Err(_) => self.errors.fetch_add(1, Ordering::SeqCst),
            };
            frontier.active -= 1;
            frontier.in_flight.remove(&task.url);
        }
        self.wakeup.notify_waiters();

        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        let interval = self.config.checkpoint_interval;
        if interval > 0 && completed % interval == 0 {
            handler.checkpoint(self.snapshot().await).await;
        }
    }

    /// Current state for the checkpoint file; visited URLs are sorted for stable output
    pub async fn snapshot(&self) -> CrawlState {
        let frontier = self.frontier.lock().await;
        let mut visited: Vec<String> = frontier.visited.iter().cloned().collect();
        visited.sort();

        let mut state = CrawlState::new(
            visited,
            self.processed.load(Ordering::SeqCst),
            self.errors.load(Ordering::SeqCst),
        );
        state.pending_tasks = frontier
            .in_flight
            .values()
            .chain(frontier.queue.iter())
            .cloned()
            .collect();
        state
    }

    pub async fn stats(&self) -> SchedulerStats {
        let frontier = self.frontier.lock().await;
        SchedulerStats {
            processed: self.processed.load(Ordering::SeqCst),
            errors: self.errors.load(Ordering::SeqCst),
            retries: self.retries.load(Ordering::SeqCst),
            visited: frontier.visited.len(),
            pending: frontier.queue.len() + frontier.in_flight.len(),
        }
    }

    pub async fn queued(&self) -> usize {
        self.frontier.lock().await.queue.len()
    }
}

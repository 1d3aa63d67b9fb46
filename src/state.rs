use crate::error::Result;
use crate::scheduler::CrawlTask;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// File name of the checkpoint inside the output root
pub const STATE_FILE: &str = "crawler_state.json";

/// Durable snapshot of a crawl
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlState {
    pub visited_urls: Vec<String>,
    pub processed_count: usize,
    pub error_count: usize,
    pub timestamp: DateTime<Utc>,
    /// Tasks that were queued or running when the snapshot was taken
    #[serde(default)]
    pub pending_tasks: Vec<CrawlTask>,
}

impl CrawlState {
    pub fn new(visited_urls: Vec<String>, processed_count: usize, error_count: usize) -> Self {
        Self {
            visited_urls,
            processed_count,
            error_count,
            timestamp: Utc::now(),
            pending_tasks: Vec::new(),
        }
    }
}

/// Whether a run picks up an earlier checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePolicy {
    Fresh,
    Resume,
}

impl From<bool> for ResumePolicy {
    fn from(resume: bool) -> Self {
        if resume {
            ResumePolicy::Resume
        } else {
            ResumePolicy::Fresh
        }
    }
}

/// Reads and writes the JSON checkpoint; the last save wins
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CheckpointStore {
    /// Store keeping its checkpoint at `<output_dir>/crawler_state.json`
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self::at(output_dir.as_ref().join(STATE_FILE))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the checkpoint; the file is replaced by rename so readers never see half a write
    pub async fn save(&self, state: &CrawlState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        ::log::debug!(
            "Saved checkpoint to {}: {} visited, {} processed, {} errors",
            self.path.display(),
            state.visited_urls.len(),
            state.processed_count,
            state.error_count
        );
        Ok(())
    }

    /// Read the previous checkpoint. Missing or unreadable checkpoints are treated as absent.
    pub async fn load(&self) -> Option<CrawlState> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                ::log::warn!("Failed to read checkpoint {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(state) => Some(state),
            Err(e) => {
                ::log::warn!(
                    "Ignoring corrupt checkpoint {}: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> CrawlState {
        let mut state = CrawlState::new(
            vec![
                "https://example.com/a".to_string(),
                "https://example.com/b".to_string(),
            ],
            7,
            2,
        );
        state.pending_tasks.push(CrawlTask::new(
            "https://example.com/c",
            vec!["01-Guide".to_string()],
            2,
            4,
        ));
        state
    }

    #[tokio::test]
    async fn test_load_returns_what_was_saved() {
        let tmp = TempDir::new().unwrap();
        let store = CheckpointStore::new(tmp.path());
        let state = sample();

        store.save(&state).await.unwrap();
        let loaded = store.load().await.expect("checkpoint present");

        assert_eq!(loaded.visited_urls, state.visited_urls);
        assert_eq!(loaded.processed_count, 7);
        assert_eq!(loaded.error_count, 2);
        assert_eq!(loaded.pending_tasks, state.pending_tasks);
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let tmp = TempDir::new().unwrap();
        let store = CheckpointStore::new(tmp.path());

        store.save(&sample()).await.unwrap();
        store.save(&CrawlState::new(vec![], 0, 0)).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert!(loaded.visited_urls.is_empty());
        assert_eq!(loaded.processed_count, 0);
        assert!(!tmp.path().join("crawler_state.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_checkpoint_is_absent() {
        let tmp = TempDir::new().unwrap();
        assert!(CheckpointStore::new(tmp.path()).load().await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_is_absent() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(STATE_FILE), "{ not json").unwrap();
        assert!(CheckpointStore::new(tmp.path()).load().await.is_none());
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{
            "visitedUrls": ["https://example.com/x"],
            "processedCount": 3,
            "errorCount": 1,
            "timestamp": "2024-05-01T08:30:00.000Z"
        }"#;
        let state: CrawlState = serde_json::from_str(json).unwrap();

        assert_eq!(state.visited_urls, vec!["https://example.com/x"]);
        assert_eq!(state.processed_count, 3);
        assert!(state.pending_tasks.is_empty());

        let value = serde_json::to_value(&state).unwrap();
        assert!(value.get("visitedUrls").is_some());
        assert!(value.get("errorCount").is_some());
    }
}

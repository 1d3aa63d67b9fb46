use crate::results::FailureRecord;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// File name of the error log inside the output root
pub const ERROR_LOG_FILE: &str = "errors.log";

/// Collects per-page failures in memory and appends them to `errors.log`
#[derive(Debug)]
pub struct ErrorLog {
    path: PathBuf,
    records: Mutex<Vec<FailureRecord>>,
}

impl ErrorLog {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            path: output_dir.as_ref().join(ERROR_LOG_FILE),
            records: Mutex::new(Vec::new()),
        }
    }

    pub async fn record(&self, url: &str, message: &str) {
        ::log::error!("{}: {}", url, message);

        let line = format!(
            "[{}] ERROR: {}: {}\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            url,
            message
        );

        let mut records = self.records.lock().await;
        records.push(FailureRecord {
            url: url.to_string(),
            message: message.to_string(),
        });

        // Appending under the lock keeps lines from interleaving
        if let Err(e) = self.append(&line).await {
            ::log::warn!("Failed to append to {}: {}", self.path.display(), e);
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }

    pub async fn records(&self) -> Vec<FailureRecord> {
        self.records.lock().await.clone()
    }
}

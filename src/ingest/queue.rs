//! JSONL-based pending-import queue.
//!
//! Follows the catalog's event pattern: an append-only JSONL log with state
//! derived from replay. Each hand-off is an `enqueued` line carrying the
//! record; a later `cleared` line retires it. Queued files are copied into
//! an inbox directory under their content hash, so the original can go away
//! before the host app flushes the queue.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::adapters::extension_of;

/// Queue log file name inside the pending directory
pub const QUEUE_FILE: &str = "pending.jsonl";

/// Inbox directory name inside the pending directory
pub const INBOX_DIR: &str = "inbox";

/// Errors that can occur with the pending queue
#[derive(Debug, Error)]
pub enum PendingQueueError {
    #[error("Pending record not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// An event in the queue log (append-only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingEvent {
    pub timestamp: DateTime<Utc>,

    /// Content hash of the queued file
    pub item_id: String,

    pub event_type: PendingEventType,

    /// The record, on `enqueued` events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<PendingRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingEventType {
    Enqueued,
    Cleared,
}

/// A file waiting to be imported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRecord {
    /// SHA-256 of the file content (first 12 hex chars)
    pub id: String,

    /// Inbox copy of the file
    pub path: PathBuf,

    /// Original file name
    pub file_name: String,

    /// Caller-supplied label, used as the track title
    #[serde(default)]
    pub label: String,

    pub enqueued_at: DateTime<Utc>,
}

/// Result of enqueueing a file
#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueResult {
    Queued(String),

    /// Same content is already waiting
    AlreadyQueued(String),
}

impl EnqueueResult {
    pub fn id(&self) -> &str {
        match self {
            Self::Queued(id) | Self::AlreadyQueued(id) => id,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::Queued(_))
    }
}

/// Append-only pending-import queue
pub struct PendingQueue {
    log_path: PathBuf,
    inbox: PathBuf,
}

impl PendingQueue {
    /// Queue rooted at `dir` (`<dir>/pending.jsonl` plus `<dir>/inbox/`)
    pub fn open(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            log_path: dir.join(QUEUE_FILE),
            inbox: dir.join(INBOX_DIR),
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn inbox(&self) -> &Path {
        &self.inbox
    }

    /// Copy `source` into the inbox and record it.
    ///
    /// Idempotent on content: enqueueing bytes that are already waiting
    /// returns the existing id and writes nothing.
    pub async fn enqueue(
        &self,
        source: &Path,
        label: &str,
    ) -> Result<EnqueueResult, PendingQueueError> {
        let id = compute_file_hash(source).await?;

        let pending = self.replay().await?;
        if pending.contains_key(&id) {
            debug!(%id, "Content already pending");
            return Ok(EnqueueResult::AlreadyQueued(id));
        }

        let file_name = source
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let inbox_name = match extension_of(source) {
            Some(ext) => format!("{}.{}", id, ext),
            None => id.clone(),
        };

        fs::create_dir_all(&self.inbox).await?;
        let path = self.inbox.join(inbox_name);
        fs::copy(source, &path).await?;

        let record = PendingRecord {
            id: id.clone(),
            path,
            file_name,
            label: label.trim().to_string(),
            enqueued_at: Utc::now(),
        };
        self.append_event(PendingEvent {
            timestamp: record.enqueued_at,
            item_id: id.clone(),
            event_type: PendingEventType::Enqueued,
            record: Some(record),
        })
        .await?;

        Ok(EnqueueResult::Queued(id))
    }

    /// Records not yet cleared, oldest first
    pub async fn drain(&self) -> Result<Vec<PendingRecord>, PendingQueueError> {
        let mut pending: Vec<(usize, PendingRecord)> = self.replay().await?.into_values().collect();
        pending.sort_by_key(|(seq, _)| *seq);
        Ok(pending.into_iter().map(|(_, record)| record).collect())
    }

    /// Retire a record and delete its inbox copy
    pub async fn clear(&self, id: &str) -> Result<(), PendingQueueError> {
        let pending = self.replay().await?;
        let (_, record) = pending
            .get(id)
            .ok_or_else(|| PendingQueueError::NotFound(id.to_string()))?;

        self.append_event(PendingEvent {
            timestamp: Utc::now(),
            item_id: id.to_string(),
            event_type: PendingEventType::Cleared,
            record: None,
        })
        .await?;

        match fs::remove_file(&record.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %record.path.display(), error = %e, "Failed to remove inbox copy"),
        }
        Ok(())
    }

    /// Number of records waiting
    pub async fn len(&self) -> Result<usize, PendingQueueError> {
        Ok(self.replay().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, PendingQueueError> {
        Ok(self.len().await? == 0)
    }

    /// Replay the log into the set of uncleared records, keyed by id with
    /// their log position
    async fn replay(&self) -> Result<HashMap<String, (usize, PendingRecord)>, PendingQueueError> {
        let mut pending = HashMap::new();

        if !self.log_path.exists() {
            return Ok(pending);
        }

        let file = File::open(&self.log_path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut seq = 0;

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let event: PendingEvent = serde_json::from_str(&line)?;
            match event.event_type {
                PendingEventType::Enqueued => {
                    if let Some(record) = event.record {
                        pending.insert(event.item_id, (seq, record));
                    }
                }
                PendingEventType::Cleared => {
                    pending.remove(&event.item_id);
                }
            }
            seq += 1;
        }

        Ok(pending)
    }

    /// Append one line under an exclusive lock on the log.
    ///
    /// Other processes (a share extension, the host app) append to the same
    /// log, so each line is written whole while holding the lock.
    async fn append_event(&self, event: PendingEvent) -> Result<(), PendingQueueError> {
        let mut line = serde_json::to_string(&event)?;
        line.push('\n');
        let log_path = self.log_path.clone();

        tokio::task::spawn_blocking(move || -> Result<(), PendingQueueError> {
            if let Some(parent) = log_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = OpenOptions::new().create(true).append(true).open(&log_path)?;
            file.lock_exclusive()?;
            let written = file.write_all(line.as_bytes()).and_then(|_| file.flush());
            let _ = FileExt::unlock(&file);
            Ok(written?)
        })
        .await
        .map_err(|e| PendingQueueError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }
}

/// Compute SHA256 hash of file content (first 12 hex chars)
pub async fn compute_file_hash(path: &Path) -> Result<String, std::io::Error> {
    let content = fs::read(path).await?;
    let digest = Sha256::digest(&content);
    Ok(hex::encode(digest)[..12].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_queue() -> (PendingQueue, TempDir) {
        let temp = TempDir::new().unwrap();
        let queue = PendingQueue::open(temp.path().join("pending"));
        (queue, temp)
    }

    #[tokio::test]
    async fn test_enqueue_copies_into_inbox() {
        let (queue, temp) = create_test_queue().await;
        let audio_path = temp.path().join("Lesson.MP3");
        tokio::fs::write(&audio_path, b"fake audio content").await.unwrap();

        let result = queue.enqueue(&audio_path, "Lesson").await.unwrap();
        assert!(result.is_new());
        assert_eq!(result.id().len(), 12);

        let records = queue.drain().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_name, "Lesson.MP3");
        assert_eq!(records[0].path, queue.inbox().join(format!("{}.mp3", result.id())));
        assert_eq!(
            tokio::fs::read(&records[0].path).await.unwrap(),
            b"fake audio content"
        );
    }

    #[tokio::test]
    async fn test_idempotent_enqueue() {
        let (queue, temp) = create_test_queue().await;
        let a = temp.path().join("a.m4a");
        let b = temp.path().join("b.m4a");
        tokio::fs::write(&a, b"same bytes").await.unwrap();
        tokio::fs::write(&b, b"same bytes").await.unwrap();

        let first = queue.enqueue(&a, "").await.unwrap();
        let second = queue.enqueue(&b, "").await.unwrap();

        assert!(first.is_new());
        assert_eq!(second, EnqueueResult::AlreadyQueued(first.id().to_string()));
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clear_and_requeue() {
        let (queue, temp) = create_test_queue().await;
        let audio_path = temp.path().join("a.m4a");
        tokio::fs::write(&audio_path, b"bytes").await.unwrap();

        let id = queue.enqueue(&audio_path, "").await.unwrap().id().to_string();
        let inbox_copy = queue.drain().await.unwrap()[0].path.clone();

        queue.clear(&id).await.unwrap();
        assert!(queue.is_empty().await.unwrap());
        assert!(!inbox_copy.exists());

        // Clearing twice is an error; enqueueing again starts fresh
        assert!(matches!(queue.clear(&id).await, Err(PendingQueueError::NotFound(_))));
        assert!(queue.enqueue(&audio_path, "").await.unwrap().is_new());
    }

    #[tokio::test]
    async fn test_drain_is_oldest_first() {
        let (queue, temp) = create_test_queue().await;
        let mut ids = Vec::new();
        for i in 0..3 {
            let path = temp.path().join(format!("{}.m4a", i));
            tokio::fs::write(&path, format!("content {}", i)).await.unwrap();
            ids.push(queue.enqueue(&path, "").await.unwrap().id().to_string());
        }

        queue.clear(&ids[1]).await.unwrap();
        let drained: Vec<String> = queue.drain().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(drained, vec![ids[0].clone(), ids[2].clone()]);
    }

    #[tokio::test]
    async fn test_missing_log_is_empty() {
        let (queue, _temp) = create_test_queue().await;
        assert!(queue.drain().await.unwrap().is_empty());
    }
}

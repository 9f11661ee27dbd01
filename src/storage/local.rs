//! Local filesystem storage implementation.
//!
//! Keeps the corpus in a [`MemoryStore`] and persists it as one JSON
//! snapshot on [`CorpusStore::flush`].
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── config.toml           # Collector and analytics configuration
//! └── corpus.json           # Snapshot of all tables
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{
    AnswerRecord, CorpusCounts, NewOwner, Owner, OwnerKey, QuestionRecord, QuestionView, Tag,
};
use crate::storage::{CorpusSnapshot, CorpusStore, MemoryStore};

/// Snapshot-backed filesystem store.
pub struct LocalStorage {
    path: PathBuf,
    inner: MemoryStore,
    dirty: AtomicBool,
}

impl LocalStorage {
    /// Open the snapshot at `path`, starting empty if it does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let inner = match read_snapshot(&path).await? {
            Some(snapshot) => {
                let store = MemoryStore::from_snapshot(snapshot)?;
                log::debug!("Loaded corpus snapshot from {}", path.display());
                store
            }
            None => {
                log::debug!("No corpus at {}, starting empty", path.display());
                MemoryStore::new()
            }
        };

        Ok(Self {
            path,
            inner,
            dirty: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn touch(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Read a snapshot, returning None if the file doesn't exist.
async fn read_snapshot(path: &Path) -> Result<Option<CorpusSnapshot>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Io(e)),
    }
}

#[async_trait]
impl CorpusStore for LocalStorage {
    async fn find_owner(&self, key: &OwnerKey) -> Result<Option<Owner>> {
        self.inner.find_owner(key).await
    }

    async fn insert_owner(&self, owner: &NewOwner) -> Result<Owner> {
        let created = self.inner.insert_owner(owner).await?;
        self.touch();
        Ok(created)
    }

    async fn update_owner(&self, owner: &Owner) -> Result<()> {
        self.inner.update_owner(owner).await?;
        self.touch();
        Ok(())
    }

    async fn find_tags(&self, names: &[String]) -> Result<Vec<Tag>> {
        self.inner.find_tags(names).await
    }

    async fn insert_tag(&self, name: &str) -> Result<Tag> {
        let tag = self.inner.insert_tag(name).await?;
        self.touch();
        Ok(tag)
    }

    async fn upsert_question(&self, record: QuestionRecord) -> Result<()> {
        self.inner.upsert_question(record).await?;
        self.touch();
        Ok(())
    }

    async fn upsert_answer(&self, record: AnswerRecord) -> Result<()> {
        self.inner.upsert_answer(record).await?;
        self.touch();
        Ok(())
    }

    async fn retain_answers(&self, question_id: i64, keep: &[i64]) -> Result<usize> {
        let removed = self.inner.retain_answers(question_id, keep).await?;
        if removed > 0 {
            self.touch();
        }
        Ok(removed)
    }

    async fn delete_question(&self, question_id: i64) -> Result<bool> {
        let deleted = self.inner.delete_question(question_id).await?;
        if deleted {
            self.touch();
        }
        Ok(deleted)
    }

    async fn contains_question(&self, question_id: i64) -> Result<bool> {
        self.inner.contains_question(question_id).await
    }

    async fn questions_with_tags(&self) -> Result<Vec<QuestionView>> {
        self.inner.questions_with_tags().await
    }

    async fn questions_by_tag_in_range(
        &self,
        tag: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<QuestionView>> {
        self.inner.questions_by_tag_in_range(tag, start, end).await
    }

    async fn questions_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<QuestionView>> {
        self.inner.questions_in_range(start, end).await
    }

    async fn questions_by_tags_with_content(&self, tags: &[String]) -> Result<Vec<QuestionView>> {
        self.inner.questions_by_tags_with_content(tags).await
    }

    async fn questions_with_answers(&self) -> Result<Vec<QuestionView>> {
        self.inner.questions_with_answers().await
    }

    async fn counts(&self) -> Result<CorpusCounts> {
        self.inner.counts().await
    }

    async fn flush(&self) -> Result<()> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let snapshot = self.inner.snapshot().await;
        let bytes = match serde_json::to_vec(&snapshot) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.touch();
                return Err(e.into());
            }
        };
        if let Err(e) = self.write_bytes(&bytes).await {
            self.touch();
            return Err(e);
        }

        log::debug!(
            "Flushed {} questions, {} answers to {}",
            snapshot.questions.len(),
            snapshot.answers.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn question(id: i64, tags: Vec<crate::models::TagId>) -> QuestionRecord {
        QuestionRecord {
            id,
            title: "How do I join threads?".into(),
            body: "<p>Calling join hangs</p>".into(),
            created_at: Utc.with_ymd_and_hms(2023, 5, 1, 8, 0, 0).unwrap(),
            score: 4,
            view_count: 100,
            answer_count: 1,
            is_answered: true,
            owner: None,
            tags,
        }
    }

    #[tokio::test]
    async fn test_open_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::open(tmp.path().join("corpus.json"))
            .await
            .unwrap();

        assert_eq!(storage.counts().await.unwrap(), CorpusCounts::default());
    }

    #[tokio::test]
    async fn test_flush_and_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("corpus.json");

        {
            let storage = LocalStorage::open(&path).await.unwrap();
            let tag = storage.get_or_create_tag("multithreading").await.unwrap();
            storage.upsert_question(question(1, vec![tag.id])).await.unwrap();
            storage
                .upsert_answer(AnswerRecord {
                    id: 2,
                    question_id: 1,
                    body: "Use a latch".into(),
                    created_at: Utc.with_ymd_and_hms(2023, 5, 1, 9, 0, 0).unwrap(),
                    score: 3,
                    is_accepted: true,
                    owner: None,
                })
                .await
                .unwrap();
            storage.flush().await.unwrap();
        }

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());

        let reopened = LocalStorage::open(&path).await.unwrap();
        let counts = reopened.counts().await.unwrap();
        assert_eq!(counts.questions, 1);
        assert_eq!(counts.answers, 1);
        assert_eq!(counts.tags, 1);

        let views = reopened.questions_with_answers().await.unwrap();
        assert_eq!(views[0].tags, vec!["multithreading"]);
        assert!(views[0].answers[0].is_accepted);
    }

    #[tokio::test]
    async fn test_flush_without_changes_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("corpus.json");
        let storage = LocalStorage::open(&path).await.unwrap();

        storage.flush().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("corpus.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let result = LocalStorage::open(&path).await;
        assert!(matches!(result, Err(AppError::Json(_))));
    }
}

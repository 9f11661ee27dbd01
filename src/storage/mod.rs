//! Storage abstractions for corpus persistence.
//!
//! The corpus is kept as arena-style tables keyed by id:
//!
//! ```text
//! questions  source id -> QuestionRecord (owner id, tag ids)
//! answers    source id -> AnswerRecord   (question id, owner id)
//! tags       TagId     -> Tag            (unique lower-cased name)
//! owners     OwnerId   -> Owner          (unique source id or display name)
//! ```
//!
//! Back-references (tag -> questions, question -> answers, owner -> posts)
//! are derived indices rebuilt from the forward tables.

pub mod local;
pub mod memory;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{
    AnswerRecord, CorpusCounts, NewOwner, Owner, OwnerKey, QuestionRecord, QuestionView, Tag,
};

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::{CorpusSnapshot, MemoryStore};

/// Read/write access to questions, answers, tags and owners.
///
/// Insert methods report uniqueness violations as [`AppError::Conflict`];
/// the provided get-or-create methods recover from those by re-fetching.
#[async_trait]
pub trait CorpusStore: Send + Sync {
    /// Look up an owner by its dedup identity.
    async fn find_owner(&self, key: &OwnerKey) -> Result<Option<Owner>>;

    /// Create an owner; fails with a conflict if the identity is taken.
    async fn insert_owner(&self, owner: &NewOwner) -> Result<Owner>;

    /// Overwrite an existing owner row.
    async fn update_owner(&self, owner: &Owner) -> Result<()>;

    /// Look up tags by normalized name. Unknown names are skipped.
    async fn find_tags(&self, names: &[String]) -> Result<Vec<Tag>>;

    /// Create a tag; fails with a conflict if the name is taken.
    async fn insert_tag(&self, name: &str) -> Result<Tag>;

    /// Insert a question or overwrite its scalars and tag links.
    async fn upsert_question(&self, record: QuestionRecord) -> Result<()>;

    /// Insert an answer or overwrite it. The parent question must exist.
    async fn upsert_answer(&self, record: AnswerRecord) -> Result<()>;

    /// Drop answers of a question whose ids are not in `keep`.
    async fn retain_answers(&self, question_id: i64, keep: &[i64]) -> Result<usize>;

    /// Delete a question together with its answers.
    async fn delete_question(&self, question_id: i64) -> Result<bool>;

    async fn contains_question(&self, question_id: i64) -> Result<bool>;

    /// Every question with its tags.
    async fn questions_with_tags(&self) -> Result<Vec<QuestionView>>;

    /// Questions carrying `tag` created in `[start, end)`.
    async fn questions_by_tag_in_range(
        &self,
        tag: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<QuestionView>>;

    /// Questions created in `[start, end)`.
    async fn questions_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<QuestionView>>;

    /// Distinct questions carrying any of `tags`, with title and body.
    async fn questions_by_tags_with_content(&self, tags: &[String]) -> Result<Vec<QuestionView>>;

    /// Every question with its answers.
    async fn questions_with_answers(&self) -> Result<Vec<QuestionView>>;

    async fn counts(&self) -> Result<CorpusCounts>;

    /// Make pending writes durable. No-op for volatile stores.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Resolve an owner by identity, creating it when missing.
    ///
    /// Display name and reputation are last-write-wins. A conflicting
    /// concurrent insert is resolved by re-fetching the winner.
    async fn get_or_create_owner(&self, owner: &NewOwner) -> Result<Owner> {
        let key = owner.key();

        if let Some(existing) = self.find_owner(&key).await? {
            return self.refresh_owner(existing, owner).await;
        }

        match self.insert_owner(owner).await {
            Ok(created) => Ok(created),
            Err(e) if e.is_conflict() => {
                log::debug!("Owner {} created concurrently, re-fetching", key);
                let existing = self.find_owner(&key).await?.ok_or_else(|| {
                    AppError::inconsistent(format!("owner {key} conflicted but is missing"))
                })?;
                self.refresh_owner(existing, owner).await
            }
            Err(e) => Err(e),
        }
    }

    /// Apply the latest display name and reputation to a stored owner.
    async fn refresh_owner(&self, mut existing: Owner, seen: &NewOwner) -> Result<Owner> {
        let reputation = seen.reputation.unwrap_or(existing.reputation);
        if existing.display_name != seen.display_name || existing.reputation != reputation {
            existing.display_name = seen.display_name.clone();
            existing.reputation = reputation;
            self.update_owner(&existing).await?;
        }
        Ok(existing)
    }

    async fn get_or_create_tag(&self, name: &str) -> Result<Tag> {
        let mut tags = self.get_or_create_tags(&[name.to_string()]).await?;
        tags.pop()
            .ok_or_else(|| AppError::validation(format!("invalid tag name '{name}'")))
    }

    /// Resolve a batch of tag names, creating the missing ones.
    ///
    /// Names are normalized and deduplicated; the result follows the
    /// order of first appearance. Empty names are dropped.
    async fn get_or_create_tags(&self, names: &[String]) -> Result<Vec<Tag>> {
        let mut seen = HashSet::new();
        let wanted: Vec<String> = names
            .iter()
            .map(|n| Tag::normalize(n))
            .filter(|n| !n.is_empty() && seen.insert(n.clone()))
            .collect();

        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_name: HashMap<String, Tag> = self
            .find_tags(&wanted)
            .await?
            .into_iter()
            .map(|t| (t.name.clone(), t))
            .collect();

        for name in &wanted {
            if by_name.contains_key(name) {
                continue;
            }
            let tag = match self.insert_tag(name).await {
                Ok(tag) => tag,
                Err(e) if e.is_conflict() => {
                    log::debug!("Tag '{}' created concurrently, re-fetching", name);
                    self.find_tags(std::slice::from_ref(name))
                        .await?
                        .pop()
                        .ok_or_else(|| {
                            AppError::inconsistent(format!("tag '{name}' conflicted but is missing"))
                        })?
                }
                Err(e) => return Err(e),
            };
            by_name.insert(name.clone(), tag);
        }

        Ok(wanted
            .iter()
            .filter_map(|name| by_name.remove(name))
            .collect())
    }
}

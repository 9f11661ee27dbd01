//! In-memory arena store.
//!
//! Forward tables hold the rows; reverse lookups are derived indices that
//! are rebuilt whenever a snapshot is loaded.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::models::{
    AnswerRecord, AnswerView, CorpusCounts, NewOwner, Owner, OwnerId, OwnerKey, QuestionRecord,
    QuestionView, Tag, TagId,
};
use crate::storage::CorpusStore;

/// Serializable form of the arena (forward tables only).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusSnapshot {
    #[serde(default)]
    pub next_tag_id: u64,
    #[serde(default)]
    pub next_owner_id: u64,
    #[serde(default)]
    pub questions: Vec<QuestionRecord>,
    #[serde(default)]
    pub answers: Vec<AnswerRecord>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub owners: Vec<Owner>,
}

#[derive(Debug, Default)]
struct Indices {
    tag_by_name: HashMap<String, TagId>,
    owner_by_key: HashMap<OwnerKey, OwnerId>,
    questions_by_tag: HashMap<TagId, BTreeSet<i64>>,
    answers_by_question: HashMap<i64, BTreeSet<i64>>,
    questions_by_owner: HashMap<OwnerId, BTreeSet<i64>>,
    answers_by_owner: HashMap<OwnerId, BTreeSet<i64>>,
}

#[derive(Debug, Default)]
struct Arena {
    next_tag_id: u64,
    next_owner_id: u64,
    questions: BTreeMap<i64, QuestionRecord>,
    answers: BTreeMap<i64, AnswerRecord>,
    tags: BTreeMap<TagId, Tag>,
    owners: BTreeMap<OwnerId, Owner>,
    index: Indices,
}

impl Arena {
    fn from_snapshot(snapshot: CorpusSnapshot) -> Result<Self> {
        let mut arena = Arena {
            next_tag_id: snapshot.next_tag_id,
            next_owner_id: snapshot.next_owner_id,
            ..Arena::default()
        };

        for tag in snapshot.tags {
            if arena.index.tag_by_name.insert(tag.name.clone(), tag.id).is_some() {
                return Err(AppError::conflict("tag", &tag.name));
            }
            arena.next_tag_id = arena.next_tag_id.max(tag.id.0 + 1);
            arena.tags.insert(tag.id, tag);
        }
        for owner in snapshot.owners {
            if arena.index.owner_by_key.insert(owner.key(), owner.id).is_some() {
                return Err(AppError::conflict("owner", owner.key()));
            }
            arena.next_owner_id = arena.next_owner_id.max(owner.id.0 + 1);
            arena.owners.insert(owner.id, owner);
        }
        for question in snapshot.questions {
            arena.link_question(&question);
            arena.questions.insert(question.id, question);
        }
        for answer in snapshot.answers {
            if !arena.questions.contains_key(&answer.question_id) {
                return Err(AppError::MissingParent {
                    answer_id: answer.id,
                    question_id: answer.question_id,
                });
            }
            arena.link_answer(&answer);
            arena.answers.insert(answer.id, answer);
        }

        Ok(arena)
    }

    fn to_snapshot(&self) -> CorpusSnapshot {
        CorpusSnapshot {
            next_tag_id: self.next_tag_id,
            next_owner_id: self.next_owner_id,
            questions: self.questions.values().cloned().collect(),
            answers: self.answers.values().cloned().collect(),
            tags: self.tags.values().cloned().collect(),
            owners: self.owners.values().cloned().collect(),
        }
    }

    fn link_question(&mut self, question: &QuestionRecord) {
        for tag in &question.tags {
            self.index
                .questions_by_tag
                .entry(*tag)
                .or_default()
                .insert(question.id);
        }
        if let Some(owner) = question.owner {
            self.index
                .questions_by_owner
                .entry(owner)
                .or_default()
                .insert(question.id);
        }
    }

    fn unlink_question(&mut self, question: &QuestionRecord) {
        for tag in &question.tags {
            remove_link(&mut self.index.questions_by_tag, tag, question.id);
        }
        if let Some(owner) = question.owner {
            remove_link(&mut self.index.questions_by_owner, &owner, question.id);
        }
    }

    fn link_answer(&mut self, answer: &AnswerRecord) {
        self.index
            .answers_by_question
            .entry(answer.question_id)
            .or_default()
            .insert(answer.id);
        if let Some(owner) = answer.owner {
            self.index
                .answers_by_owner
                .entry(owner)
                .or_default()
                .insert(answer.id);
        }
    }

    fn unlink_answer(&mut self, answer: &AnswerRecord) {
        remove_link(
            &mut self.index.answers_by_question,
            &answer.question_id,
            answer.id,
        );
        if let Some(owner) = answer.owner {
            remove_link(&mut self.index.answers_by_owner, &owner, answer.id);
        }
    }

    fn remove_answer(&mut self, answer_id: i64) -> bool {
        match self.answers.remove(&answer_id) {
            Some(answer) => {
                self.unlink_answer(&answer);
                true
            }
            None => false,
        }
    }

    fn check_refs(&self, owner: Option<OwnerId>, tags: &[TagId]) -> Result<()> {
        if let Some(owner) = owner {
            if !self.owners.contains_key(&owner) {
                return Err(AppError::inconsistent(format!("unknown owner {}", owner.0)));
            }
        }
        if let Some(tag) = tags.iter().find(|t| !self.tags.contains_key(*t)) {
            return Err(AppError::inconsistent(format!("unknown tag {}", tag.0)));
        }
        Ok(())
    }

    fn view(&self, question: &QuestionRecord) -> QuestionView {
        let mut tags: Vec<String> = question
            .tags
            .iter()
            .filter_map(|id| self.tags.get(id))
            .map(|t| t.name.clone())
            .collect();
        tags.sort();
        tags.dedup();

        let answers = self
            .index
            .answers_by_question
            .get(&question.id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.answers.get(id))
            .map(|a| AnswerView {
                id: a.id,
                body: a.body.clone(),
                created_at: a.created_at,
                score: a.score,
                is_accepted: a.is_accepted,
                answerer: a.owner.and_then(|id| self.owners.get(&id).cloned()),
            })
            .collect();

        QuestionView {
            id: question.id,
            title: question.title.clone(),
            body: question.body.clone(),
            created_at: question.created_at,
            score: question.score,
            view_count: question.view_count,
            answer_count: question.answer_count,
            is_answered: question.is_answered,
            owner: question.owner.and_then(|id| self.owners.get(&id).cloned()),
            tags,
            answers,
        }
    }

    fn views<'a>(&self, questions: impl Iterator<Item = &'a QuestionRecord>) -> Vec<QuestionView> {
        questions.map(|q| self.view(q)).collect()
    }
}

fn remove_link<K: std::hash::Hash + Eq>(map: &mut HashMap<K, BTreeSet<i64>>, key: &K, id: i64) {
    if let Some(set) = map.get_mut(key) {
        set.remove(&id);
        if set.is_empty() {
            map.remove(key);
        }
    }
}

fn in_range(at: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    start <= at && at < end
}

/// Volatile corpus store. Every read builds its views under one read lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    arena: RwLock<Arena>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store (and its reverse indices) from a snapshot.
    pub fn from_snapshot(snapshot: CorpusSnapshot) -> Result<Self> {
        Ok(Self {
            arena: RwLock::new(Arena::from_snapshot(snapshot)?),
        })
    }

    pub async fn snapshot(&self) -> CorpusSnapshot {
        self.arena.read().await.to_snapshot()
    }

    /// Question ids authored by an owner.
    pub async fn questions_of_owner(&self, owner: OwnerId) -> Vec<i64> {
        let arena = self.arena.read().await;
        arena
            .index
            .questions_by_owner
            .get(&owner)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Answer ids authored by an owner.
    pub async fn answers_of_owner(&self, owner: OwnerId) -> Vec<i64> {
        let arena = self.arena.read().await;
        arena
            .index
            .answers_by_owner
            .get(&owner)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CorpusStore for MemoryStore {
    async fn find_owner(&self, key: &OwnerKey) -> Result<Option<Owner>> {
        let arena = self.arena.read().await;
        Ok(arena
            .index
            .owner_by_key
            .get(key)
            .and_then(|id| arena.owners.get(id))
            .cloned())
    }

    async fn insert_owner(&self, owner: &NewOwner) -> Result<Owner> {
        let mut arena = self.arena.write().await;
        let key = owner.key();
        if arena.index.owner_by_key.contains_key(&key) {
            return Err(AppError::conflict("owner", key));
        }

        let id = OwnerId(arena.next_owner_id);
        arena.next_owner_id += 1;
        let row = Owner {
            id,
            source_id: owner.source_id,
            display_name: owner.display_name.clone(),
            reputation: owner.reputation.unwrap_or(0),
        };
        arena.index.owner_by_key.insert(key, id);
        arena.owners.insert(id, row.clone());
        Ok(row)
    }

    async fn update_owner(&self, owner: &Owner) -> Result<()> {
        let mut arena = self.arena.write().await;
        let previous_key = match arena.owners.get(&owner.id) {
            Some(previous) => previous.key(),
            None => {
                return Err(AppError::inconsistent(format!(
                    "owner {} does not exist",
                    owner.id.0
                )));
            }
        };

        let key = owner.key();
        if key != previous_key {
            if arena.index.owner_by_key.contains_key(&key) {
                return Err(AppError::conflict("owner", key));
            }
            arena.index.owner_by_key.remove(&previous_key);
            arena.index.owner_by_key.insert(key, owner.id);
        }
        arena.owners.insert(owner.id, owner.clone());
        Ok(())
    }

    async fn find_tags(&self, names: &[String]) -> Result<Vec<Tag>> {
        let arena = self.arena.read().await;
        Ok(names
            .iter()
            .filter_map(|name| arena.index.tag_by_name.get(&Tag::normalize(name)))
            .filter_map(|id| arena.tags.get(id))
            .cloned()
            .collect())
    }

    async fn insert_tag(&self, name: &str) -> Result<Tag> {
        let name = Tag::normalize(name);
        if name.is_empty() {
            return Err(AppError::validation("tag name is empty"));
        }

        let mut arena = self.arena.write().await;
        if arena.index.tag_by_name.contains_key(&name) {
            return Err(AppError::conflict("tag", name));
        }

        let id = TagId(arena.next_tag_id);
        arena.next_tag_id += 1;
        let tag = Tag { id, name };
        arena.index.tag_by_name.insert(tag.name.clone(), id);
        arena.tags.insert(id, tag.clone());
        Ok(tag)
    }

    async fn upsert_question(&self, mut record: QuestionRecord) -> Result<()> {
        let mut arena = self.arena.write().await;
        arena.check_refs(record.owner, &record.tags)?;

        record.tags.sort();
        record.tags.dedup();

        if let Some(previous) = arena.questions.remove(&record.id) {
            arena.unlink_question(&previous);
        }
        arena.link_question(&record);
        arena.questions.insert(record.id, record);
        Ok(())
    }

    async fn upsert_answer(&self, record: AnswerRecord) -> Result<()> {
        let mut arena = self.arena.write().await;
        if !arena.questions.contains_key(&record.question_id) {
            return Err(AppError::MissingParent {
                answer_id: record.id,
                question_id: record.question_id,
            });
        }
        arena.check_refs(record.owner, &[])?;

        arena.remove_answer(record.id);
        arena.link_answer(&record);
        arena.answers.insert(record.id, record);
        Ok(())
    }

    async fn retain_answers(&self, question_id: i64, keep: &[i64]) -> Result<usize> {
        let mut arena = self.arena.write().await;
        let stale: Vec<i64> = arena
            .index
            .answers_by_question
            .get(&question_id)
            .into_iter()
            .flatten()
            .filter(|id| !keep.contains(id))
            .copied()
            .collect();

        for id in &stale {
            arena.remove_answer(*id);
        }
        Ok(stale.len())
    }

    async fn delete_question(&self, question_id: i64) -> Result<bool> {
        let mut arena = self.arena.write().await;
        let Some(question) = arena.questions.remove(&question_id) else {
            return Ok(false);
        };
        arena.unlink_question(&question);

        let answers: Vec<i64> = arena
            .index
            .answers_by_question
            .get(&question_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        for id in answers {
            arena.remove_answer(id);
        }
        Ok(true)
    }

    async fn contains_question(&self, question_id: i64) -> Result<bool> {
        Ok(self.arena.read().await.questions.contains_key(&question_id))
    }

    async fn questions_with_tags(&self) -> Result<Vec<QuestionView>> {
        let arena = self.arena.read().await;
        Ok(arena.views(arena.questions.values()))
    }

    async fn questions_by_tag_in_range(
        &self,
        tag: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<QuestionView>> {
        let arena = self.arena.read().await;
        let Some(tag_id) = arena.index.tag_by_name.get(&Tag::normalize(tag)) else {
            return Ok(Vec::new());
        };

        let questions = arena
            .index
            .questions_by_tag
            .get(tag_id)
            .into_iter()
            .flatten()
            .filter_map(|id| arena.questions.get(id))
            .filter(|q| in_range(q.created_at, start, end));
        Ok(arena.views(questions))
    }

    async fn questions_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<QuestionView>> {
        let arena = self.arena.read().await;
        let questions = arena
            .questions
            .values()
            .filter(|q| in_range(q.created_at, start, end));
        Ok(arena.views(questions))
    }

    async fn questions_by_tags_with_content(&self, tags: &[String]) -> Result<Vec<QuestionView>> {
        let arena = self.arena.read().await;
        let ids: BTreeSet<i64> = tags
            .iter()
            .filter_map(|name| arena.index.tag_by_name.get(&Tag::normalize(name)))
            .filter_map(|tag_id| arena.index.questions_by_tag.get(tag_id))
            .flatten()
            .copied()
            .collect();

        Ok(arena.views(ids.iter().filter_map(|id| arena.questions.get(id))))
    }

    async fn questions_with_answers(&self) -> Result<Vec<QuestionView>> {
        let arena = self.arena.read().await;
        Ok(arena.views(arena.questions.values()))
    }

    async fn counts(&self) -> Result<CorpusCounts> {
        let arena = self.arena.read().await;
        Ok(CorpusCounts {
            questions: arena.questions.len(),
            answers: arena.answers.len(),
            tags: arena.tags.len(),
            owners: arena.owners.len(),
        })
    }
}

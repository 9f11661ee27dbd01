//! Corpus entities: write records, stored rows and read-side views.
//!
//! Questions and answers are keyed by their source id. Tags and owners get
//! store-assigned ids; relations are kept as forward id references only.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned tag identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TagId(pub u64);

/// Store-assigned owner identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub u64);

/// A tag, unique by lower-cased name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

impl Tag {
    /// Canonical tag name: trimmed and lower-cased.
    pub fn normalize(name: &str) -> String {
        name.trim().to_lowercase()
    }
}

/// Identity an owner is deduplicated by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OwnerKey {
    /// Stable user id from the source
    Source(i64),
    /// Synthesized identity for users without an id
    DisplayName(String),
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerKey::Source(id) => write!(f, "user:{id}"),
            OwnerKey::DisplayName(name) => write!(f, "name:{name}"),
        }
    }
}

/// Author of questions and answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: OwnerId,
    pub source_id: Option<i64>,
    pub display_name: String,
    pub reputation: i64,
}

impl Owner {
    pub fn key(&self) -> OwnerKey {
        owner_key(self.source_id, &self.display_name)
    }
}

/// Owner data as seen on one record; input to get-or-create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOwner {
    pub source_id: Option<i64>,
    pub display_name: String,
    pub reputation: Option<i64>,
}

impl NewOwner {
    pub fn key(&self) -> OwnerKey {
        owner_key(self.source_id, &self.display_name)
    }
}

fn owner_key(source_id: Option<i64>, display_name: &str) -> OwnerKey {
    match source_id {
        Some(id) => OwnerKey::Source(id),
        None => OwnerKey::DisplayName(display_name.to_string()),
    }
}

/// Normalized question row, keyed by source id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub score: i64,
    pub view_count: i64,
    pub answer_count: i64,
    pub is_answered: bool,
    pub owner: Option<OwnerId>,
    pub tags: Vec<TagId>,
}

/// Normalized answer row, keyed by source id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub id: i64,
    pub question_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub score: i64,
    pub is_accepted: bool,
    pub owner: Option<OwnerId>,
}

/// Denormalized question snapshot handed to the analytics engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionView {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub score: i64,
    pub view_count: i64,
    pub answer_count: i64,
    pub is_answered: bool,
    pub owner: Option<Owner>,
    /// Sorted, unique tag names
    pub tags: Vec<String>,
    pub answers: Vec<AnswerView>,
}

impl QuestionView {
    /// Calendar month of creation as `YYYY-MM`.
    pub fn month_label(&self) -> String {
        self.created_at.format("%Y-%m").to_string()
    }

    /// Whitespace-separated words in the raw body.
    pub fn body_word_count(&self) -> usize {
        self.body.split_whitespace().count()
    }
}

/// Answer snapshot inside a [`QuestionView`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerView {
    pub id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub score: i64,
    pub is_accepted: bool,
    pub answerer: Option<Owner>,
}

/// Entity totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CorpusCounts {
    pub questions: usize,
    pub answers: usize,
    pub tags: usize,
    pub owners: usize,
}

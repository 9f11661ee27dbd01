//! Wire types of the Stack Exchange questions endpoint.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Ranking mode requested from the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortStrategy {
    Votes,
    Creation,
    Hot,
    Week,
    Month,
}

impl SortStrategy {
    /// Default sweep order.
    pub const ALL: [SortStrategy; 5] = [
        SortStrategy::Votes,
        SortStrategy::Creation,
        SortStrategy::Hot,
        SortStrategy::Week,
        SortStrategy::Month,
    ];

    /// Value of the `sort` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortStrategy::Votes => "votes",
            SortStrategy::Creation => "creation",
            SortStrategy::Hot => "hot",
            SortStrategy::Week => "week",
            SortStrategy::Month => "month",
        }
    }
}

impl fmt::Display for SortStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,

    #[serde(default)]
    pub has_more: bool,

    #[serde(default)]
    pub quota_remaining: Option<i64>,

    /// Seconds to wait before hitting the same method again
    #[serde(default)]
    pub backoff: Option<u64>,
}

/// Error envelope returned with non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error_id: i64,
    #[serde(default)]
    pub error_name: String,
    #[serde(default)]
    pub error_message: String,
}

impl ApiErrorBody {
    pub fn is_throttle(&self) -> bool {
        self.error_id == 502 || self.error_name == "throttle_violation"
    }
}

/// Question as returned by the API (with the body/answers filter).
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionDto {
    pub question_id: i64,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub body: String,

    /// Unix epoch seconds
    pub creation_date: i64,

    #[serde(default)]
    pub score: i64,

    #[serde(default)]
    pub view_count: i64,

    #[serde(default)]
    pub answer_count: i64,

    #[serde(default)]
    pub is_answered: bool,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub owner: Option<OwnerDto>,

    /// Absent when the filter strips answers
    #[serde(default)]
    pub answers: Option<Vec<AnswerDto>>,
}

impl QuestionDto {
    pub fn created_at(&self) -> Result<DateTime<Utc>> {
        epoch_to_utc(self.creation_date).ok_or_else(|| {
            AppError::validation(format!(
                "question {}: creation_date {} out of range",
                self.question_id, self.creation_date
            ))
        })
    }
}

/// Answer as returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerDto {
    pub answer_id: i64,

    #[serde(default)]
    pub body: String,

    pub creation_date: i64,

    #[serde(default)]
    pub score: i64,

    #[serde(default)]
    pub is_accepted: bool,

    #[serde(default)]
    pub owner: Option<OwnerDto>,
}

impl AnswerDto {
    pub fn created_at(&self) -> Result<DateTime<Utc>> {
        epoch_to_utc(self.creation_date).ok_or_else(|| {
            AppError::validation(format!(
                "answer {}: creation_date {} out of range",
                self.answer_id, self.creation_date
            ))
        })
    }
}

/// Shallow user as embedded in questions and answers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OwnerDto {
    #[serde(default)]
    pub user_id: Option<i64>,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub reputation: Option<i64>,
}

fn epoch_to_utc(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

//! View builders for analysis tests.

use chrono::{DateTime, Utc};

use crate::models::{AnswerView, Owner, OwnerId, QuestionView};

pub fn question(id: i64, created_at: DateTime<Utc>, tags: &[&str]) -> QuestionView {
    let mut tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
    tags.sort();
    QuestionView {
        id,
        title: format!("Question {id}"),
        body: String::new(),
        created_at,
        score: 0,
        view_count: 0,
        answer_count: 0,
        is_answered: false,
        owner: None,
        tags,
        answers: Vec::new(),
    }
}

pub fn answer(id: i64, score: i64, is_accepted: bool, reputation: Option<i64>) -> AnswerView {
    AnswerView {
        id,
        body: String::new(),
        created_at: DateTime::default(),
        score,
        is_accepted,
        answerer: reputation.map(|reputation| Owner {
            id: OwnerId(id as u64),
            source_id: Some(id),
            display_name: format!("user{id}"),
            reputation,
        }),
    }
}

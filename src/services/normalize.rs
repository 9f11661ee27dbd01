// src/services/normalize.rs

//! Mapping of API records onto the corpus.

use crate::error::Result;
use crate::models::{AnswerDto, AnswerRecord, NewOwner, OwnerDto, OwnerId, QuestionDto, QuestionRecord};
use crate::storage::CorpusStore;

/// Owner identity carried by an API record, if any.
///
/// Users without an id are keyed by display name; records with neither are
/// anonymous.
pub fn owner_from_dto(dto: Option<&OwnerDto>) -> Option<NewOwner> {
    let dto = dto?;
    let display_name = dto
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    match (dto.user_id, display_name) {
        (Some(id), name) => Some(NewOwner {
            source_id: Some(id),
            display_name: name.map_or_else(|| format!("user{id}"), str::to_string),
            reputation: dto.reputation,
        }),
        (None, Some(name)) => Some(NewOwner {
            source_id: None,
            display_name: name.to_string(),
            reputation: dto.reputation,
        }),
        (None, None) => None,
    }
}

async fn resolve_owner(store: &dyn CorpusStore, dto: Option<&OwnerDto>) -> Result<Option<OwnerId>> {
    match owner_from_dto(dto) {
        Some(owner) => Ok(Some(store.get_or_create_owner(&owner).await?.id)),
        None => Ok(None),
    }
}

async fn persist_answer(store: &dyn CorpusStore, question_id: i64, dto: &AnswerDto) -> Result<()> {
    let created_at = dto.created_at()?;
    let owner = resolve_owner(store, dto.owner.as_ref()).await?;
    store
        .upsert_answer(AnswerRecord {
            id: dto.answer_id,
            question_id,
            body: dto.body.clone(),
            created_at,
            score: dto.score,
            is_accepted: dto.is_accepted,
            owner,
        })
        .await
}

/// Write one question with its owner, tags and answers.
///
/// Scalars and tag links are overwritten. When the record carries an answer
/// list, answers missing from it are dropped from the store.
pub async fn persist_question(store: &dyn CorpusStore, dto: &QuestionDto) -> Result<()> {
    // Reject unusable timestamps before anything is written
    let created_at = dto.created_at()?;
    for answer in dto.answers.iter().flatten() {
        answer.created_at()?;
    }

    let owner = resolve_owner(store, dto.owner.as_ref()).await?;
    let tags = store.get_or_create_tags(&dto.tags).await?;

    store
        .upsert_question(QuestionRecord {
            id: dto.question_id,
            title: dto.title.clone(),
            body: dto.body.clone(),
            created_at,
            score: dto.score,
            view_count: dto.view_count,
            answer_count: dto.answer_count,
            is_answered: dto.is_answered,
            owner,
            tags: tags.iter().map(|t| t.id).collect(),
        })
        .await?;

    if let Some(answers) = &dto.answers {
        for answer in answers {
            persist_answer(store, dto.question_id, answer).await?;
        }
        let keep: Vec<i64> = answers.iter().map(|a| a.answer_id).collect();
        let dropped = store.retain_answers(dto.question_id, &keep).await?;
        if dropped > 0 {
            log::debug!(
                "Question {}: dropped {} stale answers",
                dto.question_id,
                dropped
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApiResponse;
    use crate::storage::MemoryStore;

    fn decode(json: &str) -> QuestionDto {
        let page: ApiResponse<QuestionDto> = serde_json::from_str(json).unwrap();
        page.items.into_iter().next().unwrap()
    }

    const WITH_ANSWERS: &str = r#"{"items": [{
        "question_id": 1,
        "title": "Deadlock in synchronized block",
        "body": "<p>Two threads wait forever</p>",
        "creation_date": 1704067200,
        "score": 5,
        "view_count": 40,
        "answer_count": 2,
        "is_answered": true,
        "tags": ["Java", "multithreading", "java"],
        "owner": {"user_id": 7, "display_name": "alice", "reputation": 100},
        "answers": [
            {"answer_id": 10, "body": "Lock ordering", "creation_date": 1704070800, "score": 4, "is_accepted": true,
             "owner": {"user_id": 8, "display_name": "bob", "reputation": 5000}},
            {"answer_id": 11, "body": "Use tryLock", "creation_date": 1704074400, "score": 1, "is_accepted": false,
             "owner": {"display_name": "ghost"}}
        ]
    }]}"#;

    #[test]
    fn test_owner_from_dto() {
        assert!(owner_from_dto(None).is_none());
        assert!(owner_from_dto(Some(&OwnerDto::default())).is_none());

        let anonymous = OwnerDto {
            display_name: Some(" ghost ".into()),
            ..OwnerDto::default()
        };
        let owner = owner_from_dto(Some(&anonymous)).unwrap();
        assert_eq!(owner.source_id, None);
        assert_eq!(owner.display_name, "ghost");

        let nameless = OwnerDto {
            user_id: Some(3),
            ..OwnerDto::default()
        };
        assert_eq!(owner_from_dto(Some(&nameless)).unwrap().display_name, "user3");
    }

    #[tokio::test]
    async fn test_persist_question_graph() {
        let store = MemoryStore::new();
        persist_question(&store, &decode(WITH_ANSWERS)).await.unwrap();

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.questions, 1);
        assert_eq!(counts.answers, 2);
        assert_eq!(counts.tags, 2);
        assert_eq!(counts.owners, 3);

        let view = &store.questions_with_answers().await.unwrap()[0];
        assert_eq!(view.tags, vec!["java", "multithreading"]);
        assert_eq!(view.owner.as_ref().unwrap().display_name, "alice");
        assert_eq!(view.answers[0].answerer.as_ref().unwrap().reputation, 5000);
        assert_eq!(view.answers[1].answerer.as_ref().unwrap().source_id, None);
    }

    #[tokio::test]
    async fn test_bad_answer_timestamp_writes_nothing() {
        let store = MemoryStore::new();
        let json = WITH_ANSWERS.replace("1704074400", "-9223372036854775808");

        let err = persist_question(&store, &decode(&json)).await.unwrap_err();
        assert!(matches!(err, crate::error::AppError::Validation(_)));

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.questions, 0);
        assert_eq!(counts.owners, 0);
    }

    #[tokio::test]
    async fn test_repersist_overwrites_and_drops_missing_answers() {
        let store = MemoryStore::new();
        persist_question(&store, &decode(WITH_ANSWERS)).await.unwrap();

        let mut updated = decode(WITH_ANSWERS);
        updated.score = 9;
        updated.tags = vec!["java".into()];
        updated.answers.as_mut().unwrap().truncate(1);
        persist_question(&store, &updated).await.unwrap();

        let view = &store.questions_with_answers().await.unwrap()[0];
        assert_eq!(view.score, 9);
        assert_eq!(view.tags, vec!["java"]);
        assert_eq!(view.answers.len(), 1);
        assert_eq!(store.counts().await.unwrap().questions, 1);
    }

    #[tokio::test]
    async fn test_missing_answer_list_keeps_stored_answers() {
        let store = MemoryStore::new();
        persist_question(&store, &decode(WITH_ANSWERS)).await.unwrap();

        let mut stripped = decode(WITH_ANSWERS);
        stripped.answers = None;
        persist_question(&store, &stripped).await.unwrap();

        assert_eq!(store.counts().await.unwrap().answers, 2);
    }
}

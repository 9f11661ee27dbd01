//! Analytics engine.
//!
//! Every query reads one snapshot from the [`CorpusStore`] and runs a pure
//! aggregation over it:
//!
//! | Query              | Store read                         | Module          |
//! |--------------------|------------------------------------|-----------------|
//! | topic trend        | questions by tag in `[start, end)` | `trend`         |
//! | tag pairs          | all questions with tags            | `cooccurrence`  |
//! | monthly top tags   | questions in the month             | `monthly`       |
//! | term frequencies   | questions by tag set, with content | `lexical`       |
//! | solvability        | all questions with answers         | `solvability`   |

pub mod cooccurrence;
pub mod lexical;
pub mod monthly;
pub mod params;
pub mod solvability;
pub mod tally;
pub mod trend;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{AnalysisConfig, RankedCount, SolvabilityReport, Tag, TrendSeries};
use crate::storage::CorpusStore;

pub use params::{
    month_bounds, parse_month, parse_reference_date, parse_top_n, validate_range, validate_top_n,
};
pub use solvability::TrendinessRule;

/// Read-only queries over the corpus.
pub struct Analyzer {
    store: Arc<dyn CorpusStore>,
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(store: Arc<dyn CorpusStore>, config: AnalysisConfig) -> Self {
        Self { store, config }
    }

    /// Questions per month for `tag`, created in `[start, end)`.
    pub async fn topic_trend(
        &self,
        tag: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<TrendSeries> {
        validate_range(start, end)?;
        let tag = Tag::normalize(tag);
        let questions = self.store.questions_by_tag_in_range(&tag, start, end).await?;
        log::debug!("Trend of '{}': {} questions in range", tag, questions.len());
        Ok(trend::monthly_counts(&questions))
    }

    /// The `n` most frequent co-occurring tag pairs.
    pub async fn top_tag_pairs(&self, n: usize) -> Result<Vec<RankedCount>> {
        let n = validate_top_n(n)?;
        let questions = self.store.questions_with_tags().await?;
        Ok(cooccurrence::top_pairs(&questions, n))
    }

    /// The `n` most frequent tags in the calendar month containing `at`.
    pub async fn top_tags_for_month(&self, at: DateTime<Utc>, n: usize) -> Result<Vec<RankedCount>> {
        let n = validate_top_n(n)?;
        let (start, end) = month_bounds(at);
        let questions = self.store.questions_in_range(start, end).await?;
        Ok(monthly::top_tags(&questions, n))
    }

    /// Term frequencies over questions carrying any configured lexical tag.
    pub async fn term_frequencies(&self) -> Result<Vec<RankedCount>> {
        let tags: Vec<String> = self
            .config
            .lexical_tags
            .iter()
            .map(|t| Tag::normalize(t))
            .collect();
        let questions = self.store.questions_by_tags_with_content(&tags).await?;
        log::debug!(
            "Term frequencies over {} questions tagged {:?}",
            questions.len(),
            tags
        );
        Ok(lexical::term_frequencies(&questions, self.config.lexical_limit))
    }

    /// Solvable versus hard comparison over the whole corpus.
    pub async fn compare_solvability(&self) -> Result<SolvabilityReport> {
        let questions = self.store.questions_with_answers().await?;
        let rule = TrendinessRule {
            top_tags: self.config.trend_top_tags,
            min_shared: self.config.min_shared_top_tags,
        };
        Ok(solvability::compare(&questions, rule))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::error::AppError;
    use crate::models::{AnswerRecord, QuestionRecord};
    use crate::storage::MemoryStore;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    async fn seed(store: &MemoryStore, id: i64, created_at: DateTime<Utc>, tags: &[&str], body: &str) {
        let names: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        let tags = store.get_or_create_tags(&names).await.unwrap();
        store
            .upsert_question(QuestionRecord {
                id,
                title: format!("Question {id}"),
                body: body.into(),
                created_at,
                score: 0,
                view_count: 0,
                answer_count: 0,
                is_answered: false,
                owner: None,
                tags: tags.iter().map(|t| t.id).collect(),
            })
            .await
            .unwrap();
    }

    async fn analyzer() -> (Arc<MemoryStore>, Analyzer) {
        let store = Arc::new(MemoryStore::new());
        seed(&store, 1, at(2024, 1, 3), &["x", "y"], "race condition").await;
        seed(&store, 2, at(2024, 1, 20), &["x"], "thread pool").await;
        seed(&store, 3, at(2024, 3, 5), &["x", "y", "multithreading"], "race condition deadlock").await;
        seed(&store, 4, at(2024, 3, 6), &["z"], "unrelated").await;
        let analyzer = Analyzer::new(store.clone(), AnalysisConfig::default());
        (store, analyzer)
    }

    #[tokio::test]
    async fn test_topic_trend() {
        let (_, analyzer) = analyzer().await;
        let series = analyzer
            .topic_trend("X", at(2024, 1, 1), at(2024, 4, 1))
            .await
            .unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series["2024-01"], 2);
        assert_eq!(series["2024-03"], 1);
    }

    #[tokio::test]
    async fn test_topic_trend_rejects_inverted_range() {
        let (_, analyzer) = analyzer().await;
        let err = analyzer
            .topic_trend("x", at(2024, 4, 1), at(2024, 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_top_tag_pairs() {
        let (_, analyzer) = analyzer().await;
        let pairs = analyzer.top_tag_pairs(1).await.unwrap();
        assert_eq!(pairs, vec![RankedCount::new("x + y", 2)]);

        assert!(analyzer.top_tag_pairs(0).await.is_err());
        assert!(analyzer.top_tag_pairs(101).await.is_err());
    }

    #[tokio::test]
    async fn test_top_tags_for_month() {
        let (_, analyzer) = analyzer().await;
        let top = analyzer
            .top_tags_for_month(at(2024, 1, 31), 10)
            .await
            .unwrap();
        assert_eq!(
            top,
            vec![RankedCount::new("x", 2), RankedCount::new("y", 1)]
        );
    }

    #[tokio::test]
    async fn test_term_frequencies_use_topic_subset() {
        let (_, analyzer) = analyzer().await;
        let terms = analyzer.term_frequencies().await.unwrap();
        let labels: Vec<_> = terms.iter().map(|t| t.label.as_str()).collect();

        // Only question 3 carries the multithreading tag
        assert!(labels.contains(&"racecondition"));
        assert!(labels.contains(&"deadlock"));
        assert!(!labels.contains(&"thread_pool"));
    }

    #[tokio::test]
    async fn test_compare_solvability() {
        let (store, analyzer) = analyzer().await;
        store
            .upsert_answer(AnswerRecord {
                id: 100,
                question_id: 1,
                body: "fixed".into(),
                created_at: at(2024, 1, 4),
                score: 3,
                is_accepted: false,
                owner: None,
            })
            .await
            .unwrap();

        let report = analyzer.compare_solvability().await.unwrap();
        assert_eq!(report.solvable_count, 1);
        assert_eq!(report.hard_count, 3);
        assert_eq!(report.metrics["Answer Score"], "3.00_0.00");
    }
}

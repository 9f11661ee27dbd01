// src/pipeline/analyze.rs

//! Analytics entry points with boundary parsing.
//!
//! Inputs arrive as text (command line arguments); they are parsed and
//! validated here and rejected with [`AppError::Validation`] before any
//! store access.

use serde_json::{Value, to_value};

use crate::analysis::{Analyzer, parse_month, parse_reference_date, parse_top_n};
use crate::error::{AppError, Result};

/// One analytics query with raw, unvalidated parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisRequest {
    /// Months as `YYYY-MM`
    Trend {
        tag: String,
        start: String,
        end: String,
    },
    Pairs {
        top: String,
    },
    /// ISO date or date-time
    Monthly {
        date: String,
        top: String,
    },
    Terms,
    Solvability,
}

/// Run a query and render its result as JSON.
pub async fn run_analysis(analyzer: &Analyzer, request: &AnalysisRequest) -> Result<Value> {
    let value = match request {
        AnalysisRequest::Trend { tag, start, end } => {
            if tag.trim().is_empty() {
                return Err(AppError::validation("tag must not be empty"));
            }
            let start = parse_month(start)?;
            let end = parse_month(end)?;
            to_value(analyzer.topic_trend(tag, start, end).await?)?
        }
        AnalysisRequest::Pairs { top } => {
            let n = parse_top_n(top)?;
            to_value(analyzer.top_tag_pairs(n).await?)?
        }
        AnalysisRequest::Monthly { date, top } => {
            let at = parse_reference_date(date)?;
            let n = parse_top_n(top)?;
            to_value(analyzer.top_tags_for_month(at, n).await?)?
        }
        AnalysisRequest::Terms => to_value(analyzer.term_frequencies().await?)?,
        AnalysisRequest::Solvability => to_value(analyzer.compare_solvability().await?)?,
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::models::{AnalysisConfig, QuestionRecord};
    use crate::storage::{CorpusStore, MemoryStore};

    async fn analyzer() -> Analyzer {
        let store = Arc::new(MemoryStore::new());
        let tags = store
            .get_or_create_tags(&["java".to_string(), "streams".to_string()])
            .await
            .unwrap();
        store
            .upsert_question(QuestionRecord {
                id: 1,
                title: "Parallel stream ordering".into(),
                body: "<p>forEachOrdered is slow</p>".into(),
                created_at: Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap(),
                score: 1,
                view_count: 10,
                answer_count: 0,
                is_answered: false,
                owner: None,
                tags: tags.iter().map(|t| t.id).collect(),
            })
            .await
            .unwrap();
        Analyzer::new(store, AnalysisConfig::default())
    }

    #[tokio::test]
    async fn test_trend_request() {
        let analyzer = analyzer().await;
        let request = AnalysisRequest::Trend {
            tag: "java".into(),
            start: "2024-01".into(),
            end: "2024-03".into(),
        };

        let value = run_analysis(&analyzer, &request).await.unwrap();
        assert_eq!(value, json!({"2024-02": 1}));
    }

    #[tokio::test]
    async fn test_pairs_request() {
        let analyzer = analyzer().await;
        let value = run_analysis(&analyzer, &AnalysisRequest::Pairs { top: "5".into() })
            .await
            .unwrap();
        assert_eq!(value, json!([{"label": "java + streams", "count": 1}]));
    }

    #[tokio::test]
    async fn test_monthly_request() {
        let analyzer = analyzer().await;
        let request = AnalysisRequest::Monthly {
            date: "2024-02-20T08:00:00".into(),
            top: "1".into(),
        };
        let value = run_analysis(&analyzer, &request).await.unwrap();
        assert_eq!(value.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_parameters_are_rejected() {
        let analyzer = analyzer().await;
        let requests = [
            AnalysisRequest::Pairs { top: "0".into() },
            AnalysisRequest::Pairs { top: "101".into() },
            AnalysisRequest::Monthly {
                date: "yesterday".into(),
                top: "10".into(),
            },
            AnalysisRequest::Trend {
                tag: "java".into(),
                start: "2024-05".into(),
                end: "2024-01".into(),
            },
            AnalysisRequest::Trend {
                tag: " ".into(),
                start: "2024-01".into(),
                end: "2024-02".into(),
            },
        ];

        for request in &requests {
            let err = run_analysis(&analyzer, request).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{request:?}");
        }
    }

    #[tokio::test]
    async fn test_solvability_request_has_five_metrics() {
        let analyzer = analyzer().await;
        let value = run_analysis(&analyzer, &AnalysisRequest::Solvability)
            .await
            .unwrap();
        assert_eq!(value["metrics"].as_object().unwrap().len(), 5);
        assert_eq!(value["hard_count"], 1);
    }
}

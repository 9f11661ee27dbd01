//! Solvable versus hard questions.
//!
//! A question is solvable when any answer is accepted or scored above
//! zero; every other question is hard. Both groups are described by the
//! same five metrics, rendered as `"solvable_hard"`.

use std::collections::{BTreeMap, HashSet};

use crate::analysis::monthly::top_tags_by_month;
use crate::models::{MetricValue, QuestionView, SolvabilityReport, format_pair};

pub const TRENDINESS: &str = "Trendiness";
pub const COMPLEXITY: &str = "Complexity";
pub const DETAIL: &str = "Detail";
pub const REPUTATION: &str = "Reputation";
pub const ANSWER_SCORE: &str = "Answer Score";

/// Knobs of the trendiness metric.
#[derive(Debug, Clone, Copy)]
pub struct TrendinessRule {
    /// Size of each month's top tag set
    pub top_tags: usize,
    /// Tags a question must share with that set
    pub min_shared: usize,
}

impl Default for TrendinessRule {
    fn default() -> Self {
        Self {
            top_tags: 10,
            min_shared: 2,
        }
    }
}

pub fn is_solvable(question: &QuestionView) -> bool {
    question
        .answers
        .iter()
        .any(|a| a.is_accepted || a.score > 0)
}

/// Split into `(solvable, hard)`; every question lands in exactly one.
pub fn partition(questions: &[QuestionView]) -> (Vec<&QuestionView>, Vec<&QuestionView>) {
    questions.iter().partition(|q| is_solvable(q))
}

/// Questions sharing at least `min_shared` tags with their month's top set.
pub fn trendiness(
    questions: &[&QuestionView],
    top_by_month: &BTreeMap<String, HashSet<String>>,
    min_shared: usize,
) -> u64 {
    questions
        .iter()
        .filter(|q| {
            top_by_month.get(&q.month_label()).is_some_and(|top| {
                q.tags.iter().filter(|t| top.contains(*t)).count() >= min_shared
            })
        })
        .count() as u64
}

fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

pub fn average_tag_count(questions: &[&QuestionView]) -> f64 {
    mean(questions.iter().map(|q| q.tags.len() as f64))
}

pub fn average_word_count(questions: &[&QuestionView]) -> f64 {
    mean(questions.iter().map(|q| q.body_word_count() as f64))
}

/// Mean over answered questions of the mean reputation of their answerers.
///
/// An unknown answerer counts as zero reputation. Questions whose mean is
/// zero, including those where no answerer is known, are left out.
pub fn average_answerer_reputation(questions: &[&QuestionView]) -> f64 {
    mean(questions.iter().filter_map(|q| {
        if q.answers.is_empty() {
            return None;
        }
        let per_question = mean(
            q.answers
                .iter()
                .map(|a| a.answerer.as_ref().map_or(0.0, |o| o.reputation as f64)),
        );
        Some(per_question).filter(|avg| *avg != 0.0)
    }))
}

/// Mean over answered questions of their mean answer score; zero means are left out.
pub fn average_answer_score(questions: &[&QuestionView]) -> f64 {
    mean(questions.iter().filter_map(|q| {
        if q.answers.is_empty() {
            return None;
        }
        Some(mean(q.answers.iter().map(|a| a.score as f64))).filter(|avg| *avg != 0.0)
    }))
}

/// Compare the two groups. Trendiness uses month top sets over the whole input.
pub fn compare(questions: &[QuestionView], rule: TrendinessRule) -> SolvabilityReport {
    let (solvable, hard) = partition(questions);
    let top_by_month = top_tags_by_month(questions, rule.top_tags);

    let mut metrics = BTreeMap::new();
    metrics.insert(
        TRENDINESS.to_string(),
        format_pair(
            MetricValue::Count(trendiness(&solvable, &top_by_month, rule.min_shared)),
            MetricValue::Count(trendiness(&hard, &top_by_month, rule.min_shared)),
        ),
    );

    let means: [(&str, fn(&[&QuestionView]) -> f64); 4] = [
        (COMPLEXITY, average_tag_count),
        (DETAIL, average_word_count),
        (REPUTATION, average_answerer_reputation),
        (ANSWER_SCORE, average_answer_score),
    ];
    for (name, metric) in means {
        metrics.insert(
            name.to_string(),
            format_pair(
                MetricValue::Mean(metric(&solvable)),
                MetricValue::Mean(metric(&hard)),
            ),
        );
    }

    SolvabilityReport {
        solvable_count: solvable.len(),
        hard_count: hard.len(),
        metrics,
    }
}

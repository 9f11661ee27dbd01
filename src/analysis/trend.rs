//! Topic trend: questions per calendar month.

use crate::models::{QuestionView, TrendSeries};

/// Count questions per `YYYY-MM` of their creation date.
pub fn monthly_counts(questions: &[QuestionView]) -> TrendSeries {
    let mut series = TrendSeries::new();
    for question in questions {
        *series.entry(question.month_label()).or_insert(0) += 1;
    }
    series
}

//! Tag co-occurrence: how often two tags appear on the same question.

use crate::analysis::tally::Tally;
use crate::models::{QuestionView, RankedCount};

/// Canonical label of an unordered tag pair; `a` sorts before `b`.
pub fn pair_label(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a} + {b}")
    } else {
        format!("{b} + {a}")
    }
}

/// Tally every unordered tag pair across `questions`.
///
/// A question with `k` distinct tags contributes `k * (k - 1) / 2` pairs.
pub fn pair_tally(questions: &[QuestionView]) -> Tally {
    let mut tally = Tally::new();
    for question in questions {
        let mut tags: Vec<&str> = question.tags.iter().map(String::as_str).collect();
        tags.sort_unstable();
        tags.dedup();

        for (i, first) in tags.iter().enumerate() {
            for second in &tags[i + 1..] {
                tally.add(&pair_label(first, second));
            }
        }
    }
    tally
}

/// The `n` most frequent pairs.
pub fn top_pairs(questions: &[QuestionView], n: usize) -> Vec<RankedCount> {
    pair_tally(questions).top(n)
}

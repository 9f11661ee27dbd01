//! Most frequent tags within one calendar month.

use std::collections::{BTreeMap, HashSet};

use crate::analysis::tally::Tally;
use crate::models::{QuestionView, RankedCount};

/// Tally each distinct tag once per question.
pub fn tag_tally(questions: &[QuestionView]) -> Tally {
    tally_tags(questions)
}

fn tally_tags<'a>(questions: impl IntoIterator<Item = &'a QuestionView>) -> Tally {
    let mut tally = Tally::new();
    for question in questions {
        let mut seen = HashSet::new();
        for tag in &question.tags {
            if seen.insert(tag.as_str()) {
                tally.add(tag);
            }
        }
    }
    tally
}

/// The `n` most frequent tags of `questions`.
pub fn top_tags(questions: &[QuestionView], n: usize) -> Vec<RankedCount> {
    tag_tally(questions).top(n)
}

/// Top-`n` tag names of every month present in `questions`.
pub fn top_tags_by_month(questions: &[QuestionView], n: usize) -> BTreeMap<String, HashSet<String>> {
    let mut by_month: BTreeMap<String, Vec<&QuestionView>> = BTreeMap::new();
    for question in questions {
        by_month.entry(question.month_label()).or_default().push(question);
    }

    by_month
        .into_iter()
        .map(|(month, members)| {
            let names = tally_tags(members)
                .top(n)
                .into_iter()
                .map(|r| r.label)
                .collect();
            (month, names)
        })
        .collect()
}

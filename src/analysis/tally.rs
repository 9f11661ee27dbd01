//! Insertion-ordered counter shared by the ranking analyses.

use std::collections::HashMap;

use crate::models::RankedCount;

/// Counts labels while remembering the order they were first seen in.
#[derive(Debug, Default)]
pub struct Tally {
    index: HashMap<String, usize>,
    entries: Vec<(String, usize)>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, label: &str) {
        match self.index.get(label) {
            Some(&slot) => self.entries[slot].1 += 1,
            None => {
                self.index.insert(label.to_string(), self.entries.len());
                self.entries.push((label.to_string(), 1));
            }
        }
    }

    /// Descending by count; equal counts keep first-seen order.
    pub fn ranked(self) -> Vec<RankedCount> {
        let mut entries = self.entries;
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries
            .into_iter()
            .map(|(label, count)| RankedCount::new(label, count))
            .collect()
    }

    /// The first `limit` entries of [`Tally::ranked`].
    pub fn top(self, limit: usize) -> Vec<RankedCount> {
        let mut ranked = self.ranked();
        ranked.truncate(limit);
        ranked
    }
}

//! Term frequency over a topic subset.
//!
//! Text goes through a fixed pipeline before counting:
//!
//! ```text
//! title + " " + body ─▶ lowercase ─▶ protect phrases ─▶ strip markup
//!                   ─▶ non [a-z0-9_] to space ─▶ split ─▶ drop short/stop words
//! ```

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::analysis::tally::Tally;
use crate::models::{QuestionView, RankedCount};

/// Multi-word terms rewritten into single tokens before tokenization.
pub const PROTECTED_PHRASES: [(&str, &str); 10] = [
    ("race condition", "racecondition"),
    ("dead lock", "deadlock"),
    ("memory leak", "memory_leak"),
    ("thread safe", "thread_safe"),
    ("thread pool", "thread_pool"),
    ("context switch", "context_switch"),
    ("concurrent modification", "concurrent_modification"),
    ("wait notify", "wait_notify"),
    ("count down latch", "count_down_latch"),
    ("atomic integer", "atomic_integer"),
];

/// English filler, Java keywords and topic noise.
pub const STOP_WORDS: &[&str] = &[
    "the", "is", "are", "was", "were", "and", "or", "but", "if", "of", "to", "in", "on", "at",
    "for", "with", "about", "by", "as", "it", "this", "that", "these", "those", "can", "could",
    "would", "should", "have", "has", "had", "do", "does", "did", "not", "so", "be", "been",
    // language keywords
    "public", "private", "protected", "class", "interface", "void", "return", "static", "final",
    "new", "import", "package", "try", "catch", "throw", "throws", "extends", "implements",
    // topic noise
    "code", "java", "problem", "issue", "question", "want", "need", "help", "using", "example",
    "output", "error", "exception", "run", "running", "thread", "threads",
];

/// Tokens this short or shorter are dropped.
pub const MIN_TOKEN_LEN: usize = 2;

struct Patterns {
    markup: Regex,
    non_word: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(Patterns {
                markup: Regex::new(r"<[^>]*>").ok()?,
                non_word: Regex::new(r"[^a-z0-9_]").ok()?,
            })
        })
        .as_ref()
}

fn stop_words() -> &'static HashSet<&'static str> {
    static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// Rewrite protected phrases into their single-token form.
pub fn protect_phrases(text: &str) -> String {
    PROTECTED_PHRASES
        .iter()
        .fold(text.to_string(), |acc, (phrase, token)| {
            if acc.contains(phrase) {
                acc.replace(phrase, token)
            } else {
                acc
            }
        })
}

/// Lowercase, protect phrases, strip markup and punctuation.
pub fn clean_text(title: &str, body: &str) -> String {
    let text = protect_phrases(&format!("{title} {body}").to_lowercase());
    match patterns() {
        Some(p) => {
            let without_markup = p.markup.replace_all(&text, " ");
            p.non_word.replace_all(&without_markup, " ").into_owned()
        }
        None => text,
    }
}

/// Whether a cleaned token is worth counting.
pub fn is_significant(token: &str) -> bool {
    token.len() > MIN_TOKEN_LEN && !stop_words().contains(token)
}

/// Count significant tokens across `questions`, most frequent first.
pub fn term_frequencies(questions: &[QuestionView], limit: usize) -> Vec<RankedCount> {
    let mut tally = Tally::new();
    for question in questions {
        let text = clean_text(&question.title, &question.body);
        for token in text.split_whitespace().filter(|t| is_significant(t)) {
            tally.add(token);
        }
    }
    tally.top(limit)
}

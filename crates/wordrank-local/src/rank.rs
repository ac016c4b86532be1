//! Word frequency ranking with stop-word exclusion.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use wordrank_core::RankedWord;

/// Common English function words excluded from every ranking.
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    "the", "and", "is", "to", "in", "it", "that", "of", "a", "an", "for", "on", "with", "as",
    "by", "at", "this", "be", "or", "not", "are", "from", "was", "were", "but",
];

/// Default stop words plus caller-supplied ones, lowercased.
#[derive(Debug, Clone)]
pub struct StopWordSet {
    words: HashSet<String>,
}

impl StopWordSet {
    pub fn new<S: AsRef<str>>(additional: &[S]) -> Self {
        let words = DEFAULT_STOP_WORDS
            .iter()
            .map(|w| w.to_string())
            .chain(additional.iter().map(|w| w.as_ref().to_lowercase()))
            .collect();
        Self { words }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for StopWordSet {
    fn default() -> Self {
        Self::new::<&str>(&[])
    }
}

/// Keep ASCII letters and whitespace, drop everything else, lowercase, trim.
///
/// Punctuation is deleted rather than turned into a separator, so `don't` becomes `dont`.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphabetic() || c.is_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Occurrence counts for every non-stop-word token.
pub fn count_words(text: &str, stop: &StopWordSet) -> HashMap<String, u64> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for token in normalize(text).split_whitespace() {
        if stop.contains(token) {
            continue;
        }
        *counts.entry(token.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Count descending; equal counts fall back to the word, ascending.
fn by_rank(a: &RankedWord, b: &RankedWord) -> Ordering {
    b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word))
}

/// Top `n` words of `text`, excluding default and `additional_stop_words`.
pub fn rank<S: AsRef<str>>(text: &str, n: usize, additional_stop_words: &[S]) -> Vec<RankedWord> {
    if n == 0 {
        return Vec::new();
    }
    let stop = StopWordSet::new(additional_stop_words);
    let mut ranked: Vec<RankedWord> = count_words(text, &stop)
        .into_iter()
        .map(|(word, count)| RankedWord { word, count })
        .collect();
    ranked.sort_by(by_rank);
    ranked.truncate(n);
    ranked
}

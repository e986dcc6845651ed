//! Language model contract and a table-backed n-gram model.

use std::collections::HashMap;
use std::fmt;

/// Ordered word history, oldest word first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct WordSequence(Vec<String>);

impl WordSequence {
    pub fn new(words: Vec<String>) -> Self {
        Self(words)
    }

    pub fn words(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keeps at most the last `max_depth` words.
    pub fn trim(&self, max_depth: usize) -> WordSequence {
        let skip = self.0.len().saturating_sub(max_depth);
        WordSequence(self.0[skip..].to_vec())
    }

    /// Drops the oldest word.
    pub fn older(&self) -> WordSequence {
        WordSequence(self.0.iter().skip(1).cloned().collect())
    }
}

impl fmt::Display for WordSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

pub trait LanguageModel {
    /// Longest history the model conditions on, including the predicted word.
    fn max_depth(&self) -> usize;

    /// Log probability of the last word of `sequence` given the words
    /// before it.
    fn probability(&self, sequence: &WordSequence) -> f64;
}

/// N-gram table with backoff to progressively shorter histories. Unknown
/// unigrams get `floor`.
#[derive(Debug, Clone)]
pub struct NgramModel {
    entries: HashMap<WordSequence, f64>,
    max_depth: usize,
    floor: f64,
}

impl NgramModel {
    pub fn new(floor: f64) -> Self {
        Self {
            entries: HashMap::new(),
            max_depth: 1,
            floor,
        }
    }

    /// Stores the log probability of `words` (history then predicted word).
    pub fn insert(&mut self, words: &[&str], log_probability: f64) {
        let seq = WordSequence::new(words.iter().map(|w| w.to_string()).collect());
        self.max_depth = self.max_depth.max(seq.len());
        self.entries.insert(seq, log_probability);
    }
}

impl LanguageModel for NgramModel {
    fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn probability(&self, sequence: &WordSequence) -> f64 {
        let mut seq = sequence.trim(self.max_depth);
        while !seq.is_empty() {
            if let Some(&p) = self.entries.get(&seq) {
                return p;
            }
            seq = seq.older();
        }
        self.floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(words: &[&str]) -> WordSequence {
        WordSequence::new(words.iter().map(|w| w.to_string()).collect())
    }

    #[test]
    fn exact_match_then_backoff() {
        let mut lm = NgramModel::new(-100.0);
        lm.insert(&["yes"], -2.0);
        lm.insert(&["<s>", "yes"], -1.0);
        assert_eq!(lm.max_depth(), 2);
        assert_eq!(lm.probability(&seq(&["<s>", "yes"])), -1.0);
        assert_eq!(lm.probability(&seq(&["no", "yes"])), -2.0);
        assert_eq!(lm.probability(&seq(&["a", "b", "<s>", "yes"])), -1.0);
        assert_eq!(lm.probability(&seq(&["maybe"])), -100.0);
    }

    #[test]
    fn trim_keeps_newest_words() {
        let s = seq(&["a", "b", "c"]);
        assert_eq!(s.trim(2), seq(&["b", "c"]));
        assert_eq!(s.trim(5), s);
        assert_eq!(s.to_string(), "a b c");
    }
}

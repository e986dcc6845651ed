//! Confusion networks.
//!
//! A [`Sausage`] is a sequence of slots; each slot is a [`ConfusionSet`]
//! of competing words keyed by their log posterior.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use hark_core::linguist::is_filler_spelling;
use hark_core::log_math::LOG_ONE;
use hark_core::LogMath;
use tracing::debug;

/// Placeholder for the probability that a slot holds no word at all.
pub const NOOP_WORD: &str = "<noop>";

/// Log posterior used as an ordered map key.
#[derive(Debug, Clone, Copy)]
struct Posterior(f64);

impl PartialEq for Posterior {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Posterior {}

impl PartialOrd for Posterior {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Posterior {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Words competing for one slot, grouped by log posterior.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfusionSet {
    words: BTreeMap<Posterior, BTreeSet<String>>,
}

impl ConfusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_word_hypothesis(&mut self, word: impl Into<String>, posterior: f64) {
        self.words
            .entry(Posterior(posterior))
            .or_default()
            .insert(word.into());
    }

    /// Words whose log posterior is exactly `posterior`.
    pub fn word_set(&self, posterior: f64) -> Option<&BTreeSet<String>> {
        self.words.get(&Posterior(posterior))
    }

    pub fn best_hypothesis_set(&self) -> Option<&BTreeSet<String>> {
        self.words.last_key_value().map(|(_, words)| words)
    }

    /// A best-scoring word; ties resolve alphabetically.
    pub fn best_hypothesis(&self) -> Option<&str> {
        self.best_hypothesis_set()
            .and_then(|words| words.first())
            .map(String::as_str)
    }

    pub fn best_posterior(&self) -> Option<f64> {
        self.words.last_key_value().map(|(p, _)| p.0)
    }

    pub fn contains_word(&self, word: &str) -> bool {
        self.posterior_of(word).is_some()
    }

    pub fn contains_filler(&self) -> bool {
        self.words
            .values()
            .flatten()
            .any(|w| is_filler_spelling(w))
    }

    pub fn posterior_of(&self, word: &str) -> Option<f64> {
        self.words
            .iter()
            .find(|(_, words)| words.contains(word))
            .map(|(p, _)| p.0)
    }

    /// `(log posterior, word)` pairs, best first.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &str)> {
        self.words
            .iter()
            .rev()
            .flat_map(|(p, words)| words.iter().map(move |w| (p.0, w.as_str())))
    }

    /// Number of words in the slot.
    pub fn len(&self) -> usize {
        self.words.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Log of the summed linear posteriors.
    pub fn total(&self, log_math: &LogMath) -> f64 {
        self.iter()
            .fold(log_math.log_zero(), |sum, (p, _)| log_math.add(sum, p))
    }
}

impl fmt::Display for ConfusionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (p, words) in &self.words {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            let joined: Vec<&str> = words.iter().map(String::as_str).collect();
            write!(f, "{}:{}", p.0, joined.join(","))?;
        }
        Ok(())
    }
}

/// A confusion network: one [`ConfusionSet`] per slot, in time order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sausage {
    slots: Vec<ConfusionSet>,
}

impl Sausage {
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![ConfusionSet::new(); size],
        }
    }

    pub fn add_word_hypothesis(&mut self, position: usize, word: impl Into<String>, posterior: f64) {
        self.slots[position].add_word_hypothesis(word, posterior);
    }

    /// Makes every slot a proper distribution. A slot whose mass falls
    /// short of one by more than `epsilon` (linear) gets the missing mass
    /// as a [`NOOP_WORD`] hypothesis; otherwise its posteriors are
    /// rescaled to sum to one.
    pub fn fill_in_blanks(&mut self, log_math: &LogMath, epsilon: f64) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let sum = slot.total(log_math);
            if log_math.log_to_linear(sum) < 1.0 - epsilon {
                let remainder = log_math.subtract(LOG_ONE, sum);
                debug!(slot = index, remainder, "adding noop");
                slot.add_word_hypothesis(NOOP_WORD, remainder);
            } else {
                let mut rescaled = ConfusionSet::new();
                for (p, word) in slot.iter() {
                    rescaled.add_word_hypothesis(word, p - sum);
                }
                *slot = rescaled;
            }
        }
    }

    /// Best words of every slot; tied words are joined with `/`.
    pub fn best_hypothesis_string(&self) -> String {
        self.slots
            .iter()
            .map(|slot| {
                slot.best_hypothesis_set()
                    .map(|words| words.iter().map(String::as_str).collect::<Vec<_>>().join("/"))
                    .unwrap_or_default()
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Best word per slot, skipping fillers and empty slots.
    pub fn best_words_no_fillers(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter_map(ConfusionSet::best_hypothesis)
            .filter(|w| !is_filler_spelling(w))
            .collect()
    }

    pub fn best_word_hypothesis(&self, position: usize) -> Option<&BTreeSet<String>> {
        self.slots.get(position)?.best_hypothesis_set()
    }

    pub fn best_word_hypothesis_posterior(&self, position: usize) -> Option<f64> {
        self.slots.get(position)?.best_posterior()
    }

    pub fn confusion_set(&self, position: usize) -> Option<&ConfusionSet> {
        self.slots.get(position)
    }

    pub fn confusion_sets(&self) -> &[ConfusionSet] {
        &self.slots
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_math() -> LogMath {
        LogMath::new(std::f64::consts::E)
    }

    fn linear_total(set: &ConfusionSet, lm: &LogMath) -> f64 {
        set.iter().map(|(p, _)| lm.log_to_linear(p)).sum()
    }

    #[test]
    fn best_hypothesis_is_highest_posterior() {
        let mut set = ConfusionSet::new();
        set.add_word_hypothesis("no", -2.0);
        set.add_word_hypothesis("yes", -0.5);
        set.add_word_hypothesis("yeah", -0.5);
        assert_eq!(set.best_posterior(), Some(-0.5));
        assert_eq!(set.best_hypothesis(), Some("yeah"));
        assert_eq!(set.best_hypothesis_set().unwrap().len(), 2);
        assert_eq!(set.word_set(-2.0).unwrap().first().map(String::as_str), Some("no"));
        assert_eq!(set.posterior_of("no"), Some(-2.0));
        assert!(set.contains_word("yes"));
        assert!(!set.contains_word("maybe"));
        assert!(!set.contains_filler());
        set.add_word_hypothesis("<sil>", -9.0);
        assert!(set.contains_filler());
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn iteration_is_best_first() {
        let mut set = ConfusionSet::new();
        set.add_word_hypothesis("b", -3.0);
        set.add_word_hypothesis("a", -1.0);
        let order: Vec<&str> = set.iter().map(|(_, w)| w).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn missing_mass_becomes_noop() {
        let lm = log_math();
        let mut sausage = Sausage::new(1);
        sausage.add_word_hypothesis(0, "a", lm.linear_to_log(0.5));
        sausage.add_word_hypothesis(0, "b", lm.linear_to_log(0.2));
        sausage.fill_in_blanks(&lm, 1e-4);
        let slot = sausage.confusion_set(0).unwrap();
        let noop = slot.posterior_of(NOOP_WORD).unwrap();
        assert!((lm.log_to_linear(noop) - 0.3).abs() < 1e-9);
        assert!((linear_total(slot, &lm) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn near_complete_slots_are_rescaled() {
        let lm = log_math();
        let mut sausage = Sausage::new(1);
        sausage.add_word_hypothesis(0, "a", lm.linear_to_log(0.6));
        sausage.add_word_hypothesis(0, "b", lm.linear_to_log(0.39999));
        sausage.fill_in_blanks(&lm, 1e-4);
        let slot = sausage.confusion_set(0).unwrap();
        assert!(!slot.contains_word(NOOP_WORD));
        assert!((linear_total(slot, &lm) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_slot_is_all_noop() {
        let lm = log_math();
        let mut sausage = Sausage::new(2);
        sausage.add_word_hypothesis(1, "x", LOG_ONE);
        sausage.fill_in_blanks(&lm, 1e-4);
        assert_eq!(sausage.best_hypothesis_string(), "<noop> x");
        assert_eq!(sausage.best_word_hypothesis_posterior(0), Some(LOG_ONE));
        assert_eq!(sausage.best_words_no_fillers(), vec!["x"]);
    }

    #[test]
    fn ties_are_joined_in_the_hypothesis_string() {
        let mut sausage = Sausage::new(2);
        sausage.add_word_hypothesis(0, "to", -1.0);
        sausage.add_word_hypothesis(0, "two", -1.0);
        sausage.add_word_hypothesis(1, "go", -0.1);
        assert_eq!(sausage.best_hypothesis_string(), "to/two go");
        assert_eq!(sausage.size(), 2);
        assert!(sausage.best_word_hypothesis(5).is_none());
    }
}

//! Word confidences from lattice posteriors.

use hark_core::search::SearchResult;
use hark_core::settings::Settings;
use hark_core::token::word_predecessor;
use tracing::{debug, debug_span, warn};

use crate::error::LatticeError;
use crate::lattice::Lattice;
use crate::optimizer::LatticeOptimizer;
use crate::sausage::Sausage;
use crate::sausage_maker::{SausageMaker, DEFAULT_BLANK_EPSILON};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceConfig {
    /// Acoustic scores are divided by this before posteriors are computed.
    pub language_weight: f64,
    /// Linear mass a sausage slot may lack before a `<noop>` is added.
    pub blank_epsilon: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            language_weight: 1.0,
            blank_epsilon: DEFAULT_BLANK_EPSILON,
        }
    }
}

impl ConfidenceConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            language_weight: settings.lattice.language_weight,
            blank_epsilon: settings.lattice.blank_epsilon,
        }
    }
}

/// A recognised word and the sausage slot it was found in.
#[derive(Debug, Clone, PartialEq)]
pub struct WordConfidence {
    pub word: String,
    pub slot: usize,
    /// Log posterior of the word in its slot.
    pub posterior: f64,
    /// Linear posterior.
    pub confidence: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ConfidenceResult {
    pub sausage: Sausage,
    /// Words of the best path, in order.
    pub best_path: Vec<WordConfidence>,
}

impl ConfidenceResult {
    /// Words of the best path joined by spaces, fillers included.
    pub fn best_hypothesis(&self) -> String {
        self.best_path
            .iter()
            .map(|w| w.word.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Maximum a posteriori confidence: the best path of the search is
/// aligned to the confusion network built from the result's lattice, and
/// each of its words is scored with its slot posterior.
#[derive(Debug, Clone, Default)]
pub struct MapConfidenceScorer {
    config: ConfidenceConfig,
}

impl MapConfidenceScorer {
    pub fn new(config: ConfidenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConfidenceConfig {
        &self.config
    }

    /// Builds, optimises and scores the lattice of `result`. A result
    /// without a finished path yields an empty lattice.
    pub fn lattice(&self, result: &SearchResult) -> Result<Lattice, LatticeError> {
        let mut lattice = Lattice::from_result(result);
        if !lattice.has_path() {
            return Ok(lattice);
        }
        LatticeOptimizer::new(&mut lattice).optimize();
        lattice.compute_node_posteriors(self.config.language_weight)?;
        Ok(lattice)
    }

    pub fn make_sausage(&self, lattice: &Lattice) -> Sausage {
        if !lattice.has_path() {
            return Sausage::default();
        }
        SausageMaker::new(lattice)
            .with_blank_epsilon(self.config.blank_epsilon)
            .make_sausage()
    }

    pub fn score(&self, result: &SearchResult) -> Result<ConfidenceResult, LatticeError> {
        let lattice = self.lattice(result)?;
        Ok(self.score_lattice(result, &lattice))
    }

    /// Scores the best path of `result` against a lattice already built
    /// from it by [`MapConfidenceScorer::lattice`].
    pub fn score_lattice(&self, result: &SearchResult, lattice: &Lattice) -> ConfidenceResult {
        let _span = debug_span!("map_confidence", frame = result.frame_number()).entered();
        let sausage = self.make_sausage(lattice);
        let best_path = align(result, &sausage);
        debug!(
            slots = sausage.size(),
            words = best_path.len(),
            best = %sausage.best_hypothesis_string()
        );
        ConfidenceResult { sausage, best_path }
    }
}

/// Walks the best path backwards, matching each word to the latest slot
/// at or before the previous match that contains it.
fn align(result: &SearchResult, sausage: &Sausage) -> Vec<WordConfidence> {
    let log_math = result.log_math();
    let mut path = Vec::new();
    let mut slot = sausage.size().checked_sub(1);
    let mut current = result.best_token().and_then(word_predecessor);
    while let Some(token) = current {
        let Some(word) = token.word().map(|w| w.spelling().to_string()) else {
            break;
        };
        let found = slot.and_then(|last| {
            (0..=last).rev().find_map(|s| {
                let posterior = sausage.confusion_set(s)?.posterior_of(&word)?;
                Some((s, posterior))
            })
        });
        match found {
            Some((s, posterior)) => {
                path.push(WordConfidence {
                    word,
                    slot: s,
                    posterior,
                    confidence: log_math.log_to_linear(posterior),
                });
                slot = s.checked_sub(1);
            }
            None => warn!(word = %word, slot = ?slot, "word not found in the sausage"),
        }
        current = token.predecessor().and_then(word_predecessor);
    }
    path.reverse();
    path
}

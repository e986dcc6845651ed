use serde::{Deserialize, Serialize};

use hark_core::search::SearchError;
use hark_lattice::{ConfidenceResult, ConfusionSet, LatticeError};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("search failed: {0}")]
    Search(#[from] SearchError),
    #[error("lattice error: {0}")]
    Lattice(#[from] LatticeError),
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Records (plain values handed to callers and serialised as JSON)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordReport {
    pub word: String,
    /// Sausage slot the word was aligned to.
    pub slot: usize,
    /// Log posterior in the recogniser's log base.
    pub posterior: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisReport {
    pub word: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionReport {
    /// Best final word sequence without fillers.
    pub hypothesis: String,
    pub frames: usize,
    pub is_final: bool,
    pub lattice_nodes: usize,
    pub lattice_edges: usize,
    /// Words of the best path, in order.
    pub words: Vec<WordReport>,
    /// Competing words per sausage slot, best first.
    pub slots: Vec<Vec<HypothesisReport>>,
}

impl WordReport {
    pub(crate) fn from_confidence(confidence: &ConfidenceResult) -> Vec<Self> {
        confidence
            .best_path
            .iter()
            .map(|w| Self {
                word: w.word.clone(),
                slot: w.slot,
                posterior: w.posterior,
                confidence: w.confidence,
            })
            .collect()
    }
}

impl HypothesisReport {
    pub(crate) fn from_slot(slot: &ConfusionSet, to_linear: impl Fn(f64) -> f64) -> Vec<Self> {
        slot.iter()
            .map(|(posterior, word)| Self {
                word: word.to_string(),
                confidence: to_linear(posterior),
            })
            .collect()
    }
}

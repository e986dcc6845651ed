//! The search-state graph the decoder walks.
//!
//! A [`Linguist`] hands out the initial [`SearchState`]; every state
//! enumerates its successors as [`SearchStateArc`]s carrying log-domain
//! language, acoustic (transition) and insertion probabilities. Emitting
//! states consume one frame of input each; non-emitting states are
//! expanded within the current frame.

mod word_graph;

use std::fmt;
use std::rc::Rc;

pub use word_graph::{WordGraph, WordGraphConfig, WordGraphLinguist};

pub const SENTENCE_START: &str = "<s>";
pub const SENTENCE_END: &str = "</s>";
pub const SILENCE: &str = "<sil>";

pub type StateRef = Rc<dyn SearchState>;

/// Category of a search state, used to bucket non-emitting expansion and
/// to colour graph dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateKind(&'static str);

impl StateKind {
    pub const WORD: StateKind = StateKind("word");
    pub const UNIT: StateKind = StateKind("unit");
    pub const HMM: StateKind = StateKind("hmm");

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

pub trait SearchState: fmt::Debug {
    /// Identifier unique among the states of one graph. Two states with
    /// the same id are the same state for Viterbi comparisons.
    fn id(&self) -> usize;

    fn kind(&self) -> StateKind;

    fn is_emitting(&self) -> bool;

    fn is_final(&self) -> bool;

    fn successors(&self) -> Vec<SearchStateArc>;

    /// The word this state completes, for word states.
    fn word(&self) -> Option<&Word> {
        None
    }

    /// Name used by scorers to look up acoustic scores and by dumps.
    fn label(&self) -> String;
}

/// A transition to `state`.
#[derive(Clone)]
pub struct SearchStateArc {
    pub state: StateRef,
    pub language_probability: f64,
    pub acoustic_probability: f64,
    pub insertion_probability: f64,
}

impl SearchStateArc {
    pub fn new(
        state: StateRef,
        language_probability: f64,
        acoustic_probability: f64,
        insertion_probability: f64,
    ) -> Self {
        Self {
            state,
            language_probability,
            acoustic_probability,
            insertion_probability,
        }
    }

    /// Combined log probability of taking this arc.
    pub fn probability(&self) -> f64 {
        self.language_probability + self.acoustic_probability + self.insertion_probability
    }
}

impl fmt::Debug for SearchStateArc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchStateArc")
            .field("state", &self.state.label())
            .field("lm", &self.language_probability)
            .field("ac", &self.acoustic_probability)
            .field("ins", &self.insertion_probability)
            .finish()
    }
}

/// A dictionary word and its pronunciation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Word {
    spelling: String,
    units: Vec<String>,
    filler: bool,
}

impl Word {
    /// Sentence markers, `<sil>` and `++noise++`-style spellings are fillers.
    pub fn new(spelling: impl Into<String>, units: Vec<String>) -> Self {
        let spelling = spelling.into();
        let filler = is_filler_spelling(&spelling);
        Self {
            spelling,
            units,
            filler,
        }
    }

    pub fn from_units(spelling: &str, units: &[&str]) -> Self {
        Self::new(spelling, units.iter().map(|u| u.to_string()).collect())
    }

    pub fn spelling(&self) -> &str {
        &self.spelling
    }

    pub fn units(&self) -> &[String] {
        &self.units
    }

    pub fn is_filler(&self) -> bool {
        self.filler
    }

    pub fn is_sentence_start(&self) -> bool {
        self.spelling == SENTENCE_START
    }

    pub fn is_sentence_end(&self) -> bool {
        self.spelling == SENTENCE_END
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spelling)
    }
}

pub fn is_filler_spelling(spelling: &str) -> bool {
    (spelling.starts_with('<') && spelling.ends_with('>'))
        || (spelling.starts_with("++") && spelling.ends_with("++"))
}

/// Source of the search-state graph for one recognition.
pub trait Linguist {
    fn initial_state(&self) -> StateRef;

    /// Categories of states in topological order for bucketed expansion.
    /// The last entry is the emitting category.
    fn search_state_order(&self) -> Option<Vec<StateKind>> {
        None
    }

    fn start(&mut self) {}

    fn stop(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filler_detection() {
        assert!(Word::from_units("<s>", &[]).is_filler());
        assert!(Word::from_units("</s>", &[]).is_filler());
        assert!(Word::from_units("<sil>", &["SIL"]).is_filler());
        assert!(Word::from_units("++breath++", &["BR"]).is_filler());
        assert!(!Word::from_units("yes", &["Y", "EH", "S"]).is_filler());
    }

    #[test]
    fn sentence_markers() {
        assert!(Word::from_units(SENTENCE_START, &[]).is_sentence_start());
        assert!(Word::from_units(SENTENCE_END, &[]).is_sentence_end());
    }
}

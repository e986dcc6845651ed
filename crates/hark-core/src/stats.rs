//! Search statistics, owned by the caller and injected into the
//! components that report to it.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared handle a caller hands to a search manager.
pub type SharedStats = Rc<RefCell<SearchStats>>;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SearchStats {
    /// Frames scored.
    pub frames: u64,
    /// Tokens constructed during successor expansion.
    pub tokens_created: u64,
    /// Emitting tokens handed to the scorer.
    pub tokens_scored: u64,
    /// Tokens removed by the beam during pruning.
    pub beam_pruned: u64,
    /// Candidates that lost a local comparison at an occupied state.
    pub viterbi_pruned: u64,
    /// Losing word paths kept as alternate predecessors.
    pub alternates_recorded: u64,
    /// Largest active list seen after pruning.
    pub max_active: usize,
}

impl SearchStats {
    pub fn shared() -> SharedStats {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Display for SearchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frames={} created={} scored={} beam_pruned={} viterbi_pruned={} alternates={} max_active={}",
            self.frames,
            self.tokens_created,
            self.tokens_scored,
            self.beam_pruned,
            self.viterbi_pruned,
            self.alternates_recorded,
            self.max_active
        )
    }
}

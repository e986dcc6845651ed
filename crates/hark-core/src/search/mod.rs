//! The frame loop: score, prune, grow.
//!
//! Three managers share the [`SearchManager`] contract:
//!
//! - [`SimpleBreadthFirstSearchManager`]: one flat active list, a
//!   relative word beam and optional entry pruning.
//! - [`BreadthFirstSearchManager`]: growth gated by the list's own
//!   `is_worth_growing`/`is_insertable`.
//! - [`WordPruningBreadthFirstSearchManager`]: tokens bucketed by state
//!   category through a [`SimpleActiveListManager`], with alternate
//!   hypotheses recorded for lattice construction.
//!
//! In every manager a candidate replaces the token occupying a state
//! only when its score is strictly greater; the first arrival wins ties.

pub mod active_list;
mod alternate;
mod breadth_first;
mod list_manager;
mod partitioner;
mod pruner;
mod result;
mod simple;
mod word_pruning;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::linguist::StateKind;
use crate::scorer::AcousticScorer;
use crate::stats::{SearchStats, SharedStats};
use crate::token::TokenRef;

pub use active_list::{
    ActiveList, ActiveListFactory, ActiveListKind, BeamConfig, UnknownActiveList, WordLimits,
};
pub use alternate::AlternateHypothesisManager;
pub use breadth_first::{BreadthFirstConfig, BreadthFirstSearchManager};
pub use list_manager::SimpleActiveListManager;
pub use partitioner::Partitioner;
pub use pruner::{Pruner, SimplePruner};
pub use result::SearchResult;
pub use simple::{SimpleBreadthFirstSearchManager, SimpleSearchConfig};
pub use word_pruning::{WordPruningBreadthFirstSearchManager, WordPruningConfig};

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("recognition has not been started")]
    NotStarted,
    #[error("recognition has already been stopped")]
    AlreadyStopped,
    #[error(transparent)]
    UnknownActiveList(#[from] UnknownActiveList),
    #[error("illegal state order: {from} -> {to}")]
    StateOrder { from: String, to: String },
    #[error("state kind `{0}` is not part of the search state order")]
    UnorderedState(StateKind),
    #[error("invalid search configuration: {0}")]
    Config(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchPhase {
    #[default]
    NotStarted,
    Running,
    Stopped,
}

impl fmt::Display for SearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchPhase::NotStarted => "not started",
            SearchPhase::Running => "running",
            SearchPhase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

pub trait SearchManager {
    /// Resets the frame counter and seeds the first active list from the
    /// linguist's initial state.
    fn start_recognition(&mut self) -> Result<(), SearchError>;

    /// Processes up to `n_frames` frames. Once the scorer runs out of
    /// input the returned result is final.
    fn recognize(&mut self, n_frames: usize) -> Result<SearchResult, SearchError>;

    /// Hands shutdown to the collaborators.
    fn stop_recognition(&mut self);

    fn phase(&self) -> SearchPhase;

    /// Runs until the input is exhausted.
    fn recognize_all(&mut self) -> Result<SearchResult, SearchError> {
        loop {
            let result = self.recognize(1)?;
            if result.is_final() {
                return Ok(result);
            }
        }
    }
}

/// Rejects calls outside the `Running` phase.
pub(crate) fn ensure_running(phase: SearchPhase) -> Result<(), SearchError> {
    match phase {
        SearchPhase::Running => Ok(()),
        SearchPhase::NotStarted => Err(SearchError::NotStarted),
        SearchPhase::Stopped => Err(SearchError::AlreadyStopped),
    }
}

/// Best token per search state for the frame being grown.
pub(crate) type BestTokenMap = HashMap<usize, TokenRef>;

/// Applies `update` to the injected collector, if any.
pub(crate) fn record(stats: &Option<SharedStats>, update: impl FnOnce(&mut SearchStats)) {
    if let Some(stats) = stats {
        update(&mut stats.borrow_mut());
    }
}

/// Scores the emitting tokens of `list`. Returns `false` once the scorer
/// has no more input (or nothing was left to score).
pub(crate) fn score_list(
    scorer: &mut dyn AcousticScorer,
    list: &dyn ActiveList,
    stats: &Option<SharedStats>,
) -> bool {
    let tokens = list.tokens();
    let Some(best) = scorer.calculate_scores(&tokens) else {
        return false;
    };
    record(stats, |s| {
        s.frames += 1;
        s.tokens_scored += tokens.len() as u64;
    });
    debug!(scored = tokens.len(), best = best.score());
    true
}

/// Runs the pruner over `list` and records how many tokens the beam took.
pub(crate) fn prune_list(
    pruner: &mut dyn Pruner,
    list: Box<dyn ActiveList>,
    stats: &Option<SharedStats>,
) -> Box<dyn ActiveList> {
    let before = list.size();
    let list = pruner.prune(list);
    let after = list.size();
    debug!(before, after, threshold = list.beam_threshold());
    record(stats, |s| {
        s.beam_pruned += before.saturating_sub(after) as u64;
        s.max_active = s.max_active.max(after);
    });
    list
}

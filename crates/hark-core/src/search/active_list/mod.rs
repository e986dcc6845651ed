//! Beam-bounded token collections, one per frame.
//!
//! Every strategy keeps the same contract: after [`ActiveList::purge`]
//! a list holds at most `absolute_beam_width` tokens, each scoring at
//! least `best + relative_beam_width`. The strategies differ in where
//! they pay for that:
//!
//! - [`SimpleActiveList`]: append-only, scan on replace, full sort on purge.
//! - [`SortingActiveList`]: slot-indexed replace, full sort on purge.
//! - [`PartitionActiveList`]: slot-indexed replace, expected-linear top-k
//!   selection on purge.
//! - [`HeapActiveList`]: fixed-capacity min-heap, rejects hopeless tokens
//!   at insertion time.
//! - [`TreeActiveList`]: approximate; see its docs.
//! - [`WordActiveList`]: per-word and filler caps for word-state buckets.

mod heap;
mod partition;
mod simple;
mod sorting;
mod tree;
mod word;

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use tracing::warn;

use crate::log_math::{LogMath, LOG_ZERO};
use crate::token::{Token, TokenRef};

pub use heap::HeapActiveList;
pub use partition::PartitionActiveList;
pub use simple::SimpleActiveList;
pub use sorting::SortingActiveList;
pub use tree::TreeActiveList;
pub use word::WordActiveList;

/// A bounded, prunable bag of tokens for one frame.
///
/// Lists are not thread safe; one frame loop owns each list.
pub trait ActiveList {
    fn kind(&self) -> ActiveListKind;

    fn beam(&self) -> &BeamConfig;

    /// Cheap pre-filter: could a token with `score` survive pruning?
    fn is_insertable(&self, score: f64) -> bool;

    fn add(&mut self, token: TokenRef);

    /// Puts `new` in the slot held by `old`, or adds it when `old` is `None`.
    fn replace(&mut self, old: Option<&TokenRef>, new: TokenRef);

    /// Whether a scored member survived the most recent prune threshold.
    fn is_worth_growing(&self, token: &Token) -> bool;

    /// Applies the absolute and relative beams in place.
    fn purge(&mut self);

    /// An empty list with this list's configuration.
    fn create_new(&self) -> Box<dyn ActiveList>;

    fn size(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Snapshot of the members in iteration order.
    fn tokens(&self) -> Vec<TokenRef>;

    fn best_token(&self) -> Option<TokenRef>;

    fn set_best_token(&mut self, token: TokenRef);

    fn best_score(&self) -> f64 {
        self.best_token().map_or(LOG_ZERO, |t| t.score())
    }

    fn beam_threshold(&self) -> f64 {
        self.beam().threshold(self.best_score())
    }
}

impl fmt::Debug for dyn ActiveList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}ActiveList(size={}, best={:.4})",
            self.kind(),
            self.size(),
            self.best_score()
        )
    }
}

/// Beam widths shared by every list a factory produces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamConfig {
    /// `None` keeps any number of tokens.
    pub absolute_beam_width: Option<usize>,
    /// Log-domain offset from the best score; `LOG_ZERO` disables it.
    pub relative_beam_width: f64,
    /// Only read by the tree list: enforce the absolute beam on the
    /// iteration view instead of at insertion.
    pub strict_pruning: bool,
}

impl Default for BeamConfig {
    fn default() -> Self {
        Self {
            absolute_beam_width: Some(2000),
            relative_beam_width: LOG_ZERO,
            strict_pruning: true,
        }
    }
}

impl BeamConfig {
    pub fn new(absolute_beam_width: Option<usize>, relative_beam_width: f64) -> Self {
        Self {
            absolute_beam_width,
            relative_beam_width,
            strict_pruning: true,
        }
    }

    /// No pruning at all.
    pub fn unlimited() -> Self {
        Self::new(None, LOG_ZERO)
    }

    /// `absolute <= 0` is unlimited and a linear relative width of 0
    /// disables the relative beam.
    pub fn from_linear(absolute: i64, relative_linear: f64, log_math: &LogMath) -> Self {
        let absolute_beam_width = usize::try_from(absolute).ok().filter(|&w| w > 0);
        Self::new(absolute_beam_width, log_math.linear_to_log(relative_linear))
    }

    pub fn with_strict_pruning(mut self, strict: bool) -> Self {
        self.strict_pruning = strict;
        self
    }

    pub fn has_relative_beam(&self) -> bool {
        self.relative_beam_width > LOG_ZERO
    }

    /// Lowest score that survives the relative beam.
    pub fn threshold(&self, best_score: f64) -> f64 {
        if self.has_relative_beam() {
            best_score + self.relative_beam_width
        } else {
            f64::NEG_INFINITY
        }
    }

    pub fn is_full(&self, size: usize) -> bool {
        self.absolute_beam_width.is_some_and(|w| size >= w)
    }

    pub fn exceeds(&self, size: usize) -> bool {
        self.absolute_beam_width.is_some_and(|w| size > w)
    }
}

/// Caps applied by the word active list. Zero means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WordLimits {
    pub max_paths_per_word: usize,
    pub max_filler_words: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ActiveListKind {
    Simple,
    Sorting,
    #[default]
    Partition,
    Heap,
    Tree,
    Word,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown active list kind `{0}`")]
pub struct UnknownActiveList(pub String);

type Constructor = fn(BeamConfig, WordLimits) -> Box<dyn ActiveList>;

struct Registration {
    name: &'static str,
    kind: ActiveListKind,
    build: Constructor,
}

fn build_simple(beam: BeamConfig, _: WordLimits) -> Box<dyn ActiveList> {
    Box::new(SimpleActiveList::new(beam))
}

fn build_sorting(beam: BeamConfig, _: WordLimits) -> Box<dyn ActiveList> {
    Box::new(SortingActiveList::new(beam))
}

fn build_partition(beam: BeamConfig, _: WordLimits) -> Box<dyn ActiveList> {
    Box::new(PartitionActiveList::new(beam))
}

fn build_heap(beam: BeamConfig, _: WordLimits) -> Box<dyn ActiveList> {
    Box::new(HeapActiveList::new(beam))
}

fn build_tree(beam: BeamConfig, _: WordLimits) -> Box<dyn ActiveList> {
    Box::new(TreeActiveList::new(beam))
}

fn build_word(beam: BeamConfig, limits: WordLimits) -> Box<dyn ActiveList> {
    Box::new(WordActiveList::new(beam, limits))
}

/// Indexed by `ActiveListKind as usize`.
static REGISTRY: [Registration; 6] = [
    Registration {
        name: "simple",
        kind: ActiveListKind::Simple,
        build: build_simple,
    },
    Registration {
        name: "sorting",
        kind: ActiveListKind::Sorting,
        build: build_sorting,
    },
    Registration {
        name: "partition",
        kind: ActiveListKind::Partition,
        build: build_partition,
    },
    Registration {
        name: "heap",
        kind: ActiveListKind::Heap,
        build: build_heap,
    },
    Registration {
        name: "tree",
        kind: ActiveListKind::Tree,
        build: build_tree,
    },
    Registration {
        name: "word",
        kind: ActiveListKind::Word,
        build: build_word,
    },
];

impl ActiveListKind {
    pub const ALL: [ActiveListKind; 6] = [
        ActiveListKind::Simple,
        ActiveListKind::Sorting,
        ActiveListKind::Partition,
        ActiveListKind::Heap,
        ActiveListKind::Tree,
        ActiveListKind::Word,
    ];

    fn registration(self) -> &'static Registration {
        &REGISTRY[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.registration().name
    }
}

impl fmt::Display for ActiveListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActiveListKind {
    type Err = UnknownActiveList;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        REGISTRY
            .iter()
            .find(|r| r.name == s)
            .map(|r| r.kind)
            .ok_or_else(|| UnknownActiveList(s.to_string()))
    }
}

/// Produces fresh lists of one configured strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveListFactory {
    kind: ActiveListKind,
    beam: BeamConfig,
    word_limits: WordLimits,
}

impl ActiveListFactory {
    pub fn new(kind: ActiveListKind, beam: BeamConfig) -> Self {
        Self {
            kind,
            beam,
            word_limits: WordLimits::default(),
        }
    }

    /// Resolves a strategy by name; unknown names are configuration errors.
    pub fn from_name(name: &str, beam: BeamConfig) -> Result<Self, UnknownActiveList> {
        Ok(Self::new(name.parse()?, beam))
    }

    pub fn with_word_limits(mut self, limits: WordLimits) -> Self {
        self.word_limits = limits;
        self
    }

    pub fn kind(&self) -> ActiveListKind {
        self.kind
    }

    pub fn beam(&self) -> &BeamConfig {
        &self.beam
    }

    pub fn new_instance(&self) -> Box<dyn ActiveList> {
        (self.kind.registration().build)(self.beam, self.word_limits)
    }
}

/// Slot array shared by the index-addressed strategies. Each member's
/// `location` is its index here.
#[derive(Default)]
pub(crate) struct TokenSlots {
    tokens: Vec<TokenRef>,
    best: Option<TokenRef>,
}

impl TokenSlots {
    pub(crate) fn len(&self) -> usize {
        self.tokens.len()
    }

    pub(crate) fn as_slice(&self) -> &[TokenRef] {
        &self.tokens
    }

    pub(crate) fn best(&self) -> Option<&TokenRef> {
        self.best.as_ref()
    }

    pub(crate) fn set_best(&mut self, token: TokenRef) {
        self.best = Some(token);
    }

    fn track_best(&mut self, token: &TokenRef) {
        if self.best.as_ref().map_or(true, |b| token.score() > b.score()) {
            self.best = Some(Rc::clone(token));
        }
    }

    pub(crate) fn push(&mut self, token: TokenRef) {
        token.set_location(Some(self.tokens.len()));
        self.track_best(&token);
        self.tokens.push(token);
    }

    /// Slot replace with the location consistency check.
    pub(crate) fn replace(&mut self, list: ActiveListKind, old: Option<&TokenRef>, new: TokenRef) {
        let Some(old) = old else {
            self.push(new);
            return;
        };
        match old.location().filter(|&loc| loc < self.tokens.len()) {
            Some(loc) => {
                if !Rc::ptr_eq(&self.tokens[loc], old) {
                    report_misplaced(list, old, &new, Some(loc), Some(&self.tokens[loc]));
                }
                old.set_location(None);
                new.set_location(Some(loc));
                self.track_best(&new);
                self.tokens[loc] = new;
            }
            None => {
                report_misplaced(list, old, &new, old.location(), None);
                self.push(new);
            }
        }
    }

    /// Recomputes the best token from the current scores.
    pub(crate) fn rescan_best(&mut self) {
        self.best = self
            .tokens
            .iter()
            .max_by(|a, b| a.score().total_cmp(&b.score()))
            .map(Rc::clone);
    }

    /// Keeps members for which `keep` holds, in order.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&TokenRef) -> bool) {
        self.tokens.retain(|t| {
            let kept = keep(t);
            if !kept {
                t.set_location(None);
            }
            kept
        });
    }

    /// Drops members scoring below `threshold`.
    pub(crate) fn retain_above(&mut self, threshold: f64) {
        self.retain(|t| t.score() >= threshold);
    }

    /// Drops members past `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        for t in self.tokens.iter().skip(len) {
            t.set_location(None);
        }
        self.tokens.truncate(len);
    }

    pub(crate) fn sort_by_score(&mut self) {
        self.tokens.sort_by(|a, b| Token::compare_by_score(a, b));
    }

    pub(crate) fn tokens_mut(&mut self) -> &mut Vec<TokenRef> {
        &mut self.tokens
    }

    /// Restores `location == index` after a reorder.
    pub(crate) fn reindex(&mut self) {
        for (i, t) in self.tokens.iter().enumerate() {
            t.set_location(Some(i));
        }
    }
}

/// Logs a `replace` whose recorded location does not hold the old token.
pub(crate) fn report_misplaced(
    list: ActiveListKind,
    old: &Token,
    new: &Token,
    location: Option<usize>,
    found: Option<&TokenRef>,
) {
    warn!(
        list = list.name(),
        ?location,
        old = ?old,
        new = ?new,
        found = ?found,
        "replace: token not where it should have been"
    );
}

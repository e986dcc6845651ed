use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, debug_span};

use crate::linguist::{Linguist, SearchState};
use crate::log_math::{LogMath, LOG_ZERO};
use crate::scorer::AcousticScorer;
use crate::settings::Settings;
use crate::stats::SharedStats;
use crate::token::{word_predecessor, Token, TokenRef};

use super::active_list::{ActiveList, ActiveListFactory};
use super::alternate::AlternateHypothesisManager;
use super::list_manager::SimpleActiveListManager;
use super::{
    ensure_running, prune_list, record, score_list, BestTokenMap, Pruner, SearchError,
    SearchManager, SearchPhase, SearchResult,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WordPruningConfig {
    /// Fail on a transition from a non-emitting state to an earlier
    /// category of the state order.
    pub check_state_order: bool,
    /// Record losing word paths for lattice construction.
    pub build_word_lattice: bool,
    /// Alternates kept per word token once recognition finishes.
    pub max_lattice_edges: usize,
    /// Frames of acoustic look-ahead applied when choosing which emitting
    /// tokens to grow; 0 disables it.
    pub acoustic_lookahead_frames: f64,
    /// Link new tokens to their real predecessor instead of the nearest
    /// word token.
    pub keep_all_tokens: bool,
    /// Score without growing on every n-th frame; 0 never skips.
    pub grow_skip_interval: usize,
    /// Log-domain beam used together with the look-ahead scores.
    pub relative_beam_width: f64,
}

impl Default for WordPruningConfig {
    fn default() -> Self {
        Self {
            check_state_order: false,
            build_word_lattice: true,
            max_lattice_edges: 100,
            acoustic_lookahead_frames: 0.0,
            keep_all_tokens: false,
            grow_skip_interval: 0,
            relative_beam_width: LOG_ZERO,
        }
    }
}

impl WordPruningConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let search = &settings.search;
        Self {
            check_state_order: search.check_state_order,
            build_word_lattice: search.build_word_lattice,
            max_lattice_edges: search.max_lattice_edges,
            acoustic_lookahead_frames: search.acoustic_lookahead_frames,
            keep_all_tokens: search.keep_all_tokens,
            grow_skip_interval: search.grow_skip_interval,
            relative_beam_width: settings.beam().relative_beam_width,
        }
    }
}

/// Breadth-first search with tokens bucketed by state category.
///
/// Emitting tokens are grown first; the resulting non-emitting tokens
/// land in per-category buckets that are drained in the linguist's state
/// order. Unless `keep_all_tokens` is set, every new token links straight
/// to the nearest word token, so the token tree is a word graph. When a
/// word lattice is built, a word token links to the path token that
/// entered it instead, and the path token of a path that loses at a word
/// state survives as an alternate predecessor.
pub struct WordPruningBreadthFirstSearchManager {
    linguist: Box<dyn Linguist>,
    scorer: Box<dyn AcousticScorer>,
    pruner: Box<dyn Pruner>,
    lists: SimpleActiveListManager,
    config: WordPruningConfig,
    log_math: LogMath,
    stats: Option<SharedStats>,

    phase: SearchPhase,
    result_list: Vec<TokenRef>,
    best_token_map: BestTokenMap,
    alternates: Option<Rc<RefCell<AlternateHypothesisManager>>>,
    current_frame: usize,
}

impl WordPruningBreadthFirstSearchManager {
    /// `factories` follow the linguist's state order; see
    /// [`SimpleActiveListManager::new`].
    pub fn new(
        linguist: Box<dyn Linguist>,
        scorer: Box<dyn AcousticScorer>,
        pruner: Box<dyn Pruner>,
        factories: Vec<ActiveListFactory>,
        log_math: LogMath,
    ) -> Result<Self, SearchError> {
        let order = linguist.search_state_order().ok_or_else(|| {
            SearchError::Config("the linguist supplies no search state order".to_string())
        })?;
        let lists = SimpleActiveListManager::new(order, factories)?;
        Ok(Self {
            linguist,
            scorer,
            pruner,
            lists,
            config: WordPruningConfig::default(),
            log_math,
            stats: None,
            phase: SearchPhase::NotStarted,
            result_list: Vec::new(),
            best_token_map: BestTokenMap::new(),
            alternates: None,
            current_frame: 0,
        })
    }

    /// Builds the manager with list factories and options taken from
    /// `settings`.
    pub fn from_settings(
        linguist: Box<dyn Linguist>,
        scorer: Box<dyn AcousticScorer>,
        pruner: Box<dyn Pruner>,
        settings: &Settings,
    ) -> Result<Self, SearchError> {
        let order = linguist.search_state_order().unwrap_or_default();
        let factories = SimpleActiveListManager::factories_from_settings(&order, settings);
        Ok(
            Self::new(linguist, scorer, pruner, factories, settings.log_math())?
                .with_config(WordPruningConfig::from_settings(settings)),
        )
    }

    pub fn with_config(mut self, config: WordPruningConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_stats(mut self, stats: SharedStats) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn list_manager(&self) -> &SimpleActiveListManager {
        &self.lists
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    fn word_predecessor(&self, token: &TokenRef) -> Option<TokenRef> {
        if self.config.keep_all_tokens {
            Some(Rc::clone(token))
        } else {
            word_predecessor(token)
        }
    }

    fn grow_branches(&mut self, list: &dyn ActiveList) -> Result<(), SearchError> {
        let threshold = list.beam_threshold();
        debug!(
            frame = self.current_frame,
            threshold,
            best = list.best_score(),
            size = list.size()
        );
        for token in list.tokens() {
            if token.score() >= threshold && self.is_current_best(&token) {
                self.collect_successor_tokens(&token)?;
            }
        }
        Ok(())
    }

    fn grow_emitting_branches(&mut self, list: &dyn ActiveList) -> Result<(), SearchError> {
        if self.config.acoustic_lookahead_frames <= 0.0 {
            return self.grow_branches(list);
        }
        let tokens = list.tokens();
        let mut best_score = f64::NEG_INFINITY;
        for t in &tokens {
            let score = t.score() + t.acoustic_score() * self.config.acoustic_lookahead_frames;
            best_score = best_score.max(score);
            t.set_working_score(score);
        }
        let threshold = if self.config.relative_beam_width > LOG_ZERO {
            best_score + self.config.relative_beam_width
        } else {
            f64::NEG_INFINITY
        };
        for t in &tokens {
            if t.working_score() >= threshold {
                self.collect_successor_tokens(t)?;
            }
        }
        Ok(())
    }

    /// Drains each non-emitting bucket in state order. A bucket is taken
    /// again while its own expansion refills it; an earlier bucket that
    /// refills is a state-order violation.
    fn grow_non_emitting_lists(&mut self) -> Result<(), SearchError> {
        for index in 0..self.lists.non_emitting_count() {
            while self.lists.list_len(index) > 0 {
                let list = self.lists.take_list(index);
                let list = prune_list(self.pruner.as_mut(), list, &self.stats);
                self.grow_branches(list.as_ref())?;
            }
            self.lists.check_prior_lists_empty(index)?;
        }
        Ok(())
    }

    /// A non-emitting token superseded at its state after it was queued
    /// is not grown.
    fn is_current_best(&self, token: &TokenRef) -> bool {
        token.is_emitting()
            || self
                .best_token_map
                .get(&token.search_state().id())
                .map_or(true, |best| Rc::ptr_eq(best, token))
    }

    fn check_state_order(
        &self,
        from: &dyn SearchState,
        to: &dyn SearchState,
    ) -> Result<(), SearchError> {
        let from_index = self.lists.order_of(from.kind())?;
        if from_index == self.lists.emitting_index() {
            return Ok(());
        }
        let to_index = self.lists.order_of(to.kind())?;
        if to_index < from_index {
            return Err(SearchError::StateOrder {
                from: format!("{} {}", from.kind(), from.label()),
                to: format!("{} {}", to.kind(), to.label()),
            });
        }
        Ok(())
    }

    fn collect_successor_tokens(&mut self, token: &TokenRef) -> Result<(), SearchError> {
        if token.is_final() {
            if let Some(word) = self.word_predecessor(token) {
                self.result_list.push(word);
            }
            return Ok(());
        }
        let state = Rc::clone(token.search_state());
        let predecessor = self.word_predecessor(token);
        for arc in state.successors() {
            let next = &arc.state;
            if self.config.check_state_order {
                self.check_state_order(state.as_ref(), next.as_ref())?;
            }
            let entry_score = token.score() + arc.probability();
            let id = next.id();
            let occupant = self.best_token_map.get(&id).cloned();

            if let Some(best) = occupant.as_ref().filter(|b| entry_score <= b.score()) {
                record(&self.stats, |s| s.viterbi_pruned += 1);
                if next.word().is_some() {
                    self.record_alternate(best, token);
                }
                continue;
            }

            // With a word lattice, a word token keeps the token that reached
            // it so the lattice can recover the acoustic score of the last
            // word's segment.
            let link = if next.word().is_some() && self.alternates.is_some() {
                Some(Rc::clone(token))
            } else {
                predecessor.clone()
            };
            let child = Token::new(
                link,
                Rc::clone(next),
                entry_score,
                arc.language_probability,
                arc.insertion_probability,
                self.current_frame,
            );
            record(&self.stats, |s| s.tokens_created += 1);
            self.best_token_map.insert(id, Rc::clone(&child));
            match occupant {
                None => self.lists.add(Rc::clone(&child))?,
                Some(old) => {
                    self.lists.replace(Some(&old), Rc::clone(&child))?;
                    if child.is_word() {
                        if let Some(alternates) = &self.alternates {
                            alternates.borrow_mut().change_successor(&child, &old);
                        }
                        if let Some(old_pred) = old.predecessor() {
                            self.record_alternate(&child, old_pred);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Keeps `predecessor` as another way into `winner` unless it already
    /// is the winner's own path.
    fn record_alternate(&self, winner: &TokenRef, predecessor: &TokenRef) {
        let Some(alternates) = &self.alternates else {
            return;
        };
        let is_own_path = Rc::ptr_eq(winner, predecessor)
            || winner
                .predecessor()
                .is_some_and(|p| Rc::ptr_eq(p, predecessor));
        if !is_own_path {
            alternates
                .borrow_mut()
                .add_alternate_predecessor(winner, predecessor);
            record(&self.stats, |s| s.alternates_recorded += 1);
        }
    }

    fn result(&self, is_final: bool) -> SearchResult {
        let result = SearchResult::new(
            self.lists.emitting_list().tokens(),
            self.result_list.clone(),
            self.current_frame,
            is_final,
            self.log_math,
        );
        match &self.alternates {
            Some(alternates) => result.with_alternates(Rc::clone(alternates)),
            None => result,
        }
    }
}

impl SearchManager for WordPruningBreadthFirstSearchManager {
    fn start_recognition(&mut self) -> Result<(), SearchError> {
        self.linguist.start();
        self.pruner.start();
        self.scorer.start();
        self.current_frame = 0;
        self.lists.clear();
        self.result_list.clear();
        self.best_token_map = BestTokenMap::new();
        self.alternates = self
            .config
            .build_word_lattice
            .then(|| Rc::new(RefCell::new(AlternateHypothesisManager::new())));

        let mut seed = self.lists.take_emitting_list();
        seed.add(Token::root(self.linguist.initial_state(), self.current_frame));
        self.grow_branches(seed.as_ref())?;
        self.grow_non_emitting_lists()?;
        self.phase = SearchPhase::Running;
        Ok(())
    }

    fn recognize(&mut self, n_frames: usize) -> Result<SearchResult, SearchError> {
        ensure_running(self.phase)?;
        let mut done = false;
        for _ in 0..n_frames {
            let _span = debug_span!("recognize", frame = self.current_frame).entered();
            let list = self.lists.take_emitting_list();
            done = !score_list(self.scorer.as_mut(), list.as_ref(), &self.stats);
            if done {
                self.lists.set_emitting_list(list);
                break;
            }
            self.current_frame += 1;
            if self.config.grow_skip_interval > 1
                && self.current_frame % self.config.grow_skip_interval == 0
            {
                self.lists.set_emitting_list(list);
                continue;
            }
            let list = prune_list(self.pruner.as_mut(), list, &self.stats);
            self.best_token_map = BestTokenMap::with_capacity((list.size() * 2).max(1));
            self.result_list.clear();
            self.grow_emitting_branches(list.as_ref())?;
            self.grow_non_emitting_lists()?;
            debug!(
                active = self.lists.emitting_list().size(),
                results = self.result_list.len()
            );
        }
        if done {
            if let Some(alternates) = &self.alternates {
                alternates.borrow_mut().purge(self.config.max_lattice_edges);
            }
        }
        Ok(self.result(done))
    }

    fn stop_recognition(&mut self) {
        self.scorer.stop();
        self.pruner.stop();
        self.linguist.stop();
        self.phase = SearchPhase::Stopped;
    }

    fn phase(&self) -> SearchPhase {
        self.phase
    }
}

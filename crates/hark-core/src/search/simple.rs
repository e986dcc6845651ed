use std::rc::Rc;

use tracing::{debug, debug_span};

use crate::linguist::Linguist;
use crate::log_math::{LogMath, LOG_ZERO};
use crate::scorer::AcousticScorer;
use crate::settings::Settings;
use crate::stats::SharedStats;
use crate::token::{Token, TokenRef};

use super::active_list::{ActiveList, ActiveListFactory};
use super::{
    ensure_running, prune_list, record, score_list, BestTokenMap, Pruner, SearchError,
    SearchManager, SearchPhase, SearchResult,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpleSearchConfig {
    /// Log-domain offset below the best score under which word states are
    /// not grown. `LOG_ZERO` disables it.
    pub relative_word_beam_width: f64,
    /// Drop a candidate before constructing it when its entry score is
    /// already below the beam.
    pub want_entry_pruning: bool,
    /// Skip growth on every n-th frame; 0 never skips.
    pub grow_skip_interval: usize,
}

impl Default for SimpleSearchConfig {
    fn default() -> Self {
        Self {
            relative_word_beam_width: LOG_ZERO,
            want_entry_pruning: false,
            grow_skip_interval: 0,
        }
    }
}

impl SimpleSearchConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            relative_word_beam_width: settings
                .log_math()
                .linear_to_log(settings.search.relative_word_beam_width),
            want_entry_pruning: settings.search.want_entry_pruning,
            grow_skip_interval: settings.search.grow_skip_interval,
        }
    }

    pub(crate) fn word_threshold(&self, best_score: f64) -> f64 {
        if self.relative_word_beam_width > LOG_ZERO {
            best_score + self.relative_word_beam_width
        } else {
            f64::NEG_INFINITY
        }
    }

    pub(crate) fn skips_growth(&self, frame: usize) -> bool {
        self.grow_skip_interval != 0 && frame % self.grow_skip_interval == 0
    }
}

/// Breadth-first search over one flat active list.
///
/// Non-emitting successors are expanded within the frame that reaches
/// them; emitting successors go into the next frame's list.
pub struct SimpleBreadthFirstSearchManager {
    linguist: Box<dyn Linguist>,
    scorer: Box<dyn AcousticScorer>,
    pruner: Box<dyn Pruner>,
    factory: ActiveListFactory,
    config: SimpleSearchConfig,
    log_math: LogMath,
    stats: Option<SharedStats>,

    phase: SearchPhase,
    active_list: Box<dyn ActiveList>,
    result_list: Vec<TokenRef>,
    best_token_map: BestTokenMap,
    current_frame: usize,
}

impl SimpleBreadthFirstSearchManager {
    pub fn new(
        linguist: Box<dyn Linguist>,
        scorer: Box<dyn AcousticScorer>,
        pruner: Box<dyn Pruner>,
        factory: ActiveListFactory,
        log_math: LogMath,
    ) -> Self {
        Self {
            linguist,
            scorer,
            pruner,
            active_list: factory.new_instance(),
            factory,
            config: SimpleSearchConfig::default(),
            log_math,
            stats: None,
            phase: SearchPhase::NotStarted,
            result_list: Vec::new(),
            best_token_map: BestTokenMap::new(),
            current_frame: 0,
        }
    }

    pub fn with_config(mut self, config: SimpleSearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_stats(mut self, stats: SharedStats) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn active_list(&self) -> &dyn ActiveList {
        self.active_list.as_ref()
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    fn grow_branches(&mut self) {
        let old = std::mem::replace(&mut self.active_list, self.factory.new_instance());
        let threshold = old.beam_threshold();
        let word_threshold = self.config.word_threshold(old.best_score());
        self.result_list.clear();
        self.best_token_map = BestTokenMap::with_capacity(old.size() * 4);

        for token in old.tokens() {
            self.collect_successor_tokens(token, threshold, word_threshold);
        }
        debug!(
            frame = self.current_frame,
            active = self.active_list.size(),
            results = self.result_list.len()
        );
    }

    fn collect_successor_tokens(&mut self, seed: TokenRef, threshold: f64, word_threshold: f64) {
        let mut pending = vec![seed];
        while let Some(token) = pending.pop() {
            if !token.is_emitting() && !self.is_current_best(&token) {
                continue;
            }
            if token.is_final() {
                self.result_list.push(token);
                continue;
            }
            if token.score() < threshold || (token.is_word() && token.score() < word_threshold) {
                continue;
            }
            for arc in token.search_state().successors() {
                let entry_score = token.score() + arc.probability();
                if self.config.want_entry_pruning
                    && (entry_score < threshold
                        || (arc.state.word().is_some() && entry_score < word_threshold))
                {
                    continue;
                }
                let id = arc.state.id();
                let occupant = self.best_token_map.get(&id).cloned();
                if occupant.as_ref().is_some_and(|best| entry_score <= best.score()) {
                    record(&self.stats, |s| s.viterbi_pruned += 1);
                    continue;
                }
                let child = Token::extend(&token, &arc, self.current_frame);
                record(&self.stats, |s| s.tokens_created += 1);
                self.best_token_map.insert(id, Rc::clone(&child));
                if child.is_emitting() {
                    self.active_list.replace(occupant.as_ref(), child);
                } else {
                    pending.push(child);
                }
            }
        }
    }

    /// A queued non-emitting token superseded at its state is not grown.
    fn is_current_best(&self, token: &TokenRef) -> bool {
        self.best_token_map
            .get(&token.search_state().id())
            .map_or(true, |best| Rc::ptr_eq(best, token))
    }
}

impl SearchManager for SimpleBreadthFirstSearchManager {
    fn start_recognition(&mut self) -> Result<(), SearchError> {
        self.linguist.start();
        self.pruner.start();
        self.scorer.start();
        self.current_frame = 0;
        self.result_list.clear();

        let root = Token::root(self.linguist.initial_state(), self.current_frame);
        self.active_list = self.factory.new_instance();
        self.active_list.add(root);
        self.grow_branches();
        self.phase = SearchPhase::Running;
        Ok(())
    }

    fn recognize(&mut self, n_frames: usize) -> Result<SearchResult, SearchError> {
        ensure_running(self.phase)?;
        let mut done = false;
        for _ in 0..n_frames {
            let _span = debug_span!("recognize", frame = self.current_frame).entered();
            done = !score_list(self.scorer.as_mut(), self.active_list.as_ref(), &self.stats);
            if done {
                break;
            }
            let list = std::mem::replace(&mut self.active_list, self.factory.new_instance());
            self.active_list = prune_list(self.pruner.as_mut(), list, &self.stats);
            self.current_frame += 1;
            if !self.config.skips_growth(self.current_frame) {
                self.grow_branches();
            }
        }
        Ok(SearchResult::new(
            self.active_list.tokens(),
            self.result_list.clone(),
            self.current_frame,
            done,
            self.log_math,
        ))
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

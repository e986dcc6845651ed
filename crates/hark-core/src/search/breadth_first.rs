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
pub struct BreadthFirstConfig {
    /// Log-domain offset below the best score under which word tokens are
    /// not grown. `LOG_ZERO` disables it.
    pub relative_word_beam_width: f64,
}

impl Default for BreadthFirstConfig {
    fn default() -> Self {
        Self {
            relative_word_beam_width: LOG_ZERO,
        }
    }
}

impl BreadthFirstConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            relative_word_beam_width: settings
                .log_math()
                .linear_to_log(settings.search.relative_word_beam_width),
        }
    }
}

/// Breadth-first search that lets the active list decide what is worth
/// growing.
///
/// Unlike [`SimpleBreadthFirstSearchManager`](super::SimpleBreadthFirstSearchManager)
/// a surviving token is only grown when `is_worth_growing` holds for the
/// list it came from, and an emitting successor is only built when the
/// next list reports its score as insertable. This is what makes the
/// approximate tree list usable: its purge only moves a threshold.
pub struct BreadthFirstSearchManager {
    linguist: Box<dyn Linguist>,
    scorer: Box<dyn AcousticScorer>,
    pruner: Box<dyn Pruner>,
    factory: ActiveListFactory,
    config: BreadthFirstConfig,
    log_math: LogMath,
    stats: Option<SharedStats>,

    phase: SearchPhase,
    active_list: Box<dyn ActiveList>,
    result_list: Vec<TokenRef>,
    best_token_map: BestTokenMap,
    current_frame: usize,
}

impl BreadthFirstSearchManager {
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
            config: BreadthFirstConfig::default(),
            log_math,
            stats: None,
            phase: SearchPhase::NotStarted,
            result_list: Vec::new(),
            best_token_map: BestTokenMap::new(),
            current_frame: 0,
        }
    }

    pub fn with_config(mut self, config: BreadthFirstConfig) -> Self {
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

    fn grow_branches(&mut self) {
        let old = std::mem::replace(&mut self.active_list, self.factory.new_instance());
        let word_threshold = if self.config.relative_word_beam_width > LOG_ZERO {
            old.best_score() + self.config.relative_word_beam_width
        } else {
            f64::NEG_INFINITY
        };
        self.result_list.clear();
        self.best_token_map = BestTokenMap::with_capacity(old.size() * 4);

        for token in old.tokens() {
            if old.is_worth_growing(&token) {
                self.grow_token(token, old.as_ref(), word_threshold);
            }
        }
        debug!(
            frame = self.current_frame,
            active = self.active_list.size(),
            results = self.result_list.len()
        );
    }

    fn grow_token(&mut self, seed: TokenRef, old: &dyn ActiveList, word_threshold: f64) {
        let mut pending = vec![seed];
        while let Some(token) = pending.pop() {
            if !token.is_emitting() {
                let superseded = self
                    .best_token_map
                    .get(&token.search_state().id())
                    .is_some_and(|best| !Rc::ptr_eq(best, &token));
                if superseded {
                    continue;
                }
            }
            if token.is_final() {
                self.result_list.push(token);
                continue;
            }
            if token.is_word() && token.score() < word_threshold {
                continue;
            }
            // Non-emitting tokens created in this growth share the gate of
            // the list they came from.
            if !token.is_emitting() && !old.is_worth_growing(&token) {
                continue;
            }
            for arc in token.search_state().successors() {
                let entry_score = token.score() + arc.probability();
                if arc.state.is_emitting() && !self.active_list.is_insertable(entry_score) {
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
}

impl SearchManager for BreadthFirstSearchManager {
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
            self.grow_branches();
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

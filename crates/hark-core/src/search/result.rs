use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::log_math::LogMath;
use crate::token::TokenRef;

use super::alternate::AlternateHypothesisManager;

/// Snapshot of a recognition: the active tokens of the current frame and
/// the final tokens reached by the last growth.
#[derive(Clone)]
pub struct SearchResult {
    active_tokens: Vec<TokenRef>,
    result_tokens: Vec<TokenRef>,
    alternates: Option<Rc<RefCell<AlternateHypothesisManager>>>,
    frame_number: usize,
    is_final: bool,
    log_math: LogMath,
}

impl SearchResult {
    pub fn new(
        active_tokens: Vec<TokenRef>,
        result_tokens: Vec<TokenRef>,
        frame_number: usize,
        is_final: bool,
        log_math: LogMath,
    ) -> Self {
        Self {
            active_tokens,
            result_tokens,
            alternates: None,
            frame_number,
            is_final,
            log_math,
        }
    }

    pub fn with_alternates(mut self, alternates: Rc<RefCell<AlternateHypothesisManager>>) -> Self {
        self.alternates = Some(alternates);
        self
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn frame_number(&self) -> usize {
        self.frame_number
    }

    pub fn log_math(&self) -> &LogMath {
        &self.log_math
    }

    pub fn active_tokens(&self) -> &[TokenRef] {
        &self.active_tokens
    }

    pub fn result_tokens(&self) -> &[TokenRef] {
        &self.result_tokens
    }

    pub fn alternate_hypotheses(&self) -> Option<Ref<'_, AlternateHypothesisManager>> {
        self.alternates.as_ref().map(|a| a.borrow())
    }

    pub fn best_final_token(&self) -> Option<&TokenRef> {
        best_of(&self.result_tokens)
    }

    pub fn best_active_token(&self) -> Option<&TokenRef> {
        best_of(&self.active_tokens)
    }

    /// Best final token, or the best active one when nothing has finished.
    pub fn best_token(&self) -> Option<&TokenRef> {
        self.best_final_token().or_else(|| self.best_active_token())
    }

    /// First final (then active) token whose filler-free word path is `text`.
    pub fn find_token(&self, text: &str) -> Option<&TokenRef> {
        let text = text.trim();
        self.result_tokens
            .iter()
            .chain(&self.active_tokens)
            .find(|t| t.word_path_no_fillers() == text)
    }

    /// Active tokens whose filler-free word path is a prefix of `text`.
    pub fn find_partial_matching_tokens(&self, text: &str) -> Vec<&TokenRef> {
        let text = text.trim();
        self.active_tokens
            .iter()
            .filter(|t| is_word_prefix(&t.word_path_no_fillers(), text))
            .collect()
    }

    /// Words of the best hypothesis without fillers; empty when there is none.
    pub fn best_result_no_fillers(&self) -> String {
        self.best_token()
            .map(|t| t.word_path_no_fillers())
            .unwrap_or_default()
    }

    pub fn best_final_result_no_fillers(&self) -> String {
        self.best_final_token()
            .map(|t| t.word_path_no_fillers())
            .unwrap_or_default()
    }
}

fn best_of(tokens: &[TokenRef]) -> Option<&TokenRef> {
    let mut best: Option<&TokenRef> = None;
    for t in tokens {
        if best.map_or(true, |b| t.score() > b.score()) {
            best = Some(t);
        }
    }
    best
}

fn is_word_prefix(path: &str, text: &str) -> bool {
    text == path
        || path.is_empty()
        || (text.starts_with(path) && text[path.len()..].starts_with(' '))
}

impl fmt::Debug for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchResult")
            .field("frame", &self.frame_number)
            .field("final", &self.is_final)
            .field("active", &self.active_tokens.len())
            .field("results", &self.result_tokens.len())
            .field("best", &self.best_result_no_fillers())
            .finish()
    }
}

impl fmt::Display for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.best_result_no_fillers())
    }
}

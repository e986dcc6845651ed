//! Search tokens.
//!
//! A token is one hypothesis at one search state and frame. Tokens link
//! back to their predecessor, so every live token owns the path that led
//! to it; a path is released once no active list, result or alternate
//! record refers to any token on it.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::linguist::{SearchStateArc, StateRef, Word};
use crate::log_math::LOG_ONE;

pub type TokenRef = Rc<Token>;

pub struct Token {
    predecessor: Option<TokenRef>,
    state: StateRef,
    frame: usize,
    total_score: Cell<f64>,
    language_score: f64,
    insertion_score: f64,
    acoustic_score: Cell<f64>,
    working_score: Cell<f64>,
    /// Slot index set by the active list that currently holds the token.
    /// Only meaningful while the token is a member of that list.
    location: Cell<Option<usize>>,
    app_object: RefCell<Option<Rc<dyn Any>>>,
}

impl Token {
    /// A path start with all scores at log one.
    pub fn root(state: StateRef, frame: usize) -> TokenRef {
        Self::new(None, state, LOG_ONE, LOG_ONE, LOG_ONE, frame)
    }

    pub fn new(
        predecessor: Option<TokenRef>,
        state: StateRef,
        total_score: f64,
        language_score: f64,
        insertion_score: f64,
        frame: usize,
    ) -> TokenRef {
        Rc::new(Token {
            predecessor,
            state,
            frame,
            total_score: Cell::new(total_score),
            language_score,
            insertion_score,
            acoustic_score: Cell::new(LOG_ONE),
            working_score: Cell::new(total_score),
            location: Cell::new(None),
            app_object: RefCell::new(None),
        })
    }

    /// Follows `arc` from `predecessor`: the new total is the predecessor's
    /// total plus the arc's language, transition and insertion scores.
    pub fn extend(predecessor: &TokenRef, arc: &SearchStateArc, frame: usize) -> TokenRef {
        Self::new(
            Some(Rc::clone(predecessor)),
            Rc::clone(&arc.state),
            predecessor.score() + arc.probability(),
            arc.language_probability,
            arc.insertion_probability,
            frame,
        )
    }

    pub fn predecessor(&self) -> Option<&TokenRef> {
        self.predecessor.as_ref()
    }

    pub fn search_state(&self) -> &StateRef {
        &self.state
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn score(&self) -> f64 {
        self.total_score.get()
    }

    /// Replaces the total score (rescoring), it does not accumulate.
    pub fn set_score(&self, score: f64) {
        self.total_score.set(score);
    }

    pub fn language_score(&self) -> f64 {
        self.language_score
    }

    pub fn insertion_score(&self) -> f64 {
        self.insertion_score
    }

    pub fn acoustic_score(&self) -> f64 {
        self.acoustic_score.get()
    }

    /// Secondary accumulator kept apart from the Viterbi score.
    pub fn working_score(&self) -> f64 {
        self.working_score.get()
    }

    pub fn set_working_score(&self, score: f64) {
        self.working_score.set(score);
    }

    /// Applies the acoustic score of one frame and returns the new total.
    ///
    /// Panics for non-emitting tokens, which never see acoustic input.
    pub fn apply_acoustic_score(&self, acoustic: f64) -> f64 {
        assert!(
            self.is_emitting(),
            "acoustic score applied to non-emitting token {self:?}"
        );
        self.acoustic_score.set(acoustic);
        let total = self.total_score.get() + acoustic;
        self.total_score.set(total);
        self.working_score.set(self.working_score.get() + acoustic);
        total
    }

    pub fn location(&self) -> Option<usize> {
        self.location.get()
    }

    pub fn set_location(&self, location: Option<usize>) {
        self.location.set(location);
    }

    pub fn app_object(&self) -> Option<Rc<dyn Any>> {
        self.app_object.borrow().clone()
    }

    pub fn set_app_object(&self, object: Option<Rc<dyn Any>>) {
        *self.app_object.borrow_mut() = object;
    }

    pub fn is_emitting(&self) -> bool {
        self.state.is_emitting()
    }

    pub fn is_final(&self) -> bool {
        self.state.is_final()
    }

    pub fn is_word(&self) -> bool {
        self.state.word().is_some()
    }

    pub fn word(&self) -> Option<&Word> {
        self.state.word()
    }

    /// Iterates from this token back to the root.
    pub fn path(&self) -> PathIter<'_> {
        PathIter { next: Some(self) }
    }

    /// Words on the path to this token, oldest first.
    pub fn words(&self, want_fillers: bool) -> Vec<Word> {
        let mut words: Vec<Word> = self
            .path()
            .filter_map(|t| t.word())
            .filter(|w| want_fillers || !w.is_filler())
            .cloned()
            .collect();
        words.reverse();
        words
    }

    /// Space-separated word path, fillers included.
    pub fn word_path(&self) -> String {
        join_words(&self.words(true))
    }

    pub fn word_path_no_fillers(&self) -> String {
        join_words(&self.words(false))
    }

    /// Descending score order, the ordering every pruning strategy uses.
    pub fn compare_by_score(a: &Token, b: &Token) -> Ordering {
        b.score().total_cmp(&a.score())
    }
}

fn join_words(words: &[Word]) -> String {
    words
        .iter()
        .map(|w| w.spelling())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Nearest word token at or before `token`.
pub fn word_predecessor(token: &TokenRef) -> Option<TokenRef> {
    let mut cur = Some(token);
    while let Some(t) = cur {
        if t.is_word() {
            return Some(Rc::clone(t));
        }
        cur = t.predecessor();
    }
    None
}

/// Identity key for maps keyed by token.
pub fn token_key(token: &Token) -> *const Token {
    token as *const Token
}

pub struct PathIter<'a> {
    next: Option<&'a Token>,
}

impl<'a> Iterator for PathIter<'a> {
    type Item = &'a Token;

    fn next(&mut self) -> Option<&'a Token> {
        let cur = self.next?;
        self.next = cur.predecessor.as_deref();
        Some(cur)
    }
}

impl Drop for Token {
    // Unlink long predecessor chains iteratively instead of recursing
    // through nested Rc drops.
    fn drop(&mut self) {
        let mut next = self.predecessor.take();
        while let Some(rc) = next {
            match Rc::try_unwrap(rc) {
                Ok(mut token) => next = token.predecessor.take(),
                Err(_) => break,
            }
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(frame={} state={} score={:.4} lm={:.4} ins={:.4} ac={:.4})",
            self.frame,
            self.state.label(),
            self.score(),
            self.language_score,
            self.insertion_score,
            self.acoustic_score()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {:.4}", self.frame, self.state.label(), self.score())
    }
}

//! Shared fixtures for unit tests.

use std::rc::Rc;

use crate::linguist::{SearchState, SearchStateArc, StateKind, StateRef, Word};
use crate::token::{Token, TokenRef};

#[derive(Debug)]
pub(crate) struct TestState {
    id: usize,
    emitting: bool,
    word: Option<Word>,
}

impl SearchState for TestState {
    fn id(&self) -> usize {
        self.id
    }

    fn kind(&self) -> StateKind {
        if self.word.is_some() {
            StateKind::WORD
        } else {
            StateKind::HMM
        }
    }

    fn is_emitting(&self) -> bool {
        self.emitting
    }

    fn is_final(&self) -> bool {
        self.word.as_ref().is_some_and(|w| w.is_sentence_end())
    }

    fn successors(&self) -> Vec<SearchStateArc> {
        Vec::new()
    }

    fn word(&self) -> Option<&Word> {
        self.word.as_ref()
    }

    fn label(&self) -> String {
        match &self.word {
            Some(w) => w.spelling().to_string(),
            None => format!("s{}", self.id),
        }
    }
}

pub(crate) fn state(id: usize, emitting: bool) -> StateRef {
    Rc::new(TestState {
        id,
        emitting,
        word: None,
    })
}

pub(crate) fn word_state(id: usize, spelling: &str) -> StateRef {
    Rc::new(TestState {
        id,
        emitting: false,
        word: Some(Word::from_units(spelling, &[spelling])),
    })
}

/// Emitting token with the given total score.
pub(crate) fn scored(id: usize, score: f64) -> TokenRef {
    Token::new(None, state(id, true), score, 0.0, 0.0, 0)
}

/// Word token with the given total score.
pub(crate) fn scored_word(id: usize, spelling: &str, score: f64) -> TokenRef {
    Token::new(None, word_state(id, spelling), score, 0.0, 0.0, 0)
}

//! Losing predecessors kept for lattice construction.
//!
//! Viterbi expansion keeps one predecessor per state and frame. When a
//! word path loses that comparison, its predecessor is recorded here
//! against the winning token so the lattice can still contain it.

use std::collections::HashMap;
use std::rc::Rc;

use crate::token::{token_key, Token, TokenRef};

struct Alternates {
    /// Holds the key token alive so its address cannot be reused.
    successor: TokenRef,
    predecessors: Vec<TokenRef>,
}

#[derive(Default)]
pub struct AlternateHypothesisManager {
    entries: HashMap<*const Token, Alternates>,
}

impl AlternateHypothesisManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `predecessor` as an alternate way into `token`.
    ///
    /// Recording the same predecessor twice is a no-op. Panics if
    /// `predecessor` is `token` itself or its actual predecessor.
    pub fn add_alternate_predecessor(&mut self, token: &TokenRef, predecessor: &TokenRef) {
        assert!(
            !Rc::ptr_eq(token, predecessor),
            "token recorded as its own alternate predecessor: {token:?}"
        );
        assert!(
            !token.predecessor().is_some_and(|p| Rc::ptr_eq(p, predecessor)),
            "actual predecessor recorded as alternate: {predecessor:?}"
        );
        let predecessors = &mut self
            .entries
            .entry(token_key(token))
            .or_insert_with(|| Alternates {
                successor: Rc::clone(token),
                predecessors: Vec::new(),
            })
            .predecessors;
        if !predecessors.iter().any(|p| Rc::ptr_eq(p, predecessor)) {
            predecessors.push(Rc::clone(predecessor));
        }
    }

    pub fn alternate_predecessors(&self, token: &Token) -> Option<&[TokenRef]> {
        self.entries
            .get(&token_key(token))
            .map(|a| a.predecessors.as_slice())
    }

    /// Moves the alternates of a superseded token to the token that
    /// replaced it. Entries that would point `new` at itself or at its
    /// actual predecessor are dropped.
    pub fn change_successor(&mut self, new: &TokenRef, old: &Token) {
        let Some(moved) = self.entries.remove(&token_key(old)) else {
            return;
        };
        let entry = self
            .entries
            .entry(token_key(new))
            .or_insert_with(|| Alternates {
                successor: Rc::clone(new),
                predecessors: Vec::new(),
            });
        let actual = new.predecessor();
        for p in moved.predecessors {
            let keep = !Rc::ptr_eq(&p, new)
                && !actual.is_some_and(|a| Rc::ptr_eq(a, &p))
                && !entry.predecessors.iter().any(|q| Rc::ptr_eq(q, &p));
            if keep {
                entry.predecessors.push(p);
            }
        }
        if entry.predecessors.is_empty() {
            self.entries.remove(&token_key(new));
        }
    }

    /// Sorts every alternate list by descending score and keeps the best `max`.
    pub fn purge(&mut self, max: usize) {
        for alternates in self.entries.values_mut() {
            alternates
                .predecessors
                .sort_by(|a, b| Token::compare_by_score(a, b));
            alternates.predecessors.truncate(max);
        }
        self.entries.retain(|_, a| !a.predecessors.is_empty());
    }

    pub fn has_alternates(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Number of tokens with at least one alternate.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TokenRef, &[TokenRef])> {
        self.entries
            .values()
            .map(|a| (&a.successor, a.predecessors.as_slice()))
    }
}

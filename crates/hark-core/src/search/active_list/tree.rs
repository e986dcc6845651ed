use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rand::prelude::SliceRandom;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::log_math::LOG_ZERO;
use crate::token::{Token, TokenRef};

use super::{report_misplaced, ActiveList, ActiveListKind, BeamConfig};

const SHUFFLE_SEED: u64 = 1000;

struct Node {
    token: TokenRef,
    left: Option<usize>,
    right: Option<usize>,
    live: bool,
}

/// Unbalanced binary search tree on score with relaxed pruning.
///
/// This list is approximate on purpose:
/// - `purge` only recomputes the relative threshold; `is_worth_growing`
///   applies it lazily.
/// - Without strict pruning, every insertion past capacity evicts the
///   single lowest node instead of rebalancing.
/// - With strict pruning, nothing is evicted and the iteration view is
///   cut to the absolute width.
///
/// Iteration order is shuffled so that the degenerate (sorted) insertion
/// order of one frame does not carry into the next. Replaced tokens are
/// tombstoned in place and unlinked when the lowest-node walk reaches them.
pub struct TreeActiveList {
    beam: BeamConfig,
    nodes: Vec<Node>,
    head: Option<usize>,
    size: usize,
    lowest_score: f64,
    best: Option<TokenRef>,
    prune_score: Cell<Option<f64>>,
    view: RefCell<Option<Vec<TokenRef>>>,
    rng: RefCell<StdRng>,
}

impl TreeActiveList {
    pub fn new(beam: BeamConfig) -> Self {
        Self {
            beam,
            nodes: Vec::new(),
            head: None,
            size: 0,
            lowest_score: f64::INFINITY,
            best: None,
            prune_score: Cell::new(None),
            view: RefCell::new(None),
            rng: RefCell::new(StdRng::seed_from_u64(SHUFFLE_SEED)),
        }
    }

    fn invalidate(&self) {
        self.prune_score.set(None);
        *self.view.borrow_mut() = None;
    }

    fn insert(&mut self, token: TokenRef) {
        let score = token.score();
        let index = self.nodes.len();
        token.set_location(Some(index));
        self.nodes.push(Node {
            token,
            left: None,
            right: None,
            live: true,
        });
        let Some(mut cur) = self.head else {
            self.head = Some(index);
            return;
        };
        loop {
            let node = &mut self.nodes[cur];
            let next = if score < node.token.score() {
                &mut node.left
            } else {
                &mut node.right
            };
            match *next {
                Some(child) => cur = child,
                None => {
                    *next = Some(index);
                    return;
                }
            }
        }
    }

    /// Unlinks leftmost nodes until a live one has been removed.
    fn remove_lowest(&mut self) {
        while let Some(head) = self.head {
            let removed = match self.nodes[head].left {
                None => {
                    self.head = self.nodes[head].right;
                    head
                }
                Some(mut cur) => {
                    let mut parent = head;
                    while let Some(left) = self.nodes[cur].left {
                        parent = cur;
                        cur = left;
                    }
                    self.nodes[parent].left = self.nodes[cur].right;
                    cur
                }
            };
            let node = &mut self.nodes[removed];
            if node.live {
                node.live = false;
                node.token.set_location(None);
                self.size -= 1;
                break;
            }
        }
        self.lowest_score = self.first_live(false).map_or(f64::INFINITY, |t| t.score());
    }

    /// In-order walk over live tokens, descending when `descending`.
    fn walk(&self, descending: bool, mut visit: impl FnMut(&TokenRef) -> bool) {
        let mut stack = Vec::new();
        let mut cur = self.head;
        loop {
            while let Some(i) = cur {
                stack.push(i);
                cur = if descending {
                    self.nodes[i].right
                } else {
                    self.nodes[i].left
                };
            }
            let Some(i) = stack.pop() else { return };
            let node = &self.nodes[i];
            if node.live && !visit(&node.token) {
                return;
            }
            cur = if descending { node.left } else { node.right };
        }
    }

    fn first_live(&self, descending: bool) -> Option<TokenRef> {
        let mut found = None;
        self.walk(descending, |t| {
            found = Some(Rc::clone(t));
            false
        });
        found
    }

    fn highest_score(&self) -> f64 {
        let mut best = LOG_ZERO;
        self.walk(true, |t| {
            best = best.max(t.score());
            true
        });
        best
    }

    fn prune_score(&self) -> f64 {
        match self.prune_score.get() {
            Some(score) => score,
            None => {
                let score = self.beam.threshold(self.highest_score());
                self.prune_score.set(Some(score));
                score
            }
        }
    }
}

impl ActiveList for TreeActiveList {
    fn kind(&self) -> ActiveListKind {
        ActiveListKind::Tree
    }

    fn beam(&self) -> &BeamConfig {
        &self.beam
    }

    fn is_insertable(&self, score: f64) -> bool {
        self.beam.strict_pruning || !self.beam.is_full(self.size) || score > self.lowest_score
    }

    fn add(&mut self, token: TokenRef) {
        let score = token.score();
        if self.best.as_ref().map_or(true, |b| score > b.score()) {
            self.best = Some(Rc::clone(&token));
        }
        self.insert(token);
        self.size += 1;
        self.lowest_score = self.lowest_score.min(score);
        if !self.beam.strict_pruning && self.beam.exceeds(self.size) {
            self.remove_lowest();
        }
        self.invalidate();
    }

    fn replace(&mut self, old: Option<&TokenRef>, new: TokenRef) {
        let kind = self.kind();
        if let Some(old) = old {
            let member = old
                .location()
                .and_then(|i| self.nodes.get_mut(i))
                .filter(|n| n.live && Rc::ptr_eq(&n.token, old));
            match member {
                Some(node) => {
                    node.live = false;
                    old.set_location(None);
                    self.size -= 1;
                }
                None => report_misplaced(kind, old, &new, old.location(), None),
            }
        }
        self.add(new);
    }

    fn is_worth_growing(&self, token: &Token) -> bool {
        token.score() >= self.prune_score()
    }

    fn purge(&mut self) {
        let mut best: Option<TokenRef> = None;
        self.walk(true, |t| {
            if best.as_ref().map_or(true, |b| t.score() > b.score()) {
                best = Some(Rc::clone(t));
            }
            true
        });
        let best_score = best.as_ref().map_or(LOG_ZERO, |t| t.score());
        self.best = best;
        self.prune_score.set(Some(self.beam.threshold(best_score)));
        *self.view.borrow_mut() = None;
    }

    fn create_new(&self) -> Box<dyn ActiveList> {
        Box::new(TreeActiveList::new(self.beam))
    }

    fn size(&self) -> usize {
        self.size
    }

    fn tokens(&self) -> Vec<TokenRef> {
        if let Some(view) = self.view.borrow().as_ref() {
            return view.clone();
        }
        let mut view = Vec::with_capacity(self.size);
        self.walk(true, |t| {
            view.push(Rc::clone(t));
            true
        });
        if self.beam.strict_pruning {
            if let Some(width) = self.beam.absolute_beam_width {
                view.truncate(width);
            }
        }
        view.shuffle(&mut *self.rng.borrow_mut());
        *self.view.borrow_mut() = Some(view.clone());
        view
    }

    fn best_token(&self) -> Option<TokenRef> {
        self.best.clone()
    }

    fn set_best_token(&mut self, token: TokenRef) {
        self.best = Some(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::scored;

    fn sorted_scores(list: &TreeActiveList) -> Vec<f64> {
        let mut v: Vec<f64> = list.tokens().iter().map(|t| t.score()).collect();
        v.sort_by(|a, b| b.total_cmp(a));
        v
    }

    #[test]
    fn relaxed_mode_evicts_lowest_on_insert() {
        let beam = BeamConfig::new(Some(3), LOG_ZERO).with_strict_pruning(false);
        let mut list = TreeActiveList::new(beam);
        for (i, s) in [-5.0, -1.0, -9.0, -2.0, -7.0, -3.0].into_iter().enumerate() {
            list.add(scored(i, s));
            assert!(list.size() <= 3);
        }
        assert_eq!(sorted_scores(&list), vec![-1.0, -2.0, -3.0]);
        assert!(!list.is_insertable(-4.0));
        assert!(list.is_insertable(-2.5));
    }

    #[test]
    fn strict_mode_cuts_the_view() {
        let mut list = TreeActiveList::new(BeamConfig::new(Some(2), LOG_ZERO));
        for (i, s) in [-4.0, -1.0, -3.0, -2.0].into_iter().enumerate() {
            assert!(list.is_insertable(s));
            list.add(scored(i, s));
        }
        assert_eq!(list.size(), 4);
        assert_eq!(sorted_scores(&list), vec![-1.0, -2.0]);
    }

    #[test]
    fn purge_only_sets_threshold() {
        let mut list = TreeActiveList::new(BeamConfig::new(None, -2.0));
        for (i, s) in [-1.0, -2.5, -4.0].into_iter().enumerate() {
            list.add(scored(i, s));
        }
        list.purge();
        assert_eq!(list.size(), 3);
        assert!(list.is_worth_growing(&scored(7, -2.5)));
        assert!(!list.is_worth_growing(&scored(7, -4.0)));
        assert_eq!(list.best_token().unwrap().score(), -1.0);
    }

    #[test]
    fn replace_tombstones_old_token() {
        let mut list = TreeActiveList::new(BeamConfig::new(Some(10), LOG_ZERO));
        let a = scored(0, -3.0);
        list.add(Rc::clone(&a));
        list.add(scored(1, -1.0));
        list.replace(Some(&a), scored(2, -0.5));
        assert_eq!(list.size(), 2);
        assert_eq!(a.location(), None);
        assert_eq!(sorted_scores(&list), vec![-0.5, -1.0]);
    }

    #[test]
    fn eviction_skips_tombstones() {
        let beam = BeamConfig::new(Some(2), LOG_ZERO).with_strict_pruning(false);
        let mut list = TreeActiveList::new(beam);
        let low = scored(0, -9.0);
        list.add(Rc::clone(&low));
        list.add(scored(1, -1.0));
        list.replace(Some(&low), scored(2, -2.0));
        list.add(scored(3, -3.0));
        assert_eq!(list.size(), 2);
        assert_eq!(sorted_scores(&list), vec![-1.0, -2.0]);
    }
}

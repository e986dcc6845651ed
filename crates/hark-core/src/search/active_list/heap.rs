use std::cell::Cell;
use std::rc::Rc;

use crate::log_math::LOG_ZERO;
use crate::token::{Token, TokenRef};

use super::{report_misplaced, ActiveList, ActiveListKind, BeamConfig};

/// Min-heap keyed on score, holding at most `absolute_beam_width` tokens.
///
/// The worst member sits at the root, so a full heap rejects hopeless
/// tokens in O(1) and admits a better one in O(log n) by replacing the
/// root. Each member's `location` is its heap index.
pub struct HeapActiveList {
    beam: BeamConfig,
    heap: Vec<TokenRef>,
    best: Option<TokenRef>,
    prune_score: Cell<f64>,
}

impl HeapActiveList {
    pub fn new(beam: BeamConfig) -> Self {
        Self {
            beam,
            heap: Vec::new(),
            best: None,
            prune_score: Cell::new(f64::NEG_INFINITY),
        }
    }

    fn is_full(&self) -> bool {
        self.beam.is_full(self.heap.len())
    }

    fn lowest_score(&self) -> f64 {
        self.heap.first().map_or(LOG_ZERO, |t| t.score())
    }

    fn set(&mut self, index: usize, token: TokenRef) {
        token.set_location(Some(index));
        self.heap[index] = token;
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.heap[a].set_location(Some(a));
        self.heap[b].set_location(Some(b));
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.heap[index].score() < self.heap[parent].score() {
                self.swap(index, parent);
                index = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut smallest = index;
            if left < len && self.heap[left].score() < self.heap[smallest].score() {
                smallest = left;
            }
            if right < len && self.heap[right].score() < self.heap[smallest].score() {
                smallest = right;
            }
            if smallest == index {
                break;
            }
            self.swap(index, smallest);
            index = smallest;
        }
    }

    /// Re-establishes the heap property around a changed slot.
    fn restore(&mut self, index: usize) {
        if index > 0 && self.heap[index].score() < self.heap[(index - 1) / 2].score() {
            self.sift_up(index);
        } else {
            self.sift_down(index);
        }
    }

    fn pop_min(&mut self) -> Option<TokenRef> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.swap(0, last);
        let min = self.heap.pop();
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        if let Some(t) = &min {
            t.set_location(None);
        }
        min
    }

    fn track_best(&mut self, token: &TokenRef) {
        if self.best.as_ref().map_or(true, |b| token.score() > b.score()) {
            self.best = Some(Rc::clone(token));
        }
    }
}

impl ActiveList for HeapActiveList {
    fn kind(&self) -> ActiveListKind {
        ActiveListKind::Heap
    }

    fn beam(&self) -> &BeamConfig {
        &self.beam
    }

    fn is_insertable(&self, score: f64) -> bool {
        !self.is_full() || score > self.lowest_score()
    }

    fn add(&mut self, token: TokenRef) {
        if self.beam.absolute_beam_width == Some(0) {
            return;
        }
        if !self.is_full() {
            self.track_best(&token);
            let index = self.heap.len();
            token.set_location(Some(index));
            self.heap.push(token);
            self.sift_up(index);
        } else if token.score() > self.lowest_score() {
            self.track_best(&token);
            self.heap[0].set_location(None);
            self.set(0, token);
            self.sift_down(0);
        }
        // otherwise the token would be evicted right away
    }

    fn replace(&mut self, old: Option<&TokenRef>, new: TokenRef) {
        let Some(old) = old else {
            self.add(new);
            return;
        };
        let Some(index) = old.location().filter(|&i| i < self.heap.len()) else {
            // evicted earlier, or never a member
            self.add(new);
            return;
        };
        if !Rc::ptr_eq(&self.heap[index], old) {
            report_misplaced(self.kind(), old, &new, Some(index), Some(&self.heap[index]));
        }
        old.set_location(None);
        self.track_best(&new);
        self.set(index, new);
        self.restore(index);
    }

    fn is_worth_growing(&self, token: &Token) -> bool {
        token.score() >= self.prune_score.get()
    }

    /// Pops every root below the relative threshold; the absolute beam
    /// already holds by construction.
    fn purge(&mut self) {
        self.best = self
            .heap
            .iter()
            .max_by(|a, b| a.score().total_cmp(&b.score()))
            .map(Rc::clone);
        let threshold = self.beam_threshold();
        self.prune_score.set(threshold);
        // scores may have changed since insertion
        for i in (0..self.heap.len() / 2).rev() {
            self.sift_down(i);
        }
        while self.heap.first().is_some_and(|t| t.score() < threshold) {
            self.pop_min();
        }
    }

    fn create_new(&self) -> Box<dyn ActiveList> {
        Box::new(HeapActiveList::new(self.beam))
    }

    fn size(&self) -> usize {
        self.heap.len()
    }

    fn tokens(&self) -> Vec<TokenRef> {
        self.heap.clone()
    }

    fn best_token(&self) -> Option<TokenRef> {
        self.best.clone()
    }

    fn set_best_token(&mut self, token: TokenRef) {
        self.best = Some(token);
    }
}

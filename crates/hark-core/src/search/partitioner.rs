//! Randomized top-n selection over token scores.

use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::token::TokenRef;

const DEFAULT_SEED: u64 = 0x5eed_b3a4;

/// Quickselect partitioner: moves the `n` best tokens to the front of a
/// slice in expected linear time, without ordering them.
pub struct Partitioner {
    rng: StdRng,
    best: Option<TokenRef>,
}

impl Default for Partitioner {
    fn default() -> Self {
        Self::new()
    }
}

impl Partitioner {
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            best: None,
        }
    }

    /// Highest scoring token seen by the last `partition` call.
    pub fn best_token(&self) -> Option<&TokenRef> {
        self.best.as_ref()
    }

    /// Rearranges `tokens` so the first `min(n, len)` entries are the `n`
    /// highest scoring ones, in arbitrary order. Returns that count.
    pub fn partition(&mut self, tokens: &mut [TokenRef], n: usize) -> usize {
        self.best = tokens
            .iter()
            .max_by(|a, b| a.score().total_cmp(&b.score()))
            .map(Rc::clone);

        let len = tokens.len();
        if n >= len {
            return len;
        }
        if n == 0 {
            return 0;
        }
        self.select(tokens, n - 1);
        n
    }

    /// Places the token of descending rank `k` at index `k`, with every
    /// better token before it.
    fn select(&mut self, tokens: &mut [TokenRef], k: usize) {
        let mut lo = 0;
        let mut hi = tokens.len();
        while hi - lo > 1 {
            let pivot = tokens[self.rng.random_range(lo..hi)].score();
            let (gt, eq) = three_way(&mut tokens[lo..hi], pivot);
            let (gt, eq) = (lo + gt, lo + eq);
            if k < gt {
                hi = gt;
            } else if k < eq {
                return;
            } else {
                lo = eq;
            }
        }
    }
}

/// Dutch-flag partition around `pivot`, descending: `[> pivot][== pivot][< pivot]`.
/// Returns the end of the greater and equal runs.
fn three_way(tokens: &mut [TokenRef], pivot: f64) -> (usize, usize) {
    let mut gt = 0;
    let mut i = 0;
    let mut lt = tokens.len();
    while i < lt {
        let score = tokens[i].score();
        if score > pivot {
            tokens.swap(gt, i);
            gt += 1;
            i += 1;
        } else if score < pivot {
            lt -= 1;
            tokens.swap(i, lt);
        } else {
            i += 1;
        }
    }
    (gt, lt)
}

//! Acoustic scoring contract and a table-driven scorer.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::log_math::LOG_ZERO;
use crate::token::TokenRef;

/// Scores the emitting tokens of one frame.
pub trait AcousticScorer {
    fn start(&mut self) {}

    /// Applies the next frame's acoustic score to every token and returns
    /// the best scoring token. `None` means the input is exhausted (or
    /// nothing was left to score), which ends the recognition.
    fn calculate_scores(&mut self, tokens: &[TokenRef]) -> Option<TokenRef>;

    fn stop(&mut self) {}
}

/// Per-frame tables mapping a state label to its log acoustic score.
#[derive(Debug, Clone)]
pub struct TableScorer {
    frames: Vec<HashMap<String, f64>>,
    next_frame: usize,
    default_score: f64,
}

impl TableScorer {
    /// Labels missing from a frame's table score `LOG_ZERO`.
    pub fn new(frames: Vec<HashMap<String, f64>>) -> Self {
        Self {
            frames,
            next_frame: 0,
            default_score: LOG_ZERO,
        }
    }

    /// Builds frames from `(label, score)` slices.
    pub fn from_frames(frames: &[&[(&str, f64)]]) -> Self {
        Self::new(
            frames
                .iter()
                .map(|f| f.iter().map(|(l, s)| (l.to_string(), *s)).collect())
                .collect(),
        )
    }

    pub fn with_default_score(mut self, score: f64) -> Self {
        self.default_score = score;
        self
    }

    pub fn frames_remaining(&self) -> usize {
        self.frames.len().saturating_sub(self.next_frame)
    }
}

impl AcousticScorer for TableScorer {
    fn start(&mut self) {
        self.next_frame = 0;
    }

    fn calculate_scores(&mut self, tokens: &[TokenRef]) -> Option<TokenRef> {
        let table = self.frames.get(self.next_frame)?;
        self.next_frame += 1;

        let mut best: Option<&TokenRef> = None;
        for token in tokens {
            let label = token.search_state().label();
            let score = table.get(&label).copied().unwrap_or(self.default_score);
            token.apply_acoustic_score(score);
            if best.map_or(true, |b| token.score() > b.score()) {
                best = Some(token);
            }
        }
        debug!(
            frame = self.next_frame - 1,
            scored = tokens.len(),
            best = best.map(|t| t.score())
        );
        best.map(Rc::clone)
    }
}

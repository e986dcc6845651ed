use crate::token::{Token, TokenRef};

use super::{ActiveList, ActiveListKind, BeamConfig, TokenSlots};

/// Slot-indexed list that fully sorts on purge, then cuts at the
/// absolute width and the relative threshold.
pub struct SortingActiveList {
    beam: BeamConfig,
    slots: TokenSlots,
}

impl SortingActiveList {
    pub fn new(beam: BeamConfig) -> Self {
        Self {
            beam,
            slots: TokenSlots::default(),
        }
    }
}

impl ActiveList for SortingActiveList {
    fn kind(&self) -> ActiveListKind {
        ActiveListKind::Sorting
    }

    fn beam(&self) -> &BeamConfig {
        &self.beam
    }

    fn is_insertable(&self, _score: f64) -> bool {
        true
    }

    fn add(&mut self, token: TokenRef) {
        self.slots.push(token);
    }

    fn replace(&mut self, old: Option<&TokenRef>, new: TokenRef) {
        self.slots.replace(self.kind(), old, new);
    }

    fn is_worth_growing(&self, token: &Token) -> bool {
        token.score() >= self.beam_threshold()
    }

    fn purge(&mut self) {
        if self.slots.len() == 0 {
            return;
        }
        self.slots.sort_by_score();
        let best = self.slots.as_slice()[0].clone();
        let threshold = self.beam.threshold(best.score());
        let mut keep = self
            .slots
            .as_slice()
            .partition_point(|t| t.score() >= threshold);
        if let Some(width) = self.beam.absolute_beam_width {
            keep = keep.min(width);
        }
        self.slots.truncate(keep);
        self.slots.reindex();
        self.slots.set_best(best);
    }

    fn create_new(&self) -> Box<dyn ActiveList> {
        Box::new(SortingActiveList::new(self.beam))
    }

    fn size(&self) -> usize {
        self.slots.len()
    }

    fn tokens(&self) -> Vec<TokenRef> {
        self.slots.as_slice().to_vec()
    }

    fn best_token(&self) -> Option<TokenRef> {
        self.slots.best().cloned()
    }

    fn set_best_token(&mut self, token: TokenRef) {
        self.slots.set_best(token);
    }
}

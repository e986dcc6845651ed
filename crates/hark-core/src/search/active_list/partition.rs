use crate::search::partitioner::Partitioner;
use crate::token::{Token, TokenRef};

use super::{ActiveList, ActiveListKind, BeamConfig, TokenSlots};

/// Slot-indexed list that selects the top `absolute_beam_width` tokens
/// with the [`Partitioner`] instead of sorting.
pub struct PartitionActiveList {
    beam: BeamConfig,
    slots: TokenSlots,
    partitioner: Partitioner,
}

impl PartitionActiveList {
    pub fn new(beam: BeamConfig) -> Self {
        Self {
            beam,
            slots: TokenSlots::default(),
            partitioner: Partitioner::new(),
        }
    }
}

impl ActiveList for PartitionActiveList {
    fn kind(&self) -> ActiveListKind {
        ActiveListKind::Partition
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
        self.slots.rescan_best();
        if self.beam.has_relative_beam() {
            let threshold = self.beam_threshold();
            self.slots.retain_above(threshold);
        }
        if let Some(width) = self.beam.absolute_beam_width {
            if self.slots.len() > width {
                let keep = self.partitioner.partition(self.slots.tokens_mut(), width);
                self.slots.truncate(keep);
            }
        }
        self.slots.reindex();
    }

    fn create_new(&self) -> Box<dyn ActiveList> {
        Box::new(PartitionActiveList::new(self.beam))
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

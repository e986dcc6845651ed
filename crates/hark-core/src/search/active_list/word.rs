use std::collections::HashMap;
use std::rc::Rc;

use crate::token::{Token, TokenRef};

use super::{ActiveList, ActiveListKind, BeamConfig, TokenSlots, WordLimits};

/// List for word-state tokens. Purge sorts by score, keeps at most
/// `max_filler_words` filler tokens and `max_paths_per_word` tokens per
/// word, then applies both beams.
pub struct WordActiveList {
    beam: BeamConfig,
    limits: WordLimits,
    slots: TokenSlots,
}

impl WordActiveList {
    pub fn new(beam: BeamConfig, limits: WordLimits) -> Self {
        Self {
            beam,
            limits,
            slots: TokenSlots::default(),
        }
    }

    pub fn limits(&self) -> &WordLimits {
        &self.limits
    }
}

impl ActiveList for WordActiveList {
    fn kind(&self) -> ActiveListKind {
        ActiveListKind::Word
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

    fn is_worth_growing(&self, _token: &Token) -> bool {
        true
    }

    fn purge(&mut self) {
        if self.slots.len() == 0 {
            return;
        }
        self.slots.sort_by_score();
        let best = Rc::clone(&self.slots.as_slice()[0]);
        let threshold = self.beam.threshold(best.score());
        let limits = self.limits;

        let mut fillers = 0;
        let mut per_word: HashMap<String, usize> = HashMap::new();
        self.slots.retain(|token| {
            if token.score() < threshold {
                return false;
            }
            // non-word tokens are only subject to the beams
            let Some(word) = token.word() else {
                return true;
            };
            if limits.max_filler_words > 0 && word.is_filler() {
                if fillers >= limits.max_filler_words {
                    return false;
                }
                fillers += 1;
            }
            if limits.max_paths_per_word > 0 {
                let count = per_word.entry(word.spelling().to_string()).or_insert(0);
                if *count >= limits.max_paths_per_word {
                    return false;
                }
                *count += 1;
            }
            true
        });
        if let Some(width) = self.beam.absolute_beam_width {
            self.slots.truncate(width);
        }
        self.slots.reindex();
        self.slots.set_best(best);
    }

    fn create_new(&self) -> Box<dyn ActiveList> {
        Box::new(WordActiveList::new(self.beam, self.limits))
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

use std::rc::Rc;

use crate::token::{Token, TokenRef};

use super::{report_misplaced, ActiveList, ActiveListKind, BeamConfig};

/// Unordered vector; `replace` scans for the old token and `purge` sorts
/// everything. Every member is worth growing.
pub struct SimpleActiveList {
    beam: BeamConfig,
    tokens: Vec<TokenRef>,
    best: Option<TokenRef>,
}

impl SimpleActiveList {
    pub fn new(beam: BeamConfig) -> Self {
        Self {
            beam,
            tokens: Vec::new(),
            best: None,
        }
    }
}

impl ActiveList for SimpleActiveList {
    fn kind(&self) -> ActiveListKind {
        ActiveListKind::Simple
    }

    fn beam(&self) -> &BeamConfig {
        &self.beam
    }

    fn is_insertable(&self, _score: f64) -> bool {
        true
    }

    fn add(&mut self, token: TokenRef) {
        self.tokens.push(token);
    }

    fn replace(&mut self, old: Option<&TokenRef>, new: TokenRef) {
        if let Some(old) = old {
            match self.tokens.iter().position(|t| Rc::ptr_eq(t, old)) {
                Some(i) => self.tokens.remove(i),
                None => {
                    report_misplaced(self.kind(), old, &new, None, None);
                    // nothing to evict
                    self.tokens.push(new);
                    return;
                }
            };
        }
        self.tokens.push(new);
    }

    fn is_worth_growing(&self, _token: &Token) -> bool {
        true
    }

    fn purge(&mut self) {
        self.best = self
            .tokens
            .iter()
            .max_by(|a, b| a.score().total_cmp(&b.score()))
            .map(Rc::clone);
        let threshold = self.beam_threshold();
        self.tokens.retain(|t| t.score() >= threshold);
        if let Some(width) = self.beam.absolute_beam_width {
            if self.tokens.len() > width {
                self.tokens.sort_by(|a, b| Token::compare_by_score(a, b));
                self.tokens.truncate(width);
            }
        }
    }

    fn create_new(&self) -> Box<dyn ActiveList> {
        Box::new(SimpleActiveList::new(self.beam))
    }

    fn size(&self) -> usize {
        self.tokens.len()
    }

    fn tokens(&self) -> Vec<TokenRef> {
        self.tokens.clone()
    }

    fn best_token(&self) -> Option<TokenRef> {
        self.best.clone()
    }

    fn set_best_token(&mut self, token: TokenRef) {
        self.best = Some(token);
    }
}

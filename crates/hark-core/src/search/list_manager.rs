use std::fmt;

use crate::linguist::{SearchState, StateKind};
use crate::settings::Settings;
use crate::token::TokenRef;

use super::active_list::{ActiveList, ActiveListFactory, ActiveListKind};
use super::SearchError;

/// One active list per state category, in the topological order the
/// linguist supplies. The last category is the emitting one; the others
/// are drained in order within a frame.
pub struct SimpleActiveListManager {
    order: Vec<StateKind>,
    factories: Vec<ActiveListFactory>,
    lists: Vec<Box<dyn ActiveList>>,
}

impl SimpleActiveListManager {
    /// Category `i` uses `factories[i]`; when fewer factories than
    /// categories are given, the last one covers the rest.
    pub fn new(
        order: Vec<StateKind>,
        factories: Vec<ActiveListFactory>,
    ) -> Result<Self, SearchError> {
        if order.is_empty() {
            return Err(SearchError::Config("empty search state order".to_string()));
        }
        if factories.is_empty() {
            return Err(SearchError::Config(
                "no active list factory for the list manager".to_string(),
            ));
        }
        let mut manager = Self {
            order,
            factories,
            lists: Vec::new(),
        };
        manager.lists = (0..manager.order.len())
            .map(|i| manager.factory(i).new_instance())
            .collect();
        Ok(manager)
    }

    /// Word categories get the word list and its limits; every other
    /// category gets the configured main list.
    pub fn factories_from_settings(
        order: &[StateKind],
        settings: &Settings,
    ) -> Vec<ActiveListFactory> {
        let main = ActiveListFactory::new(settings.active_list_kind(), settings.beam());
        let word = ActiveListFactory::new(ActiveListKind::Word, settings.word_beam())
            .with_word_limits(settings.word_limits());
        order
            .iter()
            .map(|kind| if *kind == StateKind::WORD { word } else { main })
            .collect()
    }

    fn factory(&self, index: usize) -> &ActiveListFactory {
        &self.factories[index.min(self.factories.len() - 1)]
    }

    pub fn order(&self) -> &[StateKind] {
        &self.order
    }

    pub fn order_of(&self, kind: StateKind) -> Result<usize, SearchError> {
        self.order
            .iter()
            .position(|k| *k == kind)
            .ok_or(SearchError::UnorderedState(kind))
    }

    pub fn emitting_index(&self) -> usize {
        self.order.len() - 1
    }

    /// Number of non-emitting categories.
    pub fn non_emitting_count(&self) -> usize {
        self.order.len() - 1
    }

    pub fn list_for(&self, state: &dyn SearchState) -> Result<&dyn ActiveList, SearchError> {
        let index = self.order_of(state.kind())?;
        Ok(self.lists[index].as_ref())
    }

    pub fn add(&mut self, token: TokenRef) -> Result<(), SearchError> {
        let index = self.order_of(token.search_state().kind())?;
        self.lists[index].add(token);
        Ok(())
    }

    pub fn replace(&mut self, old: Option<&TokenRef>, new: TokenRef) -> Result<(), SearchError> {
        let index = self.order_of(new.search_state().kind())?;
        self.lists[index].replace(old, new);
        Ok(())
    }

    pub fn emitting_list(&self) -> &dyn ActiveList {
        self.lists[self.emitting_index()].as_ref()
    }

    pub fn emitting_list_mut(&mut self) -> &mut Box<dyn ActiveList> {
        let index = self.emitting_index();
        &mut self.lists[index]
    }

    /// Takes the list at `index`, leaving a fresh empty one in its place.
    pub fn take_list(&mut self, index: usize) -> Box<dyn ActiveList> {
        let fresh = self.factory(index).new_instance();
        std::mem::replace(&mut self.lists[index], fresh)
    }

    pub fn take_emitting_list(&mut self) -> Box<dyn ActiveList> {
        self.take_list(self.emitting_index())
    }

    pub fn set_emitting_list(&mut self, list: Box<dyn ActiveList>) {
        let index = self.emitting_index();
        self.lists[index] = list;
    }

    pub fn list_len(&self, index: usize) -> usize {
        self.lists[index].size()
    }

    /// Every category before `index` must be drained by now.
    pub fn check_prior_lists_empty(&self, index: usize) -> Result<(), SearchError> {
        for prior in 0..index {
            if !self.lists[prior].is_empty() {
                return Err(SearchError::StateOrder {
                    from: self.order[index].to_string(),
                    to: self.order[prior].to_string(),
                });
            }
        }
        Ok(())
    }

    /// Replaces every list with an empty one.
    pub fn clear(&mut self) {
        for index in 0..self.lists.len() {
            self.lists[index] = self.factory(index).new_instance();
        }
    }

    pub fn size(&self) -> usize {
        self.lists.iter().map(|l| l.size()).sum()
    }
}

impl fmt::Debug for SimpleActiveListManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for (kind, l) in self.order.iter().zip(&self.lists) {
            list.entry(&format_args!("{kind}: {}", l.size()));
        }
        list.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::active_list::{ActiveListKind, BeamConfig};
    use crate::testutil::{scored, scored_word};

    fn manager() -> SimpleActiveListManager {
        SimpleActiveListManager::new(
            vec![StateKind::WORD, StateKind::HMM],
            vec![
                ActiveListFactory::new(ActiveListKind::Word, BeamConfig::unlimited()),
                ActiveListFactory::new(ActiveListKind::Sorting, BeamConfig::unlimited()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn buckets_by_kind() {
        let mut m = manager();
        m.add(scored(1, -1.0)).unwrap();
        m.add(scored_word(2, "yes", -2.0)).unwrap();
        m.add(scored_word(3, "no", -3.0)).unwrap();
        assert_eq!(m.list_len(0), 2);
        assert_eq!(m.emitting_list().size(), 1);
        assert_eq!(m.emitting_list().kind(), ActiveListKind::Sorting);
        assert_eq!(m.size(), 3);
    }

    #[test]
    fn prior_list_check() {
        let mut m = manager();
        m.add(scored_word(2, "yes", -2.0)).unwrap();
        assert!(matches!(
            m.check_prior_lists_empty(1),
            Err(SearchError::StateOrder { .. })
        ));
        let words = m.take_list(0);
        assert_eq!(words.size(), 1);
        assert!(m.check_prior_lists_empty(1).is_ok());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut m = SimpleActiveListManager::new(
            vec![StateKind::HMM],
            vec![ActiveListFactory::new(ActiveListKind::Simple, BeamConfig::unlimited())],
        )
        .unwrap();
        assert!(matches!(
            m.add(scored_word(1, "yes", 0.0)),
            Err(SearchError::UnorderedState(StateKind::WORD))
        ));
    }

    #[test]
    fn last_factory_covers_remaining_categories() {
        let m = SimpleActiveListManager::new(
            vec![StateKind::WORD, StateKind::UNIT, StateKind::HMM],
            vec![ActiveListFactory::new(ActiveListKind::Heap, BeamConfig::default())],
        )
        .unwrap();
        assert_eq!(m.emitting_list().kind(), ActiveListKind::Heap);
        assert_eq!(m.non_emitting_count(), 2);
    }

    #[test]
    fn default_settings_give_word_bucket_its_own_list() {
        let settings = crate::settings::parse_settings_toml(crate::settings::default_toml()).unwrap();
        let factories = SimpleActiveListManager::factories_from_settings(
            &[StateKind::WORD, StateKind::UNIT, StateKind::HMM],
            &settings,
        );
        assert_eq!(factories[0].kind(), ActiveListKind::Word);
        assert_eq!(factories[1].kind(), ActiveListKind::Partition);
        assert_eq!(factories[2].kind(), ActiveListKind::Partition);
        assert_eq!(factories[0].beam().absolute_beam_width, Some(20));
    }

    #[test]
    fn empty_order_is_a_config_error() {
        assert!(SimpleActiveListManager::new(Vec::new(), Vec::new()).is_err());
    }
}

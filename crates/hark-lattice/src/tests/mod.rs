//! Tests that run a real search and post-process its result.

mod files;

use hark_core::linguist::{Word, WordGraph, WordGraphConfig, WordGraphLinguist};
use hark_core::log_math::LogMath;
use hark_core::scorer::TableScorer;
use hark_core::search::{
    ActiveListFactory, ActiveListKind, BeamConfig, SearchManager, SearchResult, SimplePruner,
    WordPruningBreadthFirstSearchManager, WordPruningConfig,
};

/// Per-frame acoustic scores for `<s> (yes | no) </s>`. "yes" wins every
/// frame by 20000 (about 2 nats at the default log base).
pub(super) const YES_NO_FRAMES: [&[(&str, f64)]; 2] = [
    &[("Y", -20000.0), ("N", -40000.0)],
    &[("Y", -20000.0), ("N", -40000.0)],
];

pub(super) const HELLO_WORLD_FRAMES: [&[(&str, f64)]; 3] = [
    &[("HH", -1.0), ("W", -10.0)],
    &[("HH", -5.0), ("W", -1.0)],
    &[("HH", -5.0), ("W", -1.0)],
];

pub(super) fn yes_no() -> WordGraphLinguist {
    WordGraphLinguist::new(
        WordGraph::alternatives(vec![
            Word::from_units("yes", &["Y"]),
            Word::from_units("no", &["N"]),
        ]),
        WordGraphConfig::default(),
    )
}

pub(super) fn hello_world() -> WordGraphLinguist {
    WordGraphLinguist::new(
        WordGraph::linear(vec![
            Word::from_units("hello", &["HH"]),
            Word::from_units("world", &["W"]),
        ]),
        WordGraphConfig::default(),
    )
}

/// Runs a word-pruning search with unlimited beams over `frames`.
pub(super) fn recognize(
    linguist: WordGraphLinguist,
    frames: &[&[(&str, f64)]],
    config: WordPruningConfig,
) -> SearchResult {
    let mut manager = WordPruningBreadthFirstSearchManager::new(
        Box::new(linguist),
        Box::new(TableScorer::from_frames(frames)),
        Box::new(SimplePruner),
        vec![ActiveListFactory::new(
            ActiveListKind::Sorting,
            BeamConfig::unlimited(),
        )],
        LogMath::default(),
    )
    .unwrap()
    .with_config(config);
    manager.start_recognition().unwrap();
    manager.recognize_all().unwrap()
}

pub(super) fn sorted(mut paths: Vec<String>) -> Vec<String> {
    paths.sort();
    paths.dedup();
    paths
}

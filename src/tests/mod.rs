//! End-to-end recognition through the facade.

use hark_core::linguist::{Word, WordGraph, WordGraphConfig, WordGraphLinguist};
use hark_core::log_math::LogMath;
use hark_core::scorer::TableScorer;
use hark_core::search::{
    ActiveListFactory, ActiveListKind, BeamConfig, SearchError, SimplePruner,
    WordPruningBreadthFirstSearchManager,
};
use hark_core::settings::{default_toml, parse_settings_toml};
use hark_lattice::{ConfidenceConfig, Lattice};

use super::*;

const YES_NO_FRAMES: [&[(&str, f64)]; 2] = [
    &[("Y", -20000.0), ("N", -40000.0)],
    &[("Y", -20000.0), ("N", -40000.0)],
];

fn yes_no_graph() -> WordGraph {
    WordGraph::alternatives(vec![
        Word::from_units("yes", &["Y"]),
        Word::from_units("no", &["N"]),
    ])
}

fn yes_no() -> Box<WordGraphLinguist> {
    Box::new(WordGraphLinguist::new(
        yes_no_graph(),
        WordGraphConfig::default(),
    ))
}

fn scorer(frames: &[&[(&str, f64)]]) -> Box<TableScorer> {
    Box::new(TableScorer::from_frames(frames))
}

fn default_recognizer(frames: &[&[(&str, f64)]]) -> Recognizer {
    let settings = parse_settings_toml(default_toml()).unwrap();
    let linguist = WordGraphLinguist::from_settings(yes_no_graph(), &settings);
    Recognizer::from_settings(Box::new(linguist), scorer(frames), &settings).unwrap()
}

#[test]
fn recognizes_the_better_word_with_confidence() {
    let recognition = default_recognizer(&YES_NO_FRAMES).recognize().unwrap();
    assert_eq!(recognition.hypothesis(), "yes");
    assert_eq!(recognition.confidence.best_hypothesis(), "<s> yes </s>");

    let yes = &recognition.confidence.best_path[1];
    assert_eq!(yes.word, "yes");
    assert!(yes.confidence > 0.95 && yes.confidence < 1.0, "{}", yes.confidence);
    assert_eq!(
        recognition.confidence.sausage.best_hypothesis_string(),
        "<s> yes </s>"
    );
}

#[test]
fn report_lists_competing_words() {
    let report = default_recognizer(&YES_NO_FRAMES).recognize().unwrap().report();
    assert_eq!(report.hypothesis, "yes");
    assert_eq!(report.frames, 2);
    assert!(report.is_final);
    assert_eq!(report.lattice_nodes, 4);
    assert_eq!(report.slots.len(), 3);
    let middle: Vec<&str> = report.slots[1].iter().map(|h| h.word.as_str()).collect();
    assert_eq!(middle, vec!["yes", "no"]);
    let total: f64 = report.slots[1].iter().map(|h| h.confidence).sum();
    assert!((total - 1.0).abs() < 1e-9);
}

#[test]
fn json_report_reads_back() {
    let recognition = default_recognizer(&YES_NO_FRAMES).recognize().unwrap();
    let json = recognition.to_json().unwrap();
    let report: RecognitionReport = serde_json::from_str(&json).unwrap();
    let expected = recognition.report();
    assert_eq!(report.hypothesis, expected.hypothesis);
    assert_eq!(report.slots.len(), expected.slots.len());
    let words: Vec<&str> = report.words.iter().map(|w| w.word.as_str()).collect();
    assert_eq!(words, vec!["<s>", "yes", "</s>"]);
    for (read, written) in report.words.iter().zip(&expected.words) {
        assert_eq!(read.slot, written.slot);
        assert!((read.confidence - written.confidence).abs() < 1e-12);
    }
}

#[test]
fn dumps_are_written_and_the_lattice_reloads() {
    let recognition = default_recognizer(&YES_NO_FRAMES).recognize().unwrap();
    let dir = tempfile::tempdir().unwrap();
    recognition.save_dumps(dir.path()).unwrap();

    for name in ["map.lat", "map_lattice.gdl", "map_sausage.gdl", "tokens.gdl"] {
        assert!(dir.path().join(name).exists(), "{name}");
    }
    let reloaded = Lattice::open(&dir.path().join("map.lat")).unwrap();
    assert_eq!(reloaded.node_count(), recognition.lattice.node_count());
    assert_eq!(reloaded.edge_count(), recognition.lattice.edge_count());
}

#[test]
fn silence_gives_an_empty_recognition() {
    let recognition = default_recognizer(&[]).recognize().unwrap();
    assert_eq!(recognition.hypothesis(), "");
    assert!(!recognition.lattice.has_path());
    let report = recognition.report();
    assert!(report.words.is_empty());
    assert!(report.slots.is_empty());
}

#[test]
fn explicit_manager_can_be_supplied() {
    let manager = WordPruningBreadthFirstSearchManager::new(
        yes_no(),
        scorer(&YES_NO_FRAMES),
        Box::new(SimplePruner),
        vec![ActiveListFactory::new(
            ActiveListKind::Heap,
            BeamConfig::unlimited(),
        )],
        LogMath::default(),
    )
    .unwrap();
    let mut recognizer = Recognizer::new(Box::new(manager), ConfidenceConfig::default());
    let recognition = recognizer.recognize().unwrap();
    assert_eq!(recognition.hypothesis(), "yes");
}

#[test]
fn search_errors_surface_through_the_facade() {
    let err = EngineError::from(SearchError::NotStarted);
    assert!(matches!(err, EngineError::Search(SearchError::NotStarted)));
    assert_eq!(err.to_string(), "search failed: recognition has not been started");
}

#[test]
fn tracing_setup_can_be_called_repeatedly() {
    let dir = tempfile::tempdir().unwrap();
    trace_init::init_tracing(dir.path());
    trace_init::init_tracing(dir.path());
    assert!(trace_init::DEFAULT_FILTER.contains("hark_lattice=debug"));
    assert!(trace_init::TRACE_FILE.ends_with(".jsonl"));
}

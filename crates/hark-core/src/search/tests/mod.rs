//! Frame-loop tests shared by every search manager.


use std::rc::Rc;

use crate::linguist::{
    Linguist, SearchState, SearchStateArc, StateKind, StateRef, Word, WordGraph,
    WordGraphConfig, WordGraphLinguist,
};
use crate::log_math::LogMath;
use crate::scorer::TableScorer;
use crate::search::{
    ActiveListFactory, ActiveListKind, BeamConfig, BreadthFirstSearchManager, SearchManager,
    SimpleBreadthFirstSearchManager, SimplePruner, WordPruningBreadthFirstSearchManager,
};

/// One state of a hand-built graph.
struct Node {
    kind: StateKind,
    emitting: bool,
    word: Option<Word>,
    label: String,
    arcs: Vec<(usize, f64, f64)>,
}

/// Explicit state graph: arcs carry (target, language, insertion). Node 0
/// is the initial state.
pub(super) struct GraphBuilder {
    nodes: Vec<Node>,
}

impl GraphBuilder {
    pub(super) fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub(super) fn word(&mut self, spelling: &str) -> usize {
        self.push(Node {
            kind: StateKind::WORD,
            emitting: false,
            word: Some(Word::from_units(spelling, &[])),
            label: spelling.to_string(),
            arcs: Vec::new(),
        })
    }

    pub(super) fn unit(&mut self, label: &str) -> usize {
        self.push(Node {
            kind: StateKind::UNIT,
            emitting: false,
            word: None,
            label: label.to_string(),
            arcs: Vec::new(),
        })
    }

    pub(super) fn hmm(&mut self, label: &str) -> usize {
        self.push(Node {
            kind: StateKind::HMM,
            emitting: true,
            word: None,
            label: label.to_string(),
            arcs: Vec::new(),
        })
    }

    pub(super) fn arc(&mut self, from: usize, to: usize, language: f64, insertion: f64) {
        self.nodes[from].arcs.push((to, language, insertion));
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub(super) fn build(self) -> GraphLinguist {
        GraphLinguist {
            nodes: Rc::new(self.nodes),
        }
    }
}

pub(super) struct GraphLinguist {
    nodes: Rc<Vec<Node>>,
}

impl Linguist for GraphLinguist {
    fn initial_state(&self) -> StateRef {
        Rc::new(GraphState {
            nodes: Rc::clone(&self.nodes),
            index: 0,
        })
    }

    fn search_state_order(&self) -> Option<Vec<StateKind>> {
        Some(vec![StateKind::WORD, StateKind::UNIT, StateKind::HMM])
    }
}

struct GraphState {
    nodes: Rc<Vec<Node>>,
    index: usize,
}

impl std::fmt::Debug for GraphState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.label(), self.index)
    }
}

impl SearchState for GraphState {
    fn id(&self) -> usize {
        self.index
    }

    fn kind(&self) -> StateKind {
        self.nodes[self.index].kind
    }

    fn is_emitting(&self) -> bool {
        self.nodes[self.index].emitting
    }

    fn is_final(&self) -> bool {
        self.nodes[self.index]
            .word
            .as_ref()
            .is_some_and(|w| w.is_sentence_end())
    }

    fn successors(&self) -> Vec<SearchStateArc> {
        self.nodes[self.index]
            .arcs
            .iter()
            .map(|&(to, language, insertion)| {
                let state: StateRef = Rc::new(GraphState {
                    nodes: Rc::clone(&self.nodes),
                    index: to,
                });
                SearchStateArc::new(state, language, 0.0, insertion)
            })
            .collect()
    }

    fn word(&self) -> Option<&Word> {
        self.nodes[self.index].word.as_ref()
    }

    fn label(&self) -> String {
        self.nodes[self.index].label.clone()
    }
}

/// `<s> hello world </s>` with one unit per word.
pub(super) fn hello_world() -> WordGraphLinguist {
    WordGraphLinguist::new(
        WordGraph::linear(vec![
            Word::from_units("hello", &["HH"]),
            Word::from_units("world", &["W"]),
        ]),
        WordGraphConfig::default(),
    )
}

/// `<s> (yes | no) </s>`.
pub(super) fn yes_no() -> WordGraphLinguist {
    WordGraphLinguist::new(
        WordGraph::alternatives(vec![
            Word::from_units("yes", &["Y"]),
            Word::from_units("no", &["N"]),
        ]),
        WordGraphConfig::default(),
    )
}

pub(super) fn table(frames: &[&[(&str, f64)]]) -> Box<TableScorer> {
    Box::new(TableScorer::from_frames(frames))
}

pub(super) fn factory(kind: ActiveListKind, beam: BeamConfig) -> ActiveListFactory {
    ActiveListFactory::new(kind, beam)
}

#[derive(Debug, Clone, Copy)]
pub(super) enum Flavor {
    Simple,
    BreadthFirst,
    WordPruning,
}

pub(super) const FLAVORS: [Flavor; 3] = [Flavor::Simple, Flavor::BreadthFirst, Flavor::WordPruning];

pub(super) fn unlimited() -> ActiveListFactory {
    factory(ActiveListKind::Sorting, BeamConfig::unlimited())
}

/// A manager of the given flavor whose emitting tokens live in lists
/// built by `factory`. Non-emitting buckets are unlimited.
pub(super) fn manager(
    flavor: Flavor,
    linguist: impl Linguist + 'static,
    scorer: Box<TableScorer>,
    factory: ActiveListFactory,
) -> Box<dyn SearchManager> {
    let linguist = Box::new(linguist);
    let pruner = Box::new(SimplePruner);
    let log_math = LogMath::default();
    match flavor {
        Flavor::Simple => Box::new(SimpleBreadthFirstSearchManager::new(
            linguist, scorer, pruner, factory, log_math,
        )),
        Flavor::BreadthFirst => Box::new(BreadthFirstSearchManager::new(
            linguist, scorer, pruner, factory, log_math,
        )),
        Flavor::WordPruning => Box::new(
            WordPruningBreadthFirstSearchManager::new(
                linguist,
                scorer,
                pruner,
                vec![unlimited(), unlimited(), factory],
                log_math,
            )
            .unwrap(),
        ),
    }
}

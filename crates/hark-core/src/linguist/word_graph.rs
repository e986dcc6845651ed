//! A small word-grammar linguist.
//!
//! Each grammar word expands into a left-to-right chain: a non-emitting
//! word state that marks the word start, then per pronunciation unit a
//! non-emitting unit state followed by an emitting HMM state with a
//! self-loop. Arcs into a word state carry the language probability,
//! taken from the grammar arc or from an attached [`LanguageModel`], so
//! competing histories meet at the word state.

use std::fmt;
use std::rc::Rc;

use crate::language_model::{LanguageModel, WordSequence};
use crate::log_math::LOG_ONE;
use crate::settings::Settings;

use super::{
    Linguist, SearchState, SearchStateArc, StateKind, StateRef, Word, SENTENCE_END,
    SENTENCE_START,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WordGraphConfig {
    /// Scale applied to every language probability.
    pub language_weight: f64,
    /// Log probability charged when entering a regular word.
    pub word_insertion_probability: f64,
    /// Log probability charged when entering a filler word.
    pub filler_insertion_probability: f64,
    /// Log transition probability of an HMM self-loop.
    pub self_loop_probability: f64,
    /// Log transition probability of leaving an HMM state.
    pub forward_probability: f64,
}

impl Default for WordGraphConfig {
    fn default() -> Self {
        Self {
            language_weight: 1.0,
            word_insertion_probability: LOG_ONE,
            filler_insertion_probability: LOG_ONE,
            self_loop_probability: LOG_ONE,
            forward_probability: LOG_ONE,
        }
    }
}

impl WordGraphConfig {
    /// Takes the language weight from `[search]`; transition and insertion
    /// probabilities keep their defaults.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            language_weight: settings.search.language_weight,
            ..Self::default()
        }
    }
}

/// Word grammar. Index 0 is `<s>` and index 1 is `</s>`.
#[derive(Debug, Clone)]
pub struct WordGraph {
    words: Vec<Word>,
    arcs: Vec<Vec<(usize, f64)>>,
}

impl Default for WordGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl WordGraph {
    pub const START: usize = 0;
    pub const END: usize = 1;

    pub fn new() -> Self {
        Self {
            words: vec![
                Word::from_units(SENTENCE_START, &[]),
                Word::from_units(SENTENCE_END, &[]),
            ],
            arcs: vec![Vec::new(), Vec::new()],
        }
    }

    /// `<s> w1 w2 ... </s>` with certain transitions.
    pub fn linear(words: Vec<Word>) -> Self {
        let mut graph = Self::new();
        let mut prev = Self::START;
        for word in words {
            let idx = graph.add_word(word);
            graph.connect(prev, idx, LOG_ONE);
            prev = idx;
        }
        graph.connect(prev, Self::END, LOG_ONE);
        graph
    }

    /// `<s> (w1 | w2 | ...) </s>`; the acoustics decide between the words.
    pub fn alternatives(words: Vec<Word>) -> Self {
        let mut graph = Self::new();
        for word in words {
            let idx = graph.add_word(word);
            graph.connect(Self::START, idx, LOG_ONE);
            graph.connect(idx, Self::END, LOG_ONE);
        }
        graph
    }

    pub fn add_word(&mut self, word: Word) -> usize {
        self.words.push(word);
        self.arcs.push(Vec::new());
        self.words.len() - 1
    }

    /// Adds a grammar arc with a log probability.
    pub fn connect(&mut self, from: usize, to: usize, log_probability: f64) {
        self.arcs[from].push((to, log_probability));
    }

    pub fn word(&self, idx: usize) -> &Word {
        &self.words[idx]
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        // <s> and </s> are always present
        self.words.len() <= 2
    }

    fn max_units(&self) -> usize {
        self.words.iter().map(|w| w.units().len()).max().unwrap_or(0)
    }
}

struct GraphInner {
    graph: WordGraph,
    config: WordGraphConfig,
    language_model: Option<Box<dyn LanguageModel>>,
    stride: usize,
}

impl GraphInner {
    /// Arcs leaving word `from` towards the start of every grammar successor.
    fn exits(self: &Rc<Self>, from: usize, acoustic: f64) -> Vec<SearchStateArc> {
        self.graph.arcs[from]
            .iter()
            .map(|&(to, grammar_probability)| {
                let word = &self.graph.words[to];
                let language = match &self.language_model {
                    Some(lm) => {
                        let history = WordSequence::new(vec![
                            self.graph.words[from].spelling().to_string(),
                            word.spelling().to_string(),
                        ]);
                        lm.probability(&history.trim(lm.max_depth()))
                    }
                    None => grammar_probability,
                };
                let insertion = if word.is_filler() {
                    self.config.filler_insertion_probability
                } else {
                    self.config.word_insertion_probability
                };
                let state = WordState {
                    graph: Rc::clone(self),
                    word: to,
                };
                SearchStateArc::new(
                    Rc::new(state),
                    language * self.config.language_weight,
                    acoustic,
                    insertion,
                )
            })
            .collect()
    }
}

/// Linguist over a [`WordGraph`].
pub struct WordGraphLinguist {
    inner: Rc<GraphInner>,
}

impl WordGraphLinguist {
    pub fn new(graph: WordGraph, config: WordGraphConfig) -> Self {
        Self::build(graph, config, None)
    }

    pub fn from_settings(graph: WordGraph, settings: &Settings) -> Self {
        Self::new(graph, WordGraphConfig::from_settings(settings))
    }

    /// Word-entry probabilities come from `language_model` instead of the
    /// grammar arcs.
    ///
    /// The model is queried with the previous word and the entered word
    /// only, so it acts as a bigram whatever its depth and longer entries
    /// are never consulted.
    pub fn with_language_model(
        graph: WordGraph,
        config: WordGraphConfig,
        language_model: Box<dyn LanguageModel>,
    ) -> Self {
        Self::build(graph, config, Some(language_model))
    }

    fn build(
        graph: WordGraph,
        config: WordGraphConfig,
        language_model: Option<Box<dyn LanguageModel>>,
    ) -> Self {
        let stride = 1 + 2 * graph.max_units();
        Self {
            inner: Rc::new(GraphInner {
                graph,
                config,
                language_model,
                stride,
            }),
        }
    }

    pub fn graph(&self) -> &WordGraph {
        &self.inner.graph
    }
}

impl Linguist for WordGraphLinguist {
    fn initial_state(&self) -> StateRef {
        Rc::new(WordState {
            graph: Rc::clone(&self.inner),
            word: WordGraph::START,
        })
    }

    fn search_state_order(&self) -> Option<Vec<StateKind>> {
        Some(vec![StateKind::WORD, StateKind::UNIT, StateKind::HMM])
    }
}

/// Start of a word.
struct WordState {
    graph: Rc<GraphInner>,
    word: usize,
}

/// Start of one pronunciation unit.
struct UnitState {
    graph: Rc<GraphInner>,
    word: usize,
    unit: usize,
}

/// The emitting state of one pronunciation unit.
struct HmmState {
    graph: Rc<GraphInner>,
    word: usize,
    unit: usize,
}

impl SearchState for WordState {
    fn id(&self) -> usize {
        self.word * self.graph.stride
    }

    fn kind(&self) -> StateKind {
        StateKind::WORD
    }

    fn is_emitting(&self) -> bool {
        false
    }

    fn is_final(&self) -> bool {
        self.word == WordGraph::END
    }

    fn successors(&self) -> Vec<SearchStateArc> {
        if self.graph.graph.words[self.word].units().is_empty() {
            return self.graph.exits(self.word, LOG_ONE);
        }
        let unit = UnitState {
            graph: Rc::clone(&self.graph),
            word: self.word,
            unit: 0,
        };
        vec![SearchStateArc::new(Rc::new(unit), LOG_ONE, LOG_ONE, LOG_ONE)]
    }

    fn word(&self) -> Option<&Word> {
        Some(&self.graph.graph.words[self.word])
    }

    fn label(&self) -> String {
        self.graph.graph.words[self.word].spelling().to_string()
    }
}

impl SearchState for UnitState {
    fn id(&self) -> usize {
        self.word * self.graph.stride + 1 + 2 * self.unit
    }

    fn kind(&self) -> StateKind {
        StateKind::UNIT
    }

    fn is_emitting(&self) -> bool {
        false
    }

    fn is_final(&self) -> bool {
        false
    }

    fn successors(&self) -> Vec<SearchStateArc> {
        let hmm = HmmState {
            graph: Rc::clone(&self.graph),
            word: self.word,
            unit: self.unit,
        };
        vec![SearchStateArc::new(Rc::new(hmm), LOG_ONE, LOG_ONE, LOG_ONE)]
    }

    fn label(&self) -> String {
        let word = &self.graph.graph.words[self.word];
        format!("{}[{}]", word.spelling(), word.units()[self.unit])
    }
}

impl SearchState for HmmState {
    fn id(&self) -> usize {
        self.word * self.graph.stride + 2 + 2 * self.unit
    }

    fn kind(&self) -> StateKind {
        StateKind::HMM
    }

    fn is_emitting(&self) -> bool {
        true
    }

    fn is_final(&self) -> bool {
        false
    }

    fn successors(&self) -> Vec<SearchStateArc> {
        let config = &self.graph.config;
        let this = HmmState {
            graph: Rc::clone(&self.graph),
            word: self.word,
            unit: self.unit,
        };
        let units = self.graph.graph.words[self.word].units().len();
        let mut arcs = vec![SearchStateArc::new(
            Rc::new(this),
            LOG_ONE,
            config.self_loop_probability,
            LOG_ONE,
        )];
        if self.unit + 1 < units {
            let next = UnitState {
                graph: Rc::clone(&self.graph),
                word: self.word,
                unit: self.unit + 1,
            };
            arcs.push(SearchStateArc::new(
                Rc::new(next),
                LOG_ONE,
                config.forward_probability,
                LOG_ONE,
            ));
        } else {
            arcs.extend(self.graph.exits(self.word, config.forward_probability));
        }
        arcs
    }

    fn label(&self) -> String {
        self.graph.graph.words[self.word].units()[self.unit].clone()
    }
}

macro_rules! debug_by_label {
    ($($ty:ty),*) => {
        $(impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}({})", self.kind(), self.id(), self.label())
            }
        })*
    };
}

debug_by_label!(WordState, UnitState, HmmState);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language_model::NgramModel;
    use crate::log_math::LogMath;

    fn yes_no() -> WordGraphLinguist {
        WordGraphLinguist::new(
            WordGraph::alternatives(vec![
                Word::from_units("yes", &["Y", "S"]),
                Word::from_units("no", &["N"]),
            ]),
            WordGraphConfig::default(),
        )
    }

    #[test]
    fn initial_state_is_sentence_start() {
        let linguist = yes_no();
        let init = linguist.initial_state();
        assert_eq!(init.kind(), StateKind::WORD);
        assert!(!init.is_emitting());
        assert!(!init.is_final());
        assert_eq!(init.word().map(|w| w.spelling()), Some("<s>"));
        let arcs = init.successors();
        assert_eq!(arcs.len(), 2);
        assert_eq!(arcs[0].state.word().map(|w| w.spelling()), Some("yes"));
    }

    #[test]
    fn unit_chain_reaches_sentence_end() {
        let linguist = yes_no();
        let yes = Rc::clone(&linguist.initial_state().successors()[0].state);
        let unit = &yes.successors()[0].state;
        assert_eq!(unit.kind(), StateKind::UNIT);
        let hmm = &unit.successors()[0].state;
        assert!(hmm.is_emitting());
        assert_eq!(hmm.label(), "Y");

        let arcs = hmm.successors();
        assert_eq!(arcs[0].state.id(), hmm.id());
        let next_unit = &arcs[1].state;
        assert_eq!(next_unit.kind(), StateKind::UNIT);
        let s_hmm = &next_unit.successors()[0].state;
        assert_eq!(s_hmm.label(), "S");

        let end = &s_hmm.successors()[1].state;
        assert_eq!(end.word().map(|w| w.spelling()), Some("</s>"));
        assert!(end.is_final());
        assert!(end.successors().is_empty());
    }

    #[test]
    fn state_ids_are_distinct() {
        let linguist = yes_no();
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![linguist.initial_state()];
        while let Some(state) = stack.pop() {
            if seen.insert(state.id()) {
                stack.extend(state.successors().into_iter().map(|a| a.state));
            }
        }
        // <s>, </s>, yes: word + 2 units + 2 hmms, no: word + unit + hmm
        assert_eq!(seen.len(), 2 + 5 + 3);
    }

    #[test]
    fn language_model_overrides_grammar() {
        let lm_math = LogMath::default();
        let mut lm = NgramModel::new(lm_math.linear_to_log(0.01));
        lm.insert(&["<s>", "yes"], lm_math.linear_to_log(0.9));
        lm.insert(&["<s>", "no"], lm_math.linear_to_log(0.1));
        let config = WordGraphConfig {
            language_weight: 2.0,
            ..WordGraphConfig::default()
        };
        let linguist = WordGraphLinguist::with_language_model(
            WordGraph::alternatives(vec![
                Word::from_units("yes", &["Y"]),
                Word::from_units("no", &["N"]),
            ]),
            config,
            Box::new(lm),
        );
        let arcs = linguist.initial_state().successors();
        let expected = 2.0 * lm_math.linear_to_log(0.9);
        assert!((arcs[0].language_probability - expected).abs() < 1e-9);
        assert!(arcs[0].language_probability > arcs[1].language_probability);
    }

    #[test]
    fn search_language_weight_scales_grammar_arcs() {
        let lm_math = LogMath::default();
        let half = lm_math.linear_to_log(0.5);
        let mut graph = WordGraph::new();
        let yes = graph.add_word(Word::from_units("yes", &["Y"]));
        graph.connect(WordGraph::START, yes, half);
        graph.connect(yes, WordGraph::END, LOG_ONE);

        let toml = crate::settings::DEFAULT_SETTINGS_TOML.replacen(
            "language_weight = 1.0",
            "language_weight = 2.0",
            1,
        );
        let settings = crate::settings::parse_settings_toml(&toml).unwrap();
        assert_eq!(settings.search.language_weight, 2.0);
        assert_eq!(settings.lattice.language_weight, 1.0);

        let weighted = WordGraphLinguist::from_settings(graph.clone(), &settings);
        let plain = WordGraphLinguist::new(graph, WordGraphConfig::default());
        let weighted_arc = &weighted.initial_state().successors()[0];
        let plain_arc = &plain.initial_state().successors()[0];
        assert!((plain_arc.language_probability - half).abs() < 1e-9);
        assert!((weighted_arc.language_probability - 2.0 * half).abs() < 1e-9);
        assert_eq!(weighted_arc.insertion_probability, plain_arc.insertion_probability);
    }

    #[test]
    fn deep_model_is_queried_with_a_two_word_history() {
        let lm_math = LogMath::default();
        let mut lm = NgramModel::new(lm_math.linear_to_log(0.01));
        lm.insert(&["<s>", "yes"], lm_math.linear_to_log(0.6));
        lm.insert(&["<s>", "<s>", "yes"], lm_math.linear_to_log(0.9));
        let linguist = WordGraphLinguist::with_language_model(
            WordGraph::alternatives(vec![Word::from_units("yes", &["Y"])]),
            WordGraphConfig::default(),
            Box::new(lm),
        );
        let arc = &linguist.initial_state().successors()[0];
        let expected = lm_math.linear_to_log(0.6);
        assert!((arc.language_probability - expected).abs() < 1e-9);
    }
}

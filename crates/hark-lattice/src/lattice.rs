//! Word lattices.
//!
//! A lattice is a graph of word nodes joined by scored edges, running from
//! one initial node to one terminal node. It is built from the word
//! tokens of a finished [`SearchResult`], including the losing paths the
//! search kept as alternate predecessors, or loaded from a `.LAT` file.
//!
//! Nodes and edges live in arenas and are addressed by index. Removing a
//! node or edge only marks it dead, so indices stay valid for the
//! lifetime of the lattice.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use hark_core::linguist::{is_filler_spelling, SENTENCE_END};
use hark_core::log_math::{LOG_ONE, LOG_ZERO};
use hark_core::search::{AlternateHypothesisManager, SearchResult};
use hark_core::token::{token_key, Token, TokenRef};
use hark_core::LogMath;
use tracing::{debug, debug_span, warn};

use crate::error::LatticeError;

pub type NodeId = usize;
pub type EdgeId = usize;

/// A word hypothesis in the lattice.
#[derive(Debug, Clone)]
pub struct Node {
    /// Identifier used in `.LAT` files.
    pub id: String,
    pub word: String,
    /// Pronunciation units; empty when unknown.
    pub units: Vec<String>,
    /// First frame of the word.
    pub begin: Option<usize>,
    /// Frame at which the following words start.
    pub end: Option<usize>,
    pub forward: f64,
    pub backward: f64,
    /// Log posterior, set by [`Lattice::compute_node_posteriors`].
    pub posterior: f64,
    entering: Vec<EdgeId>,
    leaving: Vec<EdgeId>,
    alive: bool,
}

impl Node {
    fn new(id: String, word: String, begin: Option<usize>, end: Option<usize>) -> Self {
        Self {
            id,
            word,
            units: Vec::new(),
            begin,
            end,
            forward: LOG_ZERO,
            backward: LOG_ZERO,
            posterior: LOG_ZERO,
            entering: Vec::new(),
            leaving: Vec::new(),
            alive: true,
        }
    }

    pub fn entering_edges(&self) -> &[EdgeId] {
        &self.entering
    }

    pub fn leaving_edges(&self) -> &[EdgeId] {
        &self.leaving
    }

    pub fn is_filler(&self) -> bool {
        is_filler_spelling(&self.word)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}[{},{}]", self.word, self.id, frame(self.begin), frame(self.end))
    }
}

fn frame(time: Option<usize>) -> String {
    time.map_or_else(|| "?".to_string(), |t| t.to_string())
}

/// A scored transition between two word nodes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    /// Log acoustic score of the `to` word's segment.
    pub acoustic: f64,
    /// Log language and insertion score of entering the `to` word.
    pub lm: f64,
    alive: bool,
}

impl Edge {
    pub fn score(&self) -> f64 {
        self.acoustic + self.lm
    }
}

#[derive(Debug, Clone)]
pub struct Lattice {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    ids: HashMap<String, NodeId>,
    initial: Option<NodeId>,
    terminal: Option<NodeId>,
    log_math: LogMath,
    next_id: usize,
}

impl Default for Lattice {
    fn default() -> Self {
        Self::new(LogMath::default())
    }
}

impl Lattice {
    pub fn new(log_math: LogMath) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            ids: HashMap::new(),
            initial: None,
            terminal: None,
            log_math,
            next_id: 0,
        }
    }

    /// Builds the word lattice of a finished recognition.
    ///
    /// Every final token contributes its word path. All paths meet in one
    /// `</s>` terminal node and the root word token becomes the initial
    /// node. Alternate predecessors recorded by the search add the word
    /// paths that lost a Viterbi comparison; their last edge is charged
    /// the same transition into the word as the winner's. A result
    /// without final tokens gives a lattice without a path.
    pub fn from_result(result: &SearchResult) -> Self {
        let _span = debug_span!("lattice_from_result", frame = result.frame_number()).entered();
        let mut lattice = Lattice::new(*result.log_math());
        {
            let alternates = result.alternate_hypotheses();
            let mut builder = Builder {
                lattice: &mut lattice,
                alternates: alternates.as_deref(),
                nodes: HashMap::new(),
                pending: Vec::new(),
            };
            for token in result.result_tokens() {
                builder.add_final(token);
            }
            builder.drain();
        }
        lattice.compute_end_times();
        debug!(
            nodes = lattice.node_count(),
            edges = lattice.edge_count(),
            has_path = lattice.has_path()
        );
        lattice
    }

    pub fn log_math(&self) -> &LogMath {
        &self.log_math
    }

    pub fn set_log_math(&mut self, log_math: LogMath) {
        self.log_math = log_math;
    }

    /// Adds a node with a fresh numeric id.
    pub fn add_node(
        &mut self,
        word: impl Into<String>,
        begin: Option<usize>,
        end: Option<usize>,
    ) -> NodeId {
        let id = loop {
            let id = self.next_id.to_string();
            self.next_id += 1;
            if !self.ids.contains_key(&id) {
                break id;
            }
        };
        self.insert_node(Node::new(id, word.into(), begin, end))
    }

    /// Adds a node under an explicit id. Ids are unique.
    pub fn add_node_with_id(
        &mut self,
        id: impl Into<String>,
        word: impl Into<String>,
        begin: Option<usize>,
        end: Option<usize>,
    ) -> Result<NodeId, LatticeError> {
        let id = id.into();
        if self.ids.contains_key(&id) {
            return Err(LatticeError::Inconsistent(format!("duplicate node id {id}")));
        }
        Ok(self.insert_node(Node::new(id, word.into(), begin, end)))
    }

    fn insert_node(&mut self, node: Node) -> NodeId {
        let index = self.nodes.len();
        self.ids.insert(node.id.clone(), index);
        self.nodes.push(node);
        index
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId, acoustic: f64, lm: f64) -> EdgeId {
        let index = self.edges.len();
        self.edges.push(Edge {
            from,
            to,
            acoustic,
            lm,
            alive: true,
        });
        self.nodes[from].leaving.push(index);
        self.nodes[to].entering.push(index);
        index
    }

    /// Adds an edge unless `from` already leads to `to`, in which case the
    /// existing edge keeps whichever scores are better.
    pub fn add_or_merge_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        acoustic: f64,
        lm: f64,
    ) -> EdgeId {
        match self.edge_between(from, to) {
            Some(e) => {
                let edge = &mut self.edges[e];
                if acoustic + lm > edge.score() {
                    edge.acoustic = acoustic;
                    edge.lm = lm;
                }
                e
            }
            None => self.add_edge(from, to, acoustic, lm),
        }
    }

    pub fn node(&self, node: NodeId) -> &Node {
        &self.nodes[node]
    }

    pub fn node_mut(&mut self, node: NodeId) -> &mut Node {
        &mut self.nodes[node]
    }

    pub fn edge(&self, edge: EdgeId) -> &Edge {
        &self.edges[edge]
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.get(node).is_some_and(|n| n.alive)
    }

    /// Live nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().filter(|(_, n)| n.alive)
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes().map(|(i, _)| i).collect()
    }

    /// Live edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges.iter().enumerate().filter(|(_, e)| e.alive)
    }

    pub fn node_count(&self) -> usize {
        self.nodes().count()
    }

    pub fn edge_count(&self) -> usize {
        self.edges().count()
    }

    /// Highest node index ever handed out, plus one.
    pub fn node_capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn find_node(&self, id: &str) -> Option<NodeId> {
        self.ids.get(id).copied()
    }

    pub fn edge_between(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        self.nodes[from]
            .leaving
            .iter()
            .copied()
            .find(|&e| self.edges[e].to == to)
    }

    pub fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[node].leaving.iter().map(|&e| self.edges[e].to)
    }

    pub fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[node].entering.iter().map(|&e| self.edges[e].from)
    }

    pub fn initial_node(&self) -> Option<NodeId> {
        self.initial
    }

    pub fn terminal_node(&self) -> Option<NodeId> {
        self.terminal
    }

    pub fn set_initial_node(&mut self, node: NodeId) {
        self.initial = Some(node);
    }

    pub fn set_terminal_node(&mut self, node: NodeId) {
        self.terminal = Some(node);
    }

    /// Both ends are known.
    pub fn has_path(&self) -> bool {
        self.initial.is_some() && self.terminal.is_some()
    }

    pub fn remove_edge(&mut self, edge: EdgeId) {
        let Edge { from, to, alive, .. } = self.edges[edge];
        if !alive {
            return;
        }
        self.edges[edge].alive = false;
        self.nodes[from].leaving.retain(|&e| e != edge);
        self.nodes[to].entering.retain(|&e| e != edge);
    }

    /// Removes `node` together with every edge touching it.
    pub fn remove_node_and_edges(&mut self, node: NodeId) {
        if !self.contains_node(node) {
            return;
        }
        let touching: Vec<EdgeId> = self.nodes[node]
            .entering
            .iter()
            .chain(&self.nodes[node].leaving)
            .copied()
            .collect();
        for edge in touching {
            self.remove_edge(edge);
        }
        let n = &mut self.nodes[node];
        n.alive = false;
        self.ids.remove(&n.id);
        if self.initial == Some(node) {
            self.initial = None;
        }
        if self.terminal == Some(node) {
            self.terminal = None;
        }
    }

    /// Removes `node` and joins each of its predecessors to each of its
    /// successors; a new edge carries the summed scores of the two edges
    /// it replaces.
    pub fn remove_node_and_cross_connect_edges(&mut self, node: NodeId) {
        if !self.contains_node(node) {
            return;
        }
        debug!(node = %self.nodes[node], "cross connecting");
        let entering: Vec<Edge> = self.nodes[node]
            .entering
            .iter()
            .map(|&e| self.edges[e])
            .collect();
        let leaving: Vec<Edge> = self.nodes[node]
            .leaving
            .iter()
            .map(|&e| self.edges[e])
            .collect();
        for ei in &entering {
            for ej in &leaving {
                self.add_or_merge_edge(
                    ei.from,
                    ej.to,
                    ei.acoustic + ej.acoustic,
                    ei.lm + ej.lm,
                );
            }
        }
        self.remove_node_and_edges(node);
    }

    /// Word sequences of every path from the initial to the terminal node.
    pub fn all_paths(&self) -> Vec<String> {
        let (Some(initial), Some(terminal)) = (self.initial, self.terminal) else {
            return Vec::new();
        };
        let mut paths = Vec::new();
        let mut stack = vec![(initial, vec![self.nodes[initial].word.as_str()])];
        while let Some((node, words)) = stack.pop() {
            if node == terminal {
                paths.push(words.join(" "));
                continue;
            }
            for &e in self.nodes[node].leaving.iter().rev() {
                let to = self.edges[e].to;
                let mut next = words.clone();
                next.push(self.nodes[to].word.as_str());
                stack.push((to, next));
            }
        }
        paths
    }

    /// Nodes reachable from the initial node, every node before its
    /// successors.
    pub fn sort_nodes(&self) -> Vec<NodeId> {
        let Some(initial) = self.initial else {
            return Vec::new();
        };
        let mut visited = vec![false; self.nodes.len()];
        let mut order = Vec::new();
        let mut stack = vec![(initial, 0usize)];
        visited[initial] = true;
        while let Some(&(node, next)) = stack.last() {
            let leaving = &self.nodes[node].leaving;
            if next < leaving.len() {
                let top = stack.len() - 1;
                stack[top].1 += 1;
                let to = self.edges[leaving[next]].to;
                if !visited[to] {
                    visited[to] = true;
                    stack.push((to, 0));
                }
            } else {
                order.push(node);
                stack.pop();
            }
        }
        order.reverse();
        order
    }

    /// Checks that nodes and edges reference each other consistently.
    pub fn check_consistency(&self) -> Result<(), LatticeError> {
        for (index, node) in self.nodes() {
            for &e in &node.entering {
                let edge = &self.edges[e];
                if !edge.alive || edge.to != index {
                    return Err(LatticeError::Inconsistent(format!(
                        "node {node} lists a missing entering edge"
                    )));
                }
            }
            for &e in &node.leaving {
                let edge = &self.edges[e];
                if !edge.alive || edge.from != index {
                    return Err(LatticeError::Inconsistent(format!(
                        "node {node} lists a missing leaving edge"
                    )));
                }
            }
        }
        for (index, edge) in self.edges() {
            if !self.contains_node(edge.from) || !self.contains_node(edge.to) {
                return Err(LatticeError::Inconsistent(format!(
                    "edge {index} joins a missing node"
                )));
            }
            if !self.nodes[edge.from].leaving.contains(&index)
                || !self.nodes[edge.to].entering.contains(&index)
            {
                return Err(LatticeError::Inconsistent(format!(
                    "edge {index} is not listed by its nodes"
                )));
            }
        }
        for (kind, end) in [("initial", self.initial), ("terminal", self.terminal)] {
            if end.is_some_and(|n| !self.contains_node(n)) {
                return Err(LatticeError::Inconsistent(format!("{kind} node was removed")));
            }
        }
        Ok(())
    }

    /// Sets each node's end to the earliest begin among its successors;
    /// a node without successors ends where it begins.
    pub fn compute_end_times(&mut self) {
        for index in self.node_ids() {
            let end = self
                .successors(index)
                .filter_map(|s| self.nodes[s].begin)
                .min()
                .or(self.nodes[index].begin);
            self.nodes[index].end = end;
        }
    }

    /// Forward-backward over the lattice. Acoustic scores are divided by
    /// `language_weight`; each node's posterior is its forward plus
    /// backward score, normalised by the total score of the lattice.
    pub fn compute_node_posteriors(&mut self, language_weight: f64) -> Result<(), LatticeError> {
        let _span = debug_span!("compute_node_posteriors", language_weight).entered();
        let initial = self.initial.ok_or(LatticeError::MissingNode("initial"))?;
        let terminal = self.terminal.ok_or(LatticeError::MissingNode("terminal"))?;
        for node in &mut self.nodes {
            node.forward = LOG_ZERO;
            node.backward = LOG_ZERO;
            node.posterior = LOG_ZERO;
        }
        let sorted = self.sort_nodes();
        if !sorted.contains(&terminal) {
            return Err(LatticeError::Inconsistent(
                "terminal node is not reachable from the initial node".to_string(),
            ));
        }
        let log_math = self.log_math;

        self.nodes[initial].forward = LOG_ONE;
        for &node in &sorted {
            for i in 0..self.nodes[node].leaving.len() {
                let edge = self.edges[self.nodes[node].leaving[i]];
                let score =
                    self.nodes[node].forward + edge.acoustic / language_weight + edge.lm;
                let to = &mut self.nodes[edge.to];
                to.forward = log_math.add(to.forward, score);
            }
        }

        self.nodes[terminal].backward = LOG_ONE;
        for &node in sorted.iter().rev() {
            for i in 0..self.nodes[node].leaving.len() {
                let edge = self.edges[self.nodes[node].leaving[i]];
                let score =
                    self.nodes[edge.to].backward + edge.acoustic / language_weight + edge.lm;
                let from = &mut self.nodes[node];
                from.backward = log_math.add(from.backward, score);
            }
        }

        let total = self.nodes[terminal].forward;
        for &node in &sorted {
            let n = &mut self.nodes[node];
            if n.forward > LOG_ZERO && n.backward > LOG_ZERO {
                n.posterior = n.forward + n.backward - total;
            }
        }
        debug!(total, nodes = sorted.len());
        Ok(())
    }
}

/// Walks back from `start` to the nearest word token, summing the
/// language and insertion scores of the tokens passed on the way.
fn word_at_or_before(start: Option<&TokenRef>, mut lm: f64) -> Option<(TokenRef, f64)> {
    let mut cur = start;
    while let Some(token) = cur {
        if token.is_word() {
            return Some((Rc::clone(token), lm));
        }
        lm += token.language_score() + token.insertion_score();
        cur = token.predecessor();
    }
    None
}

fn entry_score(token: &Token) -> f64 {
    token.language_score() + token.insertion_score()
}

struct Builder<'a> {
    lattice: &'a mut Lattice,
    alternates: Option<&'a AlternateHypothesisManager>,
    nodes: HashMap<*const Token, NodeId>,
    /// Word tokens whose incoming edges are still to be added.
    pending: Vec<(NodeId, TokenRef)>,
}

impl Builder<'_> {
    /// Final words ending in `</s>` become the terminal node itself; any
    /// other final word gets its own node with a free edge into it.
    fn add_final(&mut self, token: &TokenRef) {
        let Some((word, _)) = word_at_or_before(Some(token), 0.0) else {
            warn!(token = %token, "final token has no word on its path");
            return;
        };
        let key = token_key(&word);
        if self.nodes.contains_key(&key) {
            return;
        }
        let terminal = self.terminal(word.frame());
        if word.word().is_some_and(|w| w.is_sentence_end()) {
            self.nodes.insert(key, terminal);
            self.pending.push((terminal, word));
        } else {
            let node = self.add_token_node(&word);
            self.nodes.insert(key, node);
            self.lattice.add_or_merge_edge(node, terminal, LOG_ONE, LOG_ONE);
            self.pending.push((node, word));
        }
    }

    fn terminal(&mut self, frame: usize) -> NodeId {
        match self.lattice.terminal {
            Some(terminal) => {
                let node = self.lattice.node_mut(terminal);
                node.begin = Some(node.begin.map_or(frame, |b| b.min(frame)));
                terminal
            }
            None => {
                let terminal = self.lattice.add_node(SENTENCE_END, Some(frame), None);
                self.lattice.terminal = Some(terminal);
                terminal
            }
        }
    }

    fn add_token_node(&mut self, token: &Token) -> NodeId {
        let (word, units) = match token.word() {
            Some(w) => (w.spelling().to_string(), w.units().to_vec()),
            None => (token.search_state().label(), Vec::new()),
        };
        let node = self.lattice.add_node(word, Some(token.frame()), None);
        self.lattice.node_mut(node).units = units;
        node
    }

    fn drain(&mut self) {
        let alternates = self.alternates;
        while let Some((node, word)) = self.pending.pop() {
            match word_at_or_before(word.predecessor(), entry_score(&word)) {
                Some((previous, lm)) => {
                    let acoustic = word.score() - previous.score() - lm;
                    self.connect(&previous, node, acoustic, lm);
                }
                None => match self.lattice.initial {
                    None => self.lattice.initial = Some(node),
                    Some(initial) if initial != node => {
                        warn!(token = %word, "second path start ignored");
                    }
                    Some(_) => {}
                },
            }

            let Some(losers) = alternates.and_then(|a| a.alternate_predecessors(&word)) else {
                continue;
            };
            // transition charged on the arc into the word state, shared by
            // every path that enters it
            let transition = word
                .predecessor()
                .map_or(LOG_ONE, |p| word.score() - p.score() - entry_score(&word));
            for loser in losers {
                let Some((previous, lm)) = word_at_or_before(Some(loser), 0.0) else {
                    continue;
                };
                let acoustic = loser.score() + transition - previous.score() - lm;
                self.connect(&previous, node, acoustic, lm + entry_score(&word));
            }
        }
    }

    fn connect(&mut self, previous: &TokenRef, to: NodeId, acoustic: f64, lm: f64) {
        let key = token_key(previous);
        let from = match self.nodes.get(&key) {
            Some(&node) => node,
            None => {
                let node = self.add_token_node(previous);
                self.nodes.insert(key, node);
                self.pending.push((node, Rc::clone(previous)));
                node
            }
        };
        self.lattice.add_or_merge_edge(from, to, acoustic, lm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 0 -> 1 -> 4, 0 -> 1a -> 2a -> 4, 0 -> 2 -> 3 -> 4, 1 -> 3
    fn diamond() -> (Lattice, Vec<NodeId>) {
        let mut l = Lattice::default();
        let n0 = l.add_node_with_id("0", "0", Some(0), None).unwrap();
        let n1 = l.add_node_with_id("1", "1", Some(1), None).unwrap();
        let n1a = l.add_node_with_id("1a", "1", Some(1), None).unwrap();
        let n2 = l.add_node_with_id("2", "2", Some(1), None).unwrap();
        let n2a = l.add_node_with_id("2a", "2", Some(2), None).unwrap();
        let n3 = l.add_node_with_id("3", "3", Some(2), None).unwrap();
        let n4 = l.add_node_with_id("4", "4", Some(3), None).unwrap();
        l.add_edge(n0, n1, -1.0, 0.0);
        l.add_edge(n0, n1a, -1.0, 0.0);
        l.add_edge(n1, n4, -1.0, 0.0);
        l.add_edge(n1a, n2a, -1.0, 0.0);
        l.add_edge(n2a, n4, -1.0, 0.0);
        l.add_edge(n0, n2, -1.0, 0.0);
        l.add_edge(n2, n3, -1.0, 0.0);
        l.add_edge(n1, n3, -1.0, 0.0);
        l.add_edge(n3, n4, -1.0, 0.0);
        l.set_initial_node(n0);
        l.set_terminal_node(n4);
        (l, vec![n0, n1, n1a, n2, n2a, n3, n4])
    }

    fn sorted(mut paths: Vec<String>) -> Vec<String> {
        paths.sort();
        paths
    }

    #[test]
    fn all_paths_enumerates_words() {
        let (l, _) = diamond();
        assert_eq!(
            sorted(l.all_paths()),
            vec!["0 1 2 4", "0 1 3 4", "0 1 4", "0 2 3 4"]
        );
    }

    #[test]
    fn sort_puts_predecessors_first() {
        let (l, _) = diamond();
        let order = l.sort_nodes();
        assert_eq!(order.len(), 7);
        assert_eq!(order[0], l.initial_node().unwrap());
        assert_eq!(*order.last().unwrap(), l.terminal_node().unwrap());
        let position: HashMap<NodeId, usize> =
            order.iter().enumerate().map(|(i, &n)| (n, i)).collect();
        for (_, edge) in l.edges() {
            assert!(position[&edge.from] < position[&edge.to]);
        }
    }

    #[test]
    fn remove_node_drops_its_edges() {
        let (mut l, n) = diamond();
        l.remove_node_and_edges(n[1]);
        assert!(l.check_consistency().is_ok());
        assert_eq!(l.node_count(), 6);
        assert_eq!(l.edge_count(), 6);
        assert_eq!(l.find_node("1"), None);
        assert_eq!(sorted(l.all_paths()), vec!["0 1 2 4", "0 2 3 4"]);
    }

    #[test]
    fn cross_connect_keeps_reachability() {
        let (mut l, n) = diamond();
        l.remove_node_and_cross_connect_edges(n[3]);
        assert!(l.check_consistency().is_ok());
        let e = l.edge_between(n[0], n[5]).unwrap();
        assert_eq!(l.edge(e).acoustic, -2.0);
        assert_eq!(sorted(l.all_paths()), vec!["0 1 2 4", "0 1 3 4", "0 1 4", "0 3 4"]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut l = Lattice::default();
        l.add_node_with_id("a", "x", None, None).unwrap();
        assert!(matches!(
            l.add_node_with_id("a", "y", None, None),
            Err(LatticeError::Inconsistent(_))
        ));
        // generated ids skip taken ones
        l.add_node_with_id("0", "z", None, None).unwrap();
        let fresh = l.add_node("w", None, None);
        assert_eq!(l.node(fresh).id, "1");
    }

    #[test]
    fn merge_edge_keeps_the_better_score() {
        let mut l = Lattice::default();
        let a = l.add_node("a", None, None);
        let b = l.add_node("b", None, None);
        let e = l.add_or_merge_edge(a, b, -5.0, -1.0);
        assert_eq!(l.add_or_merge_edge(a, b, -2.0, -1.0), e);
        assert_eq!(l.add_or_merge_edge(a, b, -9.0, 0.0), e);
        assert_eq!(l.edge(e).acoustic, -2.0);
        assert_eq!(l.edge_count(), 1);
    }

    #[test]
    fn end_times_follow_successors() {
        let (mut l, n) = diamond();
        l.compute_end_times();
        assert_eq!(l.node(n[0]).end, Some(1));
        assert_eq!(l.node(n[1]).end, Some(2));
        assert_eq!(l.node(n[6]).end, Some(3));
    }

    #[test]
    fn posteriors_of_a_single_path_are_one() {
        let mut l = Lattice::default();
        let a = l.add_node("<s>", Some(0), None);
        let b = l.add_node("x", Some(0), None);
        let c = l.add_node("</s>", Some(2), None);
        l.add_edge(a, b, -10.0, -2.0);
        l.add_edge(b, c, -30.0, 0.0);
        l.set_initial_node(a);
        l.set_terminal_node(c);
        l.compute_node_posteriors(1.0).unwrap();
        for id in [a, b, c] {
            assert!(l.node(id).posterior.abs() < 1e-6);
        }
    }

    #[test]
    fn posteriors_split_between_branches() {
        let log_math = LogMath::new(std::f64::consts::E);
        let mut l = Lattice::new(log_math);
        let s = l.add_node("<s>", Some(0), None);
        let yes = l.add_node("yes", Some(0), None);
        let no = l.add_node("no", Some(0), None);
        let e = l.add_node("</s>", Some(3), None);
        l.add_edge(s, yes, 3f64.ln(), 0.0);
        l.add_edge(s, no, 0.0, 0.0);
        l.add_edge(yes, e, 0.0, 0.0);
        l.add_edge(no, e, 0.0, 0.0);
        l.set_initial_node(s);
        l.set_terminal_node(e);
        l.compute_node_posteriors(1.0).unwrap();
        let p_yes = log_math.log_to_linear(l.node(yes).posterior);
        let p_no = log_math.log_to_linear(l.node(no).posterior);
        assert!((p_yes - 0.75).abs() < 1e-9);
        assert!((p_no - 0.25).abs() < 1e-9);
        assert!((log_math.log_to_linear(l.node(e).posterior) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn language_weight_scales_acoustics() {
        let log_math = LogMath::new(std::f64::consts::E);
        let mut l = Lattice::new(log_math);
        let s = l.add_node("<s>", None, None);
        let a = l.add_node("a", None, None);
        let b = l.add_node("b", None, None);
        let e = l.add_node("</s>", None, None);
        l.add_edge(s, a, 4f64.ln() * 2.0, 0.0);
        l.add_edge(s, b, 0.0, 0.0);
        l.add_edge(a, e, 0.0, 0.0);
        l.add_edge(b, e, 0.0, 0.0);
        l.set_initial_node(s);
        l.set_terminal_node(e);
        l.compute_node_posteriors(2.0).unwrap();
        let p_a = log_math.log_to_linear(l.node(a).posterior);
        assert!((p_a - 0.8).abs() < 1e-9);
    }

    #[test]
    fn posteriors_need_both_ends() {
        let mut l = Lattice::default();
        l.add_node("x", None, None);
        assert!(matches!(
            l.compute_node_posteriors(1.0),
            Err(LatticeError::MissingNode("initial"))
        ));
    }

    #[test]
    fn empty_lattice_has_no_paths() {
        let l = Lattice::default();
        assert!(!l.has_path());
        assert!(l.all_paths().is_empty());
        assert!(l.sort_nodes().is_empty());
        assert!(l.check_consistency().is_ok());
    }
}

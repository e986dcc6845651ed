//! Lattice minimisation.
//!
//! Two nodes with the same word can be merged without changing the set of
//! word sequences the lattice accepts when they are reached from exactly
//! the same nodes (forward pass) or lead to exactly the same nodes
//! (backward pass). Each pass runs to a fixed point and the pair of passes
//! repeats until neither finds a merge, so an optimised lattice has no
//! equivalent pair left. Nodes without a way in or out are dropped.

use std::collections::BTreeSet;

use tracing::{debug, debug_span};

use crate::lattice::{Lattice, NodeId};

pub struct LatticeOptimizer<'a> {
    lattice: &'a mut Lattice,
}

impl<'a> LatticeOptimizer<'a> {
    pub fn new(lattice: &'a mut Lattice) -> Self {
        Self { lattice }
    }

    pub fn optimize(&mut self) {
        let _span = debug_span!("optimize").entered();
        let before = (self.lattice.node_count(), self.lattice.edge_count());
        let (mut forward, mut backward, mut hanging) = (0, 0, 0);
        // a backward merge can make two successors equivalent again
        loop {
            forward += self.optimize_forward();
            let merged = self.optimize_backward();
            let removed = self.remove_hanging_nodes();
            backward += merged;
            hanging += removed;
            if merged == 0 && removed == 0 {
                break;
            }
        }
        debug!(
            nodes_before = before.0,
            edges_before = before.1,
            nodes = self.lattice.node_count(),
            edges = self.lattice.edge_count(),
            forward,
            backward,
            hanging
        );
    }

    /// Merges successors that share their word and predecessor set.
    /// Returns the number of merges.
    pub fn optimize_forward(&mut self) -> usize {
        self.run(|lattice, node| {
            let targets = distinct(lattice.successors(node));
            find_pair(lattice, &targets, |l, n| distinct(l.predecessors(n)))
        })
    }

    /// Merges predecessors that share their word and successor set.
    /// Returns the number of merges.
    pub fn optimize_backward(&mut self) -> usize {
        self.run(|lattice, node| {
            let sources = distinct(lattice.predecessors(node));
            find_pair(lattice, &sources, |l, n| distinct(l.successors(n)))
        })
    }

    fn run(&mut self, pair_at: impl Fn(&Lattice, NodeId) -> Option<(NodeId, NodeId)>) -> usize {
        let mut merges = 0;
        loop {
            let mut changed = false;
            for node in self.lattice.node_ids() {
                if !self.lattice.contains_node(node) {
                    continue;
                }
                if let Some((a, b)) = pair_at(self.lattice, node) {
                    self.merge(a, b);
                    merges += 1;
                    changed = true;
                }
            }
            if !changed {
                return merges;
            }
        }
    }

    /// Folds one node of an equivalent pair into the other. The union of
    /// both nodes' edges survives; a duplicate edge keeps the better
    /// score.
    fn merge(&mut self, a: NodeId, b: NodeId) {
        let lattice = &mut *self.lattice;
        let (keep, gone) = if lattice.initial_node() == Some(b) || lattice.terminal_node() == Some(b)
        {
            (b, a)
        } else {
            (a, b)
        };
        let entering: Vec<_> = lattice
            .node(gone)
            .entering_edges()
            .iter()
            .map(|&e| *lattice.edge(e))
            .collect();
        let leaving: Vec<_> = lattice
            .node(gone)
            .leaving_edges()
            .iter()
            .map(|&e| *lattice.edge(e))
            .collect();
        for edge in entering {
            lattice.add_or_merge_edge(edge.from, keep, edge.acoustic, edge.lm);
        }
        for edge in leaving {
            lattice.add_or_merge_edge(keep, edge.to, edge.acoustic, edge.lm);
        }
        let (begin, end) = {
            let g = lattice.node(gone);
            (g.begin, g.end)
        };
        let k = lattice.node_mut(keep);
        k.begin = earliest(k.begin, begin);
        k.end = latest(k.end, end);
        lattice.remove_node_and_edges(gone);
    }

    /// Drops nodes other than the two ends that have no entering or no
    /// leaving edge, until none are left. Returns the number removed.
    pub fn remove_hanging_nodes(&mut self) -> usize {
        let mut removed = 0;
        loop {
            let hanging: Vec<NodeId> = self
                .lattice
                .nodes()
                .filter(|&(id, node)| {
                    Some(id) != self.lattice.initial_node()
                        && Some(id) != self.lattice.terminal_node()
                        && (node.entering_edges().is_empty() || node.leaving_edges().is_empty())
                })
                .map(|(id, _)| id)
                .collect();
            if hanging.is_empty() {
                return removed;
            }
            for node in hanging {
                self.lattice.remove_node_and_edges(node);
                removed += 1;
            }
        }
    }
}

fn distinct(nodes: impl Iterator<Item = NodeId>) -> Vec<NodeId> {
    let mut nodes: Vec<NodeId> = nodes.collect();
    nodes.sort_unstable();
    nodes.dedup();
    nodes
}

/// First pair among `candidates` with the same word and the same
/// neighbour set.
fn find_pair(
    lattice: &Lattice,
    candidates: &[NodeId],
    neighbours: impl Fn(&Lattice, NodeId) -> Vec<NodeId>,
) -> Option<(NodeId, NodeId)> {
    for (j, &a) in candidates.iter().enumerate() {
        for &b in &candidates[j + 1..] {
            if lattice.node(a).word != lattice.node(b).word {
                continue;
            }
            let na: BTreeSet<NodeId> = neighbours(lattice, a).into_iter().collect();
            let nb: BTreeSet<NodeId> = neighbours(lattice, b).into_iter().collect();
            if na == nb {
                return Some((a, b));
            }
        }
    }
    None
}

fn earliest(a: Option<usize>, b: Option<usize>) -> Option<usize> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn latest(a: Option<usize>, b: Option<usize>) -> Option<usize> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

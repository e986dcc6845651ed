//! Lattice to confusion network conversion.
//!
//! Every lattice node starts in its own cluster. Clusters holding the
//! same word at overlapping times are merged first (intra-word
//! clustering), then clusters of different words are merged by phonetic
//! similarity weighted by posterior (inter-word clustering). Two clusters
//! are never merged when a node of one can reach a node of the other, so
//! the clusters can be laid out in time order as the slots of a
//! [`Sausage`].

use std::collections::{BTreeMap, BTreeSet};

use hark_core::LogMath;
use tracing::{debug, debug_span};

use crate::lattice::{Lattice, NodeId};
use crate::sausage::Sausage;

/// Default linear mass a slot may lack before a `<noop>` is added.
pub const DEFAULT_BLANK_EPSILON: f64 = 1e-4;

type Cluster = Vec<NodeId>;

pub struct SausageMaker<'a> {
    lattice: &'a Lattice,
    /// `reach[a][b]`: some path leads from `a` to `b`.
    reach: Vec<Vec<bool>>,
    blank_epsilon: f64,
}

impl<'a> SausageMaker<'a> {
    /// The lattice should already carry node posteriors.
    pub fn new(lattice: &'a Lattice) -> Self {
        Self {
            lattice,
            reach: reachability(lattice),
            blank_epsilon: DEFAULT_BLANK_EPSILON,
        }
    }

    pub fn with_blank_epsilon(mut self, epsilon: f64) -> Self {
        self.blank_epsilon = epsilon;
        self
    }

    pub fn make_sausage(&self) -> Sausage {
        let _span = debug_span!("make_sausage", nodes = self.lattice.node_count()).entered();
        let clusters = self.clusters();
        let log_math = self.lattice.log_math();
        let mut sausage = Sausage::new(clusters.len());
        for (slot, cluster) in clusters.iter().enumerate() {
            for (word, posterior) in self.word_posteriors(cluster) {
                sausage.add_word_hypothesis(slot, word, posterior);
            }
        }
        sausage.fill_in_blanks(log_math, self.blank_epsilon);
        debug!(slots = sausage.size(), best = %sausage.best_hypothesis_string());
        sausage
    }

    /// Clustered nodes in slot order.
    pub fn clusters(&self) -> Vec<Vec<NodeId>> {
        let mut clusters: Vec<Cluster> =
            self.lattice.node_ids().into_iter().map(|n| vec![n]).collect();
        let intra = self.merge_while(&mut clusters, |a, b| self.intra_word_similarity(a, b));
        let inter = self.merge_while(&mut clusters, |a, b| self.inter_word_similarity(a, b));
        debug!(intra, inter, clusters = clusters.len());
        self.order(clusters)
    }

    /// Repeatedly merges the most similar pair of clusters until no pair
    /// has a similarity. Returns the number of merges.
    fn merge_while(
        &self,
        clusters: &mut Vec<Cluster>,
        similarity: impl Fn(&[NodeId], &[NodeId]) -> Option<f64>,
    ) -> usize {
        let mut merges = 0;
        loop {
            let mut best: Option<(f64, usize, usize)> = None;
            for i in 0..clusters.len() {
                for j in i + 1..clusters.len() {
                    let Some(sim) = similarity(&clusters[i], &clusters[j]) else {
                        continue;
                    };
                    if best.map_or(true, |(s, _, _)| sim > s) {
                        best = Some((sim, i, j));
                    }
                }
            }
            let Some((_, i, j)) = best else {
                return merges;
            };
            let absorbed = clusters.remove(j);
            clusters[i].extend(absorbed);
            merges += 1;
        }
    }

    fn related(&self, a: NodeId, b: NodeId) -> bool {
        self.reach[a][b] || self.reach[b][a]
    }

    fn any_related(&self, c1: &[NodeId], c2: &[NodeId]) -> bool {
        c1.iter().any(|&a| c2.iter().any(|&b| self.related(a, b)))
    }

    /// Best time overlap between nodes of two same-word clusters, in the
    /// log domain and weighted by both posteriors.
    fn intra_word_similarity(&self, c1: &[NodeId], c2: &[NodeId]) -> Option<f64> {
        let log_math = self.lattice.log_math();
        let mut best = None;
        for &a in c1 {
            for &b in c2 {
                let (na, nb) = (self.lattice.node(a), self.lattice.node(b));
                if na.word != nb.word || self.related(a, b) {
                    return None;
                }
                let Some(overlap) = overlap(na.begin, na.end, nb.begin, nb.end) else {
                    continue;
                };
                let sim = log_math.linear_to_log(overlap as f64) + na.posterior + nb.posterior;
                if best.map_or(true, |s| sim > s) {
                    best = Some(sim);
                }
            }
        }
        best
    }

    /// Average phonetic similarity over the distinct word pairs of two
    /// clusters, each pair weighted by the words' posterior mass.
    fn inter_word_similarity(&self, c1: &[NodeId], c2: &[NodeId]) -> Option<f64> {
        if self.any_related(c1, c2) {
            return None;
        }
        let log_math = self.lattice.log_math();
        let words1 = self.word_posteriors(c1);
        let words2 = self.word_posteriors(c2);
        let mut total = log_math.log_zero();
        let mut pairs = 0usize;
        for (w1, p1) in &words1 {
            let u1 = self.units_of(c1, w1);
            for (w2, p2) in &words2 {
                let u2 = self.units_of(c2, w2);
                let sim = log_math.linear_to_log(phonetic_similarity(&u1, &u2)) + p1 + p2;
                total = log_math.add(total, sim);
                pairs += 1;
            }
        }
        if pairs == 0 {
            return None;
        }
        Some(total - log_math.linear_to_log(pairs as f64))
    }

    /// Summed posterior of each distinct word in a cluster.
    fn word_posteriors(&self, cluster: &[NodeId]) -> BTreeMap<&'a str, f64> {
        let log_math: &LogMath = self.lattice.log_math();
        let mut words: BTreeMap<&'a str, f64> = BTreeMap::new();
        for &n in cluster {
            let node = self.lattice.node(n);
            let p = words.entry(node.word.as_str()).or_insert(log_math.log_zero());
            *p = log_math.add(*p, node.posterior);
        }
        words
    }

    /// Pronunciation of the first node spelling `word`, or its letters
    /// when the lattice carries no units.
    fn units_of(&self, cluster: &[NodeId], word: &str) -> Vec<String> {
        cluster
            .iter()
            .map(|&n| self.lattice.node(n))
            .find(|node| node.word == word && !node.units.is_empty())
            .map(|node| node.units.clone())
            .unwrap_or_else(|| word.chars().map(String::from).collect())
    }

    /// Topological order of the clusters: a cluster comes after every
    /// cluster holding an ancestor of one of its nodes. Ready clusters are
    /// taken earliest first.
    fn order(&self, clusters: Vec<Cluster>) -> Vec<Cluster> {
        let n = clusters.len();
        let key = |c: &Cluster| {
            let begin = c
                .iter()
                .filter_map(|&id| self.lattice.node(id).begin)
                .min()
                .unwrap_or(usize::MAX);
            let first = c.iter().copied().min().unwrap_or(usize::MAX);
            (begin, first)
        };
        let mut before = vec![BTreeSet::new(); n];
        let mut blocking = vec![0usize; n];
        for i in 0..n {
            for j in 0..n {
                let precedes = i != j
                    && clusters[i]
                        .iter()
                        .any(|&a| clusters[j].iter().any(|&b| self.reach[a][b]));
                if precedes {
                    before[i].insert(j);
                    blocking[j] += 1;
                }
            }
        }
        let mut ready: BTreeSet<((usize, usize), usize)> = (0..n)
            .filter(|&i| blocking[i] == 0)
            .map(|i| (key(&clusters[i]), i))
            .collect();
        let mut order = Vec::with_capacity(n);
        let mut placed = vec![false; n];
        while let Some(next) = ready.pop_first() {
            let i = next.1;
            placed[i] = true;
            order.push(i);
            for &j in &before[i] {
                blocking[j] -= 1;
                if blocking[j] == 0 {
                    ready.insert((key(&clusters[j]), j));
                }
            }
        }
        if order.len() < n {
            let mut rest: Vec<usize> = (0..n).filter(|&i| !placed[i]).collect();
            rest.sort_by_key(|&i| key(&clusters[i]));
            debug!(unordered = rest.len(), "clusters without a strict order");
            order.extend(rest);
        }
        let mut slots: Vec<Option<Cluster>> = clusters.into_iter().map(Some).collect();
        order.into_iter().filter_map(|i| slots[i].take()).collect()
    }
}

fn reachability(lattice: &Lattice) -> Vec<Vec<bool>> {
    let size = lattice.node_capacity();
    let mut reach = vec![vec![false; size]; size];
    for start in lattice.node_ids() {
        let mut stack: Vec<NodeId> = lattice.successors(start).collect();
        while let Some(node) = stack.pop() {
            if reach[start][node] {
                continue;
            }
            reach[start][node] = true;
            stack.extend(lattice.successors(node));
        }
    }
    reach
}

fn overlap(
    begin1: Option<usize>,
    end1: Option<usize>,
    begin2: Option<usize>,
    end2: Option<usize>,
) -> Option<usize> {
    let start = begin1?.max(begin2?);
    let stop = end1?.min(end2?);
    (stop > start).then(|| stop - start)
}

/// One minus the edit distance between two unit sequences, relative to
/// their combined length.
pub fn phonetic_similarity(a: &[String], b: &[String]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    1.0 - edit_distance(a, b) as f64 / total as f64
}

fn edit_distance(a: &[String], b: &[String]) -> usize {
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, x) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, y) in b.iter().enumerate() {
            let substitute = previous[j] + usize::from(x != y);
            current[j + 1] = substitute.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

//! Graph Description Language dumps for aiSee-style viewers.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use hark_core::linguist::{SearchState, StateKind};
use hark_core::search::SearchResult;
use hark_core::token::{token_key, Token, TokenRef};
use tracing::debug;

use crate::error::LatticeError;
use crate::lattice::Lattice;
use crate::sausage::Sausage;

fn header(out: &mut String, title: &str, left_to_right: bool) {
    out.push_str("graph: {\n");
    let _ = writeln!(out, "title: \"{}\"", escape(title));
    out.push_str("display_edge_labels: yes\n");
    if left_to_right {
        out.push_str("orientation: left_to_right\n");
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn frame(time: Option<usize>) -> String {
    time.map_or_else(|| "?".to_string(), |t| t.to_string())
}

/// Lattice nodes labelled `word:id[begin,end]`, edges labelled
/// `acoustic,lm`.
pub fn lattice_gdl(lattice: &Lattice, title: &str) -> String {
    let mut out = String::new();
    header(&mut out, title, true);
    for (_, node) in lattice.nodes() {
        let _ = writeln!(
            out,
            "node: {{ title: \"{}\" label: \"{}:{}[{},{}]\" }}",
            escape(&node.id),
            escape(&node.word),
            escape(&node.id),
            frame(node.begin),
            frame(node.end)
        );
    }
    for (_, edge) in lattice.edges() {
        let _ = writeln!(
            out,
            "edge: {{ sourcename: \"{}\" targetname: \"{}\" label: \"{},{}\" }}",
            escape(&lattice.node(edge.from).id),
            escape(&lattice.node(edge.to).id),
            edge.acoustic,
            edge.lm
        );
    }
    out.push_str("}\n");
    out
}

/// One node per slot boundary; each word set of a slot is an edge to the
/// next boundary labelled `words:posterior`.
pub fn sausage_gdl(sausage: &Sausage, title: &str) -> String {
    let mut out = String::new();
    header(&mut out, title, true);
    for (index, slot) in sausage.confusion_sets().iter().enumerate() {
        let _ = writeln!(out, "node: {{ title: \"{index}\" label: \"{index}\" }}");
        let mut grouped: Vec<(f64, Vec<&str>)> = Vec::new();
        for (posterior, word) in slot.iter() {
            match grouped.last_mut() {
                Some((p, words)) if *p == posterior => words.push(word),
                _ => grouped.push((posterior, vec![word])),
            }
        }
        for (posterior, words) in grouped {
            let _ = writeln!(
                out,
                "edge: {{ sourcename: \"{index}\" targetname: \"{}\" label: \"{}:{posterior}\" }}",
                index + 1,
                escape(&words.join("/"))
            );
        }
    }
    let end = sausage.size();
    let _ = writeln!(out, "node: {{ title: \"{end}\" label: \"{end}\" }}");
    out.push_str("}\n");
    out
}

fn color(state: &dyn SearchState) -> &'static str {
    if state.is_final() {
        return "magenta";
    }
    match state.kind() {
        StateKind::UNIT => "green",
        StateKind::WORD => "lightblue",
        StateKind::HMM => "orange",
        _ => "lightred",
    }
}

/// The token tree behind a result: every final token, its predecessors
/// and the alternate predecessors recorded for lattice building. Nodes
/// are labelled `word[acoustic,language]` and coloured by state kind;
/// edges point from a token to its predecessors.
pub fn token_graph_gdl(result: &SearchResult, title: &str) -> String {
    let alternates = result.alternate_hypotheses();
    let mut out = String::new();
    header(&mut out, title, false);
    let mut ids: HashMap<*const Token, usize> = HashMap::new();
    let mut id_of = |token: &Token| {
        let next = ids.len();
        *ids.entry(token_key(token)).or_insert(next)
    };
    let mut dumped = HashSet::new();
    let mut stack: Vec<TokenRef> = result.result_tokens().iter().rev().cloned().collect();
    while let Some(token) = stack.pop() {
        if !dumped.insert(token_key(&token)) {
            continue;
        }
        let id = id_of(&*token);
        let scores = format!("[{},{}]", token.acoustic_score(), token.language_score());
        let label = match token.word() {
            Some(word) => format!("{}{scores}", escape(word.spelling())),
            None => scores,
        };
        let _ = writeln!(
            out,
            "node: {{ title: \"{id}\" label: \"{label}\" color: {} }}",
            color(&**token.search_state())
        );
        let mut next = Vec::new();
        if let Some(predecessor) = token.predecessor() {
            next.push(predecessor.clone());
        }
        if let Some(losers) = alternates.as_ref().and_then(|a| a.alternate_predecessors(&token)) {
            next.extend(losers.iter().cloned());
        }
        for target in &next {
            let target_id = id_of(&**target);
            let _ = writeln!(out, "edge: {{ sourcename: \"{id}\" targetname: \"{target_id}\" }}");
        }
        stack.extend(next.into_iter().rev());
    }
    out.push_str("}\n");
    debug!(tokens = dumped.len(), "token graph dumped");
    out
}

/// Write a GDL dump to `path`.
pub fn save_gdl(path: &Path, gdl: &str) -> Result<(), LatticeError> {
    Ok(fs::write(path, gdl)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lattice_dump_lists_nodes_and_edges() {
        let mut l = Lattice::default();
        let s = l.add_node("<s>", Some(0), Some(2));
        let e = l.add_node("</s>", Some(2), None);
        l.add_edge(s, e, -4.5, -1.0);
        let gdl = lattice_gdl(&l, "test");
        assert!(gdl.starts_with("graph: {\ntitle: \"test\"\ndisplay_edge_labels: yes\n"));
        assert!(gdl.contains("node: { title: \"0\" label: \"<s>:0[0,2]\" }"));
        assert!(gdl.contains("node: { title: \"1\" label: \"</s>:1[2,?]\" }"));
        assert!(gdl.contains("edge: { sourcename: \"0\" targetname: \"1\" label: \"-4.5,-1\" }"));
        assert!(gdl.ends_with("}\n"));
    }

    #[test]
    fn sausage_dump_joins_tied_words() {
        let mut sausage = Sausage::new(1);
        sausage.add_word_hypothesis(0, "to", -1.0);
        sausage.add_word_hypothesis(0, "two", -1.0);
        sausage.add_word_hypothesis(0, "too", -3.0);
        let gdl = sausage_gdl(&sausage, "s");
        assert!(gdl.contains("edge: { sourcename: \"0\" targetname: \"1\" label: \"to/two:-1\" }"));
        assert!(gdl.contains("edge: { sourcename: \"0\" targetname: \"1\" label: \"too:-3\" }"));
        assert!(gdl.contains("node: { title: \"1\" label: \"1\" }"));
    }

    #[test]
    fn titles_are_escaped() {
        let gdl = lattice_gdl(&Lattice::default(), "say \"hi\"");
        assert!(gdl.contains("title: \"say \\\"hi\\\"\""));
    }
}

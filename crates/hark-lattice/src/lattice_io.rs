use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use hark_core::LogMath;
use tracing::debug;

use crate::error::LatticeError;
use crate::lattice::Lattice;

impl Lattice {
    /// Serialises the lattice in the line-oriented `.LAT` format:
    ///
    /// ```text
    /// node: <id> <word> [p:<posterior>]
    /// edge: <from id> <to id> <acoustic> <lm>
    /// initialNode: <id>
    /// terminalNode: <id>
    /// logBase: <base>
    /// ```
    pub fn to_lat_string(&self) -> String {
        let mut out = String::new();
        for (_, node) in self.nodes() {
            let _ = write!(out, "node: {} {}", node.id, node.word);
            if node.posterior > self.log_math().log_zero() {
                let _ = write!(out, " p:{}", node.posterior);
            }
            out.push('\n');
        }
        for (_, edge) in self.edges() {
            let _ = writeln!(
                out,
                "edge: {} {} {} {}",
                self.node(edge.from).id,
                self.node(edge.to).id,
                edge.acoustic,
                edge.lm
            );
        }
        if let Some(initial) = self.initial_node() {
            let _ = writeln!(out, "initialNode: {}", self.node(initial).id);
        }
        if let Some(terminal) = self.terminal_node() {
            let _ = writeln!(out, "terminalNode: {}", self.node(terminal).id);
        }
        let _ = writeln!(out, "logBase: {}", self.log_math().base());
        out
    }

    /// Parses the `.LAT` text format. Blank lines are skipped; nodes must
    /// be declared before the edges and end markers that refer to them.
    pub fn from_lat_str(text: &str) -> Result<Self, LatticeError> {
        let mut lattice = Lattice::default();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let syntax = || LatticeError::Syntax {
                line: index + 1,
                text: line.to_string(),
            };
            let (record, rest) = line.split_once(':').ok_or_else(syntax)?;
            let fields: Vec<&str> = rest.split_whitespace().collect();
            match (record, fields.as_slice()) {
                ("node", [id, word, extra @ ..]) => {
                    let node = lattice
                        .add_node_with_id(*id, *word, None, None)
                        .map_err(|_| syntax())?;
                    for field in extra {
                        let value = field.strip_prefix("p:").ok_or_else(syntax)?;
                        lattice.node_mut(node).posterior = parse(value).ok_or_else(syntax)?;
                    }
                }
                ("edge", [from, to, acoustic, lm]) => {
                    let from = lookup(&lattice, from)?;
                    let to = lookup(&lattice, to)?;
                    let acoustic = parse(acoustic).ok_or_else(syntax)?;
                    let lm = parse(lm).ok_or_else(syntax)?;
                    lattice.add_edge(from, to, acoustic, lm);
                }
                ("initialNode", [id]) => {
                    let node = lookup(&lattice, id)?;
                    lattice.set_initial_node(node);
                }
                ("terminalNode", [id]) => {
                    let node = lookup(&lattice, id)?;
                    lattice.set_terminal_node(node);
                }
                ("logBase", [base]) => {
                    let base: f64 = parse(base).filter(|b| *b > 1.0).ok_or_else(syntax)?;
                    lattice.set_log_math(LogMath::new(base));
                }
                _ => return Err(syntax()),
            }
        }
        debug!(
            nodes = lattice.node_count(),
            edges = lattice.edge_count(),
            "loaded lattice"
        );
        Ok(lattice)
    }

    /// Load a `.LAT` file.
    pub fn open(path: &Path) -> Result<Self, LatticeError> {
        let text = fs::read_to_string(path)?;
        Self::from_lat_str(&text)
    }

    /// Write the lattice as a `.LAT` file.
    pub fn save(&self, path: &Path) -> Result<(), LatticeError> {
        Ok(fs::write(path, self.to_lat_string())?)
    }
}

fn parse<T: FromStr>(field: &str) -> Option<T> {
    field.parse().ok()
}

fn lookup(lattice: &Lattice, id: &str) -> Result<usize, LatticeError> {
    lattice
        .find_node(id)
        .ok_or_else(|| LatticeError::UnknownNode(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = "\
node: 0 <s>
node: 1 hello p:-0.5
node: 2 </s>
edge: 0 1 -10.5 -2
edge: 1 2 -3 0
initialNode: 0
terminalNode: 2
logBase: 1.0001
";

    #[test]
    fn parses_every_record() {
        let l = Lattice::from_lat_str(SMALL).unwrap();
        assert_eq!(l.node_count(), 3);
        assert_eq!(l.edge_count(), 2);
        let hello = l.find_node("1").unwrap();
        assert_eq!(l.node(hello).word, "hello");
        assert_eq!(l.node(hello).posterior, -0.5);
        let first = l.edge_between(l.find_node("0").unwrap(), hello).unwrap();
        assert_eq!((l.edge(first).acoustic, l.edge(first).lm), (-10.5, -2.0));
        assert_eq!(l.all_paths(), vec!["<s> hello </s>"]);
        assert_eq!(l.log_math().base(), 1.0001);
    }

    #[test]
    fn written_text_reads_back() {
        let l = Lattice::from_lat_str(SMALL).unwrap();
        assert_eq!(l.to_lat_string(), SMALL);
    }

    #[test]
    fn unknown_record_is_a_syntax_error() {
        let err = Lattice::from_lat_str("node: 0 a\nvertex: 1 b\n").unwrap_err();
        assert!(matches!(err, LatticeError::Syntax { line: 2, .. }));
    }

    #[test]
    fn bad_score_is_a_syntax_error() {
        let err = Lattice::from_lat_str("node: 0 a\nnode: 1 b\nedge: 0 1 loud 0\n").unwrap_err();
        assert!(matches!(err, LatticeError::Syntax { line: 3, .. }));
    }

    #[test]
    fn edge_to_undeclared_node_is_rejected() {
        let err = Lattice::from_lat_str("node: 0 a\nedge: 0 7 -1 0\n").unwrap_err();
        assert!(matches!(err, LatticeError::UnknownNode(ref id) if id == "7"));
    }

    #[test]
    fn duplicate_node_ids_are_rejected() {
        let err = Lattice::from_lat_str("node: 0 a\nnode: 0 b\n").unwrap_err();
        assert!(matches!(err, LatticeError::Syntax { line: 2, .. }));
    }

    #[test]
    fn log_base_must_exceed_one() {
        let err = Lattice::from_lat_str("logBase: 0.5\n").unwrap_err();
        assert!(matches!(err, LatticeError::Syntax { line: 1, .. }));
    }
}

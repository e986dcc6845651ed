use hark_core::search::WordPruningConfig;

use super::*;
use crate::gdl::{lattice_gdl, sausage_gdl, save_gdl, token_graph_gdl};
use crate::{Lattice, LatticeError, MapConfidenceScorer};

#[test]
fn lat_file_round_trips_a_search_lattice() {
    let result = recognize(yes_no(), &YES_NO_FRAMES, WordPruningConfig::default());
    let lattice = Lattice::from_result(&result);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("yes_no.lat");

    lattice.save(&path).unwrap();
    let loaded = Lattice::open(&path).unwrap();

    assert_eq!(loaded.node_count(), lattice.node_count());
    assert_eq!(loaded.edge_count(), lattice.edge_count());
    assert_eq!(sorted(loaded.all_paths()), sorted(lattice.all_paths()));
    assert_eq!(loaded.log_math().base(), lattice.log_math().base());
    for (_, edge) in lattice.edges() {
        let from = loaded.find_node(&lattice.node(edge.from).id).unwrap();
        let to = loaded.find_node(&lattice.node(edge.to).id).unwrap();
        let copy = loaded.edge(loaded.edge_between(from, to).unwrap());
        assert_eq!(copy.acoustic, edge.acoustic);
        assert_eq!(copy.lm, edge.lm);
    }
}

#[test]
fn posteriors_survive_a_round_trip() {
    let result = recognize(yes_no(), &YES_NO_FRAMES, WordPruningConfig::default());
    let lattice = MapConfidenceScorer::default().lattice(&result).unwrap();
    let loaded = Lattice::from_lat_str(&lattice.to_lat_string()).unwrap();
    for (_, node) in lattice.nodes() {
        let copy = loaded.node(loaded.find_node(&node.id).unwrap());
        assert_eq!(copy.posterior, node.posterior, "{}", node.word);
    }
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Lattice::open(&dir.path().join("absent.lat")).unwrap_err();
    assert!(matches!(err, LatticeError::Io(_)));
}

#[test]
fn gdl_dumps_are_written() {
    let result = recognize(yes_no(), &YES_NO_FRAMES, WordPruningConfig::default());
    let scorer = MapConfidenceScorer::default();
    let lattice = scorer.lattice(&result).unwrap();
    let sausage = scorer.make_sausage(&lattice);
    let dir = tempfile::tempdir().unwrap();

    let dumps = [
        ("lattice.gdl", lattice_gdl(&lattice, "MAP Lattice")),
        ("sausage.gdl", sausage_gdl(&sausage, "MAP Sausage")),
        ("tokens.gdl", token_graph_gdl(&result, "Token Graph")),
    ];
    for (name, gdl) in &dumps {
        let path = dir.path().join(name);
        save_gdl(&path, gdl).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("graph: {\n"), "{name}");
        assert!(text.ends_with("}\n"), "{name}");
    }
}

#[test]
fn token_graph_colours_states_and_follows_alternates() {
    let result = recognize(yes_no(), &YES_NO_FRAMES, WordPruningConfig::default());
    let gdl = token_graph_gdl(&result, "tokens");
    assert!(gdl.contains("color: magenta"));
    assert!(gdl.contains("color: lightblue"));
    assert!(gdl.contains("color: orange"));
    // The losing "no" path is reached through the alternate edge.
    assert!(gdl.contains("label: \"no["));
    assert!(gdl.contains("label: \"yes["));
}

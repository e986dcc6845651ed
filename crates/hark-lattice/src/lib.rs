//! Post-processing of finished recognitions.
//!
//! A [`Lattice`] is built from the word tokens of a
//! [`hark_core::search::SearchResult`], minimised by the
//! [`LatticeOptimizer`] and scored with forward-backward posteriors. The
//! [`SausageMaker`] clusters the scored lattice into a [`Sausage`], from
//! which the [`MapConfidenceScorer`] reads a confidence for every word of
//! the best path. Lattices persist as `.LAT` text and every graph can be
//! dumped as GDL.

pub mod confidence;
pub mod error;
pub mod gdl;
pub mod lattice;
mod lattice_io;
pub mod optimizer;
pub mod sausage;
pub mod sausage_maker;

#[cfg(test)]
mod tests;

pub use confidence::{ConfidenceConfig, ConfidenceResult, MapConfidenceScorer, WordConfidence};
pub use error::LatticeError;
pub use lattice::{Edge, EdgeId, Lattice, Node, NodeId};
pub use optimizer::LatticeOptimizer;
pub use sausage::{ConfusionSet, Sausage, NOOP_WORD};
pub use sausage_maker::SausageMaker;

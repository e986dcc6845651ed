//! Speech recognition front door.
//!
//! [`Recognizer`] drives a search manager from [`hark_core`] over one
//! utterance and hands the result to [`hark_lattice`] for lattice
//! construction, optimisation and MAP confidence scoring. The outcome is
//! available as a [`Recognition`] or as a serialisable
//! [`RecognitionReport`].

pub mod recognizer;
pub mod trace_init;
mod types;

#[cfg(test)]
mod tests;

pub use hark_core;
pub use hark_lattice;
pub use recognizer::{Recognition, Recognizer};
pub use types::{EngineError, HypothesisReport, RecognitionReport, WordReport};

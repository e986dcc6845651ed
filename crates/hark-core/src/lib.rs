//! Time-synchronous beam search over an implicit search-state graph.
//!
//! The search managers in [`search`] drive the frame loop: an
//! [`scorer::AcousticScorer`] scores the emitting tokens of the current
//! [`search::ActiveList`], the list is pruned to its beam, and the
//! survivors are expanded through the [`linguist::SearchState`] graph.
//! Finished recognitions come back as a [`search::SearchResult`].

pub mod language_model;
pub mod linguist;
pub mod log_math;
pub mod scorer;
pub mod search;
pub mod settings;
pub mod stats;
pub mod token;

#[cfg(test)]
pub(crate) mod testutil;

pub use log_math::LogMath;
pub use token::{Token, TokenRef};

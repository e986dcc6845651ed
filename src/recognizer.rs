use std::path::Path;

use hark_core::linguist::Linguist;
use hark_core::scorer::AcousticScorer;
use hark_core::search::{
    SearchManager, SearchResult, SimplePruner, WordPruningBreadthFirstSearchManager,
};
use hark_core::settings::Settings;
use hark_lattice::gdl::{lattice_gdl, sausage_gdl, save_gdl, token_graph_gdl};
use hark_lattice::{ConfidenceConfig, ConfidenceResult, Lattice, MapConfidenceScorer};
use tracing::{debug, debug_span};

use crate::types::{EngineError, HypothesisReport, RecognitionReport, WordReport};

/// Runs one utterance through a search manager and post-processes the
/// result into a lattice, a confusion network and word confidences.
pub struct Recognizer {
    manager: Box<dyn SearchManager>,
    confidence: MapConfidenceScorer,
}

impl Recognizer {
    pub fn new(manager: Box<dyn SearchManager>, confidence: ConfidenceConfig) -> Self {
        Self {
            manager,
            confidence: MapConfidenceScorer::new(confidence),
        }
    }

    /// A word-pruning search with lists, beams and lattice options taken
    /// from `settings`. The linguist is built by the caller, e.g. with
    /// `WordGraphLinguist::from_settings` for the `[search]` language weight.
    pub fn from_settings(
        linguist: Box<dyn Linguist>,
        scorer: Box<dyn AcousticScorer>,
        settings: &Settings,
    ) -> Result<Self, EngineError> {
        let manager = WordPruningBreadthFirstSearchManager::from_settings(
            linguist,
            scorer,
            Box::new(SimplePruner),
            settings,
        )?;
        Ok(Self::new(
            Box::new(manager),
            ConfidenceConfig::from_settings(settings),
        ))
    }

    /// Decodes until the scorer runs out of frames.
    pub fn recognize(&mut self) -> Result<Recognition, EngineError> {
        let _span = debug_span!("recognize_utterance").entered();
        self.manager.start_recognition()?;
        let result = self.manager.recognize_all();
        self.manager.stop_recognition();
        let result = result?;

        let lattice = self.confidence.lattice(&result)?;
        let confidence = self.confidence.score_lattice(&result, &lattice);
        debug!(
            frames = result.frame_number(),
            hypothesis = %result.best_final_result_no_fillers(),
            nodes = lattice.node_count(),
            slots = confidence.sausage.size()
        );
        Ok(Recognition {
            result,
            lattice,
            confidence,
        })
    }
}

/// Everything known about one decoded utterance.
pub struct Recognition {
    pub result: SearchResult,
    /// Optimised lattice carrying node posteriors.
    pub lattice: Lattice,
    pub confidence: ConfidenceResult,
}

impl Recognition {
    pub fn hypothesis(&self) -> String {
        self.result.best_final_result_no_fillers()
    }

    pub fn report(&self) -> RecognitionReport {
        let log_math = self.lattice.log_math();
        RecognitionReport {
            hypothesis: self.hypothesis(),
            frames: self.result.frame_number(),
            is_final: self.result.is_final(),
            lattice_nodes: self.lattice.node_count(),
            lattice_edges: self.lattice.edge_count(),
            words: WordReport::from_confidence(&self.confidence),
            slots: self
                .confidence
                .sausage
                .confusion_sets()
                .iter()
                .map(|slot| HypothesisReport::from_slot(slot, |p| log_math.log_to_linear(p)))
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(&self.report())?)
    }

    /// Writes the lattice as `.LAT` and the lattice, sausage and token
    /// graph as GDL into `dir`.
    pub fn save_dumps(&self, dir: &Path) -> Result<(), EngineError> {
        self.lattice.save(&dir.join("map.lat"))?;
        save_gdl(&dir.join("map_lattice.gdl"), &lattice_gdl(&self.lattice, "MAP Lattice"))?;
        save_gdl(
            &dir.join("map_sausage.gdl"),
            &sausage_gdl(&self.confidence.sausage, "MAP Sausage"),
        )?;
        save_gdl(&dir.join("tokens.gdl"), &token_graph_gdl(&self.result, "Token Graph"))?;
        debug!(dir = %dir.display(), "dumps written");
        Ok(())
    }
}

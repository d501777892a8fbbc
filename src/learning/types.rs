use serde::{Deserialize, Serialize};

/// Where the observations of a learning pass came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningSource {
    /// Results of earlier layers in the current pass.
    SameSession,
    /// Replay of the durable transformation log.
    TransformationLog,
    #[default]
    None,
}

/// One `(layer, before, after)` triple fed to the extractors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub layer_id: u8,
    pub before: String,
    pub after: String,
}

/// Summary of one learning pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningReport {
    pub source: LearningSource,
    pub observations: usize,
    /// Observations skipped because their hash was already in the ledger.
    pub already_seen: usize,
    pub candidates: usize,
    pub inserted: usize,
    pub merged: usize,
    pub rejected: usize,
    pub warnings: Vec<String>,
}

impl LearningReport {
    pub fn learned_anything(&self) -> bool {
        self.inserted + self.merged > 0
    }
}

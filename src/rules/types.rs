use crate::regex_engine::SerializedPattern;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rules below this confidence are kept but never applied.
pub const MIN_CONFIDENCE: f64 = 0.7;

/// Confidence gained each time an existing rule is observed again.
pub const CONFIDENCE_INCREMENT: f64 = 0.1;

/// Rules at or above this confidence (but below `MIN_CONFIDENCE`) are
/// reported as suggestions when they would match.
pub const SUGGESTION_CONFIDENCE: f64 = 0.5;

/// Current on-disk format of the rule store.
pub const STORE_VERSION: u32 = 1;

/// A learned or hand-authored fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Store-local index, kept dense.
    #[serde(default)]
    pub id: usize,
    pub description: String,
    pub pattern: SerializedPattern,
    pub replacement: String,
    pub confidence: f64,
    #[serde(default = "default_frequency")]
    pub frequency: u32,
    #[serde(default)]
    pub security_related: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_layer: Option<u8>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// Two rules are the same rule iff description and pattern (source and flags) match.
    pub fn is_same_rule(&self, description: &str, pattern: &SerializedPattern) -> bool {
        self.description == description && self.pattern == *pattern
    }

    pub fn is_applicable(&self) -> bool {
        self.confidence >= MIN_CONFIDENCE
    }
}

/// A rule proposed by an extractor or a caller, not yet stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCandidate {
    pub description: String,
    pub pattern: SerializedPattern,
    pub replacement: String,
    pub confidence: f64,
    #[serde(default = "default_frequency")]
    pub frequency: u32,
    #[serde(default)]
    pub security_related: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_layer: Option<u8>,
}

impl RuleCandidate {
    pub fn new(
        description: impl Into<String>,
        pattern: SerializedPattern,
        replacement: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            description: description.into(),
            pattern,
            replacement: replacement.into(),
            confidence,
            frequency: 1,
            security_related: false,
            source_layer: None,
        }
    }

    pub fn security(mut self) -> Self {
        self.security_related = true;
        self
    }

    pub fn from_layer(mut self, layer_id: u8) -> Self {
        self.source_layer = Some(layer_id);
        self
    }
}

/// Partial update for `RuleStore::edit_rule`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulePatch {
    pub description: Option<String>,
    pub pattern: Option<SerializedPattern>,
    pub replacement: Option<String>,
    pub confidence: Option<f64>,
    pub security_related: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted(usize),
    Merged(usize),
}

impl AddOutcome {
    pub fn index(&self) -> usize {
        match self {
            AddOutcome::Inserted(index) | AddOutcome::Merged(index) => *index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResult {
    pub transformed_code: String,
    pub applied_rules: Vec<String>,
}

impl ApplyResult {
    pub fn unchanged(code: &str) -> Self {
        Self {
            transformed_code: code.to_string(),
            applied_rules: Vec::new(),
        }
    }
}

/// A rule that changed the code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub description: String,
    pub code: String,
}

/// Why a rule left the code alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skipped {
    LowConfidence,
    InvalidPattern(String),
    NoMatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreDocument {
    pub version: u32,
    pub rules: Vec<Rule>,
}

/// Clamp to [0, 1]; NaN becomes 0.
pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

fn default_frequency() -> u32 {
    1
}

use serde::{Deserialize, Serialize};

/// How a layer's accepted output was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformMethod {
    Ast,
    Regex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Ast,
    Regex,
    LearnedRule,
    /// Informational: a learned rule that would apply once it gains confidence.
    AdaptiveSuggestion,
    /// Informational: a layer produced output that failed validation.
    Revert,
}

impl ChangeKind {
    /// Whether this change counts toward `RunResult::change_count`.
    pub fn is_applied(&self) -> bool {
        !matches!(self, ChangeKind::AdaptiveSuggestion | ChangeKind::Revert)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_id: Option<u8>,
}

impl Change {
    pub fn new(kind: ChangeKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            layer_id: None,
        }
    }

    pub fn with_layer(mut self, layer_id: u8) -> Self {
        self.layer_id = Some(layer_id);
        self
    }
}

/// One layer's work on one file during one orchestrator pass. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformationAttempt {
    pub layer_id: u8,
    pub method: TransformMethod,
    pub before: String,
    pub after: String,
    pub valid: bool,
}

/// Terminal state of one layer in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerStatus {
    Accepted,
    Reverted,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerResult {
    pub layer_id: u8,
    pub status: LayerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<TransformMethod>,
    pub change_count: usize,
}

/// Output of an earlier layer handed to the learning layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousResult {
    pub success: bool,
    pub change_count: usize,
    pub layer_id: u8,
    pub original_code: String,
    pub code: String,
}

/// Outward contract of a single `transform` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub success: bool,
    pub code: String,
    pub original_code: String,
    pub change_count: usize,
    pub changes: Vec<Change>,
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The original did not parse and no layer was run.
    #[serde(default)]
    pub skipped: bool,
    #[serde(default)]
    pub layer_results: Vec<LayerResult>,
}

impl RunResult {
    /// Result that leaves the input untouched.
    pub fn unchanged(code: &str) -> Self {
        Self {
            success: true,
            code: code.to_string(),
            original_code: code.to_string(),
            change_count: 0,
            changes: Vec::new(),
            warnings: Vec::new(),
            error: None,
            skipped: false,
            layer_results: Vec::new(),
        }
    }

    pub fn is_modified(&self) -> bool {
        self.code != self.original_code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_serializes_type_key() {
        let change = Change::new(ChangeKind::AdaptiveSuggestion, "maybe").with_layer(7);
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["type"], "AdaptiveSuggestion");
        assert_eq!(json["layerId"], 7);
    }

    #[test]
    fn test_informational_kinds_are_not_applied() {
        assert!(ChangeKind::Ast.is_applied());
        assert!(ChangeKind::LearnedRule.is_applied());
        assert!(!ChangeKind::AdaptiveSuggestion.is_applied());
        assert!(!ChangeKind::Revert.is_applied());
    }

    #[test]
    fn test_previous_result_reads_camel_case() {
        let json = r#"{"success":true,"changeCount":1,"layerId":2,"originalCode":"a","code":"b"}"#;
        let result: PreviousResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.layer_id, 2);
        assert_eq!(result.original_code, "a");
    }
}

//! Rule candidates from security scanner findings.

use crate::regex_engine::{RegexEngine, SerializedPattern, escape_literal};
use crate::rules::RuleCandidate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

pub const SIGNATURE_CONFIDENCE: f64 = 0.9;
pub const CONTEXTUAL_CONFIDENCE: f64 = 0.85;

/// Trimmed match context must be longer than this to seed a contextual rule.
pub const MIN_CONTEXT_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Findings below this severity are ignored.
pub const MIN_SEVERITY: Severity = Severity::Medium;

/// One record from the external security scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub signature_id: String,
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<String>,
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub matched: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Finding {
    pub fn new(
        signature_id: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            signature_id: signature_id.into(),
            severity,
            description: description.into(),
            pattern: None,
            flags: None,
            matched: None,
            file: None,
            line: None,
        }
    }

    pub fn with_match(mut self, matched: impl Into<String>) -> Self {
        self.matched = Some(matched.into());
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>, flags: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self.flags = Some(flags.into());
        self
    }
}

/// Remediation patterns for signatures the scanner reports without a regex.
const KNOWN_SIGNATURES: &[(&str, &str)] = &[
    ("eval-atob", r"\beval\s*\(\s*atob\s*\([^()]*\)\s*\)"),
    ("obfuscated-eval", r"\beval\s*\(\s*atob\s*\([^()]*\)\s*\)"),
    ("new-function", r"\bnew\s+Function\s*\([^()]*\)"),
    ("document-write", r"\bdocument\.write\s*\([^()]*\)"),
    (
        "child-process-exec",
        r#"\brequire\(\s*['"]child_process['"]\s*\)\.exec\s*\([^()]*\)"#,
    ),
    ("inner-html-script", r#"\.innerHTML\s*=\s*['"`][^'"`]*<script"#),
];

fn known_signature(signature_id: &str) -> Option<&'static str> {
    KNOWN_SIGNATURES
        .iter()
        .find(|(id, _)| *id == signature_id)
        .map(|(_, source)| *source)
}

/// Replacement text for neutralized code. Contains nothing the signature
/// patterns match, so applying a rule twice is a no-op.
pub fn neutralized_marker(signature_id: &str) -> String {
    let safe: String = signature_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    format!("undefined /* layerfix: neutralized {safe} */")
}

/// Candidates for every finding at or above `MIN_SEVERITY`. `None` entries
/// are skipped.
pub fn extract_security_patterns(findings: &[Option<Finding>]) -> Vec<RuleCandidate> {
    SecurityExtractor::new().extract(findings.iter().flatten())
}

/// Same as `extract_security_patterns` for raw scanner output. Accepts
/// `null`, non-arrays and malformed records without failing.
pub fn extract_security_patterns_json(value: &Value) -> Vec<RuleCandidate> {
    SecurityExtractor::new().extract(parse_findings(value).iter())
}

/// Well-formed findings in raw scanner output; everything else is skipped.
pub fn parse_findings(value: &Value) -> Vec<Finding> {
    let Some(items) = value.as_array() else {
        if !value.is_null() {
            warn!("Security findings are not an array, ignoring");
        }
        return Vec::new();
    };

    items
        .iter()
        .filter(|item| !item.is_null())
        .filter_map(|item| match serde_json::from_value::<Finding>(item.clone()) {
            Ok(finding) => Some(finding),
            Err(e) => {
                debug!("Skipping malformed finding: {}", e);
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct SecurityExtractor {
    engine: RegexEngine,
}

impl SecurityExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(engine: RegexEngine) -> Self {
        Self { engine }
    }

    pub fn extract<'a>(&self, findings: impl IntoIterator<Item = &'a Finding>) -> Vec<RuleCandidate> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for finding in findings {
            if finding.severity < MIN_SEVERITY {
                debug!(
                    "Ignoring {:?} finding {}",
                    finding.severity, finding.signature_id
                );
                continue;
            }

            if let Some(candidate) = self.signature_candidate(finding) {
                candidates.push(candidate);
            }
            if let Some(candidate) = self.contextual_candidate(finding) {
                candidates.push(candidate);
            }
        }

        candidates.retain(|c| seen.insert((c.description.clone(), c.pattern.clone())));
        candidates
    }

    fn signature_candidate(&self, finding: &Finding) -> Option<RuleCandidate> {
        let pattern = match (&finding.pattern, known_signature(&finding.signature_id)) {
            (Some(source), _) => {
                SerializedPattern::new(source.clone(), finding.flags.clone().unwrap_or_else(|| "g".to_string()))
            }
            (None, Some(source)) => SerializedPattern::global(source),
            (None, None) => return None,
        };

        self.validated(RuleCandidate::new(
            format!("Security: neutralize {}", finding.signature_id),
            pattern,
            neutralized_marker(&finding.signature_id),
            SIGNATURE_CONFIDENCE,
        ))
    }

    fn contextual_candidate(&self, finding: &Finding) -> Option<RuleCandidate> {
        let context = finding.matched.as_deref()?.trim();
        if context.chars().count() <= MIN_CONTEXT_LEN {
            return None;
        }

        self.validated(RuleCandidate::new(
            format!(
                "Security: neutralize {} at `{}`",
                finding.signature_id,
                abbreviate(context)
            ),
            SerializedPattern::global(escape_literal(context)),
            neutralized_marker(&finding.signature_id),
            CONTEXTUAL_CONFIDENCE,
        ))
    }

    /// Tag as security related and drop candidates that break the rule
    /// invariants or would re-match their own replacement.
    fn validated(&self, candidate: RuleCandidate) -> Option<RuleCandidate> {
        match self.engine.compile_rule_pattern(&candidate.pattern) {
            Ok(compiled) if compiled.is_match(&candidate.replacement) => {
                warn!(
                    "Dropping '{}': replacement matches its own pattern",
                    candidate.description
                );
                None
            }
            Ok(_) => Some(candidate.security()),
            Err(e) => {
                warn!("Dropping '{}': {}", candidate.description, e);
                None
            }
        }
    }
}

fn abbreviate(text: &str) -> String {
    const LIMIT: usize = 48;
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= LIMIT {
        single_line
    } else {
        format!("{}...", single_line.chars().take(LIMIT).collect::<String>())
    }
}

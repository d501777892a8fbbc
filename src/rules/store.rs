//! # Rule Store
//!
//! The persisted collection of learned rules. The store is loaded fully on
//! first use and written back through its [`StoragePort`] after every
//! mutation. A missing or corrupt document behaves as an empty store: rule
//! application becomes a no-op and a warning is kept, but nothing is raised
//! to the caller.

use super::apply::{apply_rule_set, suggest_rules};
use super::types::*;
use crate::errors::FixError;
use crate::regex_engine::RegexEngine;
use crate::storage::{FileStorage, MemoryStorage, StoragePort};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

pub type SharedRuleStore = Arc<Mutex<RuleStore>>;

pub struct RuleStore {
    storage: Box<dyn StoragePort>,
    engine: RegexEngine,
    rules: Vec<Rule>,
    loaded: bool,
    corrupt: bool,
    warnings: Vec<String>,
}

impl RuleStore {
    pub fn new(storage: impl StoragePort + 'static) -> Self {
        Self::with_engine(storage, RegexEngine::new())
    }

    pub fn with_engine(storage: impl StoragePort + 'static, engine: RegexEngine) -> Self {
        Self {
            storage: Box::new(storage),
            engine,
            rules: Vec::new(),
            loaded: false,
            corrupt: false,
            warnings: Vec::new(),
        }
    }

    /// Store backed by a JSON file.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(FileStorage::new(path))
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    pub fn into_shared(self) -> SharedRuleStore {
        Arc::new(Mutex::new(self))
    }

    pub fn engine(&self) -> &RegexEngine {
        &self.engine
    }

    /// (Re)load from storage, replacing the in-memory rules. Returns the rule count.
    pub fn load(&mut self) -> usize {
        self.loaded = true;
        self.corrupt = false;
        self.rules.clear();

        let content = match self.storage.read() {
            Ok(Some(content)) => content,
            Ok(None) => {
                debug!("No rule store at {}, starting empty", self.storage.describe());
                return 0;
            }
            Err(e) => {
                self.mark_corrupt(format!(
                    "Failed to read rule store {}: {e}",
                    self.storage.describe()
                ));
                return 0;
            }
        };

        if content.trim().is_empty() {
            return 0;
        }

        let records = match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(serde_json::Value::Array(records)) => records,
            Ok(serde_json::Value::Object(mut document)) => match document.remove("rules") {
                Some(serde_json::Value::Array(records)) => records,
                _ => {
                    self.mark_corrupt(format!(
                        "Rule store {} has no rules array",
                        self.storage.describe()
                    ));
                    return 0;
                }
            },
            Ok(_) => {
                self.mark_corrupt(format!(
                    "Rule store {} is not an array of rules",
                    self.storage.describe()
                ));
                return 0;
            }
            Err(e) => {
                self.mark_corrupt(format!(
                    "Rule store {} is not valid JSON: {e}",
                    self.storage.describe()
                ));
                return 0;
            }
        };

        for (index, record) in records.into_iter().enumerate() {
            let mut rule: Rule = match serde_json::from_value(record) {
                Ok(rule) => rule,
                Err(e) => {
                    self.push_warning(format!("Dropping unreadable rule #{index}: {e}"));
                    continue;
                }
            };

            if let Err(e) = self.engine.compile_rule_pattern(&rule.pattern) {
                self.push_warning(format!(
                    "Dropping rule '{}' with unusable pattern: {e}",
                    rule.description
                ));
                continue;
            }

            rule.confidence = clamp_confidence(rule.confidence);
            self.rules.push(rule);
        }

        self.renumber();
        debug!("Loaded {} rules from {}", self.rules.len(), self.storage.describe());
        self.rules.len()
    }

    /// Persist the current rules.
    pub fn save(&mut self) -> Result<(), FixError> {
        self.ensure_loaded();
        let document = StoreDocument {
            version: STORE_VERSION,
            rules: self.rules.clone(),
        };
        let json = serde_json::to_string_pretty(&document)?;
        self.storage.write(&json)?;
        self.corrupt = false;
        Ok(())
    }

    /// Insert a candidate, or merge it into the existing rule with the same
    /// description and pattern.
    pub fn add_rule(&mut self, candidate: RuleCandidate) -> Result<AddOutcome, FixError> {
        self.ensure_loaded();
        self.engine.compile_rule_pattern(&candidate.pattern)?;

        let now = Utc::now();
        let existing = self
            .rules
            .iter()
            .position(|rule| rule.is_same_rule(&candidate.description, &candidate.pattern));

        let outcome = match existing {
            Some(index) => {
                let rule = &mut self.rules[index];
                rule.frequency = rule.frequency.saturating_add(1);
                rule.confidence = clamp_confidence(rule.confidence + CONFIDENCE_INCREMENT);
                rule.security_related |= candidate.security_related;
                rule.updated_at = now;
                debug!(
                    "Merged rule '{}' (frequency {}, confidence {:.2})",
                    rule.description, rule.frequency, rule.confidence
                );
                AddOutcome::Merged(index)
            }
            None => {
                let index = self.rules.len();
                self.rules.push(Rule {
                    id: index,
                    description: candidate.description,
                    pattern: candidate.pattern,
                    replacement: candidate.replacement,
                    confidence: clamp_confidence(candidate.confidence),
                    frequency: candidate.frequency.max(1),
                    security_related: candidate.security_related,
                    source_layer: candidate.source_layer,
                    created_at: now,
                    updated_at: now,
                });
                info!("Learned rule '{}'", self.rules[index].description);
                AddOutcome::Inserted(index)
            }
        };

        self.save()?;
        Ok(outcome)
    }

    /// Apply every rule with sufficient confidence. Fails open: a corrupt
    /// store returns the input untouched.
    pub fn apply_rules(&mut self, code: &str) -> ApplyResult {
        self.ensure_loaded();
        if self.corrupt {
            return ApplyResult::unchanged(code);
        }
        apply_rule_set(&self.engine, &self.rules, code)
    }

    /// Rules that would match but are below the application threshold.
    pub fn suggestions(&mut self, code: &str) -> Vec<String> {
        self.ensure_loaded();
        if self.corrupt {
            return Vec::new();
        }
        suggest_rules(&self.engine, &self.rules, code)
    }

    /// Remove the rule at `index`. Out of range is a no-op returning `false`.
    pub fn delete_rule(&mut self, index: usize) -> bool {
        self.ensure_loaded();
        if index >= self.rules.len() {
            return false;
        }

        let removed = self.rules.remove(index);
        self.renumber();
        info!("Deleted rule '{}'", removed.description);
        self.persist_after_mutation();
        true
    }

    /// Patch the rule at `index`. Out of range, or a patch introducing an
    /// unusable pattern, is a no-op returning `false`.
    pub fn edit_rule(&mut self, index: usize, patch: RulePatch) -> bool {
        self.ensure_loaded();
        if index >= self.rules.len() {
            return false;
        }

        if let Some(ref pattern) = patch.pattern {
            if let Err(e) = self.engine.compile_rule_pattern(pattern) {
                warn!("Rejected edit of rule {index}: {e}");
                return false;
            }
        }

        let rule = &mut self.rules[index];
        if let Some(description) = patch.description {
            rule.description = description;
        }
        if let Some(pattern) = patch.pattern {
            rule.pattern = pattern;
        }
        if let Some(replacement) = patch.replacement {
            rule.replacement = replacement;
        }
        if let Some(confidence) = patch.confidence {
            rule.confidence = clamp_confidence(confidence);
        }
        if let Some(security_related) = patch.security_related {
            rule.security_related = security_related;
        }
        rule.updated_at = Utc::now();

        self.persist_after_mutation();
        true
    }

    /// Remove every rule and persist the empty store.
    pub fn reset_rules(&mut self) -> Result<(), FixError> {
        self.loaded = true;
        self.rules.clear();
        self.save()?;
        info!("Rule store reset");
        Ok(())
    }

    pub fn rules(&mut self) -> &[Rule] {
        self.ensure_loaded();
        &self.rules
    }

    pub fn get(&mut self, index: usize) -> Option<&Rule> {
        self.ensure_loaded();
        self.rules.get(index)
    }

    pub fn len(&mut self) -> usize {
        self.ensure_loaded();
        self.rules.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    pub fn is_corrupt(&self) -> bool {
        self.corrupt
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn export_json(&mut self) -> Result<String, FixError> {
        self.ensure_loaded();
        Ok(serde_json::to_string_pretty(&self.rules)?)
    }

    /// Merge rules from an exported JSON array through `add_rule`. Returns the
    /// number of records accepted.
    pub fn import_json(&mut self, json: &str) -> Result<usize, FixError> {
        let candidates: Vec<RuleCandidate> = serde_json::from_str(json)?;
        let mut accepted = 0;
        for candidate in candidates {
            match self.add_rule(candidate) {
                Ok(_) => accepted += 1,
                Err(e @ (FixError::InvalidRule(_) | FixError::Regex(_))) => {
                    warn!("Skipping imported rule: {e}");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(accepted)
    }

    fn ensure_loaded(&mut self) {
        if !self.loaded {
            self.load();
        }
    }

    fn renumber(&mut self) {
        for (index, rule) in self.rules.iter_mut().enumerate() {
            rule.id = index;
        }
    }

    fn persist_after_mutation(&mut self) {
        if let Err(e) = self.save() {
            self.push_warning(format!(
                "Failed to persist rule store {}: {e}",
                self.storage.describe()
            ));
        }
    }

    fn mark_corrupt(&mut self, message: String) {
        self.corrupt = true;
        self.push_warning(message);
    }

    fn push_warning(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}

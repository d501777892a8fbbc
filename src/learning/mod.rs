//! Cross-session rule learning.
//!
//! The manager turns accepted transformations into rule candidates and feeds
//! them to the rule store. Within a pass it learns from the results of the
//! earlier layers; on its own it replays the durable transformation log.

pub mod diff;
pub mod extraction;
pub mod ledger;
pub mod security;
pub mod types;

pub use extraction::{PatternExtractor, extract_patterns, extract_patterns_opt};
pub use ledger::{ReplayLedger, finding_hash, observation_hash};
pub use security::{
    Finding, SecurityExtractor, Severity, extract_security_patterns,
    extract_security_patterns_json, parse_findings,
};
pub use types::*;

use crate::errors::FixError;
use crate::layers::ADAPTIVE_LAYER_ID;
use crate::rules::{AddOutcome, RuleCandidate, SharedRuleStore};
use crate::transform_log::SharedTransformLogger;
use crate::types::PreviousResult;
use std::sync::Mutex;
use tracing::{debug, info, warn};

pub struct LearningManager {
    store: SharedRuleStore,
    logger: Option<SharedTransformLogger>,
    ledger: Mutex<ReplayLedger>,
    extractor: PatternExtractor,
    security: SecurityExtractor,
}

impl LearningManager {
    pub fn new(
        store: SharedRuleStore,
        logger: Option<SharedTransformLogger>,
        ledger: ReplayLedger,
    ) -> Self {
        Self {
            store,
            logger,
            ledger: Mutex::new(ledger),
            extractor: PatternExtractor::new(),
            security: SecurityExtractor::new(),
        }
    }

    pub fn store(&self) -> &SharedRuleStore {
        &self.store
    }

    /// Learn from same-session results when there are any, otherwise from the
    /// transformation log. Security findings are learned either way.
    pub fn learn(&self, previous_results: &[PreviousResult], findings: &[Finding]) -> LearningReport {
        let mut report = LearningReport::default();

        let observations = if previous_results.is_empty() {
            let replayed = self.replay_log(&mut report);
            if self.logger.is_some() {
                report.source = LearningSource::TransformationLog;
            }
            replayed
        } else {
            report.source = LearningSource::SameSession;
            previous_results
                .iter()
                .filter(|r| r.success && r.code != r.original_code && is_learning_source(r.layer_id))
                .map(|r| Observation {
                    layer_id: r.layer_id,
                    before: r.original_code.clone(),
                    after: r.code.clone(),
                })
                .collect()
        };
        report.observations = observations.len();

        let mut ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());

        for observation in &observations {
            let hash = observation_hash(observation.layer_id, &observation.before, &observation.after);
            if ledger.contains(&hash) {
                report.already_seen += 1;
                continue;
            }

            let candidates =
                self.extractor
                    .extract(&observation.before, &observation.after, observation.layer_id);
            self.add_all(candidates, &mut report);
            ledger.record(hash);
        }

        for finding in findings {
            let line = finding.line.map(|l| l.to_string()).unwrap_or_default();
            let hash = finding_hash(&[
                finding.signature_id.as_str(),
                finding.file.as_deref().unwrap_or_default(),
                line.as_str(),
                finding.matched.as_deref().unwrap_or_default(),
                finding.pattern.as_deref().unwrap_or_default(),
            ]);
            if ledger.contains(&hash) {
                report.already_seen += 1;
                continue;
            }
            let candidates = self.security.extract([finding]);
            self.add_all(candidates, &mut report);
            ledger.record(hash);
        }

        if let Err(e) = ledger.save() {
            warn!("Could not persist replay ledger: {}", e);
            report.warnings.push(format!("replay ledger not saved: {e}"));
        }

        if report.learned_anything() {
            info!(
                "Learning pass ({:?}): {} new rules, {} reinforced",
                report.source, report.inserted, report.merged
            );
        }
        report
    }

    fn replay_log(&self, report: &mut LearningReport) -> Vec<Observation> {
        let Some(logger) = &self.logger else {
            return Vec::new();
        };
        let mut logger = logger.lock().unwrap_or_else(|e| e.into_inner());
        let entries = logger.entries();
        if logger.skipped_on_load() > 0 {
            report.warnings.push(format!(
                "{} unreadable transformation log entries skipped",
                logger.skipped_on_load()
            ));
        }

        entries
            .into_iter()
            .filter(|entry| {
                entry.success && entry.before != entry.after && is_learning_source(entry.layer_id)
            })
            .map(|entry| Observation {
                layer_id: entry.layer_id,
                before: entry.before,
                after: entry.after,
            })
            .collect()
    }

    fn add_all(&self, candidates: Vec<RuleCandidate>, report: &mut LearningReport) {
        report.candidates += candidates.len();
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        for candidate in candidates {
            let description = candidate.description.clone();
            match store.add_rule(candidate) {
                Ok(AddOutcome::Inserted(_)) => report.inserted += 1,
                Ok(AddOutcome::Merged(_)) => report.merged += 1,
                Err(e @ FixError::InvalidRule(_)) | Err(e @ FixError::Regex(_)) => {
                    debug!("Rejected candidate '{}': {}", description, e);
                    report.rejected += 1;
                }
                Err(e) => {
                    warn!("Could not store rule '{}': {}", description, e);
                    report.warnings.push(format!("rule '{description}' not stored: {e}"));
                }
            }
        }
    }
}

/// Edits made by applying learned rules are never observations: they would
/// reinforce the rules that produced them.
fn is_learning_source(layer_id: u8) -> bool {
    layer_id != ADAPTIVE_LAYER_ID
}

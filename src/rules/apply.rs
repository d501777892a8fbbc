//! Applying stored rules to source text.
//!
//! Each rule is tried independently; a rule that cannot be compiled or does
//! not match is skipped and the fold continues with the code it was given.

use super::types::*;
use crate::regex_engine::RegexEngine;
use tracing::{debug, warn};

/// Try a single rule against `code`.
pub fn apply_one(engine: &RegexEngine, rule: &Rule, code: &str) -> Result<Applied, Skipped> {
    if !rule.is_applicable() {
        return Err(Skipped::LowConfidence);
    }

    let compiled = engine
        .compile_rule_pattern(&rule.pattern)
        .map_err(|e| Skipped::InvalidPattern(e.to_string()))?;

    if !compiled.is_match(code) {
        return Err(Skipped::NoMatch);
    }

    let replaced = compiled.replace(code, &rule.replacement);
    if replaced == code {
        return Err(Skipped::NoMatch);
    }

    Ok(Applied {
        description: rule.description.clone(),
        code: replaced.into_owned(),
    })
}

/// Apply every applicable rule in order, threading the code through.
pub fn apply_rule_set(engine: &RegexEngine, rules: &[Rule], code: &str) -> ApplyResult {
    rules.iter().fold(ApplyResult::unchanged(code), |mut acc, rule| {
        match apply_one(engine, rule, &acc.transformed_code) {
            Ok(applied) => {
                debug!("Applied rule '{}'", applied.description);
                acc.transformed_code = applied.code;
                acc.applied_rules.push(applied.description);
            }
            Err(Skipped::InvalidPattern(reason)) => {
                warn!("Skipping rule '{}': {}", rule.description, reason);
            }
            Err(Skipped::LowConfidence) | Err(Skipped::NoMatch) => {}
        }
        acc
    })
}

/// Descriptions of rules that would match but lack the confidence to be applied.
pub fn suggest_rules(engine: &RegexEngine, rules: &[Rule], code: &str) -> Vec<String> {
    rules
        .iter()
        .filter(|rule| !rule.is_applicable() && rule.confidence >= SUGGESTION_CONFIDENCE)
        .filter(|rule| {
            engine
                .compile_rule_pattern(&rule.pattern)
                .map(|compiled| compiled.is_match(code))
                .unwrap_or(false)
        })
        .map(|rule| rule.description.clone())
        .collect()
}

//! Rule candidates from before/after pairs.
//!
//! Layer-aware extractors run first and claim the parts of the diff they
//! understand; everything else goes through a generic line diff.

use super::diff::{Hunk, diff_hunks};
use crate::layers::nextjs::{CLIENT_HOOKS, HOOK_CALL, LEADING_DIRECTIVE};
use crate::regex_engine::{RegexEngine, SerializedPattern, escape_literal, escape_replacement};
use crate::rules::RuleCandidate;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

pub const LAYER_AWARE_CONFIDENCE: f64 = 0.8;
pub const GENERIC_CONFIDENCE: f64 = 0.7;

/// Segments with fewer non-whitespace characters are too unspecific to learn.
const MIN_SEGMENT_CHARS: usize = 3;
const MAX_SEGMENT_LEN: usize = 240;
const MAX_DIFF_LINES: usize = 2000;
/// Removed and added lines below this similarity are not treated as an edit.
const MIN_LINE_SIMILARITY: f64 = 0.4;

static EVENT_HANDLER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bon[A-Z][A-Za-z]*=\{").expect("event handler regex"));

/// Produces rule candidates and drops any that break the rule invariants.
#[derive(Debug, Clone, Default)]
pub struct PatternExtractor {
    engine: RegexEngine,
}

impl PatternExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(engine: RegexEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &RegexEngine {
        &self.engine
    }

    pub fn extract(&self, before: &str, after: &str, layer_id: u8) -> Vec<RuleCandidate> {
        if before == after || before.trim().is_empty() || after.trim().is_empty() {
            return Vec::new();
        }

        let mut candidates = Vec::new();
        let mut after_for_diff = after;

        if let Some((directive, rest)) = new_leading_directive(before, after) {
            if let Some(candidate) = directive_candidate(before, directive, layer_id) {
                candidates.push(candidate);
            }
            after_for_diff = rest;
        }

        if before.lines().count() <= MAX_DIFF_LINES && after_for_diff.lines().count() <= MAX_DIFF_LINES {
            match diff_hunks(before, after_for_diff) {
                Some(hunks) => {
                    for hunk in &hunks {
                        candidates.extend(generic_candidates(hunk, layer_id));
                    }
                }
                None => debug!("Diff too large for layer {layer_id}, skipping generic extraction"),
            }
        } else {
            debug!("Input exceeds {MAX_DIFF_LINES} lines, skipping generic extraction");
        }

        self.finalize(candidates)
    }

    fn finalize(&self, candidates: Vec<RuleCandidate>) -> Vec<RuleCandidate> {
        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|candidate| {
                seen.insert((candidate.description.clone(), candidate.pattern.clone()))
            })
            .filter(|candidate| match self.engine.compile_rule_pattern(&candidate.pattern) {
                Ok(_) => true,
                Err(e) => {
                    debug!("Dropping candidate '{}': {}", candidate.description, e);
                    false
                }
            })
            .collect()
    }
}

/// Convenience wrapper using a fresh engine.
pub fn extract_patterns(before: &str, after: &str, layer_id: u8) -> Vec<RuleCandidate> {
    PatternExtractor::new().extract(before, after, layer_id)
}

/// Absent inputs yield no candidates.
pub fn extract_patterns_opt(before: Option<&str>, after: Option<&str>, layer_id: u8) -> Vec<RuleCandidate> {
    match (before, after) {
        (Some(before), Some(after)) => extract_patterns(before, after, layer_id),
        _ => Vec::new(),
    }
}

/// If `after` starts with a client directive that `before` lacks, return the
/// directive quote character and the rest of `after` with it removed.
fn new_leading_directive<'a>(before: &str, after: &'a str) -> Option<(char, &'a str)> {
    if LEADING_DIRECTIVE.is_match(before) {
        return None;
    }
    let captures = LEADING_DIRECTIVE.captures(after)?;
    let whole = captures.get(0)?;
    let quote = captures.get(1)?.as_str().chars().next()?;
    let rest = after[whole.end()..].trim_start_matches(['\r', '\n']);
    Some((quote, rest))
}

fn directive_candidate(before: &str, quote: char, layer_id: u8) -> Option<RuleCandidate> {
    let directive = format!("{quote}use client{quote};");
    let (body, description) = if HOOK_CALL.is_match(before) {
        (
            format!(r"\buse(?:{CLIENT_HOOKS})\s*\("),
            "Add 'use client' directive to modules that call React hooks",
        )
    } else if EVENT_HANDLER.is_match(before) {
        (
            r"\bon[A-Z][A-Za-z]*=\{".to_string(),
            "Add 'use client' directive to modules with event handlers",
        )
    } else {
        debug!("Directive added without hooks or handlers in the original, not learning it");
        return None;
    };

    // Leading import block followed by client-only usage. Once the directive is
    // inserted the text no longer starts with an import, so it cannot fire twice.
    let source = format!(r"^((?:import[^\n]*\n)+)([\s\S]*?{body})");
    let replacement = format!("{}\n\n$1$2", escape_replacement(&directive));

    Some(
        RuleCandidate::new(
            description,
            SerializedPattern::new(source, ""),
            replacement,
            LAYER_AWARE_CONFIDENCE,
        )
        .from_layer(layer_id),
    )
}

fn generic_candidates(hunk: &Hunk<'_>, layer_id: u8) -> Vec<RuleCandidate> {
    if hunk.is_pure_addition() {
        return Vec::new();
    }

    if hunk.is_pure_removal() {
        return hunk
            .removed
            .iter()
            .filter_map(|line| removal_candidate(line, layer_id))
            .collect();
    }

    let pairs = align_lines(&hunk.removed, &hunk.added);
    // An added line left without a partner may be a rewrite of an unpaired
    // removed line, so those are only deletions when every addition is paired.
    let all_added_paired =
        pairs.iter().filter(|(_, new)| new.is_some()).count() == hunk.added.len();

    let mut candidates = Vec::new();
    for (old, new) in pairs {
        let candidate = match new {
            Some(new) if new.trim_start().starts_with("import ") => None,
            Some(new) => replacement_candidate(old, new, layer_id),
            None if all_added_paired => removal_candidate(old, layer_id),
            None => None,
        };
        candidates.extend(candidate);
    }
    candidates
}

/// Pairs each removed line with the most similar added line, keeping order.
/// Removed lines without a close enough partner pair with `None`.
fn align_lines<'a>(removed: &[&'a str], added: &[&'a str]) -> Vec<(&'a str, Option<&'a str>)> {
    let mut next = 0;
    removed
        .iter()
        .map(|old| {
            let best = added
                .iter()
                .enumerate()
                .skip(next)
                .map(|(i, new)| (i, line_similarity(old, new)))
                .filter(|(_, score)| *score >= MIN_LINE_SIMILARITY)
                .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)));
            match best {
                Some((i, _)) => {
                    next = i + 1;
                    (*old, Some(added[i]))
                }
                None => (*old, None),
            }
        })
        .collect()
}

/// Share of the longer trimmed line covered by the common prefix and suffix.
fn line_similarity(old: &str, new: &str) -> f64 {
    let (old, new) = (old.trim(), new.trim());
    let longest = old.len().max(new.len());
    if longest == 0 {
        return 0.0;
    }
    let prefix = common_prefix(old, new);
    let suffix = common_suffix(&old[prefix..], &new[prefix..]);
    (prefix + suffix) as f64 / longest as f64
}

fn removal_candidate(line: &str, layer_id: u8) -> Option<RuleCandidate> {
    let trimmed = line.trim();
    if !is_specific(trimmed) {
        return None;
    }

    let source = format!(r"^[ \t]*{}[ \t]*(?:\r?\n|$)", escape_literal(trimmed));
    Some(
        RuleCandidate::new(
            format!("Layer {layer_id}: remove `{}`", abbreviate(trimmed)),
            SerializedPattern::new(source, "gm"),
            "",
            GENERIC_CONFIDENCE,
        )
        .from_layer(layer_id),
    )
}

fn replacement_candidate(old: &str, new: &str, layer_id: u8) -> Option<RuleCandidate> {
    let (mut old_segment, mut new_segment) = changed_window(old, new);

    if old_segment.is_empty() {
        // Pure insertion inside a line: learn the whole line instead.
        old_segment = old.trim();
        new_segment = new.trim();
    }

    if !is_specific(old_segment) || new_segment.contains(old_segment) {
        return None;
    }

    Some(
        RuleCandidate::new(
            format!(
                "Layer {layer_id}: replace `{}` with `{}`",
                abbreviate(old_segment),
                abbreviate(new_segment)
            ),
            SerializedPattern::global(literal_with_boundaries(old_segment)),
            escape_replacement(new_segment),
            GENERIC_CONFIDENCE,
        )
        .from_layer(layer_id),
    )
}

/// The differing middle of two lines, widened to word boundaries.
fn changed_window<'a, 'b>(old: &'a str, new: &'b str) -> (&'a str, &'b str) {
    let prefix = common_prefix(old, new);
    let suffix = common_suffix(&old[prefix..], &new[prefix..]);

    let mut start = prefix;
    while let Some(c) = old[..start].chars().next_back() {
        if !is_word_char(c) {
            break;
        }
        start -= c.len_utf8();
    }

    let mut extend = 0;
    let old_tail = &old[old.len() - suffix..];
    for c in old_tail.chars() {
        if !is_word_char(c) {
            break;
        }
        extend += c.len_utf8();
    }

    let old_end = old.len() - suffix + extend;
    let new_end = new.len() - suffix + extend;
    (old[start..old_end].trim(), new[start..new_end].trim())
}

/// Escaped literal, anchored at word boundaries where the segment starts or
/// ends inside a word so `var` does not rewrite `variable`.
fn literal_with_boundaries(segment: &str) -> String {
    let mut source = String::new();
    if segment.chars().next().is_some_and(is_word_char) {
        source.push_str(r"\b");
    }
    source.push_str(&escape_literal(segment));
    if segment.chars().next_back().is_some_and(is_word_char) {
        source.push_str(r"\b");
    }
    source
}

fn common_prefix(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .take_while(|((_, ca), cb)| ca == cb)
        .last()
        .map(|((i, c), _)| i + c.len_utf8())
        .unwrap_or(0)
}

fn common_suffix(a: &str, b: &str) -> usize {
    a.chars()
        .rev()
        .zip(b.chars().rev())
        .take_while(|(ca, cb)| ca == cb)
        .map(|(c, _)| c.len_utf8())
        .sum()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn is_specific(segment: &str) -> bool {
    segment.len() <= MAX_SEGMENT_LEN
        && segment.chars().filter(|c| !c.is_whitespace()).count() >= MIN_SEGMENT_CHARS
}

fn abbreviate(text: &str) -> String {
    const LIMIT: usize = 60;
    let single_line: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= LIMIT {
        single_line
    } else {
        let cut: String = single_line.chars().take(LIMIT).collect();
        format!("{cut}...")
    }
}

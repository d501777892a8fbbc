//! # Regex Engine
//!
//! Rule patterns are persisted as `{source, flags}` in the JavaScript regex
//! dialect and turned into live matchers only at use time. This module owns
//! that translation, the compiled-pattern cache, and the checks that keep
//! over-general patterns out of the rule store.

use crate::errors::FixError;
use lru::LruCache;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Compiled programs larger than this are rejected as malformed.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Single characters of very different classes. A pattern matching all of
/// them matches essentially anything.
const UNIVERSAL_PROBES: &[&str] = &["a", "Z", "0", "_", " ", "\n", ";", "{", "<", "\"", "é"];

/// A regular expression in storable form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SerializedPattern {
    pub source: String,
    #[serde(default)]
    pub flags: String,
}

impl SerializedPattern {
    pub fn new(source: impl Into<String>, flags: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            flags: flags.into(),
        }
    }

    /// Pattern replacing every occurrence (`g` flag).
    pub fn global(source: impl Into<String>) -> Self {
        Self::new(source, "g")
    }

    pub fn is_global(&self) -> bool {
        self.flags.contains('g')
    }
}

impl fmt::Display for SerializedPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

/// A live matcher built from a [`SerializedPattern`].
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    regex: Regex,
    global: bool,
}

impl CompiledPattern {
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn as_regex(&self) -> &Regex {
        &self.regex
    }

    /// Replace using a JavaScript-style replacement string (`$1`, `$&`, `$<name>`, `$$`).
    pub fn replace<'t>(&self, text: &'t str, replacement: &str) -> Cow<'t, str> {
        let replacement = translate_replacement(replacement);
        if self.global {
            self.regex.replace_all(text, replacement.as_str())
        } else {
            self.regex.replace(text, replacement.as_str())
        }
    }
}

#[derive(Clone)]
pub struct RegexEngine {
    cache: Arc<Mutex<LruCache<SerializedPattern, CompiledPattern>>>,
}

impl std::fmt::Debug for RegexEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegexEngine")
            .field("cached_patterns", &self.cached_patterns())
            .finish()
    }
}

impl Default for RegexEngine {
    fn default() -> Self {
        Self::with_capacity(256)
    }
}

impl RegexEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Compile a stored pattern, consulting the cache first.
    pub fn compile(&self, pattern: &SerializedPattern) -> Result<CompiledPattern, FixError> {
        {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(compiled) = cache.get(pattern) {
                return Ok(compiled.clone());
            }
        }

        let flags = parse_flags(&pattern.flags)?;
        let regex = RegexBuilder::new(&pattern.source)
            .case_insensitive(flags.case_insensitive)
            .multi_line(flags.multi_line)
            .dot_matches_new_line(flags.dot_all)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()?;

        let compiled = CompiledPattern {
            regex,
            global: flags.global,
        };

        {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            cache.put(pattern.clone(), compiled.clone());
        }

        Ok(compiled)
    }

    /// Compile and enforce the rule invariants: the pattern must not match the
    /// empty string and must not be a universal matcher.
    pub fn compile_rule_pattern(
        &self,
        pattern: &SerializedPattern,
    ) -> Result<CompiledPattern, FixError> {
        if pattern.source.trim().is_empty() {
            return Err(FixError::InvalidRule("pattern source is empty".to_string()));
        }

        let compiled = self.compile(pattern)?;

        if compiled.is_match("") {
            return Err(FixError::InvalidRule(format!(
                "pattern {pattern} matches the empty string"
            )));
        }

        if is_anchor_only(&pattern.source)
            || UNIVERSAL_PROBES.iter().all(|probe| compiled.is_match(probe))
        {
            return Err(FixError::InvalidRule(format!(
                "pattern {pattern} is too general"
            )));
        }

        Ok(compiled)
    }

    pub fn cached_patterns(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[derive(Debug, Default)]
struct Flags {
    global: bool,
    case_insensitive: bool,
    multi_line: bool,
    dot_all: bool,
}

fn parse_flags(flags: &str) -> Result<Flags, FixError> {
    let mut parsed = Flags::default();
    let mut seen = String::new();

    for flag in flags.chars() {
        if seen.contains(flag) {
            return Err(FixError::InvalidRule(format!("duplicate regex flag '{flag}'")));
        }
        seen.push(flag);

        match flag {
            'g' => parsed.global = true,
            'i' => parsed.case_insensitive = true,
            'm' => parsed.multi_line = true,
            's' => parsed.dot_all = true,
            // Unicode mode is always on.
            'u' => {}
            other => {
                return Err(FixError::InvalidRule(format!(
                    "unsupported regex flag '{other}'"
                )));
            }
        }
    }

    Ok(parsed)
}

/// Patterns consisting only of anchors and empty groups.
fn is_anchor_only(source: &str) -> bool {
    let mut rest = source.trim();
    loop {
        let stripped = ["^", "$", "\\b", "\\B", "\\A", "\\z", "(?:)", "()"]
            .iter()
            .find_map(|anchor| rest.strip_prefix(anchor));
        match stripped {
            Some(next) => rest = next,
            None => break,
        }
    }
    rest.is_empty()
}

/// Translate a JavaScript replacement string into the `regex` crate syntax.
pub fn translate_replacement(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len() + 8);
    let mut chars = replacement.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                out.push_str("$$");
            }
            Some('&') => {
                chars.next();
                out.push_str("${0}");
            }
            Some(d) if d.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() && digits.len() < 2 {
                        digits.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(&format!("${{{digits}}}"));
            }
            Some('<') => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for n in chars.by_ref() {
                    if n == '>' {
                        closed = true;
                        break;
                    }
                    name.push(n);
                }
                if closed && !name.is_empty() {
                    out.push_str(&format!("${{{name}}}"));
                } else {
                    out.push_str("$$<");
                    out.push_str(&name);
                }
            }
            _ => out.push_str("$$"),
        }
    }

    out
}

/// Escape text so it matches literally in the JavaScript dialect.
pub fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if matches!(
            c,
            '\\' | '^' | '$' | '.' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '/'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape text for use as a literal JavaScript replacement string.
pub fn escape_replacement(text: &str) -> String {
    text.replace('$', "$$")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flag_replaces_all() {
        let engine = RegexEngine::new();
        let compiled = engine.compile(&SerializedPattern::global("a")).unwrap();
        assert_eq!(compiled.replace("banana", "o"), "bonono");

        let compiled = engine.compile(&SerializedPattern::new("a", "")).unwrap();
        assert_eq!(compiled.replace("banana", "o"), "bonana");
    }

    #[test]
    fn test_case_insensitive_flag() {
        let engine = RegexEngine::new();
        let compiled = engine.compile(&SerializedPattern::new("hello", "gi")).unwrap();
        assert!(compiled.is_match("HeLLo world"));
    }

    #[test]
    fn test_sticky_flag_rejected() {
        let engine = RegexEngine::new();
        assert!(engine.compile(&SerializedPattern::new("a", "y")).is_err());
        assert!(engine.compile(&SerializedPattern::new("a", "gg")).is_err());
    }

    #[test]
    fn test_cache_reuses_compiled_patterns() {
        let engine = RegexEngine::with_capacity(2);
        let pattern = SerializedPattern::global("foo");
        engine.compile(&pattern).unwrap();
        engine.compile(&pattern).unwrap();
        assert_eq!(engine.cached_patterns(), 1);
    }

    #[test]
    fn test_translate_replacement() {
        assert_eq!(translate_replacement("$1-$2"), "${1}-${2}");
        assert_eq!(translate_replacement("[$&]"), "[${0}]");
        assert_eq!(translate_replacement("$<name>!"), "${name}!");
        assert_eq!(translate_replacement("cost: $$5"), "cost: $$5");
        assert_eq!(translate_replacement("a $ b"), "a $$ b");
    }

    #[test]
    fn test_capture_group_replacement() {
        let engine = RegexEngine::new();
        let compiled = engine
            .compile(&SerializedPattern::global(r"var (\w+)"))
            .unwrap();
        assert_eq!(compiled.replace("var x = 1;", "const $1"), "const x = 1;");
    }

    #[test]
    fn test_rule_pattern_rejects_empty_matching() {
        let engine = RegexEngine::new();
        for source in ["^", "a*", "(?:)", "x?", "^$", "\\b"] {
            assert!(
                engine
                    .compile_rule_pattern(&SerializedPattern::global(source))
                    .is_err(),
                "{source} should be rejected"
            );
        }
    }

    #[test]
    fn test_rule_pattern_rejects_universal() {
        let engine = RegexEngine::new();
        assert!(
            engine
                .compile_rule_pattern(&SerializedPattern::new(".", "gs"))
                .is_err()
        );
        assert!(
            engine
                .compile_rule_pattern(&SerializedPattern::global(r"[\s\S]+"))
                .is_err()
        );
        assert!(
            engine
                .compile_rule_pattern(&SerializedPattern::global("oldValue"))
                .is_ok()
        );
    }

    #[test]
    fn test_escape_literal_round_trips() {
        let engine = RegexEngine::new();
        let text = "console.log(\"a+b\") /* $x */";
        let compiled = engine
            .compile(&SerializedPattern::global(escape_literal(text)))
            .unwrap();
        assert!(compiled.is_match(text));
        assert!(!compiled.is_match("consoleXlog(\"a+b\")"));
    }
}

//! # Syntax Validation
//!
//! Parse-only validation of candidate output. A source text is valid when
//! tree-sitter produces a tree without `ERROR` nodes and without zero-width
//! tokens it had to invent to finish the parse. No semantic analysis.

use ast_grep_core::AstGrep;
use ast_grep_core::tree_sitter::StrDoc;
use ast_grep_language::SupportLang as Language;
use std::path::Path;

/// Tokens tree-sitter inserts (zero-width) when recovering from truncated input.
const RECOVERY_TOKENS: &[&str] = &[")", "}", "]", ">", "identifier", "property_identifier"];

/// Maximum number of problems reported per validation.
const MAX_REPORTED_ERRORS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyntaxValidator;

impl SyntaxValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn is_valid(&self, code: &str, lang: Language) -> bool {
        self.validate(code, lang).valid
    }

    pub fn validate(&self, code: &str, lang: Language) -> ValidationOutcome {
        let ast = AstGrep::new(code, lang);
        let mut errors = Vec::new();
        Self::collect_errors(ast.root(), true, &mut errors);

        ValidationOutcome {
            valid: errors.is_empty(),
            errors,
        }
    }

    fn collect_errors(
        node: ast_grep_core::Node<StrDoc<Language>>,
        is_root: bool,
        errors: &mut Vec<String>,
    ) {
        if errors.len() >= MAX_REPORTED_ERRORS {
            return;
        }

        let kind = node.kind();
        let range = node.range();
        let line = node.start_pos().line() + 1;

        if kind == "ERROR" {
            errors.push(format!("syntax error at line {line}"));
            return;
        }

        let is_leaf = node.children().count() == 0;
        if !is_root && is_leaf && range.start == range.end && RECOVERY_TOKENS.contains(&kind.as_ref())
        {
            errors.push(format!("missing '{kind}' at line {line}"));
            return;
        }

        for child in node.children() {
            Self::collect_errors(child, false, errors);
        }
    }
}

/// Parser used for a file, chosen from its extension.
///
/// Plain `.ts` files must not be parsed as TSX (generic arrow functions and
/// type assertions differ); everything else goes through TSX so JSX inside
/// `.js` files parses.
pub fn language_for_path(file_path: &str) -> Language {
    let extension = Path::new(file_path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("ts") | Some("mts") | Some("cts") => Language::TypeScript,
        _ => Language::Tsx,
    }
}

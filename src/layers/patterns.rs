//! Layer 2: debug statement removal and HTML entity cleanup.

use super::{Layer, LayerContext, LayerEdit, SgNode, TextEdit, apply_edits, line_span, walk};
use crate::errors::FixError;
use crate::types::{Change, ChangeKind};
use ast_grep_core::AstGrep;
use regex::Regex;
use std::sync::LazyLock;

const DEBUG_CALLEES: &[&str] = &["console.log", "console.debug"];

/// Entities left behind by HTML-escaping tools inside string literals.
const ENTITIES: &[(&str, &str)] = &[("&quot;", "\""), ("&#x27;", "'"), ("&#39;", "'"), ("&amp;", "&")];

static DEBUG_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*console\.(?:log|debug)\([^\n]*\);?[ \t]*(?:\r?\n|\z)")
        .expect("debug line regex")
});

static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(?:quot|#x27|#39|amp);").expect("entity regex"));

#[derive(Debug, Clone, Copy, Default)]
pub struct PatternsLayer;

impl PatternsLayer {
    pub fn new() -> Self {
        Self
    }

    fn is_debug_statement(node: &SgNode<'_>) -> bool {
        if node.kind() != "expression_statement" {
            return false;
        }
        let Some(call) = node.children().next() else {
            return false;
        };
        if call.kind() != "call_expression" {
            return false;
        }
        call.children()
            .next()
            .is_some_and(|callee| DEBUG_CALLEES.contains(&&*callee.text()))
    }
}

impl Layer for PatternsLayer {
    fn id(&self) -> u8 {
        2
    }

    fn name(&self) -> &str {
        "patterns"
    }

    fn ast_transform(
        &self,
        code: &str,
        ctx: &LayerContext<'_>,
    ) -> Result<Option<LayerEdit>, FixError> {
        let ast = AstGrep::new(code, ctx.language);
        let mut edits = Vec::new();
        let mut removed = 0;
        let mut entities = 0;

        walk(ast.root(), &mut |node| {
            if Self::is_debug_statement(node) {
                let range = node.range();
                let (start, end) = line_span(code, range.start, range.end);
                edits.push(TextEdit::delete(start, end));
                removed += 1;
            } else if node.kind() == "string_fragment" {
                let Some(string) = node.parent() else {
                    return;
                };
                // JSX attribute strings have no escapes; leave them to the markup.
                if string.parent().is_some_and(|p| p.kind() == "jsx_attribute") {
                    return;
                }
                let quote = string.text().chars().next();
                let text = node.text();
                let cleaned = decode_entities_quoted(&text, quote);
                if cleaned != text {
                    let range = node.range();
                    edits.push(TextEdit {
                        start: range.start,
                        end: range.end,
                        replacement: cleaned,
                    });
                    entities += 1;
                }
            }
        });

        if edits.is_empty() {
            return Ok(None);
        }

        let code = apply_edits(code, edits)?;
        Ok(Some(LayerEdit::new(code, changes(ChangeKind::Ast, removed, entities))))
    }

    fn regex_transform(
        &self,
        code: &str,
        _ctx: &LayerContext<'_>,
    ) -> Result<Option<LayerEdit>, FixError> {
        let removed = DEBUG_LINE.find_iter(code).count();
        let without_debug = DEBUG_LINE.replace_all(code, "");
        let entities = ENTITY.find_iter(&without_debug).count();
        let cleaned = decode_entities(&without_debug);

        if cleaned == code {
            return Ok(None);
        }
        Ok(Some(LayerEdit::new(cleaned, changes(ChangeKind::Regex, removed, entities))))
    }
}

fn decode_entities(text: &str) -> String {
    decode_entities_quoted(text, None)
}

/// Decode entities, escaping any that decode to the enclosing quote.
fn decode_entities_quoted(text: &str, quote: Option<char>) -> String {
    // `&amp;` last so `&amp;quot;` decodes one level only.
    ENTITIES.iter().fold(text.to_string(), |acc, (entity, plain)| {
        if quote.is_some_and(|q| plain.starts_with(q)) {
            acc.replace(entity, &format!("\\{plain}"))
        } else {
            acc.replace(entity, plain)
        }
    })
}

fn changes(kind: ChangeKind, removed: usize, entities: usize) -> Vec<Change> {
    let mut changes = Vec::new();
    if removed > 0 {
        changes.push(Change::new(kind, format!("Removed {removed} debug statement(s)")).with_layer(2));
    }
    if entities > 0 {
        changes.push(Change::new(kind, format!("Decoded HTML entities in {entities} place(s)")).with_layer(2));
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use ast_grep_language::SupportLang as Language;

    fn ctx() -> LayerContext<'static> {
        LayerContext {
            file_path: "test.tsx",
            language: Language::Tsx,
            dry_run: false,
            previous_results: &[],
            findings: &[],
        }
    }

    #[test]
    fn test_ast_removes_debug_lines() {
        let code = "function f() {\n  console.log('x');\n  return 1;\n}\n";
        let edit = PatternsLayer.ast_transform(code, &ctx()).unwrap().unwrap();
        assert_eq!(edit.code, "function f() {\n  return 1;\n}\n");
        assert_eq!(edit.changes.len(), 1);
        assert_eq!(edit.changes[0].kind, ChangeKind::Ast);
    }

    #[test]
    fn test_ast_keeps_other_console_calls() {
        let code = "console.error('boom');\n";
        assert!(PatternsLayer.ast_transform(code, &ctx()).unwrap().is_none());
    }

    #[test]
    fn test_ast_decodes_entities_in_strings() {
        let code = "const s = \"say &quot;hi&quot;\";\n";
        let edit = PatternsLayer.ast_transform(code, &ctx()).unwrap().unwrap();
        assert_eq!(edit.code, "const s = \"say \\\"hi\\\"\";\n");
    }

    #[test]
    fn test_ast_leaves_jsx_attribute_strings() {
        let code = "const a = <img alt=\"&quot;x&quot;\" />;\n";
        assert!(PatternsLayer.ast_transform(code, &ctx()).unwrap().is_none());
    }

    #[test]
    fn test_regex_fallback() {
        let code = "a();\n    console.debug(state);\nb();\n";
        let edit = PatternsLayer.regex_transform(code, &ctx()).unwrap().unwrap();
        assert_eq!(edit.code, "a();\nb();\n");
        assert_eq!(edit.changes[0].kind, ChangeKind::Regex);
    }

    #[test]
    fn test_nothing_to_do() {
        let code = "export const x = 1;\n";
        assert!(PatternsLayer.ast_transform(code, &ctx()).unwrap().is_none());
        assert!(PatternsLayer.regex_transform(code, &ctx()).unwrap().is_none());
    }
}

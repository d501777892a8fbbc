//! Layer 3: component accessibility fixes. Adds an empty `alt` to `<img>`
//! elements that have none.

use super::{Layer, LayerContext, LayerEdit, SgNode, TextEdit, apply_edits, walk};
use crate::errors::FixError;
use crate::types::{Change, ChangeKind};
use ast_grep_core::AstGrep;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static IMG_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<img\b([^<>{}]*?)(\s*/?>)").expect("img tag regex"));

static ALT_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\balt\s*=").expect("alt attribute regex"));

#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentsLayer;

impl ComponentsLayer {
    pub fn new() -> Self {
        Self
    }

    /// Offset right after the tag name of an `<img>` element without `alt`.
    fn missing_alt_insertion(node: &SgNode<'_>) -> Option<usize> {
        let kind = node.kind();
        if kind != "jsx_self_closing_element" && kind != "jsx_opening_element" {
            return None;
        }

        let mut children = node.children();
        let name = children.find(|child| child.kind() == "identifier")?;
        if name.text() != "img" {
            return None;
        }

        let has_alt = node.children().any(|child| {
            child.kind() == "jsx_attribute"
                && child
                    .children()
                    .next()
                    .is_some_and(|attr| attr.text() == "alt")
        });
        let has_spread = node
            .children()
            .any(|child| child.kind() == "jsx_expression");

        if has_alt || has_spread {
            None
        } else {
            Some(name.range().end)
        }
    }
}

impl Layer for ComponentsLayer {
    fn id(&self) -> u8 {
        3
    }

    fn name(&self) -> &str {
        "components"
    }

    fn ast_transform(
        &self,
        code: &str,
        ctx: &LayerContext<'_>,
    ) -> Result<Option<LayerEdit>, FixError> {
        let ast = AstGrep::new(code, ctx.language);
        let mut edits = Vec::new();

        walk(ast.root(), &mut |node| {
            if let Some(at) = Self::missing_alt_insertion(node) {
                edits.push(TextEdit::insert(at, " alt=\"\""));
            }
        });

        if edits.is_empty() {
            return Ok(None);
        }

        let count = edits.len();
        let code = apply_edits(code, edits)?;
        Ok(Some(LayerEdit::new(code, vec![alt_change(ChangeKind::Ast, count)])))
    }

    fn regex_transform(
        &self,
        code: &str,
        _ctx: &LayerContext<'_>,
    ) -> Result<Option<LayerEdit>, FixError> {
        let mut count = 0;
        let fixed = IMG_TAG.replace_all(code, |caps: &Captures<'_>| {
            let attrs = &caps[1];
            if ALT_ATTR.is_match(attrs) {
                caps[0].to_string()
            } else {
                count += 1;
                format!("<img alt=\"\"{}{}", attrs, &caps[2])
            }
        });

        if count == 0 {
            return Ok(None);
        }
        Ok(Some(LayerEdit::new(
            fixed.into_owned(),
            vec![alt_change(ChangeKind::Regex, count)],
        )))
    }
}

fn alt_change(kind: ChangeKind, count: usize) -> Change {
    Change::new(kind, format!("Added alt attribute to {count} <img> element(s)")).with_layer(3)
}

//! Layer 5: Next.js App Router fixes. Modules that call client-only React
//! hooks get a leading `'use client'` directive.

use super::{Layer, LayerContext, LayerEdit, SgNode, walk};
use crate::errors::FixError;
use crate::types::{Change, ChangeKind};
use ast_grep_core::AstGrep;
use regex::Regex;
use std::sync::LazyLock;

/// Hook names (after the `use` prefix) that only work in client components.
pub const CLIENT_HOOKS: &str =
    "State|Effect|Reducer|Ref|Context|Callback|Memo|LayoutEffect|Transition|Router|Pathname|SearchParams";

pub const DIRECTIVE: &str = "'use client';";

pub static HOOK_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\buse(?:{CLIENT_HOOKS})\s*\(")).expect("hook call regex"));

static HOOK_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^use(?:{CLIENT_HOOKS})$")).expect("hook name regex"));

pub static LEADING_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*(['"])use client['"];?"#).expect("directive regex"));

#[derive(Debug, Clone, Copy, Default)]
pub struct NextJsLayer;

impl NextJsLayer {
    pub fn new() -> Self {
        Self
    }

    fn is_directive(node: &SgNode<'_>) -> bool {
        node.kind() == "expression_statement"
            && node.children().next().is_some_and(|child| {
                child.kind() == "string" && matches!(&*child.text(), "'use client'" | "\"use client\"")
            })
    }

    fn is_hook_call(node: &SgNode<'_>) -> bool {
        node.kind() == "call_expression"
            && node
                .children()
                .next()
                .is_some_and(|callee| callee.kind() == "identifier" && HOOK_NAME.is_match(&callee.text()))
    }
}

impl Layer for NextJsLayer {
    fn id(&self) -> u8 {
        5
    }

    fn name(&self) -> &str {
        "nextjs"
    }

    fn ast_transform(
        &self,
        code: &str,
        ctx: &LayerContext<'_>,
    ) -> Result<Option<LayerEdit>, FixError> {
        let ast = AstGrep::new(code, ctx.language);
        let root = ast.root();

        let first_statement = root.children().find(|child| child.kind() != "comment");
        if first_statement.as_ref().is_some_and(Self::is_directive) {
            return Ok(None);
        }

        let mut uses_hooks = false;
        walk(ast.root(), &mut |node| {
            uses_hooks = uses_hooks || Self::is_hook_call(node);
        });
        if !uses_hooks {
            return Ok(None);
        }

        Ok(Some(with_directive(code, ChangeKind::Ast)))
    }

    fn regex_transform(
        &self,
        code: &str,
        _ctx: &LayerContext<'_>,
    ) -> Result<Option<LayerEdit>, FixError> {
        if LEADING_DIRECTIVE.is_match(code) || !HOOK_CALL.is_match(code) {
            return Ok(None);
        }
        Ok(Some(with_directive(code, ChangeKind::Regex)))
    }
}

fn with_directive(code: &str, kind: ChangeKind) -> LayerEdit {
    LayerEdit::new(
        format!("{DIRECTIVE}\n\n{code}"),
        vec![Change::new(kind, "Added 'use client' directive for hook usage").with_layer(5)],
    )
}

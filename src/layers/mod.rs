//! # Layers
//!
//! A layer is one class of fix. It may offer an AST transform, a regex
//! transform, or both; the orchestrator decides which output to keep and
//! validates everything before accepting it.

pub mod adaptive;
pub mod catalog;
pub mod components;
pub mod nextjs;
pub mod patterns;

pub use adaptive::AdaptiveLayer;
pub use catalog::{default_layers, layer_name};
pub use components::ComponentsLayer;
pub use nextjs::NextJsLayer;
pub use patterns::PatternsLayer;

use crate::errors::FixError;
use crate::learning::Finding;
use crate::types::{Change, PreviousResult};
use ast_grep_core::tree_sitter::StrDoc;
use ast_grep_language::SupportLang as Language;

pub type SgNode<'r> = ast_grep_core::Node<'r, StrDoc<Language>>;

/// Id of the learning layer.
pub const ADAPTIVE_LAYER_ID: u8 = 7;

/// What a layer sees besides the text it transforms.
#[derive(Debug, Clone, Copy)]
pub struct LayerContext<'a> {
    pub file_path: &'a str,
    pub language: Language,
    pub dry_run: bool,
    /// Accepted results of earlier layers plus any supplied by the caller.
    pub previous_results: &'a [PreviousResult],
    pub findings: &'a [Finding],
}

/// Candidate output of one transform stage.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerEdit {
    pub code: String,
    pub changes: Vec<Change>,
    /// Informational changes that do not count as applied.
    pub notes: Vec<Change>,
}

impl LayerEdit {
    pub fn new(code: String, changes: Vec<Change>) -> Self {
        Self {
            code,
            changes,
            notes: Vec::new(),
        }
    }
}

pub trait Layer: Send + Sync {
    fn id(&self) -> u8;

    fn name(&self) -> &str;

    /// `Ok(None)` means the layer has no AST stage or found nothing to do.
    fn ast_transform(
        &self,
        _code: &str,
        _ctx: &LayerContext<'_>,
    ) -> Result<Option<LayerEdit>, FixError> {
        Ok(None)
    }

    fn regex_transform(
        &self,
        _code: &str,
        _ctx: &LayerContext<'_>,
    ) -> Result<Option<LayerEdit>, FixError> {
        Ok(None)
    }
}

/// Byte-range replacement in a source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

impl TextEdit {
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self {
            start: at,
            end: at,
            replacement: text.into(),
        }
    }

    pub fn delete(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            replacement: String::new(),
        }
    }
}

/// Apply non-overlapping edits. Overlapping or out-of-range edits are an error.
pub fn apply_edits(code: &str, mut edits: Vec<TextEdit>) -> Result<String, FixError> {
    edits.sort_by_key(|edit| (edit.start, edit.end));

    let mut previous_end = 0;
    for edit in &edits {
        if edit.start < previous_end
            || edit.end < edit.start
            || edit.end > code.len()
            || !code.is_char_boundary(edit.start)
            || !code.is_char_boundary(edit.end)
        {
            return Err(FixError::Internal(format!(
                "invalid edit range {}..{}",
                edit.start, edit.end
            )));
        }
        previous_end = edit.end;
    }

    let mut result = code.to_string();
    // Apply edits in reverse order to maintain correct offsets
    for edit in edits.into_iter().rev() {
        result.replace_range(edit.start..edit.end, &edit.replacement);
    }
    Ok(result)
}

/// Depth-first visit of every node below (and including) `node`.
pub fn walk<'r>(node: SgNode<'r>, visit: &mut impl FnMut(&SgNode<'r>)) {
    visit(&node);
    for child in node.children() {
        walk(child, visit);
    }
}

/// Extend `start..end` to swallow the whole line when nothing else is on it.
pub fn line_span(code: &str, start: usize, end: usize) -> (usize, usize) {
    let line_start = code[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = code[end..].find('\n').map(|i| end + i + 1).unwrap_or(code.len());

    let before_blank = code[line_start..start].trim().is_empty();
    let after_blank = code[end..line_end].trim().is_empty();
    if before_blank && after_blank {
        (line_start, line_end)
    } else {
        (start, end)
    }
}

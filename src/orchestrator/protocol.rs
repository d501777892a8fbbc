//! The per-layer apply/validate/revert state machine.
//!
//! AST attempt, validation, regex fallback on the layer's original input,
//! second validation, then accept or revert. Text that fails validation is
//! never returned.

use crate::layers::{Layer, LayerContext, LayerEdit};
use crate::types::{Change, ChangeKind, LayerStatus, TransformMethod, TransformationAttempt};
use crate::validation::SyntaxValidator;
use tracing::{debug, warn};

/// Outcome of running one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerRun {
    pub layer_id: u8,
    /// Accepted output, or the unchanged input.
    pub text: String,
    pub status: LayerStatus,
    pub method: Option<TransformMethod>,
    pub attempts: Vec<TransformationAttempt>,
    /// Applied changes of the accepted stage.
    pub changes: Vec<Change>,
    /// Informational changes (suggestions, reverts).
    pub notes: Vec<Change>,
    pub warnings: Vec<String>,
}

impl LayerRun {
    pub fn accepted(&self) -> bool {
        self.status == LayerStatus::Accepted
    }
}

enum Stage {
    Accepted(LayerEdit),
    Rejected(Vec<String>),
    Nothing,
}

pub fn run_layer(
    source: &str,
    layer: &dyn Layer,
    ctx: &LayerContext<'_>,
    validator: &SyntaxValidator,
) -> LayerRun {
    let layer_id = layer.id();
    let mut run = LayerRun {
        layer_id,
        text: source.to_string(),
        status: LayerStatus::Unchanged,
        method: None,
        attempts: Vec::new(),
        changes: Vec::new(),
        notes: Vec::new(),
        warnings: Vec::new(),
    };
    let mut rejected = Vec::new();

    // Stages 1 and 2
    let ast_output = match layer.ast_transform(source, ctx) {
        Ok(output) => output,
        Err(e) => {
            debug!("Layer {} AST stage failed: {}", layer_id, e);
            None
        }
    };
    match try_stage(source, ast_output, TransformMethod::Ast, ctx, validator, &mut run) {
        Stage::Accepted(edit) => {
            accept(&mut run, edit, TransformMethod::Ast);
            return run;
        }
        Stage::Rejected(errors) => rejected.extend(errors),
        Stage::Nothing => {}
    }

    // Stages 3 and 4, always against the layer's original input
    let regex_output = match layer.regex_transform(source, ctx) {
        Ok(output) => output,
        Err(e) => {
            warn!("Layer {} regex stage failed: {}", layer_id, e);
            run.warnings.push(format!("layer {layer_id}: {e}"));
            None
        }
    };
    match try_stage(source, regex_output, TransformMethod::Regex, ctx, validator, &mut run) {
        Stage::Accepted(edit) => {
            accept(&mut run, edit, TransformMethod::Regex);
            return run;
        }
        Stage::Rejected(errors) => rejected.extend(errors),
        Stage::Nothing => {}
    }

    // Stage 5: revert
    if !rejected.is_empty() {
        run.status = LayerStatus::Reverted;
        let reason = rejected.join("; ");
        warn!("Layer {} reverted in {}: {}", layer_id, ctx.file_path, reason);
        run.warnings.push(format!(
            "layer {layer_id} reverted in {}: {reason}",
            ctx.file_path
        ));
        run.notes.push(
            Change::new(
                ChangeKind::Revert,
                format!("Reverted layer {layer_id}: output failed validation"),
            )
            .with_layer(layer_id),
        );
    }
    run
}

fn try_stage(
    source: &str,
    output: Option<LayerEdit>,
    method: TransformMethod,
    ctx: &LayerContext<'_>,
    validator: &SyntaxValidator,
    run: &mut LayerRun,
) -> Stage {
    let Some(mut edit) = output else {
        return Stage::Nothing;
    };

    // Notes survive even when the code is untouched.
    run.notes.append(&mut edit.notes);

    if edit.code == source {
        return Stage::Nothing;
    }

    let outcome = validator.validate(&edit.code, ctx.language);
    run.attempts.push(TransformationAttempt {
        layer_id: run.layer_id,
        method,
        before: source.to_string(),
        after: edit.code.clone(),
        valid: outcome.valid,
    });

    if outcome.valid {
        Stage::Accepted(edit)
    } else {
        debug!(
            "Layer {} {:?} output invalid: {:?}",
            run.layer_id, method, outcome.errors
        );
        Stage::Rejected(outcome.errors)
    }
}

fn accept(run: &mut LayerRun, edit: LayerEdit, method: TransformMethod) {
    run.status = LayerStatus::Accepted;
    run.method = Some(method);
    run.text = edit.code;
    run.changes = edit.changes;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FixError;
    use ast_grep_language::SupportLang as Language;

    /// Test layer whose stages return fixed outputs.
    struct Scripted {
        ast: Option<Result<String, String>>,
        regex: Option<String>,
    }

    impl Layer for Scripted {
        fn id(&self) -> u8 {
            9
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn ast_transform(&self, _code: &str, _ctx: &LayerContext<'_>) -> Result<Option<LayerEdit>, FixError> {
            match &self.ast {
                None => Ok(None),
                Some(Ok(code)) => Ok(Some(LayerEdit::new(
                    code.clone(),
                    vec![Change::new(ChangeKind::Ast, "ast")],
                ))),
                Some(Err(message)) => Err(FixError::Internal(message.clone())),
            }
        }

        fn regex_transform(&self, _code: &str, _ctx: &LayerContext<'_>) -> Result<Option<LayerEdit>, FixError> {
            Ok(self.regex.clone().map(|code| {
                LayerEdit::new(code, vec![Change::new(ChangeKind::Regex, "regex")])
            }))
        }
    }

    fn ctx() -> LayerContext<'static> {
        LayerContext {
            file_path: "t.tsx",
            language: Language::Tsx,
            dry_run: false,
            previous_results: &[],
            findings: &[],
        }
    }

    const SOURCE: &str = "const a = 1;";

    #[test]
    fn test_valid_ast_skips_regex() {
        let layer = Scripted {
            ast: Some(Ok("const a = 2;".to_string())),
            regex: Some("const a = 3;".to_string()),
        };
        let run = run_layer(SOURCE, &layer, &ctx(), &SyntaxValidator::new());
        assert_eq!(run.text, "const a = 2;");
        assert_eq!(run.method, Some(TransformMethod::Ast));
        assert_eq!(run.attempts.len(), 1);
    }

    #[test]
    fn test_invalid_ast_falls_back_to_regex() {
        let layer = Scripted {
            ast: Some(Ok("const a = ;".to_string())),
            regex: Some("const a = 3;".to_string()),
        };
        let run = run_layer(SOURCE, &layer, &ctx(), &SyntaxValidator::new());
        assert_eq!(run.text, "const a = 3;");
        assert_eq!(run.method, Some(TransformMethod::Regex));
        assert_eq!(run.attempts.len(), 2);
        assert!(run.notes.is_empty());
    }

    #[test]
    fn test_ast_error_falls_back_to_regex() {
        let layer = Scripted {
            ast: Some(Err("boom".to_string())),
            regex: Some("const a = 3;".to_string()),
        };
        let run = run_layer(SOURCE, &layer, &ctx(), &SyntaxValidator::new());
        assert!(run.accepted());
        assert_eq!(run.method, Some(TransformMethod::Regex));
    }

    #[test]
    fn test_both_invalid_reverts() {
        let layer = Scripted {
            ast: Some(Ok("const a = ;".to_string())),
            regex: Some("const a = (;".to_string()),
        };
        let run = run_layer(SOURCE, &layer, &ctx(), &SyntaxValidator::new());
        assert_eq!(run.text, SOURCE);
        assert_eq!(run.status, LayerStatus::Reverted);
        assert_eq!(run.notes[0].kind, ChangeKind::Revert);
        assert_eq!(run.warnings.len(), 1);
    }

    #[test]
    fn test_no_candidates_is_unchanged() {
        let layer = Scripted { ast: None, regex: Some(SOURCE.to_string()) };
        let run = run_layer(SOURCE, &layer, &ctx(), &SyntaxValidator::new());
        assert_eq!(run.status, LayerStatus::Unchanged);
        assert!(run.attempts.is_empty());
        assert!(run.notes.is_empty());
    }
}

//! Fail-safe layer protocol, exercised through the orchestrator

use layerfix::config::LogRotationConfig;
use layerfix::errors::FixError;
use layerfix::layers::{ComponentsLayer, Layer, LayerContext, LayerEdit, NextJsLayer, PatternsLayer};
use layerfix::orchestrator::{Orchestrator, TransformOptions};
use layerfix::transform_log::TransformLogger;
use layerfix::types::{Change, ChangeKind, LayerStatus, TransformMethod};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Layer that renames `oldName` to `newName` in its AST stage and counts
/// how often its regex stage runs.
struct RenameLayer {
    regex_calls: Arc<AtomicUsize>,
}

impl Layer for RenameLayer {
    fn id(&self) -> u8 {
        4
    }

    fn name(&self) -> &str {
        "rename"
    }

    fn ast_transform(&self, code: &str, _ctx: &LayerContext<'_>) -> Result<Option<LayerEdit>, FixError> {
        Ok(Some(LayerEdit::new(
            code.replace("oldName", "newName"),
            vec![Change::new(ChangeKind::Ast, "rename oldName")],
        )))
    }

    fn regex_transform(&self, code: &str, _ctx: &LayerContext<'_>) -> Result<Option<LayerEdit>, FixError> {
        self.regex_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(LayerEdit::new(
            code.replace("oldName", "regexName"),
            vec![Change::new(ChangeKind::Regex, "rename oldName")],
        )))
    }
}

/// Layer whose AST stage finds nothing and whose regex stage breaks the file.
struct BreakingLayer {
    regex_calls: Arc<AtomicUsize>,
}

impl Layer for BreakingLayer {
    fn id(&self) -> u8 {
        1
    }

    fn name(&self) -> &str {
        "breaking"
    }

    fn regex_transform(&self, code: &str, _ctx: &LayerContext<'_>) -> Result<Option<LayerEdit>, FixError> {
        self.regex_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(LayerEdit::new(
            format!("{code}\nfunction broken( {{\n"),
            vec![Change::new(ChangeKind::Regex, "break everything")],
        )))
    }
}

#[test]
fn test_valid_ast_output_skips_regex_fallback() {
    let regex_calls = Arc::new(AtomicUsize::new(0));
    let orchestrator = Orchestrator::new(vec![Box::new(RenameLayer {
        regex_calls: regex_calls.clone(),
    })]);

    let result = orchestrator.transform("const oldName = 1;\n", &TransformOptions::default());

    assert!(result.success);
    assert_eq!(result.code, "const newName = 1;\n");
    assert_eq!(result.layer_results.len(), 1);
    assert_eq!(result.layer_results[0].status, LayerStatus::Accepted);
    assert_eq!(result.layer_results[0].method, Some(TransformMethod::Ast));
    assert_eq!(regex_calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.change_count, 1);
}

#[test]
fn test_failed_fallback_reverts_layer() {
    let regex_calls = Arc::new(AtomicUsize::new(0));
    let orchestrator = Orchestrator::new(vec![Box::new(BreakingLayer {
        regex_calls: regex_calls.clone(),
    })]);
    let code = "const value = 1;\n";

    let result = orchestrator.transform(code, &TransformOptions::default());

    assert!(result.success);
    assert_eq!(result.code, code);
    assert_eq!(regex_calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.layer_results[0].status, LayerStatus::Reverted);
    assert_eq!(result.change_count, 0);
    assert!(result.changes.iter().any(|c| c.kind == ChangeKind::Revert));
    assert!(result.warnings.iter().any(|w| w.contains("layer 1 reverted")));
}

#[test]
fn test_reverted_layer_does_not_block_later_layers() {
    let orchestrator = Orchestrator::new(vec![
        Box::new(PatternsLayer::new()),
        Box::new(BreakingLayer {
            regex_calls: Arc::new(AtomicUsize::new(0)),
        }),
    ]);
    let code = "function f() {\n  console.log('x');\n  return 1;\n}\n";

    let result = orchestrator.transform(code, &TransformOptions::for_file("f.js"));

    assert_eq!(orchestrator.layer_ids(), vec![1, 2]);
    assert_eq!(result.code, "function f() {\n  return 1;\n}\n");
    assert_eq!(result.layer_results[0].status, LayerStatus::Reverted);
    assert_eq!(result.layer_results[1].status, LayerStatus::Accepted);
}

#[test]
fn test_layer_selection() {
    let orchestrator = Orchestrator::new(vec![
        Box::new(PatternsLayer::new()),
        Box::new(ComponentsLayer::new()),
        Box::new(NextJsLayer::new()),
    ]);
    let code = "import { useState } from 'react';\n\nexport function A() {\n  const [v] = useState(0);\n  console.log(v);\n  return <img src=\"a.png\" />;\n}\n";

    let options = TransformOptions::for_file("A.jsx").with_layers(vec![3]);
    let result = orchestrator.transform(code, &options);

    assert_eq!(result.layer_results.len(), 1);
    assert_eq!(result.layer_results[0].layer_id, 3);
    assert!(result.code.contains("alt=\"\""));
    assert!(result.code.contains("console.log(v);"));
    assert!(!result.code.starts_with("'use client'"));
}

#[test]
fn test_layers_run_in_order_on_previous_output() {
    let orchestrator = Orchestrator::new(vec![
        Box::new(NextJsLayer::new()),
        Box::new(PatternsLayer::new()),
        Box::new(ComponentsLayer::new()),
    ]);
    let code = "import { useState } from 'react';\n\nexport function A() {\n  const [v] = useState(0);\n  console.log(v);\n  return <img src=\"a.png\" />;\n}\n";

    let result = orchestrator.transform(code, &TransformOptions::for_file("A.jsx"));

    let ids: Vec<u8> = result.layer_results.iter().map(|r| r.layer_id).collect();
    assert_eq!(ids, vec![2, 3, 5]);
    assert!(result.code.starts_with("'use client';\n\nimport"));
    assert!(!result.code.contains("console.log"));
    assert!(result.code.contains("<img alt=\"\" src=\"a.png\" />"));
    assert_eq!(result.original_code, code);
    assert!(result.is_modified());
}

#[test]
fn test_dry_run_does_not_touch_the_log() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("transform-log.json");
    let logger = TransformLogger::new(&log_path, LogRotationConfig::default()).into_shared();
    let orchestrator =
        Orchestrator::new(vec![Box::new(PatternsLayer::new())]).with_logger(logger.clone());
    let code = "export const f = () => {\n  console.log('x');\n};\n";

    let dry = orchestrator.transform(code, &TransformOptions::for_file("f.js").dry_run(true));
    assert!(dry.is_modified());
    assert!(!log_path.exists());

    orchestrator.transform(code, &TransformOptions::for_file("f.js"));
    let entries = logger.lock().unwrap().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].layer_id, 2);
    assert_eq!(entries[0].file_path, "f.js");
    assert_eq!(entries[0].before, code);
}

#[test]
fn test_unchanged_layers_are_not_logged() {
    let temp_dir = TempDir::new().unwrap();
    let logger = TransformLogger::new(
        temp_dir.path().join("transform-log.json"),
        LogRotationConfig::default(),
    )
    .into_shared();
    let orchestrator =
        Orchestrator::new(vec![Box::new(PatternsLayer::new())]).with_logger(logger.clone());

    let result = orchestrator.transform("export const x = 1;\n", &TransformOptions::default());

    assert!(!result.is_modified());
    assert_eq!(result.layer_results[0].status, LayerStatus::Unchanged);
    assert!(logger.lock().unwrap().entries().is_empty());
}

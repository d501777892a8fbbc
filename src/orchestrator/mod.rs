//! # Transformation Orchestrator
//!
//! Runs the enabled layers over one source text in ascending id order. Every
//! layer goes through `run_layer`; a reverted layer leaves its input intact
//! for the next one. Accepted transformations are appended to the
//! transformation log unless the run is a dry run.

pub mod protocol;

pub use protocol::{LayerRun, run_layer};

use crate::layers::{ADAPTIVE_LAYER_ID, Layer, LayerContext};
use crate::learning::Finding;
use crate::transform_log::{SharedTransformLogger, TransformationLogEntry};
use crate::types::{LayerResult, PreviousResult, RunResult};
use crate::validation::{SyntaxValidator, language_for_path};
use tracing::{debug, info, warn};

pub const EMPTY_INPUT: &str = "EmptyInput";
pub const PARSE_FAILURE: &str = "ParseFailure";

/// Options for a single `transform` call.
#[derive(Debug, Clone)]
pub struct TransformOptions {
    /// Run the full protocol but persist nothing. Default `false`.
    pub dry_run: bool,
    /// Used for language detection and the log. Default `"<input>"`.
    pub file_path: String,
    /// Log each layer at info level. Default `false`.
    pub verbose: bool,
    /// Results of an earlier pass, handed to the learning layer. Default `None`.
    pub previous_results: Option<Vec<PreviousResult>>,
    /// Layer ids to run. `None` runs every registered layer.
    pub layers: Option<Vec<u8>>,
    /// Security findings for the learning layer. Default empty.
    pub findings: Vec<Finding>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            file_path: "<input>".to_string(),
            verbose: false,
            previous_results: None,
            layers: None,
            findings: Vec::new(),
        }
    }
}

impl TransformOptions {
    pub fn for_file(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            ..Self::default()
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_layers(mut self, layers: Vec<u8>) -> Self {
        self.layers = Some(layers);
        self
    }

    fn layer_enabled(&self, id: u8) -> bool {
        self.layers.as_ref().is_none_or(|ids| ids.contains(&id))
    }
}

pub struct Orchestrator {
    layers: Vec<Box<dyn Layer>>,
    validator: SyntaxValidator,
    logger: Option<SharedTransformLogger>,
}

impl Orchestrator {
    pub fn new(mut layers: Vec<Box<dyn Layer>>) -> Self {
        layers.sort_by_key(|layer| layer.id());
        Self {
            layers,
            validator: SyntaxValidator::new(),
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: SharedTransformLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn layer_ids(&self) -> Vec<u8> {
        self.layers.iter().map(|layer| layer.id()).collect()
    }

    pub fn transform(&self, code: &str, options: &TransformOptions) -> RunResult {
        if code.trim().is_empty() {
            return RunResult {
                success: false,
                error: Some(format!("{EMPTY_INPUT}: nothing to transform")),
                ..RunResult::unchanged(code)
            };
        }

        let language = language_for_path(&options.file_path);
        let original = self.validator.validate(code, language);
        if !original.valid {
            warn!("Skipping {}: original does not parse", options.file_path);
            let mut result = RunResult::unchanged(code);
            result.skipped = true;
            result.warnings.push(format!(
                "{PARSE_FAILURE}: {} does not parse ({}), left untouched",
                options.file_path,
                original.errors.join("; ")
            ));
            return result;
        }

        let mut result = RunResult::unchanged(code);
        let mut current = code.to_string();
        let mut session: Vec<PreviousResult> = Vec::new();
        let mut notes = Vec::new();

        for layer in self.layers.iter().filter(|l| options.layer_enabled(l.id())) {
            let previous: Vec<PreviousResult> = if layer.id() == ADAPTIVE_LAYER_ID {
                options
                    .previous_results
                    .iter()
                    .flatten()
                    .chain(session.iter())
                    .cloned()
                    .collect()
            } else {
                Vec::new()
            };

            let ctx = LayerContext {
                file_path: &options.file_path,
                language,
                dry_run: options.dry_run,
                previous_results: &previous,
                findings: &options.findings,
            };

            let run = run_layer(&current, layer.as_ref(), &ctx, &self.validator);

            if options.verbose {
                info!(
                    "Layer {} ({}) on {}: {:?}",
                    run.layer_id,
                    layer.name(),
                    options.file_path,
                    run.status
                );
            } else {
                debug!("Layer {} on {}: {:?}", run.layer_id, options.file_path, run.status);
            }

            if run.accepted() {
                self.record(&options.file_path, &current, &run, options.dry_run, &mut result.warnings);
                session.push(PreviousResult {
                    success: true,
                    change_count: run.changes.len(),
                    layer_id: run.layer_id,
                    original_code: current.clone(),
                    code: run.text.clone(),
                });
                current = run.text;
            }

            result.layer_results.push(LayerResult {
                layer_id: run.layer_id,
                status: run.status,
                method: run.method,
                change_count: run.changes.len(),
            });
            result.changes.extend(run.changes);
            notes.extend(run.notes);
            result.warnings.extend(run.warnings);
        }

        result.changes.extend(notes);
        result.change_count = result
            .changes
            .iter()
            .filter(|change| change.kind.is_applied())
            .count();
        result.code = current;
        result
    }

    fn record(
        &self,
        file_path: &str,
        before: &str,
        run: &LayerRun,
        dry_run: bool,
        warnings: &mut Vec<String>,
    ) {
        if dry_run {
            return;
        }
        let Some(logger) = &self.logger else {
            return;
        };
        let entry = TransformationLogEntry::accepted(run.layer_id, file_path, before, &run.text);
        let mut logger = logger.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = logger.append(entry) {
            warn!("Could not append to transformation log: {}", e);
            warnings.push(format!("transformation log not updated: {e}"));
        }
    }
}

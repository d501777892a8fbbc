//! Wires the rule store, transformation log, learning manager and layers
//! together for one project.

use crate::config::FixerConfig;
use crate::errors::FixError;
use crate::integrity::{IntegrityBaseline, IntegrityReport};
use crate::layers::default_layers;
use crate::learning::{Finding, LearningManager, LearningReport, ReplayLedger};
use crate::orchestrator::{Orchestrator, TransformOptions};
use crate::regex_engine::RegexEngine;
use crate::rules::{RuleStore, SharedRuleStore};
use crate::runner::{RunSummary, discover_files, run_files};
use crate::storage::FileStorage;
use crate::transform_log::{SharedTransformLogger, TransformLogger};
use crate::types::RunResult;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct FixService {
    config: FixerConfig,
    store: SharedRuleStore,
    logger: SharedTransformLogger,
    manager: Arc<LearningManager>,
    orchestrator: Arc<Orchestrator>,
}

impl FixService {
    pub fn new() -> Self {
        Self::with_config(FixerConfig::default())
    }

    pub fn with_config(config: FixerConfig) -> Self {
        let engine = RegexEngine::with_capacity(config.regex_cache_size);
        let store =
            RuleStore::with_engine(FileStorage::new(config.rules_path()), engine).into_shared();
        let logger =
            TransformLogger::new(config.transform_log_path(), config.log_rotation.clone())
                .into_shared();
        let ledger = ReplayLedger::open(config.replay_ledger_path());
        let manager = Arc::new(LearningManager::new(
            store.clone(),
            Some(logger.clone()),
            ledger,
        ));
        let orchestrator = Arc::new(
            Orchestrator::new(default_layers(manager.clone())).with_logger(logger.clone()),
        );

        Self {
            config,
            store,
            logger,
            manager,
            orchestrator,
        }
    }

    pub fn config(&self) -> &FixerConfig {
        &self.config
    }

    pub fn store(&self) -> &SharedRuleStore {
        &self.store
    }

    pub fn logger(&self) -> &SharedTransformLogger {
        &self.logger
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Options carrying the configured layer selection.
    pub fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            layers: self.config.layers.clone(),
            ..TransformOptions::default()
        }
    }

    pub fn transform(&self, code: &str, options: &TransformOptions) -> RunResult {
        self.orchestrator.transform(code, options)
    }

    pub fn discover(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>, FixError> {
        discover_files(&self.config, paths)
    }

    /// Transform every project file under `paths`.
    pub async fn fix(
        &self,
        paths: &[PathBuf],
        options: TransformOptions,
    ) -> Result<RunSummary, FixError> {
        let files = self.discover(paths)?;
        tracing::info!("Processing {} files", files.len());
        Ok(run_files(
            self.orchestrator.clone(),
            files,
            options,
            self.config.max_concurrency,
        )
        .await)
    }

    /// Learn from the transformation log and `findings` without touching any file.
    pub fn learn(&self, findings: &[Finding]) -> LearningReport {
        self.manager.learn(&[], findings)
    }

    fn project_root(&self) -> &Path {
        self.config
            .root_directories
            .first()
            .map(PathBuf::as_path)
            .unwrap_or_else(|| Path::new("."))
    }

    pub fn create_baseline(&self, paths: &[PathBuf]) -> Result<IntegrityBaseline, FixError> {
        let files = self.discover(paths)?;
        let baseline = IntegrityBaseline::create(self.project_root(), &files)?;
        baseline.save(&self.config.baseline_path())?;
        Ok(baseline)
    }

    pub fn check_baseline(&self, paths: &[PathBuf]) -> Result<IntegrityReport, FixError> {
        let files = self.discover(paths)?;
        crate::integrity::check(&self.config.baseline_path(), self.project_root(), &files)
    }
}

impl Default for FixService {
    fn default() -> Self {
        Self::new()
    }
}

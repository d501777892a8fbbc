//! Layer 7: learned rules. There is no AST stage; the regex stage first
//! learns from earlier results (or the transformation log) and then applies
//! every confident rule in the store.

use super::{ADAPTIVE_LAYER_ID, Layer, LayerContext, LayerEdit};
use crate::errors::FixError;
use crate::learning::LearningManager;
use crate::types::{Change, ChangeKind};
use std::sync::Arc;
use tracing::debug;

pub struct AdaptiveLayer {
    manager: Arc<LearningManager>,
}

impl AdaptiveLayer {
    pub fn new(manager: Arc<LearningManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<LearningManager> {
        &self.manager
    }
}

impl Layer for AdaptiveLayer {
    fn id(&self) -> u8 {
        ADAPTIVE_LAYER_ID
    }

    fn name(&self) -> &str {
        "adaptive"
    }

    fn regex_transform(
        &self,
        code: &str,
        ctx: &LayerContext<'_>,
    ) -> Result<Option<LayerEdit>, FixError> {
        let report = self.manager.learn(ctx.previous_results, ctx.findings);
        debug!(
            "Learning for {}: {} observations, {} new, {} reinforced",
            ctx.file_path, report.observations, report.inserted, report.merged
        );

        let (applied, suggestions) = {
            let mut store = self.manager.store().lock().unwrap_or_else(|e| e.into_inner());
            let applied = store.apply_rules(code);
            let suggestions = store.suggestions(&applied.transformed_code);
            (applied, suggestions)
        };

        let notes: Vec<Change> = suggestions
            .into_iter()
            .map(|description| {
                Change::new(ChangeKind::AdaptiveSuggestion, description).with_layer(ADAPTIVE_LAYER_ID)
            })
            .collect();

        if applied.applied_rules.is_empty() && notes.is_empty() {
            return Ok(None);
        }

        let changes = applied
            .applied_rules
            .into_iter()
            .map(|description| Change::new(ChangeKind::LearnedRule, description).with_layer(ADAPTIVE_LAYER_ID))
            .collect();

        Ok(Some(LayerEdit {
            code: applied.transformed_code,
            changes,
            notes,
        }))
    }
}

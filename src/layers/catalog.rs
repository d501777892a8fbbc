//! Built-in layers.

use super::{AdaptiveLayer, ComponentsLayer, Layer, NextJsLayer, PatternsLayer};
use crate::learning::LearningManager;
use std::sync::Arc;

/// Names of the layer ids the tool knows about, including ones provided by
/// external packages.
pub fn layer_name(id: u8) -> &'static str {
    match id {
        1 => "configuration",
        2 => "patterns",
        3 => "components",
        4 => "hydration",
        5 => "nextjs",
        6 => "testing",
        7 => "adaptive",
        _ => "unknown",
    }
}

/// Every built-in layer, the learning layer last.
pub fn default_layers(manager: Arc<LearningManager>) -> Vec<Box<dyn Layer>> {
    vec![
        Box::new(PatternsLayer::new()),
        Box::new(ComponentsLayer::new()),
        Box::new(NextJsLayer::new()),
        Box::new(AdaptiveLayer::new(manager)),
    ]
}

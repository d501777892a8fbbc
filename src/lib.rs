pub mod config;
pub mod errors;
pub mod integrity;
pub mod layers;
pub mod learning;
pub mod orchestrator;
pub mod project_config;
pub mod regex_engine;
pub mod rules;
pub mod runner;
pub mod service;
pub mod storage;
pub mod transform_log;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use errors::FixError;
pub use orchestrator::{Orchestrator, TransformOptions};
pub use rules::types::*;
pub use service::FixService;
pub use types::*;

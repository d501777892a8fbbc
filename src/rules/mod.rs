pub mod apply;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use apply::{apply_one, apply_rule_set, suggest_rules};
pub use store::{RuleStore, SharedRuleStore};
pub use types::*;

//! Pattern extraction and the learning manager

mod common;

use common::previous;
use layerfix::learning::{
    Finding, LearningManager, LearningSource, ReplayLedger, Severity, extract_patterns,
    extract_security_patterns, extract_security_patterns_json,
};
use layerfix::rules::RuleStore;
use serde_json::json;

#[test]
fn test_identical_inputs_yield_nothing() {
    assert!(extract_patterns("const x = 1;", "const x = 1;", 1).is_empty());
}

#[test]
fn test_low_severity_findings_filtered() {
    let findings = vec![Some(Finding::new("x", Severity::Low, "y"))];
    assert!(extract_security_patterns(&findings).is_empty());
}

#[test]
fn test_security_json_with_mixed_records() {
    let raw = json!([
        {"severity": "low", "signatureId": "x", "description": "y"},
        {"severity": "critical", "signatureId": "eval-atob", "description": "obfuscated eval",
         "match": "eval(atob(encodedPayload))"},
        "not a finding"
    ]);

    let candidates = extract_security_patterns_json(&raw);

    assert_eq!(candidates.len(), 2);
    assert!(candidates.iter().all(|c| c.security_related));
    assert!(candidates.iter().all(|c| c.replacement.contains("neutralized eval-atob")));
}

#[test]
fn test_learned_rule_generalizes_to_other_code() {
    let store = RuleStore::in_memory().into_shared();
    let manager = LearningManager::new(store.clone(), None, ReplayLedger::in_memory());

    let report = manager.learn(
        &[previous(
            2,
            "function f() {\n  console.log(\"debug\");\n  return 1;\n}\n",
            "function f() {\n  return 1;\n}\n",
        )],
        &[],
    );
    assert_eq!(report.source, LearningSource::SameSession);
    assert_eq!(report.inserted, 1);

    let mut store = store.lock().unwrap();
    let result = store.apply_rules("const g = () => {\n    console.log(\"debug\");\n};\n");
    assert_eq!(result.transformed_code, "const g = () => {\n};\n");
    assert_eq!(result.applied_rules.len(), 1);
}

#[test]
fn test_repeated_observation_across_files_reinforces_rule() {
    let store = RuleStore::in_memory().into_shared();
    let manager = LearningManager::new(store.clone(), None, ReplayLedger::in_memory());

    manager.learn(&[previous(2, "var total = 0;\n", "let total = 0;\n")], &[]);
    let report = manager.learn(&[previous(2, "var count = 1;\n", "let count = 1;\n")], &[]);

    assert_eq!(report.merged, 1);
    let mut store = store.lock().unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(store.get(0).unwrap().frequency, 2);
}

#[test]
fn test_directive_learned_only_for_hook_users() {
    let store = RuleStore::in_memory().into_shared();
    let manager = LearningManager::new(store.clone(), None, ReplayLedger::in_memory());

    let before = "import { useState } from 'react';\n\nexport function A() {\n  const [v] = useState(0);\n  return v;\n}\n";
    let after = format!("'use client';\n\n{before}");
    manager.learn(&[previous(5, before, &after)], &[]);

    let mut store = store.lock().unwrap();
    assert_eq!(store.len(), 1);

    let unrelated = "import x from 'y';\n\nexport default x;\n";
    assert_eq!(store.apply_rules(unrelated).transformed_code, unrelated);

    let other = "import { useEffect } from 'react';\n\nexport function B() {\n  useEffect(() => {}, []);\n  return null;\n}\n";
    let applied = store.apply_rules(other).transformed_code;
    assert!(applied.starts_with("'use client';\n\nimport { useEffect }"));
    assert_eq!(store.apply_rules(&applied).transformed_code, applied);
}

#[test]
fn test_findings_learned_once() {
    let store = RuleStore::in_memory().into_shared();
    let manager = LearningManager::new(store.clone(), None, ReplayLedger::in_memory());
    let findings = vec![
        Finding::new("new-function", Severity::High, "dynamic code").with_match("new Function(body)"),
    ];

    let first = manager.learn(&[], &findings);
    let second = manager.learn(&[], &findings);

    assert_eq!(first.source, LearningSource::None);
    assert_eq!(first.inserted, 2);
    assert_eq!(second.already_seen, 1);
    assert!(!second.learned_anything());

    let mut store = store.lock().unwrap();
    let fixed = store.apply_rules("const f = new Function(body);\n").transformed_code;
    assert_eq!(fixed, "const f = undefined /* layerfix: neutralized new-function */;\n");
}

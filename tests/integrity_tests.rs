//! Integrity baselines fail closed while the rule store fails open

mod common;

use common::{project_config, setup_project};
use layerfix::errors::FixError;
use layerfix::service::FixService;
use layerfix::TransformOptions;
use std::fs;

#[tokio::test]
async fn test_baseline_detects_fixed_files() {
    let temp_dir = setup_project();
    let service = FixService::with_config(project_config(&temp_dir));

    let baseline = service.create_baseline(&[]).unwrap();
    assert_eq!(baseline.files.len(), 2);
    assert!(baseline.files.contains_key("src/math.js"));
    assert!(service.check_baseline(&[]).unwrap().is_clean());

    service.fix(&[], TransformOptions::default()).await.unwrap();

    let report = service.check_baseline(&[]).unwrap();
    assert_eq!(
        report.modified,
        vec!["src/Counter.jsx".to_string(), "src/math.js".to_string()]
    );
    assert!(report.added.is_empty());
    assert!(report.removed.is_empty());
}

#[test]
fn test_added_and_removed_files() {
    let temp_dir = setup_project();
    let service = FixService::with_config(project_config(&temp_dir));
    service.create_baseline(&[]).unwrap();

    fs::remove_file(temp_dir.path().join("src/math.js")).unwrap();
    fs::write(temp_dir.path().join("src/extra.ts"), "export const y = 2;\n").unwrap();

    let report = service.check_baseline(&[]).unwrap();
    assert_eq!(report.added, vec!["src/extra.ts".to_string()]);
    assert_eq!(report.removed, vec!["src/math.js".to_string()]);
    assert!(!report.is_clean());
}

#[test]
fn test_missing_baseline_is_an_error() {
    let temp_dir = setup_project();
    let service = FixService::with_config(project_config(&temp_dir));

    assert!(matches!(
        service.check_baseline(&[]),
        Err(FixError::FileNotFound(_))
    ));
}

#[test]
fn test_corrupt_baseline_fails_while_corrupt_store_does_not() {
    let temp_dir = setup_project();
    let config = project_config(&temp_dir);
    fs::create_dir_all(&config.state_directory).unwrap();
    fs::write(config.baseline_path(), "{ truncated").unwrap();
    fs::write(config.rules_path(), "{ truncated").unwrap();
    let service = FixService::with_config(config);

    assert!(matches!(
        service.check_baseline(&[]),
        Err(FixError::CorruptBaseline { .. })
    ));

    let code = "export function f() {\n  console.log('x');\n  return 1;\n}\n";
    let result = service.transform(code, &TransformOptions::for_file("f.js"));
    assert!(result.success);
    assert_eq!(result.code, "export function f() {\n  return 1;\n}\n");
}

//! End-to-end runs over a project directory

mod common;

use common::{project_config, setup_project, write_file};
use layerfix::service::FixService;
use layerfix::TransformOptions;
use std::fs;

#[tokio::test]
async fn test_fix_rewrites_project_files() {
    let temp_dir = setup_project();
    let service = FixService::with_config(project_config(&temp_dir));

    let summary = service.fix(&[], TransformOptions::default()).await.unwrap();

    assert_eq!(summary.files_scanned, 2);
    assert_eq!(summary.files_modified, 2);
    assert_eq!(summary.files_failed, 0);
    assert!(!summary.dry_run);
    assert!(summary.outcomes.iter().all(|o| o.written));

    let math = fs::read_to_string(temp_dir.path().join("src/math.js")).unwrap();
    assert_eq!(math, "export function add(a, b) {\n  return a + b;\n}\n");

    let counter = fs::read_to_string(temp_dir.path().join("src/Counter.jsx")).unwrap();
    assert!(counter.starts_with("'use client';\n\nimport { useState } from 'react';"));
    assert!(!counter.contains("console.log"));

    let vendored = fs::read_to_string(temp_dir.path().join("node_modules/pkg/index.js")).unwrap();
    assert_eq!(vendored, "console.log('vendored');\n");

    assert!(service.config().transform_log_path().exists());
}

#[tokio::test]
async fn test_dry_run_leaves_files_alone() {
    let temp_dir = setup_project();
    let service = FixService::with_config(project_config(&temp_dir));
    let original = fs::read_to_string(temp_dir.path().join("src/math.js")).unwrap();

    let options = TransformOptions::default().dry_run(true);
    let summary = service.fix(&[], options).await.unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.files_modified, 2);
    assert!(summary.outcomes.iter().all(|o| !o.written));
    assert_eq!(
        fs::read_to_string(temp_dir.path().join("src/math.js")).unwrap(),
        original
    );
    assert!(!service.config().transform_log_path().exists());
}

#[tokio::test]
async fn test_unparseable_file_is_skipped() {
    let temp_dir = setup_project();
    let broken = write_file(&temp_dir, "src/broken.js", "function ( {\n  console.log('x');\n");
    let service = FixService::with_config(project_config(&temp_dir));

    let summary = service.fix(&[broken.clone()], TransformOptions::default()).await.unwrap();

    assert_eq!(summary.files_scanned, 1);
    assert_eq!(summary.files_skipped, 1);
    assert_eq!(summary.files_modified, 0);
    assert_eq!(
        fs::read_to_string(&broken).unwrap(),
        "function ( {\n  console.log('x');\n"
    );
}

#[tokio::test]
async fn test_layer_selection_applies_to_every_file() {
    let temp_dir = setup_project();
    let service = FixService::with_config(project_config(&temp_dir));

    let options = TransformOptions::default().with_layers(vec![5]);
    let summary = service.fix(&[], options).await.unwrap();

    assert_eq!(summary.files_modified, 1);
    let counter = fs::read_to_string(temp_dir.path().join("src/Counter.jsx")).unwrap();
    assert!(counter.starts_with("'use client';"));
    assert!(counter.contains("console.log"));
}

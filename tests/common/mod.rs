// Common test utilities
#![allow(dead_code)]

use layerfix::config::FixerConfig;
use layerfix::types::PreviousResult;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// A small React project with one client component, one debug-heavy module
/// and a dependency folder that must never be touched.
pub fn setup_project() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let src = temp_dir.path().join("src");
    fs::create_dir_all(&src).unwrap();

    fs::write(
        src.join("Counter.jsx"),
        r#"import { useState } from 'react';

export default function Counter() {
  const [count, setCount] = useState(0);
  console.log("render", count);
  return <button onClick={() => setCount(count + 1)}>{count}</button>;
}
"#,
    )
    .unwrap();

    fs::write(
        src.join("math.js"),
        r#"export function add(a, b) {
  console.debug("add called");
  return a + b;
}
"#,
    )
    .unwrap();

    let vendored = temp_dir.path().join("node_modules/pkg");
    fs::create_dir_all(&vendored).unwrap();
    fs::write(vendored.join("index.js"), "console.log('vendored');\n").unwrap();

    temp_dir
}

pub fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

pub fn project_config(dir: &TempDir) -> FixerConfig {
    FixerConfig::for_project(dir.path())
}

pub fn previous(layer_id: u8, before: &str, after: &str) -> PreviousResult {
    PreviousResult {
        success: true,
        change_count: 1,
        layer_id,
        original_code: before.to_string(),
        code: after.to_string(),
    }
}

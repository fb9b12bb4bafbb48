#![allow(dead_code)]
//! Shared helpers for integration tests.

use std::path::{Path, PathBuf};

use pool_deployer::SessionOptions;
use tempfile::TempDir;

/// The devnet fixture: two mock assets and one two-asset pool.
pub fn fixture_config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/devnet.json")
}

pub fn fixture_json() -> serde_json::Value {
    let text = std::fs::read_to_string(fixture_config()).unwrap();
    serde_json::from_str(&text).unwrap()
}

/// Write `config` into `dir` and return its path.
pub fn write_config(dir: &Path, config: &serde_json::Value) -> PathBuf {
    let path = dir.join("config.json");
    std::fs::write(&path, serde_json::to_string_pretty(config).unwrap()).unwrap();
    path
}

/// Simulated session options with the record kept in `dir`.
pub fn simulated_options(dir: &TempDir, config: PathBuf) -> SessionOptions {
    SessionOptions {
        config,
        record: dir.path().join("deployment.json"),
        network: Some("devnet".to_string()),
        rpc_url: "http://127.0.0.1:5050".to_string(),
        account: None,
        artifacts: dir.path().join("artifacts"),
        package: "lending".to_string(),
        simulate: true,
    }
}

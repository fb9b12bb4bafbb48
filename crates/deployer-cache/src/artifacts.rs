//! Compiled contract artifacts.
//!
//! The contract build writes one pair of files per contract:
//!
//! ```text
//! <dir>/<package>_<Contract>.contract_class.json
//! <dir>/<package>_<Contract>.compiled_contract_class.json   (optional)
//! ```

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use tracing::debug;

use deployer_types::CompiledCode;

pub const DEFAULT_PACKAGE: &str = "lending";
pub const DEFAULT_ARTIFACTS_DIR: &str = "target/dev";

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    package: String,
    placeholders: bool,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, package: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            package: package.into(),
            placeholders: false,
        }
    }

    /// Artifacts that only exist in name, for simulated runs without a build.
    ///
    /// Files that do exist under `dir` are still read.
    pub fn with_placeholders(mut self) -> Self {
        self.placeholders = true;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn class_path(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{}.contract_class.json", self.package, name))
    }

    pub fn compiled_class_path(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{}.compiled_contract_class.json", self.package, name))
    }

    /// Read the artifacts for contract `name`.
    pub fn load(&self, name: &str) -> Result<CompiledCode> {
        let class_path = self.class_path(name);
        if !class_path.exists() && self.placeholders {
            debug!(name, "using placeholder artifact");
            return Ok(CompiledCode {
                name: name.to_string(),
                class: format!("{{\"placeholder\":\"{}\"}}", name).into_bytes(),
                compiled_class: None,
            });
        }

        let class = std::fs::read(&class_path).map_err(|e| {
            anyhow!(
                "Failed to read artifact for {} at {}: {}",
                name,
                class_path.display(),
                e
            )
        })?;

        let compiled_path = self.compiled_class_path(name);
        let compiled_class = if compiled_path.exists() {
            Some(std::fs::read(&compiled_path).map_err(|e| {
                anyhow!("Failed to read {}: {}", compiled_path.display(), e)
            })?)
        } else {
            None
        };

        debug!(
            name,
            path = %class_path.display(),
            bytes = class.len(),
            "loaded artifact"
        );
        Ok(CompiledCode {
            name: name.to_string(),
            class,
            compiled_class,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_reads_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), "lending");
        std::fs::write(store.class_path("Pool"), b"{\"abi\":[]}").unwrap();
        std::fs::write(store.compiled_class_path("Pool"), b"{\"bytecode\":[]}").unwrap();

        let code = store.load("Pool").unwrap();
        assert_eq!(code.name, "Pool");
        assert_eq!(code.class, b"{\"abi\":[]}".to_vec());
        assert!(code.compiled_class.is_some());
    }

    #[test]
    fn test_missing_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), "lending");
        let err = store.load("Oracle").unwrap_err();
        assert!(err.to_string().contains("lending_Oracle.contract_class.json"));
    }

    #[test]
    fn test_placeholders_are_distinct_per_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), "lending").with_placeholders();
        let pool = store.load("Pool").unwrap();
        let oracle = store.load("Oracle").unwrap();
        assert_ne!(pool.digest(), oracle.digest());
    }
}

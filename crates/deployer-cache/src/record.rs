//! Deployment record.
//!
//! After every successful run the resolved addresses are written to a JSON
//! file so the next run can load contracts instead of deploying them again.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use deployer_types::{Address, Felt};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PragmaAddresses {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oracle: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_stats: Option<Address>,
}

/// Logical role -> resolved address for one network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub network: String,
    #[serde(
        default,
        alias = "poolFactory",
        alias = "singleton",
        skip_serializing_if = "Option::is_none"
    )]
    pub pool_factory: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oracle: Option<Address>,
    #[serde(default)]
    pub pragma: PragmaAddresses,
    /// Asset tokens, in environment order.
    #[serde(default)]
    pub assets: Vec<Address>,
    /// Pool name -> pool address.
    #[serde(default)]
    pub pools: BTreeMap<String, Address>,
    /// Contract name -> last declared class hash.
    #[serde(default)]
    pub class_hashes: BTreeMap<String, Felt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DeploymentRecord {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            ..Default::default()
        }
    }

    pub fn pool(&self, name: &str) -> Option<Address> {
        self.pools.get(name).copied()
    }

    pub fn merge_class_hashes(&mut self, hashes: BTreeMap<String, Felt>) {
        self.class_hashes.extend(hashes);
    }
}

/// Stores a [`DeploymentRecord`] as a single pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct FsRecordStore {
    path: PathBuf,
}

impl FsRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record, or `None` if no run has written one yet.
    pub fn load(&self) -> Result<Option<DeploymentRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| anyhow!("Failed to read {}: {}", self.path.display(), e))?;
        let record = serde_json::from_str(&text).map_err(|e| {
            anyhow!(
                "Failed to parse deployment record {}: {}",
                self.path.display(),
                e
            )
        })?;
        Ok(Some(record))
    }

    /// Load the record for `network`, starting fresh if none exists.
    ///
    /// A record written for a different network is refused.
    pub fn load_or_new(&self, network: &str) -> Result<DeploymentRecord> {
        match self.load()? {
            Some(record) if record.network != network => Err(anyhow!(
                "Deployment record {} is for network '{}', not '{}'",
                self.path.display(),
                record.network,
                network
            )),
            Some(record) => Ok(record),
            None => Ok(DeploymentRecord::new(network)),
        }
    }

    /// Stamp `updated_at` and write atomically.
    pub fn save(&self, record: &mut DeploymentRecord) -> Result<()> {
        record.updated_at = Some(Utc::now());
        write_replacing(&self.path, record)?;
        info!(
            path = %self.path.display(),
            pools = record.pools.len(),
            "saved deployment record"
        );
        Ok(())
    }
}

/// Write `record` to a staging file beside `path`, then rename it into place.
fn write_replacing(path: &Path, record: &DeploymentRecord) -> Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating record directory {}", dir.display()))?;
    }
    let mut text = serde_json::to_string_pretty(record).context("serializing deployment record")?;
    text.push('\n');

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "deployment.json".to_string());
    let staging = path.with_file_name(format!(".{}.partial", file_name));
    std::fs::write(&staging, text)
        .with_context(|| format!("writing {}", staging.display()))?;
    std::fs::rename(&staging, path)
        .with_context(|| format!("replacing {} with {}", path.display(), staging.display()))
}

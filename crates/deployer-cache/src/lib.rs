//! Process-lifetime and on-disk state for deployment runs.
//!
//! This crate provides:
//! - [`declare`]: the [`DeclarationCache`], one upload per contract name per run
//! - [`metrics`]: hit/upload/failure counters for the cache
//! - [`artifacts`]: loading compiled contract artifacts from a build directory
//! - [`record`]: the persisted [`DeploymentRecord`] (role -> address)

pub mod artifacts;
pub mod declare;
pub mod metrics;
pub mod record;

pub use artifacts::ArtifactStore;
pub use declare::{DeclarationCache, DeclaredCode};
pub use metrics::{CacheMetrics, MetricsSnapshot};
pub use record::{DeploymentRecord, FsRecordStore, PragmaAddresses};

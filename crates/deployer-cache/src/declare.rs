//! Declaration cache.
//!
//! Declaring uploads compiled code and is by far the slowest ledger round
//! trip, so every run keeps one [`DeclarationCache`] and routes all declares
//! through [`DeclarationCache::get_or_declare`]:
//!
//! - the first request for a name uploads and stores the class hash
//! - later requests for the same name return the stored hash
//! - concurrent requests for a name that is still uploading wait for that upload
//! - a failed upload stores nothing; the next request uploads again
//!
//! Entries are never evicted or overwritten.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use deployer_types::Felt;

use crate::metrics::CacheMetrics;

/// Code uploaded to the ledger but not yet instantiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredCode {
    pub name: String,
    pub class_hash: Felt,
}

#[derive(Default)]
pub struct DeclarationCache {
    entries: RwLock<HashMap<String, DeclaredCode>>,
    inflight: Mutex<HashMap<String, Arc<Notify>>>,
    metrics: CacheMetrics,
}

/// Upload slot held by the leader of a declare. Dropping it, whether the
/// upload finished or its future was cancelled, frees the name and wakes the
/// waiters so one of them can take over.
struct InflightSlot<'a> {
    cache: &'a DeclarationCache,
    name: &'a str,
    notify: Arc<Notify>,
}

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        self.cache.inflight.lock().remove(self.name);
        self.notify.notify_waiters();
    }
}

impl DeclarationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached declaration for `name`, running `upload` only if no
    /// earlier request succeeded.
    pub async fn get_or_declare<F, Fut>(&self, name: &str, upload: F) -> Result<DeclaredCode>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Felt>>,
    {
        let _slot = loop {
            if let Some(hit) = self.get(name) {
                self.metrics.record_hit();
                debug!(name, class_hash = %hit.class_hash, "declare cache hit");
                return Ok(hit);
            }

            let notified = {
                let mut inflight = self.inflight.lock();
                // The leader inserts the entry before clearing its slot, so a
                // second look under the lock cannot miss a finished upload.
                if let Some(hit) = self.get(name) {
                    self.metrics.record_hit();
                    return Ok(hit);
                }
                match inflight.get(name) {
                    Some(existing) => Arc::clone(existing),
                    None => {
                        let notify = Arc::new(Notify::new());
                        inflight.insert(name.to_string(), Arc::clone(&notify));
                        break InflightSlot {
                            cache: self,
                            name,
                            notify,
                        };
                    }
                }
            };

            let wait = notified.notified();
            tokio::pin!(wait);
            wait.as_mut().enable();
            // The leader may have finished between releasing the lock and
            // registering interest.
            let still_running = self
                .inflight
                .lock()
                .get(name)
                .is_some_and(|current| Arc::ptr_eq(current, &notified));
            if !still_running {
                continue;
            }
            self.metrics.record_wait();
            debug!(name, "waiting for in-flight declare");
            wait.await;
        };

        match upload().await {
            Ok(class_hash) => {
                let declared = DeclaredCode {
                    name: name.to_string(),
                    class_hash,
                };
                self.entries
                    .write()
                    .insert(name.to_string(), declared.clone());
                self.metrics.record_upload();
                info!(name, class_hash = %class_hash, "declared");
                Ok(declared)
            }
            Err(e) => {
                self.metrics.record_failure();
                warn!(name, error = %e, "declare failed; will retry on next request");
                Err(e)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<DeclaredCode> {
        self.entries.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// All declarations made so far, keyed by name.
    pub fn class_hashes(&self) -> BTreeMap<String, Felt> {
        self.entries
            .read()
            .values()
            .map(|d| (d.name.clone(), d.class_hash))
            .collect()
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_name_uploads_once() {
        let cache = DeclarationCache::new();
        let uploads = AtomicUsize::new(0);
        let counter = &uploads;

        for _ in 0..3 {
            let declared = cache
                .get_or_declare("Pool", || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Felt::from(7u64))
                })
                .await
                .unwrap();
            assert_eq!(declared.class_hash, Felt::from(7u64));
        }

        assert_eq!(uploads.load(Ordering::SeqCst), 1);
        let snapshot = cache.metrics().snapshot();
        assert_eq!(snapshot.uploads, 1);
        assert_eq!(snapshot.hits, 2);
    }

    #[tokio::test]
    async fn test_distinct_names_upload_separately() {
        let cache = DeclarationCache::new();
        cache
            .get_or_declare("X", || async { Ok(Felt::from(1u64)) })
            .await
            .unwrap();
        cache
            .get_or_declare("Y", || async { Ok(Felt::from(2u64)) })
            .await
            .unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.metrics().snapshot().uploads, 2);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let cache = DeclarationCache::new();
        let err = cache
            .get_or_declare("Pool", || async { Err(anyhow!("network down")) })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("network down"));
        assert!(cache.get("Pool").is_none());

        let declared = cache
            .get_or_declare("Pool", || async { Ok(Felt::from(3u64)) })
            .await
            .unwrap();
        assert_eq!(declared.class_hash, Felt::from(3u64));
        assert_eq!(cache.metrics().snapshot().failures, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_share_one_upload() {
        let cache = Arc::new(DeclarationCache::new());
        let uploads = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let uploads = Arc::clone(&uploads);
                tokio::spawn(async move {
                    cache
                        .get_or_declare("Oracle", || async move {
                            uploads.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok(Felt::from(11u64))
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            let declared = task.await.unwrap().unwrap();
            assert_eq!(declared.class_hash, Felt::from(11u64));
        }
        assert_eq!(uploads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_upload_frees_the_name() {
        let cache = DeclarationCache::new();
        let abandoned = tokio::time::timeout(
            Duration::from_millis(20),
            cache.get_or_declare("Pool", || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(Felt::from(1u64))
            }),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(cache.get("Pool").is_none());

        let declared = tokio::time::timeout(
            Duration::from_secs(2),
            cache.get_or_declare("Pool", || async { Ok(Felt::from(2u64)) }),
        )
        .await
        .expect("declare after a cancelled upload should not wait")
        .unwrap();
        assert_eq!(declared.class_hash, Felt::from(2u64));
        assert_eq!(cache.metrics().snapshot().uploads, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_waiter_takes_over_when_leader_is_cancelled() {
        let cache = Arc::new(DeclarationCache::new());

        let leader = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .get_or_declare("Oracle", || async {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        Ok(Felt::from(1u64))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let waiter = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .get_or_declare("Oracle", || async { Ok(Felt::from(9u64)) })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        leader.abort();

        let declared = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("waiter should be woken when the leader is cancelled")
            .unwrap()
            .unwrap();
        assert_eq!(declared.class_hash, Felt::from(9u64));
    }

    #[tokio::test]
    async fn test_class_hashes_snapshot() {
        let cache = DeclarationCache::new();
        cache
            .get_or_declare("VToken", || async { Ok(Felt::from(5u64)) })
            .await
            .unwrap();
        let hashes = cache.class_hashes();
        assert_eq!(hashes.get("VToken"), Some(&Felt::from(5u64)));
    }
}

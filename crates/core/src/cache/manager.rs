//! The token-keyed asset cache with size-bounded LRU eviction.
//!
//! `ModelCache` is the only type callers interact with. Writes go straight
//! to the store; every successful save fires a request at a single-consumer
//! eviction task that walks the recency-ordered snapshot and deletes
//! oldest-first until the total size fits the byte budget again. The budget
//! is a soft cap: a save can overshoot it until the next sweep settles, and
//! the sweep is best-effort (a failed delete is logged, never retried, and
//! never fails the save that triggered it).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::bundles::{Bundle, BundleStat};
use super::connection::CacheDb;
use crate::Error;

/// Default byte budget: 100 MiB.
pub const DEFAULT_CAPACITY_BYTES: u64 = 100 * 1024 * 1024;

/// Counters and totals for the cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: u64,
    pub total_size_bytes: u64,
    pub hits: u64,
    pub misses: u64,
}

/// Handle to the bundle cache.
///
/// Cheap to clone; clones share the store connection, the hit/miss counters,
/// and the eviction task. Construct one per client session and pass it
/// explicitly. Must be created inside a tokio runtime (the eviction task is
/// spawned at construction).
#[derive(Clone)]
pub struct ModelCache {
    db: CacheDb,
    capacity_bytes: u64,
    sweep_tx: mpsc::UnboundedSender<()>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl ModelCache {
    /// Create a cache over an opened store with the given byte budget.
    pub fn new(db: CacheDb, capacity_bytes: u64) -> Self {
        let (sweep_tx, mut sweep_rx) = mpsc::unbounded_channel::<()>();

        let sweep_db = db.clone();
        tokio::spawn(async move {
            while sweep_rx.recv().await.is_some() {
                if let Err(e) = run_sweep(&sweep_db, capacity_bytes).await {
                    tracing::warn!(error = %e, "eviction sweep failed");
                }
            }
        });

        Self {
            db,
            capacity_bytes,
            sweep_tx,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Store a bundle under its share token, replacing any prior entry.
    ///
    /// Resolves once the write has committed; the eviction sweep it triggers
    /// runs detached and is not awaited. A failed write leaves the prior
    /// entry for the token unchanged.
    pub async fn save(
        &self, token: &str, geometry: Vec<u8>, material: Vec<u8>, textures: HashMap<String, Vec<u8>>,
    ) -> Result<(), Error> {
        if token.is_empty() {
            return Err(Error::InvalidInput("share token must not be empty".to_string()));
        }

        let bundle = Bundle::new(token, geometry, material, textures, now_ms());
        tracing::debug!(token, size_bytes = bundle.size_bytes, "caching bundle");
        self.db.put_bundle(&bundle).await?;

        // Fire-and-forget; a closed channel only happens at shutdown.
        let _ = self.sweep_tx.send(());

        Ok(())
    }

    /// Look up a bundle by share token.
    ///
    /// A hit bumps the entry's recency timestamp via a detached write; the
    /// returned payload is the pre-bump record. A miss is `Ok(None)`.
    pub async fn get(&self, token: &str) -> Result<Option<Bundle>, Error> {
        let bundle = self.db.get_bundle(token).await?;

        match bundle {
            Some(bundle) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                let db = self.db.clone();
                let token = token.to_string();
                tokio::spawn(async move {
                    if let Err(e) = db.touch_bundle(&token, now_ms()).await {
                        tracing::warn!(%token, error = %e, "recency touch failed");
                    }
                });
                Ok(Some(bundle))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    /// Remove every cached bundle.
    pub async fn clear(&self) -> Result<(), Error> {
        self.db.clear_bundles().await
    }

    /// Run one eviction pass inline, returning the number of evicted entries.
    ///
    /// This is the same pass the background task runs after each save;
    /// calling it directly is useful for deterministic cleanup.
    pub async fn sweep(&self) -> Result<u64, Error> {
        run_sweep(&self.db, self.capacity_bytes).await
    }

    /// Entry count, total size, and per-process hit/miss counters.
    pub async fn stats(&self) -> Result<CacheStats, Error> {
        Ok(CacheStats {
            entries: self.db.count_bundles().await?,
            total_size_bytes: self.db.total_size().await?,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        })
    }

    /// The configured byte budget.
    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Walk the recency-ordered snapshot and delete oldest-first until the
/// running excess over `capacity` is covered.
///
/// The newest snapshot entry is never a victim: a single bundle larger than
/// the whole budget stays cached as the sole survivor. Deletes are by exact
/// token, so a concurrent save that lands after the snapshot is untouched.
async fn run_sweep(db: &CacheDb, capacity: u64) -> Result<u64, Error> {
    let snapshot: Vec<BundleStat> = db.scan_by_recency().await?;
    let total: u64 = snapshot.iter().map(|s| s.size_bytes).sum();

    if total <= capacity {
        return Ok(0);
    }

    let mut excess = total - capacity;
    let mut evicted = 0u64;

    for stat in &snapshot[..snapshot.len() - 1] {
        if excess == 0 {
            break;
        }
        match db.delete_bundle(&stat.token).await {
            Ok(true) => {
                evicted += 1;
                tracing::debug!(token = %stat.token, size_bytes = stat.size_bytes, "evicted bundle");
            }
            // Already gone: raced with an explicit delete or clear.
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(token = %stat.token, error = %e, "eviction delete failed");
                continue;
            }
        }
        excess = excess.saturating_sub(stat.size_bytes);
    }

    Ok(evicted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const MIB: u64 = 1024 * 1024;

    /// Put a bundle with an explicit recency timestamp, bypassing the
    /// manager so tests control eviction order exactly.
    async fn put_sized(db: &CacheDb, token: &str, size: u64, last_access: i64) {
        let bundle = Bundle::new(token, vec![0u8; size as usize], Vec::new(), HashMap::new(), last_access);
        db.put_bundle(&bundle).await.unwrap();
    }

    async fn cache_with_capacity(capacity: u64) -> (ModelCache, CacheDb) {
        let db = CacheDb::open_in_memory().await.unwrap();
        (ModelCache::new(db.clone(), capacity), db)
    }

    #[tokio::test]
    async fn test_sweep_noop_under_capacity() {
        let (cache, db) = cache_with_capacity(100).await;
        put_sized(&db, "a", 40, 1).await;
        put_sized(&db, "b", 40, 2).await;

        assert_eq!(cache.sweep().await.unwrap(), 0);
        assert_eq!(db.count_bundles().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_sweep_evicts_exact_lru_prefix() {
        // A=60, B=50, C=10 at capacity 100: evicting A alone covers the
        // 20-byte overshoot, B and C survive.
        let (cache, db) = cache_with_capacity(100).await;
        put_sized(&db, "a", 60, 1).await;
        put_sized(&db, "b", 50, 2).await;
        put_sized(&db, "c", 10, 3).await;

        assert_eq!(cache.sweep().await.unwrap(), 1);

        assert!(db.get_bundle("a").await.unwrap().is_none());
        assert!(db.get_bundle("b").await.unwrap().is_some());
        assert!(db.get_bundle("c").await.unwrap().is_some());
        assert!(db.total_size().await.unwrap() <= 100);
    }

    #[tokio::test]
    async fn test_touch_promotes_recency() {
        // After A is touched above B, an overshoot sweep prefers B.
        let (cache, db) = cache_with_capacity(100).await;
        put_sized(&db, "a", 60, 1).await;
        put_sized(&db, "b", 50, 2).await;
        db.touch_bundle("a", 3).await.unwrap();

        cache.sweep().await.unwrap();

        assert!(db.get_bundle("a").await.unwrap().is_some());
        assert!(db.get_bundle("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_entry_is_sole_survivor() {
        let (cache, db) = cache_with_capacity(100).await;
        put_sized(&db, "huge", 150, 1).await;

        assert_eq!(cache.sweep().await.unwrap(), 0);
        assert!(db.get_bundle("huge").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_oversized_newest_evicts_everything_older() {
        let (cache, db) = cache_with_capacity(100).await;
        put_sized(&db, "old", 30, 1).await;
        put_sized(&db, "huge", 150, 2).await;

        assert_eq!(cache.sweep().await.unwrap(), 1);
        assert!(db.get_bundle("old").await.unwrap().is_none());
        assert!(db.get_bundle("huge").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_save_converges_below_capacity() {
        let (cache, db) = cache_with_capacity(100 * MIB).await;

        for (token, size) in [("a", 60 * MIB), ("b", 50 * MIB), ("c", 10 * MIB)] {
            cache
                .save(token, vec![0u8; size as usize], Vec::new(), HashMap::new())
                .await
                .unwrap();
            // Distinct wall-clock timestamps keep the recency order stable.
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let mut converged = false;
        for _ in 0..200 {
            if db.total_size().await.unwrap() <= 100 * MIB {
                converged = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(converged, "background sweep did not settle below capacity");
        assert!(cache.get("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_get_hit_bumps_recency_detached() {
        let (cache, db) = cache_with_capacity(1000).await;
        put_sized(&db, "a", 10, 1).await;
        put_sized(&db, "b", 10, 2).await;

        assert!(cache.get("a").await.unwrap().is_some());

        let mut bumped = false;
        for _ in 0..200 {
            let snapshot = db.scan_by_recency().await.unwrap();
            if snapshot.last().map(|s| s.token.as_str()) == Some("a") {
                bumped = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(bumped, "detached touch did not land");
    }

    #[tokio::test]
    async fn test_get_miss_is_not_an_error() {
        let (cache, _db) = cache_with_capacity(1000).await;
        assert!(cache.get("unknown").await.unwrap().is_none());

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[tokio::test]
    async fn test_save_upsert_replaces_not_merges() {
        let (cache, _db) = cache_with_capacity(1000).await;

        let mut first = HashMap::new();
        first.insert("old.png".to_string(), vec![1u8; 50]);
        cache.save("tok", vec![0u8; 10], vec![0u8; 5], first).await.unwrap();

        let mut second = HashMap::new();
        second.insert("new.png".to_string(), vec![2u8; 8]);
        cache.save("tok", vec![0u8; 10], vec![0u8; 5], second).await.unwrap();

        let bundle = cache.get("tok").await.unwrap().unwrap();
        assert_eq!(bundle.textures.len(), 1);
        assert!(bundle.textures.contains_key("new.png"));
        assert_eq!(bundle.size_bytes, 10 + 5 + 8);

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_clear_is_total() {
        let (cache, db) = cache_with_capacity(1000).await;
        cache.save("a", vec![0u8; 10], Vec::new(), HashMap::new()).await.unwrap();
        cache.save("b", vec![0u8; 10], Vec::new(), HashMap::new()).await.unwrap();

        cache.clear().await.unwrap();

        assert!(cache.get("a").await.unwrap().is_none());
        assert!(cache.get("b").await.unwrap().is_none());
        assert_eq!(db.total_size().await.unwrap(), 0);

        // The cache behaves as fresh afterwards.
        cache.save("c", vec![0u8; 10], Vec::new(), HashMap::new()).await.unwrap();
        assert_eq!(cache.sweep().await.unwrap(), 0);
        assert!(cache.get("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_save_empty_token_rejected() {
        let (cache, _db) = cache_with_capacity(1000).await;
        let result = cache.save("", Vec::new(), Vec::new(), HashMap::new()).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_stats_serialization() {
        let stats = CacheStats { entries: 2, total_size_bytes: 1234, hits: 5, misses: 1 };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("1234"));

        let back: CacheStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back.entries, 2);
        assert_eq!(back.hits, 5);
    }
}

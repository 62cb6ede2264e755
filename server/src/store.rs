//! Key-value store access: atomic counters, hash records, and the ranked
//! launch index.
//!
//! Components depend on the `KvStore` trait so the allocator and recorder can
//! be exercised against an in-memory store in tests. The production
//! implementation is Redis through a shared connection manager; `INCR` is the
//! store's native linearizable read-modify-write, which is what gives the
//! sequence allocator its uniqueness guarantee.

use async_trait::async_trait;
use redis::AsyncCommands;

pub type StoreResult<T> = Result<T, String>;

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Atomically increment `key` and return the post-increment value
    /// (1 on first use).
    async fn incr(&self, key: &str) -> StoreResult<u64>;

    /// Set all given hash fields on `key`, overwriting existing values.
    async fn hset_all(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()>;

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    /// Add (or re-score) `member` in the sorted set `key`.
    async fn zadd(&self, key: &str, score: i64, member: &str) -> StoreResult<()>;
}

// ── Redis ───────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct RedisStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url).map_err(|e| e.to_string())?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| e.to_string())?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn incr(&self, key: &str) -> StoreResult<u64> {
        let mut conn = self.conn.clone();
        conn.incr(key, 1u64).await.map_err(|e| e.to_string())
    }

    async fn hset_all(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        conn.hset_multiple::<_, _, _, ()>(key, fields)
            .await
            .map_err(|e| e.to_string())
    }

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.hget(key, field).await.map_err(|e| e.to_string())
    }

    async fn zadd(&self, key: &str, score: i64, member: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        conn.zadd::<_, _, _, ()>(key, member, score)
            .await
            .map_err(|e| e.to_string())
    }
}

// ── In-memory store for tests ───────────────────────────────────────────────

#[cfg(test)]
pub mod memory {
    use super::*;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    /// Mutex-backed store with the same atomicity guarantees per call.
    #[derive(Default)]
    pub struct MemoryStore {
        inner: Mutex<Inner>,
    }

    #[derive(Default)]
    struct Inner {
        counters: HashMap<String, u64>,
        hashes: HashMap<String, HashMap<String, String>>,
        zsets: HashMap<String, BTreeMap<String, i64>>,
        fail_zadd: bool,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make subsequent `zadd` calls fail, to exercise the
        /// record-written-but-ranking-failed path.
        pub fn fail_zadd(&self) {
            self.inner.lock().unwrap().fail_zadd = true;
        }

        pub fn hash_len(&self, key: &str) -> usize {
            self.inner
                .lock()
                .unwrap()
                .hashes
                .get(key)
                .map(|h| h.len())
                .unwrap_or(0)
        }

        pub fn zset_members(&self, key: &str) -> Vec<String> {
            self.inner
                .lock()
                .unwrap()
                .zsets
                .get(key)
                .map(|z| z.keys().cloned().collect())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl KvStore for MemoryStore {
        async fn incr(&self, key: &str) -> StoreResult<u64> {
            let mut inner = self.inner.lock().unwrap();
            let v = inner.counters.entry(key.to_string()).or_insert(0);
            *v += 1;
            Ok(*v)
        }

        async fn hset_all(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()> {
            let mut inner = self.inner.lock().unwrap();
            let hash = inner.hashes.entry(key.to_string()).or_default();
            for (f, v) in fields {
                hash.insert(f.clone(), v.clone());
            }
            Ok(())
        }

        async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .hashes
                .get(key)
                .and_then(|h| h.get(field))
                .cloned())
        }

        async fn zadd(&self, key: &str, score: i64, member: &str) -> StoreResult<()> {
            let mut inner = self.inner.lock().unwrap();
            if inner.fail_zadd {
                return Err("simulated zadd failure".to_string());
            }
            inner
                .zsets
                .entry(key.to_string())
                .or_default()
                .insert(member.to_string(), score);
            Ok(())
        }
    }
}

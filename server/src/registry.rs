//! Pool registry and launch records.
//!
//! Two write paths share the store: the registry write at launch time maps a
//! pool address back to its deployer and mint so fee claims can be verified
//! later, and the confirmation record flattens the client-reported launch
//! into the token hash plus the ranked launch index.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

use crate::error::ApiError;
use crate::store::KvStore;

pub const POOL_KEY_PREFIX: &str = "pool:";
pub const TOKEN_KEY_PREFIX: &str = "token:v2:";
pub const LEADERBOARD_KEY: &str = "leaderboard:v2";

pub fn pool_key(pool: &str) -> String {
    format!("{}{}", POOL_KEY_PREFIX, pool)
}

pub fn token_key(mint: &str) -> String {
    format!("{}{}", TOKEN_KEY_PREFIX, mint)
}

// ── Pool registry ───────────────────────────────────────────────────────────

/// Best-effort registry write at launch time. A failure here must not fail
/// the launch: the transactions are already assembled and the client can
/// still submit them, so the error is logged and swallowed.
pub struct PoolRegistryWriter {
    store: Arc<dyn KvStore>,
}

impl PoolRegistryWriter {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, pool: &str, deployer: &str, mint: &str) {
        let fields = [
            ("deployer".to_string(), deployer.to_string()),
            ("mint".to_string(), mint.to_string()),
        ];
        if let Err(reason) = self.store.hset_all(&pool_key(pool), &fields).await {
            tracing::warn!(pool, %reason, "pool registry write failed");
        }
    }
}

// ── Launch records ──────────────────────────────────────────────────────────

/// Persists a confirmed launch: the flattened payload under the token key and
/// the mint in the ranked launch index, scored by confirmation time.
pub struct LaunchRecorder {
    store: Arc<dyn KvStore>,
}

impl LaunchRecorder {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Returns the confirmation timestamp in epoch milliseconds. Re-running
    /// with the same mint overwrites the hash fields and re-scores the index
    /// entry rather than duplicating either.
    pub async fn record(&self, mint: &str, payload: &Value) -> Result<i64, ApiError> {
        let created_at = epoch_millis();

        let mut fields = flatten(payload);
        fields.push(("createdAt".to_string(), created_at.to_string()));
        self.store
            .hset_all(&token_key(mint), &fields)
            .await
            .map_err(|reason| ApiError::Upstream {
                dependency: "store",
                reason,
            })?;

        // The hash write has landed at this point; a ranking failure leaves
        // the two structures inconsistent, so it is surfaced loudly but the
        // confirmation itself still fails.
        if let Err(reason) = self.store.zadd(LEADERBOARD_KEY, created_at, mint).await {
            tracing::error!(mint, %reason, "launch recorded but ranking update failed");
            return Err(ApiError::Upstream {
                dependency: "store",
                reason,
            });
        }

        Ok(created_at)
    }
}

fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Flatten a JSON object into string hash fields. Nested objects use
/// dot-joined paths; arrays and other non-scalar leaves are stored as their
/// JSON text. Null values are dropped.
pub fn flatten(payload: &Value) -> Vec<(String, String)> {
    let mut out = BTreeMap::new();
    flatten_into(&mut out, String::new(), payload);
    out.into_iter().collect()
}

fn flatten_into(out: &mut BTreeMap<String, String>, prefix: String, value: &Value) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let path = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{}.{}", prefix, k)
                };
                flatten_into(out, path, v);
            }
        }
        Value::Null => {}
        Value::String(s) => {
            if !prefix.is_empty() {
                out.insert(prefix, s.clone());
            }
        }
        other => {
            if !prefix.is_empty() {
                out.insert(prefix, other.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use serde_json::json;

    #[test]
    fn nested_payloads_flatten_to_dotted_string_fields() {
        let fields = flatten(&json!({
            "name": "Test",
            "supply": 1000,
            "locked": true,
            "skip": null,
            "links": { "website": "https://example.com" },
            "tags": ["a", "b"],
        }));
        let map: std::collections::HashMap<_, _> = fields.into_iter().collect();
        assert_eq!(map["name"], "Test");
        assert_eq!(map["supply"], "1000");
        assert_eq!(map["locked"], "true");
        assert_eq!(map["links.website"], "https://example.com");
        assert_eq!(map["tags"], "[\"a\",\"b\"]");
        assert!(!map.contains_key("skip"));
    }

    #[tokio::test]
    async fn recording_twice_overwrites_instead_of_duplicating() {
        let store = Arc::new(MemoryStore::new());
        let recorder = LaunchRecorder::new(store.clone());
        let mint = "So11111111111111111111111111111111111111112";

        recorder
            .record(mint, &json!({"name": "First", "symbol": "AAA"}))
            .await
            .unwrap();
        recorder
            .record(mint, &json!({"name": "Second", "symbol": "AAA"}))
            .await
            .unwrap();

        // name, symbol, createdAt
        assert_eq!(store.hash_len(&token_key(mint)), 3);
        assert_eq!(store.zset_members(LEADERBOARD_KEY), vec![mint.to_string()]);
    }

    #[tokio::test]
    async fn ranking_failure_after_hash_write_is_an_error() {
        let store = Arc::new(MemoryStore::new());
        let recorder = LaunchRecorder::new(store.clone());
        store.fail_zadd();

        let err = recorder
            .record("mint", &json!({"name": "X"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Upstream { dependency: "store", .. }));
        // The hash write still landed.
        assert!(store.hash_len(&token_key("mint")) > 0);
    }

    #[tokio::test]
    async fn registry_write_failure_does_not_propagate() {
        // MemoryStore hset never fails, so exercise the happy path and the
        // key shape here.
        let store = Arc::new(MemoryStore::new());
        let writer = PoolRegistryWriter::new(store.clone());
        writer.record("poolAddr", "deployerAddr", "mintAddr").await;
        assert_eq!(store.hash_len(&pool_key("poolAddr")), 2);
    }
}

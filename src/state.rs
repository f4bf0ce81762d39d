//! Key/value state-store contract (spec.md §6) plus an in-memory reference
//! implementation used by tests and the demo binary.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Atomic get/set/delete/incr with TTL, assumed by every component that
/// touches run state. A production deployment backs this with Redis or
/// similar; nothing in the harvest engine depends on the backing store.
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>>;
    fn set(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
    fn delete(&self, key: &str) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
    fn incr(&self, key: &str, by: i64) -> Pin<Box<dyn Future<Output = i64> + Send + '_>>;
    fn list_keys(&self, prefix: &str) -> Pin<Box<dyn Future<Output = Vec<String>> + Send + '_>>;
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

/// Lazy-expiry in-memory store. Not a production backend: it exists so the
/// rest of the crate (and its tests) can exercise the `StateStore` contract
/// without a real KV service.
#[derive(Default)]
pub struct MemoryStateStore {
    inner: Mutex<HashMap<String, Entry>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_live(entry: &Entry) -> bool {
        match entry.expires_at {
            Some(at) => Instant::now() < at,
            None => true,
        }
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let mut map = self.inner.lock().unwrap();
            match map.get(&key) {
                Some(entry) if Self::is_live(entry) => Some(entry.value.clone()),
                Some(_) => {
                    map.remove(&key);
                    None
                }
                None => None,
            }
        })
    }

    fn set(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let mut map = self.inner.lock().unwrap();
            map.insert(
                key,
                Entry {
                    value,
                    expires_at: ttl.map(|d| Instant::now() + d),
                },
            );
        })
    }

    fn delete(&self, key: &str) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            self.inner.lock().unwrap().remove(&key);
        })
    }

    fn incr(&self, key: &str, by: i64) -> Pin<Box<dyn Future<Output = i64> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let mut map = self.inner.lock().unwrap();
            let current = match map.get(&key) {
                Some(entry) if Self::is_live(entry) => entry.value.parse::<i64>().unwrap_or(0),
                _ => 0,
            };
            let updated = current + by;
            map.insert(
                key,
                Entry {
                    value: updated.to_string(),
                    expires_at: None,
                },
            );
            updated
        })
    }

    fn list_keys(&self, prefix: &str) -> Pin<Box<dyn Future<Output = Vec<String>> + Send + '_>> {
        let prefix = prefix.to_string();
        Box::pin(async move {
            let mut map = self.inner.lock().unwrap();
            let dead: Vec<String> = map
                .iter()
                .filter(|(_, e)| !Self::is_live(e))
                .map(|(k, _)| k.clone())
                .collect();
            for k in dead {
                map.remove(&k);
            }
            map.keys().filter(|k| k.starts_with(&prefix)).cloned().collect()
        })
    }
}

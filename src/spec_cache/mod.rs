//! Swagger/OpenAPI document cache (C2): ETag-conditional refresh every 5
//! minutes, fully `$ref`-resolved (spec.md §4.2).

pub mod deref;

use chrono::Utc;
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{keys, ttl};
use crate::error::Result;
use crate::state::StateStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedSpec {
    timestamp: i64,
    etag: Option<String>,
    spec: Value,
}

pub struct SpecCache {
    client: Client,
    base_url: String,
}

impl SpecCache {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    /// Returns the cached, fully-deref'd swagger document, refreshing it from
    /// upstream if the cache is older than the refresh window.
    pub async fn get_spec<S: StateStore>(&self, store: &S) -> Result<Value> {
        let cached = self.load(store).await;

        let fresh_enough = cached
            .as_ref()
            .map(|c| Utc::now().timestamp() - c.timestamp <= ttl::SPEC_REFRESH_WINDOW.as_secs() as i64)
            .unwrap_or(false);

        if fresh_enough {
            return Ok(cached.expect("checked above").spec);
        }

        match self.refresh(cached.as_ref()).await {
            Ok(Some(updated)) => {
                self.save(store, &updated).await;
                Ok(updated.spec)
            }
            Ok(None) => {
                // 304: bump timestamp only, keep existing spec.
                if let Some(mut c) = cached {
                    c.timestamp = Utc::now().timestamp();
                    self.save(store, &c).await;
                    Ok(c.spec)
                } else {
                    Ok(Value::Null)
                }
            }
            Err(e) => {
                warn!("spec refresh failed, serving last known spec: {}", e);
                Ok(cached.map(|c| c.spec).unwrap_or(Value::Null))
            }
        }
    }

    async fn load<S: StateStore>(&self, store: &S) -> Option<CachedSpec> {
        let raw = store.get(keys::ESI_JSON).await?;
        serde_json::from_str(&raw).ok()
    }

    async fn save<S: StateStore>(&self, store: &S, cached: &CachedSpec) {
        if let Ok(serialized) = serde_json::to_string(cached) {
            store.set(keys::ESI_JSON, serialized, Some(ttl::SPEC_CACHE)).await;
        }
    }

    /// Returns `Ok(Some(spec))` on 200, `Ok(None)` on 304.
    async fn refresh(&self, cached: Option<&CachedSpec>) -> Result<Option<CachedSpec>> {
        let url = format!("{}/latest/swagger.json", self.base_url);
        let mut request = self.client.get(&url);
        if let Some(c) = cached {
            if let Some(etag) = &c.etag {
                request = request.header("If-None-Match", etag.clone());
            }
        }

        let response = request.send().await?;
        if response.status().as_u16() == 304 {
            debug!("swagger.json not modified");
            return Ok(None);
        }

        let etag = response
            .headers()
            .get("ETag")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body: Value = response.json().await?;
        let resolved = deref::resolve(&body);

        Ok(Some(CachedSpec {
            timestamp: Utc::now().timestamp(),
            etag,
            spec: resolved,
        }))
    }
}

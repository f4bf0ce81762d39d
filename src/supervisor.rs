//! Run supervisor (C7): scans `new.*` markers, verifies the token, fetches
//! roles, and drives one harvest end to end (spec.md §4.7).

use std::collections::HashSet;
use std::sync::Arc;

use log::warn;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;

use crate::config::{esi, keys, supervisor as supervisor_config, ttl};
use crate::document;
use crate::expander;
use crate::harvest;
use crate::http::{EsiClient, FetchBody};
use crate::model::{HarvestPlan, KnownParams};
use crate::names;
use crate::planner;
use crate::spec_cache::SpecCache;
use crate::state::StateStore;

struct VerifyInfo {
    character_id: i64,
    scopes: HashSet<String>,
}

pub struct Supervisor<S: StateStore> {
    client: EsiClient,
    store: Arc<S>,
    spec_cache: SpecCache,
    base_url: String,
}

impl<S: StateStore> Supervisor<S> {
    pub fn new(store: Arc<S>, base_url: String) -> Self {
        Self {
            client: EsiClient::new(),
            spec_cache: SpecCache::new(base_url.clone()),
            store,
            base_url,
        }
    }

    /// Prior runs are not resumable: drop every surviving pending/processing
    /// marker at startup.
    pub async fn reset_stale_markers(&self) {
        for key in self.store.list_keys(keys::PENDING).await {
            self.store.delete(&key).await;
        }
        for key in self.store.list_keys(keys::PROCESSING).await {
            self.store.delete(&key).await;
        }
    }

    /// Scans `new.*` markers and runs the harvest for each.
    pub async fn process_new(&self) {
        for key in self.store.list_keys(keys::NEW).await {
            let Some(run_id) = key.strip_prefix(keys::NEW).map(str::to_string) else {
                continue;
            };
            let Some(access_token) = self.store.get(&key).await else {
                continue;
            };
            self.store.delete(&key).await;
            self.run_one(&run_id, &access_token).await;
        }
    }

    /// Poll loop: wakes every 10 seconds and drains `new.*`.
    pub async fn poll_forever(&self) {
        loop {
            self.process_new().await;
            tokio::time::sleep(supervisor_config::POLL_INTERVAL).await;
        }
    }

    async fn run_one(&self, run_id: &str, access_token: &str) {
        self.store
            .set(&format!("{}{}", keys::PENDING, run_id), "1".to_string(), Some(ttl::PENDING))
            .await;

        let verify = match self.verify_token(access_token).await {
            Ok(v) => v,
            Err(reply) => {
                self.finalize(run_id, serde_json::json!({"auth failure": reply})).await;
                return;
            }
        };

        let roles = match self.fetch_roles(verify.character_id, access_token).await {
            Ok(r) => r,
            Err(reply) => {
                self.finalize(run_id, serde_json::json!({"roles failure": reply})).await;
                return;
            }
        };

        self.store.delete(&format!("{}{}", keys::PENDING, run_id)).await;
        self.store
            .set(
                &format!("{}{}", keys::PROCESSING, run_id),
                verify.character_id.to_string(),
                Some(ttl::PROCESSING),
            )
            .await;

        match self.harvest(verify.character_id, verify.scopes, roles).await {
            Ok(document_value) => {
                self.finalize(run_id, document_value).await;
                self.store.incr(keys::ALL_TIME, 1).await;
            }
            Err(reply) => {
                self.finalize(run_id, serde_json::json!({"public info failure": reply})).await;
            }
        }

        self.store.delete(&format!("{}{}", keys::PROCESSING, run_id)).await;
    }

    async fn finalize(&self, run_id: &str, document_value: Value) {
        if let Err(e) = document::write(self.store.as_ref(), run_id, &document_value).await {
            warn!("failed to store final document for run {}: {}", run_id, e);
        }
        self.store.delete(&format!("{}{}", keys::PENDING, run_id)).await;
    }

    async fn verify_token(&self, access_token: &str) -> std::result::Result<VerifyInfo, Value> {
        let url = format!("{}{}", self.base_url, esi::VERIFY_PATH);
        let response = self
            .client
            .fetch(&url, Method::GET, bearer(access_token), None, None)
            .await
            .map_err(|e| Value::String(e.to_string()))?;

        match response.body {
            FetchBody::Json(body) => {
                let character_id = body.get("CharacterID").and_then(Value::as_i64);
                let scopes_str = body.get("Scopes").and_then(Value::as_str);
                match (character_id, scopes_str) {
                    (Some(id), Some(scopes)) if id > 0 && !scopes.is_empty() => Ok(VerifyInfo {
                        character_id: id,
                        scopes: scopes.split(' ').map(str::to_string).collect(),
                    }),
                    _ => Err(body),
                }
            }
            FetchBody::Error(msg) => Err(Value::String(msg)),
        }
    }

    async fn fetch_roles(&self, character_id: i64, access_token: &str) -> std::result::Result<HashSet<String>, Value> {
        let url = format!("{}{}/characters/{}/roles/", self.base_url, esi::LATEST, character_id);
        let response = self
            .client
            .fetch(&url, Method::GET, bearer(access_token), None, None)
            .await
            .map_err(|e| Value::String(e.to_string()))?;

        match response.body {
            FetchBody::Json(body) => Ok(body
                .get("roles")
                .and_then(Value::as_array)
                .map(|roles| roles.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default()),
            FetchBody::Error(msg) => Err(Value::String(msg)),
        }
    }

    async fn harvest(
        &self,
        character_id: i64,
        scopes: HashSet<String>,
        roles: HashSet<String>,
    ) -> std::result::Result<Value, Value> {
        let url = format!("{}{}/characters/{}/", self.base_url, esi::LATEST, character_id);
        let response = self
            .client
            .fetch(&url, Method::GET, HeaderMap::new(), None, None)
            .await
            .map_err(|e| Value::String(e.to_string()))?;

        let public_info = match response.body {
            FetchBody::Json(body) => body,
            FetchBody::Error(msg) => return Err(Value::String(msg)),
        };

        let mut plan = HarvestPlan {
            character_id,
            scopes,
            roles,
            ..Default::default()
        };

        if let Some(corp_id) = public_info.get("corporation_id").and_then(Value::as_i64) {
            if corp_id > esi::NPC_CORP_MAX_ID {
                plan.corporation_id = Some(corp_id);
            }
        }
        plan.alliance_id = public_info.get("alliance_id").and_then(Value::as_i64);

        let mut known_params = KnownParams::new();
        known_params.insert("character_id".to_string(), plan.character_id);
        if let Some(corp) = plan.corporation_id {
            known_params.insert("corporation_id".to_string(), corp);
        }
        if let Some(alliance) = plan.alliance_id {
            known_params.insert("alliance_id".to_string(), alliance);
        }

        let spec = self.spec_cache.get_spec(self.store.as_ref()).await.unwrap_or(Value::Null);

        let expansion =
            expander::expand_params(&self.client, &spec, &plan.scopes, &plan.roles, &known_params, &self.base_url).await;

        let urls = planner::build_urls(&spec, &plan.scopes, &plan.roles, &known_params, &expansion.pools, &self.base_url);

        let harvested = harvest::get_all_data(&self.client, urls, expansion.partial_results).await;

        let ids = names::collect_ids(&harvested);
        let resolved = names::resolve_names(&self.client, &ids, &self.base_url).await;
        let annotated = names::annotate(&harvested, &resolved);

        Ok(serde_json::to_value(annotated).unwrap_or(Value::Null))
    }
}

fn bearer(access_token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", access_token)) {
        headers.insert(AUTHORIZATION, value);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStateStore;
    use wiremock::matchers::{method as http_method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_auth_failure_records_reply_and_clears_pending() {
        let server = MockServer::start().await;
        Mock::given(http_method("GET"))
            .and(path("/verify/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"no": "character"})))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStateStore::new());
        let supervisor = Supervisor::new(store.clone(), server.uri());
        store.set("new.run-1", "token".to_string(), None).await;
        supervisor.process_new().await;

        let document = document::read(store.as_ref(), "run-1").await.unwrap().unwrap();
        assert!(document.get("auth failure").is_some());
        assert_eq!(store.get("pending.run-1").await, None);
    }

    #[tokio::test]
    async fn test_s1_basic_character_end_to_end() {
        let server = MockServer::start().await;

        Mock::given(http_method("GET"))
            .and(path("/verify/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "CharacterID": 90000001,
                "Scopes": "esi-location.read_location.v1"
            })))
            .mount(&server)
            .await;
        Mock::given(http_method("GET"))
            .and(path("/latest/characters/90000001/roles/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"roles": []})))
            .mount(&server)
            .await;
        Mock::given(http_method("GET"))
            .and(path("/latest/characters/90000001/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"corporation_id": 1000001})))
            .mount(&server)
            .await;
        Mock::given(http_method("GET"))
            .and(path("/latest/swagger.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "basePath": "/latest",
                "paths": {
                    "/characters/{character_id}/location/": {
                        "get": {"security": [{"evesso": ["esi-location.read_location.v1"]}]}
                    },
                    "/corporations/{corporation_id}/wallets/": {"get": {}}
                }
            })))
            .mount(&server)
            .await;
        Mock::given(http_method("GET"))
            .and(path("/latest/characters/90000001/location/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"solar_system_id": 30000142})))
            .mount(&server)
            .await;
        // listing endpoints the expander probes regardless of scopes; stub empty
        for route in [
            "/latest/characters/90000001/calendar/",
            "/latest/characters/90000001/contracts/",
            "/latest/characters/90000001/fittings/",
            "/latest/characters/90000001/mail/labels/",
            "/latest/characters/90000001/planets/",
            "/latest/characters/90000001/mail/",
        ] {
            Mock::given(http_method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
                .mount(&server)
                .await;
        }

        let store = Arc::new(MemoryStateStore::new());
        let supervisor = Supervisor::new(store.clone(), server.uri());
        store.set("new.run-s1", "token".to_string(), None).await;
        supervisor.process_new().await;

        let document = document::read(store.as_ref(), "run-s1").await.unwrap().unwrap();
        let key = format!("{}/latest/characters/90000001/location/", server.uri());
        assert_eq!(document[key.as_str()], serde_json::json!({"solar_system_id": 30000142}));
        // no corporation-rooted key should appear: NPC corp (1,000,001 < 2,000,000)
        let has_corp_key = document
            .as_object()
            .unwrap()
            .keys()
            .any(|k| k.contains("/corporations/"));
        assert!(!has_corp_key);
    }
}

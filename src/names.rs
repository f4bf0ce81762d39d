//! Name resolver (C6): collects whitelisted integer IDs from the result
//! tree, resolves them through the batch names endpoint with adaptive
//! shrinking on failure, and annotates the tree with `<key>_name` fields
//! (spec.md §4.6).

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::thread_rng;
use regex::Regex;
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde_json::Value;

use crate::config::esi;
use crate::http::{EsiClient, FetchBody};
use crate::model::{NameMap, ResultMap};

/// Key names eligible for ID-to-name resolution (spec.md §4.6). Deliberately
/// not broadened with `planet_id`/`first_party_id`/`second_party_id`/`from`/
/// `recipient_id`/`sender_id`/`station_id` (spec.md §9(b)).
pub const ID_KEYS: &[&str] = &[
    "type_id",
    "creator_id",
    "creator_corporation_id",
    "executor_corporation_id",
    "contact_id",
    "alliance_id",
    "corporation_id",
    "issuer_corporation_id",
    "issuer_id",
    "ship_type_id",
    "installer_id",
    "blueprint_type_id",
    "product_type_id",
    "solar_system_id",
    "region_id",
    "skill_id",
    "tax_receiver_id",
    "client_id",
    "ceo_id",
    "home_station_id",
    "assignee_id",
];

/// Listing routes whose body is already a flat list of integer IDs; these
/// get list-of-object annotation instead of sibling `_name` keys.
const RAW_ID_ROUTE_PATTERNS: &[&str] = &[
    r".*/alliances/\d+/corporations/$",
    r".*/characters/\d+/implants/$",
    r".*/corporations/\d+/members/$",
];

fn raw_id_route(route: &str) -> bool {
    RAW_ID_ROUTE_PATTERNS
        .iter()
        .any(|pattern| Regex::new(pattern).expect("valid literal regex").is_match(route))
}

/// Walks the result map and collects every whitelisted integer ID.
pub fn collect_ids(results: &ResultMap) -> HashSet<i64> {
    let mut collected = HashSet::new();
    for (route, data) in results {
        if raw_id_route(route) {
            if let Some(items) = data.as_array() {
                for item in items {
                    if let Some(id) = item.as_i64() {
                        collected.insert(id);
                    }
                }
                continue;
            }
        }
        recurse_for_ids(data, &mut collected);
    }
    collected
}

fn recurse_for_ids(value: &Value, collected: &mut HashSet<i64>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if ID_KEYS.contains(&key.as_str()) {
                    if let Some(id) = child.as_i64() {
                        collected.insert(id);
                    }
                }
                recurse_for_ids(child, collected);
            }
        }
        Value::Array(items) => {
            for item in items {
                recurse_for_ids(item, collected);
            }
        }
        _ => {}
    }
}

/// Resolves `ids` through `/universe/names/`, shrinking the batch size on
/// repeated failure (spec.md §4.6). Best-effort: IDs that never resolve are
/// simply absent from the returned map.
pub async fn resolve_names(client: &EsiClient, ids: &HashSet<i64>, base_url: &str) -> NameMap {
    let mut resolved = NameMap::new();
    let mut failed: Vec<i64> = ids.iter().copied().collect();
    let mut batch_size = esi::NAMES_MAX_BATCH;

    loop {
        if failed.is_empty() {
            break;
        }

        let mut rng = thread_rng();
        failed.shuffle(&mut rng);

        let mut next_failed = Vec::new();
        for chunk in failed.chunks(batch_size) {
            match post_names(client, chunk, base_url).await {
                Some(entries) => resolved.extend(entries),
                None => next_failed.extend_from_slice(chunk),
            }
        }

        if next_failed.is_empty() {
            break;
        }
        if batch_size == 1 {
            log::warn!("giving up on {} unresolvable ids", next_failed.len());
            break;
        }
        batch_size = std::cmp::max(std::cmp::min(next_failed.len() / 2, 500), 1);
        failed = next_failed;
    }

    resolved
}

async fn post_names(client: &EsiClient, ids: &[i64], base_url: &str) -> Option<Vec<(i64, String)>> {
    let url = format!("{}{}", base_url, esi::NAMES_PATH);
    let body = Value::from(ids.iter().copied().collect::<Vec<i64>>());
    let response = client
        .fetch(&url, Method::POST, HeaderMap::new(), Some(&body), None)
        .await
        .ok()?;

    match response.body {
        FetchBody::Json(Value::Array(items)) => Some(
            items
                .iter()
                .filter_map(|item| {
                    let id = item.get("id").and_then(Value::as_i64)?;
                    let name = item.get("name").and_then(Value::as_str)?;
                    Some((id, name.to_string()))
                })
                .collect(),
        ),
        _ => None,
    }
}

/// Produces a new result tree with `<key>_name` annotations (spec.md §9
/// "Deep mutation in name resolution" — an immutable reimplementation
/// rather than in-place mutation).
pub fn annotate(results: &ResultMap, resolved: &NameMap) -> ResultMap {
    let mut annotated = ResultMap::new();
    for (route, data) in results {
        if raw_id_route(route) {
            if let Some(items) = data.as_array() {
                let transformed: Vec<Value> = items
                    .iter()
                    .map(|item| annotate_raw_id(item, resolved))
                    .collect();
                annotated.insert(route.clone(), Value::Array(transformed));
                continue;
            }
        }
        annotated.insert(route.clone(), annotate_node(data, resolved));
    }
    annotated
}

fn annotate_raw_id(item: &Value, resolved: &NameMap) -> Value {
    let Some(id) = item.as_i64() else {
        return item.clone();
    };
    let mut object = serde_json::Map::new();
    object.insert("id".to_string(), Value::from(id));
    if let Some(name) = resolved.get(&id) {
        object.insert("name".to_string(), Value::String(name.clone()));
    }
    Value::Object(object)
}

fn annotate_node(value: &Value, resolved: &NameMap) -> Value {
    match value {
        Value::Object(map) => {
            let mut annotated = serde_json::Map::new();
            for (key, child) in map {
                let annotated_child = annotate_node(child, resolved);
                if ID_KEYS.contains(&key.as_str()) {
                    if let Some(name) = child.as_i64().and_then(|id| resolved.get(&id)) {
                        annotated.insert(format!("{}_name", key), Value::String(name.clone()));
                    }
                }
                annotated.insert(key.clone(), annotated_child);
            }
            Value::Object(annotated)
        }
        Value::Array(items) => Value::Array(items.iter().map(|item| annotate_node(item, resolved)).collect()),
        other => other.clone(),
    }
}

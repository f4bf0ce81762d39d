//! Parameter expander (C4): fetches the "listing" endpoints that yield the
//! ID pools dependent endpoints fan out over (spec.md §4.4).

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use log::warn;
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::config::esi;
use crate::http::{EsiClient, FetchBody, PageInfo};
use crate::model::{KnownParams, ParamPools, ResultMap};
use crate::spec_query::{is_subset, required_roles, required_scopes, substitute};

#[derive(Debug, Clone)]
struct ListingJob {
    parent: String,
    child: String,
    route_template: String,
    url: String,
}

pub struct ExpansionOutput {
    pub pools: ParamPools,
    /// Raw listing bodies keyed by concrete URL, seeding the harvest result map.
    pub partial_results: ResultMap,
}

/// The fixed initial parameter-pool table (spec.md §3).
fn initial_listing_routes() -> HashMap<String, HashMap<String, String>> {
    HashMap::from([
        (
            "character_id".to_string(),
            HashMap::from([
                ("event_id".to_string(), "/characters/{character_id}/calendar/".to_string()),
                ("contract_id".to_string(), "/characters/{character_id}/contracts/".to_string()),
                ("fitting_id".to_string(), "/characters/{character_id}/fittings/".to_string()),
                ("label_id".to_string(), "/characters/{character_id}/mail/labels/".to_string()),
                ("planet_id".to_string(), "/characters/{character_id}/planets/".to_string()),
                ("mail_id".to_string(), "/characters/{character_id}/mail/".to_string()),
            ]),
        ),
        (
            "corporation_id".to_string(),
            HashMap::from([
                ("observer_id".to_string(), "/corporation/{corporation_id}/mining/observers/".to_string()),
                ("contract_id".to_string(), "/corporations/{corporation_id}/contracts/".to_string()),
                ("starbase_id".to_string(), "/corporations/{corporation_id}/starbases/".to_string()),
                ("division".to_string(), "/corporations/{corporation_id}/wallets/".to_string()),
            ]),
        ),
    ])
}

/// Per-listing-route projection from a listing body to a concrete ID list
/// (spec.md §4.4). Routes with no entry here fall back to "use the body
/// as-is if it is already a list of integers".
fn apply_extractor(route_template: &str, body: &Value) -> Option<Vec<i64>> {
    let extracted = match route_template {
        "/characters/{character_id}/mail/labels/" => body
            .get("labels")
            .and_then(Value::as_array)
            .map(|labels| labels.iter().filter_map(|l| l.get("label_id").and_then(Value::as_i64)).collect()),
        "/characters/{character_id}/planets/" => extract_field(body, "planet_id"),
        "/characters/{character_id}/calendar/" => extract_field(body, "event_id"),
        "/characters/{character_id}/contracts/" => extract_field(body, "contract_id"),
        "/characters/{character_id}/mail/" => extract_field(body, "mail_id"),
        "/corporations/{corporation_id}/calendar/" => extract_field(body, "event_id"),
        "/corporations/{corporation_id}/contracts/" => extract_field(body, "contract_id"),
        _ => None,
    };

    extracted.or_else(|| {
        body.as_array().map(|items| items.iter().filter_map(Value::as_i64).collect())
    })
}

fn extract_field(body: &Value, field: &str) -> Option<Vec<i64>> {
    body.as_array()
        .map(|items| items.iter().filter_map(|item| item.get(field).and_then(Value::as_i64)).collect())
}

fn build_jobs(
    spec: &Value,
    scopes: &std::collections::HashSet<String>,
    roles: &std::collections::HashSet<String>,
    known_params: &KnownParams,
    base_path: &str,
    base_url: &str,
) -> Vec<ListingJob> {
    let mut jobs = Vec::new();
    for (parent, children) in initial_listing_routes() {
        let Some(&parent_value) = known_params.get(&parent) else {
            continue;
        };
        for (child, route_template) in children {
            if !route_allowed(spec, &route_template, scopes, roles) {
                continue;
            }
            let mut values = HashMap::new();
            values.insert(parent.clone(), parent_value);
            let Some(concrete_path) = substitute(&route_template, &values) else {
                continue;
            };
            jobs.push(ListingJob {
                parent: parent.clone(),
                child,
                route_template,
                url: format!("{}{}{}", base_url, base_path, concrete_path),
            });
        }
    }
    jobs
}

fn route_allowed(
    spec: &Value,
    route_template: &str,
    scopes: &std::collections::HashSet<String>,
    roles: &std::collections::HashSet<String>,
) -> bool {
    match spec.pointer("/paths").and_then(|p| p.get(route_template)).and_then(|o| o.get("get")) {
        Some(get_op) => is_subset(&required_roles(get_op), roles) && is_subset(&required_scopes(get_op), scopes),
        // the listing route isn't described in this spec snapshot; best-effort attempt.
        None => true,
    }
}

pub async fn expand_params(
    client: &EsiClient,
    spec: &Value,
    scopes: &std::collections::HashSet<String>,
    roles: &std::collections::HashSet<String>,
    known_params: &KnownParams,
    base_url: &str,
) -> ExpansionOutput {
    let base_path = spec.get("basePath").and_then(Value::as_str).unwrap_or("").to_string();
    let jobs = build_jobs(spec, scopes, roles, known_params, &base_path, base_url);
    let semaphore = Arc::new(Semaphore::new(esi::FETCH_POOL_WIDTH));

    let first_page_results: Vec<(ListingJob, Option<crate::http::FetchResponse>)> = stream::iter(jobs)
        .map(|job| {
            let client = client.clone();
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = client.fetch(&job.url, Method::GET, HeaderMap::new(), None, None).await;
                (job, result.ok())
            }
        })
        .buffer_unordered(esi::FETCH_POOL_WIDTH)
        .collect()
        .await;

    let mut pools = ParamPools::new();
    let mut partial_results = ResultMap::new();
    let mut page_accumulators: HashMap<String, HashMap<u32, Value>> = HashMap::new();
    let mut job_by_url: HashMap<String, ListingJob> = HashMap::new();
    let mut follow_up_jobs: Vec<(String, u32)> = Vec::new();

    for (job, response) in first_page_results.into_iter().flat_map(|(j, r)| r.map(|r| (j, r))) {
        job_by_url.insert(job.url.clone(), job.clone());
        match response.pages {
            PageInfo::Pages(remaining) => {
                if let FetchBody::Json(body) = &response.body {
                    page_accumulators.entry(job.url.clone()).or_default().insert(1, body.clone());
                }
                for page in remaining {
                    follow_up_jobs.push((job.url.clone(), page));
                }
            }
            PageInfo::Page(n) => {
                if let FetchBody::Json(body) = &response.body {
                    page_accumulators.entry(job.url.clone()).or_default().insert(n, body.clone());
                }
            }
            PageInfo::None => match response.body {
                FetchBody::Json(body) => {
                    partial_results.insert(job.url.clone(), body.clone());
                    if let Some(ids) = apply_extractor(&job.route_template, &body) {
                        pools.entry(job.parent.clone()).or_default().insert(job.child.clone(), ids);
                    }
                }
                FetchBody::Error(msg) => {
                    warn!("listing fetch failed for {}: {}", job.url, msg);
                }
            },
        }
    }

    if !follow_up_jobs.is_empty() {
        let follow_up_results: Vec<(String, u32, Option<crate::http::FetchResponse>)> = stream::iter(follow_up_jobs)
            .map(|(url, page)| {
                let client = client.clone();
                let semaphore = semaphore.clone();
                async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    let result = client.fetch(&url, Method::GET, HeaderMap::new(), None, Some(page)).await;
                    (url, page, result.ok())
                }
            })
            .buffer_unordered(esi::FETCH_POOL_WIDTH)
            .collect()
            .await;

        // A failed page is logged and dropped; the remaining pages still merge
        // (spec.md §9, Open Question (a) — retained as specified).
        for (url, page, response) in follow_up_results {
            match response {
                Some(r) => {
                    if let FetchBody::Json(body) = r.body {
                        page_accumulators.entry(url).or_default().insert(page, body);
                    } else {
                        warn!("page {} of {} failed, dropping that page only", page, url);
                    }
                }
                None => warn!("page {} of {} failed at the transport layer", page, url),
            }
        }
    }

    for (url, pages) in page_accumulators {
        let Some(job) = job_by_url.get(&url) else { continue };
        let mut ordered_pages: Vec<_> = pages.into_iter().collect();
        ordered_pages.sort_by_key(|(n, _)| *n);
        let merged: Vec<Value> = ordered_pages
            .into_iter()
            .filter_map(|(_, body)| body.as_array().cloned())
            .flatten()
            .collect();
        let merged_value = Value::Array(merged);
        partial_results.insert(url.clone(), merged_value.clone());
        if let Some(ids) = apply_extractor(&job.route_template, &merged_value) {
            pools.entry(job.parent.clone()).or_default().insert(job.child.clone(), ids);
        }
    }

    ExpansionOutput { pools, partial_results }
}

//! Harvest driver (C5): issues every planned URL through a bounded pool,
//! discovers pagination from response headers, and merges pages in
//! ascending order (spec.md §4.5).

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use log::warn;
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::config::esi;
use crate::http::{EsiClient, FetchBody, FetchResponse, PageInfo};
use crate::model::ResultMap;

/// Fetches every URL in `urls`, merges pagination, and returns a result map
/// seeded with `partial_results` (the listing bodies C4 already fetched).
pub async fn get_all_data(client: &EsiClient, urls: Vec<String>, partial_results: ResultMap) -> ResultMap {
    let semaphore = Arc::new(Semaphore::new(esi::FETCH_POOL_WIDTH));

    let first_page_results: Vec<(String, Option<FetchResponse>)> = stream::iter(urls)
        .map(|url| {
            let client = client.clone();
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = client.fetch(&url, Method::GET, HeaderMap::new(), None, None).await;
                (url, result.ok())
            }
        })
        .buffer_unordered(esi::FETCH_POOL_WIDTH)
        .collect()
        .await;

    let mut results = partial_results;
    let mut page_accumulators: HashMap<String, HashMap<u32, Value>> = HashMap::new();
    let mut follow_up_jobs: Vec<(String, u32)> = Vec::new();

    for (url, response) in first_page_results.into_iter().flat_map(|(u, r)| r.map(|r| (u, r))) {
        match response.pages {
            PageInfo::Pages(remaining) => {
                if let FetchBody::Json(body) = &response.body {
                    page_accumulators.entry(url.clone()).or_default().insert(1, body.clone());
                }
                for page in remaining {
                    follow_up_jobs.push((url.clone(), page));
                }
            }
            PageInfo::Page(n) => {
                if let FetchBody::Json(body) = &response.body {
                    page_accumulators.entry(url.clone()).or_default().insert(n, body.clone());
                }
            }
            PageInfo::None => match response.body {
                FetchBody::Json(body) => {
                    results.insert(url, body);
                }
                FetchBody::Error(msg) => {
                    // the marker is preserved so callers can see which endpoints failed.
                    results.insert(url, Value::String(msg));
                }
            },
        }
    }

    if !follow_up_jobs.is_empty() {
        let follow_up_results: Vec<(String, u32, Option<FetchResponse>)> = stream::iter(follow_up_jobs)
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

        for (url, page, response) in follow_up_results {
            match response {
                Some(r) => match r.body {
                    FetchBody::Json(body) => {
                        page_accumulators.entry(url).or_default().insert(page, body);
                    }
                    FetchBody::Error(msg) => {
                        warn!("page {} of {} errored, dropping that page only: {}", page, url, msg);
                    }
                },
                None => warn!("page {} of {} failed at the transport layer", page, url),
            }
        }
    }

    for (url, pages) in page_accumulators {
        let mut ordered: Vec<_> = pages.into_iter().collect();
        ordered.sort_by_key(|(n, _)| *n);
        let merged: Vec<Value> = ordered
            .into_iter()
            .filter_map(|(_, body)| body.as_array().cloned())
            .flatten()
            .collect();
        if !merged.is_empty() {
            results.insert(url, Value::Array(merged));
        }
    }

    results
}

//! Shared ESI HTTP client (C1): pooled transport, pagination hints and
//! error-limit-aware backoff (spec.md §4.1).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use reqwest::{Client, Method};
use serde_json::Value;

use crate::config::{defaults, esi};
use crate::error::Result;

const ERROR_LIMIT_RESET_HEADER: &str = "X-Esi-Error-Limit-Reset";
const PAGES_HEADER: &str = "X-Pages";

/// Pagination hint returned alongside a fetched body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageInfo {
    /// Caller asked for a specific page explicitly; echoed back unchanged.
    Page(u32),
    /// Page 1 was fetched without an explicit page number and `X-Pages` >= 2;
    /// holds pages `2..=X-Pages` still to be fetched.
    Pages(Vec<u32>),
    /// Single-page result.
    None,
}

/// A fetched body: either the parsed JSON, or an error-marker string
/// (spec.md §9 "Heterogeneous return unions" — an explicit sum type in
/// place of the source's runtime type check).
#[derive(Debug, Clone)]
pub enum FetchBody {
    Json(Value),
    Error(String),
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub pages: PageInfo,
    pub url: String,
    pub body: FetchBody,
}

/// Single shared connection-pooled client for every outbound ESI call.
#[derive(Clone)]
pub struct EsiClient {
    client: Client,
    error_limited: Arc<AtomicBool>,
}

impl EsiClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .pool_max_idle_per_host(esi::POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(esi::POOL_IDLE_TIMEOUT)
            .tcp_keepalive(esi::TCP_KEEPALIVE)
            .connect_timeout(esi::CONNECT_TIMEOUT)
            .timeout(esi::REQUEST_TIMEOUT)
            .user_agent(format!("{}{}", defaults::USER_AGENT_PREFIX, env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            error_limited: Arc::new(AtomicBool::new(false)),
        }
    }

    #[cfg(test)]
    pub fn test_client() -> Self {
        Self::new()
    }

    /// True while a 420 backoff sleep is in progress somewhere in the process.
    pub fn is_error_limited(&self) -> bool {
        self.error_limited.load(Ordering::SeqCst)
    }

    pub async fn fetch(
        &self,
        url: &str,
        method: Method,
        headers: reqwest::header::HeaderMap,
        json_body: Option<&Value>,
        page: Option<u32>,
    ) -> Result<FetchResponse> {
        let request_url = match page {
            Some(p) => format!("{}{}page={}", url, if url.contains('?') { "&" } else { "?" }, p),
            None => url.to_string(),
        };

        let mut last_err = None;
        for attempt in 0..esi::TRANSPORT_RETRIES {
            match self
                .send_once(&request_url, url, method.clone(), headers.clone(), json_body, page)
                .await
            {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    warn!("transport error on attempt {}/{}: {}", attempt + 1, esi::TRANSPORT_RETRIES, e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.expect("loop runs at least once"))
    }

    async fn send_once(
        &self,
        request_url: &str,
        logical_url: &str,
        method: Method,
        headers: reqwest::header::HeaderMap,
        json_body: Option<&Value>,
        page: Option<u32>,
    ) -> Result<FetchResponse> {
        // Unbounded in retry count, bounded in wall time by the upstream
        // reset cadence (spec.md §4.1) — a loop rather than recursion since
        // each round trip reuses the identical request.
        loop {
            let mut builder = self.client.request(method.clone(), request_url).headers(headers.clone());
            if let Some(body) = json_body {
                builder = builder.json(body);
            }

            let response = builder.send().await?;
            let status = response.status();

            if status.as_u16() == 420 {
                let reset = response
                    .headers()
                    .get(ERROR_LIMIT_RESET_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(esi::DEFAULT_ERROR_LIMIT_RESET);

                self.error_limited.store(true, Ordering::SeqCst);
                debug!("error-limited, sleeping {}s", reset + 1);
                tokio::time::sleep(Duration::from_secs(reset + 1)).await;
                self.error_limited.store(false, Ordering::SeqCst);
                continue;
            }

            return self.finish_response(response, status, logical_url, page).await;
        }
    }

    async fn finish_response(
        &self,
        response: reqwest::Response,
        status: reqwest::StatusCode,
        logical_url: &str,
        page: Option<u32>,
    ) -> Result<FetchResponse> {
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Ok(FetchResponse {
                pages: PageInfo::None,
                url: logical_url.to_string(),
                body: FetchBody::Error(format!("Error fetching data: {} {}", status.as_u16(), body_text)),
            });
        }

        let pages = if let Some(p) = page {
            PageInfo::Page(p)
        } else {
            match response
                .headers()
                .get(PAGES_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u32>().ok())
            {
                Some(total) if total >= 2 => PageInfo::Pages((2..=total).collect()),
                _ => PageInfo::None,
            }
        };

        let body: Value = response.json().await?;

        Ok(FetchResponse {
            pages,
            url: logical_url.to_string(),
            body: FetchBody::Json(body),
        })
    }
}

impl Default for EsiClient {
    fn default() -> Self {
        Self::new()
    }
}

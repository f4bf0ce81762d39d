//! Final-document encoding and storage (spec.md §6C): base64(gzip(utf8(json))).

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::Value;

use crate::config::{keys, ttl};
use crate::error::{KnifeError, Result};
use crate::state::StateStore;

pub fn encode(document: &Value) -> Result<String> {
    let json = serde_json::to_vec(document)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    let gzipped = encoder.finish()?;
    Ok(BASE64.encode(gzipped))
}

pub fn decode(payload: &str) -> Result<Value> {
    let gzipped = BASE64
        .decode(payload)
        .map_err(|e| KnifeError::Json(format!("invalid base64 document: {}", e)))?;
    let mut decoder = GzDecoder::new(gzipped.as_slice());
    let mut json = Vec::new();
    decoder.read_to_end(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}

/// Stores the final document under `complete.<run_id>` with its 7-day TTL.
pub async fn write<S: StateStore>(store: &S, run_id: &str, document: &Value) -> Result<()> {
    let payload = encode(document)?;
    store
        .set(&format!("{}{}", keys::COMPLETE, run_id), payload, Some(ttl::COMPLETE))
        .await;
    Ok(())
}

/// Reads the final document, refreshing its TTL to a fresh 7 days (spec.md §6).
pub async fn read<S: StateStore>(store: &S, run_id: &str) -> Result<Option<Value>> {
    let key = format!("{}{}", keys::COMPLETE, run_id);
    let Some(payload) = store.get(&key).await else {
        return Ok(None);
    };
    store.set(&key, payload.clone(), Some(ttl::COMPLETE)).await;
    decode(&payload).map(Some)
}

//! Redis Store Module
//!
//! Networked cache store backed by redis. Payloads are wrapped in a JSON
//! envelope so the write timestamp survives the round trip.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::cache::{CacheEntry, CacheStore};
use crate::error::StoreError;

#[derive(Serialize)]
struct EnvelopeOut<'a> {
    stored_at: DateTime<Utc>,
    payload: &'a RawValue,
}

#[derive(Deserialize)]
struct EnvelopeIn {
    stored_at: DateTime<Utc>,
    payload: Box<RawValue>,
}

/// Redis-backed cache store.
///
/// Every call is bounded by `op_timeout`, independent of the caller's own
/// deadline.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    op_timeout: Duration,
}

impl RedisStore {
    /// Connects to redis at `url`.
    pub async fn connect(url: &str, op_timeout: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let manager = bounded(op_timeout.max(Duration::from_secs(2)), async {
            ConnectionManager::new(client).await.map_err(StoreError::from)
        })
        .await?;

        Ok(Self {
            manager,
            op_timeout,
        })
    }
}

async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| StoreError::Timeout)?
}

/// Serializes a payload into the stored envelope.
fn encode(key: &str, payload: &[u8], stored_at: DateTime<Utc>) -> Result<Vec<u8>, StoreError> {
    let encode_err = |reason: String| StoreError::Encode {
        key: key.to_string(),
        reason,
    };

    let text = std::str::from_utf8(payload).map_err(|e| encode_err(e.to_string()))?;
    let raw: &RawValue = serde_json::from_str(text).map_err(|e| encode_err(e.to_string()))?;

    serde_json::to_vec(&EnvelopeOut {
        stored_at,
        payload: raw,
    })
    .map_err(|e| encode_err(e.to_string()))
}

/// Parses a stored envelope back into an entry.
fn decode(key: &str, data: &[u8]) -> Result<CacheEntry, StoreError> {
    let envelope: EnvelopeIn = serde_json::from_slice(data).map_err(|e| StoreError::Decode {
        key: key.to_string(),
        reason: e.to_string(),
    })?;

    Ok(CacheEntry::stored_at(
        Bytes::copy_from_slice(envelope.payload.get().as_bytes()),
        envelope.stored_at,
    ))
}

#[async_trait]
impl CacheStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let mut conn = self.manager.clone();

        let data: Option<Vec<u8>> = bounded(self.op_timeout, async {
            conn.get(key).await.map_err(StoreError::from)
        })
        .await?;

        data.map(|bytes| decode(key, &bytes)).transpose()
    }

    async fn set(&self, key: &str, payload: Bytes, ttl: Duration) -> Result<(), StoreError> {
        let data = encode(key, &payload, Utc::now())?;
        let mut conn = self.manager.clone();
        let ttl_secs = ttl.as_secs().max(1);

        bounded(self.op_timeout, async {
            conn.set_ex::<_, _, ()>(key, data, ttl_secs)
                .await
                .map_err(StoreError::from)
        })
        .await
    }
}

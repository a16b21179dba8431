//! HTTP-backed snapshot store client

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::store::SnapshotStore;
use crate::types::{Result, TraceError};

/// Response body of the store's PUT endpoint.
#[derive(Debug, Deserialize)]
struct PutResponse {
    key: String,
}

/// Client for a remote content-addressable blob store.
///
/// `PUT {base}/blobs` stores the body and returns `{"key": "<sha256 hex>"}`;
/// `GET {base}/blobs/{key}` returns the raw bytes or 404.
pub struct HttpSnapshotStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSnapshotStore {
    /// Create a client for the store at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TraceError::Storage(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl SnapshotStore for HttpSnapshotStore {
    async fn put(&self, bytes: Bytes) -> Result<String> {
        let url = format!("{}/blobs", self.base_url);
        let size = bytes.len();

        let response = self
            .client
            .put(&url)
            .body(bytes)
            .send()
            .await
            .map_err(|e| {
                warn!("Snapshot store PUT failed: {}", e);
                TraceError::Storage(format!("snapshot store unreachable: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(TraceError::Storage(format!(
                "snapshot store PUT returned HTTP {}",
                response.status()
            )));
        }

        let body: PutResponse = response
            .json()
            .await
            .map_err(|e| TraceError::Storage(format!("invalid store PUT response: {}", e)))?;

        debug!(key = %body.key, size, "Blob stored");
        Ok(body.key)
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let url = format!("{}/blobs/{}", self.base_url, key);

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!("Snapshot store GET failed: {}", e);
            TraceError::Storage(format!("snapshot store unreachable: {}", e))
        })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(TraceError::NotFound(format!("blob {}", key)));
        }

        if !response.status().is_success() {
            return Err(TraceError::Storage(format!(
                "snapshot store GET returned HTTP {}",
                response.status()
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| TraceError::Storage(format!("failed to read blob body: {}", e)))
    }
}

//! In-memory snapshot store
//!
//! Content-addressed by sha256 hex, used in dev mode and unit tests.

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::store::SnapshotStore;
use crate::types::{Result, TraceError};

#[derive(Default)]
pub struct MemorySnapshotStore {
    blobs: RwLock<HashMap<String, Bytes>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn put(&self, bytes: Bytes) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let key = hex::encode(hasher.finalize());

        // Content-addressed: re-putting identical bytes is a no-op
        self.blobs.write().await.entry(key.clone()).or_insert(bytes);
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        self.blobs
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| TraceError::NotFound(format!("blob {}", key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_is_content_addressed_and_idempotent() {
        let store = MemorySnapshotStore::new();
        let k1 = store.put(Bytes::from_static(b"snapshot")).await.unwrap();
        let k2 = store.put(Bytes::from_static(b"snapshot")).await.unwrap();
        assert_eq!(k1, k2);
        assert_eq!(k1.len(), 64);
    }

    #[tokio::test]
    async fn test_get_round_trip() {
        let store = MemorySnapshotStore::new();
        let key = store.put(Bytes::from_static(b"blob")).await.unwrap();
        let got = store.get(&key).await.unwrap();
        assert_eq!(got, Bytes::from_static(b"blob"));
    }

    #[tokio::test]
    async fn test_get_unknown_key_is_not_found() {
        let store = MemorySnapshotStore::new();
        let err = store.get("deadbeef").await.unwrap_err();
        assert!(err.is_not_found());
    }
}

//! Content-addressable snapshot store
//!
//! The store holds opaque byte blobs keyed by their sha256 hex digest. The
//! core only ever calls `put` and `get`; availability failures surface
//! immediately, there is no retry policy in-core.

mod http;
mod memory;

pub use http::HttpSnapshotStore;
pub use memory::MemorySnapshotStore;

use async_trait::async_trait;
use bytes::Bytes;

use crate::types::Result;

/// PUT/GET contract against the external content-addressable store.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Store a blob and return its content-address key (sha256 hex).
    /// Idempotent: storing the same bytes twice returns the same key.
    async fn put(&self, bytes: Bytes) -> Result<String>;

    /// Retrieve a blob by key; `NotFound` if the store has no such blob.
    async fn get(&self, key: &str) -> Result<Bytes>;
}

//! Repository contracts
//!
//! The relational persistence layer is an external collaborator; the domain
//! services consume it through these operation contracts only. Two
//! implementations exist: MongoDB-backed (production) and in-memory (dev mode
//! and unit tests), mirroring the optional-database startup of the gateway
//! this crate is modeled on.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use std::sync::Arc;

use crate::db::schemas::{
    BatchDoc, CertificateOwnerDoc, CertificationDoc, ProducerDoc, PulpDoc, UserDoc,
};
use crate::types::Result;

/// Batch storage operations.
#[async_trait]
pub trait BatchRepository: Send + Sync {
    /// Insert a new batch; `Conflict` if the code is already taken.
    async fn insert(&self, batch: BatchDoc) -> Result<()>;

    /// Fetch a batch by its unique code.
    async fn find_by_code(&self, code: &str) -> Result<Option<BatchDoc>>;

    /// Replace the stored batch (keyed by code) with the given state.
    async fn replace(&self, batch: &BatchDoc) -> Result<()>;

    /// All live batches.
    async fn list_all(&self) -> Result<Vec<BatchDoc>>;
}

/// Pulp storage operations.
#[async_trait]
pub trait PulpRepository: Send + Sync {
    /// Insert a new pulp; `Conflict` if the code is already taken.
    async fn insert(&self, pulp: PulpDoc) -> Result<()>;

    /// Fetch a pulp by its unique code.
    async fn find_by_code(&self, code: &str) -> Result<Option<PulpDoc>>;

    /// Pulps owned by one producer.
    async fn list_by_producer(&self, producer_code: &str) -> Result<Vec<PulpDoc>>;

    /// All live pulps.
    async fn list_all(&self) -> Result<Vec<PulpDoc>>;
}

/// Producer storage operations.
#[async_trait]
pub trait ProducerRepository: Send + Sync {
    /// Insert a new producer; `Conflict` if the code is already taken.
    async fn insert(&self, producer: ProducerDoc) -> Result<()>;

    /// Fetch a producer by its unique code.
    async fn find_by_code(&self, code: &str) -> Result<Option<ProducerDoc>>;

    /// Roster filtered by department.
    async fn list_by_department(&self, department: &str) -> Result<Vec<ProducerDoc>>;

    /// Roster filtered by association.
    async fn list_by_association(&self, association: &str) -> Result<Vec<ProducerDoc>>;

    /// All live producers.
    async fn list_all(&self) -> Result<Vec<ProducerDoc>>;
}

/// Certification storage operations.
#[async_trait]
pub trait CertificationRepository: Send + Sync {
    /// Insert a freshly signed certification.
    ///
    /// `Conflict` on duplicate `key` or `signed_data_fingerprint`; the
    /// uniqueness constraint is the arbiter under concurrent duplicate signs.
    async fn insert(&self, cert: CertificationDoc) -> Result<()>;

    /// Fetch by the unique link-blob key.
    async fn find_by_key(&self, key: &str) -> Result<Option<CertificationDoc>>;

    /// Fetch by the unique signature blob.
    async fn find_by_signed_fingerprint(
        &self,
        signed_data_fingerprint: &str,
    ) -> Result<Option<CertificationDoc>>;

    /// Latest certification recorded for a batch, if any.
    async fn latest_for_batch(&self, batch_code: &str) -> Result<Option<CertificationDoc>>;

    /// Record the minting fields on a signed certification, exactly once.
    async fn set_mint_fields(
        &self,
        key: &str,
        minter_wallet: &str,
        buyer_wallet: &str,
        token_id: &str,
    ) -> Result<()>;
}

/// Certificate ownership claims.
#[async_trait]
pub trait CertificateOwnerRepository: Send + Sync {
    /// Record an ownership claim; duplicate `(wallet, key)` pairs conflict.
    async fn insert(&self, owner: CertificateOwnerDoc) -> Result<()>;

    /// Membership check used by buyer-role metadata reads.
    async fn exists(&self, buyer_wallet: &str, certification_key: &str) -> Result<bool>;
}

/// Wallet -> role lookups.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_wallet(&self, wallet: &str) -> Result<Option<UserDoc>>;
}

/// Bundle of repository handles the services are wired with.
#[derive(Clone)]
pub struct Repositories {
    pub batches: Arc<dyn BatchRepository>,
    pub pulps: Arc<dyn PulpRepository>,
    pub producers: Arc<dyn ProducerRepository>,
    pub certifications: Arc<dyn CertificationRepository>,
    pub owners: Arc<dyn CertificateOwnerRepository>,
    pub users: Arc<dyn UserRepository>,
}

//! MongoDB-backed repositories
//!
//! Thin adapters from the repository contracts onto the typed collection
//! wrapper. All filters are by the domain's natural keys; `_id` never leaves
//! this module.

use async_trait::async_trait;
use bson::doc;

use crate::db::schemas::{
    BatchDoc, CertificateOwnerDoc, CertificationDoc, ProducerDoc, PulpDoc, UserDoc,
    BATCH_COLLECTION, CERTIFICATE_OWNER_COLLECTION, CERTIFICATION_COLLECTION,
    PRODUCER_COLLECTION, PULP_COLLECTION, USER_COLLECTION,
};
use crate::db::{MongoClient, MongoCollection};
use crate::repo::{
    BatchRepository, CertificateOwnerRepository, CertificationRepository, ProducerRepository,
    PulpRepository, Repositories, UserRepository,
};
use crate::types::{Result, TraceError};

use std::sync::Arc;

/// Build the full repository bundle from one MongoDB client.
pub async fn mongo_repositories(client: &MongoClient) -> Result<Repositories> {
    Ok(Repositories {
        batches: Arc::new(MongoBatchRepo {
            coll: client.collection(BATCH_COLLECTION).await?,
        }),
        pulps: Arc::new(MongoPulpRepo {
            coll: client.collection(PULP_COLLECTION).await?,
        }),
        producers: Arc::new(MongoProducerRepo {
            coll: client.collection(PRODUCER_COLLECTION).await?,
        }),
        certifications: Arc::new(MongoCertificationRepo {
            coll: client.collection(CERTIFICATION_COLLECTION).await?,
        }),
        owners: Arc::new(MongoOwnerRepo {
            coll: client.collection(CERTIFICATE_OWNER_COLLECTION).await?,
        }),
        users: Arc::new(MongoUserRepo {
            coll: client.collection(USER_COLLECTION).await?,
        }),
    })
}

pub struct MongoBatchRepo {
    coll: MongoCollection<BatchDoc>,
}

#[async_trait]
impl BatchRepository for MongoBatchRepo {
    async fn insert(&self, batch: BatchDoc) -> Result<()> {
        self.coll.insert_one(batch).await.map(|_| ())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<BatchDoc>> {
        self.coll.find_one(doc! { "code": code }).await
    }

    async fn replace(&self, batch: &BatchDoc) -> Result<()> {
        let result = self
            .coll
            .replace_one(doc! { "code": &batch.code }, batch.clone())
            .await?;
        if result.matched_count == 0 {
            return Err(TraceError::NotFound(format!("batch {}", batch.code)));
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<BatchDoc>> {
        self.coll.find_many(doc! {}).await
    }
}

pub struct MongoPulpRepo {
    coll: MongoCollection<PulpDoc>,
}

#[async_trait]
impl PulpRepository for MongoPulpRepo {
    async fn insert(&self, pulp: PulpDoc) -> Result<()> {
        self.coll.insert_one(pulp).await.map(|_| ())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<PulpDoc>> {
        self.coll.find_one(doc! { "code": code }).await
    }

    async fn list_by_producer(&self, producer_code: &str) -> Result<Vec<PulpDoc>> {
        self.coll
            .find_many(doc! { "producer_code": producer_code })
            .await
    }

    async fn list_all(&self) -> Result<Vec<PulpDoc>> {
        self.coll.find_many(doc! {}).await
    }
}

pub struct MongoProducerRepo {
    coll: MongoCollection<ProducerDoc>,
}

#[async_trait]
impl ProducerRepository for MongoProducerRepo {
    async fn insert(&self, producer: ProducerDoc) -> Result<()> {
        self.coll.insert_one(producer).await.map(|_| ())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<ProducerDoc>> {
        self.coll.find_one(doc! { "code": code }).await
    }

    async fn list_by_department(&self, department: &str) -> Result<Vec<ProducerDoc>> {
        self.coll.find_many(doc! { "department": department }).await
    }

    async fn list_by_association(&self, association: &str) -> Result<Vec<ProducerDoc>> {
        self.coll
            .find_many(doc! { "association": association })
            .await
    }

    async fn list_all(&self) -> Result<Vec<ProducerDoc>> {
        self.coll.find_many(doc! {}).await
    }
}

pub struct MongoCertificationRepo {
    coll: MongoCollection<CertificationDoc>,
}

#[async_trait]
impl CertificationRepository for MongoCertificationRepo {
    async fn insert(&self, cert: CertificationDoc) -> Result<()> {
        self.coll.insert_one(cert).await.map(|_| ())
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<CertificationDoc>> {
        self.coll.find_one(doc! { "key": key }).await
    }

    async fn find_by_signed_fingerprint(
        &self,
        signed_data_fingerprint: &str,
    ) -> Result<Option<CertificationDoc>> {
        self.coll
            .find_one(doc! { "signed_data_fingerprint": signed_data_fingerprint })
            .await
    }

    async fn latest_for_batch(&self, batch_code: &str) -> Result<Option<CertificationDoc>> {
        self.coll
            .inner()
            .find_one(doc! {
                "batch_code": batch_code,
                "metadata.is_deleted": { "$ne": true },
            })
            .sort(doc! { "metadata.created_at": -1 })
            .await
            .map_err(|e| TraceError::Database(format!("Find failed: {}", e)))
    }

    async fn set_mint_fields(
        &self,
        key: &str,
        minter_wallet: &str,
        buyer_wallet: &str,
        token_id: &str,
    ) -> Result<()> {
        // Filter on token_id being unset: the minting fields are written at
        // most once even under concurrent mint calls.
        let result = self
            .coll
            .set_fields(
                doc! { "key": key, "token_id": { "$exists": false } },
                doc! {
                    "minter_wallet": minter_wallet,
                    "buyer_wallet": buyer_wallet,
                    "token_id": token_id,
                },
            )
            .await?;

        if result.matched_count == 0 {
            return Err(TraceError::Conflict(format!(
                "certification {} already minted",
                key
            )));
        }
        Ok(())
    }
}

pub struct MongoOwnerRepo {
    coll: MongoCollection<CertificateOwnerDoc>,
}

#[async_trait]
impl CertificateOwnerRepository for MongoOwnerRepo {
    async fn insert(&self, owner: CertificateOwnerDoc) -> Result<()> {
        self.coll.insert_one(owner).await.map(|_| ())
    }

    async fn exists(&self, buyer_wallet: &str, certification_key: &str) -> Result<bool> {
        let found = self
            .coll
            .find_one(doc! {
                "buyer_wallet": buyer_wallet,
                "certification_key": certification_key,
            })
            .await?;
        Ok(found.is_some())
    }
}

pub struct MongoUserRepo {
    coll: MongoCollection<UserDoc>,
}

#[async_trait]
impl UserRepository for MongoUserRepo {
    async fn find_by_wallet(&self, wallet: &str) -> Result<Option<UserDoc>> {
        self.coll.find_one(doc! { "wallet": wallet }).await
    }
}

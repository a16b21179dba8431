//! In-memory repositories
//!
//! Used in dev mode when MongoDB is unavailable, and by the service unit
//! tests. Uniqueness constraints are enforced the same way the database
//! indexes would, so the idempotency semantics can be exercised without a
//! running store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::db::schemas::{
    BatchDoc, CertificateOwnerDoc, CertificationDoc, ProducerDoc, PulpDoc, UserDoc,
};
use crate::repo::{
    BatchRepository, CertificateOwnerRepository, CertificationRepository, ProducerRepository,
    PulpRepository, Repositories, UserRepository,
};
use crate::types::{Result, TraceError};

/// Build a fully in-memory repository bundle.
pub fn memory_repositories() -> Repositories {
    Repositories {
        batches: Arc::new(MemoryBatchRepo::default()),
        pulps: Arc::new(MemoryPulpRepo::default()),
        producers: Arc::new(MemoryProducerRepo::default()),
        certifications: Arc::new(MemoryCertificationRepo::default()),
        owners: Arc::new(MemoryOwnerRepo::default()),
        users: Arc::new(MemoryUserRepo::default()),
    }
}

#[derive(Default)]
pub struct MemoryBatchRepo {
    by_code: RwLock<HashMap<String, BatchDoc>>,
}

#[async_trait]
impl BatchRepository for MemoryBatchRepo {
    async fn insert(&self, batch: BatchDoc) -> Result<()> {
        let mut map = self.by_code.write().await;
        if map.contains_key(&batch.code) {
            return Err(TraceError::Conflict(format!(
                "batch {} already exists",
                batch.code
            )));
        }
        map.insert(batch.code.clone(), batch);
        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<BatchDoc>> {
        Ok(self.by_code.read().await.get(code).cloned())
    }

    async fn replace(&self, batch: &BatchDoc) -> Result<()> {
        let mut map = self.by_code.write().await;
        match map.get_mut(&batch.code) {
            Some(slot) => {
                let mut updated = batch.clone();
                updated.metadata.touch();
                *slot = updated;
                Ok(())
            }
            None => Err(TraceError::NotFound(format!("batch {}", batch.code))),
        }
    }

    async fn list_all(&self) -> Result<Vec<BatchDoc>> {
        Ok(self.by_code.read().await.values().cloned().collect())
    }
}

#[derive(Default)]
pub struct MemoryPulpRepo {
    by_code: RwLock<HashMap<String, PulpDoc>>,
}

#[async_trait]
impl PulpRepository for MemoryPulpRepo {
    async fn insert(&self, pulp: PulpDoc) -> Result<()> {
        let mut map = self.by_code.write().await;
        if map.contains_key(&pulp.code) {
            return Err(TraceError::Conflict(format!(
                "pulp {} already exists",
                pulp.code
            )));
        }
        map.insert(pulp.code.clone(), pulp);
        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<PulpDoc>> {
        Ok(self.by_code.read().await.get(code).cloned())
    }

    async fn list_by_producer(&self, producer_code: &str) -> Result<Vec<PulpDoc>> {
        Ok(self
            .by_code
            .read()
            .await
            .values()
            .filter(|p| p.producer_code == producer_code)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<PulpDoc>> {
        Ok(self.by_code.read().await.values().cloned().collect())
    }
}

#[derive(Default)]
pub struct MemoryProducerRepo {
    by_code: RwLock<HashMap<String, ProducerDoc>>,
}

#[async_trait]
impl ProducerRepository for MemoryProducerRepo {
    async fn insert(&self, producer: ProducerDoc) -> Result<()> {
        let mut map = self.by_code.write().await;
        if map.contains_key(&producer.code) {
            return Err(TraceError::Conflict(format!(
                "producer {} already exists",
                producer.code
            )));
        }
        map.insert(producer.code.clone(), producer);
        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<ProducerDoc>> {
        Ok(self.by_code.read().await.get(code).cloned())
    }

    async fn list_by_department(&self, department: &str) -> Result<Vec<ProducerDoc>> {
        Ok(self
            .by_code
            .read()
            .await
            .values()
            .filter(|p| p.department == department)
            .cloned()
            .collect())
    }

    async fn list_by_association(&self, association: &str) -> Result<Vec<ProducerDoc>> {
        Ok(self
            .by_code
            .read()
            .await
            .values()
            .filter(|p| p.association == association)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<ProducerDoc>> {
        Ok(self.by_code.read().await.values().cloned().collect())
    }
}

#[derive(Default)]
pub struct MemoryCertificationRepo {
    // Insertion order retained for latest_for_batch
    certs: RwLock<Vec<CertificationDoc>>,
}

#[async_trait]
impl CertificationRepository for MemoryCertificationRepo {
    async fn insert(&self, cert: CertificationDoc) -> Result<()> {
        let mut certs = self.certs.write().await;
        if certs.iter().any(|c| c.key == cert.key) {
            return Err(TraceError::Conflict(format!(
                "certification key {} already exists",
                cert.key
            )));
        }
        if certs
            .iter()
            .any(|c| c.signed_data_fingerprint == cert.signed_data_fingerprint)
        {
            return Err(TraceError::Conflict(
                "signed fingerprint already recorded".to_string(),
            ));
        }
        certs.push(cert);
        Ok(())
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<CertificationDoc>> {
        Ok(self
            .certs
            .read()
            .await
            .iter()
            .find(|c| c.key == key)
            .cloned())
    }

    async fn find_by_signed_fingerprint(
        &self,
        signed_data_fingerprint: &str,
    ) -> Result<Option<CertificationDoc>> {
        Ok(self
            .certs
            .read()
            .await
            .iter()
            .find(|c| c.signed_data_fingerprint == signed_data_fingerprint)
            .cloned())
    }

    async fn latest_for_batch(&self, batch_code: &str) -> Result<Option<CertificationDoc>> {
        Ok(self
            .certs
            .read()
            .await
            .iter()
            .rev()
            .find(|c| c.batch_code == batch_code)
            .cloned())
    }

    async fn set_mint_fields(
        &self,
        key: &str,
        minter_wallet: &str,
        buyer_wallet: &str,
        token_id: &str,
    ) -> Result<()> {
        let mut certs = self.certs.write().await;
        let cert = certs
            .iter_mut()
            .find(|c| c.key == key)
            .ok_or_else(|| TraceError::NotFound(format!("certification {}", key)))?;

        if cert.is_minted() {
            return Err(TraceError::Conflict(format!(
                "certification {} already minted",
                key
            )));
        }

        cert.minter_wallet = Some(minter_wallet.to_string());
        cert.buyer_wallet = Some(buyer_wallet.to_string());
        cert.token_id = Some(token_id.to_string());
        cert.metadata.touch();
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryOwnerRepo {
    owners: RwLock<Vec<CertificateOwnerDoc>>,
}

#[async_trait]
impl CertificateOwnerRepository for MemoryOwnerRepo {
    async fn insert(&self, owner: CertificateOwnerDoc) -> Result<()> {
        let mut owners = self.owners.write().await;
        if owners.iter().any(|o| {
            o.buyer_wallet == owner.buyer_wallet && o.certification_key == owner.certification_key
        }) {
            return Err(TraceError::Conflict(format!(
                "ownership claim for {} already recorded",
                owner.certification_key
            )));
        }
        owners.push(owner);
        Ok(())
    }

    async fn exists(&self, buyer_wallet: &str, certification_key: &str) -> Result<bool> {
        Ok(self.owners.read().await.iter().any(|o| {
            o.buyer_wallet == buyer_wallet && o.certification_key == certification_key
        }))
    }
}

#[derive(Default)]
pub struct MemoryUserRepo {
    by_wallet: RwLock<HashMap<String, UserDoc>>,
}

impl MemoryUserRepo {
    /// Seed a wallet -> role mapping (dev tooling and tests).
    pub async fn seed(&self, user: UserDoc) {
        self.by_wallet
            .write()
            .await
            .insert(user.wallet.clone(), user);
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepo {
    async fn find_by_wallet(&self, wallet: &str) -> Result<Option<UserDoc>> {
        Ok(self.by_wallet.read().await.get(wallet).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_batch_insert_conflict() {
        let repo = MemoryBatchRepo::default();
        repo.insert(BatchDoc::new("B-001".into(), vec![])).await.unwrap();
        let err = repo
            .insert(BatchDoc::new("B-001".into(), vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, TraceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_replace_missing_batch_is_not_found() {
        let repo = MemoryBatchRepo::default();
        let err = repo
            .replace(&BatchDoc::new("B-404".into(), vec![]))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_pulps_listed_by_owning_producer() {
        let repo = MemoryPulpRepo::default();
        repo.insert(PulpDoc::new("PL-01".into(), "P-01".into())).await.unwrap();
        repo.insert(PulpDoc::new("PL-02".into(), "P-02".into())).await.unwrap();
        repo.insert(PulpDoc::new("PL-03".into(), "P-01".into())).await.unwrap();

        let mut codes: Vec<String> = repo
            .list_by_producer("P-01")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.code)
            .collect();
        codes.sort();
        assert_eq!(codes, ["PL-01", "PL-03"]);
        assert!(repo.list_by_producer("P-404").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_producers_listed_by_department() {
        let repo = MemoryProducerRepo::default();
        repo.insert(ProducerDoc::new(
            "P-01".into(),
            "Ana".into(),
            "Meta".into(),
            "AsoCampo".into(),
        ))
        .await
        .unwrap();
        repo.insert(ProducerDoc::new(
            "P-02".into(),
            "Luis".into(),
            "Huila".into(),
            "AsoRio".into(),
        ))
        .await
        .unwrap();

        let listed = repo.list_by_department("Meta").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].code, "P-01");
    }

    #[tokio::test]
    async fn test_latest_for_batch_returns_most_recent() {
        let repo = MemoryCertificationRepo::default();
        let date = chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        for i in 0..3 {
            repo.insert(CertificationDoc::new(
                "B-001".into(),
                date,
                format!("fp-{}", i),
                format!("sig-{}", i),
                "wallet".into(),
                format!("key-{}", i),
            ))
            .await
            .unwrap();
        }
        let latest = repo.latest_for_batch("B-001").await.unwrap().unwrap();
        assert_eq!(latest.key, "key-2");
    }

    #[tokio::test]
    async fn test_mint_fields_set_exactly_once() {
        let repo = MemoryCertificationRepo::default();
        let date = chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        repo.insert(CertificationDoc::new(
            "B-001".into(),
            date,
            "fp".into(),
            "sig".into(),
            "wallet".into(),
            "key-1".into(),
        ))
        .await
        .unwrap();

        repo.set_mint_fields("key-1", "minter", "buyer", "42").await.unwrap();
        let err = repo
            .set_mint_fields("key-1", "minter", "buyer", "43")
            .await
            .unwrap_err();
        assert!(matches!(err, TraceError::Conflict(_)));
    }
}

//! Certification workflow service
//!
//! Three-step protocol: snapshot -> sign -> mint. The snapshot blob and the
//! signature-link blob both live in the content-addressable store; the
//! certification record binds a batch to the signed fingerprint and is
//! immutable once signed except for the minting fields.

use bytes::Bytes;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{Caller, Role};
use crate::certification::state::CertificationState;
use crate::db::schemas::{CertificateOwnerDoc, CertificationDoc};
use crate::fingerprint::{fingerprint, CanonicalSnapshot, Fingerprint};
use crate::ledger::PhaseLedger;
use crate::repo::{CertificateOwnerRepository, CertificationRepository};
use crate::store::SnapshotStore;
use crate::types::{Result, TraceError};
use crate::verifier::SignatureVerifier;

/// Link blob stored at the certification key: binds the snapshot fingerprint
/// to the signature over it. Field names are part of the stored format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureLink {
    #[serde(rename = "fingerprintHash")]
    pub fingerprint_hash: String,
    #[serde(rename = "hasSignature")]
    pub has_signature: String,
}

/// Input to the sign step.
#[derive(Debug, Clone, Deserialize)]
pub struct SignRequest {
    pub data_fingerprint: String,
    pub signed_data_fingerprint: String,
    pub date_signed: NaiveDate,
}

/// Input to the mint step.
#[derive(Debug, Clone, Deserialize)]
pub struct MintRequest {
    pub certificate_key: String,
    pub minter_wallet: String,
    pub buyer_wallet: String,
    pub token_id: String,
}

/// Service implementing the certification state machine.
#[derive(Clone)]
pub struct CertificationService {
    ledger: PhaseLedger,
    certifications: Arc<dyn CertificationRepository>,
    owners: Arc<dyn CertificateOwnerRepository>,
    store: Arc<dyn SnapshotStore>,
    verifier: Arc<dyn SignatureVerifier>,
}

impl CertificationService {
    pub fn new(
        ledger: PhaseLedger,
        certifications: Arc<dyn CertificationRepository>,
        owners: Arc<dyn CertificateOwnerRepository>,
        store: Arc<dyn SnapshotStore>,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Self {
        Self {
            ledger,
            certifications,
            owners,
            store,
            verifier,
        }
    }

    /// Step 1: take a canonical snapshot of the batch and store it.
    ///
    /// Requires the batch to have a sale phase; a batch cannot be certified
    /// before sale. Returns the fingerprint as the provisional handle -- no
    /// certification record is created here.
    pub async fn snapshot(&self, batch_code: &str) -> Result<Fingerprint> {
        let view = self.ledger.get_batch(batch_code).await?;

        if !view.batch.is_sold() {
            return Err(TraceError::BatchNotSold(batch_code.to_string()));
        }

        let snapshot = CanonicalSnapshot::build(&view.batch, &view.pulps, &view.producers);
        let bytes = snapshot.to_bytes()?;
        let fp = fingerprint(&bytes);

        let key = self.store.put(Bytes::from(bytes)).await?;
        if key != fp.fingerprint {
            // The store is content-addressed by the same digest; a mismatch
            // means it is not the store we think it is.
            warn!(key = %key, fingerprint = %fp.fingerprint, "Store key differs from computed fingerprint");
        }

        info!(batch = %batch_code, fingerprint = %fp.fingerprint, "Snapshot taken");
        Ok(fp)
    }

    /// Step 2: record a signature over a previously stored fingerprint.
    ///
    /// Idempotent per `signed_data_fingerprint`: re-submitting the same
    /// signature returns the existing certification unchanged. The signature
    /// must recover to the caller's wallet.
    pub async fn sign(&self, caller: &Caller, request: SignRequest) -> Result<CertificationDoc> {
        // The fingerprint must name a stored snapshot
        let snapshot_bytes = self
            .store
            .get(&request.data_fingerprint)
            .await
            .map_err(|e| match e {
                TraceError::NotFound(_) => TraceError::NotFound(format!(
                    "no snapshot stored for fingerprint {}",
                    request.data_fingerprint
                )),
                other => other,
            })?;

        // Idempotent re-sign: same signature, same certification, no new row
        if let Some(existing) = self
            .certifications
            .find_by_signed_fingerprint(&request.signed_data_fingerprint)
            .await?
        {
            info!(key = %existing.key, "Certification already exists for this signature");
            return Ok(existing);
        }

        let signer = self
            .verifier
            .recover_signer(
                request.data_fingerprint.as_bytes(),
                &request.signed_data_fingerprint,
            )
            .await?;

        if signer != caller.address {
            return Err(TraceError::Unauthorized(
                "you did not sign for this certification".into(),
            ));
        }

        let snapshot = CanonicalSnapshot::from_bytes(&snapshot_bytes)?;

        let link = SignatureLink {
            fingerprint_hash: request.data_fingerprint.clone(),
            has_signature: request.signed_data_fingerprint.clone(),
        };
        let link_bytes = serde_json::to_vec(&link)
            .map_err(|e| TraceError::Storage(format!("link serialization failed: {}", e)))?;
        let key = self.store.put(Bytes::from(link_bytes)).await?;

        let cert = CertificationDoc::new(
            snapshot.batch_code.clone(),
            request.date_signed,
            request.data_fingerprint,
            request.signed_data_fingerprint.clone(),
            signer,
            key.clone(),
        );

        match self.certifications.insert(cert.clone()).await {
            Ok(()) => {
                info!(batch = %cert.batch_code, key = %key, "Certification signed");
                Ok(cert)
            }
            // A concurrent duplicate sign lost the race on the uniqueness
            // constraint; normalize to the idempotent already-exists response
            Err(TraceError::Conflict(_)) => self
                .certifications
                .find_by_signed_fingerprint(&request.signed_data_fingerprint)
                .await?
                .ok_or_else(|| {
                    TraceError::Database("certification vanished after conflict".into())
                }),
            Err(e) => Err(e),
        }
    }

    /// Step 3: record that the certification was minted externally.
    ///
    /// Minting fields are written exactly once; a second mint for the same
    /// key conflicts. The ownership claim is a separate write after the mint
    /// fields, so a retry carrying the recorded mint data finishes a claim
    /// that was lost to a failure between the two writes instead of
    /// conflicting.
    pub async fn mint(&self, request: MintRequest) -> Result<CertificationDoc> {
        let cert = self
            .certifications
            .find_by_key(&request.certificate_key)
            .await?
            .ok_or_else(|| {
                TraceError::NotFound(format!("certification {}", request.certificate_key))
            })?;

        if cert.is_minted() {
            let claim_missing = !self
                .owners
                .exists(&request.buyer_wallet, &request.certificate_key)
                .await?;
            if Self::matches_recorded_mint(&cert, &request) && claim_missing {
                self.insert_owner_claim(&request).await?;
                info!(key = %request.certificate_key, "Ownership claim recovered on mint retry");
                return Ok(cert);
            }
            return Err(TraceError::Conflict(format!(
                "certification {} already minted",
                request.certificate_key
            )));
        }

        // Typed transition check before touching storage
        CertificationState::of(Some(&cert), true).mint()?;

        self.certifications
            .set_mint_fields(
                &request.certificate_key,
                &request.minter_wallet,
                &request.buyer_wallet,
                &request.token_id,
            )
            .await?;

        self.insert_owner_claim(&request).await?;

        info!(key = %request.certificate_key, token = %request.token_id, "Mint recorded");

        self.certifications
            .find_by_key(&request.certificate_key)
            .await?
            .ok_or_else(|| TraceError::Database("certification vanished after mint".into()))
    }

    fn matches_recorded_mint(cert: &CertificationDoc, request: &MintRequest) -> bool {
        cert.token_id.as_deref() == Some(request.token_id.as_str())
            && cert.minter_wallet.as_deref() == Some(request.minter_wallet.as_str())
            && cert.buyer_wallet.as_deref() == Some(request.buyer_wallet.as_str())
    }

    /// A concurrent duplicate claim for the same (wallet, key) pair is the
    /// same claim; the uniqueness conflict collapses to success.
    async fn insert_owner_claim(&self, request: &MintRequest) -> Result<()> {
        match self
            .owners
            .insert(CertificateOwnerDoc::new(
                request.buyer_wallet.clone(),
                request.certificate_key.clone(),
                request.minter_wallet.clone(),
                request.token_id.clone(),
            ))
            .await
        {
            Ok(()) | Err(TraceError::Conflict(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Resolve the certified snapshot for display.
    ///
    /// Buyer-role callers must own the certificate; everyone else reads
    /// freely (role gating above this is the boundary's business).
    pub async fn metadata(&self, caller: &Caller, batch_code: &str) -> Result<CanonicalSnapshot> {
        let cert = self
            .certifications
            .latest_for_batch(batch_code)
            .await?
            .ok_or_else(|| {
                TraceError::NotFound(format!("certification for batch {}", batch_code))
            })?;

        if caller.role == Role::Buyer {
            let owned = self.owners.exists(&caller.address, &cert.key).await?;
            if !owned {
                return Err(TraceError::Forbidden("not owned".into()));
            }
        }

        let link_bytes = self.store.get(&cert.key).await?;
        let link: SignatureLink = serde_json::from_slice(&link_bytes)
            .map_err(|e| TraceError::Storage(format!("link decode failed: {}", e)))?;

        let snapshot_bytes = self.store.get(&link.fingerprint_hash).await?;
        CanonicalSnapshot::from_bytes(&snapshot_bytes)
    }

    /// Current lifecycle state of a batch's certification.
    ///
    /// `fingerprint` is the caller-held snapshot handle; without one, a
    /// taken-but-unsigned snapshot is indistinguishable from no certificate.
    pub async fn state_of(
        &self,
        batch_code: &str,
        fingerprint: Option<&str>,
    ) -> Result<CertificationState> {
        let cert = self.certifications.latest_for_batch(batch_code).await?;

        let snapshot_taken = match fingerprint {
            Some(fp) if cert.is_none() => match self.store.get(fp).await {
                Ok(_) => true,
                Err(e) if e.is_not_found() => false,
                Err(e) => return Err(e),
            },
            _ => false,
        };

        Ok(CertificationState::of(cert.as_ref(), snapshot_taken))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::phase::{PhasePatch, SalePatch};
    use crate::repo::memory::{
        MemoryBatchRepo, MemoryCertificationRepo, MemoryOwnerRepo, MemoryProducerRepo,
        MemoryPulpRepo,
    };
    use crate::store::MemorySnapshotStore;
    use crate::verifier::{sign_message, wallet_address, Ed25519Verifier};
    use async_trait::async_trait;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Fixture {
        ledger: PhaseLedger,
        service: CertificationService,
        certifications: Arc<MemoryCertificationRepo>,
        key: SigningKey,
        caller: Caller,
    }

    fn fixture() -> Fixture {
        fixture_with_owners(Arc::new(MemoryOwnerRepo::default()))
    }

    fn fixture_with_owners(owners: Arc<dyn CertificateOwnerRepository>) -> Fixture {
        let batches = Arc::new(MemoryBatchRepo::default());
        let pulps = Arc::new(MemoryPulpRepo::default());
        let producers = Arc::new(MemoryProducerRepo::default());
        let certifications = Arc::new(MemoryCertificationRepo::default());
        let store = Arc::new(MemorySnapshotStore::new());

        let ledger = PhaseLedger::new(batches, pulps, producers);
        let service = CertificationService::new(
            ledger.clone(),
            certifications.clone(),
            owners,
            store,
            Arc::new(Ed25519Verifier::new()),
        );

        let key = SigningKey::generate(&mut OsRng);
        let caller = Caller::new(wallet_address(&key.verifying_key()), Role::Producer);

        Fixture {
            ledger,
            service,
            certifications,
            key,
            caller,
        }
    }

    async fn sold_batch(fx: &Fixture, code: &str) {
        fx.ledger.create_batch(code, vec![]).await.unwrap();
        fx.ledger
            .update_phase(
                code,
                &PhasePatch::Sale(SalePatch {
                    buyer: Some("ChocoNorte".into()),
                    price_per_kg_usd: Some(dec!(4.20)),
                    total_weight_kg: Some(dec!(300)),
                    ..Default::default()
                }),
            )
            .await
            .unwrap();
    }

    fn sign_request(fx: &Fixture, fp: &Fingerprint) -> SignRequest {
        SignRequest {
            data_fingerprint: fp.fingerprint.clone(),
            signed_data_fingerprint: sign_message(&fx.key, fp.fingerprint.as_bytes()),
            date_signed: chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_snapshot_requires_sale_phase() {
        let fx = fixture();
        fx.ledger.create_batch("B-001", vec![]).await.unwrap();

        let err = fx.service.snapshot("B-001").await.unwrap_err();
        assert!(matches!(err, TraceError::BatchNotSold(ref code) if code == "B-001"));

        // After patching a sale phase, snapshot succeeds with a sha256 hex
        fx.ledger
            .update_phase("B-001", &PhasePatch::Sale(SalePatch::default()))
            .await
            .unwrap();
        let fp = fx.service.snapshot("B-001").await.unwrap();
        assert_eq!(fp.algorithm, "sha256");
        assert_eq!(fp.fingerprint.len(), 64);
        assert!(fp.fingerprint.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_sign_happy_path_then_idempotent_resign() {
        let fx = fixture();
        sold_batch(&fx, "B-001").await;
        let fp = fx.service.snapshot("B-001").await.unwrap();

        let request = sign_request(&fx, &fp);
        let first = fx.service.sign(&fx.caller, request.clone()).await.unwrap();
        assert_eq!(first.batch_code, "B-001");
        assert_eq!(first.signer_wallet, fx.caller.address);

        // Same signature twice: same key, still exactly one row
        let second = fx.service.sign(&fx.caller, request).await.unwrap();
        assert_eq!(second.key, first.key);
        let row = fx
            .certifications
            .find_by_signed_fingerprint(&first.signed_data_fingerprint)
            .await
            .unwrap();
        assert!(row.is_some());
    }

    #[tokio::test]
    async fn test_sign_unknown_fingerprint_is_not_found() {
        let fx = fixture();
        let request = SignRequest {
            data_fingerprint: "0".repeat(64),
            signed_data_fingerprint: sign_message(&fx.key, "0".repeat(64).as_bytes()),
            date_signed: chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        };
        let err = fx.service.sign(&fx.caller, request).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_sign_by_other_wallet_is_unauthorized() {
        let fx = fixture();
        sold_batch(&fx, "B-001").await;
        let fp = fx.service.snapshot("B-001").await.unwrap();

        // Signature is valid but recovers to a different wallet than the caller
        let request = sign_request(&fx, &fp);
        let stranger = Caller::new("someone-else", Role::Producer);
        let err = fx.service.sign(&stranger, request).await.unwrap_err();
        assert!(matches!(err, TraceError::Unauthorized(_)));

        // No certification row was created
        let latest = fx.certifications.latest_for_batch("B-001").await.unwrap();
        assert!(latest.is_none());
    }

    #[tokio::test]
    async fn test_mint_unknown_key_is_not_found() {
        let fx = fixture();
        let err = fx
            .service
            .mint(MintRequest {
                certificate_key: "missing".into(),
                minter_wallet: "m".into(),
                buyer_wallet: "b".into(),
                token_id: "1".into(),
            })
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_mint_records_once_then_conflicts() {
        let fx = fixture();
        sold_batch(&fx, "B-001").await;
        let fp = fx.service.snapshot("B-001").await.unwrap();
        let cert = fx
            .service
            .sign(&fx.caller, sign_request(&fx, &fp))
            .await
            .unwrap();

        let request = MintRequest {
            certificate_key: cert.key.clone(),
            minter_wallet: "minter-wallet".into(),
            buyer_wallet: "buyer-wallet".into(),
            token_id: "42".into(),
        };
        let minted = fx.service.mint(request.clone()).await.unwrap();
        assert_eq!(minted.token_id.as_deref(), Some("42"));

        let err = fx.service.mint(request).await.unwrap_err();
        assert!(matches!(err, TraceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_metadata_resolves_snapshot_and_gates_buyers() {
        let fx = fixture();
        sold_batch(&fx, "B-001").await;
        let fp = fx.service.snapshot("B-001").await.unwrap();
        let cert = fx
            .service
            .sign(&fx.caller, sign_request(&fx, &fp))
            .await
            .unwrap();

        // Non-buyer roles read freely
        let snapshot = fx.service.metadata(&fx.caller, "B-001").await.unwrap();
        assert_eq!(snapshot.batch_code, "B-001");

        // Buyer without an ownership row is forbidden
        let buyer = Caller::new("buyer-wallet", Role::Buyer);
        let err = fx.service.metadata(&buyer, "B-001").await.unwrap_err();
        assert!(matches!(err, TraceError::Forbidden(_)));

        // After minting to that buyer, the read succeeds
        fx.service
            .mint(MintRequest {
                certificate_key: cert.key.clone(),
                minter_wallet: "minter-wallet".into(),
                buyer_wallet: "buyer-wallet".into(),
                token_id: "42".into(),
            })
            .await
            .unwrap();
        let snapshot = fx.service.metadata(&buyer, "B-001").await.unwrap();
        assert_eq!(snapshot.batch_code, "B-001");
    }

    #[tokio::test]
    async fn test_state_progression() {
        let fx = fixture();
        sold_batch(&fx, "B-001").await;
        assert_eq!(
            fx.service.state_of("B-001", None).await.unwrap(),
            CertificationState::NoCertificate
        );

        let fp = fx.service.snapshot("B-001").await.unwrap();
        assert_eq!(
            fx.service
                .state_of("B-001", Some(&fp.fingerprint))
                .await
                .unwrap(),
            CertificationState::SnapshotTaken
        );

        let cert = fx
            .service
            .sign(&fx.caller, sign_request(&fx, &fp))
            .await
            .unwrap();
        assert_eq!(
            fx.service
                .state_of("B-001", Some(&fp.fingerprint))
                .await
                .unwrap(),
            CertificationState::Signed
        );

        fx.service
            .mint(MintRequest {
                certificate_key: cert.key,
                minter_wallet: "m".into(),
                buyer_wallet: "b".into(),
                token_id: "1".into(),
            })
            .await
            .unwrap();
        assert_eq!(
            fx.service.state_of("B-001", None).await.unwrap(),
            CertificationState::Minted
        );
    }

    /// Owner repo that fails its next insert, then behaves normally.
    #[derive(Default)]
    struct FlakyOwnerRepo {
        inner: MemoryOwnerRepo,
        fail_next: AtomicBool,
    }

    #[async_trait]
    impl CertificateOwnerRepository for FlakyOwnerRepo {
        async fn insert(&self, owner: CertificateOwnerDoc) -> Result<()> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(TraceError::Database("connection reset".into()));
            }
            self.inner.insert(owner).await
        }

        async fn exists(&self, buyer_wallet: &str, certification_key: &str) -> Result<bool> {
            self.inner.exists(buyer_wallet, certification_key).await
        }
    }

    #[tokio::test]
    async fn test_mint_retry_finishes_lost_ownership_claim() {
        let owners = Arc::new(FlakyOwnerRepo::default());
        let fx = fixture_with_owners(owners.clone());
        sold_batch(&fx, "B-001").await;
        let fp = fx.service.snapshot("B-001").await.unwrap();
        let cert = fx
            .service
            .sign(&fx.caller, sign_request(&fx, &fp))
            .await
            .unwrap();

        let request = MintRequest {
            certificate_key: cert.key.clone(),
            minter_wallet: "minter-wallet".into(),
            buyer_wallet: "buyer-wallet".into(),
            token_id: "42".into(),
        };

        // The claim insert dies after the mint fields were written
        owners.fail_next.store(true, Ordering::SeqCst);
        let err = fx.service.mint(request.clone()).await.unwrap_err();
        assert!(matches!(err, TraceError::Database(_)));

        let stored = fx
            .certifications
            .find_by_key(&cert.key)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_minted());

        let buyer = Caller::new("buyer-wallet", Role::Buyer);
        let err = fx.service.metadata(&buyer, "B-001").await.unwrap_err();
        assert!(matches!(err, TraceError::Forbidden(_)));

        // A retry with the recorded mint data finishes the claim
        let minted = fx.service.mint(request.clone()).await.unwrap();
        assert_eq!(minted.token_id.as_deref(), Some("42"));
        fx.service.metadata(&buyer, "B-001").await.unwrap();

        // Completed mints still conflict, for matching and differing payloads
        let err = fx.service.mint(request).await.unwrap_err();
        assert!(matches!(err, TraceError::Conflict(_)));
        let err = fx
            .service
            .mint(MintRequest {
                certificate_key: cert.key,
                minter_wallet: "minter-wallet".into(),
                buyer_wallet: "other-buyer".into(),
                token_id: "43".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TraceError::Conflict(_)));
    }
}

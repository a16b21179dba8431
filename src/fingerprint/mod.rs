//! Canonical batch snapshots and fingerprinting
//!
//! The fingerprint is the basis for detecting "no change since the last
//! certificate": the snapshot serialization is canonical (versioned struct,
//! fixed serde field order, collections sorted by code), so re-serializing
//! the same logical data always yields the same digest.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::db::schemas::{BatchDoc, ProducerDoc, PulpDoc};
use crate::ledger::phase::{DryingPhase, FermentationPhase, SalePhase, StoragePhase};
use crate::types::{Result, TraceError};

/// Bump when the canonical snapshot schema changes; old fingerprints stay
/// comparable only within their version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Result of fingerprinting a canonical snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// 64-char lowercase hex sha256 digest
    pub fingerprint: String,
    /// Digest algorithm, always "sha256"
    pub algorithm: String,
}

/// Pulp data that enters the canonical snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulpSnapshot {
    pub code: String,
    pub producer_code: String,
    pub collection_date: Option<chrono::NaiveDate>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub weight_kg: Option<rust_decimal::Decimal>,
}

impl From<&PulpDoc> for PulpSnapshot {
    fn from(p: &PulpDoc) -> Self {
        Self {
            code: p.code.clone(),
            producer_code: p.producer_code.clone(),
            collection_date: p.collection_date,
            weight_kg: p.weight_kg,
        }
    }
}

/// Producer data that enters the canonical snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerSnapshot {
    pub code: String,
    pub name: String,
    pub department: String,
    pub association: String,
}

impl From<&ProducerDoc> for ProducerSnapshot {
    fn from(p: &ProducerDoc) -> Self {
        Self {
            code: p.code.clone(),
            name: p.name.clone(),
            department: p.department.clone(),
            association: p.association.clone(),
        }
    }
}

/// Canonical, versioned view of a batch's phase data.
///
/// Field order is the serialization order; do not reorder fields without
/// bumping [`SNAPSHOT_VERSION`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalSnapshot {
    pub snapshot_version: u32,
    pub batch_code: String,
    pub fermentation: Option<FermentationPhase>,
    pub drying: Option<DryingPhase>,
    pub storage: Option<StoragePhase>,
    pub sale: Option<SalePhase>,
    pub pulps: Vec<PulpSnapshot>,
    pub producers: Vec<ProducerSnapshot>,
}

impl CanonicalSnapshot {
    /// Build the canonical snapshot of a batch with its resolved pulps and
    /// producers. Collections are sorted by code regardless of input order.
    pub fn build(batch: &BatchDoc, pulps: &[PulpDoc], producers: &[ProducerDoc]) -> Self {
        let mut pulps: Vec<PulpSnapshot> = pulps.iter().map(PulpSnapshot::from).collect();
        pulps.sort_by(|a, b| a.code.cmp(&b.code));

        let mut producers: Vec<ProducerSnapshot> =
            producers.iter().map(ProducerSnapshot::from).collect();
        producers.sort_by(|a, b| a.code.cmp(&b.code));

        Self {
            snapshot_version: SNAPSHOT_VERSION,
            batch_code: batch.code.clone(),
            fermentation: batch.fermentation.clone(),
            drying: batch.drying.clone(),
            storage: batch.storage.clone(),
            sale: batch.sale.clone(),
            pulps,
            producers,
        }
    }

    /// Canonical byte serialization.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| TraceError::Storage(format!("snapshot serialization failed: {}", e)))
    }

    /// Decode a stored snapshot blob.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| TraceError::Storage(format!("snapshot decode failed: {}", e)))
    }
}

/// Compute the sha256 fingerprint of a canonical snapshot serialization.
///
/// Deterministic and pure: same bytes, same digest.
pub fn fingerprint(canonical_snapshot: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(canonical_snapshot);
    Fingerprint {
        fingerprint: hex::encode(hasher.finalize()),
        algorithm: "sha256".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_batch() -> BatchDoc {
        let mut batch = BatchDoc::new("B-001".into(), vec!["P-01".into()]);
        batch.sale = Some(SalePhase {
            buyer: Some("ChocoNorte".into()),
            price_per_kg_usd: Some(dec!(4.10)),
            total_weight_kg: Some(dec!(250)),
            ..Default::default()
        });
        batch
    }

    fn pulp(code: &str) -> PulpDoc {
        let mut p = PulpDoc::new(code.into(), "P-01".into());
        p.weight_kg = Some(dec!(30.5));
        p
    }

    fn producer(code: &str) -> ProducerDoc {
        ProducerDoc::new(code.into(), "Ana".into(), "Meta".into(), "AsoCampo".into())
    }

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        let fp = fingerprint(b"hello");
        assert_eq!(fp.algorithm, "sha256");
        assert_eq!(fp.fingerprint.len(), 64);
        assert!(fp.fingerprint.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(
            fp.fingerprint,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_snapshot_independent_of_input_order() {
        let batch = sample_batch();
        let p1 = pulp("PL-01");
        let p2 = pulp("PL-02");
        let pr1 = producer("P-01");
        let pr2 = producer("P-02");

        let a = CanonicalSnapshot::build(&batch, &[p1.clone(), p2.clone()], &[pr1.clone(), pr2.clone()]);
        let b = CanonicalSnapshot::build(&batch, &[p2, p1], &[pr2, pr1]);

        let fp_a = fingerprint(&a.to_bytes().unwrap());
        let fp_b = fingerprint(&b.to_bytes().unwrap());
        assert_eq!(fp_a, fp_b);
    }

    #[test]
    fn test_different_data_different_fingerprint() {
        let batch = sample_batch();
        let a = CanonicalSnapshot::build(&batch, &[pulp("PL-01")], &[]);
        let b = CanonicalSnapshot::build(&batch, &[pulp("PL-02")], &[]);
        assert_ne!(
            fingerprint(&a.to_bytes().unwrap()),
            fingerprint(&b.to_bytes().unwrap())
        );
    }

    #[test]
    fn test_snapshot_round_trip() {
        let batch = sample_batch();
        let snap = CanonicalSnapshot::build(&batch, &[pulp("PL-01")], &[producer("P-01")]);
        let bytes = snap.to_bytes().unwrap();
        let back = CanonicalSnapshot::from_bytes(&bytes).unwrap();
        assert_eq!(back, snap);
        assert_eq!(back.snapshot_version, SNAPSHOT_VERSION);
    }
}

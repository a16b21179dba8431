//! Certification document schema
//!
//! A certification is immutable once signed; only the minting fields may be
//! set afterwards, exactly once. Uniqueness of `key` and
//! `signed_data_fingerprint` is enforced by the store and is what makes the
//! idempotent re-sign guarantee hold under concurrent duplicate submissions.

use bson::{doc, oid::ObjectId, Document};
use chrono::NaiveDate;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for certifications
pub const CERTIFICATION_COLLECTION: &str = "certifications";

/// Certification document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CertificationDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Code of the certified batch
    pub batch_code: String,

    /// Date the fingerprint was signed, supplied by the signer
    pub date_signed: NaiveDate,

    /// sha256 hex fingerprint of the canonical batch snapshot
    pub data_fingerprint: String,

    /// Signature blob over the fingerprint (unique)
    pub signed_data_fingerprint: String,

    /// Wallet address recovered from the signature
    pub signer_wallet: String,

    /// Content address of the signature-link blob (unique)
    pub key: String,

    /// NFT token id, set exactly once at mint time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,

    /// Wallet that performed the external mint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minter_wallet: Option<String>,

    /// Wallet that received the minted NFT
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer_wallet: Option<String>,
}

impl CertificationDoc {
    /// Create a freshly signed certification with no minting data
    pub fn new(
        batch_code: String,
        date_signed: NaiveDate,
        data_fingerprint: String,
        signed_data_fingerprint: String,
        signer_wallet: String,
        key: String,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            batch_code,
            date_signed,
            data_fingerprint,
            signed_data_fingerprint,
            signer_wallet,
            key,
            token_id: None,
            minter_wallet: None,
            buyer_wallet: None,
        }
    }

    /// Whether the minting fields have been recorded
    pub fn is_minted(&self) -> bool {
        self.token_id.is_some()
    }
}

impl IntoIndexes for CertificationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on the link-blob key
            (
                doc! { "key": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("certification_key_unique".to_string())
                        .build(),
                ),
            ),
            // Unique index on the signature blob (idempotent re-sign arbiter)
            (
                doc! { "signed_data_fingerprint": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("certification_signature_unique".to_string())
                        .build(),
                ),
            ),
            // Index on batch code for latest-certificate lookups
            (
                doc! { "batch_code": 1 },
                Some(
                    IndexOptions::builder()
                        .name("certification_batch_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for CertificationDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

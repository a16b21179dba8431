//! Certificate ownership claims
//!
//! One row per `(buyer wallet, certification key)` pair. Used only as a
//! membership check when a buyer-role caller reads certificate metadata; this
//! is not a transfer ledger.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for certificate owners
pub const CERTIFICATE_OWNER_COLLECTION: &str = "certificate_owners";

/// Certificate ownership document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CertificateOwnerDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Wallet that holds the minted NFT
    pub buyer_wallet: String,

    /// Content-address key of the certification
    pub certification_key: String,

    /// Wallet that performed the external mint
    pub minter_wallet: String,

    /// NFT token id reported by the external mint
    pub token_id: String,
}

impl CertificateOwnerDoc {
    /// Record a new ownership claim
    pub fn new(
        buyer_wallet: String,
        certification_key: String,
        minter_wallet: String,
        token_id: String,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            buyer_wallet,
            certification_key,
            minter_wallet,
            token_id,
        }
    }
}

impl IntoIndexes for CertificateOwnerDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique compound index: one claim per (wallet, key) pair
            (
                doc! { "buyer_wallet": 1, "certification_key": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("owner_wallet_key_unique".to_string())
                        .build(),
                ),
            ),
            // Index on key for ownership history of one certification
            (
                doc! { "certification_key": 1 },
                Some(
                    IndexOptions::builder()
                        .name("owner_key_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for CertificateOwnerDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

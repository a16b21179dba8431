//! User document schema
//!
//! The core consumes users only as wallet -> role lookups; credential
//! handling and token issuance live in the external auth layer.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UserDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Wallet address (bs58 ed25519 public key)
    pub wallet: String,

    /// Role granted to this wallet
    #[serde(default)]
    pub role: Role,

    /// Association the wallet belongs to, for association-role users
    #[serde(skip_serializing_if = "Option::is_none")]
    pub association: Option<String>,
}

impl UserDoc {
    /// Create a new user document
    pub fn new(wallet: String, role: Role) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            wallet,
            role,
            association: None,
        }
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on wallet
            (
                doc! { "wallet": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("user_wallet_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

//! Producer document schema
//!
//! Demographic attributes feed the report aggregator's derived statistics.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for producers
pub const PRODUCER_COLLECTION: &str = "producers";

/// Producer document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ProducerDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Unique producer code
    pub code: String,

    /// Display name
    pub name: String,

    /// Wallet address (bs58 ed25519 public key), when the producer has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet: Option<String>,

    /// Department (region) the producer farms in
    pub department: String,

    /// Association the producer belongs to
    pub association: String,

    /// Self-reported gender ("male", "female", other free-form values)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,

    /// Year of birth, for age-bracket statistics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_year: Option<i32>,

    /// Hectares under forest conservation
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub ha_forest_conservation: Option<Decimal>,

    /// Hectares planted with cocoa
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub ha_cocoa: Option<Decimal>,
}

impl ProducerDoc {
    /// Create a new producer document
    pub fn new(code: String, name: String, department: String, association: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            code,
            name,
            wallet: None,
            department,
            association,
            gender: None,
            birth_year: None,
            ha_forest_conservation: None,
            ha_cocoa: None,
        }
    }
}

impl IntoIndexes for ProducerDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on producer code
            (
                doc! { "code": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("producer_code_unique".to_string())
                        .build(),
                ),
            ),
            // Index on department for regional rosters
            (
                doc! { "department": 1 },
                Some(
                    IndexOptions::builder()
                        .name("producer_department_index".to_string())
                        .build(),
                ),
            ),
            // Index on association for scoped rosters
            (
                doc! { "association": 1 },
                Some(
                    IndexOptions::builder()
                        .name("producer_association_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ProducerDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

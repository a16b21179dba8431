//! Pulp document schema

use bson::{doc, oid::ObjectId, Document};
use chrono::NaiveDate;
use mongodb::options::IndexOptions;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for pulps
pub const PULP_COLLECTION: &str = "pulps";

/// Pulp document stored in MongoDB
///
/// Each pulp is owned by exactly one producer. Batch membership lives on the
/// batch document (`pulp_codes`), never here, so a pulp is only ever linked
/// to the batches it was explicitly assigned to.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct PulpDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Unique pulp code
    pub code: String,

    /// Code of the owning producer
    pub producer_code: String,

    /// When the pulp was collected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_date: Option<NaiveDate>,

    /// Collected weight in kg
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub weight_kg: Option<Decimal>,

    /// Amount paid to the producer in USD
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub price_paid_usd: Option<Decimal>,
}

impl PulpDoc {
    /// Create a new pulp document
    pub fn new(code: String, producer_code: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            code,
            producer_code,
            collection_date: None,
            weight_kg: None,
            price_paid_usd: None,
        }
    }
}

impl IntoIndexes for PulpDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on pulp code
            (
                doc! { "code": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("pulp_code_unique".to_string())
                        .build(),
                ),
            ),
            // Index on owning producer
            (
                doc! { "producer_code": 1 },
                Some(
                    IndexOptions::builder()
                        .name("pulp_producer_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for PulpDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

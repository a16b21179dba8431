//! Batch document schema
//!
//! One document per batch; the four phases are embedded sub-documents and the
//! pulp/producer links are code lists maintained by explicit assignment.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::ledger::phase::{DryingPhase, FermentationPhase, SalePhase, StoragePhase};

/// Collection name for batches
pub const BATCH_COLLECTION: &str = "batches";

/// Batch document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct BatchDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Unique batch code (e.g. "B-001")
    pub code: String,

    /// Fermentation phase, seeded on first patch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fermentation: Option<FermentationPhase>,

    /// Drying phase, seeded on first patch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drying: Option<DryingPhase>,

    /// Storage phase, seeded on first patch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StoragePhase>,

    /// Sale phase, seeded on first patch; a batch without one cannot be
    /// certified
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale: Option<SalePhase>,

    /// Codes of pulps explicitly assigned to this batch
    #[serde(default)]
    pub pulp_codes: Vec<String>,

    /// Codes of producers involved in this batch
    #[serde(default)]
    pub producer_codes: Vec<String>,
}

impl BatchDoc {
    /// Create a new batch document with no phase data
    pub fn new(code: String, producer_codes: Vec<String>) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            code,
            fermentation: None,
            drying: None,
            storage: None,
            sale: None,
            pulp_codes: Vec::new(),
            producer_codes,
        }
    }

    /// Whether the batch has completed its sale phase
    pub fn is_sold(&self) -> bool {
        self.sale.is_some()
    }
}

impl IntoIndexes for BatchDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on batch code
            (
                doc! { "code": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("batch_code_unique".to_string())
                        .build(),
                ),
            ),
            // Index on pulp codes for reverse lookups
            (
                doc! { "pulp_codes": 1 },
                Some(
                    IndexOptions::builder()
                        .name("batch_pulp_codes_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for BatchDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

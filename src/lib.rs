//! Theobroma - traceability and certification backend for cacao supply chains
//!
//! Batches of cacao move through fermentation, drying, storage, and sale;
//! every phase update is recorded against the batch document. Once sold, a
//! batch can be certified through a three-step state machine (snapshot, sign,
//! mint) bound to a sha256 fingerprint of the batch's canonical state.
//!
//! ## Services
//!
//! - **Ledger**: batch/pulp/producer registration and phase progression
//! - **Certification**: snapshot -> sign -> mint over content-addressed blobs
//! - **Reports**: role-scoped aggregation with decimal-precise sums
//! - **Store**: content-addressable snapshot storage (HTTP or in-memory)

pub mod auth;
pub mod certification;
pub mod config;
pub mod db;
pub mod fingerprint;
pub mod ledger;
pub mod repo;
pub mod reports;
pub mod store;
pub mod types;
pub mod verifier;

pub use certification::CertificationService;
pub use config::Args;
pub use ledger::PhaseLedger;
pub use reports::ReportAggregator;
pub use types::{Result, TraceError};

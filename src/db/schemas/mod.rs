//! Database schemas
//!
//! MongoDB document structures for batches, pulps, producers, certifications,
//! ownership claims, and users.

mod batch;
mod certificate_owner;
mod certification;
mod metadata;
mod producer;
mod pulp;
mod user;

pub use batch::{BatchDoc, BATCH_COLLECTION};
pub use certificate_owner::{CertificateOwnerDoc, CERTIFICATE_OWNER_COLLECTION};
pub use certification::{CertificationDoc, CERTIFICATION_COLLECTION};
pub use metadata::Metadata;
pub use producer::{ProducerDoc, PRODUCER_COLLECTION};
pub use pulp::{PulpDoc, PULP_COLLECTION};
pub use user::{UserDoc, USER_COLLECTION};

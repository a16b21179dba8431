//! Certification state machine and workflow

mod service;
mod state;

pub use service::{CertificationService, MintRequest, SignRequest, SignatureLink};
pub use state::CertificationState;

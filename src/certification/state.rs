//! Certification lifecycle states
//!
//! `NoCertificate → SnapshotTaken → Signed → Minted`. The state is explicit,
//! derived from what has been durably recorded, and the mint transition
//! returns a typed result instead of being inferred from which optional
//! fields happen to be set. Signing has no transition function here: its
//! gate is the snapshot-blob lookup plus the idempotent re-sign check in the
//! service.

use std::fmt;

use crate::db::schemas::CertificationDoc;
use crate::types::{Result, TraceError};

/// Lifecycle state of a batch's certification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificationState {
    /// No snapshot has been taken for the batch.
    NoCertificate,
    /// A canonical snapshot is stored; the fingerprint is the provisional
    /// handle. No certification record exists yet.
    SnapshotTaken,
    /// A signed certification record exists.
    Signed,
    /// The minting fields have been recorded.
    Minted,
}

impl fmt::Display for CertificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificationState::NoCertificate => write!(f, "no-certificate"),
            CertificationState::SnapshotTaken => write!(f, "snapshot-taken"),
            CertificationState::Signed => write!(f, "signed"),
            CertificationState::Minted => write!(f, "minted"),
        }
    }
}

impl CertificationState {
    /// Derive the state from the durable record (and whether a snapshot blob
    /// exists for the batch when there is no record yet).
    pub fn of(cert: Option<&CertificationDoc>, snapshot_taken: bool) -> Self {
        match cert {
            Some(c) if c.is_minted() => CertificationState::Minted,
            Some(_) => CertificationState::Signed,
            None if snapshot_taken => CertificationState::SnapshotTaken,
            None => CertificationState::NoCertificate,
        }
    }

    /// Minting is only legal exactly once, on a signed certification.
    pub fn mint(self) -> Result<CertificationState> {
        match self {
            CertificationState::Signed => Ok(CertificationState::Minted),
            CertificationState::Minted => {
                Err(TraceError::Conflict("certification already minted".into()))
            }
            s => Err(TraceError::NotFound(format!(
                "no signed certification to mint (state {})",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn signed_cert() -> CertificationDoc {
        CertificationDoc::new(
            "B-001".into(),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            "fp".into(),
            "sig".into(),
            "wallet".into(),
            "key".into(),
        )
    }

    #[test]
    fn test_state_derivation() {
        assert_eq!(
            CertificationState::of(None, false),
            CertificationState::NoCertificate
        );
        assert_eq!(
            CertificationState::of(None, true),
            CertificationState::SnapshotTaken
        );

        let cert = signed_cert();
        assert_eq!(
            CertificationState::of(Some(&cert), true),
            CertificationState::Signed
        );

        let mut minted = signed_cert();
        minted.token_id = Some("7".into());
        assert_eq!(
            CertificationState::of(Some(&minted), true),
            CertificationState::Minted
        );
    }

    #[test]
    fn test_mint_transitions() {
        assert_eq!(
            CertificationState::Signed.mint().unwrap(),
            CertificationState::Minted
        );
        assert!(matches!(
            CertificationState::Minted.mint().unwrap_err(),
            TraceError::Conflict(_)
        ));
        assert!(CertificationState::SnapshotTaken.mint().unwrap_err().is_not_found());
    }
}

//! Crate-wide error type and result alias.

use thiserror::Error;

/// Errors surfaced by the traceability core.
///
/// Every failure crosses the boundary as one of these variants with a stable
/// message; nothing is swallowed except where idempotency is intended
/// (re-signing an already-signed certification).
#[derive(Debug, Error)]
pub enum TraceError {
    /// Batch, phase, pulp, producer, certification, or snapshot is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Flip/day-report index outside the current dense sequence.
    #[error("index {index} out of range for sequence of length {len}")]
    InvalidIndex { index: usize, len: usize },

    /// Signature did not recover to the caller's wallet.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Role or ownership check failed.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Unique-key constraint violation that is not normalized to idempotent
    /// success.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A batch cannot be certified before its sale phase exists.
    #[error("batch {0} has not been sold")]
    BatchNotSold(String),

    /// Backing database failure.
    #[error("database error: {0}")]
    Database(String),

    /// Content-addressable store or signature verifier failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid configuration detected at startup.
    #[error("configuration error: {0}")]
    Config(String),
}

impl TraceError {
    /// True when the error is a missing-resource condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TraceError::NotFound(_))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TraceError>;

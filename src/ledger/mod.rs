//! Phase Ledger
//!
//! The batch entity, its four ordered phases, and the append/patch/delete
//! operations on fermentation sub-records.

pub mod phase;
mod service;

pub use service::{BatchView, PhaseLedger};

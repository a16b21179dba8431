//! Phase Ledger service
//!
//! All operations are keyed by batch code. Phase records are seeded on first
//! patch (idempotent, never duplicated) and partially merged thereafter.
//! Flip/day-report sequences are zero-based and contiguous; deletion always
//! compacts, no tombstones, no gaps. Concurrent structural edits to the same
//! fermentation phase race on index assignment; callers serialize those
//! externally if it matters.

use std::sync::Arc;
use tracing::{debug, info};

use crate::db::schemas::{BatchDoc, ProducerDoc, PulpDoc};
use crate::ledger::phase::{
    DayReport, DayReportPatch, FermentationPhase, Flip, FlipPatch, PhasePatch,
};
use crate::repo::{BatchRepository, ProducerRepository, PulpRepository};
use crate::types::{Result, TraceError};

/// A batch with its linked pulps and producers eagerly resolved.
#[derive(Debug, Clone)]
pub struct BatchView {
    pub batch: BatchDoc,
    pub pulps: Vec<PulpDoc>,
    pub producers: Vec<ProducerDoc>,
}

/// Service over batch phase progression.
#[derive(Clone)]
pub struct PhaseLedger {
    batches: Arc<dyn BatchRepository>,
    pulps: Arc<dyn PulpRepository>,
    producers: Arc<dyn ProducerRepository>,
}

impl PhaseLedger {
    pub fn new(
        batches: Arc<dyn BatchRepository>,
        pulps: Arc<dyn PulpRepository>,
        producers: Arc<dyn ProducerRepository>,
    ) -> Self {
        Self {
            batches,
            pulps,
            producers,
        }
    }

    /// Create a new batch. All named producers must already exist.
    pub async fn create_batch(&self, code: &str, producer_codes: Vec<String>) -> Result<BatchDoc> {
        for producer_code in &producer_codes {
            if self.producers.find_by_code(producer_code).await?.is_none() {
                return Err(TraceError::NotFound(format!("producer {}", producer_code)));
            }
        }

        let batch = BatchDoc::new(code.to_string(), producer_codes);
        self.batches.insert(batch.clone()).await?;
        info!(code = %code, "Batch created");
        Ok(batch)
    }

    /// Register a new pulp for an existing producer.
    pub async fn register_pulp(&self, pulp: PulpDoc) -> Result<()> {
        if self
            .producers
            .find_by_code(&pulp.producer_code)
            .await?
            .is_none()
        {
            return Err(TraceError::NotFound(format!(
                "producer {}",
                pulp.producer_code
            )));
        }
        self.pulps.insert(pulp).await
    }

    /// Register a new producer.
    pub async fn register_producer(&self, producer: ProducerDoc) -> Result<()> {
        self.producers.insert(producer).await
    }

    /// Fetch a batch with phases and linked pulps/producers eagerly joined.
    pub async fn get_batch(&self, code: &str) -> Result<BatchView> {
        let batch = self.require_batch(code).await?;

        let mut pulps = Vec::with_capacity(batch.pulp_codes.len());
        for pulp_code in &batch.pulp_codes {
            if let Some(pulp) = self.pulps.find_by_code(pulp_code).await? {
                pulps.push(pulp);
            }
        }

        let mut producers = Vec::with_capacity(batch.producer_codes.len());
        for producer_code in &batch.producer_codes {
            if let Some(producer) = self.producers.find_by_code(producer_code).await? {
                producers.push(producer);
            }
        }

        Ok(BatchView {
            batch,
            pulps,
            producers,
        })
    }

    /// Assign pulps to a batch. Each pulp must exist and must not already be
    /// assigned to this batch; assignment is explicit and never re-linked
    /// implicitly.
    pub async fn assign_pulps(&self, code: &str, pulp_codes: &[String]) -> Result<BatchDoc> {
        let mut batch = self.require_batch(code).await?;

        for pulp_code in pulp_codes {
            if self.pulps.find_by_code(pulp_code).await?.is_none() {
                return Err(TraceError::NotFound(format!("pulp {}", pulp_code)));
            }
            if batch.pulp_codes.contains(pulp_code) {
                return Err(TraceError::Conflict(format!(
                    "pulp {} already assigned to batch {}",
                    pulp_code, code
                )));
            }
        }

        batch.pulp_codes.extend(pulp_codes.iter().cloned());
        self.batches.replace(&batch).await?;
        info!(code = %code, pulps = pulp_codes.len(), "Pulps assigned to batch");
        Ok(batch)
    }

    /// Apply a partial update to one of the batch's phases, seeding the phase
    /// on first patch. Seeding is idempotent: a phase record, once created,
    /// is never duplicated.
    pub async fn update_phase(&self, code: &str, patch: &PhasePatch) -> Result<BatchDoc> {
        let mut batch = self.require_batch(code).await?;

        match patch {
            PhasePatch::Fermentation(p) => {
                batch.fermentation.get_or_insert_with(Default::default).apply(p)
            }
            PhasePatch::Drying(p) => batch.drying.get_or_insert_with(Default::default).apply(p),
            PhasePatch::Storage(p) => batch.storage.get_or_insert_with(Default::default).apply(p),
            PhasePatch::Sale(p) => batch.sale.get_or_insert_with(Default::default).apply(p),
        }

        self.batches.replace(&batch).await?;
        debug!(code = %code, phase = %patch.kind(), "Phase updated");
        Ok(batch)
    }

    /// Append a flip to the batch's fermentation phase.
    pub async fn append_flip(&self, code: &str, flip: Flip) -> Result<FermentationPhase> {
        self.with_fermentation(code, |phase| {
            phase.flips.push(flip);
            Ok(())
        })
        .await
    }

    /// Append a day report to the batch's fermentation phase.
    pub async fn append_day_report(&self, code: &str, report: DayReport) -> Result<FermentationPhase> {
        self.with_fermentation(code, |phase| {
            phase.day_reports.push(report);
            Ok(())
        })
        .await
    }

    /// Patch the flip at `index`.
    pub async fn update_flip_at(
        &self,
        code: &str,
        index: usize,
        patch: &FlipPatch,
    ) -> Result<FermentationPhase> {
        self.with_fermentation(code, |phase| {
            let len = phase.flips.len();
            let flip = phase
                .flips
                .get_mut(index)
                .ok_or(TraceError::InvalidIndex { index, len })?;
            flip.apply(patch);
            Ok(())
        })
        .await
    }

    /// Patch the day report at `index`.
    pub async fn update_day_report_at(
        &self,
        code: &str,
        index: usize,
        patch: &DayReportPatch,
    ) -> Result<FermentationPhase> {
        self.with_fermentation(code, |phase| {
            let len = phase.day_reports.len();
            let report = phase
                .day_reports
                .get_mut(index)
                .ok_or(TraceError::InvalidIndex { index, len })?;
            report.apply(patch);
            Ok(())
        })
        .await
    }

    /// Remove the flip at `index`, compacting the sequence.
    pub async fn remove_flip_at(&self, code: &str, index: usize) -> Result<FermentationPhase> {
        self.with_fermentation(code, |phase| {
            let len = phase.flips.len();
            if index >= len {
                return Err(TraceError::InvalidIndex { index, len });
            }
            phase.flips.remove(index);
            Ok(())
        })
        .await
    }

    /// Remove the day report at `index`, compacting the sequence.
    pub async fn remove_day_report_at(&self, code: &str, index: usize) -> Result<FermentationPhase> {
        self.with_fermentation(code, |phase| {
            let len = phase.day_reports.len();
            if index >= len {
                return Err(TraceError::InvalidIndex { index, len });
            }
            phase.day_reports.remove(index);
            Ok(())
        })
        .await
    }

    async fn require_batch(&self, code: &str) -> Result<BatchDoc> {
        self.batches
            .find_by_code(code)
            .await?
            .ok_or_else(|| TraceError::NotFound(format!("batch {}", code)))
    }

    /// Load the batch, mutate its fermentation phase, write it back.
    ///
    /// The phase must already exist; sub-record operations never seed it.
    async fn with_fermentation<F>(&self, code: &str, mutate: F) -> Result<FermentationPhase>
    where
        F: FnOnce(&mut FermentationPhase) -> Result<()>,
    {
        let mut batch = self.require_batch(code).await?;

        let phase = batch
            .fermentation
            .as_mut()
            .ok_or_else(|| TraceError::NotFound(format!("fermentation phase for batch {}", code)))?;

        mutate(phase)?;
        let updated = phase.clone();
        self.batches.replace(&batch).await?;
        Ok(updated)
    }
}

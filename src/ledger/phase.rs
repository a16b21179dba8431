//! Phase value types for the batch ledger
//!
//! A batch owns at most one of each phase. Phase attributes are optional so
//! that a phase can be seeded on first patch and filled in over time; flips
//! and day reports are dense, zero-based sequences owned by the fermentation
//! phase and mutated only through the ledger's index operations.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four ordered phases a batch moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    Fermentation,
    Drying,
    Storage,
    Sale,
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseKind::Fermentation => write!(f, "fermentation"),
            PhaseKind::Drying => write!(f, "drying"),
            PhaseKind::Storage => write!(f, "storage"),
            PhaseKind::Sale => write!(f, "sale"),
        }
    }
}

/// A single mass-turning event during fermentation.
///
/// Value record: no identity beyond its position in the owning sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flip {
    /// Kind of flip performed (e.g. "quarter", "full").
    pub flip_type: String,
    /// When the flip happened.
    pub time: NaiveDateTime,
    /// Mass temperature in °C.
    #[serde(with = "rust_decimal::serde::str")]
    pub temp_c: Decimal,
    /// Ambient temperature in °C.
    #[serde(with = "rust_decimal::serde::str")]
    pub ambient_c: Decimal,
    /// Relative humidity in percent.
    #[serde(with = "rust_decimal::serde::str")]
    pub humidity_pct: Decimal,
}

/// Partial update for a flip at a known index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlipPatch {
    pub flip_type: Option<String>,
    pub time: Option<NaiveDateTime>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub temp_c: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub ambient_c: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub humidity_pct: Option<Decimal>,
}

impl Flip {
    pub fn apply(&mut self, patch: &FlipPatch) {
        if let Some(ref v) = patch.flip_type {
            self.flip_type = v.clone();
        }
        if let Some(v) = patch.time {
            self.time = v;
        }
        if let Some(v) = patch.temp_c {
            self.temp_c = v;
        }
        if let Some(v) = patch.ambient_c {
            self.ambient_c = v;
        }
        if let Some(v) = patch.humidity_pct {
            self.humidity_pct = v;
        }
    }
}

/// Daily fermentation measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayReport {
    /// Mass temperature in °C.
    #[serde(with = "rust_decimal::serde::str")]
    pub temperature_mass_c: Decimal,
    /// pH of the fermenting mass.
    #[serde(with = "rust_decimal::serde::str")]
    pub ph_mass: Decimal,
    /// pH of the cotyledon.
    #[serde(with = "rust_decimal::serde::str")]
    pub ph_cotiledon: Decimal,
}

/// Partial update for a day report at a known index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DayReportPatch {
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub temperature_mass_c: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub ph_mass: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub ph_cotiledon: Option<Decimal>,
}

impl DayReport {
    pub fn apply(&mut self, patch: &DayReportPatch) {
        if let Some(v) = patch.temperature_mass_c {
            self.temperature_mass_c = v;
        }
        if let Some(v) = patch.ph_mass {
            self.ph_mass = v;
        }
        if let Some(v) = patch.ph_cotiledon {
            self.ph_cotiledon = v;
        }
    }
}

/// Fermentation phase: attribute bag plus the flip/day-report sequences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FermentationPhase {
    pub start_date: Option<NaiveDate>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub pulp_weight_kg: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub brix_degrees: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub initial_ph: Option<Decimal>,
    #[serde(default)]
    pub flips: Vec<Flip>,
    #[serde(default)]
    pub day_reports: Vec<DayReport>,
}

/// Partial update for the fermentation attribute bag.
///
/// Flips and day reports are not patchable here; they go through the ledger's
/// index operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FermentationPatch {
    pub start_date: Option<NaiveDate>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub pulp_weight_kg: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub brix_degrees: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub initial_ph: Option<Decimal>,
}

impl FermentationPhase {
    pub fn apply(&mut self, patch: &FermentationPatch) {
        if let Some(v) = patch.start_date {
            self.start_date = Some(v);
        }
        if let Some(v) = patch.pulp_weight_kg {
            self.pulp_weight_kg = Some(v);
        }
        if let Some(v) = patch.brix_degrees {
            self.brix_degrees = Some(v);
        }
        if let Some(v) = patch.initial_ph {
            self.initial_ph = Some(v);
        }
    }
}

/// Drying phase attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DryingPhase {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub grain_weight_kg: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub moisture_pct: Option<Decimal>,
}

/// Partial update for the drying phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DryingPatch {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub grain_weight_kg: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub moisture_pct: Option<Decimal>,
}

impl DryingPhase {
    pub fn apply(&mut self, patch: &DryingPatch) {
        if let Some(v) = patch.start_date {
            self.start_date = Some(v);
        }
        if let Some(v) = patch.end_date {
            self.end_date = Some(v);
        }
        if let Some(v) = patch.grain_weight_kg {
            self.grain_weight_kg = Some(v);
        }
        if let Some(v) = patch.moisture_pct {
            self.moisture_pct = Some(v);
        }
    }
}

/// Storage phase attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoragePhase {
    pub entry_date: Option<NaiveDate>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub net_weight_kg: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub conversion_factor: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub batch_score: Option<Decimal>,
}

/// Partial update for the storage phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoragePatch {
    pub entry_date: Option<NaiveDate>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub net_weight_kg: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub conversion_factor: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub batch_score: Option<Decimal>,
}

impl StoragePhase {
    pub fn apply(&mut self, patch: &StoragePatch) {
        if let Some(v) = patch.entry_date {
            self.entry_date = Some(v);
        }
        if let Some(v) = patch.net_weight_kg {
            self.net_weight_kg = Some(v);
        }
        if let Some(v) = patch.conversion_factor {
            self.conversion_factor = Some(v);
        }
        if let Some(v) = patch.batch_score {
            self.batch_score = Some(v);
        }
    }
}

/// Sale phase attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalePhase {
    pub buyer: Option<String>,
    pub sale_date: Option<NaiveDate>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub price_per_kg_usd: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub total_weight_kg: Option<Decimal>,
    pub destination_country: Option<String>,
    /// Whether the sale crossed a border (explicit flag, never inferred from
    /// destination strings).
    pub international: Option<bool>,
    /// Whether the lot was sold as certified organic.
    pub organic: Option<bool>,
}

/// Partial update for the sale phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SalePatch {
    pub buyer: Option<String>,
    pub sale_date: Option<NaiveDate>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub price_per_kg_usd: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub total_weight_kg: Option<Decimal>,
    pub destination_country: Option<String>,
    pub international: Option<bool>,
    pub organic: Option<bool>,
}

impl SalePhase {
    pub fn apply(&mut self, patch: &SalePatch) {
        if let Some(ref v) = patch.buyer {
            self.buyer = Some(v.clone());
        }
        if let Some(v) = patch.sale_date {
            self.sale_date = Some(v);
        }
        if let Some(v) = patch.price_per_kg_usd {
            self.price_per_kg_usd = Some(v);
        }
        if let Some(v) = patch.total_weight_kg {
            self.total_weight_kg = Some(v);
        }
        if let Some(ref v) = patch.destination_country {
            self.destination_country = Some(v.clone());
        }
        if let Some(v) = patch.international {
            self.international = Some(v);
        }
        if let Some(v) = patch.organic {
            self.organic = Some(v);
        }
    }
}

/// A partial update addressed to one of the four phases.
///
/// Identity and foreign-key fields are not expressible here by construction;
/// each variant carries only the patchable attribute bag of its phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum PhasePatch {
    Fermentation(FermentationPatch),
    Drying(DryingPatch),
    Storage(StoragePatch),
    Sale(SalePatch),
}

impl PhasePatch {
    pub fn kind(&self) -> PhaseKind {
        match self {
            PhasePatch::Fermentation(_) => PhaseKind::Fermentation,
            PhasePatch::Drying(_) => PhaseKind::Drying,
            PhasePatch::Storage(_) => PhaseKind::Storage,
            PhasePatch::Sale(_) => PhaseKind::Sale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_patch_sets_only_present_fields() {
        let mut drying = DryingPhase {
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            grain_weight_kg: Some(dec!(120.5)),
            ..Default::default()
        };

        drying.apply(&DryingPatch {
            moisture_pct: Some(dec!(7.2)),
            ..Default::default()
        });

        assert_eq!(drying.start_date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(drying.grain_weight_kg, Some(dec!(120.5)));
        assert_eq!(drying.moisture_pct, Some(dec!(7.2)));
    }

    #[test]
    fn test_patch_is_idempotent() {
        let patch = SalePatch {
            buyer: Some("ChocoNorte".into()),
            price_per_kg_usd: Some(dec!(4.15)),
            international: Some(true),
            ..Default::default()
        };

        let mut sale = SalePhase::default();
        sale.apply(&patch);
        let once = sale.clone();
        sale.apply(&patch);
        assert_eq!(sale, once);
    }

    #[test]
    fn test_phase_patch_kind() {
        let p = PhasePatch::Storage(StoragePatch::default());
        assert_eq!(p.kind(), PhaseKind::Storage);
        assert_eq!(p.kind().to_string(), "storage");
    }

    #[test]
    fn test_flip_serde_round_trip() {
        let flip = Flip {
            flip_type: "full".into(),
            time: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap().and_hms_opt(6, 30, 0).unwrap(),
            temp_c: dec!(46.5),
            ambient_c: dec!(28.0),
            humidity_pct: dec!(81.3),
        };
        let json = serde_json::to_string(&flip).unwrap();
        let back: Flip = serde_json::from_str(&json).unwrap();
        assert_eq!(back, flip);
    }
}

//! Role-scoped report aggregation
//!
//! Pure read-side computation over ledger state. The caller's role selects
//! one of three views through a closed variant; the metric arithmetic is all
//! `Decimal`, so weights and prices never go through floating point.

use chrono::Datelike;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::auth::{Caller, Role};
use crate::db::schemas::{BatchDoc, ProducerDoc, PulpDoc};
use crate::repo::{BatchRepository, ProducerRepository, PulpRepository};
use crate::reports::stats::ProducerStats;
use crate::types::{Result, TraceError};

/// Production attributed to one department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionProduction {
    pub department: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub kg: Decimal,
}

/// A per-month volume bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyAmount {
    pub year: i32,
    pub month: u32,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
}

/// View served to unauthenticated, buyer, and producer callers.
#[derive(Debug, Clone, Serialize)]
pub struct PublicReport {
    pub production_by_region: Vec<RegionProduction>,
    pub international_sales_kg_by_region: Vec<RegionProduction>,
    #[serde(with = "rust_decimal::serde::str")]
    pub available_dry_cocoa_kg: Decimal,
    pub producers: Vec<ProducerDoc>,
    pub stats: ProducerStats,
}

/// View scoped to one association.
#[derive(Debug, Clone, Serialize)]
pub struct AssociationReport {
    pub association: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub dry_cocoa_production_kg: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub sales_kg: Decimal,
    pub monthly_pulp_kg: Vec<MonthlyAmount>,
    pub monthly_sales_usd: Vec<MonthlyAmount>,
    #[serde(with = "rust_decimal::serde::str")]
    pub available_kg: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub sold_kg: Decimal,
    pub producers: Vec<ProducerDoc>,
    pub stats: ProducerStats,
}

/// Global view for project-role callers.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectReport {
    #[serde(with = "rust_decimal::serde::str")]
    pub dry_cocoa_production_kg: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub sales_kg: Decimal,
    pub monthly_pulp_kg: Vec<MonthlyAmount>,
    pub monthly_sales_usd: Vec<MonthlyAmount>,
    #[serde(with = "rust_decimal::serde::str")]
    pub available_kg: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub sold_kg: Decimal,
    /// Average per-kg USD price across organic-flagged sales
    #[serde(with = "rust_decimal::serde::str")]
    pub organic_price_usd: Decimal,
    pub production_by_region: Vec<RegionProduction>,
    pub producers: Vec<ProducerDoc>,
    pub stats: ProducerStats,
}

/// The three role-dispatched report shapes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum ReportView {
    Public(PublicReport),
    Association(AssociationReport),
    Project(ProjectReport),
}

/// Read-side aggregation service.
#[derive(Clone)]
pub struct ReportAggregator {
    batches: Arc<dyn BatchRepository>,
    pulps: Arc<dyn PulpRepository>,
    producers: Arc<dyn ProducerRepository>,
}

impl ReportAggregator {
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

    /// Dispatch to the view matching the caller's role.
    ///
    /// `department` optionally filters the public roster; association and
    /// project views ignore it.
    pub async fn report_for(
        &self,
        caller: &Caller,
        department: Option<&str>,
        current_year: i32,
    ) -> Result<ReportView> {
        match caller.role {
            Role::Project => Ok(ReportView::Project(self.project_report(current_year).await?)),
            Role::Association => {
                let association = caller.association.as_deref().ok_or_else(|| {
                    TraceError::Forbidden("association role without an association".into())
                })?;
                Ok(ReportView::Association(
                    self.association_report(association, current_year).await?,
                ))
            }
            Role::Buyer | Role::Producer => Ok(ReportView::Public(
                self.public_report(department, current_year).await?,
            )),
        }
    }

    /// Public/buyer view: regional rollups plus the open producer roster.
    pub async fn public_report(
        &self,
        department: Option<&str>,
        current_year: i32,
    ) -> Result<PublicReport> {
        let batches = self.batches.list_all().await?;
        let all_producers = self.producers.list_all().await?;

        // Regional attribution needs the full roster even when the visible
        // roster is narrowed to one department
        let department_of = producer_departments(&all_producers);

        let producers = match department {
            Some(d) => self.producers.list_by_department(d).await?,
            None => all_producers,
        };
        let stats = ProducerStats::compute(&producers, current_year);

        Ok(PublicReport {
            production_by_region: production_by_region(&batches, &department_of),
            international_sales_kg_by_region: international_sales_by_region(
                &batches,
                &department_of,
            ),
            available_dry_cocoa_kg: available_kg(&batches),
            producers,
            stats,
        })
    }

    /// Association view: every metric scoped to the caller's association.
    ///
    /// A batch is in scope iff some producer of the association owns some
    /// pulp assigned to it -- an explicit existence check, so an association
    /// with zero producers matches nothing.
    pub async fn association_report(
        &self,
        association: &str,
        current_year: i32,
    ) -> Result<AssociationReport> {
        let producers = self.producers.list_by_association(association).await?;

        let mut pulps: Vec<PulpDoc> = Vec::new();
        for producer in &producers {
            pulps.extend(self.pulps.list_by_producer(&producer.code).await?);
        }
        let pulp_codes: HashSet<&str> = pulps.iter().map(|p| p.code.as_str()).collect();

        let all_batches = self.batches.list_all().await?;
        let batches: Vec<&BatchDoc> = all_batches
            .iter()
            .filter(|b| b.pulp_codes.iter().any(|c| pulp_codes.contains(c.as_str())))
            .collect();

        let stats = ProducerStats::compute(&producers, current_year);

        Ok(AssociationReport {
            association: association.to_string(),
            dry_cocoa_production_kg: dry_production_kg(batches.iter().copied()),
            sales_kg: sales_kg(batches.iter().copied()),
            monthly_pulp_kg: monthly_pulp_kg(pulps.iter()),
            monthly_sales_usd: monthly_sales_usd(batches.iter().copied()),
            available_kg: available_kg_ref(batches.iter().copied()),
            sold_kg: sales_kg(batches.iter().copied()),
            producers,
            stats,
        })
    }

    /// Project view: association metrics unscoped, plus organic pricing and
    /// regional production.
    pub async fn project_report(&self, current_year: i32) -> Result<ProjectReport> {
        let batches = self.batches.list_all().await?;
        let pulps = self.pulps.list_all().await?;
        let producers = self.producers.list_all().await?;

        let department_of = producer_departments(&producers);
        let stats = ProducerStats::compute(&producers, current_year);

        Ok(ProjectReport {
            dry_cocoa_production_kg: dry_production_kg(batches.iter()),
            sales_kg: sales_kg(batches.iter()),
            monthly_pulp_kg: monthly_pulp_kg(pulps.iter()),
            monthly_sales_usd: monthly_sales_usd(batches.iter()),
            available_kg: available_kg(&batches),
            sold_kg: sales_kg(batches.iter()),
            organic_price_usd: organic_price_usd(batches.iter()),
            production_by_region: production_by_region(&batches, &department_of),
            producers,
            stats,
        })
    }
}

fn producer_departments(producers: &[ProducerDoc]) -> HashMap<String, String> {
    producers
        .iter()
        .map(|p| (p.code.clone(), p.department.clone()))
        .collect()
}

/// Region of a batch: the department of its first involved producer.
/// Batches with no resolvable producer are left out of regional rollups.
fn batch_region<'a>(
    batch: &BatchDoc,
    department_of: &'a HashMap<String, String>,
) -> Option<&'a str> {
    batch
        .producer_codes
        .first()
        .and_then(|code| department_of.get(code))
        .map(String::as_str)
}

fn production_by_region(
    batches: &[BatchDoc],
    department_of: &HashMap<String, String>,
) -> Vec<RegionProduction> {
    let mut by_region: BTreeMap<&str, Decimal> = BTreeMap::new();
    for batch in batches {
        let Some(region) = batch_region(batch, department_of) else {
            continue;
        };
        if let Some(kg) = batch.drying.as_ref().and_then(|d| d.grain_weight_kg) {
            *by_region.entry(region).or_insert(Decimal::ZERO) += kg;
        }
    }
    region_vec(by_region)
}

fn international_sales_by_region(
    batches: &[BatchDoc],
    department_of: &HashMap<String, String>,
) -> Vec<RegionProduction> {
    let mut by_region: BTreeMap<&str, Decimal> = BTreeMap::new();
    for batch in batches {
        let Some(region) = batch_region(batch, department_of) else {
            continue;
        };
        let Some(sale) = batch.sale.as_ref() else {
            continue;
        };
        if sale.international == Some(true) {
            if let Some(kg) = sale.total_weight_kg {
                *by_region.entry(region).or_insert(Decimal::ZERO) += kg;
            }
        }
    }
    region_vec(by_region)
}

fn region_vec(by_region: BTreeMap<&str, Decimal>) -> Vec<RegionProduction> {
    by_region
        .into_iter()
        .map(|(department, kg)| RegionProduction {
            department: department.to_string(),
            kg,
        })
        .collect()
}

fn dry_production_kg<'a>(batches: impl Iterator<Item = &'a BatchDoc>) -> Decimal {
    batches
        .filter_map(|b| b.drying.as_ref().and_then(|d| d.grain_weight_kg))
        .sum()
}

fn sales_kg<'a>(batches: impl Iterator<Item = &'a BatchDoc>) -> Decimal {
    batches
        .filter_map(|b| b.sale.as_ref().and_then(|s| s.total_weight_kg))
        .sum()
}

/// Stored net weight of batches that have not been sold yet.
fn available_kg(batches: &[BatchDoc]) -> Decimal {
    available_kg_ref(batches.iter())
}

fn available_kg_ref<'a>(batches: impl Iterator<Item = &'a BatchDoc>) -> Decimal {
    batches
        .filter(|b| b.sale.is_none())
        .filter_map(|b| b.storage.as_ref().and_then(|s| s.net_weight_kg))
        .sum()
}

fn monthly_pulp_kg<'a>(pulps: impl Iterator<Item = &'a PulpDoc>) -> Vec<MonthlyAmount> {
    let mut by_month: BTreeMap<(i32, u32), Decimal> = BTreeMap::new();
    for pulp in pulps {
        let (Some(date), Some(kg)) = (pulp.collection_date, pulp.weight_kg) else {
            continue;
        };
        *by_month
            .entry((date.year(), date.month()))
            .or_insert(Decimal::ZERO) += kg;
    }
    monthly_vec(by_month)
}

fn monthly_sales_usd<'a>(batches: impl Iterator<Item = &'a BatchDoc>) -> Vec<MonthlyAmount> {
    let mut by_month: BTreeMap<(i32, u32), Decimal> = BTreeMap::new();
    for batch in batches {
        let Some(sale) = batch.sale.as_ref() else {
            continue;
        };
        let (Some(date), Some(price), Some(kg)) =
            (sale.sale_date, sale.price_per_kg_usd, sale.total_weight_kg)
        else {
            continue;
        };
        *by_month
            .entry((date.year(), date.month()))
            .or_insert(Decimal::ZERO) += price * kg;
    }
    monthly_vec(by_month)
}

fn monthly_vec(by_month: BTreeMap<(i32, u32), Decimal>) -> Vec<MonthlyAmount> {
    by_month
        .into_iter()
        .map(|((year, month), amount)| MonthlyAmount {
            year,
            month,
            amount,
        })
        .collect()
}

/// Average per-kg price across organic-flagged sales; zero when none exist.
fn organic_price_usd<'a>(batches: impl Iterator<Item = &'a BatchDoc>) -> Decimal {
    let prices: Vec<Decimal> = batches
        .filter_map(|b| b.sale.as_ref())
        .filter(|s| s.organic == Some(true))
        .filter_map(|s| s.price_per_kg_usd)
        .collect();

    if prices.is_empty() {
        return Decimal::ZERO;
    }
    let total: Decimal = prices.iter().copied().sum();
    total / Decimal::from(prices.len() as u64)
}

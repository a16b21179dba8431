//! Role-scoped reporting
//!
//! Derived statistics over producers plus the three report views served to
//! project, association, and public callers.

pub mod aggregator;
pub mod stats;

pub use aggregator::{
    AssociationReport, MonthlyAmount, ProjectReport, PublicReport, RegionProduction,
    ReportAggregator, ReportView,
};
pub use stats::ProducerStats;

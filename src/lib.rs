//! # Farm Financial Views
//!
//! Reconciles weekly records from a farm's separate subsystems (labor time
//! tracking, sales orders, harvest yields, general-ledger postings and budget
//! forecasts) into per-week financial views.
//!
//! ## Core Concepts
//!
//! - **Week bucket**: every record date is moved back to the configured week start,
//!   and all grouping happens per (week, dimension)
//! - **Outer join with zero-fill**: a key present in one source but not another is kept,
//!   and the missing measure reads as `0`
//! - **Undefined marker**: a ratio with a zero denominator is `Value::Undefined`, never `0`
//! - **High-level category**: GL labels rolled up through a static [`CategoryMapping`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use farm_financial_views::*;
//! use chrono::NaiveDate;
//!
//! let snapshot = FarmSnapshot {
//!     sales: vec![SalesRecord {
//!         week: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!         crop: "Strawberry".to_string(),
//!         total_sales: 1000.0,
//!     }],
//!     ..Default::default()
//! };
//!
//! let dashboard = FarmDashboard::new(DashboardConfig::default());
//! let roi = dashboard.render("Crop ROI", &snapshot).unwrap();
//! println!("{}", roi.long_form.to_markdown().unwrap());
//! ```

pub mod aggregate;
pub mod category;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod join;
pub mod metrics;
pub mod pivot;
pub mod schema;
pub mod table;
pub mod utils;
pub mod views;

pub use aggregate::{aggregate, aggregate_measures, Measure, Reduction};
pub use category::{remap, remap_into, CategoryMapping};
pub use config::{DashboardConfig, WeekStart};
pub use error::{FarmViewsError, Result};
pub use ingestion::*;
pub use join::{concat, outer_join};
pub use metrics::{defined_mean, derive, difference, ratio, MetricKind, MetricRule};
pub use pivot::{pivot, ColumnKey, PivotTable};
pub use schema::*;
pub use table::{Field, FieldKind, Table, Value};
pub use utils::*;
pub use views::{assemble, ViewAssembler, ViewDisplay, ViewKind, ViewOutput};

use log::{debug, info};
use std::collections::BTreeMap;

/// Entry point tying a configuration to the view pipelines.
pub struct FarmDashboard {
    config: DashboardConfig,
}

impl FarmDashboard {
    pub fn new(config: DashboardConfig) -> Self {
        Self { config }
    }

    pub fn try_new(config: DashboardConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn source_tables(&self, snapshot: &FarmSnapshot) -> Result<SourceTables> {
        debug!(
            "Building source tables from {} records (week starts {:?})",
            snapshot.total_records(),
            self.config.week_start
        );
        snapshot.to_source_tables(self.config.week_start.weekday())
    }

    pub fn assemble(&self, view_name: &str, inputs: &SourceTables) -> Result<ViewOutput> {
        ViewAssembler::new(&self.config).assemble(view_name, inputs)
    }

    /// Builds one view straight from typed records.
    pub fn render(&self, view_name: &str, snapshot: &FarmSnapshot) -> Result<ViewOutput> {
        let kind: ViewKind = view_name.parse()?;
        let inputs = self.source_tables(snapshot)?;
        ViewAssembler::new(&self.config).assemble_view(kind, &inputs)
    }

    /// Builds every view from the same snapshot.
    pub fn render_all(&self, snapshot: &FarmSnapshot) -> Result<BTreeMap<ViewKind, ViewOutput>> {
        if self.config.farm_name.is_empty() {
            info!("Rendering {} views", ViewKind::ALL.len());
        } else {
            info!(
                "Rendering {} views for farm: {}",
                ViewKind::ALL.len(),
                self.config.farm_name
            );
        }

        let inputs = self.source_tables(snapshot)?;
        let assembler = ViewAssembler::new(&self.config);

        let mut outputs = BTreeMap::new();
        for kind in ViewKind::ALL {
            outputs.insert(kind, assembler.assemble_view(kind, &inputs)?);
        }

        Ok(outputs)
    }
}

impl Default for FarmDashboard {
    fn default() -> Self {
        Self::new(DashboardConfig::default())
    }
}

//! The four dashboard views.
//!
//! Each view is a pure function of the source tables: aggregate per
//! (week, dimension), join or stack the sources, derive metrics, then reshape
//! for charting. Nothing is cached between calls.

use crate::aggregate::{aggregate, aggregate_measures, Measure};
use crate::category::{remap_into, CategoryMapping};
use crate::config::DashboardConfig;
use crate::error::{FarmViewsError, Result};
use crate::join::{concat, outer_join};
use crate::metrics::{derive, MetricRule};
use crate::pivot::{pivot, PivotTable};
use crate::schema::{columns, Source, SourceTables};
use crate::table::{Table, Value};
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const ACTUAL_SOURCE: &str = "Actual";
pub const BUDGET_SOURCE: &str = "Budget";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ViewKind {
    CropRoi,
    LaborCostByJobType,
    LaborBudgetVsActual,
    GlActualVsBudget,
}

impl ViewKind {
    pub const ALL: [ViewKind; 4] = [
        ViewKind::CropRoi,
        ViewKind::LaborCostByJobType,
        ViewKind::LaborBudgetVsActual,
        ViewKind::GlActualVsBudget,
    ];

    pub fn title(self) -> &'static str {
        match self {
            ViewKind::CropRoi => "Crop ROI",
            ViewKind::LaborCostByJobType => "Labor Cost by Job Type",
            ViewKind::LaborBudgetVsActual => "Labor Budget vs Actual",
            ViewKind::GlActualVsBudget => "GL Actual vs Budget",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            ViewKind::CropRoi => "crop_roi",
            ViewKind::LaborCostByJobType => "labor_cost_by_job_type",
            ViewKind::LaborBudgetVsActual => "labor_budget_vs_actual",
            ViewKind::GlActualVsBudget => "gl_actual_vs_budget",
        }
    }

    /// Source tables the view reads.
    pub fn sources(self) -> &'static [Source] {
        match self {
            ViewKind::CropRoi => &[Source::Sales, Source::Harvest, Source::Labor],
            ViewKind::LaborCostByJobType => &[Source::Labor],
            ViewKind::LaborBudgetVsActual => &[Source::Labor, Source::Budget],
            ViewKind::GlActualVsBudget => &[Source::GeneralLedger, Source::Budget],
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}

impl FromStr for ViewKind {
    type Err = FarmViewsError;

    /// Accepts the display title or the slug, ignoring case.
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        ViewKind::ALL
            .into_iter()
            .find(|kind| {
                kind.title().eq_ignore_ascii_case(wanted) || kind.slug().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| FarmViewsError::UnknownView(s.to_string()))
    }
}

/// Chart-ready form of a view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ViewDisplay {
    /// Rows are weeks, columns are dimension labels.
    Pivot(PivotTable),
    /// One long-form sub-table per group value (the crew).
    ByGroup(BTreeMap<String, Table>),
}

impl ViewDisplay {
    pub fn as_pivot(&self) -> Option<&PivotTable> {
        match self {
            ViewDisplay::Pivot(p) => Some(p),
            ViewDisplay::ByGroup(_) => None,
        }
    }

    pub fn as_groups(&self) -> Option<&BTreeMap<String, Table>> {
        match self {
            ViewDisplay::Pivot(_) => None,
            ViewDisplay::ByGroup(groups) => Some(groups),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewOutput {
    pub kind: ViewKind,
    /// Sorted by week, then dimension.
    pub long_form: Table,
    pub display: ViewDisplay,
}

pub struct ViewAssembler<'a> {
    config: &'a DashboardConfig,
}

impl<'a> ViewAssembler<'a> {
    pub fn new(config: &'a DashboardConfig) -> Self {
        Self { config }
    }

    pub fn assemble(&self, view_name: &str, inputs: &SourceTables) -> Result<ViewOutput> {
        let kind: ViewKind = view_name.parse()?;
        self.assemble_view(kind, inputs)
    }

    pub fn assemble_view(&self, kind: ViewKind, inputs: &SourceTables) -> Result<ViewOutput> {
        info!("Assembling view '{}'", kind);

        let output = match kind {
            ViewKind::CropRoi => self.crop_roi(inputs),
            ViewKind::LaborCostByJobType => self.labor_cost_by_job_type(inputs),
            ViewKind::LaborBudgetVsActual => self.labor_budget_vs_actual(inputs),
            ViewKind::GlActualVsBudget => self.gl_actual_vs_budget(inputs),
        }?;

        debug!(
            "View '{}' produced {} long-form rows",
            kind,
            output.long_form.len()
        );

        Ok(output)
    }

    fn crop_roi(&self, inputs: &SourceTables) -> Result<ViewOutput> {
        let keys = [columns::WEEK, columns::CROP];

        let sales = aggregate(inputs.get(Source::Sales)?, &keys, columns::TOTAL_SALES)?;
        let harvest = aggregate(inputs.get(Source::Harvest)?, &keys, columns::POUNDS_HARVESTED)?;
        let labor = aggregate(inputs.get(Source::Labor)?, &keys, columns::TOTAL_PAY)?;

        let joined = outer_join(&[sales, harvest, labor], &keys)?;
        let derived = derive(
            &joined,
            &[
                MetricRule::difference(columns::NET_RETURN, columns::TOTAL_SALES, columns::TOTAL_PAY),
                MetricRule::ratio(columns::ROI_PER_LB, columns::NET_RETURN, columns::POUNDS_HARVESTED),
            ],
        )?;

        let long_form = derived
            .with_name(ViewKind::CropRoi.title())
            .sort_by_fields(&keys)?;
        let chart = pivot(
            &long_form,
            columns::WEEK,
            &[columns::CROP],
            columns::ROI_PER_LB,
            Value::Undefined,
        )?;

        Ok(ViewOutput {
            kind: ViewKind::CropRoi,
            long_form,
            display: ViewDisplay::Pivot(chart),
        })
    }

    fn labor_cost_by_job_type(&self, inputs: &SourceTables) -> Result<ViewOutput> {
        let keys = [columns::WEEK, columns::JOB_TYPE];

        let long_form = aggregate(inputs.get(Source::Labor)?, &keys, columns::TOTAL_PAY)?
            .with_name(ViewKind::LaborCostByJobType.title())
            .sort_by_fields(&keys)?;
        let chart = pivot(
            &long_form,
            columns::WEEK,
            &[columns::JOB_TYPE],
            columns::TOTAL_PAY,
            Value::Number(0.0),
        )?;

        Ok(ViewOutput {
            kind: ViewKind::LaborCostByJobType,
            long_form,
            display: ViewDisplay::Pivot(chart),
        })
    }

    fn labor_budget_vs_actual(&self, inputs: &SourceTables) -> Result<ViewOutput> {
        let keys = [columns::WEEK, columns::CREW];

        let actual = aggregate_measures(
            inputs.get(Source::Labor)?,
            &keys,
            &[
                Measure::count_distinct(columns::WORKER_ID, columns::UNIQUE_WORKERS),
                Measure::sum(columns::REGULAR_HOURS),
                Measure::sum(columns::OVERTIME_HOURS),
                Measure::sum(columns::TOTAL_PAY),
            ],
        )?;
        let forecast = aggregate(inputs.get(Source::Budget)?, &keys, columns::TOTAL_PAY_FORECAST)?;

        let joined = outer_join(&[actual, forecast], &keys)?;
        let derived = derive(
            &joined,
            &[MetricRule::difference(
                columns::VARIANCE,
                columns::TOTAL_PAY,
                columns::TOTAL_PAY_FORECAST,
            )],
        )?;

        let long_form = derived
            .with_name(ViewKind::LaborBudgetVsActual.title())
            .sort_by_fields(&keys)?;

        let mut groups = BTreeMap::new();
        for crew in long_form.distinct(columns::CREW)? {
            let label = crew.to_string();
            let crew_table = long_form
                .filter_eq(columns::CREW, &crew)?
                .drop_field(columns::CREW)?
                .with_name(format!("{} - {}", ViewKind::LaborBudgetVsActual.title(), label));
            groups.insert(label, crew_table);
        }

        Ok(ViewOutput {
            kind: ViewKind::LaborBudgetVsActual,
            long_form,
            display: ViewDisplay::ByGroup(groups),
        })
    }

    fn gl_actual_vs_budget(&self, inputs: &SourceTables) -> Result<ViewOutput> {
        let keys = [columns::WEEK, columns::HIGH_LEVEL_CATEGORY];

        let actual = remap_into(
            inputs.get(Source::GeneralLedger)?,
            columns::GL_CATEGORY,
            columns::HIGH_LEVEL_CATEGORY,
            &self.config.gl_mapping,
        )?;
        let actual = aggregate(&actual, &keys, columns::AMOUNT)?
            .with_constant(columns::SOURCE, Value::text(ACTUAL_SOURCE))?;

        let budget_mapping = CategoryMapping::new(self.config.budget_high_level_category.clone())
            .with(
                self.config.budget_category_label.clone(),
                self.config.budget_high_level_category.clone(),
            );
        let budget = inputs
            .get(Source::Budget)?
            .with_constant(columns::GL_CATEGORY, Value::text(self.config.budget_category_label.clone()))?;
        let budget = remap_into(
            &budget,
            columns::GL_CATEGORY,
            columns::HIGH_LEVEL_CATEGORY,
            &budget_mapping,
        )?;
        let budget = aggregate(&budget, &keys, columns::TOTAL_PAY_FORECAST)?
            .rename_field(columns::TOTAL_PAY_FORECAST, columns::AMOUNT)?
            .with_constant(columns::SOURCE, Value::text(BUDGET_SOURCE))?;

        debug!(
            "Stacking {} actual and {} budget GL rows",
            actual.len(),
            budget.len()
        );

        let long_form = concat(&[actual, budget])?
            .with_name(ViewKind::GlActualVsBudget.title())
            .sort_by_fields(&[columns::WEEK, columns::HIGH_LEVEL_CATEGORY, columns::SOURCE])?;
        let chart = pivot(
            &long_form,
            columns::WEEK,
            &[columns::HIGH_LEVEL_CATEGORY, columns::SOURCE],
            columns::AMOUNT,
            Value::Number(0.0),
        )?;

        Ok(ViewOutput {
            kind: ViewKind::GlActualVsBudget,
            long_form,
            display: ViewDisplay::Pivot(chart),
        })
    }
}

/// Assembles `view_name` with the default configuration.
pub fn assemble(view_name: &str, inputs: &SourceTables) -> Result<ViewOutput> {
    let config = DashboardConfig::default();
    ViewAssembler::new(&config).assemble(view_name, inputs)
}

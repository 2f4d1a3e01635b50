use crate::error::{FarmViewsError, Result};
use crate::table::{Field, Table, Value};
use crate::utils::{deserialize_amount, deserialize_week_date};
use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Column names as they appear in the farm's CSV exports and in every view.
pub mod columns {
    pub const WEEK: &str = "Week Start Date";
    pub const CROP: &str = "Crop";
    pub const JOB_TYPE: &str = "Job Type";
    pub const CREW: &str = "Crew";
    pub const WORKER_ID: &str = "Worker ID";
    pub const REGULAR_HOURS: &str = "Regular Hours";
    pub const OVERTIME_HOURS: &str = "Overtime Hours";
    pub const TOTAL_PAY: &str = "Total Pay ($)";
    pub const TOTAL_SALES: &str = "Total Sales ($)";
    pub const POUNDS_HARVESTED: &str = "Pounds Harvested";
    pub const GL_CATEGORY: &str = "GL Category";
    pub const AMOUNT: &str = "Amount ($)";
    pub const TOTAL_PAY_FORECAST: &str = "Total Pay Forecast ($)";

    pub const HIGH_LEVEL_CATEGORY: &str = "High-Level Category";
    pub const SOURCE: &str = "Source";
    pub const NET_RETURN: &str = "Net Return ($)";
    pub const ROI_PER_LB: &str = "ROI per lb";
    pub const UNIQUE_WORKERS: &str = "Unique Workers";
    pub const VARIANCE: &str = "Variance ($)";
}

/// The five subsystems feeding the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Source {
    Labor,
    Sales,
    Harvest,
    GeneralLedger,
    Budget,
}

impl Source {
    pub const ALL: [Source; 5] = [
        Source::Labor,
        Source::Sales,
        Source::Harvest,
        Source::GeneralLedger,
        Source::Budget,
    ];

    pub fn table_name(self) -> &'static str {
        match self {
            Source::Labor => "labor",
            Source::Sales => "sales",
            Source::Harvest => "harvest",
            Source::GeneralLedger => "gl",
            Source::Budget => "budget",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table_name())
    }
}

/// The currently loaded snapshot of source tables.
#[derive(Debug, Clone, Default)]
pub struct SourceTables {
    tables: BTreeMap<Source, Table>,
}

impl SourceTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: Source, table: Table) -> Self {
        self.insert(source, table);
        self
    }

    pub fn insert(&mut self, source: Source, table: Table) {
        self.tables.insert(source, table);
    }

    pub fn get(&self, source: Source) -> Result<&Table> {
        self.tables
            .get(&source)
            .ok_or(FarmViewsError::MissingSource(source))
    }

    pub fn contains(&self, source: Source) -> bool {
        self.tables.contains_key(&source)
    }
}

/// A typed source row that can be laid out as a table row.
pub trait WeeklyRecord {
    const SOURCE: Source;

    fn week(&self) -> NaiveDate;

    /// Schema of everything but the week field.
    fn fields() -> Vec<Field>;

    fn values(&self) -> Vec<Value>;
}

/// Builds a table whose first field is the week bucket of each record.
pub fn records_to_table<R: WeeklyRecord>(records: &[R], start: Weekday) -> Result<Table> {
    let mut fields = vec![Field::week(columns::WEEK)];
    fields.extend(R::fields());

    let rows = records
        .iter()
        .map(|record| {
            let mut row = vec![Value::Week(record.week())];
            row.extend(record.values());
            row
        })
        .collect();

    Table::from_weekly_rows(R::SOURCE.table_name(), fields, rows, start)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaborRecord {
    #[serde(rename = "Week Start Date", deserialize_with = "deserialize_week_date")]
    pub week: NaiveDate,
    #[serde(rename = "Crop")]
    pub crop: String,
    #[serde(rename = "Job Type")]
    pub job_type: String,
    #[serde(rename = "Crew")]
    pub crew: String,
    #[serde(rename = "Worker ID")]
    pub worker_id: String,
    #[serde(rename = "Regular Hours", deserialize_with = "deserialize_amount")]
    pub regular_hours: f64,
    #[serde(rename = "Overtime Hours", deserialize_with = "deserialize_amount")]
    pub overtime_hours: f64,
    #[serde(rename = "Total Pay ($)", deserialize_with = "deserialize_amount")]
    pub total_pay: f64,
}

impl WeeklyRecord for LaborRecord {
    const SOURCE: Source = Source::Labor;

    fn week(&self) -> NaiveDate {
        self.week
    }

    fn fields() -> Vec<Field> {
        vec![
            Field::text(columns::CROP),
            Field::text(columns::JOB_TYPE),
            Field::text(columns::CREW),
            Field::text(columns::WORKER_ID),
            Field::number(columns::REGULAR_HOURS),
            Field::number(columns::OVERTIME_HOURS),
            Field::number(columns::TOTAL_PAY),
        ]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::text(&self.crop),
            Value::text(&self.job_type),
            Value::text(&self.crew),
            Value::text(&self.worker_id),
            Value::Number(self.regular_hours),
            Value::Number(self.overtime_hours),
            Value::Number(self.total_pay),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    #[serde(rename = "Week Start Date", deserialize_with = "deserialize_week_date")]
    pub week: NaiveDate,
    #[serde(rename = "Crop")]
    pub crop: String,
    #[serde(rename = "Total Sales ($)", deserialize_with = "deserialize_amount")]
    pub total_sales: f64,
}

impl WeeklyRecord for SalesRecord {
    const SOURCE: Source = Source::Sales;

    fn week(&self) -> NaiveDate {
        self.week
    }

    fn fields() -> Vec<Field> {
        vec![
            Field::text(columns::CROP),
            Field::number(columns::TOTAL_SALES),
        ]
    }

    fn values(&self) -> Vec<Value> {
        vec![Value::text(&self.crop), Value::Number(self.total_sales)]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestRecord {
    #[serde(rename = "Week Start Date", deserialize_with = "deserialize_week_date")]
    pub week: NaiveDate,
    #[serde(rename = "Crop")]
    pub crop: String,
    #[serde(rename = "Pounds Harvested", deserialize_with = "deserialize_amount")]
    pub pounds_harvested: f64,
}

impl WeeklyRecord for HarvestRecord {
    const SOURCE: Source = Source::Harvest;

    fn week(&self) -> NaiveDate {
        self.week
    }

    fn fields() -> Vec<Field> {
        vec![
            Field::text(columns::CROP),
            Field::number(columns::POUNDS_HARVESTED),
        ]
    }

    fn values(&self) -> Vec<Value> {
        vec![Value::text(&self.crop), Value::Number(self.pounds_harvested)]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlRecord {
    #[serde(rename = "Week Start Date", deserialize_with = "deserialize_week_date")]
    pub week: NaiveDate,
    #[serde(rename = "GL Category")]
    pub gl_category: String,
    #[serde(rename = "Amount ($)", deserialize_with = "deserialize_amount")]
    pub amount: f64,
}

impl WeeklyRecord for GlRecord {
    const SOURCE: Source = Source::GeneralLedger;

    fn week(&self) -> NaiveDate {
        self.week
    }

    fn fields() -> Vec<Field> {
        vec![
            Field::text(columns::GL_CATEGORY),
            Field::number(columns::AMOUNT),
        ]
    }

    fn values(&self) -> Vec<Value> {
        vec![Value::text(&self.gl_category), Value::Number(self.amount)]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetRecord {
    #[serde(rename = "Week Start Date", deserialize_with = "deserialize_week_date")]
    pub week: NaiveDate,
    #[serde(rename = "Crew")]
    pub crew: String,
    #[serde(rename = "Total Pay Forecast ($)", deserialize_with = "deserialize_amount")]
    pub total_pay_forecast: f64,
}

impl WeeklyRecord for BudgetRecord {
    const SOURCE: Source = Source::Budget;

    fn week(&self) -> NaiveDate {
        self.week
    }

    fn fields() -> Vec<Field> {
        vec![
            Field::text(columns::CREW),
            Field::number(columns::TOTAL_PAY_FORECAST),
        ]
    }

    fn values(&self) -> Vec<Value> {
        vec![Value::text(&self.crew), Value::Number(self.total_pay_forecast)]
    }
}

/// Typed records from all five subsystems.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FarmSnapshot {
    pub labor: Vec<LaborRecord>,
    pub sales: Vec<SalesRecord>,
    pub harvest: Vec<HarvestRecord>,
    pub gl: Vec<GlRecord>,
    pub budget: Vec<BudgetRecord>,
}

impl FarmSnapshot {
    pub fn to_source_tables(&self, start: Weekday) -> Result<SourceTables> {
        Ok(SourceTables::new()
            .with(Source::Labor, records_to_table(&self.labor, start)?)
            .with(Source::Sales, records_to_table(&self.sales, start)?)
            .with(Source::Harvest, records_to_table(&self.harvest, start)?)
            .with(Source::GeneralLedger, records_to_table(&self.gl, start)?)
            .with(Source::Budget, records_to_table(&self.budget, start)?))
    }

    pub fn total_records(&self) -> usize {
        self.labor.len() + self.sales.len() + self.harvest.len() + self.gl.len() + self.budget.len()
    }
}

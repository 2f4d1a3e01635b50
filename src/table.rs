//! In-memory tabular data shared by every pipeline stage.
//!
//! A [`Table`] is a named polars [`DataFrame`] restricted to three column
//! kinds: week buckets (`Date`), text (`String`) and numbers (`Float64`).
//! A null number is the undefined marker. Stages never mutate a table they
//! received; every helper here returns a fresh table.
//!
//! Week columns always hold week buckets: dates are moved back to the table's
//! week start when the table is built, so grouping on a week column groups by
//! week, never by exact day.

use crate::error::{FarmViewsError, Result};
use crate::utils::{date_from_epoch_days, epoch_days, week_start};
use chrono::{NaiveDate, Weekday};
use polars::prelude::{
    col, lit, AnyValue, Column, DataFrame, DataType, Expr, IntoLazy, LazyFrame, NamedFrom, Series,
    SortMultipleOptions, NULL,
};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// A single cell.
///
/// `Undefined` marks a derived number whose denominator was zero. It is kept
/// distinct from `Number(0.0)` all the way to presentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Week(NaiveDate),
    Text(String),
    Number(f64),
    Undefined,
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_week(&self) -> Option<NaiveDate> {
        match self {
            Value::Week(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Week(_) => 0,
            Value::Text(_) => 1,
            Value::Number(_) => 2,
            Value::Undefined => 3,
        }
    }

    /// Total order used for sorting distinct values and index lookups.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Week(a), Value::Week(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    /// Literal expression holding this value, typed like its column.
    pub(crate) fn to_lit(&self) -> Expr {
        match self {
            Value::Week(d) => lit(epoch_days(*d)).cast(DataType::Date),
            Value::Text(s) => lit(s.clone()),
            Value::Number(n) => lit(*n),
            Value::Undefined => lit(NULL).cast(DataType::Float64),
        }
    }

    fn from_any(value: AnyValue<'_>) -> Value {
        match value {
            AnyValue::Null => Value::Undefined,
            AnyValue::Date(days) => date_from_epoch_days(days)
                .map(Value::Week)
                .unwrap_or(Value::Undefined),
            AnyValue::String(s) => Value::text(s),
            AnyValue::StringOwned(s) => Value::text(s.as_str()),
            AnyValue::Float64(n) => Value::Number(n),
            other => other
                .extract::<f64>()
                .map(Value::Number)
                .unwrap_or(Value::Undefined),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Week(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Text(s) => write!(f, "{}", s),
            Value::Number(n) => write!(f, "{}", n),
            Value::Undefined => write!(f, "n/a"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    Week,
    Text,
    /// Numeric measure. May hold `Value::Undefined`.
    Number,
}

impl FieldKind {
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (FieldKind::Week, Value::Week(_))
                | (FieldKind::Text, Value::Text(_))
                | (FieldKind::Number, Value::Number(_))
                | (FieldKind::Number, Value::Undefined)
        )
    }

    fn of(dtype: &DataType) -> FieldKind {
        match dtype {
            DataType::Date => FieldKind::Week,
            DataType::String => FieldKind::Text,
            _ => FieldKind::Number,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Week => "week",
            FieldKind::Text => "text",
            FieldKind::Number => "number",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn week(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Week)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number)
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    frame: DataFrame,
    week_starts_on: Weekday,
}

impl Table {
    /// Builds a table with Monday week buckets.
    pub fn from_rows(name: impl Into<String>, fields: Vec<Field>, rows: Vec<Vec<Value>>) -> Result<Self> {
        Self::from_weekly_rows(name, fields, rows, Weekday::Mon)
    }

    /// Builds a table after checking arity and per-field kinds. Every week
    /// value is moved back to the most recent `week_starts_on` day.
    pub fn from_weekly_rows(
        name: impl Into<String>,
        fields: Vec<Field>,
        rows: Vec<Vec<Value>>,
        week_starts_on: Weekday,
    ) -> Result<Self> {
        let name = name.into();

        for row in &rows {
            if row.len() != fields.len() {
                return Err(FarmViewsError::SchemaMismatch {
                    field: name.clone(),
                    details: format!(
                        "row has {} values but the schema has {} fields",
                        row.len(),
                        fields.len()
                    ),
                });
            }
            for (field, value) in fields.iter().zip(row) {
                if !field.kind.accepts(value) {
                    return Err(FarmViewsError::SchemaMismatch {
                        field: field.name.clone(),
                        details: format!("value '{}' is not a {}", value, field.kind),
                    });
                }
            }
        }

        let mut columns: Vec<Column> = Vec::with_capacity(fields.len());
        for (idx, field) in fields.iter().enumerate() {
            let series = match field.kind {
                FieldKind::Week => {
                    let days: Vec<i32> = rows
                        .iter()
                        .filter_map(|row| row[idx].as_week())
                        .map(|d| epoch_days(week_start(d, week_starts_on)))
                        .collect();
                    Series::new(field.name.as_str().into(), days).cast(&DataType::Date)?
                }
                FieldKind::Text => {
                    let labels: Vec<&str> = rows
                        .iter()
                        .map(|row| row[idx].as_text().unwrap_or_default())
                        .collect();
                    Series::new(field.name.as_str().into(), labels)
                }
                FieldKind::Number => {
                    let numbers: Vec<Option<f64>> =
                        rows.iter().map(|row| row[idx].as_number()).collect();
                    Series::new(field.name.as_str().into(), numbers)
                }
            };
            columns.push(series.into());
        }

        Ok(Self {
            name,
            frame: DataFrame::new(columns)?,
            week_starts_on,
        })
    }

    /// Wraps a frame produced from tables that share `week_starts_on`.
    pub(crate) fn from_frame(name: impl Into<String>, frame: DataFrame, week_starts_on: Weekday) -> Self {
        Self {
            name: name.into(),
            frame,
            week_starts_on,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn week_starts_on(&self) -> Weekday {
        self.week_starts_on
    }

    pub(crate) fn lazy(&self) -> LazyFrame {
        self.frame.clone().lazy()
    }

    fn derived(&self, frame: DataFrame) -> Table {
        Table::from_frame(self.name.clone(), frame, self.week_starts_on)
    }

    pub fn fields(&self) -> Vec<Field> {
        self.frame
            .get_columns()
            .iter()
            .map(|c| Field::new(c.name().as_str(), FieldKind::of(c.dtype())))
            .collect()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.frame
            .get_columns()
            .iter()
            .map(|c| c.name().as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field_names().contains(&name)
    }

    pub fn field(&self, name: &str) -> Result<Field> {
        self.fields()
            .into_iter()
            .find(|f| f.name == name)
            .ok_or_else(|| FarmViewsError::InvalidField {
                table: self.name.clone(),
                field: name.to_string(),
            })
    }

    pub(crate) fn column(&self, name: &str) -> Result<&Column> {
        self.field(name)?;
        Ok(self.frame.column(name)?)
    }

    pub fn column_values(&self, name: &str) -> Result<Vec<Value>> {
        let column = self.column(name)?;
        (0..self.len())
            .map(|i| Ok(Value::from_any(column.get(i)?)))
            .collect()
    }

    pub fn row(&self, index: usize) -> Result<Vec<Value>> {
        self.frame
            .get_columns()
            .iter()
            .map(|c| Ok(Value::from_any(c.get(index)?)))
            .collect()
    }

    pub fn rows(&self) -> Result<Vec<Vec<Value>>> {
        (0..self.len()).map(|i| self.row(i)).collect()
    }

    pub fn value(&self, row: usize, field: &str) -> Result<Option<Value>> {
        let column = self.column(field)?;
        if row >= self.len() {
            return Ok(None);
        }
        Ok(Some(Value::from_any(column.get(row)?)))
    }

    /// Sum of every defined number in `field`.
    pub fn sum(&self, field: &str) -> Result<f64> {
        Ok(self
            .column_values(field)?
            .iter()
            .filter_map(Value::as_number)
            .sum())
    }

    pub fn with_name(&self, name: impl Into<String>) -> Table {
        Table::from_frame(name, self.frame.clone(), self.week_starts_on)
    }

    /// Stable sort by the given fields, each ascending.
    pub fn sort_by_fields(&self, fields: &[&str]) -> Result<Table> {
        for field in fields {
            self.field(field)?;
        }
        let by: Vec<Expr> = fields.iter().map(|f| col(*f)).collect();
        let frame = self
            .lazy()
            .sort_by_exprs(by, SortMultipleOptions::default().with_maintain_order(true))
            .collect()?;
        Ok(self.derived(frame))
    }

    /// Rows whose `field` equals `value`.
    pub fn filter_eq(&self, field: &str, value: &Value) -> Result<Table> {
        self.field(field)?;
        let predicate = match value {
            Value::Undefined => col(field).is_null(),
            other => col(field).eq(other.to_lit()),
        };
        let frame = self.lazy().filter(predicate).collect()?;
        Ok(self.derived(frame))
    }

    /// Distinct values of `field` in ascending order.
    pub fn distinct(&self, field: &str) -> Result<Vec<Value>> {
        let mut values = self.column_values(field)?;
        values.sort_by(|a, b| a.total_cmp(b));
        values.dedup_by(|a, b| a.total_cmp(b) == Ordering::Equal);
        Ok(values)
    }

    /// Sets `field` to `value` on every row, appending the field if absent.
    pub fn with_constant(&self, field: &str, value: Value) -> Result<Table> {
        let value = match value {
            Value::Week(d) => Value::Week(week_start(d, self.week_starts_on)),
            other => other,
        };
        let frame = self
            .lazy()
            .with_column(value.to_lit().alias(field))
            .collect()?;
        Ok(self.derived(frame))
    }

    pub fn rename_field(&self, from: &str, to: &str) -> Result<Table> {
        self.field(from)?;
        if from != to && self.has_field(to) {
            return Err(FarmViewsError::SchemaMismatch {
                field: to.to_string(),
                details: format!("table '{}' already has a field named '{}'", self.name, to),
            });
        }

        let projection: Vec<Expr> = self
            .field_names()
            .into_iter()
            .map(|name| if name == from { col(name).alias(to) } else { col(name) })
            .collect();
        let frame = self.lazy().select(projection).collect()?;
        Ok(self.derived(frame))
    }

    pub fn drop_field(&self, field: &str) -> Result<Table> {
        self.field(field)?;
        let projection: Vec<Expr> = self
            .field_names()
            .into_iter()
            .filter(|name| *name != field)
            .map(col)
            .collect();
        let frame = self.lazy().select(projection).collect()?;
        Ok(self.derived(frame))
    }

    /// CSV text with a header row. Undefined cells are left empty.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(self.field_names())?;

        for row in self.rows()? {
            writer.write_record(row.iter().map(csv_cell))?;
        }

        into_csv_string(writer)
    }

    pub fn to_markdown(&self) -> Result<String> {
        let mut output = String::new();

        output.push_str(&format!("## {}\n\n", self.name));
        output.push_str(&format!("| {} |\n", self.field_names().join(" | ")));
        output.push_str(&format!("|{}\n", "---|".repeat(self.frame.width())));

        for row in self.rows()? {
            let cells: Vec<String> = row.iter().map(markdown_cell).collect();
            output.push_str(&format!("| {} |\n", cells.join(" | ")));
        }

        Ok(output)
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.week_starts_on == other.week_starts_on
            && self.fields() == other.fields()
            && matches!((self.rows(), other.rows()), (Ok(a), Ok(b)) if a == b)
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let rows = self.rows().map_err(serde::ser::Error::custom)?;
        let mut state = serializer.serialize_struct("Table", 3)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("fields", &self.fields())?;
        state.serialize_field("rows", &rows)?;
        state.end()
    }
}

pub(crate) fn csv_cell(value: &Value) -> String {
    match value {
        Value::Undefined => String::new(),
        other => other.to_string(),
    }
}

pub(crate) fn markdown_cell(value: &Value) -> String {
    match value {
        Value::Number(n) => format!("{:.2}", n),
        other => other.to_string(),
    }
}

pub(crate) fn into_csv_string(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| FarmViewsError::IoError(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| FarmViewsError::SchemaMismatch {
        field: "csv".to_string(),
        details: e.to_string(),
    })
}

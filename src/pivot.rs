//! Wide-form reshaping for time-series charts.
//!
//! A [`PivotTable`] has one row per index value (the week) and one column per
//! distinct label of the column fields. Cells remember whether the long-form
//! table actually had a value, so a filled cell never masquerades as data.

use crate::error::{FarmViewsError, Result};
use crate::table::{csv_cell, into_csv_string, FieldKind, Table, Value};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

const LABEL_SEPARATOR: &str = " / ";

/// Column identity: one label per column field, in field order.
pub type ColumnKey = Vec<String>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotTable {
    index_field: String,
    value_field: String,
    column_keys: Vec<ColumnKey>,
    columns: Vec<String>,
    index: Vec<Value>,
    cells: Vec<Vec<Option<Value>>>,
    fill: Value,
}

/// Reshapes `table` so rows are `index_field` values, columns are the
/// distinct label tuples of `column_fields` and cells are `value_field`.
/// Absent cells read as `fill`.
///
/// Columns are identified by their label tuple. The display label joins the
/// tuple with `" / "`, so two tuples may share a display label without
/// sharing a column.
pub fn pivot(
    table: &Table,
    index_field: &str,
    column_fields: &[&str],
    value_field: &str,
    fill: Value,
) -> Result<PivotTable> {
    table.field(index_field)?;
    for field in column_fields {
        table.field(field)?;
    }
    let value_kind = table.field(value_field)?.kind;
    if value_kind != FieldKind::Number {
        return Err(FarmViewsError::SchemaMismatch {
            field: value_field.to_string(),
            details: "pivot values must be numeric".to_string(),
        });
    }

    let sorted = table.sort_by_fields(&[index_field])?;
    let index_values = sorted.column_values(index_field)?;
    let label_values = column_fields
        .iter()
        .map(|f| sorted.column_values(f))
        .collect::<Result<Vec<_>>>()?;
    let values = sorted.column_values(value_field)?;

    let mut index: Vec<Value> = Vec::new();
    let mut entries: Vec<BTreeMap<ColumnKey, Value>> = Vec::new();
    let mut keys: BTreeSet<ColumnKey> = BTreeSet::new();

    for (row, (index_value, value)) in index_values.into_iter().zip(values).enumerate() {
        let key: ColumnKey = label_values.iter().map(|c| c[row].to_string()).collect();
        keys.insert(key.clone());

        let same_index = index
            .last()
            .is_some_and(|last: &Value| last.total_cmp(&index_value) == Ordering::Equal);
        if !same_index {
            index.push(index_value.clone());
            entries.push(BTreeMap::new());
        }

        let Some(cells) = entries.last_mut() else {
            continue;
        };
        if cells.contains_key(&key) {
            return Err(FarmViewsError::DuplicatePivotEntry {
                index: index_value.to_string(),
                column: key.join(LABEL_SEPARATOR),
            });
        }
        cells.insert(key, value);
    }

    let column_keys: Vec<ColumnKey> = keys.into_iter().collect();
    let columns = column_keys.iter().map(|k| k.join(LABEL_SEPARATOR)).collect();
    let cells = entries
        .into_iter()
        .map(|mut row| column_keys.iter().map(|k| row.remove(k)).collect())
        .collect();

    Ok(PivotTable {
        index_field: index_field.to_string(),
        value_field: value_field.to_string(),
        column_keys,
        columns,
        index,
        cells,
        fill,
    })
}

impl PivotTable {
    pub fn index_field(&self) -> &str {
        &self.index_field
    }

    pub fn value_field(&self) -> &str {
        &self.value_field
    }

    /// Display labels, in column order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_keys(&self) -> &[ColumnKey] {
        &self.column_keys
    }

    pub fn index(&self) -> &[Value] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn fill(&self) -> &Value {
        &self.fill
    }

    fn row_of(&self, index: &Value) -> Option<usize> {
        self.index
            .iter()
            .position(|v| v.total_cmp(index) == Ordering::Equal)
    }

    /// The value the long-form table held for the first column displayed as
    /// `column`, if any.
    pub fn get(&self, index: &Value, column: &str) -> Option<&Value> {
        let row = self.row_of(index)?;
        let col = self.columns.iter().position(|c| c == column)?;
        self.cells[row][col].as_ref()
    }

    /// The value the long-form table held for the column with label tuple `key`.
    pub fn get_by_key(&self, index: &Value, key: &[&str]) -> Option<&Value> {
        let row = self.row_of(index)?;
        let col = self.column_keys.iter().position(|k| k.iter().eq(key))?;
        self.cells[row][col].as_ref()
    }

    /// The displayed value: the stored one, or the fill when absent.
    pub fn cell(&self, index: &Value, column: &str) -> Value {
        self.get(index, column)
            .cloned()
            .unwrap_or_else(|| self.fill.clone())
    }

    pub fn cell_by_key(&self, index: &Value, key: &[&str]) -> Value {
        self.get_by_key(index, key)
            .cloned()
            .unwrap_or_else(|| self.fill.clone())
    }

    /// Every (index, column key, value) triple taken from the long-form table.
    pub fn entries(&self) -> Vec<(Value, ColumnKey, Value)> {
        let mut out = Vec::new();
        for (idx, row) in self.index.iter().zip(&self.cells) {
            for (column, cell) in self.column_keys.iter().zip(row) {
                if let Some(value) = cell {
                    out.push((idx.clone(), column.clone(), value.clone()));
                }
            }
        }
        out
    }

    /// Filled rows, one per index value, cells ordered as `columns()`.
    pub fn filled_rows(&self) -> Vec<(Value, Vec<Value>)> {
        self.index
            .iter()
            .zip(&self.cells)
            .map(|(idx, row)| {
                let values = row
                    .iter()
                    .map(|c| c.clone().unwrap_or_else(|| self.fill.clone()))
                    .collect();
                (idx.clone(), values)
            })
            .collect()
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        let mut header = vec![self.index_field.clone()];
        header.extend(self.columns.iter().cloned());
        writer.write_record(&header)?;

        for (idx, values) in self.filled_rows() {
            let mut record = vec![idx.to_string()];
            record.extend(values.iter().map(csv_cell));
            writer.write_record(&record)?;
        }

        into_csv_string(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Field;
    use chrono::NaiveDate;

    fn week(d: u32) -> Value {
        Value::Week(NaiveDate::from_ymd_opt(2024, 1, d).unwrap())
    }

    fn jobs(rows: &[(u32, &str, f64)]) -> Table {
        Table::from_rows(
            "jobs",
            vec![Field::week("Week"), Field::text("Job"), Field::number("Pay")],
            rows.iter()
                .map(|(d, job, pay)| vec![week(*d), Value::text(*job), Value::Number(*pay)])
                .collect(),
        )
        .unwrap()
    }

    fn long_form() -> Table {
        jobs(&[(8, "Harvest", 40.0), (1, "Weeding", 10.0), (1, "Harvest", 20.0)])
    }

    #[test]
    fn test_rows_are_weeks_and_columns_are_labels() {
        let pivot = pivot(&long_form(), "Week", &["Job"], "Pay", Value::Number(0.0)).unwrap();

        assert_eq!(pivot.index(), &[week(1), week(8)]);
        assert_eq!(pivot.columns(), &["Harvest".to_string(), "Weeding".to_string()]);
        assert_eq!(pivot.cell(&week(1), "Weeding"), Value::Number(10.0));
        assert_eq!(pivot.cell(&week(8), "Weeding"), Value::Number(0.0));
        assert_eq!(pivot.get(&week(8), "Weeding"), None);
    }

    #[test]
    fn test_reshape_is_lossless() {
        let table = long_form();
        let pivot = pivot(&table, "Week", &["Job"], "Pay", Value::Undefined).unwrap();

        assert_eq!(pivot.entries().len(), table.len());
        for row in table.rows().unwrap() {
            let label = row[1].as_text().unwrap();
            assert_eq!(pivot.get_by_key(&row[0], &[label]), Some(&row[2]));
        }
    }

    #[test]
    fn test_multi_field_labels() {
        let table = long_form().with_constant("Source", Value::text("Actual")).unwrap();
        let pivot = pivot(&table, "Week", &["Job", "Source"], "Pay", Value::Number(0.0)).unwrap();
        assert_eq!(pivot.columns()[0], "Harvest / Actual");
        assert_eq!(
            pivot.column_keys()[0],
            vec!["Harvest".to_string(), "Actual".to_string()]
        );
    }

    #[test]
    fn test_labels_containing_separator_stay_distinct() {
        let table = Table::from_rows(
            "gl",
            vec![
                Field::week("Week"),
                Field::text("Category"),
                Field::text("Source"),
                Field::number("Amount"),
            ],
            vec![
                vec![week(1), Value::text("Seed / Plants"), Value::text("Actual"), Value::Number(5.0)],
                vec![week(1), Value::text("Seed"), Value::text("Plants / Actual"), Value::Number(7.0)],
            ],
        )
        .unwrap();

        let pivot = pivot(&table, "Week", &["Category", "Source"], "Amount", Value::Number(0.0)).unwrap();

        assert_eq!(pivot.column_keys().len(), 2);
        assert_eq!(pivot.columns()[0], pivot.columns()[1]);
        assert_eq!(
            pivot.cell_by_key(&week(1), &["Seed / Plants", "Actual"]),
            Value::Number(5.0)
        );
        assert_eq!(
            pivot.cell_by_key(&week(1), &["Seed", "Plants / Actual"]),
            Value::Number(7.0)
        );
    }

    #[test]
    fn test_duplicate_cell_rejected() {
        let table = jobs(&[(1, "Harvest", 20.0), (1, "Weeding", 10.0), (1, "Harvest", 1.0)]);
        assert!(matches!(
            pivot(&table, "Week", &["Job"], "Pay", Value::Number(0.0)),
            Err(FarmViewsError::DuplicatePivotEntry { .. })
        ));
    }

    #[test]
    fn test_csv_output() {
        let pivot = pivot(&long_form(), "Week", &["Job"], "Pay", Value::Undefined).unwrap();
        let csv = pivot.to_csv().unwrap();
        assert_eq!(
            csv,
            "Week,Harvest,Weeding\n2024-01-01,20,10\n2024-01-08,40,\n"
        );
    }
}

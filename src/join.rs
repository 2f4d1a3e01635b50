use crate::error::{FarmViewsError, Result};
use crate::table::{Field, FieldKind, Table};
use log::debug;
use polars::prelude::{
    col, len, lit, when, Expr, JoinArgs, JoinCoalesce, JoinType, LazyFrame, SortMultipleOptions,
    UnionArgs,
};

const ROWS_PER_KEY: &str = "__rows_per_key";

fn presence_marker(pos: usize) -> String {
    format!("__present_{}", pos)
}

/// Full outer join of `tables` on the `on` key fields.
///
/// The output holds one row per key tuple seen in any input, in key order.
/// Every non-key field of every input becomes a column; an input lacking a
/// key tuple contributes `0` to that row rather than a missing value. An
/// undefined cell that an input does hold stays undefined.
pub fn outer_join(tables: &[Table], on: &[&str]) -> Result<Table> {
    let first = tables.first().ok_or_else(|| FarmViewsError::SchemaMismatch {
        field: on.join(", "),
        details: "outer join needs at least one table".to_string(),
    })?;
    if on.is_empty() {
        return Err(FarmViewsError::SchemaMismatch {
            field: first.name().to_string(),
            details: "outer join needs at least one key field".to_string(),
        });
    }

    let mut key_fields = Vec::with_capacity(on.len());
    for key in on {
        key_fields.push(first.field(key).map_err(|_| missing_key(first, key))?);
    }

    // Measure fields per input, in input order.
    let mut measures: Vec<Vec<Field>> = Vec::with_capacity(tables.len());
    let mut seen: Vec<String> = Vec::new();

    for table in tables {
        check_week_start(first, table)?;

        for (key, expected) in on.iter().zip(&key_fields) {
            let actual = table.field(key).map_err(|_| missing_key(table, key))?;
            if actual.kind != expected.kind {
                return Err(FarmViewsError::SchemaMismatch {
                    field: key.to_string(),
                    details: format!(
                        "'{}' is {} in '{}' but {} in '{}'",
                        key,
                        expected.kind,
                        first.name(),
                        actual.kind,
                        table.name()
                    ),
                });
            }
        }

        let mut table_measures = Vec::new();
        for field in table.fields() {
            if on.contains(&field.name.as_str()) {
                continue;
            }
            if field.kind != FieldKind::Number {
                return Err(FarmViewsError::SchemaMismatch {
                    field: field.name.clone(),
                    details: format!(
                        "non-key field in '{}' is {} and cannot be zero-filled",
                        table.name(),
                        field.kind
                    ),
                });
            }
            if seen.contains(&field.name) {
                return Err(FarmViewsError::SchemaMismatch {
                    field: field.name.clone(),
                    details: format!("measure appears in more than one input (again in '{}')", table.name()),
                });
            }
            seen.push(field.name.clone());
            table_measures.push(field);
        }
        measures.push(table_measures);

        check_unique_keys(table, on)?;
    }

    let keys: Vec<Expr> = on.iter().map(|k| col(*k)).collect();
    let marked = |pos: usize, table: &Table| -> LazyFrame {
        table
            .lazy()
            .with_column(lit(true).alias(presence_marker(pos).as_str()))
    };

    let mut joined = marked(0, first);
    for (pos, table) in tables.iter().enumerate().skip(1) {
        joined = joined.join(
            marked(pos, table),
            keys.clone(),
            keys.clone(),
            JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
        );
    }

    let mut projection = keys.clone();
    for (pos, table_measures) in measures.iter().enumerate() {
        let marker = presence_marker(pos);
        for field in table_measures {
            projection.push(
                when(col(marker.as_str()).is_null())
                    .then(lit(0.0))
                    .otherwise(col(field.name.as_str()))
                    .alias(field.name.as_str()),
            );
        }
    }

    let frame = joined
        .select(projection)
        .sort_by_exprs(keys, SortMultipleOptions::default())
        .collect()?;

    let name = tables
        .iter()
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join(" + ");
    let result = Table::from_frame(name, frame, first.week_starts_on());

    debug!(
        "Outer join of {} tables on [{}] produced {} rows",
        tables.len(),
        on.join(", "),
        result.len()
    );

    Ok(result)
}

/// Stacks `tables` row-wise.
///
/// The output schema is the union of input fields in first-seen order. A
/// numeric field missing from one input is zero-filled for that input's rows.
pub fn concat(tables: &[Table]) -> Result<Table> {
    let first = tables.first().ok_or_else(|| FarmViewsError::SchemaMismatch {
        field: "concat".to_string(),
        details: "concat needs at least one table".to_string(),
    })?;

    let mut fields: Vec<Field> = Vec::new();
    for table in tables {
        check_week_start(first, table)?;
        for field in table.fields() {
            match fields.iter().find(|f| f.name == field.name) {
                Some(existing) if existing.kind != field.kind => {
                    return Err(FarmViewsError::SchemaMismatch {
                        field: field.name.clone(),
                        details: format!(
                            "'{}' is {} in one input but {} in '{}'",
                            field.name,
                            existing.kind,
                            field.kind,
                            table.name()
                        ),
                    });
                }
                Some(_) => {}
                None => fields.push(field),
            }
        }
    }

    let mut frames = Vec::with_capacity(tables.len());
    for table in tables {
        let mut projection = Vec::with_capacity(fields.len());
        for field in &fields {
            if table.has_field(&field.name) {
                projection.push(col(field.name.as_str()));
            } else if field.kind == FieldKind::Number {
                projection.push(lit(0.0).alias(field.name.as_str()));
            } else {
                return Err(FarmViewsError::SchemaMismatch {
                    field: field.name.clone(),
                    details: format!(
                        "'{}' lacks {} field and it cannot be zero-filled",
                        table.name(),
                        field.kind
                    ),
                });
            }
        }
        frames.push(table.lazy().select(projection));
    }

    let frame = polars::prelude::concat(frames, UnionArgs::default())?.collect()?;

    let name = tables
        .iter()
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join(" ++ ");

    Ok(Table::from_frame(name, frame, first.week_starts_on()))
}

fn check_week_start(first: &Table, table: &Table) -> Result<()> {
    if table.week_starts_on() != first.week_starts_on() {
        return Err(FarmViewsError::SchemaMismatch {
            field: table.name().to_string(),
            details: format!(
                "weeks start on {} in '{}' but on {} in '{}'",
                first.week_starts_on(),
                first.name(),
                table.week_starts_on(),
                table.name()
            ),
        });
    }
    Ok(())
}

fn check_unique_keys(table: &Table, on: &[&str]) -> Result<()> {
    let keys: Vec<Expr> = on.iter().map(|k| col(*k)).collect();
    let repeated = table
        .lazy()
        .group_by(keys)
        .agg([len().alias(ROWS_PER_KEY)])
        .filter(col(ROWS_PER_KEY).gt(lit(1)))
        .collect()?;

    if repeated.height() > 0 {
        return Err(FarmViewsError::SchemaMismatch {
            field: on.join(", "),
            details: format!(
                "duplicate key tuple in '{}'; aggregate before joining",
                table.name()
            ),
        });
    }
    Ok(())
}

fn missing_key(table: &Table, key: &str) -> FarmViewsError {
    FarmViewsError::SchemaMismatch {
        field: key.to_string(),
        details: format!("join key is not present in '{}'", table.name()),
    }
}

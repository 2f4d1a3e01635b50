use crate::error::{FarmViewsError, Result};
use crate::table::{FieldKind, Table};
use log::debug;
use polars::prelude::{col, lit, when, DataType, Expr, SortMultipleOptions, NULL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Sum,
    CountDistinct,
}

/// One output column of an aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct Measure {
    pub field: String,
    pub reduction: Reduction,
    pub output: String,
}

impl Measure {
    /// Sum of `field`, keeping the field name.
    pub fn sum(field: &str) -> Self {
        Self {
            field: field.to_string(),
            reduction: Reduction::Sum,
            output: field.to_string(),
        }
    }

    pub fn count_distinct(field: &str, output: &str) -> Self {
        Self {
            field: field.to_string(),
            reduction: Reduction::CountDistinct,
            output: output.to_string(),
        }
    }

    fn to_expr(&self) -> Expr {
        let input = col(self.field.as_str());
        let reduced = match self.reduction {
            // Nulls are skipped; a group with no defined cell stays null.
            Reduction::Sum => when(input.clone().count().gt(lit(0)))
                .then(input.sum())
                .otherwise(lit(NULL)),
            Reduction::CountDistinct => input.drop_nulls().n_unique(),
        };
        reduced.cast(DataType::Float64).alias(self.output.as_str())
    }
}

/// Groups `table` by `group_keys` and sums `measure_field` per group.
pub fn aggregate(table: &Table, group_keys: &[&str], measure_field: &str) -> Result<Table> {
    aggregate_measures(table, group_keys, &[Measure::sum(measure_field)])
}

/// Groups `table` by the exact tuple of `group_keys` values and reduces each
/// measure per group.
///
/// Only groups with at least one contributing row are emitted. Output rows are
/// ordered by key. Undefined cells do not contribute to sums; a group whose
/// cells are all undefined sums to `Undefined`. Week keys are already week
/// buckets (see [`Table::from_weekly_rows`]), so days of one week share a group.
pub fn aggregate_measures(
    table: &Table,
    group_keys: &[&str],
    measures: &[Measure],
) -> Result<Table> {
    for key in group_keys {
        table.field(key)?;
    }

    for measure in measures {
        let field = table.field(&measure.field)?;
        if measure.reduction == Reduction::Sum && field.kind != FieldKind::Number {
            return Err(FarmViewsError::SchemaMismatch {
                field: measure.field.clone(),
                details: format!(
                    "cannot sum {} field in table '{}'",
                    field.kind,
                    table.name()
                ),
            });
        }
    }

    let keys: Vec<Expr> = group_keys.iter().map(|k| col(*k)).collect();
    let reductions: Vec<Expr> = measures.iter().map(Measure::to_expr).collect();

    let frame = table
        .lazy()
        .group_by(keys.clone())
        .agg(reductions)
        .sort_by_exprs(keys, SortMultipleOptions::default())
        .collect()?;

    let result = Table::from_frame(
        format!("{} by {}", table.name(), group_keys.join(", ")),
        frame,
        table.week_starts_on(),
    );

    debug!(
        "Aggregated {} rows of '{}' into {} groups",
        table.len(),
        table.name(),
        result.len()
    );

    Ok(result)
}

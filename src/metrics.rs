use crate::error::{FarmViewsError, Result};
use crate::table::{Field, FieldKind, Table, Value};
use log::debug;
use polars::prelude::{col, lit, when, DataType, Expr, NULL};

#[derive(Debug, Clone, PartialEq)]
pub enum MetricKind {
    /// `numerator / denominator`, undefined when the denominator is zero.
    Ratio {
        numerator: String,
        denominator: String,
    },
    /// `minuend - subtrahend`.
    Difference { minuend: String, subtrahend: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricRule {
    pub output: String,
    pub kind: MetricKind,
}

impl MetricRule {
    pub fn ratio(output: &str, numerator: &str, denominator: &str) -> Self {
        Self {
            output: output.to_string(),
            kind: MetricKind::Ratio {
                numerator: numerator.to_string(),
                denominator: denominator.to_string(),
            },
        }
    }

    pub fn difference(output: &str, minuend: &str, subtrahend: &str) -> Self {
        Self {
            output: output.to_string(),
            kind: MetricKind::Difference {
                minuend: minuend.to_string(),
                subtrahend: subtrahend.to_string(),
            },
        }
    }

    fn operands(&self) -> [&str; 2] {
        match &self.kind {
            MetricKind::Ratio {
                numerator,
                denominator,
            } => [numerator.as_str(), denominator.as_str()],
            MetricKind::Difference {
                minuend,
                subtrahend,
            } => [minuend.as_str(), subtrahend.as_str()],
        }
    }

    fn to_expr(&self) -> Expr {
        match &self.kind {
            MetricKind::Ratio {
                numerator,
                denominator,
            } => ratio(numerator, denominator),
            MetricKind::Difference {
                minuend,
                subtrahend,
            } => difference(minuend, subtrahend),
        }
    }
}

/// `numerator / denominator`. A zero denominator yields undefined (null) for
/// any numerator, including zero. An undefined operand stays undefined.
pub fn ratio(numerator: &str, denominator: &str) -> Expr {
    when(col(denominator).eq(lit(0.0)))
        .then(lit(NULL))
        .otherwise(col(numerator) / col(denominator))
        .cast(DataType::Float64)
}

pub fn difference(minuend: &str, subtrahend: &str) -> Expr {
    (col(minuend) - col(subtrahend)).cast(DataType::Float64)
}

/// Applies `rules` in order, appending (or overwriting) one numeric field per
/// rule. A rule may use fields produced by earlier rules. Each row is
/// computed independently.
pub fn derive(table: &Table, rules: &[MetricRule]) -> Result<Table> {
    let mut known: Vec<Field> = table.fields();
    let mut plan = table.lazy();

    for rule in rules {
        for operand in rule.operands() {
            let field = known.iter().find(|f| f.name == operand).ok_or_else(|| {
                FarmViewsError::UnknownOperand {
                    rule: rule.output.clone(),
                    operand: operand.to_string(),
                }
            })?;
            if field.kind != FieldKind::Number {
                return Err(FarmViewsError::SchemaMismatch {
                    field: operand.to_string(),
                    details: format!(
                        "operand of '{}' must be a number, found {}",
                        rule.output, field.kind
                    ),
                });
            }
        }

        match known.iter_mut().find(|f| f.name == rule.output) {
            Some(existing) => existing.kind = FieldKind::Number,
            None => known.push(Field::number(rule.output.clone())),
        }
        plan = plan.with_column(rule.to_expr().alias(rule.output.as_str()));
    }

    let result = Table::from_frame(table.name(), plan.collect()?, table.week_starts_on());

    debug!(
        "Derived {} metric(s) over {} rows of '{}'",
        rules.len(),
        result.len(),
        table.name()
    );

    Ok(result)
}

/// Mean of the defined numbers in `field`. `None` when nothing is defined.
pub fn defined_mean(table: &Table, field: &str) -> Result<Option<f64>> {
    let values: Vec<f64> = table
        .column_values(field)?
        .iter()
        .filter_map(Value::as_number)
        .collect();
    if values.is_empty() {
        return Ok(None);
    }
    Ok(Some(values.iter().sum::<f64>() / values.len() as f64))
}

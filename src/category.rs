use crate::error::{FarmViewsError, Result};
use crate::table::{FieldKind, Table};
use log::warn;
use polars::prelude::{NamedFrom, Series};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_FALLBACK_LABEL: &str = "Other";

/// Static lookup from fine-grained labels to high-level categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryMapping {
    #[schemars(description = "Fine-grained label (e.g. 'FICA Taxes') to high-level category (e.g. 'Labor Costs').")]
    pub labels: BTreeMap<String, String>,

    #[schemars(description = "Category given to any label not listed in `labels`.")]
    #[serde(default = "default_fallback_label")]
    pub default_label: String,
}

fn default_fallback_label() -> String {
    DEFAULT_FALLBACK_LABEL.to_string()
}

impl CategoryMapping {
    pub fn new(default_label: impl Into<String>) -> Self {
        Self {
            labels: BTreeMap::new(),
            default_label: default_label.into(),
        }
    }

    pub fn with(mut self, label: impl Into<String>, category: impl Into<String>) -> Self {
        self.labels.insert(label.into(), category.into());
        self
    }

    pub fn with_all(mut self, labels: &[&str], category: &str) -> Self {
        for label in labels {
            self.labels.insert(label.to_string(), category.to_string());
        }
        self
    }

    pub fn lookup(&self, label: &str) -> &str {
        self.labels
            .get(label)
            .map(String::as_str)
            .unwrap_or(&self.default_label)
    }

    pub fn is_mapped(&self, label: &str) -> bool {
        self.labels.contains_key(label)
    }

    /// High-level categories in use, including the fallback.
    pub fn categories(&self) -> BTreeSet<&str> {
        self.labels
            .values()
            .map(String::as_str)
            .chain(std::iter::once(self.default_label.as_str()))
            .collect()
    }

    /// The farm's GL chart rolled up into Materials and Labor Costs.
    pub fn farm_gl() -> Self {
        Self::new(DEFAULT_FALLBACK_LABEL)
            .with_all(
                &[
                    "Material Expenses",
                    "Shipping Supplies",
                    "Stickers",
                    "Pallets",
                    "Line Chemicals",
                    "Lime DPA",
                    "Line Propane",
                    "Nitrogen Tank",
                ],
                "Materials",
            )
            .with_all(
                &[
                    "Labor Benefits",
                    "FICA Taxes",
                    "FUTA Taxes",
                    "SUTA Taxes",
                    "PFMLA Contributions",
                    "Production Labor Total",
                    "Back Office Labor Total",
                ],
                "Labor Costs",
            )
    }
}

impl Default for CategoryMapping {
    fn default() -> Self {
        Self::farm_gl()
    }
}

/// Replaces every label in `source_field` with its mapped category.
pub fn remap(table: &Table, source_field: &str, mapping: &CategoryMapping) -> Result<Table> {
    remap_into(table, source_field, source_field, mapping)
}

/// Writes the mapped category of `source_field` into `output_field`,
/// replacing it if present or appending it otherwise. Rows are never dropped.
pub fn remap_into(
    table: &Table,
    source_field: &str,
    output_field: &str,
    mapping: &CategoryMapping,
) -> Result<Table> {
    let source = table.field(source_field)?;
    if source.kind != FieldKind::Text {
        return Err(FarmViewsError::SchemaMismatch {
            field: source_field.to_string(),
            details: format!("category labels must be text, found {}", source.kind),
        });
    }

    let labels = table.column(source_field)?.str()?;
    let mut unmapped: BTreeSet<&str> = BTreeSet::new();
    let mut categories: Vec<&str> = Vec::with_capacity(labels.len());

    for label in labels.into_iter() {
        let label = label.unwrap_or_default();
        if !mapping.is_mapped(label) {
            unmapped.insert(label);
        }
        categories.push(mapping.lookup(label));
    }

    let mut frame = table.frame().clone();
    frame.with_column(Series::new(output_field.into(), categories))?;
    let result = Table::from_frame(table.name(), frame, table.week_starts_on());

    if !unmapped.is_empty() {
        warn!(
            "{} label(s) in '{}' fell back to '{}': {}",
            unmapped.len(),
            source_field,
            mapping.default_label,
            unmapped.into_iter().collect::<Vec<_>>().join(", ")
        );
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Field, Value};
    use chrono::NaiveDate;

    fn gl() -> Table {
        let week = Value::Week(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let rows = [
            ("FICA Taxes", 10.0),
            ("Pallets", 20.0),
            ("Tractor Repair", 30.0),
            ("Stickers", 5.0),
        ];
        Table::from_rows(
            "gl",
            vec![
                Field::week("Week"),
                Field::text("GL Category"),
                Field::number("Amount"),
            ],
            rows.into_iter()
                .map(|(label, amount)| vec![week.clone(), Value::text(label), Value::Number(amount)])
                .collect(),
        )
        .unwrap()
    }

    fn labels(table: &Table, field: &str) -> Vec<String> {
        table
            .column_values(field)
            .unwrap()
            .iter()
            .filter_map(|v| v.as_text().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_farm_gl_lookup() {
        let mapping = CategoryMapping::farm_gl();
        assert_eq!(mapping.lookup("Lime DPA"), "Materials");
        assert_eq!(mapping.lookup("Back Office Labor Total"), "Labor Costs");
        assert_eq!(mapping.lookup("Insurance"), "Other");
        assert_eq!(
            mapping.categories().into_iter().collect::<Vec<_>>(),
            vec!["Labor Costs", "Materials", "Other"]
        );
    }

    #[test]
    fn test_remap_replaces_in_place_and_keeps_rows() {
        let input = gl();
        let result = remap(&input, "GL Category", &CategoryMapping::farm_gl()).unwrap();

        assert_eq!(result.len(), input.len());
        assert_eq!(result.field_names(), input.field_names());
        assert_eq!(
            labels(&result, "GL Category"),
            vec!["Labor Costs", "Materials", "Other", "Materials"]
        );
        assert_eq!(result.sum("Amount").unwrap(), 65.0);
    }

    #[test]
    fn test_remap_into_new_field_uses_configured_default() {
        let mapping = CategoryMapping::new("Unclassified").with("Pallets", "Materials");
        let result = remap_into(&gl(), "GL Category", "High-Level Category", &mapping).unwrap();

        assert!(result.has_field("GL Category"));
        assert_eq!(result.field_names().last(), Some(&"High-Level Category"));
        assert_eq!(
            labels(&result, "High-Level Category"),
            vec!["Unclassified", "Materials", "Unclassified", "Unclassified"]
        );
    }

    #[test]
    fn test_remap_requires_text_field() {
        assert!(matches!(
            remap(&gl(), "Amount", &CategoryMapping::farm_gl()),
            Err(FarmViewsError::SchemaMismatch { .. })
        ));
        assert!(matches!(
            remap(&gl(), "Account", &CategoryMapping::farm_gl()),
            Err(FarmViewsError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_mapping_deserializes_with_default_fallback() {
        let json = r#"{ "labels": { "Seed": "Materials" } }"#;
        let mapping: CategoryMapping = serde_json::from_str(json).unwrap();
        assert_eq!(mapping.lookup("Seed"), "Materials");
        assert_eq!(mapping.default_label, "Other");
    }
}

use crate::category::CategoryMapping;
use crate::error::{FarmViewsError, Result};
use chrono::Weekday;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const BUDGET_CATEGORY_LABEL: &str = "Labor Budget Forecast";
pub const BUDGET_HIGH_LEVEL_CATEGORY: &str = "Labor Costs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum WeekStart {
    #[default]
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl WeekStart {
    pub fn weekday(self) -> Weekday {
        match self {
            WeekStart::Monday => Weekday::Mon,
            WeekStart::Tuesday => Weekday::Tue,
            WeekStart::Wednesday => Weekday::Wed,
            WeekStart::Thursday => Weekday::Thu,
            WeekStart::Friday => Weekday::Fri,
            WeekStart::Saturday => Weekday::Sat,
            WeekStart::Sunday => Weekday::Sun,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DashboardConfig {
    #[schemars(description = "Farm name shown in reports and log messages")]
    #[serde(default)]
    pub farm_name: String,

    #[schemars(
        description = "Day each week bucket starts on. Record dates are moved back to the most recent occurrence of this day."
    )]
    #[serde(default)]
    pub week_start: WeekStart,

    #[schemars(description = "Roll-up of GL categories into high-level categories for the GL view")]
    #[serde(default)]
    pub gl_mapping: CategoryMapping,

    #[schemars(description = "GL category given to every labor budget row in the GL view")]
    #[serde(default = "default_budget_category_label")]
    pub budget_category_label: String,

    #[schemars(description = "High-level category the budget label rolls up into")]
    #[serde(default = "default_budget_high_level_category")]
    pub budget_high_level_category: String,
}

fn default_budget_category_label() -> String {
    BUDGET_CATEGORY_LABEL.to_string()
}

fn default_budget_high_level_category() -> String {
    BUDGET_HIGH_LEVEL_CATEGORY.to_string()
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            farm_name: String::new(),
            week_start: WeekStart::default(),
            gl_mapping: CategoryMapping::default(),
            budget_category_label: default_budget_category_label(),
            budget_high_level_category: default_budget_high_level_category(),
        }
    }
}

impl DashboardConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.gl_mapping.default_label.trim().is_empty() {
            return Err(FarmViewsError::InvalidConfig(
                "gl_mapping.default_label must not be empty".to_string(),
            ));
        }

        if let Some((label, _)) = self
            .gl_mapping
            .labels
            .iter()
            .find(|(label, category)| label.trim().is_empty() || category.trim().is_empty())
        {
            return Err(FarmViewsError::InvalidConfig(format!(
                "gl_mapping has an empty label or category (at '{}')",
                label
            )));
        }

        if self.budget_category_label.trim().is_empty()
            || self.budget_high_level_category.trim().is_empty()
        {
            return Err(FarmViewsError::InvalidConfig(
                "budget labels must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(DashboardConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

use crate::schema::Source;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FarmViewsError {
    #[error("Field '{field}' is not present in table '{table}'")]
    InvalidField { table: String, field: String },

    #[error("Schema mismatch on '{field}': {details}")]
    SchemaMismatch { field: String, details: String },

    #[error("Metric rule '{rule}' references unknown operand '{operand}'")]
    UnknownOperand { rule: String, operand: String },

    #[error("Unknown view: {0}")]
    UnknownView(String),

    #[error("Source table not loaded: {0}")]
    MissingSource(Source),

    #[error("Pivot has more than one value for index {index} and column '{column}'")]
    DuplicatePivotEntry { index: String, column: String },

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Dataframe error: {0}")]
    PolarsError(#[from] polars::prelude::PolarsError),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FarmViewsError>;

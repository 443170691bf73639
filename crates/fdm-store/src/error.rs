use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("table `{0}` does not exist")]
    TableNotFound(String),
    #[error("column `{column}` does not exist in `{table}`")]
    ColumnNotFound { table: String, column: String },
    #[error("column `{column}` already exists in `{table}`")]
    ColumnExists { table: String, column: String },
    #[error("store lock poisoned")]
    LockPoisoned,
    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

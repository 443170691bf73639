use fdm_model::{BlockReason, InvalidReason};
use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("blocked: {0}")]
    Blocked(BlockReason),
    #[error("invalid: {0}")]
    Invalid(InvalidReason),
    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

pub type Result<T> = std::result::Result<T, TransformError>;

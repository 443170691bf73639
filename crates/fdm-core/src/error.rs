use fdm_model::{BlockReason, BlockedReport, BuildStage, InvalidReason};
use fdm_store::StoreError;
use fdm_transform::TransformError;
use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("table `{table}` is blocked: {reason}")]
    Blocked { table: String, reason: BlockReason },
    #[error("table `{table}` failed at stage `{stage}`: {reason}")]
    Invalid {
        table: String,
        stage: BuildStage,
        reason: InvalidReason,
    },
    #[error("table `{table}` has an open problem partition; recombine it first")]
    PartitionOpen { table: String },
    #[error("dataset build blocked: {0}")]
    DatasetBlocked(BlockedReport),
    #[error("build of table `{table}` panicked")]
    WorkerPanicked { table: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BuildError {
    pub(crate) fn from_transform(table: &str, stage: BuildStage, err: TransformError) -> Self {
        match err {
            TransformError::Blocked(reason) => Self::Blocked {
                table: table.to_string(),
                reason,
            },
            TransformError::Invalid(reason) => Self::Invalid {
                table: table.to_string(),
                stage,
                reason,
            },
            TransformError::Polars(err) => Self::Store(StoreError::Polars(err)),
        }
    }

    /// The block reason, for errors that a configuration change can fix.
    pub fn block_reason(&self) -> Option<&BlockReason> {
        match self {
            Self::Blocked { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

impl From<PolarsError> for BuildError {
    fn from(err: PolarsError) -> Self {
        Self::Store(StoreError::Polars(err))
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;

//! Table build stages and the structured reasons a stage can stop.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Build progress of one working table.
///
/// Stages are ordered; a table at a later stage satisfies every earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStage {
    Uncopied,
    Copied,
    IdentifierResolved,
    StartDateResolved,
    EndDateResolved,
    Ready,
}

impl BuildStage {
    pub const ALL: [Self; 6] = [
        Self::Uncopied,
        Self::Copied,
        Self::IdentifierResolved,
        Self::StartDateResolved,
        Self::EndDateResolved,
        Self::Ready,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uncopied => "uncopied",
            Self::Copied => "copied",
            Self::IdentifierResolved => "identifier_resolved",
            Self::StartDateResolved => "start_date_resolved",
            Self::EndDateResolved => "end_date_resolved",
            Self::Ready => "ready",
        }
    }

    /// The stage that follows this one, or `None` once ready.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Uncopied => Some(Self::Copied),
            Self::Copied => Some(Self::IdentifierResolved),
            Self::IdentifierResolved => Some(Self::StartDateResolved),
            Self::StartDateResolved => Some(Self::EndDateResolved),
            Self::EndDateResolved => Some(Self::Ready),
            Self::Ready => None,
        }
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of running a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// The stage rewrote the table.
    Applied,
    /// The target condition already held; nothing was written.
    AlreadySatisfied,
    /// The stage is optional and not configured for this table.
    Skipped,
}

/// Why a stage cannot run. Recoverable by supplying configuration or fixing
/// the source data.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum BlockReason {
    #[error("source table `{source_id}` does not exist")]
    SourceMissing { source_id: String },
    #[error("no identifier column found (columns: {})", available.join(", "))]
    NoIdentifierColumns { available: Vec<String> },
    #[error("no event start date configured")]
    StartDateNotConfigured,
    #[error("date column `{column}` does not exist")]
    UnknownDateColumn { column: String },
    #[error("identifier alias column `{column}` does not exist")]
    AliasColumnMissing { column: String },
    #[error("table has not reached the `{stage}` stage")]
    StagePending { stage: BuildStage },
}

impl BlockReason {
    /// Stable machine-readable code.
    pub fn as_code(&self) -> &'static str {
        match self {
            Self::SourceMissing { .. } => "source_missing",
            Self::NoIdentifierColumns { .. } => "no_identifier_columns",
            Self::StartDateNotConfigured => "start_date_not_configured",
            Self::UnknownDateColumn { .. } => "unknown_date_column",
            Self::AliasColumnMissing { .. } => "alias_column_missing",
            Self::StagePending { .. } => "stage_pending",
        }
    }
}

/// Why a stage ran but its result was rejected. Nothing is written.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum InvalidReason {
    #[error("no row matched the registry through `{identifier}`")]
    IdentifierUnmatched { identifier: String },
    #[error("every value of `{column}` is unparseable as a date")]
    DatesUnparseable { column: String },
}

impl InvalidReason {
    pub fn as_code(&self) -> &'static str {
        match self {
            Self::IdentifierUnmatched { .. } => "identifier_unmatched",
            Self::DatesUnparseable { .. } => "dates_unparseable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_advance_in_order() {
        let mut stage = BuildStage::Uncopied;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            assert!(next > stage);
            seen.push(next);
            stage = next;
        }
        assert_eq!(seen, BuildStage::ALL);
    }

    #[test]
    fn block_reason_serializes_with_code() {
        let reason = BlockReason::UnknownDateColumn {
            column: "adm_date".to_string(),
        };
        let json = serde_json::to_string(&reason).unwrap();
        assert_eq!(json, r#"{"code":"unknown_date_column","column":"adm_date"}"#);
    }
}

//! Shared data model for the event-schema build pipeline.
//!
//! Every source table is normalized into the same logical shape: a subject key
//! (`person_id`), an event start date and an optional event end date. This
//! crate holds the plain types the other crates agree on:
//!
//! - **names**: canonical column and table names
//! - **dates**: date source descriptions and day/month/year ordering hints
//! - **identifier**: canonical and secondary identifier kinds
//! - **config**: per-table and dataset-wide configuration
//! - **stage**: table build stages and structured block/invalid reasons
//! - **problem**: data-quality problem codes
//! - **report**: build and partition summaries

pub mod config;
pub mod dates;
pub mod identifier;
pub mod names;
pub mod problem;
pub mod report;
pub mod stage;
pub mod subject;

pub use config::{BuildConfig, DatasetParams, IdentifierAlias, ObservationPeriodMode, TableConfig};
pub use dates::{DateOrder, DateSource, DateSpec, ParseDateOrderError};
pub use identifier::IdentifierKind;
pub use problem::ProblemCode;
pub use report::{BlockedReport, DatasetReport, PartitionSummary, TableBlock};
pub use stage::{BlockReason, BuildStage, InvalidReason, StageStatus};
pub use subject::SubjectRecord;

//! Event-schema build pipeline.
//!
//! Two levels:
//!
//! - [`TableBuild`] drives one working table through
//!   copy, identifier, start date and end date stages. The stage is read from
//!   the table's columns, so every step can be re-run safely.
//! - [`DatasetAssembler`] checks that every table is ready, builds the subject
//!   population and observation periods, moves implausible rows into
//!   `<table>_problems` partitions and recomputes population and periods from
//!   the clean rows.
//!
//! All store access goes through an explicit [`BuildContext`].

pub mod context;
pub mod dataset;
pub mod error;
pub mod partition;
pub mod plan;
pub mod table;

pub use context::BuildContext;
pub use dataset::{DatasetAssembler, DatasetStage, build_tables};
pub use error::{BuildError, Result};
pub use partition::{UnlockedTable, recombine, split};
pub use plan::{DatePlan, MissingDecision, TablePlan, plan_table};
pub use table::{Advance, StageOutcome, TableBuild, TableCheck, TableOutcome};

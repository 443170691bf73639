//! Per-table build state machine.
//!
//! The stage of a table is never stored. It is derived from which canonical
//! columns the working table carries:
//!
//! | stage                 | condition                                      |
//! |-----------------------|------------------------------------------------|
//! | `Uncopied`            | the working table does not exist               |
//! | `Copied`              | no `person_id` column                          |
//! | `IdentifierResolved`  | no `event_start_date` column                   |
//! | `StartDateResolved`   | end date configured, no `event_end_date`       |
//! | `Ready`               | start date present, end date present or not configured |
//!
//! Each stage is one full-table rewrite, so a failed stage leaves the table
//! as it was.

use fdm_common::date_series;
use fdm_model::names::{EVENT_END_DATE, EVENT_START_DATE, SUBJECT_ID};
use fdm_model::{BlockReason, BuildStage, DateSpec, StageStatus, TableConfig};
use fdm_transform::{resolve_dates, resolve_identifier};
use polars::prelude::DataType;
use tracing::{debug, info, info_span, warn};

use crate::context::BuildContext;
use crate::error::{BuildError, Result};
use crate::partition::{UnlockedTable, recombine};

/// Presence of a table and of its canonical columns.
///
/// A `person_id` column that is not yet stored as an integer counts as absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCheck {
    pub exists: bool,
    pub has_subject_id: bool,
    pub has_start_date: bool,
    pub has_end_date: bool,
}

/// Result of running one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub stage: BuildStage,
    pub status: StageStatus,
    /// Ambiguity warnings raised while applying the stage.
    pub warnings: Vec<String>,
}

impl StageOutcome {
    fn new(stage: BuildStage, status: StageStatus) -> Self {
        Self {
            stage,
            status,
            warnings: Vec::new(),
        }
    }
}

/// Result of [`TableBuild::advance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advance {
    pub outcome: StageOutcome,
    pub ready: bool,
}

/// Result of a complete table build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOutcome {
    pub table: String,
    pub stages: Vec<StageOutcome>,
    pub rows: usize,
}

impl TableOutcome {
    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.stages
            .iter()
            .flat_map(|stage| stage.warnings.iter().map(String::as_str))
    }
}

/// Drives one working table towards `Ready`.
pub struct TableBuild<'a> {
    ctx: BuildContext<'a>,
    name: String,
    config: &'a TableConfig,
}

impl<'a> TableBuild<'a> {
    pub fn new(ctx: BuildContext<'a>, name: impl Into<String>) -> Self {
        let name = name.into();
        let config = ctx.table_config(&name);
        Self { ctx, name, config }
    }

    /// Relation the working table is copied from. Without a configured
    /// source the table must already exist in the working dataset.
    pub fn source_id(&self) -> &str {
        self.config.source.as_deref().unwrap_or(&self.name)
    }

    pub fn check_build(&self) -> Result<TableCheck> {
        let store = self.ctx.store;
        if !store.table_exists(&self.name)? {
            return Ok(TableCheck::default());
        }
        let schema = store.schema(&self.name)?;
        let has = |column: &str| schema.iter().any(|(name, _)| name == column);
        Ok(TableCheck {
            exists: true,
            has_subject_id: schema
                .iter()
                .any(|(name, dtype)| name == SUBJECT_ID && dtype == &DataType::Int64),
            has_start_date: has(EVENT_START_DATE),
            has_end_date: has(EVENT_END_DATE),
        })
    }

    /// Current stage, derived from the table's shape.
    pub fn stage(&self) -> Result<BuildStage> {
        let check = self.check_build()?;
        Ok(if !check.exists {
            BuildStage::Uncopied
        } else if !check.has_subject_id {
            BuildStage::Copied
        } else if !check.has_start_date {
            BuildStage::IdentifierResolved
        } else if self.config.event_end.is_some() && !check.has_end_date {
            BuildStage::StartDateResolved
        } else {
            BuildStage::Ready
        })
    }

    pub fn is_ready(&self) -> Result<bool> {
        Ok(self.stage()? == BuildStage::Ready)
    }

    /// Runs the stage that produces `target`.
    ///
    /// Reports `AlreadySatisfied` without writing when the target condition
    /// already holds.
    pub fn run_stage(&self, target: BuildStage) -> Result<StageOutcome> {
        let check = self.check_build()?;
        match target {
            BuildStage::Uncopied => Ok(StageOutcome::new(target, StageStatus::AlreadySatisfied)),
            BuildStage::Copied => self.copy_from_source(check),
            BuildStage::IdentifierResolved => self.resolve_identifier(check),
            BuildStage::StartDateResolved => {
                self.require(check.has_subject_id, BuildStage::IdentifierResolved)?;
                match (&self.config.event_start, check.has_start_date) {
                    (_, true) => Ok(StageOutcome::new(target, StageStatus::AlreadySatisfied)),
                    (Some(spec), false) => self.resolve_date(target, spec, EVENT_START_DATE),
                    (None, false) => Err(self.blocked(BlockReason::StartDateNotConfigured)),
                }
            }
            BuildStage::EndDateResolved => {
                self.require(check.has_start_date, BuildStage::StartDateResolved)?;
                match (&self.config.event_end, check.has_end_date) {
                    (_, true) => Ok(StageOutcome::new(target, StageStatus::AlreadySatisfied)),
                    (Some(spec), false) => self.resolve_date(target, spec, EVENT_END_DATE),
                    (None, false) => Ok(StageOutcome::new(target, StageStatus::Skipped)),
                }
            }
            BuildStage::Ready => {
                let stage = self.stage()?;
                match stage.next() {
                    None => Ok(StageOutcome::new(target, StageStatus::AlreadySatisfied)),
                    Some(pending) => Err(self.blocked(BlockReason::StagePending { stage: pending })),
                }
            }
        }
    }

    /// Runs the next unmet stage.
    pub fn advance(&self) -> Result<Advance> {
        let current = self.stage()?;
        let outcome = match current.next() {
            None => StageOutcome::new(BuildStage::Ready, StageStatus::AlreadySatisfied),
            Some(next) => self.run_stage(next)?,
        };
        Ok(Advance {
            outcome,
            ready: self.is_ready()?,
        })
    }

    /// Advances until the table is ready. With `fresh_copy` configured the
    /// working copy and any open problem partition are discarded first.
    pub fn build(&self) -> Result<TableOutcome> {
        let span = info_span!("table_build", table = %self.name);
        let _guard = span.enter();

        let mut stages = Vec::new();
        if self.config.fresh_copy {
            if recombine(self.ctx.store, &self.name)? {
                debug!("problem partition merged before fresh copy");
            }
            stages.push(self.refresh()?);
        }
        loop {
            let advance = self.advance()?;
            stages.push(advance.outcome);
            if advance.ready {
                break;
            }
            if stages.len() > BuildStage::ALL.len() + 1 {
                let stage = self.stage()?;
                return Err(self.blocked(BlockReason::StagePending {
                    stage: stage.next().unwrap_or(BuildStage::Ready),
                }));
            }
        }
        let rows = self.ctx.store.row_count(&self.name)?;
        info!(rows, "table ready");
        Ok(TableOutcome {
            table: self.name.clone(),
            stages,
            rows,
        })
    }

    /// Drops what `stage` produced so it is derived again.
    ///
    /// Rejected while the table has an open problem partition.
    pub fn reset(&self, stage: BuildStage) -> Result<()> {
        let unlocked = UnlockedTable::check(self.ctx.store, &self.name)?;
        let check = self.check_build()?;
        let column = match stage {
            BuildStage::Copied if check.exists => return unlocked.delete(),
            BuildStage::IdentifierResolved
                if check.exists && self.ctx.store.has_column(&self.name, SUBJECT_ID)? =>
            {
                SUBJECT_ID
            }
            BuildStage::StartDateResolved if check.has_start_date => EVENT_START_DATE,
            BuildStage::EndDateResolved if check.has_end_date => EVENT_END_DATE,
            _ => return Ok(()),
        };
        info!(table = %self.name, column, "stage reset");
        unlocked.drop_column(column)
    }

    /// Replaces the working table with a fresh copy of its source.
    pub fn refresh(&self) -> Result<StageOutcome> {
        let unlocked = UnlockedTable::check(self.ctx.store, &self.name)?;
        let source = self.source_id();
        if source == self.name {
            return Ok(StageOutcome::new(BuildStage::Copied, StageStatus::AlreadySatisfied));
        }
        if !self.ctx.store.table_exists(source)? {
            return Err(self.blocked(BlockReason::SourceMissing {
                source_id: source.to_string(),
            }));
        }
        let rows = unlocked.copy_from(source)?;
        info!(source, rows, "fresh copy");
        Ok(StageOutcome::new(BuildStage::Copied, StageStatus::Applied))
    }

    fn copy_from_source(&self, check: TableCheck) -> Result<StageOutcome> {
        if check.exists {
            debug!(table = %self.name, "working copy kept");
            return Ok(StageOutcome::new(BuildStage::Copied, StageStatus::AlreadySatisfied));
        }
        let source = self.source_id();
        if source == self.name || !self.ctx.store.table_exists(source)? {
            return Err(self.blocked(BlockReason::SourceMissing {
                source_id: source.to_string(),
            }));
        }
        let unlocked = UnlockedTable::check(self.ctx.store, &self.name)?;
        let rows = unlocked.copy_from(source)?;
        info!(source, rows, "copied from source");
        Ok(StageOutcome::new(BuildStage::Copied, StageStatus::Applied))
    }

    fn resolve_identifier(&self, check: TableCheck) -> Result<StageOutcome> {
        let stage = BuildStage::IdentifierResolved;
        self.require(check.exists, BuildStage::Copied)?;
        if check.has_subject_id {
            return Ok(StageOutcome::new(stage, StageStatus::AlreadySatisfied));
        }

        let unlocked = UnlockedTable::check(self.ctx.store, &self.name)?;
        let frame = self.ctx.store.read(&self.name)?;
        let resolution = resolve_identifier(
            frame,
            self.config.identifier_alias.as_ref(),
            self.ctx.registry,
        )
        .map_err(|err| BuildError::from_transform(&self.name, stage, err))?;
        info!(outcome = ?resolution.outcome, "identifier resolved");
        unlocked.replace(resolution.frame)?;
        Ok(StageOutcome {
            stage,
            status: StageStatus::Applied,
            warnings: self.prefixed(resolution.warnings),
        })
    }

    fn resolve_date(&self, stage: BuildStage, spec: &DateSpec, target: &str) -> Result<StageOutcome> {
        let unlocked = UnlockedTable::check(self.ctx.store, &self.name)?;
        let mut frame = self.ctx.store.read(&self.name)?;
        let resolution = resolve_dates(&frame, spec, target)
            .map_err(|err| BuildError::from_transform(&self.name, stage, err))?;
        frame.with_column(date_series(target, &resolution.dates)?)?;
        unlocked.replace(frame)?;
        info!(
            column = target,
            parsed = resolution.parsed(),
            missing = resolution.missing,
            unparseable = resolution.unparseable,
            "dates resolved"
        );
        Ok(StageOutcome {
            stage,
            status: StageStatus::Applied,
            warnings: self.prefixed(resolution.warnings),
        })
    }

    fn require(&self, holds: bool, stage: BuildStage) -> Result<()> {
        if holds {
            Ok(())
        } else {
            Err(self.blocked(BlockReason::StagePending { stage }))
        }
    }

    fn blocked(&self, reason: BlockReason) -> BuildError {
        warn!(table = %self.name, reason = %reason, "stage blocked");
        BuildError::Blocked {
            table: self.name.clone(),
            reason,
        }
    }

    fn prefixed(&self, warnings: Vec<String>) -> Vec<String> {
        warnings
            .into_iter()
            .map(|warning| format!("{}: {warning}", self.name))
            .collect()
    }
}

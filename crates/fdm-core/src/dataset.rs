//! Dataset-wide assembly.
//!
//! A build runs two passes over the ready event tables. The first derives the
//! subject population and observation periods from every row; then each
//! table is classified and split; the second pass derives both again from
//! the clean rows only. Classification reads only the row and the registry,
//! so rows that stay clean after the split cannot be quarantined by a later
//! build.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::thread;

use chrono::NaiveDate;
use fdm_common::{column_dates, column_i64s, column_strings, date_series};
use fdm_model::names::{
    BIRTH_DATE, DEATH_DATE, EVENT_END_DATE, EVENT_START_DATE, MISSING_FROM_REGISTRY_TABLE,
    OBSERVATION_PERIOD_END, OBSERVATION_PERIOD_START, OBSERVATION_PERIOD_TABLE, PERSON_TABLE,
    SUBJECT_ID, UNLINKED_IDENTIFIERS_TABLE, is_event_table,
};
use fdm_model::{
    BlockReason, BlockedReport, BuildStage, DatasetReport, IdentifierKind, ObservationPeriodMode,
    PartitionSummary,
};
use polars::prelude::{DataFrame, IntoColumn, IntoLazy, NamedFrom, Series};
use tracing::{debug, info, info_span, warn};

use crate::context::BuildContext;
use crate::error::{BuildError, Result};
use crate::partition::{recombine, split};
use crate::plan::plan_table;
use crate::table::{TableBuild, TableOutcome};

/// Steps of a dataset build, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DatasetStage {
    CollectTables,
    BuildSubjectPopulation,
    ComputeObservationPeriod,
    ClassifyAndSplit,
    RebuildSubjectPopulation,
    RecomputeObservationPeriod,
    Done,
}

impl DatasetStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CollectTables => "collect_tables",
            Self::BuildSubjectPopulation => "build_subject_population",
            Self::ComputeObservationPeriod => "compute_observation_period",
            Self::ClassifyAndSplit => "classify_and_split",
            Self::RebuildSubjectPopulation => "rebuild_subject_population",
            Self::RecomputeObservationPeriod => "recompute_observation_period",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for DatasetStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observation period of one subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Period {
    start: NaiveDate,
    end: NaiveDate,
}

/// Builds the population, observation periods and problem partitions of
/// one working dataset.
pub struct DatasetAssembler<'a> {
    ctx: BuildContext<'a>,
    dataset_id: String,
}

impl<'a> DatasetAssembler<'a> {
    pub fn new(ctx: BuildContext<'a>, dataset_id: impl Into<String>) -> Self {
        Self {
            ctx,
            dataset_id: dataset_id.into(),
        }
    }

    /// Event tables present in the store.
    pub fn discover_tables(&self) -> Result<Vec<String>> {
        Ok(self
            .ctx
            .store
            .list_tables()?
            .into_iter()
            .filter(|name| is_event_table(name))
            .collect())
    }

    /// Configured tables together with every discovered event table.
    pub fn tables(&self) -> Result<Vec<String>> {
        let mut tables: BTreeSet<String> = self
            .ctx
            .config
            .tables
            .keys()
            .filter(|name| is_event_table(name))
            .cloned()
            .collect();
        tables.extend(self.discover_tables()?);
        Ok(tables.into_iter().collect())
    }

    /// Merges every open problem partition back into its parent. Returns the
    /// tables that had one.
    pub fn recombine_all(&self) -> Result<Vec<String>> {
        let mut recombined = Vec::new();
        for table in self.tables()? {
            if recombine(self.ctx.store, &table)? {
                recombined.push(table);
            }
        }
        if !recombined.is_empty() {
            info!(tables = recombined.len(), "problem partitions recombined");
        }
        Ok(recombined)
    }

    /// Checks that every table is ready. All unready tables are reported
    /// together.
    pub fn collect(&self) -> Result<std::result::Result<Vec<String>, BlockedReport>> {
        let mut ready = Vec::new();
        let mut report = BlockedReport::default();
        for table in self.tables()? {
            let build = TableBuild::new(self.ctx, table.as_str());
            let stage = build.stage()?;
            if stage == BuildStage::Ready {
                ready.push(table);
                continue;
            }
            if stage == BuildStage::Uncopied {
                let source = build.source_id();
                let reason = if source != table && self.ctx.store.table_exists(source)? {
                    BlockReason::StagePending {
                        stage: BuildStage::Copied,
                    }
                } else {
                    BlockReason::SourceMissing {
                        source_id: source.to_string(),
                    }
                };
                report.push(table, reason);
                continue;
            }
            let columns = self.ctx.store.column_names(&table)?;
            match plan_table(&columns, self.ctx.table_config(&table)) {
                Err(missing) => {
                    for decision in missing {
                        report.push(table.clone(), decision.reason);
                    }
                }
                Ok(_) => report.push(
                    table,
                    BlockReason::StagePending {
                        stage: stage.next().unwrap_or(BuildStage::Ready),
                    },
                ),
            }
        }
        if report.is_empty() {
            Ok(Ok(ready))
        } else {
            Ok(Err(report))
        }
    }

    /// Writes the `person` table: distinct subject keys of `tables` that the
    /// registry knows, with their birth and death dates.
    pub fn build_population(&self, tables: &[String]) -> Result<usize> {
        let mut subjects = BTreeSet::new();
        for table in tables {
            let frame = self.ctx.store.read(table)?;
            subjects.extend(column_i64s(&frame, SUBJECT_ID)?.into_iter().flatten());
        }
        let records: Vec<_> = subjects
            .into_iter()
            .filter_map(|id| self.ctx.registry.subject(id))
            .collect();

        let ids: Vec<i64> = records.iter().map(|record| record.subject_id).collect();
        let births: Vec<Option<NaiveDate>> = records.iter().map(|record| record.birth_date).collect();
        let deaths: Vec<Option<NaiveDate>> = records.iter().map(|record| record.death_date).collect();
        let person = DataFrame::new(vec![
            Series::new(SUBJECT_ID.into(), ids).into_column(),
            date_series(BIRTH_DATE, &births)?.into_column(),
            date_series(DEATH_DATE, &deaths)?.into_column(),
        ])?;
        let rows = self.ctx.store.materialize(person.lazy(), PERSON_TABLE)?;
        info!(subjects = rows, "subject population built");
        Ok(rows)
    }

    /// Writes the `observation_period` table from the current rows of
    /// `tables`, for subjects in the `person` table. Returns the number of
    /// periods and a warning per subject whose bounded period is empty.
    pub fn compute_observation_periods(&self, tables: &[String]) -> Result<(usize, Vec<String>)> {
        let params = &self.ctx.config.dataset;
        let person = self.ctx.store.read(PERSON_TABLE)?;
        let population: BTreeSet<i64> = column_i64s(&person, SUBJECT_ID)?
            .into_iter()
            .flatten()
            .collect();

        let mut spans: BTreeMap<i64, Period> = BTreeMap::new();
        for table in tables {
            let frame = self.ctx.store.read(table)?;
            let ids = column_i64s(&frame, SUBJECT_ID)?;
            let starts = column_dates(&frame, EVENT_START_DATE)?;
            let ends = if frame.column(EVENT_END_DATE).is_ok() {
                column_dates(&frame, EVENT_END_DATE)?
            } else {
                vec![None; frame.height()]
            };
            for ((id, start), end) in ids.into_iter().zip(starts).zip(ends) {
                let (Some(id), Some(start)) = (id, start) else {
                    continue;
                };
                if !population.contains(&id) {
                    continue;
                }
                let end = end.unwrap_or(start);
                spans
                    .entry(id)
                    .and_modify(|period| {
                        period.start = period.start.min(start);
                        period.end = period.end.max(end);
                    })
                    .or_insert(Period { start, end });
            }
        }

        let mut warnings = Vec::new();
        if params.observation_period == ObservationPeriodMode::Bounded {
            spans.retain(|id, period| {
                let Some(subject) = self.ctx.registry.subject(*id) else {
                    return true;
                };
                if let Some(birth) = subject.birth_date {
                    period.start = period.start.max(birth);
                }
                if let Some(death) = subject.death_date {
                    period.end = period.end.min(params.death_cutoff(death));
                }
                if period.start > period.end {
                    warn!("observation period empty after bounding to lifespan");
                    warnings.push(format!(
                        "subject {id}: observation period is empty after bounding to lifespan"
                    ));
                    return false;
                }
                true
            });
        }

        let ids: Vec<i64> = spans.keys().copied().collect();
        let starts: Vec<Option<NaiveDate>> = spans.values().map(|period| Some(period.start)).collect();
        let ends: Vec<Option<NaiveDate>> = spans.values().map(|period| Some(period.end)).collect();
        let periods = DataFrame::new(vec![
            Series::new(SUBJECT_ID.into(), ids).into_column(),
            date_series(OBSERVATION_PERIOD_START, &starts)?.into_column(),
            date_series(OBSERVATION_PERIOD_END, &ends)?.into_column(),
        ])?;
        let rows = self
            .ctx
            .store
            .materialize(periods.lazy(), OBSERVATION_PERIOD_TABLE)?;
        info!(periods = rows, mode = ?params.observation_period, "observation periods computed");
        Ok((rows, warnings))
    }

    /// Writes `unlinked_identifiers`: distinct secondary identifier values on
    /// rows without a subject key.
    pub fn write_unlinked_identifiers(&self, tables: &[String]) -> Result<usize> {
        let mut unlinked: BTreeSet<(String, IdentifierKind, String)> = BTreeSet::new();
        for table in tables {
            let frame = self.ctx.store.read(table)?;
            let ids = column_i64s(&frame, SUBJECT_ID)?;
            for kind in IdentifierKind::SECONDARY {
                if frame.column(kind.column_name()).is_err() {
                    continue;
                }
                let values = column_strings(&frame, kind.column_name())?;
                for (id, value) in ids.iter().zip(values) {
                    if let (None, Some(value)) = (id, value) {
                        unlinked.insert((table.clone(), kind, value));
                    }
                }
            }
        }

        let mut table_col = Vec::with_capacity(unlinked.len());
        let mut kind_col = Vec::with_capacity(unlinked.len());
        let mut value_col = Vec::with_capacity(unlinked.len());
        for (table, kind, value) in unlinked {
            table_col.push(table);
            kind_col.push(kind.column_name().to_string());
            value_col.push(value);
        }
        let frame = DataFrame::new(vec![
            Series::new("table".into(), table_col).into_column(),
            Series::new("identifier".into(), kind_col).into_column(),
            Series::new("value".into(), value_col).into_column(),
        ])?;
        let rows = self
            .ctx
            .store
            .materialize(frame.lazy(), UNLINKED_IDENTIFIERS_TABLE)?;
        if rows > 0 {
            warn!(values = rows, "identifier values could not be linked to a subject");
        }
        Ok(rows)
    }

    /// Writes `subjects_missing_from_registry`: distinct subject keys that
    /// the registry does not know.
    pub fn write_missing_from_registry(&self, tables: &[String]) -> Result<usize> {
        let mut missing = BTreeSet::new();
        for table in tables {
            let frame = self.ctx.store.read(table)?;
            missing.extend(
                column_i64s(&frame, SUBJECT_ID)?
                    .into_iter()
                    .flatten()
                    .filter(|id| !self.ctx.registry.contains(*id)),
            );
        }
        let ids: Vec<i64> = missing.into_iter().collect();
        let frame = DataFrame::new(vec![Series::new(SUBJECT_ID.into(), ids).into_column()])?;
        let rows = self
            .ctx
            .store
            .materialize(frame.lazy(), MISSING_FROM_REGISTRY_TABLE)?;
        if rows > 0 {
            warn!(subjects = rows, "subjects missing from registry");
        }
        Ok(rows)
    }

    /// Splits every table into clean rows and a problem partition.
    pub fn classify_and_split(&self, tables: &[String]) -> Result<Vec<PartitionSummary>> {
        tables
            .iter()
            .map(|table| {
                split(
                    self.ctx.store,
                    self.ctx.registry,
                    &self.ctx.config.dataset,
                    table,
                )
            })
            .collect()
    }

    /// Runs the full two-pass build.
    ///
    /// Fails with [`BuildError::DatasetBlocked`] listing every unready table
    /// before anything is written; open problem partitions stay as they are.
    pub fn build(&self) -> Result<DatasetReport> {
        let span = info_span!("dataset_build", dataset = %self.dataset_id);
        let _guard = span.enter();

        let mut report = DatasetReport {
            dataset_id: self.dataset_id.clone(),
            ..DatasetReport::default()
        };
        let mut stage = DatasetStage::CollectTables;
        let tables = match self.collect()? {
            Ok(tables) => tables,
            Err(blocked) => {
                warn!(tables = blocked.table_names().len(), "dataset build blocked");
                return Err(BuildError::DatasetBlocked(blocked));
            }
        };
        debug!(%stage, tables = tables.len(), "tables collected");
        report.recombined = self.recombine_all()?;

        for pass in 0..2 {
            stage = if pass == 0 {
                DatasetStage::BuildSubjectPopulation
            } else {
                DatasetStage::RebuildSubjectPopulation
            };
            debug!(%stage, "pass started");
            report.population[pass] = self.build_population(&tables)?;

            stage = if pass == 0 {
                DatasetStage::ComputeObservationPeriod
            } else {
                DatasetStage::RecomputeObservationPeriod
            };
            debug!(%stage, "pass started");
            let (periods, warnings) = self.compute_observation_periods(&tables)?;
            report.observation_periods[pass] = periods;
            for warning in warnings {
                if !report.warnings.contains(&warning) {
                    report.warnings.push(warning);
                }
            }
            if pass == 1 {
                break;
            }

            report.unlinked_identifiers = self.write_unlinked_identifiers(&tables)?;
            report.missing_from_registry = self.write_missing_from_registry(&tables)?;

            stage = DatasetStage::ClassifyAndSplit;
            debug!(%stage, "pass started");
            report.tables = self.classify_and_split(&tables)?;
        }

        stage = DatasetStage::Done;
        info!(
            %stage,
            population = report.population[1],
            clean = report.clean_rows(),
            quarantined = report.quarantined_rows(),
            "dataset built"
        );
        Ok(report)
    }
}

/// Builds `tables` concurrently, one worker per table.
///
/// Each table's stages run in order on its own worker. Results come back in
/// input order.
pub fn build_tables(
    ctx: BuildContext<'_>,
    tables: &[String],
) -> Vec<(String, Result<TableOutcome>)> {
    thread::scope(|scope| {
        let workers: Vec<_> = tables
            .iter()
            .map(|table| {
                let handle = scope.spawn(move || TableBuild::new(ctx, table.as_str()).build());
                (table, handle)
            })
            .collect();
        workers
            .into_iter()
            .map(|(table, handle)| {
                let result = handle.join().unwrap_or_else(|_| {
                    Err(BuildError::WorkerPanicked {
                        table: table.clone(),
                    })
                });
                (table.clone(), result)
            })
            .collect()
    })
}

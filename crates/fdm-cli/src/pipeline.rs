//! Build, status and recombine runs over a loaded workspace.

use anyhow::Result;
use fdm_core::{BuildContext, BuildError, DatasetAssembler, TableBuild, TableOutcome, build_tables};
use fdm_model::names::{UNLINKED_IDENTIFIERS_TABLE, problems_table};
use fdm_model::{BlockedReport, BuildStage, DatasetReport};
use fdm_store::RelationalStore;
use polars::prelude::AnyValue;
use tracing::{info, info_span, trace, warn};

use crate::logging::redact_value;
use crate::workspace::Workspace;

/// Result of building one table.
#[derive(Debug)]
pub struct TableResult {
    pub table: String,
    pub outcome: std::result::Result<TableOutcome, BuildError>,
}

#[derive(Debug)]
pub enum DatasetResult {
    Built(DatasetReport),
    Blocked(BlockedReport),
    /// The dataset build was not requested.
    Skipped,
}

#[derive(Debug)]
pub struct BuildOutcome {
    pub dataset_id: String,
    pub tables: Vec<TableResult>,
    pub dataset: DatasetResult,
}

impl BuildOutcome {
    pub fn has_errors(&self) -> bool {
        self.tables.iter().any(|table| table.outcome.is_err())
            || matches!(self.dataset, DatasetResult::Blocked(_))
    }

    pub fn warnings(&self) -> Vec<String> {
        let mut warnings: Vec<String> = self
            .tables
            .iter()
            .filter_map(|table| table.outcome.as_ref().ok())
            .flat_map(|outcome| outcome.warnings().map(str::to_string))
            .collect();
        if let DatasetResult::Built(report) = &self.dataset {
            warnings.extend(report.warnings.iter().cloned());
        }
        warnings
    }
}

/// Builds every table concurrently, then the dataset unless `tables_only`.
///
/// Open problem partitions are merged back by the dataset build, and only
/// once every table is ready.
pub fn run_build(workspace: &Workspace, dataset_id: &str, tables_only: bool) -> Result<BuildOutcome> {
    let span = info_span!("build", dataset = %dataset_id);
    let _guard = span.enter();

    let ctx = BuildContext::new(&workspace.store, &workspace.registry, &workspace.config);
    let assembler = DatasetAssembler::new(ctx, dataset_id);

    let names = assembler.tables()?;
    info!(tables = names.len(), "building tables");
    let tables: Vec<TableResult> = build_tables(ctx, &names)
        .into_iter()
        .map(|(table, outcome)| {
            if let Err(err) = &outcome {
                warn!(table = %table, error = %err, "table not ready");
            }
            TableResult { table, outcome }
        })
        .collect();

    let dataset = if tables_only {
        DatasetResult::Skipped
    } else {
        match assembler.build() {
            Ok(report) => {
                trace_unlinked(workspace)?;
                DatasetResult::Built(report)
            }
            Err(BuildError::DatasetBlocked(report)) => DatasetResult::Blocked(report),
            Err(err) => return Err(err.into()),
        }
    };

    Ok(BuildOutcome {
        dataset_id: dataset_id.to_string(),
        tables,
        dataset,
    })
}

fn trace_unlinked(workspace: &Workspace) -> Result<()> {
    if !tracing::enabled!(tracing::Level::TRACE) {
        return Ok(());
    }
    let frame = workspace.store.read(UNLINKED_IDENTIFIERS_TABLE)?;
    let tables = frame.column("table")?;
    let kinds = frame.column("identifier")?;
    let values = frame.column("value")?;
    for idx in 0..frame.height() {
        let (AnyValue::String(table), AnyValue::String(kind), AnyValue::String(value)) =
            (tables.get(idx)?, kinds.get(idx)?, values.get(idx)?)
        else {
            continue;
        };
        trace!(table, identifier = kind, value = redact_value(value), "unlinked identifier");
    }
    Ok(())
}

/// Build progress of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStatus {
    pub table: String,
    pub stage: BuildStage,
    pub rows: Option<usize>,
    /// Rows in the open problem partition, if one exists.
    pub problems: Option<usize>,
}

pub fn table_status(workspace: &Workspace) -> Result<Vec<TableStatus>> {
    let ctx = BuildContext::new(&workspace.store, &workspace.registry, &workspace.config);
    let store = &workspace.store;
    let mut statuses = Vec::new();
    for table in DatasetAssembler::new(ctx, "status").tables()? {
        let stage = TableBuild::new(ctx, table.as_str()).stage()?;
        let rows = if store.table_exists(&table)? {
            Some(store.row_count(&table)?)
        } else {
            None
        };
        let partition = problems_table(&table);
        let problems = if store.table_exists(&partition)? {
            Some(store.row_count(&partition)?)
        } else {
            None
        };
        statuses.push(TableStatus {
            table,
            stage,
            rows,
            problems,
        });
    }
    Ok(statuses)
}

/// Merges every open problem partition back. Returns the affected tables.
pub fn run_recombine(workspace: &Workspace) -> Result<Vec<String>> {
    let ctx = BuildContext::new(&workspace.store, &workspace.registry, &workspace.config);
    Ok(DatasetAssembler::new(ctx, "recombine").recombine_all()?)
}

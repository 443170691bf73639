//! Problem partitions.
//!
//! Splitting moves quarantined rows of `<table>` into `<table>_problems`,
//! labelled with their problem code in a leading `problem` column.
//! Recombining merges them back. While a partition exists its parent must not
//! change shape; [`UnlockedTable`] is the only way to obtain a handle that
//! can.

use fdm_model::names::{PROBLEM, problems_table};
use fdm_model::{DatasetParams, PartitionSummary};
use fdm_store::{RelationalStore, StoreError, SubjectRegistry};
use fdm_validate::classify_frame;
use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{BuildError, Result};

/// A table proven to have no open problem partition.
///
/// Every structural mutation of a working table goes through this handle.
pub struct UnlockedTable<'a> {
    store: &'a dyn RelationalStore,
    table: &'a str,
}

impl<'a> UnlockedTable<'a> {
    pub fn check(store: &'a dyn RelationalStore, table: &'a str) -> Result<Self> {
        if store.table_exists(&problems_table(table))? {
            return Err(BuildError::PartitionOpen {
                table: table.to_string(),
            });
        }
        Ok(Self { store, table })
    }

    /// Replaces the table with `frame`.
    pub fn replace(&self, frame: DataFrame) -> Result<usize> {
        Ok(self.store.materialize(frame.lazy(), self.table)?)
    }

    pub fn copy_from(&self, source: &str) -> Result<usize> {
        Ok(self.store.copy_table(source, self.table)?)
    }

    pub fn drop_column(&self, column: &str) -> Result<()> {
        Ok(self.store.drop_column(self.table, column)?)
    }

    pub fn delete(&self) -> Result<()> {
        Ok(self.store.delete_table(self.table)?)
    }
}

/// Classifies `table` and moves its quarantined rows into a new partition.
///
/// The partition is always created, even when empty, and written before the
/// clean table. If the clean write fails the partition is removed again, so
/// the table is either fully split or untouched.
pub fn split(
    store: &dyn RelationalStore,
    registry: &dyn SubjectRegistry,
    params: &DatasetParams,
    table: &str,
) -> Result<PartitionSummary> {
    let unlocked = UnlockedTable::check(store, table)?;
    let frame = store.read(table)?;
    let classification = classify_frame(&frame, registry, params)?;

    let quarantined = classification.quarantined_mask();
    let kept: Vec<bool> = quarantined.iter().map(|flag| !flag).collect();
    let mut problems =
        frame.filter(&BooleanChunked::from_slice("quarantined".into(), &quarantined))?;
    problems.insert_column(
        0,
        Series::new(PROBLEM.into(), classification.quarantine_labels()),
    )?;
    let clean = frame.filter(&BooleanChunked::from_slice("kept".into(), &kept))?;

    let partition = problems_table(table);
    store.materialize(problems.lazy(), &partition)?;
    if let Err(err) = unlocked.replace(clean) {
        warn!(table, error = %err, "clean write failed; removing partition");
        store.delete_table(&partition)?;
        return Err(err);
    }

    let summary = classification.summary(table);
    info!(
        table,
        clean = summary.clean_rows,
        quarantined = summary.quarantined_rows,
        informational = summary.informational_rows,
        "table split"
    );
    for (code, rows) in &summary.by_code {
        info!(table, problem = %code, rows, "problem rows");
    }
    Ok(summary)
}

/// Merges `<table>_problems` back into `table` and deletes it.
///
/// Returns `false` when there was no partition. Partition columns are cast to
/// the clean table's types and order before appending.
pub fn recombine(store: &dyn RelationalStore, table: &str) -> Result<bool> {
    let partition = problems_table(table);
    if !store.table_exists(&partition)? {
        return Ok(false);
    }
    let mut merged = store.read(table)?;
    let problems = store.read(&partition)?;

    let mut aligned = Vec::with_capacity(merged.width());
    for column in merged.get_columns() {
        let name = column.name().as_str();
        let source = problems
            .column(name)
            .map_err(|_| StoreError::ColumnNotFound {
                table: partition.clone(),
                column: name.to_string(),
            })?;
        aligned.push(source.cast(column.dtype())?);
    }
    let aligned = DataFrame::new(aligned)?;
    let returned = aligned.height();
    merged.vstack_mut(&aligned)?;

    store.materialize(merged.lazy(), table)?;
    store.delete_table(&partition)?;
    debug!(table, rows = returned, "partition recombined");
    Ok(true)
}

//! In-memory relational store over Polars `DataFrame`s.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use polars::prelude::{DataFrame, DataType, LazyFrame};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::store::RelationalStore;

/// Tables held behind a single lock.
///
/// Plans are collected before the write lock is taken, so a failing plan
/// never touches the destination and readers are not blocked while a
/// rewrite is computed.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<BTreeMap<String, DataFrame>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = (S, DataFrame)>,
        S: Into<String>,
    {
        let tables = tables
            .into_iter()
            .map(|(name, frame)| (name.into(), frame))
            .collect();
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Inserts or replaces a table.
    pub fn insert(&self, table: impl Into<String>, frame: DataFrame) -> Result<()> {
        self.write()?.insert(table.into(), frame);
        Ok(())
    }

    /// Copies every table out of the store.
    pub fn snapshot(&self) -> Result<BTreeMap<String, DataFrame>> {
        Ok(self.read_lock()?.clone())
    }

    fn read_lock(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, DataFrame>>> {
        self.tables.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, DataFrame>>> {
        self.tables.write().map_err(|_| StoreError::LockPoisoned)
    }

    /// Rewrites an existing table with `f`, committing only on success.
    fn rewrite<F>(&self, table: &str, f: F) -> Result<()>
    where
        F: FnOnce(&DataFrame) -> Result<DataFrame>,
    {
        let mut tables = self.write()?;
        let current = tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        let next = f(current)?;
        tables.insert(table.to_string(), next);
        Ok(())
    }
}

impl RelationalStore for InMemoryStore {
    fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.read_lock()?.contains_key(table))
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.read_lock()?.keys().cloned().collect())
    }

    fn schema(&self, table: &str) -> Result<Vec<(String, DataType)>> {
        let tables = self.read_lock()?;
        let frame = tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        Ok(frame
            .get_columns()
            .iter()
            .map(|column| (column.name().to_string(), column.dtype().clone()))
            .collect())
    }

    fn read(&self, table: &str) -> Result<DataFrame> {
        self.read_lock()?
            .get(table)
            .cloned()
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))
    }

    fn materialize(&self, plan: LazyFrame, destination: &str) -> Result<usize> {
        let frame = plan.collect()?;
        let rows = frame.height();
        self.write()?.insert(destination.to_string(), frame);
        debug!(table = destination, rows, "materialized");
        Ok(rows)
    }

    fn drop_column(&self, table: &str, column: &str) -> Result<()> {
        self.rewrite(table, |frame| {
            if frame.column(column).is_err() {
                return Err(StoreError::ColumnNotFound {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
            Ok(frame.drop(column)?)
        })
    }

    fn rename_columns(&self, table: &str, renames: &[(String, String)]) -> Result<()> {
        self.rewrite(table, |frame| {
            let mut next = frame.clone();
            for (from, to) in renames {
                if from == to {
                    continue;
                }
                if next.column(from).is_err() {
                    return Err(StoreError::ColumnNotFound {
                        table: table.to_string(),
                        column: from.clone(),
                    });
                }
                if next.column(to).is_ok() {
                    return Err(StoreError::ColumnExists {
                        table: table.to_string(),
                        column: to.clone(),
                    });
                }
                next.rename(from, to.as_str().into())?;
            }
            Ok(next)
        })
    }

    fn delete_table(&self, table: &str) -> Result<()> {
        self.write()?
            .remove(table)
            .map(|_| ())
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use polars::prelude::*;

    use super::*;

    fn frame() -> DataFrame {
        df!(
            "Digest" => &["a", "b"],
            "value" => &[1i64, 2],
        )
        .unwrap()
    }

    #[test]
    fn rename_is_all_or_nothing() {
        let store = InMemoryStore::from_tables([("events", frame())]);
        let renames = vec![
            ("Digest".to_string(), "digest".to_string()),
            ("missing".to_string(), "other".to_string()),
        ];
        let err = store.rename_columns("events", &renames).unwrap_err();
        assert!(matches!(err, StoreError::ColumnNotFound { .. }));
        assert!(store.has_column("events", "Digest").unwrap());
        assert!(!store.has_column("events", "digest").unwrap());
    }

    #[test]
    fn rename_rejects_collisions() {
        let store = InMemoryStore::from_tables([("events", frame())]);
        let renames = vec![("Digest".to_string(), "value".to_string())];
        let err = store.rename_columns("events", &renames).unwrap_err();
        assert!(matches!(err, StoreError::ColumnExists { .. }));
    }

    #[test]
    fn failed_plan_leaves_destination_untouched() {
        let store = InMemoryStore::from_tables([("events", frame())]);
        let plan = frame().lazy().select([col("no_such_column")]);
        assert!(store.materialize(plan, "events").is_err());
        assert!(store.read("events").unwrap().equals_missing(&frame()));
    }

    #[test]
    fn materialize_replaces_rather_than_appends() {
        let store = InMemoryStore::from_tables([("events", frame())]);
        let rows = store
            .materialize(frame().lazy().filter(col("value").gt(lit(1))), "events")
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(store.row_count("events").unwrap(), 1);
    }

    #[test]
    fn delete_unknown_table_fails() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.delete_table("events"),
            Err(StoreError::TableNotFound(_))
        ));
    }
}

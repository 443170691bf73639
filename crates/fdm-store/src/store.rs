use polars::prelude::{DataFrame, DataType, IntoLazy, LazyFrame};

use crate::error::Result;

/// A store of named relations.
///
/// Every mutation is all-or-nothing: a failed call leaves the target table as
/// it was. Implementations must be shareable across threads because per-table
/// builds run concurrently.
pub trait RelationalStore: Send + Sync {
    fn table_exists(&self, table: &str) -> Result<bool>;

    /// Names of every table, sorted.
    fn list_tables(&self) -> Result<Vec<String>>;

    /// Ordered `(name, type)` pairs.
    fn schema(&self, table: &str) -> Result<Vec<(String, DataType)>>;

    /// Snapshot of the table's current content.
    fn read(&self, table: &str) -> Result<DataFrame>;

    /// Evaluates `plan` and replaces `destination` with the result, creating
    /// it if needed. Returns the number of rows written.
    fn materialize(&self, plan: LazyFrame, destination: &str) -> Result<usize>;

    fn drop_column(&self, table: &str, column: &str) -> Result<()>;

    /// Applies `(from, to)` renames as one rewrite.
    fn rename_columns(&self, table: &str, renames: &[(String, String)]) -> Result<()>;

    fn delete_table(&self, table: &str) -> Result<()>;

    fn copy_table(&self, source: &str, destination: &str) -> Result<usize> {
        let frame = self.read(source)?;
        self.materialize(frame.lazy(), destination)
    }

    fn column_names(&self, table: &str) -> Result<Vec<String>> {
        Ok(self
            .schema(table)?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    fn has_column(&self, table: &str, column: &str) -> Result<bool> {
        Ok(self
            .schema(table)?
            .iter()
            .any(|(name, _)| name == column))
    }

    fn row_count(&self, table: &str) -> Result<usize> {
        Ok(self.read(table)?.height())
    }
}

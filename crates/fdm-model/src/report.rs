//! Build reports.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::problem::ProblemCode;
use crate::stage::BlockReason;

/// A table that prevents the dataset build, with its reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableBlock {
    pub table: String,
    pub reason: BlockReason,
}

/// Every table that prevents the dataset build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedReport {
    pub tables: Vec<TableBlock>,
}

impl BlockedReport {
    pub fn push(&mut self, table: impl Into<String>, reason: BlockReason) {
        self.tables.push(TableBlock {
            table: table.into(),
            reason,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Number of blocking reasons; a table may carry several.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Distinct blocked table names, in report order.
    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for block in &self.tables {
            if !names.contains(&block.table.as_str()) {
                names.push(&block.table);
            }
        }
        names
    }
}

impl fmt::Display for BlockedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} table(s) not ready", self.table_names().len())?;
        for block in &self.tables {
            write!(
                f,
                "\n  {}: [{}] {}",
                block.table,
                block.reason.as_code(),
                block.reason
            )?;
        }
        Ok(())
    }
}

/// Outcome of classifying and splitting one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSummary {
    pub table: String,
    pub clean_rows: usize,
    pub quarantined_rows: usize,
    /// Rows kept clean but carrying an informational label.
    pub informational_rows: usize,
    /// Row counts keyed by problem code, informational labels included.
    pub by_code: BTreeMap<String, usize>,
}

impl PartitionSummary {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn record(&mut self, problem: ProblemCode) {
        *self.by_code.entry(problem.as_code().to_string()).or_default() += 1;
    }

    pub fn count(&self, problem: ProblemCode) -> usize {
        self.by_code.get(problem.as_code()).copied().unwrap_or(0)
    }

    pub fn total_rows(&self) -> usize {
        self.clean_rows + self.quarantined_rows
    }
}

/// Summary of a full dataset build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetReport {
    pub dataset_id: String,
    pub tables: Vec<PartitionSummary>,
    /// Tables whose open problem partition was merged back before building.
    pub recombined: Vec<String>,
    /// Population size after the first and second pass.
    pub population: [usize; 2],
    /// Observation period row counts after the first and second pass.
    pub observation_periods: [usize; 2],
    pub unlinked_identifiers: usize,
    pub missing_from_registry: usize,
    pub warnings: Vec<String>,
}

impl DatasetReport {
    pub fn quarantined_rows(&self) -> usize {
        self.tables.iter().map(|table| table.quarantined_rows).sum()
    }

    pub fn clean_rows(&self) -> usize {
        self.tables.iter().map(|table| table.clean_rows).sum()
    }

    pub fn table(&self, name: &str) -> Option<&PartitionSummary> {
        self.tables.iter().find(|table| table.table == name)
    }
}

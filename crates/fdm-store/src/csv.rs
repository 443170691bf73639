//! CSV directory load and save.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use fdm_common::{column_dates, date_series};
use fdm_model::names::DATE_COLUMNS;
use polars::prelude::*;
use tracing::{debug, info};

use crate::error::Result;
use crate::memory::InMemoryStore;

/// Reads a CSV file with a header row.
///
/// Well-known date columns stored as text are converted back to `Date`, so a
/// table saved by [`write_csv_table`] reads back with the same build stage.
pub fn read_csv_table(path: &Path) -> Result<DataFrame> {
    let mut frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    for name in DATE_COLUMNS {
        let needs_cast = frame
            .column(name)
            .is_ok_and(|column| column.dtype() != &DataType::Date);
        if needs_cast {
            let dates = column_dates(&frame, name)?;
            frame.with_column(date_series(name, &dates)?)?;
        }
    }
    debug!(path = %path.display(), rows = frame.height(), "read csv");
    Ok(frame)
}

/// Writes a table to `path`, replacing any existing file.
pub fn write_csv_table(frame: &DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    let mut frame = frame.clone();
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut frame)?;
    debug!(path = %path.display(), rows = frame.height(), "wrote csv");
    Ok(())
}

/// Loads every `*.csv` file of `dir` into `store`, naming each table
/// `{prefix}{file stem}`. Returns the table names, sorted.
pub fn load_csv_dir(store: &InMemoryStore, dir: &Path, prefix: &str) -> Result<Vec<String>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    paths.sort();

    let mut names = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let name = format!("{prefix}{stem}");
        store.insert(name.clone(), read_csv_table(&path)?)?;
        names.push(name);
    }
    info!(dir = %dir.display(), tables = names.len(), "loaded csv directory");
    Ok(names)
}

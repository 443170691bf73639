//! Loading a workspace folder into a store and writing it back.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fdm_model::names::table_alias;
use fdm_model::{BuildConfig, TableConfig};
use fdm_store::{
    InMemoryRegistry, InMemoryStore, RelationalStore, SubjectRegistry, load_csv_dir,
    read_csv_table, write_csv_table,
};
use tracing::{debug, info};

use crate::cli::WorkspaceArgs;

/// Prefix of tables loaded from the sources folder.
pub const SOURCE_PREFIX: &str = "source.";

/// Resolved workspace paths.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub config: PathBuf,
    pub registry: PathBuf,
    pub sources: PathBuf,
    pub dataset: PathBuf,
}

impl WorkspacePaths {
    pub fn from_args(args: &WorkspaceArgs) -> Self {
        let root = args.workspace.clone();
        Self {
            config: args.config.clone().unwrap_or_else(|| root.join("config.json")),
            registry: args
                .registry
                .clone()
                .unwrap_or_else(|| root.join("registry.csv")),
            sources: args.sources.clone().unwrap_or_else(|| root.join("sources")),
            dataset: args.dataset.clone().unwrap_or_else(|| root.join("dataset")),
            root,
        }
    }

    /// Name of the workspace folder, used as the default dataset id.
    pub fn name(&self) -> String {
        self.root
            .canonicalize()
            .unwrap_or_else(|_| self.root.clone())
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("dataset")
            .to_string()
    }
}

/// A loaded workspace.
pub struct Workspace {
    pub paths: WorkspacePaths,
    pub store: InMemoryStore,
    pub registry: InMemoryRegistry,
    pub config: BuildConfig,
    /// Source table names, `source.`-prefixed.
    pub sources: Vec<String>,
}

impl Workspace {
    pub fn load(paths: WorkspacePaths) -> Result<Self> {
        let mut config = read_config(&paths.config)?;
        let registry_frame = read_csv_table(&paths.registry)
            .with_context(|| format!("read registry {}", paths.registry.display()))?;
        let registry = InMemoryRegistry::from_frame(&registry_frame)
            .with_context(|| format!("load registry {}", paths.registry.display()))?;

        let store = InMemoryStore::new();
        let sources = if paths.sources.is_dir() {
            load_csv_dir(&store, &paths.sources, SOURCE_PREFIX)
                .with_context(|| format!("load sources from {}", paths.sources.display()))?
        } else {
            Vec::new()
        };
        if paths.dataset.is_dir() {
            load_csv_dir(&store, &paths.dataset, "")
                .with_context(|| format!("load dataset from {}", paths.dataset.display()))?;
        }
        link_sources(&mut config, &sources);
        info!(
            sources = sources.len(),
            subjects = registry.len(),
            "workspace loaded"
        );

        Ok(Self {
            paths,
            store,
            registry,
            config,
            sources,
        })
    }

    /// Writes every non-source table to the dataset folder and removes CSV
    /// files of tables that no longer exist.
    pub fn save(&self) -> Result<Vec<String>> {
        let dir = &self.paths.dataset;
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;

        let mut written = Vec::new();
        for table in self.store.list_tables()? {
            if table.starts_with(SOURCE_PREFIX) {
                continue;
            }
            let frame = self.store.read(&table)?;
            let path = dir.join(format!("{table}.csv"));
            write_csv_table(&frame, &path).with_context(|| format!("write {}", path.display()))?;
            written.push(table);
        }

        let keep: BTreeSet<&str> = written.iter().map(String::as_str).collect();
        for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
            let path = entry?.path();
            let stale = path.extension().is_some_and(|ext| ext == "csv")
                && path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .is_some_and(|stem| !keep.contains(stem));
            if stale {
                fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
                debug!(path = %path.display(), "removed stale table");
            }
        }
        info!(dir = %dir.display(), tables = written.len(), "dataset saved");
        Ok(written)
    }
}

fn read_config(path: &Path) -> Result<BuildConfig> {
    let text =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse config {}", path.display()))
}

/// Points every table at its source: configured tables without a source use
/// the source with the same alias, and unconfigured sources get a default
/// table entry.
fn link_sources(config: &mut BuildConfig, sources: &[String]) {
    for source in sources {
        let alias = table_alias(source).to_string();
        let table = config
            .tables
            .entry(alias)
            .or_insert_with(TableConfig::default);
        if table.source.is_none() {
            table.source = Some(source.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use fdm_model::DatasetParams;

    use super::*;

    #[test]
    fn sources_are_linked_by_alias() {
        let extract = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let mut config = BuildConfig::new(DatasetParams::new(extract))
            .with_table("admissions", TableConfig::default())
            .with_table("labs", TableConfig::default().with_source("elsewhere.labs"));
        link_sources(
            &mut config,
            &[
                "source.admissions".to_string(),
                "source.labs".to_string(),
                "source.visits".to_string(),
            ],
        );
        assert_eq!(
            config.table("admissions").and_then(|t| t.source.as_deref()),
            Some("source.admissions")
        );
        assert_eq!(
            config.table("labs").and_then(|t| t.source.as_deref()),
            Some("elsewhere.labs")
        );
        assert_eq!(
            config.table("visits").and_then(|t| t.source.as_deref()),
            Some("source.visits")
        );
    }
}

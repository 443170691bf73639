//! Workspace round trips through CSV folders.

use std::fs;
use std::path::Path;

use fdm_cli::cli::WorkspaceArgs;
use fdm_cli::pipeline::{DatasetResult, run_build, run_recombine, table_status};
use fdm_cli::workspace::{Workspace, WorkspacePaths};
use fdm_model::BuildStage;
use fdm_store::RelationalStore;

const CONFIG: &str = r#"{
  "dataset": { "extract_end_date": "2020-12-31" },
  "tables": {
    "admissions": {
      "event_start": { "columns": "adm_date", "order": "YMD" }
    },
    "visits": {
      "event_start": { "columns": ["year", "month", "day"], "order": "YMD" }
    }
  }
}"#;

fn write(path: &Path, text: &str) {
    fs::write(path, text).unwrap();
}

fn workspace_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir(root.join("sources")).unwrap();
    write(&root.join("config.json"), CONFIG);
    write(
        &root.join("registry.csv"),
        "person_id,digest,birth_date,death_date\n\
         1,d-1,1980-01-01,\n\
         2,d-2,1990-06-01,\n\
         3,d-3,1970-02-01,2015-01-01\n",
    );
    write(
        &root.join("sources/admissions.csv"),
        "Digest,adm_date,ward\n\
         d-1,2012-03-04,north\n\
         d-2,2013-05-06,south\n\
         d-9,2014-07-08,east\n",
    );
    write(
        &root.join("sources/visits.csv"),
        "person_id,year,month,day\n\
         1,2011,1,15\n\
         3,2016,6,1\n\
         7,2012,2,2\n",
    );
    dir
}

fn args(root: &Path) -> WorkspaceArgs {
    WorkspaceArgs {
        workspace: root.to_path_buf(),
        config: None,
        registry: None,
        sources: None,
        dataset: None,
    }
}

#[test]
fn build_writes_tables_and_partitions() {
    let dir = workspace_dir();
    let workspace = Workspace::load(WorkspacePaths::from_args(&args(dir.path()))).unwrap();
    let outcome = run_build(&workspace, "study", false).unwrap();
    assert!(!outcome.has_errors());

    let DatasetResult::Built(report) = &outcome.dataset else {
        panic!("dataset not built: {:?}", outcome.dataset);
    };
    // d-9 has no subject; 3 starts after death; 7 is unknown
    assert_eq!(report.quarantined_rows(), 3);
    assert_eq!(report.unlinked_identifiers, 1);
    assert_eq!(report.missing_from_registry, 1);
    assert_eq!(report.population, [3, 2]);

    let written = workspace.save().unwrap();
    for table in [
        "admissions",
        "admissions_problems",
        "visits",
        "visits_problems",
        "person",
        "observation_period",
        "unlinked_identifiers",
        "subjects_missing_from_registry",
    ] {
        assert!(written.iter().any(|name| name == table), "{table}");
        assert!(dir.path().join(format!("dataset/{table}.csv")).is_file(), "{table}");
    }
    assert!(!dir.path().join("dataset/source.admissions.csv").exists());
}

#[test]
fn saved_tables_reload_at_the_same_stage() {
    let dir = workspace_dir();
    let paths = WorkspacePaths::from_args(&args(dir.path()));
    let workspace = Workspace::load(paths.clone()).unwrap();
    run_build(&workspace, "study", false).unwrap();
    workspace.save().unwrap();

    let reloaded = Workspace::load(paths).unwrap();
    let statuses = table_status(&reloaded).unwrap();
    let names: Vec<_> = statuses.iter().map(|status| status.table.as_str()).collect();
    assert_eq!(names, vec!["admissions", "visits"]);
    assert!(statuses.iter().all(|status| status.stage == BuildStage::Ready));
    assert_eq!(statuses[0].problems, Some(1));

    let second = run_build(&reloaded, "study", false).unwrap();
    let DatasetResult::Built(report) = &second.dataset else {
        panic!("dataset not built: {:?}", second.dataset);
    };
    assert_eq!(report.recombined, vec!["admissions", "visits"]);
    assert_eq!(report.quarantined_rows(), 3);
}

#[test]
fn recombine_removes_partition_files() {
    let dir = workspace_dir();
    let paths = WorkspacePaths::from_args(&args(dir.path()));
    let workspace = Workspace::load(paths.clone()).unwrap();
    run_build(&workspace, "study", false).unwrap();
    workspace.save().unwrap();

    let reloaded = Workspace::load(paths).unwrap();
    let tables = run_recombine(&reloaded).unwrap();
    assert_eq!(tables, vec!["admissions", "visits"]);
    reloaded.save().unwrap();
    assert!(!dir.path().join("dataset/admissions_problems.csv").exists());
    assert_eq!(reloaded.store.row_count("admissions").unwrap(), 3);
}

#[test]
fn unconfigured_source_blocks_the_dataset() {
    let dir = workspace_dir();
    write(
        &dir.path().join("sources/labs.csv"),
        "person_id,value\n1,4.2\n",
    );
    let workspace = Workspace::load(WorkspacePaths::from_args(&args(dir.path()))).unwrap();
    let outcome = run_build(&workspace, "study", false).unwrap();
    assert!(outcome.has_errors());

    let DatasetResult::Blocked(blocked) = &outcome.dataset else {
        panic!("expected a blocked dataset: {:?}", outcome.dataset);
    };
    assert_eq!(blocked.table_names(), vec!["labs"]);
    assert!(!workspace.store.table_exists("person").unwrap());
}

#[test]
fn blocked_rebuild_keeps_saved_partitions() {
    let dir = workspace_dir();
    let paths = WorkspacePaths::from_args(&args(dir.path()));
    let workspace = Workspace::load(paths.clone()).unwrap();
    run_build(&workspace, "study", false).unwrap();
    workspace.save().unwrap();

    write(
        &dir.path().join("sources/labs.csv"),
        "person_id,value\n1,4.2\n",
    );
    let reloaded = Workspace::load(paths).unwrap();
    let outcome = run_build(&reloaded, "study", false).unwrap();
    assert!(matches!(outcome.dataset, DatasetResult::Blocked(_)));
    reloaded.save().unwrap();

    assert!(dir.path().join("dataset/admissions_problems.csv").is_file());
    assert_eq!(reloaded.store.row_count("admissions").unwrap(), 2);
    assert_eq!(reloaded.store.row_count("admissions_problems").unwrap(), 1);
}

use std::fs;

use anyhow::{Context, Result};
use tracing::info;

use fdm_cli::cli::{BuildArgs, WorkspaceArgs};
use fdm_cli::pipeline::{BuildOutcome, DatasetResult, run_build, run_recombine, table_status};
use fdm_cli::workspace::{Workspace, WorkspacePaths};

use crate::summary::{print_build_summary, print_problem_codes, print_status};

pub fn build(args: &BuildArgs) -> Result<BuildOutcome> {
    let paths = WorkspacePaths::from_args(&args.workspace);
    let dataset_id = args.dataset_id.clone().unwrap_or_else(|| paths.name());
    let workspace = Workspace::load(paths)?;

    let outcome = run_build(&workspace, &dataset_id, args.tables_only)?;
    if args.dry_run {
        info!("dry run; nothing written");
    } else {
        workspace.save()?;
    }
    if let (Some(path), DatasetResult::Built(report)) = (&args.report, &outcome.dataset) {
        let json = serde_json::to_string_pretty(report).context("serialize report")?;
        fs::write(path, json).with_context(|| format!("write report {}", path.display()))?;
    }
    print_build_summary(&outcome);
    Ok(outcome)
}

pub fn status(args: &WorkspaceArgs) -> Result<()> {
    let workspace = Workspace::load(WorkspacePaths::from_args(args))?;
    print_status(&table_status(&workspace)?);
    Ok(())
}

pub fn recombine(args: &WorkspaceArgs) -> Result<()> {
    let workspace = Workspace::load(WorkspacePaths::from_args(args))?;
    let tables = run_recombine(&workspace)?;
    workspace.save()?;
    if tables.is_empty() {
        println!("No open problem partitions.");
    } else {
        println!("Recombined: {}", tables.join(", "));
    }
    Ok(())
}

pub fn problems() {
    print_problem_codes();
}

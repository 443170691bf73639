use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use fdm_cli::pipeline::{BuildOutcome, DatasetResult, TableStatus};
use fdm_model::{BuildStage, DatasetReport, ProblemCode, StageStatus};

pub fn print_build_summary(outcome: &BuildOutcome) {
    println!("Dataset: {}", outcome.dataset_id);

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Table"),
        header_cell("Stages run"),
        header_cell("Rows"),
        header_cell("Status"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    align_column(&mut table, 2, CellAlignment::Right);
    for result in &outcome.tables {
        match &result.outcome {
            Ok(built) => {
                let applied = built
                    .stages
                    .iter()
                    .filter(|stage| stage.status == StageStatus::Applied)
                    .count();
                table.add_row(vec![
                    table_cell(&result.table),
                    count_cell(applied, Color::Green),
                    Cell::new(built.rows),
                    Cell::new("ready").fg(Color::Green),
                ]);
            }
            Err(err) => {
                table.add_row(vec![
                    table_cell(&result.table),
                    dim_cell("-"),
                    dim_cell("-"),
                    Cell::new(err.to_string()).fg(Color::Red),
                ]);
            }
        }
    }
    println!("{table}");

    match &outcome.dataset {
        DatasetResult::Built(report) => print_dataset_report(report),
        DatasetResult::Blocked(blocked) => {
            eprintln!("Dataset build blocked: {blocked}");
        }
        DatasetResult::Skipped => println!("Dataset build skipped."),
    }

    let warnings = outcome.warnings();
    if !warnings.is_empty() {
        eprintln!("Warnings:");
        for warning in warnings {
            eprintln!("- {warning}");
        }
    }
}

fn print_dataset_report(report: &DatasetReport) {
    println!(
        "Population: {} -> {} subjects; observation periods: {} -> {}",
        report.population[0],
        report.population[1],
        report.observation_periods[0],
        report.observation_periods[1],
    );
    if report.unlinked_identifiers > 0 || report.missing_from_registry > 0 {
        println!(
            "Unlinked identifier values: {}; subjects missing from registry: {}",
            report.unlinked_identifiers, report.missing_from_registry
        );
    }

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Table"),
        header_cell("Clean"),
        header_cell("Quarantined"),
        header_cell("Informational"),
    ]);
    apply_summary_table_style(&mut table);
    for column in 1..=3 {
        align_column(&mut table, column, CellAlignment::Right);
    }
    for summary in &report.tables {
        table.add_row(vec![
            table_cell(&summary.table),
            Cell::new(summary.clean_rows),
            count_cell(summary.quarantined_rows, Color::Red),
            count_cell(summary.informational_rows, Color::Yellow),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(report.clean_rows()).add_attribute(Attribute::Bold),
        count_cell(report.quarantined_rows(), Color::Red).add_attribute(Attribute::Bold),
        dim_cell("-"),
    ]);
    println!("{table}");
    print_problem_table(report);
}

fn print_problem_table(report: &DatasetReport) {
    let mut rows = Vec::new();
    for summary in &report.tables {
        for code in ProblemCode::ALL {
            let count = summary.count(code);
            if count > 0 {
                rows.push((summary.table.as_str(), code, count));
            }
        }
    }
    if rows.is_empty() {
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Table"),
        header_cell("Problem"),
        header_cell("Rows"),
        header_cell("Description"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    for (name, code, count) in rows {
        let informational = code.is_informational(true);
        table.add_row(vec![
            table_cell(name),
            problem_cell(code, informational),
            Cell::new(count),
            Cell::new(code.message()),
        ]);
    }
    println!();
    println!("Problems:");
    println!("{table}");
}

pub fn print_status(statuses: &[TableStatus]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Table"),
        header_cell("Stage"),
        header_cell("Rows"),
        header_cell("Problems"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);
    for status in statuses {
        table.add_row(vec![
            table_cell(&status.table),
            stage_cell(status.stage),
            status.rows.map_or_else(|| dim_cell("-"), Cell::new),
            status
                .problems
                .map_or_else(|| dim_cell("-"), |rows| count_cell(rows, Color::Red)),
        ]);
    }
    println!("{table}");
}

pub fn print_problem_codes() {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("#"),
        header_cell("Code"),
        header_cell("Description"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    for (idx, code) in ProblemCode::ALL.into_iter().enumerate() {
        table.add_row(vec![
            Cell::new(idx + 1),
            problem_cell(code, code.is_informational(true)),
            Cell::new(code.message()),
        ]);
    }
    println!("{table}");
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn stage_cell(stage: BuildStage) -> Cell {
    match stage {
        BuildStage::Ready => Cell::new(stage).fg(Color::Green),
        BuildStage::Uncopied => dim_cell(stage),
        _ => Cell::new(stage).fg(Color::Yellow),
    }
}

fn problem_cell(code: ProblemCode, informational: bool) -> Cell {
    if informational {
        Cell::new(code).fg(Color::Yellow)
    } else {
        Cell::new(code).fg(Color::Red)
    }
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn table_cell(name: &str) -> Cell {
    Cell::new(name)
        .fg(Color::Blue)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}

//! Canonical column and table names.
//!
//! The build state of a table is encoded entirely in which of these columns it
//! carries, and whether a `<table>_problems` companion table exists.

/// Canonical subject key column.
pub const SUBJECT_ID: &str = "person_id";
/// Canonical event start date column.
pub const EVENT_START_DATE: &str = "event_start_date";
/// Canonical event end date column.
pub const EVENT_END_DATE: &str = "event_end_date";
/// Label column carried by problem partitions.
pub const PROBLEM: &str = "problem";

/// Registry birth date column.
pub const BIRTH_DATE: &str = "birth_date";
/// Registry death date column.
pub const DEATH_DATE: &str = "death_date";

/// Observation period start column.
pub const OBSERVATION_PERIOD_START: &str = "observation_period_start_date";
/// Observation period end column.
pub const OBSERVATION_PERIOD_END: &str = "observation_period_end_date";

/// Subject population table.
pub const PERSON_TABLE: &str = "person";
/// Per-subject observation period table.
pub const OBSERVATION_PERIOD_TABLE: &str = "observation_period";
/// Secondary identifiers that could not be linked to a subject key.
pub const UNLINKED_IDENTIFIERS_TABLE: &str = "unlinked_identifiers";
/// Subject keys that are absent from the registry.
pub const MISSING_FROM_REGISTRY_TABLE: &str = "subjects_missing_from_registry";

/// Suffix of the quarantine companion table.
pub const PROBLEMS_SUFFIX: &str = "_problems";

/// Column names that always hold dates when present.
pub const DATE_COLUMNS: &[&str] = &[
    EVENT_START_DATE,
    EVENT_END_DATE,
    BIRTH_DATE,
    DEATH_DATE,
    OBSERVATION_PERIOD_START,
    OBSERVATION_PERIOD_END,
];

const STANDARD_TABLES: &[&str] = &[
    PERSON_TABLE,
    OBSERVATION_PERIOD_TABLE,
    UNLINKED_IDENTIFIERS_TABLE,
    MISSING_FROM_REGISTRY_TABLE,
];

/// Name of the problem partition belonging to `table`.
pub fn problems_table(table: &str) -> String {
    format!("{table}{PROBLEMS_SUFFIX}")
}

/// Returns the parent table name if `name` is a problem partition.
pub fn problems_parent(name: &str) -> Option<&str> {
    name.strip_suffix(PROBLEMS_SUFFIX)
        .filter(|parent| !parent.is_empty())
}

/// Returns true for tables produced by the dataset build itself.
pub fn is_standard_table(name: &str) -> bool {
    STANDARD_TABLES.contains(&name)
}

/// Returns true if `name` is an event table of the working dataset: neither a
/// standard output, a problem partition, nor a qualified name belonging to
/// another dataset.
pub fn is_event_table(name: &str) -> bool {
    !name.contains('.') && !is_standard_table(name) && problems_parent(name).is_none()
}

/// Working table alias of a fully qualified source id (`project.dataset.table`).
pub fn table_alias(source_id: &str) -> &str {
    source_id.rsplit('.').next().unwrap_or(source_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problems_table_round_trips_parent() {
        let name = problems_table("admissions");
        assert_eq!(name, "admissions_problems");
        assert_eq!(problems_parent(&name), Some("admissions"));
        assert_eq!(problems_parent("_problems"), None);
        assert_eq!(problems_parent("admissions"), None);
    }

    #[test]
    fn event_tables_exclude_outputs_partitions_and_sources() {
        assert!(is_event_table("admissions"));
        assert!(!is_event_table("person"));
        assert!(!is_event_table("observation_period"));
        assert!(!is_event_table("admissions_problems"));
        assert!(!is_event_table("source.admissions"));
    }

    #[test]
    fn alias_takes_last_segment() {
        assert_eq!(table_alias("project.raw.admissions"), "admissions");
        assert_eq!(table_alias("admissions"), "admissions");
    }
}

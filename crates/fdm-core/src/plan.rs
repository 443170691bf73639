//! Configuration planning.
//!
//! [`plan_table`] is a pure function from a table's columns and its
//! configuration to either a complete plan or the full list of decisions a
//! front end still has to supply. Nothing is read from or written to the
//! store.

use fdm_model::names::{EVENT_END_DATE, EVENT_START_DATE, SUBJECT_ID};
use fdm_model::{BlockReason, BuildStage, DateSource, DateSpec, IdentifierKind, TableConfig};
use fdm_transform::{TransformError, candidate_identifiers, identifier_renames};

/// How one date column will be obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatePlan {
    /// The canonical column already exists.
    Present,
    Derive(DateSpec),
    /// Optional and not configured.
    NotConfigured,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePlan {
    /// Identifier renames applied before resolution.
    pub renames: Vec<(String, String)>,
    /// Identifier that provides the subject key.
    pub identifier: IdentifierKind,
    pub event_start: DatePlan,
    pub event_end: DatePlan,
}

/// A decision the configuration does not supply yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingDecision {
    /// Stage that needs the decision.
    pub stage: BuildStage,
    pub reason: BlockReason,
}

/// Resolves the build plan of a table with the given columns.
pub fn plan_table(
    columns: &[String],
    config: &TableConfig,
) -> Result<TablePlan, Vec<MissingDecision>> {
    let mut missing = Vec::new();

    let renames = match identifier_renames(columns, config.identifier_alias.as_ref()) {
        Ok(renames) => renames,
        Err(err) => {
            if let TransformError::Blocked(reason) = err {
                missing.push(MissingDecision {
                    stage: BuildStage::IdentifierResolved,
                    reason,
                });
            }
            Vec::new()
        }
    };
    let renamed: Vec<String> = columns
        .iter()
        .map(|name| {
            renames
                .iter()
                .find(|(from, _)| from == name)
                .map_or_else(|| name.clone(), |(_, to)| to.clone())
        })
        .collect();

    let identifier = if renamed.iter().any(|name| name == SUBJECT_ID) {
        Some(IdentifierKind::SubjectId)
    } else {
        candidate_identifiers(&renamed)
            .into_iter()
            .find(|kind| kind.is_secondary())
    };
    if identifier.is_none() && missing.is_empty() {
        missing.push(MissingDecision {
            stage: BuildStage::IdentifierResolved,
            reason: BlockReason::NoIdentifierColumns {
                available: columns.to_vec(),
            },
        });
    }

    let event_start = plan_date(
        &renamed,
        EVENT_START_DATE,
        config.event_start.as_ref(),
        BuildStage::StartDateResolved,
        &mut missing,
    );
    if event_start == DatePlan::NotConfigured {
        missing.push(MissingDecision {
            stage: BuildStage::StartDateResolved,
            reason: BlockReason::StartDateNotConfigured,
        });
    }
    let event_end = plan_date(
        &renamed,
        EVENT_END_DATE,
        config.event_end.as_ref(),
        BuildStage::EndDateResolved,
        &mut missing,
    );

    match identifier {
        Some(identifier) if missing.is_empty() => Ok(TablePlan {
            renames,
            identifier,
            event_start,
            event_end,
        }),
        _ => Err(missing),
    }
}

fn plan_date(
    columns: &[String],
    target: &str,
    spec: Option<&DateSpec>,
    stage: BuildStage,
    missing: &mut Vec<MissingDecision>,
) -> DatePlan {
    if columns.iter().any(|name| name == target) {
        return DatePlan::Present;
    }
    let Some(spec) = spec else {
        return DatePlan::NotConfigured;
    };
    if let DateSource::Column(column) = &spec.columns
        && !columns.iter().any(|name| name == column)
    {
        missing.push(MissingDecision {
            stage,
            reason: BlockReason::UnknownDateColumn {
                column: column.clone(),
            },
        });
    }
    DatePlan::Derive(spec.clone())
}

#[cfg(test)]
mod tests {
    use fdm_model::{DateOrder, IdentifierAlias};

    use super::*;

    fn names(columns: &[&str]) -> Vec<String> {
        columns.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn complete_plan_for_configured_table() {
        let config = TableConfig::default()
            .with_event_start(DateSpec::column("adm_date", DateOrder::Dmy))
            .with_event_end(DateSpec::parts(["y", "m", "d"], DateOrder::Ymd));
        let plan = plan_table(&names(&["Digest", "adm_date"]), &config).unwrap();
        assert_eq!(plan.identifier, IdentifierKind::Digest);
        assert_eq!(plan.renames, vec![("Digest".to_string(), "digest".to_string())]);
        assert!(matches!(plan.event_start, DatePlan::Derive(_)));
        assert!(matches!(plan.event_end, DatePlan::Derive(_)));
    }

    #[test]
    fn existing_columns_need_no_configuration() {
        let plan = plan_table(
            &names(&["person_id", "event_start_date"]),
            &TableConfig::default(),
        )
        .unwrap();
        assert_eq!(plan.identifier, IdentifierKind::SubjectId);
        assert_eq!(plan.event_start, DatePlan::Present);
        assert_eq!(plan.event_end, DatePlan::NotConfigured);
    }

    #[test]
    fn lists_every_missing_decision() {
        let config = TableConfig::default()
            .with_event_end(DateSpec::column("discharge", DateOrder::Ymd));
        let missing = plan_table(&names(&["hospital"]), &config).unwrap_err();
        let codes: Vec<_> = missing.iter().map(|decision| decision.reason.as_code()).collect();
        assert_eq!(
            codes,
            vec!["no_identifier_columns", "start_date_not_configured", "unknown_date_column"]
        );
    }

    #[test]
    fn missing_alias_column_is_reported_once() {
        let config = TableConfig {
            identifier_alias: Some(IdentifierAlias {
                column: "hashed".to_string(),
                kind: IdentifierKind::Digest,
            }),
            ..TableConfig::default()
        }
        .with_event_start(DateSpec::parts(["2020", "1", "1"], DateOrder::Ymd));
        let missing = plan_table(&names(&["value"]), &config).unwrap_err();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].reason.as_code(), "alias_column_missing");
    }
}

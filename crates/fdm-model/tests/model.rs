use chrono::NaiveDate;
use fdm_model::{
    BlockReason, BlockedReport, BuildConfig, BuildStage, DateOrder, DateSource, IdentifierKind,
    ObservationPeriodMode, PartitionSummary, ProblemCode,
};

#[test]
fn build_config_from_json_uses_defaults() {
    let json = r#"{
        "dataset": { "extract_end_date": "2024-06-30" },
        "tables": {
            "admissions": {
                "identifier_alias": { "column": "hashed_id", "kind": "digest" },
                "event_start": { "columns": ["adm_year", "adm_month", "adm_day"] },
                "event_end": { "columns": "discharge_date", "order": "DMY" }
            },
            "prescriptions": {}
        }
    }"#;
    let config: BuildConfig = serde_json::from_str(json).unwrap();

    assert_eq!(
        config.dataset.extract_end_date,
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    );
    assert_eq!(config.dataset.prenatal_window_days, 300);
    assert_eq!(config.dataset.prenatal_grace_days, 6);
    assert_eq!(config.dataset.death_grace_days, 42);
    assert!(config.dataset.includes_prenatal);
    assert_eq!(config.dataset.observation_period, ObservationPeriodMode::Bounded);

    let admissions = config.table("admissions").unwrap();
    let alias = admissions.identifier_alias.as_ref().unwrap();
    assert_eq!(alias.kind, IdentifierKind::Digest);
    let start = admissions.event_start.as_ref().unwrap();
    assert_eq!(start.order, DateOrder::Ymd);
    assert!(matches!(start.columns, DateSource::Parts(_)));
    let end = admissions.event_end.as_ref().unwrap();
    assert_eq!(end.order, DateOrder::Dmy);
    assert_eq!(end.columns, DateSource::Column("discharge_date".to_string()));

    let prescriptions = config.table("prescriptions").unwrap();
    assert!(prescriptions.event_start.is_none());
    assert!(!prescriptions.fresh_copy);
}

#[test]
fn identifier_kinds_use_canonical_column_names() {
    let kinds: Vec<_> = IdentifierKind::PRIORITY
        .iter()
        .map(|kind| kind.column_name())
        .collect();
    assert_eq!(kinds, vec!["person_id", "digest", "EDRN"]);
    assert!(IdentifierKind::Edrn.matches_loosely("edrn"));
    assert_eq!(
        serde_json::to_string(&IdentifierKind::Edrn).unwrap(),
        r#""EDRN""#
    );
}

#[test]
fn blocked_report_lists_every_table() {
    let mut report = BlockedReport::default();
    report.push(
        "admissions",
        BlockReason::NoIdentifierColumns {
            available: vec!["hospital".to_string(), "adm_date".to_string()],
        },
    );
    report.push("prescriptions", BlockReason::StartDateNotConfigured);
    report.push(
        "outpatients",
        BlockReason::StagePending {
            stage: BuildStage::EndDateResolved,
        },
    );

    insta::assert_snapshot!(report.to_string(), @r"
    3 table(s) not ready
      admissions: [no_identifier_columns] no identifier column found (columns: hospital, adm_date)
      prescriptions: [start_date_not_configured] no event start date configured
      outpatients: [stage_pending] table has not reached the `end_date_resolved` stage
    ");
}

#[test]
fn partition_summary_counts_by_code() {
    let mut summary = PartitionSummary::new("admissions");
    summary.record(ProblemCode::NotInRegistry);
    summary.record(ProblemCode::NotInRegistry);
    summary.record(ProblemCode::PrenatalStart);
    assert_eq!(summary.count(ProblemCode::NotInRegistry), 2);
    assert_eq!(summary.count(ProblemCode::StartAfterDeath), 0);
}

//! Tests for date and identifier resolution.

use chrono::NaiveDate;
use fdm_common::column_i64s;
use fdm_model::{
    BlockReason, DateOrder, DateSpec, IdentifierAlias, IdentifierKind, InvalidReason,
    SubjectRecord,
};
use fdm_store::InMemoryRegistry;
use fdm_transform::{
    IdentifierOutcome, TransformError, parse_date, resolve_dates, resolve_identifier,
};
use polars::prelude::*;
use proptest::prelude::*;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn registry() -> InMemoryRegistry {
    InMemoryRegistry::new()
        .with_subject(SubjectRecord::new(1, Some(date(1980, 1, 1))))
        .with_subject(SubjectRecord::new(2, Some(date(1990, 6, 1))))
        .with_link(IdentifierKind::Digest, "d-1", 1)
        .with_link(IdentifierKind::Digest, "d-2", 2)
        .with_link(IdentifierKind::Edrn, "E1", 1)
}

#[test]
fn literal_parts_resolve_on_every_row() {
    let frame = df!("person_id" => &[1i64, 2, 3]).unwrap();
    let spec = DateSpec::parts(["2020", "Feb", "15"], DateOrder::Ymd);
    let resolution = resolve_dates(&frame, &spec, "event_start_date").unwrap();
    assert_eq!(resolution.dates, vec![Some(date(2020, 2, 15)); 3]);
    assert_eq!(resolution.parsed(), 3);
    assert!(!resolution.ambiguous);
}

#[test]
fn all_unparseable_is_invalid() {
    let frame = df!("person_id" => &[1i64, 2]).unwrap();
    let spec = DateSpec::parts(["notayear", "x", "y"], DateOrder::Ymd);
    let err = resolve_dates(&frame, &spec, "event_start_date").unwrap_err();
    assert!(matches!(
        err,
        TransformError::Invalid(InvalidReason::DatesUnparseable { ref column })
            if column == "event_start_date"
    ));
}

#[test]
fn empty_table_is_not_invalid() {
    let frame = df!("raw" => Vec::<String>::new()).unwrap();
    let spec = DateSpec::column("raw", DateOrder::Ymd);
    let resolution = resolve_dates(&frame, &spec, "event_start_date").unwrap();
    assert!(resolution.dates.is_empty());
}

#[test]
fn blank_column_resolves_to_missing_dates() {
    let frame = df!("discharge" => &[None, Some(""), Some("  ")]).unwrap();
    let spec = DateSpec::column("discharge", DateOrder::Ymd);
    let resolution = resolve_dates(&frame, &spec, "event_end_date").unwrap();
    assert_eq!(resolution.dates, vec![None; 3]);
    assert_eq!(resolution.missing, 3);
    assert_eq!(resolution.unparseable, 0);
}

#[test]
fn mixed_columns_and_literals() {
    let frame = df!(
        "adm_year" => &[Some(2019i64), Some(2021), None],
        "adm_day" => &["3", "30", "1"],
    )
    .unwrap();
    let spec = DateSpec::parts(["adm_year", "Jan", "adm_day"], DateOrder::Ymd);
    let resolution = resolve_dates(&frame, &spec, "event_start_date").unwrap();
    assert_eq!(
        resolution.dates,
        vec![Some(date(2019, 1, 3)), Some(date(2021, 1, 30)), None]
    );
    assert_eq!(resolution.missing, 1);
}

#[test]
fn short_strings_warn_about_two_digit_years() {
    let frame = df!("raw" => &["15/02/20", "garbage!", "01/03/99"]).unwrap();
    let spec = DateSpec::column("raw", DateOrder::Dmy);
    let resolution = resolve_dates(&frame, &spec, "event_start_date").unwrap();
    assert!(resolution.ambiguous);
    assert_eq!(resolution.unparseable, 1);
    assert_eq!(resolution.dates[0], Some(date(2020, 2, 15)));
    assert_eq!(resolution.dates[2], Some(date(1999, 3, 1)));
    assert_eq!(resolution.warnings.len(), 2);
}

#[test]
fn unknown_single_column_blocks() {
    let frame = df!("raw" => &["2020-01-01"]).unwrap();
    let spec = DateSpec::column("missing", DateOrder::Ymd);
    let err = resolve_dates(&frame, &spec, "event_start_date").unwrap_err();
    assert!(matches!(
        err,
        TransformError::Blocked(BlockReason::UnknownDateColumn { .. })
    ));
}

#[test]
fn present_key_is_coerced_to_integer() {
    let frame = df!("PERSON_ID" => &["1", "2.0", ""]).unwrap();
    let resolution = resolve_identifier(frame, None, &registry()).unwrap();
    assert_eq!(
        resolution.outcome,
        IdentifierOutcome::AlreadyPresent { coerced: true }
    );
    assert_eq!(
        column_i64s(&resolution.frame, "person_id").unwrap(),
        vec![Some(1), Some(2), None]
    );
}

#[test]
fn digest_is_preferred_and_ambiguity_is_reported() {
    let frame = df!(
        "EDRN" => &["E1", "E1", "E1"],
        "Digest" => &["d-2", "d-1", "unknown"],
    )
    .unwrap();
    let resolution = resolve_identifier(frame, None, &registry()).unwrap();

    assert_eq!(
        resolution.outcome,
        IdentifierOutcome::Derived {
            via: IdentifierKind::Digest,
            matched: 2,
            unmatched: 1,
            ambiguous: true,
        }
    );
    assert_eq!(resolution.warnings.len(), 1);
    assert_eq!(resolution.frame.get_column_names()[0].as_str(), "person_id");
    assert_eq!(
        column_i64s(&resolution.frame, "person_id").unwrap(),
        vec![Some(2), Some(1), None]
    );
    assert!(resolution.frame.column("digest").is_ok());
}

#[test]
fn alias_renames_before_lookup() {
    let frame = df!("record_no" => &["E1"]).unwrap();
    let alias = IdentifierAlias {
        column: "record_no".to_string(),
        kind: IdentifierKind::Edrn,
    };
    let resolution = resolve_identifier(frame, Some(&alias), &registry()).unwrap();
    assert_eq!(resolution.outcome.join_key(), Some(IdentifierKind::Edrn));
    assert!(resolution.frame.column("EDRN").is_ok());
}

#[test]
fn lookup_matching_nothing_is_invalid() {
    let frame = df!("digest" => &["zz", "yy"]).unwrap();
    let err = resolve_identifier(frame, None, &registry()).unwrap_err();
    assert!(matches!(
        err,
        TransformError::Invalid(InvalidReason::IdentifierUnmatched { ref identifier })
            if identifier == "digest"
    ));
}

#[test]
fn no_identifier_columns_blocks() {
    let frame = df!("hospital" => &["A"]).unwrap();
    let err = resolve_identifier(frame, None, &registry()).unwrap_err();
    assert!(matches!(
        err,
        TransformError::Blocked(BlockReason::NoIdentifierColumns { ref available })
            if available == &vec!["hospital".to_string()]
    ));
}

fn compose(value: NaiveDate, order: DateOrder, padded: bool) -> String {
    use chrono::Datelike;
    let year = value.year().to_string();
    let (month, day) = if padded {
        (format!("{:02}", value.month()), format!("{:02}", value.day()))
    } else {
        (value.month().to_string(), value.day().to_string())
    };
    let parts = match order {
        DateOrder::Ymd => [year, month, day],
        DateOrder::Ydm => [year, day, month],
        DateOrder::Dmy => [day, month, year],
        DateOrder::Mdy => [month, day, year],
    };
    parts.join("-")
}

proptest! {
    #[test]
    fn parts_round_trip_in_every_order(
        year in 1000i32..=9999,
        month in 1u32..=12,
        day in 1u32..=28,
        order_idx in 0usize..4,
        padded in any::<bool>(),
    ) {
        let value = date(year, month, day);
        let order = DateOrder::ALL[order_idx];
        prop_assert_eq!(parse_date(&compose(value, order, padded), order), Some(value));
    }
}

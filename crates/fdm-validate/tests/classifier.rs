use chrono::{Days, NaiveDate};
use fdm_common::date_series;
use fdm_model::{DatasetParams, ProblemCode, SubjectRecord};
use fdm_store::InMemoryRegistry;
use fdm_validate::{ProblemClassifier, RowFacts, Verdict, classify_frame};
use polars::prelude::*;
use proptest::prelude::*;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn params() -> DatasetParams {
    DatasetParams::new(date(2020, 12, 31))
}

fn registry() -> InMemoryRegistry {
    InMemoryRegistry::new()
        .with_subject(
            SubjectRecord::new(1, Some(date(2000, 1, 1))).with_death_date(date(2010, 1, 1)),
        )
        .with_subject(SubjectRecord::new(2, None))
        .with_subject(SubjectRecord::new(3, Some(date(1980, 6, 1))))
}

fn events(
    ids: &[Option<i64>],
    starts: &[Option<NaiveDate>],
    ends: Option<&[Option<NaiveDate>]>,
) -> DataFrame {
    let mut columns = vec![
        Series::new("person_id".into(), ids).into_column(),
        date_series("event_start_date", starts).unwrap().into_column(),
    ];
    if let Some(ends) = ends {
        columns.push(date_series("event_end_date", ends).unwrap().into_column());
    }
    DataFrame::new(columns).unwrap()
}

#[test]
fn unknown_subject_beats_missing_start() {
    let params = params();
    let facts = RowFacts {
        subject_id: Some(99),
        subject: None,
        start: None,
        end: None,
    };
    assert_eq!(
        ProblemClassifier::new(&params, true).classify(&facts),
        Verdict::Quarantined(ProblemCode::NotInRegistry)
    );
}

#[test]
fn death_grace_bounds_start() {
    let frame = events(
        &[Some(1), Some(1), Some(1)],
        &[
            Some(date(2010, 2, 12)),
            Some(date(2010, 2, 13)),
            Some(date(2010, 3, 1)),
        ],
        None,
    );
    let classification = classify_frame(&frame, &registry(), &params()).unwrap();
    assert_eq!(
        classification.verdicts,
        vec![
            Verdict::Clean,
            Verdict::Quarantined(ProblemCode::StartAfterDeath),
            Verdict::Quarantined(ProblemCode::StartAfterDeath),
        ]
    );
}

#[test]
fn each_row_gets_its_most_fundamental_problem() {
    let frame = events(
        &[None, Some(7), Some(2), Some(3), Some(3), Some(3), Some(3), Some(3)],
        &[
            None,
            None,
            None,
            None,
            Some(date(2021, 5, 1)),
            Some(date(2001, 1, 1)),
            Some(date(2001, 1, 1)),
            Some(date(2001, 1, 1)),
        ],
        Some(&[
            None,
            None,
            None,
            None,
            Some(date(2021, 6, 1)),
            None,
            Some(date(2000, 1, 1)),
            Some(date(2001, 2, 1)),
        ]),
    );
    let classification = classify_frame(&frame, &registry(), &params()).unwrap();
    assert_eq!(
        classification.quarantine_labels(),
        vec![
            "missing_subject_id",
            "not_in_registry",
            "missing_birth_date",
            "missing_start_date",
            "start_after_extract",
            "missing_end_date",
            "end_before_start",
        ]
    );
    assert_eq!(classification.verdicts[7], Verdict::Clean);

    let summary = classification.summary("admissions");
    assert_eq!(summary.clean_rows, 1);
    assert_eq!(summary.quarantined_rows, 7);
    assert_eq!(summary.count(ProblemCode::EndBeforeStart), 1);
}

#[test]
fn informational_rows_stay_clean_but_are_counted() {
    let frame = events(&[Some(1)], &[Some(date(1999, 12, 1))], None);
    let classification = classify_frame(&frame, &registry(), &params()).unwrap();
    assert_eq!(classification.quarantined(), 0);
    let summary = classification.summary("births");
    assert_eq!(summary.informational_rows, 1);
    assert_eq!(summary.count(ProblemCode::PrenatalStart), 1);
}

#[test]
fn informational_prenatal_match_does_not_end_evaluation() {
    let birth = date(2000, 1, 1);
    let facts = |days_before_birth: u64| RowFacts {
        subject_id: Some(1),
        subject: Some(SubjectRecord::new(1, Some(birth))),
        start: Some(birth - Days::new(days_before_birth)),
        end: None,
    };
    let params = params();
    let classifier = ProblemClassifier::new(&params, false);

    // inside the window, clear of the grace margin: informational only
    assert_eq!(
        classifier.classify(&facts(294)),
        Verdict::Informational(ProblemCode::PrenatalStart)
    );
    // rule 5 matches first, but evaluation goes on and rule 6 quarantines
    assert_eq!(
        classifier.classify(&facts(297)),
        Verdict::Quarantined(ProblemCode::StartBeforeBirth)
    );
    assert_eq!(
        classifier.classify(&facts(301)),
        Verdict::Quarantined(ProblemCode::StartBeforeBirth)
    );

    // without prenatal events rule 5 is the first disqualifying match
    let strict = params.with_includes_prenatal(false);
    assert_eq!(
        ProblemClassifier::new(&strict, false).classify(&facts(297)),
        Verdict::Quarantined(ProblemCode::PrenatalStart)
    );
}

#[test]
fn missing_start_column_reads_as_missing_dates() {
    let frame = df!("person_id" => &[3i64]).unwrap();
    let classification = classify_frame(&frame, &registry(), &params()).unwrap();
    assert_eq!(
        classification.verdicts,
        vec![Verdict::Quarantined(ProblemCode::MissingStartDate)]
    );
}

proptest! {
    /// A row that passes classification passes again on its own, whatever its
    /// neighbours were.
    #[test]
    fn classification_is_row_local(
        offsets in proptest::collection::vec(-400i64..8000, 1..40),
        ids in proptest::collection::vec(0i64..5, 1..40),
    ) {
        let len = offsets.len().min(ids.len());
        let base = date(2000, 1, 1);
        let starts: Vec<Option<NaiveDate>> = offsets[..len]
            .iter()
            .map(|days| base.checked_add_signed(chrono::Duration::days(*days)))
            .collect();
        let ids: Vec<Option<i64>> = ids[..len].iter().map(|id| (*id > 0).then_some(*id)).collect();
        let frame = events(&ids, &starts, None);
        let registry = registry();
        let params = params();
        let all = classify_frame(&frame, &registry, &params).unwrap();
        for row in 0..len {
            let single = events(&ids[row..=row], &starts[row..=row], None);
            let alone = classify_frame(&single, &registry, &params).unwrap();
            prop_assert_eq!(alone.verdicts[0], all.verdicts[row]);
        }
    }
}

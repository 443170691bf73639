//! The ordered plausibility rule list.

use chrono::NaiveDate;
use fdm_model::config::shift_days;
use fdm_model::{DatasetParams, ProblemCode, SubjectRecord};

/// Everything a rule may look at for one row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowFacts {
    pub subject_id: Option<i64>,
    /// Registry record of the subject, when the key is known to the registry.
    pub subject: Option<SubjectRecord>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl RowFacts {
    fn birth(&self) -> Option<NaiveDate> {
        self.subject.as_ref().and_then(|subject| subject.birth_date)
    }

    fn death(&self) -> Option<NaiveDate> {
        self.subject.as_ref().and_then(|subject| subject.death_date)
    }
}

/// A problem code with the predicate that detects it.
///
/// Predicates check their own prerequisites (a missing birth date never
/// satisfies a birth comparison) so each one is meaningful in isolation.
#[derive(Clone, Copy)]
pub struct ProblemRule {
    pub code: ProblemCode,
    pub predicate: fn(&RowFacts, &DatasetParams) -> bool,
}

impl ProblemRule {
    pub fn matches(&self, facts: &RowFacts, params: &DatasetParams) -> bool {
        (self.predicate)(facts, params)
    }

    pub fn requires_end_date(&self) -> bool {
        self.code.requires_end_date()
    }
}

impl std::fmt::Debug for ProblemRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProblemRule").field("code", &self.code).finish()
    }
}

/// Rules in evaluation order. End-date rules come last and only apply to
/// tables with an end date column.
pub static RULES: [ProblemRule; 13] = [
    ProblemRule {
        code: ProblemCode::MissingSubjectId,
        predicate: missing_subject_id,
    },
    ProblemRule {
        code: ProblemCode::NotInRegistry,
        predicate: not_in_registry,
    },
    ProblemRule {
        code: ProblemCode::MissingBirthDate,
        predicate: missing_birth_date,
    },
    ProblemRule {
        code: ProblemCode::MissingStartDate,
        predicate: missing_start_date,
    },
    ProblemRule {
        code: ProblemCode::PrenatalStart,
        predicate: prenatal_start,
    },
    ProblemRule {
        code: ProblemCode::StartBeforeBirth,
        predicate: start_before_birth,
    },
    ProblemRule {
        code: ProblemCode::StartAfterDeath,
        predicate: start_after_death,
    },
    ProblemRule {
        code: ProblemCode::StartAfterExtract,
        predicate: start_after_extract,
    },
    ProblemRule {
        code: ProblemCode::MissingEndDate,
        predicate: missing_end_date,
    },
    ProblemRule {
        code: ProblemCode::EndBeforeStart,
        predicate: end_before_start,
    },
    ProblemRule {
        code: ProblemCode::EndBeforeBirth,
        predicate: end_before_birth,
    },
    ProblemRule {
        code: ProblemCode::EndAfterDeath,
        predicate: end_after_death,
    },
    ProblemRule {
        code: ProblemCode::EndAfterExtract,
        predicate: end_after_extract,
    },
];

fn missing_subject_id(facts: &RowFacts, _: &DatasetParams) -> bool {
    facts.subject_id.is_none()
}

fn not_in_registry(facts: &RowFacts, _: &DatasetParams) -> bool {
    facts.subject_id.is_some() && facts.subject.is_none()
}

fn missing_birth_date(facts: &RowFacts, _: &DatasetParams) -> bool {
    facts.subject.is_some() && facts.birth().is_none()
}

fn missing_start_date(facts: &RowFacts, _: &DatasetParams) -> bool {
    facts.start.is_none()
}

/// Start before birth, but within the prenatal window.
fn prenatal_start(facts: &RowFacts, params: &DatasetParams) -> bool {
    match (facts.start, facts.birth()) {
        (Some(start), Some(birth)) => {
            start < birth && shift_days(start, params.prenatal_window_days) >= birth
        }
        _ => false,
    }
}

/// Start earlier than the prenatal window less its grace margin.
fn start_before_birth(facts: &RowFacts, params: &DatasetParams) -> bool {
    match (facts.start, facts.birth()) {
        (Some(start), Some(birth)) => {
            let margin = params.prenatal_window_days - params.prenatal_grace_days;
            shift_days(start, margin) < birth
        }
        _ => false,
    }
}

fn start_after_death(facts: &RowFacts, params: &DatasetParams) -> bool {
    match (facts.start, facts.death()) {
        (Some(start), Some(death)) => start > params.death_cutoff(death),
        _ => false,
    }
}

fn start_after_extract(facts: &RowFacts, params: &DatasetParams) -> bool {
    facts
        .start
        .is_some_and(|start| start > params.extract_end_date)
}

fn missing_end_date(facts: &RowFacts, _: &DatasetParams) -> bool {
    facts.end.is_none()
}

fn end_before_start(facts: &RowFacts, _: &DatasetParams) -> bool {
    matches!((facts.start, facts.end), (Some(start), Some(end)) if end < start)
}

fn end_before_birth(facts: &RowFacts, _: &DatasetParams) -> bool {
    matches!((facts.end, facts.birth()), (Some(end), Some(birth)) if end < birth)
}

fn end_after_death(facts: &RowFacts, params: &DatasetParams) -> bool {
    match (facts.end, facts.death()) {
        (Some(end), Some(death)) => end > params.death_cutoff(death),
        _ => false,
    }
}

fn end_after_extract(facts: &RowFacts, params: &DatasetParams) -> bool {
    facts.end.is_some_and(|end| end > params.extract_end_date)
}

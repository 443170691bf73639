//! Data-quality problem codes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-row plausibility problem, in rule order.
///
/// Only the first matching rule labels a row, so correlated problems (a row
/// without a subject key also has no birth date) report the most fundamental
/// cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemCode {
    MissingSubjectId,
    NotInRegistry,
    MissingBirthDate,
    MissingStartDate,
    /// Start falls inside the prenatal window before birth.
    PrenatalStart,
    StartBeforeBirth,
    StartAfterDeath,
    StartAfterExtract,
    MissingEndDate,
    EndBeforeStart,
    EndBeforeBirth,
    EndAfterDeath,
    EndAfterExtract,
}

impl ProblemCode {
    pub const ALL: [Self; 13] = [
        Self::MissingSubjectId,
        Self::NotInRegistry,
        Self::MissingBirthDate,
        Self::MissingStartDate,
        Self::PrenatalStart,
        Self::StartBeforeBirth,
        Self::StartAfterDeath,
        Self::StartAfterExtract,
        Self::MissingEndDate,
        Self::EndBeforeStart,
        Self::EndBeforeBirth,
        Self::EndAfterDeath,
        Self::EndAfterExtract,
    ];

    pub fn as_code(self) -> &'static str {
        match self {
            Self::MissingSubjectId => "missing_subject_id",
            Self::NotInRegistry => "not_in_registry",
            Self::MissingBirthDate => "missing_birth_date",
            Self::MissingStartDate => "missing_start_date",
            Self::PrenatalStart => "prenatal_start",
            Self::StartBeforeBirth => "start_before_birth",
            Self::StartAfterDeath => "start_after_death",
            Self::StartAfterExtract => "start_after_extract",
            Self::MissingEndDate => "missing_end_date",
            Self::EndBeforeStart => "end_before_start",
            Self::EndBeforeBirth => "end_before_birth",
            Self::EndAfterDeath => "end_after_death",
            Self::EndAfterExtract => "end_after_extract",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|problem| problem.as_code() == code)
    }

    /// Human-readable description.
    pub fn message(self) -> &'static str {
        match self {
            Self::MissingSubjectId => "entry has no person_id",
            Self::NotInRegistry => "person_id is not in the registry",
            Self::MissingBirthDate => "person has no birth date in the registry",
            Self::MissingStartDate => "entry has no event_start_date",
            Self::PrenatalStart => "event_start_date is before birth, within the prenatal period",
            Self::StartBeforeBirth => "event_start_date is before birth",
            Self::StartAfterDeath => "event_start_date is after death (plus grace)",
            Self::StartAfterExtract => "event_start_date is after the extract end date",
            Self::MissingEndDate => "entry has no event_end_date",
            Self::EndBeforeStart => "event_end_date is before event_start_date",
            Self::EndBeforeBirth => "event_end_date is before birth",
            Self::EndAfterDeath => "event_end_date is after death (plus grace)",
            Self::EndAfterExtract => "event_end_date is after the extract end date",
        }
    }

    /// Whether the rule only applies to tables with an end date column.
    pub fn requires_end_date(self) -> bool {
        matches!(
            self,
            Self::MissingEndDate
                | Self::EndBeforeStart
                | Self::EndBeforeBirth
                | Self::EndAfterDeath
                | Self::EndAfterExtract
        )
    }

    /// An informational match is counted but keeps the row in the clean table.
    pub fn is_informational(self, includes_prenatal: bool) -> bool {
        includes_prenatal && self == Self::PrenatalStart
    }
}

impl fmt::Display for ProblemCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

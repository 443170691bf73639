//! First-match classification of rows.

use fdm_common::{column_dates, column_i64s};
use fdm_model::names::{EVENT_END_DATE, EVENT_START_DATE, SUBJECT_ID};
use fdm_model::{DatasetParams, PartitionSummary, ProblemCode};
use fdm_store::SubjectRegistry;
use polars::prelude::{DataFrame, PolarsResult};
use tracing::debug;

use crate::rules::{ProblemRule, RULES, RowFacts};

/// Label assigned to one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Clean,
    /// Kept in the clean table, but counted under an informational code.
    Informational(ProblemCode),
    /// Moved to the problem partition under the first disqualifying code.
    Quarantined(ProblemCode),
}

impl Verdict {
    pub fn is_quarantined(self) -> bool {
        matches!(self, Self::Quarantined(_))
    }

    pub fn code(self) -> Option<ProblemCode> {
        match self {
            Self::Clean => None,
            Self::Informational(code) | Self::Quarantined(code) => Some(code),
        }
    }
}

/// Applies [`RULES`] top to bottom; the first disqualifying match wins.
///
/// An informational match (the prenatal window when prenatal events are
/// included) is remembered but does not stop evaluation, so a later rule can
/// still quarantine the row.
#[derive(Debug, Clone)]
pub struct ProblemClassifier<'a> {
    params: &'a DatasetParams,
    has_end_date: bool,
}

impl<'a> ProblemClassifier<'a> {
    pub fn new(params: &'a DatasetParams, has_end_date: bool) -> Self {
        Self {
            params,
            has_end_date,
        }
    }

    /// Rules that apply to this table.
    pub fn rules(&self) -> impl Iterator<Item = &'static ProblemRule> + '_ {
        RULES
            .iter()
            .filter(|rule| self.has_end_date || !rule.requires_end_date())
    }

    pub fn classify(&self, facts: &RowFacts) -> Verdict {
        let mut informational = None;
        for rule in self.rules() {
            if !rule.matches(facts, self.params) {
                continue;
            }
            if rule.code.is_informational(self.params.includes_prenatal) {
                informational.get_or_insert(rule.code);
                continue;
            }
            return Verdict::Quarantined(rule.code);
        }
        informational.map_or(Verdict::Clean, Verdict::Informational)
    }
}

/// Verdicts for every row of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub verdicts: Vec<Verdict>,
}

impl Classification {
    pub fn quarantined_mask(&self) -> Vec<bool> {
        self.verdicts.iter().map(|verdict| verdict.is_quarantined()).collect()
    }

    pub fn quarantined(&self) -> usize {
        self.verdicts
            .iter()
            .filter(|verdict| verdict.is_quarantined())
            .count()
    }

    /// Problem codes of the quarantined rows, in row order.
    pub fn quarantine_labels(&self) -> Vec<&'static str> {
        self.verdicts
            .iter()
            .filter_map(|verdict| match verdict {
                Verdict::Quarantined(code) => Some(code.as_code()),
                _ => None,
            })
            .collect()
    }

    pub fn summary(&self, table: &str) -> PartitionSummary {
        let mut summary = PartitionSummary::new(table);
        for verdict in &self.verdicts {
            match verdict {
                Verdict::Clean => summary.clean_rows += 1,
                Verdict::Informational(code) => {
                    summary.clean_rows += 1;
                    summary.informational_rows += 1;
                    summary.record(*code);
                }
                Verdict::Quarantined(code) => {
                    summary.quarantined_rows += 1;
                    summary.record(*code);
                }
            }
        }
        summary
    }
}

/// Classifies every row of `frame`.
///
/// Registry facts are looked up per subject key. A missing start date column
/// reads as all rows lacking a start date; end-date rules apply only when the
/// end date column exists.
pub fn classify_frame(
    frame: &DataFrame,
    registry: &dyn SubjectRegistry,
    params: &DatasetParams,
) -> PolarsResult<Classification> {
    let height = frame.height();
    let ids = optional_column(frame, SUBJECT_ID, column_i64s)?;
    let starts = optional_column(frame, EVENT_START_DATE, column_dates)?;
    let has_end_date = frame.column(EVENT_END_DATE).is_ok();
    let ends = optional_column(frame, EVENT_END_DATE, column_dates)?;

    let classifier = ProblemClassifier::new(params, has_end_date);
    let verdicts: Vec<Verdict> = (0..height)
        .map(|row| {
            let subject_id = ids.as_ref().and_then(|ids| ids[row]);
            let facts = RowFacts {
                subject_id,
                subject: subject_id.and_then(|id| registry.subject(id)),
                start: starts.as_ref().and_then(|starts| starts[row]),
                end: ends.as_ref().and_then(|ends| ends[row]),
            };
            classifier.classify(&facts)
        })
        .collect();

    let classification = Classification { verdicts };
    debug!(
        rows = height,
        quarantined = classification.quarantined(),
        has_end_date,
        "rows classified"
    );
    Ok(classification)
}

fn optional_column<T>(
    frame: &DataFrame,
    name: &str,
    read: fn(&DataFrame, &str) -> PolarsResult<Vec<T>>,
) -> PolarsResult<Option<Vec<T>>> {
    if frame.column(name).is_ok() {
        read(frame, name).map(Some)
    } else {
        Ok(None)
    }
}

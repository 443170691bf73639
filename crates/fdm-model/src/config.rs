//! Build configuration.
//!
//! Everything an interactive front end would otherwise ask for is supplied up
//! front through these structs, usually deserialized from a JSON file:
//!
//! ```json
//! {
//!   "dataset": { "extract_end_date": "2024-06-30" },
//!   "tables": {
//!     "admissions": {
//!       "identifier_alias": { "column": "hashed_id", "kind": "digest" },
//!       "event_start": { "columns": ["adm_year", "adm_month", "adm_day"], "order": "YMD" },
//!       "event_end": { "columns": "discharge_date", "order": "DMY" }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::dates::DateSpec;
use crate::identifier::IdentifierKind;

/// Renames a misnamed column to a canonical identifier before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierAlias {
    pub column: String,
    pub kind: IdentifierKind,
}

/// Per-table build decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Immutable source relation to copy from. Callers choose a default when
    /// this is absent.
    pub source: Option<String>,
    pub identifier_alias: Option<IdentifierAlias>,
    pub event_start: Option<DateSpec>,
    pub event_end: Option<DateSpec>,
    /// Discard an existing working copy and copy the source again.
    pub fresh_copy: bool,
}

impl TableConfig {
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_identifier_alias(mut self, column: impl Into<String>, kind: IdentifierKind) -> Self {
        self.identifier_alias = Some(IdentifierAlias {
            column: column.into(),
            kind,
        });
        self
    }

    pub fn with_event_start(mut self, spec: DateSpec) -> Self {
        self.event_start = Some(spec);
        self
    }

    pub fn with_event_end(mut self, spec: DateSpec) -> Self {
        self.event_end = Some(spec);
        self
    }

    pub fn with_fresh_copy(mut self, fresh_copy: bool) -> Self {
        self.fresh_copy = fresh_copy;
        self
    }
}

/// How observation periods are derived from event dates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationPeriodMode {
    /// First event start to last event end.
    Unbounded,
    /// Event span clipped to the subject's plausible lifespan.
    #[default]
    Bounded,
}

/// Dataset-wide plausibility parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetParams {
    /// Date the source extract was taken; later events are implausible.
    pub extract_end_date: NaiveDate,
    #[serde(default = "default_prenatal_window_days")]
    pub prenatal_window_days: i64,
    #[serde(default = "default_prenatal_grace_days")]
    pub prenatal_grace_days: i64,
    #[serde(default = "default_death_grace_days")]
    pub death_grace_days: i64,
    /// Keep events shortly before birth instead of quarantining them.
    #[serde(default = "default_includes_prenatal")]
    pub includes_prenatal: bool,
    #[serde(default)]
    pub observation_period: ObservationPeriodMode,
}

fn default_prenatal_window_days() -> i64 {
    300
}

fn default_prenatal_grace_days() -> i64 {
    6
}

fn default_death_grace_days() -> i64 {
    42
}

fn default_includes_prenatal() -> bool {
    true
}

impl DatasetParams {
    pub fn new(extract_end_date: NaiveDate) -> Self {
        Self {
            extract_end_date,
            prenatal_window_days: default_prenatal_window_days(),
            prenatal_grace_days: default_prenatal_grace_days(),
            death_grace_days: default_death_grace_days(),
            includes_prenatal: default_includes_prenatal(),
            observation_period: ObservationPeriodMode::default(),
        }
    }

    pub fn with_prenatal_window(mut self, window_days: i64, grace_days: i64) -> Self {
        self.prenatal_window_days = window_days;
        self.prenatal_grace_days = grace_days;
        self
    }

    pub fn with_death_grace_days(mut self, days: i64) -> Self {
        self.death_grace_days = days;
        self
    }

    pub fn with_includes_prenatal(mut self, includes_prenatal: bool) -> Self {
        self.includes_prenatal = includes_prenatal;
        self
    }

    pub fn with_observation_period(mut self, mode: ObservationPeriodMode) -> Self {
        self.observation_period = mode;
        self
    }

    /// Latest plausible event date for a subject who died on `death_date`.
    pub fn death_cutoff(&self, death_date: NaiveDate) -> NaiveDate {
        shift_days(death_date, self.death_grace_days)
    }
}

/// Adds a signed number of days, saturating at the calendar bounds.
pub fn shift_days(date: NaiveDate, days: i64) -> NaiveDate {
    let magnitude = Days::new(days.unsigned_abs());
    let shifted = if days >= 0 {
        date.checked_add_days(magnitude)
    } else {
        date.checked_sub_days(magnitude)
    };
    shifted.unwrap_or(if days >= 0 {
        NaiveDate::MAX
    } else {
        NaiveDate::MIN
    })
}

/// Dataset parameters plus the per-table decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    pub dataset: DatasetParams,
    #[serde(default)]
    pub tables: BTreeMap<String, TableConfig>,
}

impl BuildConfig {
    pub fn new(dataset: DatasetParams) -> Self {
        Self {
            dataset,
            tables: BTreeMap::new(),
        }
    }

    pub fn with_table(mut self, name: impl Into<String>, config: TableConfig) -> Self {
        self.tables.insert(name.into(), config);
        self
    }

    pub fn table(&self, name: &str) -> Option<&TableConfig> {
        self.tables.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn death_cutoff_adds_grace() {
        let params = DatasetParams::new(date(2024, 1, 1));
        assert_eq!(params.death_cutoff(date(2010, 1, 1)), date(2010, 2, 12));
    }

    #[test]
    fn shift_days_saturates() {
        assert_eq!(shift_days(NaiveDate::MAX, 5), NaiveDate::MAX);
        assert_eq!(shift_days(NaiveDate::MIN, -5), NaiveDate::MIN);
    }
}

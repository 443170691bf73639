//! Master subject registry.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use fdm_common::{column_dates, column_i64s, column_strings};
use fdm_model::names::{BIRTH_DATE, DEATH_DATE, SUBJECT_ID};
use fdm_model::{IdentifierKind, SubjectRecord};
use polars::prelude::DataFrame;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};

/// Read-only demographic lookup.
pub trait SubjectRegistry: Send + Sync {
    fn subject(&self, subject_id: i64) -> Option<SubjectRecord>;

    /// Resolves an identifier value to a subject key.
    fn resolve(&self, kind: IdentifierKind, value: &str) -> Option<i64>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, subject_id: i64) -> bool {
        self.subject(subject_id).is_some()
    }
}

/// Registry held in memory, keyed by subject key and by secondary identifier.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    subjects: BTreeMap<i64, SubjectRecord>,
    links: HashMap<(IdentifierKind, String), i64>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a registry table.
    ///
    /// `person_id` is required; `birth_date`, `death_date` and any secondary
    /// identifier columns (matched case-insensitively) are optional. Rows
    /// without a subject key are skipped.
    pub fn from_frame(frame: &DataFrame) -> Result<Self> {
        let columns: Vec<String> = frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        let find = |kind: IdentifierKind| {
            columns
                .iter()
                .find(|name| kind.matches_loosely(name))
                .cloned()
        };
        let id_column = find(IdentifierKind::SubjectId).ok_or_else(|| StoreError::ColumnNotFound {
            table: "registry".to_string(),
            column: SUBJECT_ID.to_string(),
        })?;

        let ids = column_i64s(frame, &id_column)?;
        let births = optional_dates(frame, &columns, BIRTH_DATE)?;
        let deaths = optional_dates(frame, &columns, DEATH_DATE)?;

        let mut registry = Self::new();
        let mut skipped = 0usize;
        for (idx, id) in ids.iter().enumerate() {
            let Some(subject_id) = *id else {
                skipped += 1;
                continue;
            };
            registry.insert(SubjectRecord {
                subject_id,
                birth_date: births.as_ref().and_then(|dates| dates[idx]),
                death_date: deaths.as_ref().and_then(|dates| dates[idx]),
            });
        }

        for kind in IdentifierKind::SECONDARY {
            let Some(column) = find(kind) else {
                continue;
            };
            let values = column_strings(frame, &column)?;
            for (value, id) in values.into_iter().zip(&ids) {
                if let (Some(value), Some(subject_id)) = (value, *id) {
                    registry.link(kind, value, subject_id);
                }
            }
        }

        if skipped > 0 {
            warn!(rows = skipped, "registry rows without person_id skipped");
        }
        debug!(
            subjects = registry.subjects.len(),
            links = registry.links.len(),
            "registry loaded"
        );
        Ok(registry)
    }

    pub fn insert(&mut self, record: SubjectRecord) {
        self.subjects.insert(record.subject_id, record);
    }

    /// Associates a secondary identifier value with a subject key.
    pub fn link(&mut self, kind: IdentifierKind, value: impl Into<String>, subject_id: i64) {
        let value = value.into();
        self.links.insert((kind, value.trim().to_string()), subject_id);
    }

    pub fn with_subject(mut self, record: SubjectRecord) -> Self {
        self.insert(record);
        self
    }

    pub fn with_link(mut self, kind: IdentifierKind, value: &str, subject_id: i64) -> Self {
        self.link(kind, value, subject_id);
        self
    }
}

fn optional_dates(
    frame: &DataFrame,
    columns: &[String],
    name: &str,
) -> Result<Option<Vec<Option<NaiveDate>>>> {
    match columns.iter().find(|column| column.eq_ignore_ascii_case(name)) {
        Some(column) => Ok(Some(column_dates(frame, column)?)),
        None => Ok(None),
    }
}

impl SubjectRegistry for InMemoryRegistry {
    fn subject(&self, subject_id: i64) -> Option<SubjectRecord> {
        self.subjects.get(&subject_id).cloned()
    }

    fn resolve(&self, kind: IdentifierKind, value: &str) -> Option<i64> {
        let value = value.trim();
        match kind {
            IdentifierKind::SubjectId => fdm_common::parse_i64(value)
                .filter(|subject_id| self.subjects.contains_key(subject_id)),
            _ => self.links.get(&(kind, value.to_string())).copied(),
        }
    }

    fn len(&self) -> usize {
        self.subjects.len()
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Demographic facts for one subject, as held by the master registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub subject_id: i64,
    pub birth_date: Option<NaiveDate>,
    pub death_date: Option<NaiveDate>,
}

impl SubjectRecord {
    pub fn new(subject_id: i64, birth_date: Option<NaiveDate>) -> Self {
        Self {
            subject_id,
            birth_date,
            death_date: None,
        }
    }

    pub fn with_death_date(mut self, death_date: NaiveDate) -> Self {
        self.death_date = Some(death_date);
        self
    }
}

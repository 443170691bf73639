//! Identifier kinds accepted as subject linkage.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::names::SUBJECT_ID;

/// Identifier columns a source table may carry, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IdentifierKind {
    /// Canonical integer subject key.
    #[serde(rename = "person_id")]
    SubjectId,
    /// Hashed pseudonymous linkage token.
    #[serde(rename = "digest")]
    Digest,
    /// Electronic record number.
    #[serde(rename = "EDRN")]
    Edrn,
}

impl IdentifierKind {
    /// Every identifier, canonical key first.
    pub const PRIORITY: [Self; 3] = [Self::SubjectId, Self::Digest, Self::Edrn];
    /// Secondary identifiers in the order they are preferred for lookup.
    pub const SECONDARY: [Self; 2] = [Self::Digest, Self::Edrn];

    /// Canonical column name (case sensitive).
    pub fn column_name(self) -> &'static str {
        match self {
            Self::SubjectId => SUBJECT_ID,
            Self::Digest => "digest",
            Self::Edrn => "EDRN",
        }
    }

    pub fn from_column_name(name: &str) -> Option<Self> {
        Self::PRIORITY
            .into_iter()
            .find(|kind| kind.column_name() == name)
    }

    /// Matches a column whose name differs from the canonical spelling only
    /// in case (`Digest`, `edrn`, `PERSON_ID`).
    pub fn matches_loosely(self, name: &str) -> bool {
        self.column_name().eq_ignore_ascii_case(name.trim())
    }

    pub fn is_secondary(self) -> bool {
        !matches!(self, Self::SubjectId)
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

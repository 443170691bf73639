//! Date source descriptions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Position of day, month and year in a source date.
///
/// The ordering also decides which end the free-text parser favours when a
/// composite string is ambiguous (`year_first` / `day_first`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DateOrder {
    #[default]
    Ymd,
    Ydm,
    Dmy,
    Mdy,
}

impl DateOrder {
    pub const ALL: [Self; 4] = [Self::Ymd, Self::Ydm, Self::Dmy, Self::Mdy];

    /// Year is expected before day and month.
    pub fn year_first(self) -> bool {
        matches!(self, Self::Ymd | Self::Ydm)
    }

    /// Day is expected before month.
    pub fn day_first(self) -> bool {
        matches!(self, Self::Ydm | Self::Dmy)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ymd => "YMD",
            Self::Ydm => "YDM",
            Self::Dmy => "DMY",
            Self::Mdy => "MDY",
        }
    }
}

impl fmt::Display for DateOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown date order `{0}` (expected YMD, YDM, DMY or MDY)")]
pub struct ParseDateOrderError(pub String);

impl FromStr for DateOrder {
    type Err = ParseDateOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|order| order.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseDateOrderError(s.to_string()))
    }
}

/// Where the text of a date comes from.
///
/// A single column holds a composite date string. Three parts name the
/// year, month and day fields in that order (reordered by [`DateOrder`]);
/// each part is either a column name or, when no such column exists, a
/// literal repeated on every row (`["admit_year", "Jan", "15"]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateSource {
    Column(String),
    Parts([String; 3]),
}

/// A date source plus its ordering hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSpec {
    pub columns: DateSource,
    #[serde(default)]
    pub order: DateOrder,
}

impl DateSpec {
    pub fn column(name: impl Into<String>, order: DateOrder) -> Self {
        Self {
            columns: DateSource::Column(name.into()),
            order,
        }
    }

    pub fn parts(parts: [&str; 3], order: DateOrder) -> Self {
        Self {
            columns: DateSource::Parts(parts.map(str::to_string)),
            order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_flags_match_positions() {
        assert!(DateOrder::Ymd.year_first() && !DateOrder::Ymd.day_first());
        assert!(DateOrder::Ydm.year_first() && DateOrder::Ydm.day_first());
        assert!(!DateOrder::Dmy.year_first() && DateOrder::Dmy.day_first());
        assert!(!DateOrder::Mdy.year_first() && !DateOrder::Mdy.day_first());
    }

    #[test]
    fn order_parses_case_insensitively() {
        assert_eq!("dmy".parse::<DateOrder>(), Ok(DateOrder::Dmy));
        assert!("DYM".parse::<DateOrder>().is_err());
    }
}

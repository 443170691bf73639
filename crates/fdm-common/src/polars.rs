//! Cell and column readers over Polars `AnyValue`s.
//!
//! String, integer and date extraction from `AnyValue`s and whole columns,
//! plus construction of `Date` series from `chrono` dates.

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;

/// Days from 0001-01-01 (CE day 1) to the Unix epoch, as counted by `chrono`.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Renders a cell as text.
///
/// Null is empty, whole floats lose their fraction (`2020.0` becomes `"2020"`)
/// and dates print as `YYYY-MM-DD`.
///
/// ```
/// use polars::prelude::AnyValue;
/// use fdm_common::any_to_string;
///
/// assert_eq!(any_to_string(AnyValue::Null), "");
/// assert_eq!(any_to_string(AnyValue::Int32(42)), "42");
/// assert_eq!(any_to_string(AnyValue::String("Feb")), "Feb");
/// ```
pub fn any_to_string(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::String(text) => text.to_owned(),
        AnyValue::StringOwned(text) => text.to_string(),
        AnyValue::Float32(v) => format_numeric(f64::from(v)),
        AnyValue::Float64(v) => format_numeric(v),
        AnyValue::Date(days) => days_to_date(days)
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        other => other.to_string(),
    }
}

/// Like [`any_to_string`], but blank cells are `None`.
pub fn any_to_string_non_empty(value: AnyValue<'_>) -> Option<String> {
    let text = any_to_string(value);
    (!text.trim().is_empty()).then_some(text)
}

/// Prints a float with no trailing zeros.
///
/// ```
/// use fdm_common::format_numeric;
///
/// assert_eq!(format_numeric(2020.0), "2020");
/// assert_eq!(format_numeric(1.5), "1.5");
/// ```
pub fn format_numeric(v: f64) -> String {
    let text = v.to_string();
    if !text.contains('.') {
        return text;
    }
    match text.trim_end_matches('0').trim_end_matches('.') {
        "" | "-" | "-0" => "0".to_string(),
        digits => digits.to_string(),
    }
}

/// Reads a cell as an integer key.
///
/// Floats must be whole (`3.0`, not `3.9`), text goes through [`parse_i64`];
/// dates and other non-numeric values are `None`.
pub fn any_to_i64(value: AnyValue<'_>) -> Option<i64> {
    match value {
        AnyValue::Null | AnyValue::Date(_) | AnyValue::Boolean(_) => None,
        AnyValue::Float32(v) => whole_f64(f64::from(v)),
        AnyValue::Float64(v) => whole_f64(v),
        AnyValue::String(text) => parse_i64(text),
        AnyValue::StringOwned(text) => parse_i64(&text),
        other => other.extract::<i64>(),
    }
}

fn whole_f64(v: f64) -> Option<i64> {
    (v.is_finite() && v.fract() == 0.0).then(|| v as i64)
}

/// Parses an integer key. `"12.0"` is accepted, `"12.5"` and blanks are not.
pub fn parse_i64(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().and_then(whole_f64))
}

/// Converts an `AnyValue` to a date.
///
/// `Date` values are converted directly; anything else is rendered to text
/// and its leading `YYYY-MM-DD` is parsed, which covers ISO strings and
/// datetime renderings.
pub fn any_to_date(value: AnyValue<'_>) -> Option<NaiveDate> {
    match value {
        AnyValue::Null => None,
        AnyValue::Date(days) => days_to_date(days),
        AnyValue::String(s) => parse_date_prefix(s),
        AnyValue::StringOwned(s) => parse_date_prefix(&s),
        other => parse_date_prefix(&other.to_string()),
    }
}

/// Parses the leading `YYYY-MM-DD` of a string.
pub fn parse_date_prefix(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim().trim_matches('"');
    let head = trimmed.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Physical representation of a Polars `Date`: days since 1970-01-01.
pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

/// Builds a nullable `Date` series.
pub fn date_series(name: &str, dates: &[Option<NaiveDate>]) -> PolarsResult<Series> {
    let days: Vec<Option<i32>> = dates.iter().map(|date| date.map(date_to_days)).collect();
    Series::new(name.into(), days).cast(&DataType::Date)
}

/// Reads a column as nullable integers.
pub fn column_i64s(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<i64>>> {
    let column = df.column(name)?;
    (0..column.len())
        .map(|idx| column.get(idx).map(any_to_i64))
        .collect()
}

/// Reads a column as nullable dates.
pub fn column_dates(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<NaiveDate>>> {
    let column = df.column(name)?;
    (0..column.len())
        .map(|idx| column.get(idx).map(any_to_date))
        .collect()
}

/// Reads a column as text, mapping null and blank cells to `None`.
pub fn column_strings(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let column = df.column(name)?;
    (0..column.len())
        .map(|idx| column.get(idx).map(any_to_string_non_empty))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn cells_render_as_text() {
        assert_eq!(any_to_string(AnyValue::Null), "");
        assert_eq!(any_to_string(AnyValue::Int64(-7)), "-7");
        assert_eq!(any_to_string(AnyValue::Float64(1972.0)), "1972");
        assert_eq!(any_to_string(AnyValue::Float32(0.25)), "0.25");
        let days = date_to_days(date(2020, 2, 15));
        assert_eq!(any_to_string(AnyValue::Date(days)), "2020-02-15");
        assert_eq!(any_to_string_non_empty(AnyValue::String(" ")), None);
        assert_eq!(
            any_to_string_non_empty(AnyValue::String("d-1")).as_deref(),
            Some("d-1")
        );
    }

    #[test]
    fn integer_keys_accept_whole_floats_only() {
        assert_eq!(any_to_i64(AnyValue::Int32(3)), Some(3));
        assert_eq!(any_to_i64(AnyValue::UInt64(9)), Some(9));
        assert_eq!(any_to_i64(AnyValue::Float64(3.0)), Some(3));
        assert_eq!(any_to_i64(AnyValue::Float64(3.9)), None);
        assert_eq!(any_to_i64(AnyValue::Float32(-2.5)), None);
        assert_eq!(any_to_i64(AnyValue::Float64(f64::NAN)), None);
        assert_eq!(any_to_i64(AnyValue::String(" 12 ")), Some(12));
        assert_eq!(any_to_i64(AnyValue::String("12.0")), Some(12));
        assert_eq!(any_to_i64(AnyValue::String("12.5")), None);
        assert_eq!(any_to_i64(AnyValue::String("d-1")), None);
        assert_eq!(any_to_i64(AnyValue::Null), None);
    }

    #[test]
    fn epoch_offsets() {
        assert_eq!(date_to_days(date(1970, 1, 1)), 0);
        assert_eq!(days_to_date(-1), Some(date(1969, 12, 31)));
        assert_eq!(days_to_date(i32::MAX), None);
    }

    #[test]
    fn dates_read_from_iso_prefix() {
        assert_eq!(any_to_date(AnyValue::String("2010-03-01")), Some(date(2010, 3, 1)));
        assert_eq!(
            any_to_date(AnyValue::String("2010-03-01 00:00:00")),
            Some(date(2010, 3, 1))
        );
        assert_eq!(any_to_date(AnyValue::String("01/03/2010")), None);
        assert_eq!(any_to_date(AnyValue::Int64(5)), None);
    }

    #[test]
    fn date_series_reads_back() {
        let dates = vec![Some(date(1999, 12, 1)), None, Some(date(2010, 3, 1))];
        let series = date_series("event_start_date", &dates).unwrap();
        assert_eq!(series.dtype(), &DataType::Date);
        let df = DataFrame::new(vec![series.into_column()]).unwrap();
        assert_eq!(column_dates(&df, "event_start_date").unwrap(), dates);
    }

    #[test]
    fn blank_strings_are_missing() {
        let df = DataFrame::new(vec![
            Series::new("digest".into(), &[Some("a"), Some(""), None]).into_column(),
        ])
        .unwrap();
        assert_eq!(
            column_strings(&df, "digest").unwrap(),
            vec![Some("a".to_string()), None, None]
        );
    }
}

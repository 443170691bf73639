//! Free-text date resolution.
//!
//! Dates arrive either as one composite string column or as three
//! year/month/day parts. Parts are joined with `-` and go through the same
//! parser as composite strings, so `["2020", "Feb", "15"]`, `"15/02/2020"` and
//! `"20200215"` all land on the same path.
//!
//! The parser is a heuristic, not a general date library:
//!
//! - words carrying a time (`10:30`, `T10:30:00`) are ignored
//! - month names and abbreviations (`Feb`, `sept`) give the month directly
//! - a four-digit number, or one above 31, is the year
//! - otherwise positions follow the [`DateOrder`] hint
//! - a month above 12 is swapped with a day of 12 or less
//! - two-digit years below 72 are in the 2000s, the rest in the 1900s

use chrono::NaiveDate;
use fdm_common::column_strings;
use fdm_model::{BlockReason, DateOrder, DateSource, DateSpec, InvalidReason};
use polars::prelude::{DataFrame, PolarsResult};
use tracing::{debug, warn};

use crate::error::{Result, TransformError};

/// Two-digit years below the pivot are read as `20yy`, others as `19yy`.
pub const TWO_DIGIT_YEAR_PIVOT: i32 = 72;

/// Composite strings this short cannot hold a four-digit year with
/// separators.
const AMBIGUOUS_MAX_CHARS: usize = 8;

const PART_SEPARATOR: &str = "-";

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// Parsed dates for every row of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateResolution {
    pub dates: Vec<Option<NaiveDate>>,
    /// Rows whose source text was null or blank.
    pub missing: usize,
    /// Rows with text that did not parse.
    pub unparseable: usize,
    /// Every composite string was short enough to hide a two-digit year.
    pub ambiguous: bool,
    pub warnings: Vec<String>,
}

impl DateResolution {
    pub fn parsed(&self) -> usize {
        self.dates.len() - self.missing - self.unparseable
    }
}

/// Parses the date described by `spec` for every row of `frame`.
///
/// Single bad rows become `None`. If some rows carry text and none of it
/// parses, the whole column is rejected with
/// [`InvalidReason::DatesUnparseable`]. Empty tables and all-blank columns
/// resolve to missing dates.
pub fn resolve_dates(frame: &DataFrame, spec: &DateSpec, target: &str) -> Result<DateResolution> {
    let composites = composite_strings(frame, &spec.columns)?;
    let mut warnings = Vec::new();

    let ambiguous = composites.iter().any(Option::is_some)
        && composites
            .iter()
            .flatten()
            .all(|text| text.chars().count() <= AMBIGUOUS_MAX_CHARS);
    if ambiguous {
        warn!(
            column = target,
            order = %spec.order,
            "date strings may use two-digit years"
        );
        warnings.push(format!(
            "{target}: every date string has at most {AMBIGUOUS_MAX_CHARS} characters; \
             two-digit years resolve with pivot {TWO_DIGIT_YEAR_PIVOT}"
        ));
    }

    let dates: Vec<Option<NaiveDate>> = composites
        .iter()
        .map(|text| text.as_deref().and_then(|text| parse_date(text, spec.order)))
        .collect();
    let missing = composites.iter().filter(|text| text.is_none()).count();
    let parsed = dates.iter().filter(|date| date.is_some()).count();
    let unparseable = dates.len() - parsed - missing;

    if unparseable > 0 && parsed == 0 {
        return Err(TransformError::Invalid(InvalidReason::DatesUnparseable {
            column: target.to_string(),
        }));
    }
    if unparseable > 0 {
        warn!(column = target, rows = unparseable, "unparseable dates set to null");
        warnings.push(format!("{target}: {unparseable} unparseable value(s) set to null"));
    }
    debug!(column = target, parsed, missing, unparseable, "dates resolved");

    Ok(DateResolution {
        dates,
        missing,
        unparseable,
        ambiguous,
        warnings,
    })
}

fn composite_strings(frame: &DataFrame, source: &DateSource) -> Result<Vec<Option<String>>> {
    match source {
        DateSource::Column(name) => {
            if frame.column(name).is_err() {
                return Err(TransformError::Blocked(BlockReason::UnknownDateColumn {
                    column: name.clone(),
                }));
            }
            Ok(column_strings(frame, name)?)
        }
        DateSource::Parts([first, second, third]) => {
            let height = frame.height();
            let first = part_values(frame, first, height)?;
            let second = part_values(frame, second, height)?;
            let third = part_values(frame, third, height)?;
            Ok(first
                .into_iter()
                .zip(second)
                .zip(third)
                .map(|((a, b), c)| Some([a?, b?, c?].join(PART_SEPARATOR)))
                .collect())
        }
    }
}

/// Column values, or the part repeated as a literal when no such column exists.
fn part_values(frame: &DataFrame, part: &str, height: usize) -> PolarsResult<Vec<Option<String>>> {
    if frame.column(part).is_ok() {
        column_strings(frame, part)
    } else {
        Ok(vec![Some(part.trim().to_string()); height])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Year,
    Month,
    Day,
}

fn field_order(order: DateOrder) -> [Field; 3] {
    match order {
        DateOrder::Ymd => [Field::Year, Field::Month, Field::Day],
        DateOrder::Ydm => [Field::Year, Field::Day, Field::Month],
        DateOrder::Dmy => [Field::Day, Field::Month, Field::Year],
        DateOrder::Mdy => [Field::Month, Field::Day, Field::Year],
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Number(String),
    Month(u32),
}

/// Parses one free-text date. Returns `None` when the text is not a full,
/// valid calendar date.
pub fn parse_date(text: &str, order: DateOrder) -> Option<NaiveDate> {
    let tokens = tokenize(text)?;
    let (year, month, day) = match tokens.as_slice() {
        [Token::Number(digits)] => split_compact(digits, order)?,
        _ => assign_fields(&tokens, order)?,
    };
    let (month, day) = if month > 12 && day <= 12 {
        (day, month)
    } else {
        (month, day)
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn tokenize(text: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    for word in text.split_whitespace() {
        let word = strip_iso_time(word);
        if word.contains(':') {
            continue;
        }
        for raw in word
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|raw| !raw.is_empty())
        {
            let lower = raw.to_ascii_lowercase();
            if lower.bytes().all(|b| b.is_ascii_digit()) {
                tokens.push(Token::Number(lower));
            } else if let Some(digits) = strip_ordinal(&lower) {
                tokens.push(Token::Number(digits.to_string()));
            } else if let Some(month) = month_number(&lower) {
                tokens.push(Token::Month(month));
            } else if !is_filler(&lower) {
                return None;
            }
        }
    }
    Some(tokens)
}

/// Cuts an ISO `T` time designator (`2020-02-15T10`) off a word.
fn strip_iso_time(word: &str) -> &str {
    let bytes = word.as_bytes();
    for idx in 1..bytes.len().saturating_sub(1) {
        if matches!(bytes[idx], b'T' | b't')
            && bytes[idx - 1].is_ascii_digit()
            && bytes[idx + 1].is_ascii_digit()
        {
            return &word[..idx];
        }
    }
    word
}

fn strip_ordinal(token: &str) -> Option<&str> {
    ["st", "nd", "rd", "th"]
        .iter()
        .find_map(|suffix| token.strip_suffix(suffix))
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

fn month_number(token: &str) -> Option<u32> {
    if token == "sept" {
        return Some(9);
    }
    if token.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|name| name.starts_with(token))
        .and_then(|idx| u32::try_from(idx + 1).ok())
}

fn is_filler(token: &str) -> bool {
    matches!(token, "am" | "pm" | "of")
        || (token.len() >= 3 && WEEKDAYS.iter().any(|name| name.starts_with(token)))
}

fn expand_year(token: &str) -> Option<i32> {
    let value: i32 = token.parse().ok()?;
    if token.len() <= 2 {
        Some(if value < TWO_DIGIT_YEAR_PIVOT {
            2000 + value
        } else {
            1900 + value
        })
    } else {
        Some(value)
    }
}

/// A token that can only be a year.
fn year_position(numbers: &[&str]) -> Option<usize> {
    numbers.iter().position(|token| {
        token.len() >= 3 || token.parse::<u32>().is_ok_and(|value| value > 31)
    })
}

fn assign_fields(tokens: &[Token], order: DateOrder) -> Option<(i32, u32, u32)> {
    let months: Vec<u32> = tokens
        .iter()
        .filter_map(|token| match token {
            Token::Month(month) => Some(*month),
            Token::Number(_) => None,
        })
        .collect();
    let numbers: Vec<&str> = tokens
        .iter()
        .filter_map(|token| match token {
            Token::Number(digits) => Some(digits.as_str()),
            Token::Month(_) => None,
        })
        .collect();

    match (months.as_slice(), numbers.as_slice()) {
        ([month], [first, second]) => {
            let year_idx = year_position(&numbers).unwrap_or(if order.year_first() { 0 } else { 1 });
            let (year, day) = if year_idx == 0 {
                (first, second)
            } else {
                (second, first)
            };
            Some((expand_year(year)?, *month, day.parse().ok()?))
        }
        ([], [_, _, _]) => match year_position(&numbers) {
            Some(year_idx) => {
                let rest: Vec<&str> = numbers
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| *idx != year_idx)
                    .map(|(_, token)| *token)
                    .collect();
                let (day, month) = if order.day_first() {
                    (rest[0], rest[1])
                } else {
                    (rest[1], rest[0])
                };
                Some((expand_year(numbers[year_idx])?, month.parse().ok()?, day.parse().ok()?))
            }
            None => {
                let mut year = None;
                let mut month = None;
                let mut day = None;
                for (field, token) in field_order(order).into_iter().zip(&numbers) {
                    match field {
                        Field::Year => year = expand_year(token),
                        Field::Month => month = token.parse().ok(),
                        Field::Day => day = token.parse().ok(),
                    }
                }
                Some((year?, month?, day?))
            }
        },
        _ => None,
    }
}

/// Splits an undelimited `YYYYMMDD`-style string according to the order.
fn split_compact(digits: &str, order: DateOrder) -> Option<(i32, u32, u32)> {
    let year_width = match digits.len() {
        8 => 4,
        6 => 2,
        _ => return None,
    };
    let mut offset = 0;
    let mut year = None;
    let mut month = None;
    let mut day = None;
    for field in field_order(order) {
        let width = if field == Field::Year { year_width } else { 2 };
        let token = digits.get(offset..offset + width)?;
        offset += width;
        match field {
            Field::Year => year = expand_year(token),
            Field::Month => month = token.parse().ok(),
            Field::Day => day = token.parse().ok(),
        }
    }
    Some((year?, month?, day?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn parses_iso_with_time() {
        assert_eq!(parse_date("2020-02-15T10:30:00", DateOrder::Ymd), date(2020, 2, 15));
        assert_eq!(parse_date("2020-02-15 10:30", DateOrder::Ymd), date(2020, 2, 15));
    }

    #[test]
    fn parses_month_names_and_ordinals() {
        assert_eq!(parse_date("15th February 2020", DateOrder::Dmy), date(2020, 2, 15));
        assert_eq!(parse_date("Sat, Feb 15 2020", DateOrder::Mdy), date(2020, 2, 15));
        assert_eq!(parse_date("2020-Sept-1", DateOrder::Ymd), date(2020, 9, 1));
    }

    #[test]
    fn order_breaks_ties() {
        assert_eq!(parse_date("03/04/2020", DateOrder::Dmy), date(2020, 4, 3));
        assert_eq!(parse_date("03/04/2020", DateOrder::Mdy), date(2020, 3, 4));
        assert_eq!(parse_date("2020/03/04", DateOrder::Ydm), date(2020, 4, 3));
    }

    #[test]
    fn swaps_impossible_month() {
        assert_eq!(parse_date("2020-15-02", DateOrder::Ymd), date(2020, 2, 15));
    }

    #[test]
    fn two_digit_years_use_pivot() {
        assert_eq!(parse_date("15/02/20", DateOrder::Dmy), date(2020, 2, 15));
        assert_eq!(parse_date("15/02/85", DateOrder::Dmy), date(1985, 2, 15));
        assert_eq!(parse_date("71-01-01", DateOrder::Ymd), date(2071, 1, 1));
        assert_eq!(parse_date("72-01-01", DateOrder::Ymd), date(1972, 1, 1));
    }

    #[test]
    fn compact_strings_follow_order() {
        assert_eq!(parse_date("20200215", DateOrder::Ymd), date(2020, 2, 15));
        assert_eq!(parse_date("15022020", DateOrder::Dmy), date(2020, 2, 15));
        assert_eq!(parse_date("02152020", DateOrder::Mdy), date(2020, 2, 15));
        assert_eq!(parse_date("200215", DateOrder::Ymd), date(2020, 2, 15));
    }

    #[test]
    fn rejects_incomplete_or_unknown_text() {
        assert_eq!(parse_date("", DateOrder::Ymd), None);
        assert_eq!(parse_date("2020-02", DateOrder::Ymd), None);
        assert_eq!(parse_date("notayear-x-y", DateOrder::Ymd), None);
        assert_eq!(parse_date("2020-02-30", DateOrder::Ymd), None);
        assert_eq!(parse_date("2020", DateOrder::Ymd), None);
    }
}

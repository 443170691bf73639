//! Shared utilities for the event-schema crates.
//!
//! Row values are read through Polars `AnyValue`s so helpers work regardless
//! of the physical type a CSV reader or a cast produced.

pub mod polars;

pub use polars::{
    any_to_date, any_to_i64, any_to_string, any_to_string_non_empty, column_dates, column_i64s,
    column_strings, date_series, date_to_days, days_to_date, format_numeric, parse_date_prefix,
    parse_i64,
};

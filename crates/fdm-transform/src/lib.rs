//! Per-table resolution steps.
//!
//! - [`date`]: free-text date parsing from one composite column or three
//!   year/month/day parts
//! - [`identifier`]: canonical subject key detection, name correction and
//!   registry lookup from a secondary identifier
//!
//! Both resolvers are pure: they read a `DataFrame` and return a new one (or
//! the parsed values) together with any warnings. Writing the result back is
//! up to the caller.

pub mod date;
pub mod error;
pub mod identifier;

pub use date::{DateResolution, parse_date, resolve_dates};
pub use error::TransformError;
pub use identifier::{
    IdentifierOutcome, IdentifierResolution, candidate_identifiers, identifier_renames,
    resolve_identifier,
};

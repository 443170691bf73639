//! Row plausibility classification.
//!
//! [`RULES`] is the fixed ordered rule list; [`ProblemClassifier`] applies it
//! to one row at a time and [`classify_frame`] to a whole table joined with
//! the subject registry.

pub mod classifier;
pub mod rules;

pub use classifier::{Classification, ProblemClassifier, Verdict, classify_frame};
pub use rules::{ProblemRule, RULES, RowFacts};

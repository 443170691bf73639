//! Backing store collaborators for the event-schema build.
//!
//! The build core only talks to two interfaces:
//!
//! - [`RelationalStore`]: named tables with schema introspection and atomic
//!   full-replace materialization
//! - [`SubjectRegistry`]: read-only demographic lookup by subject key or
//!   secondary identifier
//!
//! [`InMemoryStore`] and [`InMemoryRegistry`] implement them over Polars
//! `DataFrame`s; the [`csv`] module moves tables between a store and a
//! directory of CSV files.

pub mod csv;
pub mod error;
pub mod memory;
pub mod registry;
pub mod store;

pub use csv::{load_csv_dir, read_csv_table, write_csv_table};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use registry::{InMemoryRegistry, SubjectRegistry};
pub use store::RelationalStore;

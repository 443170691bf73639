//! Subject key resolution.

use fdm_common::{column_i64s, column_strings};
use fdm_model::names::SUBJECT_ID;
use fdm_model::{BlockReason, IdentifierAlias, IdentifierKind, InvalidReason};
use fdm_store::SubjectRegistry;
use polars::prelude::{DataFrame, DataType, NamedFrom, Series};
use tracing::{info, warn};

use crate::error::{Result, TransformError};

/// How the subject key column was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierOutcome {
    /// The canonical key was already present; `coerced` when its storage
    /// type had to be converted to integer.
    AlreadyPresent { coerced: bool },
    /// Looked up in the registry through a secondary identifier.
    Derived {
        via: IdentifierKind,
        matched: usize,
        unmatched: usize,
        /// More than one secondary identifier was available.
        ambiguous: bool,
    },
}

impl IdentifierOutcome {
    /// The secondary identifier used as join key, if any.
    pub fn join_key(&self) -> Option<IdentifierKind> {
        match self {
            Self::AlreadyPresent { .. } => None,
            Self::Derived { via, .. } => Some(*via),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdentifierResolution {
    pub frame: DataFrame,
    pub outcome: IdentifierOutcome,
    pub warnings: Vec<String>,
}

/// Identifier kinds a set of column names can provide, in priority order.
/// Names are matched case-insensitively.
pub fn candidate_identifiers(columns: &[String]) -> Vec<IdentifierKind> {
    IdentifierKind::PRIORITY
        .into_iter()
        .filter(|kind| columns.iter().any(|name| kind.matches_loosely(name)))
        .collect()
}

/// Renames that bring identifier columns to their canonical spelling.
///
/// A configured alias renames its column to the chosen identifier. Columns
/// that differ from a canonical name only in case are renamed as well. A
/// rename never overwrites an existing column.
pub fn identifier_renames(
    columns: &[String],
    alias: Option<&IdentifierAlias>,
) -> Result<Vec<(String, String)>> {
    let mut renames = Vec::new();
    let mut taken: Vec<String> = columns.to_vec();

    if let Some(alias) = alias {
        let target = alias.kind.column_name();
        if !columns.iter().any(|name| name == &alias.column) {
            return Err(TransformError::Blocked(BlockReason::AliasColumnMissing {
                column: alias.column.clone(),
            }));
        }
        if alias.column != target && !taken.iter().any(|name| name == target) {
            renames.push((alias.column.clone(), target.to_string()));
            taken.retain(|name| name != &alias.column);
            taken.push(target.to_string());
        }
    }

    for kind in IdentifierKind::PRIORITY {
        let target = kind.column_name();
        if taken.iter().any(|name| name == target) {
            continue;
        }
        if let Some(found) = taken.iter().find(|name| kind.matches_loosely(name)).cloned() {
            renames.push((found.clone(), target.to_string()));
            taken.retain(|name| name != &found);
            taken.push(target.to_string());
        }
    }
    Ok(renames)
}

/// Makes sure `frame` carries an integer subject key column.
///
/// Identifier columns are first renamed to their canonical spelling. If the
/// key is present it is coerced to `Int64`; otherwise it is derived through
/// the highest-priority secondary identifier and inserted as the first
/// column. A lookup that matches no row at all is rejected as
/// [`InvalidReason::IdentifierUnmatched`], since it points at a wrong mapping
/// rather than a missing one.
pub fn resolve_identifier(
    mut frame: DataFrame,
    alias: Option<&IdentifierAlias>,
    registry: &dyn SubjectRegistry,
) -> Result<IdentifierResolution> {
    let columns: Vec<String> = frame
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    for (from, to) in identifier_renames(&columns, alias)? {
        info!(from = %from, to = %to, "renamed identifier column");
        frame.rename(&from, to.as_str().into())?;
    }

    if let Ok(column) = frame.column(SUBJECT_ID) {
        let coerced = column.dtype() != &DataType::Int64;
        if coerced {
            let ids = column_i64s(&frame, SUBJECT_ID)?;
            frame.with_column(Series::new(SUBJECT_ID.into(), ids))?;
        }
        return Ok(IdentifierResolution {
            frame,
            outcome: IdentifierOutcome::AlreadyPresent { coerced },
            warnings: Vec::new(),
        });
    }

    let present: Vec<IdentifierKind> = IdentifierKind::SECONDARY
        .into_iter()
        .filter(|kind| frame.column(kind.column_name()).is_ok())
        .collect();
    let Some(&via) = present.first() else {
        return Err(TransformError::Blocked(BlockReason::NoIdentifierColumns {
            available: columns,
        }));
    };

    let mut warnings = Vec::new();
    let ambiguous = present.len() > 1;
    if ambiguous {
        let names: Vec<&str> = present.iter().map(|kind| kind.column_name()).collect();
        warn!(
            candidates = ?names,
            chosen = via.column_name(),
            "several secondary identifiers present"
        );
        warnings.push(format!(
            "several secondary identifiers present ({}); using {}",
            names.join(", "),
            via.column_name()
        ));
    }

    let ids: Vec<Option<i64>> = column_strings(&frame, via.column_name())?
        .iter()
        .map(|value| value.as_deref().and_then(|value| registry.resolve(via, value)))
        .collect();
    let matched = ids.iter().filter(|id| id.is_some()).count();
    let unmatched = ids.len() - matched;
    if !ids.is_empty() && matched == 0 {
        return Err(TransformError::Invalid(InvalidReason::IdentifierUnmatched {
            identifier: via.column_name().to_string(),
        }));
    }
    if unmatched > 0 {
        warn!(via = via.column_name(), rows = unmatched, "rows not linked to a subject");
    }
    info!(via = via.column_name(), matched, unmatched, "subject key derived");

    frame.insert_column(0, Series::new(SUBJECT_ID.into(), ids))?;
    Ok(IdentifierResolution {
        frame,
        outcome: IdentifierOutcome::Derived {
            via,
            matched,
            unmatched,
            ambiguous,
        },
        warnings,
    })
}

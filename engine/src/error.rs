//! Error types for the sheetsync engine.

use crate::{EntityKind, RowId};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Where a row lives, for attributing row-level errors.
///
/// Rows with an id are named by id so they can be correlated across both
/// stores. New rows only have their sheet row number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "by", content = "value")]
pub enum RowRef {
    /// Row identified by its database id
    Id(RowId),
    /// Row identified by its 1-indexed sheet row number
    SheetRow(usize),
}

impl fmt::Display for RowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowRef::Id(id) => write!(f, "id {}", id),
            RowRef::SheetRow(n) => write!(f, "sheet row {}", n),
        }
    }
}

/// All possible errors from the sheetsync engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Bad input data. Aborts processing of that row only.
    #[error("malformed {kind} row ({row}): {reason}")]
    MalformedRow {
        kind: EntityKind,
        row: RowRef,
        reason: String,
    },

    /// A category deletion deferred because active words still reference it.
    #[error("category {category_id} still referenced by {active_words} active word(s); deletion deferred")]
    ReferentialConflict { category_id: RowId, active_words: u64 },

    /// The sheet layout lacks a column every row needs.
    #[error("{kind} sheet is missing required column '{column}'")]
    MissingColumn { kind: EntityKind, column: String },

    /// The sheet header lists the columns in a different order.
    #[error("{kind} sheet column {position} should be '{expected}', found '{found}'")]
    ColumnMismatch {
        kind: EntityKind,
        position: usize,
        expected: String,
        found: String,
    },
}

impl Error {
    /// Build a malformed-row error.
    pub fn malformed(kind: EntityKind, row: RowRef, reason: impl Into<String>) -> Self {
        Error::MalformedRow {
            kind,
            row,
            reason: reason.into(),
        }
    }

    /// The row this error is attributed to, if it is row-level.
    pub fn row(&self) -> Option<RowRef> {
        match self {
            Error::MalformedRow { row, .. } => Some(*row),
            Error::ReferentialConflict { category_id, .. } => Some(RowRef::Id(*category_id)),
            Error::MissingColumn { .. } | Error::ColumnMismatch { .. } => None,
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

//! Per-run result summary.

use crate::{error::RowRef, EntityKind, Error, Timestamp};
use serde::Serialize;

/// A row-level failure, attributed to the row it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<RowRef>,
    pub message: String,
}

impl From<&Error> for RowError {
    fn from(error: &Error) -> Self {
        Self {
            row: error.row(),
            message: error.to_string(),
        }
    }
}

/// Counts and problems for one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    pub kind: EntityKind,
    /// New sheet rows created in the database
    pub inserted: usize,
    /// Database rows overwritten from the sheet
    pub updated_in_database: usize,
    /// Sheet rows overwritten from the database
    pub updated_in_sheet: usize,
    /// Database rows appended to the sheet
    pub appended_to_sheet: usize,
    /// Rows soft- or hard-deleted in the database
    pub deleted: usize,
    /// Rows left alone because of an error
    pub skipped: usize,
    /// Deferred deletions and other non-fatal notices
    pub warnings: Vec<String>,
    pub errors: Vec<RowError>,
}

impl CollectionSummary {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            inserted: 0,
            updated_in_database: 0,
            updated_in_sheet: 0,
            appended_to_sheet: 0,
            deleted: 0,
            skipped: 0,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Record a row that was skipped because of `error`.
    pub fn skip(&mut self, error: &Error) {
        self.skipped += 1;
        self.errors.push(error.into());
    }

    /// Record a non-fatal notice.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Total writes made to either store.
    pub fn writes(&self) -> usize {
        self.inserted
            + self.updated_in_database
            + self.updated_in_sheet
            + self.appended_to_sheet
            + self.deleted
    }
}

/// Summary of one sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub run_at: Timestamp,
    pub categories: CollectionSummary,
    pub words: CollectionSummary,
}

impl SyncSummary {
    pub fn new(run_at: Timestamp) -> Self {
        Self {
            run_at,
            categories: CollectionSummary::new(EntityKind::Categories),
            words: CollectionSummary::new(EntityKind::Words),
        }
    }

    pub fn collection_mut(&mut self, kind: EntityKind) -> &mut CollectionSummary {
        match kind {
            EntityKind::Categories => &mut self.categories,
            EntityKind::Words => &mut self.words,
        }
    }

    pub fn writes(&self) -> usize {
        self.categories.writes() + self.words.writes()
    }
}

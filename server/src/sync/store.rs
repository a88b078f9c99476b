//! Contracts for the two stores a sync run reads and writes.
//!
//! The pipeline only talks to these traits. PostgreSQL and Google Sheets
//! implement them in `db` and `sheets`; tests use in-memory stores.

use super::SyncError;
use sheetsync_engine::{Category, Entity, EntityKind, RawTable, RowId, Snapshot, Timestamp, Word};
use std::future::Future;

/// One table of the database.
pub trait DatabaseTable<T: Entity>: Send + Sync {
    /// Read every row, tombstones included.
    fn fetch(&self) -> impl Future<Output = Result<Snapshot<T>, SyncError>> + Send;

    /// Insert a new row. The database assigns the id and `updated_at`.
    fn insert(&self, record: &T) -> impl Future<Output = Result<T, SyncError>> + Send;

    /// Write a full row under its own id with `updated_at = at`.
    ///
    /// Creates the row if the id is unknown.
    fn upsert(&self, record: &T, at: Timestamp) -> impl Future<Output = Result<T, SyncError>> + Send;
}

/// The database side of a sync.
pub trait DatabaseStore: DatabaseTable<Category> + DatabaseTable<Word> {
    /// Tombstone a word, keeping its id reserved.
    fn soft_delete_word(
        &self,
        id: RowId,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), SyncError>> + Send;

    fn hard_delete_category(&self, id: RowId) -> impl Future<Output = Result<(), SyncError>> + Send;

    /// Live words referencing a category.
    fn count_active_words(
        &self,
        category_id: RowId,
    ) -> impl Future<Output = Result<u64, SyncError>> + Send;
}

/// The spreadsheet side of a sync. Rows are 1-indexed with a header row.
pub trait SheetStore: Send + Sync {
    /// Read a whole tab, header row included.
    fn fetch_table(&self, kind: EntityKind)
        -> impl Future<Output = Result<RawTable, SyncError>> + Send;

    /// Overwrite one cell. `column` is 1-based.
    fn write_cell(
        &self,
        kind: EntityKind,
        row_number: usize,
        column: usize,
        value: &str,
    ) -> impl Future<Output = Result<(), SyncError>> + Send;

    /// Overwrite a row starting at the first column.
    fn write_row(
        &self,
        kind: EntityKind,
        row_number: usize,
        cells: Vec<String>,
    ) -> impl Future<Output = Result<(), SyncError>> + Send;

    /// Add rows after the last row of the tab.
    fn append_rows(
        &self,
        kind: EntityKind,
        rows: Vec<Vec<String>>,
    ) -> impl Future<Output = Result<(), SyncError>> + Send;
}

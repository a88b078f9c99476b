//! Point-in-time reads of one entity collection from one store.
//!
//! Snapshots are plain values. Every phase of a sync run takes the snapshots
//! it needs and returns new ones, so no phase observes another's cache.

use crate::{Entity, RowId, Timestamp, Word};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Number of sheet rows above the first data row (the header).
pub const HEADER_ROWS: usize = 1;

/// The store a snapshot was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Database,
    Sheet,
}

/// One row of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRow<T> {
    /// 0-based index among the sheet's data rows; `None` for database rows
    pub position: Option<usize>,
    pub record: T,
}

impl<T> SnapshotRow<T> {
    /// 1-indexed sheet row number, counting the header row.
    pub fn row_number(&self) -> Option<usize> {
        self.position.map(|i| i + HEADER_ROWS + 1)
    }
}

/// A point-in-time read of one entity collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot<T> {
    pub origin: Origin,
    pub captured_at: Timestamp,
    pub rows: Vec<SnapshotRow<T>>,
}

impl<T: Entity> Snapshot<T> {
    /// Snapshot of database rows.
    pub fn from_database(captured_at: Timestamp, records: impl IntoIterator<Item = T>) -> Self {
        Self {
            origin: Origin::Database,
            captured_at,
            rows: records
                .into_iter()
                .map(|record| SnapshotRow {
                    position: None,
                    record,
                })
                .collect(),
        }
    }

    /// Snapshot of sheet rows laid out contiguously from the first data row.
    pub fn from_sheet(captured_at: Timestamp, records: impl IntoIterator<Item = T>) -> Self {
        Self {
            origin: Origin::Sheet,
            captured_at,
            rows: records
                .into_iter()
                .enumerate()
                .map(|(i, record)| SnapshotRow {
                    position: Some(i),
                    record,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate over the records.
    pub fn records(&self) -> impl Iterator<Item = &T> {
        self.rows.iter().map(|r| &r.record)
    }

    /// Ids of every row that has one.
    pub fn ids(&self) -> BTreeSet<RowId> {
        self.records().filter_map(Entity::id).collect()
    }

    /// Ids of rows that are not tombstoned.
    pub fn active_ids(&self) -> BTreeSet<RowId> {
        self.records()
            .filter(|r| r.is_active())
            .filter_map(Entity::id)
            .collect()
    }

    /// Find a row by id.
    pub fn get(&self, id: RowId) -> Option<&SnapshotRow<T>> {
        self.rows.iter().find(|r| r.record.id() == Some(id))
    }

    /// Rows not yet created in the database.
    pub fn new_rows(&self) -> impl Iterator<Item = &SnapshotRow<T>> {
        self.rows.iter().filter(|r| r.record.id().is_none())
    }

    /// The snapshot restricted to rows that have an id.
    pub fn without_new_rows(&self) -> Self {
        self.filtered(|r| r.record.id().is_some())
    }

    /// The snapshot minus the given ids.
    pub fn without_ids(&self, ids: &BTreeSet<RowId>) -> Self {
        self.filtered(|r| !matches!(r.record.id(), Some(id) if ids.contains(&id)))
    }

    /// Replace the record at a sheet position.
    pub fn replace_at(&mut self, position: usize, record: T) {
        if let Some(row) = self.rows.iter_mut().find(|r| r.position == Some(position)) {
            row.record = record;
        }
    }

    fn filtered(&self, keep: impl Fn(&SnapshotRow<T>) -> bool) -> Self {
        Self {
            origin: self.origin,
            captured_at: self.captured_at,
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }
}

impl Snapshot<Word> {
    /// Drop tombstones the sheet no longer holds.
    ///
    /// The sheet mirrors a deletion by omission once the row is gone from it,
    /// and by the `deleted` flag while the row is still there.
    pub fn visible_from(&self, sheet_ids: &BTreeSet<RowId>) -> Self {
        self.filtered(|r| {
            !r.record.deleted || r.record.id.is_some_and(|id| sheet_ids.contains(&id))
        })
    }

    /// Number of live words referencing a category.
    pub fn active_references(&self, category_id: RowId) -> u64 {
        self.records()
            .filter(|w| !w.deleted && w.category_id == category_id)
            .count() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Category;
    use chrono::{TimeZone, Utc};

    fn ts(secs: i64) -> Timestamp {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn sheet_row_numbers_skip_header() {
        let snapshot = Snapshot::from_sheet(
            ts(0),
            vec![Category::new("Animals"), Category::new("Plants")],
        );
        let numbers: Vec<_> = snapshot.rows.iter().map(|r| r.row_number()).collect();
        assert_eq!(numbers, vec![Some(2), Some(3)]);
    }

    #[test]
    fn database_rows_have_no_row_number() {
        let snapshot = Snapshot::from_database(ts(0), vec![Category::stored(1, "A", ts(0))]);
        assert_eq!(snapshot.origin, Origin::Database);
        assert_eq!(snapshot.rows[0].row_number(), None);
    }

    #[test]
    fn new_rows_are_split_out() {
        let snapshot = Snapshot::from_sheet(
            ts(0),
            vec![
                Category::stored(1, "Animals", ts(10)),
                Category::new("Plants"),
            ],
        );

        assert_eq!(snapshot.new_rows().count(), 1);
        assert_eq!(snapshot.without_new_rows().len(), 1);
        assert_eq!(snapshot.ids(), BTreeSet::from([1]));
    }

    #[test]
    fn without_ids_keeps_new_rows() {
        let snapshot = Snapshot::from_sheet(
            ts(0),
            vec![
                Category::stored(1, "Animals", ts(10)),
                Category::stored(2, "Plants", ts(10)),
                Category::new("Tools"),
            ],
        );

        let trimmed = snapshot.without_ids(&BTreeSet::from([2]));
        assert_eq!(trimmed.len(), 2);
        assert!(trimmed.get(2).is_none());
        assert_eq!(trimmed.new_rows().count(), 1);
    }

    #[test]
    fn tombstones_hidden_unless_on_sheet() {
        let mut gone = Word::stored(1, 3, "cat", "feline", ts(10));
        gone.mark_deleted(ts(20));
        let mut flagged = Word::stored(2, 3, "dog", "canine", ts(10));
        flagged.mark_deleted(ts(20));
        let live = Word::stored(3, 3, "cow", "bovine", ts(10));

        let snapshot = Snapshot::from_database(ts(30), vec![gone, flagged, live]);
        let visible = snapshot.visible_from(&BTreeSet::from([2, 3]));

        assert_eq!(visible.ids(), BTreeSet::from([2, 3]));
        assert_eq!(visible.active_ids(), BTreeSet::from([3]));
    }

    #[test]
    fn active_references_skip_tombstones() {
        let mut dead = Word::stored(1, 3, "cat", "feline", ts(10));
        dead.mark_deleted(ts(20));
        let snapshot = Snapshot::from_database(
            ts(30),
            vec![
                dead,
                Word::stored(2, 3, "dog", "canine", ts(10)),
                Word::stored(3, 4, "oak", "tree", ts(10)),
            ],
        );

        assert_eq!(snapshot.active_references(3), 1);
        assert_eq!(snapshot.active_references(4), 1);
        assert_eq!(snapshot.active_references(5), 0);
    }
}

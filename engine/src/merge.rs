//! Merge of the final database state back into the sheet.
//!
//! After every database write of a run has landed, the database holds the
//! agreed state for every id it knows. The sheet is brought in line with the
//! fewest writes: rows whose database copy carries a different `updated_at`
//! are rewritten in place, rows the sheet lacks are appended, and everything
//! else is left alone. Rows that tie on `updated_at` are never rewritten,
//! even when their content differs.

use crate::{Entity, RowId, Snapshot};
use std::collections::{BTreeMap, BTreeSet};

/// A sheet row to overwrite in place.
#[derive(Debug, Clone, PartialEq)]
pub struct RowUpdate<T> {
    /// 1-indexed sheet row number
    pub row_number: usize,
    pub record: T,
}

/// Writes that bring a sheet tab in line with the database.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetWritePlan<T> {
    /// Existing rows that differ from the database, in sheet order
    pub updates: Vec<RowUpdate<T>>,
    /// Database rows missing from the sheet, in id order
    pub appends: Vec<T>,
}

impl<T> SheetWritePlan<T> {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.appends.is_empty()
    }
}

/// Plan the sheet writes for one collection.
///
/// `sheet_ids` must hold every id on the sheet, including ids of rows that
/// failed to normalize, so those rows are neither appended twice nor
/// overwritten. Sheet rows without an id, and rows whose id the database
/// does not hold, are left untouched.
pub fn merge_back<T: Entity>(
    sheet: &Snapshot<T>,
    database: &Snapshot<T>,
    sheet_ids: &BTreeSet<RowId>,
) -> SheetWritePlan<T> {
    let by_id: BTreeMap<RowId, &T> = database
        .records()
        .filter_map(|r| r.id().map(|id| (id, r)))
        .collect();

    let updates = sheet
        .rows
        .iter()
        .filter_map(|row| {
            let stored = *by_id.get(&row.record.id()?)?;
            if stored.updated_at() == row.record.updated_at() {
                return None;
            }
            Some(RowUpdate {
                row_number: row.row_number()?,
                record: stored.clone(),
            })
        })
        .collect();

    let appends = by_id
        .iter()
        .filter(|(id, _)| !sheet_ids.contains(id))
        .map(|(_, record)| (*record).clone())
        .collect();

    SheetWritePlan { updates, appends }
}

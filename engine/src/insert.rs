//! Planning for sheet rows that do not exist in the database yet.
//!
//! A new row is inserted into the database first, which assigns its id and
//! creation timestamp. Those two values are then written back into the same
//! sheet row so the row takes part in later resolution with a real id.
//!
//! If the database insert succeeds but the write-back fails, the sheet still
//! shows the row as new and the next run inserts it again. There is no key
//! that ties a sheet row to its database twin before the write-back lands.

use crate::{
    error::{Result, RowRef},
    normalize::render_timestamp,
    Entity, Error, RowId, Snapshot, Word,
};
use std::collections::BTreeSet;

/// A sheet row waiting for its database insert.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingInsert<T> {
    /// 0-based data row index on the sheet
    pub position: usize,
    /// 1-indexed sheet row number
    pub row_number: usize,
    pub record: T,
}

/// One sheet cell to overwrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellWrite {
    pub row_number: usize,
    /// 1-based column index
    pub column: usize,
    pub value: String,
}

impl<T: Entity> PendingInsert<T> {
    /// Cells that carry the database identity back to the sheet.
    ///
    /// Returns nothing if `stored` lacks an id or a timestamp.
    pub fn write_back(&self, stored: &T) -> Vec<CellWrite> {
        match (stored.id(), stored.updated_at()) {
            (Some(id), Some(updated_at)) => vec![
                CellWrite {
                    row_number: self.row_number,
                    column: 1,
                    value: id.to_string(),
                },
                CellWrite {
                    row_number: self.row_number,
                    column: T::KIND.updated_at_column(),
                    value: render_timestamp(updated_at),
                },
            ],
            _ => Vec::new(),
        }
    }

    pub fn row_ref(&self) -> RowRef {
        RowRef::SheetRow(self.row_number)
    }
}

/// New rows of a sheet snapshot, in sheet order.
pub fn plan_inserts<T: Entity>(sheet: &Snapshot<T>) -> Vec<PendingInsert<T>> {
    sheet
        .rows
        .iter()
        .filter(|r| r.record.id().is_none())
        .filter_map(|r| {
            Some(PendingInsert {
                position: r.position?,
                row_number: r.row_number()?,
                record: r.record.clone(),
            })
        })
        .collect()
}

/// Reject a word whose category is unknown to the database.
///
/// Writing it would leave a dangling reference that the category deletion
/// guard cannot see.
pub fn check_category(word: &Word, categories: &BTreeSet<RowId>, row: RowRef) -> Result<()> {
    if categories.contains(&word.category_id) {
        Ok(())
    } else {
        Err(Error::malformed(
            Word::KIND,
            row,
            format!("category {} does not exist", word.category_id),
        ))
    }
}

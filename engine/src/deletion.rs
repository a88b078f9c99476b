//! Detection of rows deleted on the sheet.
//!
//! An id the database holds but the sheet no longer shows was deleted on
//! the sheet. Words are soft-deleted so their id stays reserved. Categories
//! are hard-deleted, but only once no live word references them; otherwise
//! the deletion is deferred to a later run.

use crate::{Category, Error, RowId, Snapshot, Word};
use std::collections::BTreeSet;

/// Live words the sheet no longer holds, in id order.
pub fn plan_word_deletions(database: &Snapshot<Word>, sheet_ids: &BTreeSet<RowId>) -> Vec<RowId> {
    database
        .active_ids()
        .into_iter()
        .filter(|id| !sheet_ids.contains(id))
        .collect()
}

/// Categories the sheet no longer holds, in id order.
pub fn missing_categories(database: &Snapshot<Category>, sheet_ids: &BTreeSet<RowId>) -> Vec<RowId> {
    database
        .ids()
        .into_iter()
        .filter(|id| !sheet_ids.contains(id))
        .collect()
}

/// Outcome of checking sheet-deleted categories against their references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryDeletions {
    /// Orphaned categories, safe to remove
    pub hard_delete: Vec<RowId>,
    /// One [`Error::ReferentialConflict`] per category still in use
    pub deferred: Vec<Error>,
}

impl CategoryDeletions {
    /// Ids of the categories whose deletion was deferred.
    pub fn deferred_ids(&self) -> impl Iterator<Item = RowId> + '_ {
        self.deferred.iter().filter_map(|conflict| match conflict {
            Error::ReferentialConflict { category_id, .. } => Some(*category_id),
            _ => None,
        })
    }
}

/// Categories the sheet no longer holds, split by whether they are orphaned.
///
/// `active_refs` returns the number of live words referencing a category.
pub fn plan_category_deletions(
    database: &Snapshot<Category>,
    sheet_ids: &BTreeSet<RowId>,
    mut active_refs: impl FnMut(RowId) -> u64,
) -> CategoryDeletions {
    let mut plan = CategoryDeletions::default();
    for id in missing_categories(database, sheet_ids) {
        match active_refs(id) {
            0 => plan.hard_delete.push(id),
            active_words => plan.deferred.push(Error::ReferentialConflict {
                category_id: id,
                active_words,
            }),
        }
    }
    plan
}

//! Conflict resolution between a sheet snapshot and a database snapshot.
//!
//! This is the core of convergence. Given two snapshots of the same
//! collection, it decides for every id which side is the source of truth.
//!
//! # Algorithm
//!
//! 1. Drop rows without an id (the inserter owns those)
//! 2. Outer-join both snapshots on id
//! 3. One-sided rows flow to the side that lacks them
//! 4. Two-sided rows: the strictly later `updated_at` wins the whole row
//! 5. Equal timestamps produce no write, even if content differs
//!
//! Resolution is last-writer-wins at row granularity. A losing row is
//! overwritten entirely, including fields only the loser edited.

use crate::{Entity, Origin, RowId, Snapshot};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Decision for one id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    /// The sheet row becomes the database row
    ApplyToDatabase,
    /// The database row becomes the sheet row
    ApplyToSheet,
    /// Both sides already agree
    NoChange,
}

impl Outcome {
    /// The store whose row wins, if any.
    pub fn winner(self) -> Option<Origin> {
        match self {
            Outcome::ApplyToDatabase => Some(Origin::Sheet),
            Outcome::ApplyToSheet => Some(Origin::Database),
            Outcome::NoChange => None,
        }
    }
}

/// Result of resolving one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution<T> {
    /// Sheet rows to write into the database, in id order
    pub to_database: Vec<T>,
    /// Database rows to write into the sheet, in id order
    pub to_sheet: Vec<T>,
    /// Ids both sides agree on
    pub unchanged: Vec<RowId>,
    /// Ids that tie on `updated_at` but differ in content
    ///
    /// Reported only. Someone edited a row without bumping its timestamp.
    pub diverged: Vec<RowId>,
    outcomes: BTreeMap<RowId, Outcome>,
}

impl<T> Resolution<T> {
    fn new() -> Self {
        Self {
            to_database: Vec::new(),
            to_sheet: Vec::new(),
            unchanged: Vec::new(),
            diverged: Vec::new(),
            outcomes: BTreeMap::new(),
        }
    }

    /// Decision for an id, `None` if neither snapshot held it.
    pub fn outcome(&self, id: RowId) -> Option<Outcome> {
        self.outcomes.get(&id).copied()
    }

    /// All decisions in id order.
    pub fn outcomes(&self) -> impl Iterator<Item = (RowId, Outcome)> + '_ {
        self.outcomes.iter().map(|(id, o)| (*id, *o))
    }

    /// Whether resolution produced any write.
    pub fn is_noop(&self) -> bool {
        self.to_database.is_empty() && self.to_sheet.is_empty()
    }
}

/// Resolve a sheet snapshot against a database snapshot.
///
/// Rows without an id are ignored; the caller must insert them first.
pub fn resolve<T: Entity>(sheet: &Snapshot<T>, database: &Snapshot<T>) -> Resolution<T> {
    let mut joined: BTreeMap<RowId, (Option<&T>, Option<&T>)> = BTreeMap::new();
    for record in sheet.records() {
        if let Some(id) = record.id() {
            joined.entry(id).or_default().0 = Some(record);
        }
    }
    for record in database.records() {
        if let Some(id) = record.id() {
            joined.entry(id).or_default().1 = Some(record);
        }
    }

    let mut resolution = Resolution::new();
    for (id, pair) in joined {
        let outcome = match pair {
            (Some(s), None) => {
                resolution.to_database.push(s.clone());
                Outcome::ApplyToDatabase
            }
            (None, Some(d)) => {
                resolution.to_sheet.push(d.clone());
                Outcome::ApplyToSheet
            }
            (Some(s), Some(d)) => match s.updated_at().cmp(&d.updated_at()) {
                Ordering::Greater => {
                    resolution.to_database.push(s.clone());
                    Outcome::ApplyToDatabase
                }
                Ordering::Less => {
                    resolution.to_sheet.push(d.clone());
                    Outcome::ApplyToSheet
                }
                Ordering::Equal => {
                    if !s.same_content(d) {
                        resolution.diverged.push(id);
                    }
                    resolution.unchanged.push(id);
                    Outcome::NoChange
                }
            },
            (None, None) => continue,
        };
        resolution.outcomes.insert(id, outcome);
    }

    resolution
}

//! Entity types shared by both stores.
//!
//! Each entity is a statically typed row. Values are validated once, at the
//! normalizer boundary, so comparisons downstream never touch raw cell text.

use crate::normalize::{render_timestamp, Cells};
use crate::{error::Result, RowId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The entity collections kept in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Categories,
    Words,
}

impl EntityKind {
    /// Database table name, also the canonical sheet tab name.
    pub fn table_name(self) -> &'static str {
        match self {
            EntityKind::Categories => "categories",
            EntityKind::Words => "words",
        }
    }

    /// Column layout shared by the table and the sheet tab.
    ///
    /// The first column is always `id` and the last is always `updated_at`.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            EntityKind::Categories => Category::COLUMNS,
            EntityKind::Words => Word::COLUMNS,
        }
    }

    /// 1-based sheet column holding `updated_at`.
    pub fn updated_at_column(self) -> usize {
        self.columns().len()
    }

    /// Whether a sheet tab title refers to this collection.
    ///
    /// Comparison ignores case and all whitespace, so `" Words "` and
    /// `"WORDS"` both match.
    pub fn matches_tab(self, title: &str) -> bool {
        let squashed: String = title
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        squashed == self.table_name()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// A typed row that can be reconciled between the two stores.
pub trait Entity: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Collection this entity belongs to.
    const KIND: EntityKind;

    /// Database id, `None` for a row not yet created in the database.
    fn id(&self) -> Option<RowId>;

    /// Last modification time, `None` only for new rows.
    fn updated_at(&self) -> Option<Timestamp>;

    /// Copy of this row carrying a database-assigned identity.
    fn with_identity(&self, id: RowId, updated_at: Timestamp) -> Self;

    /// Whether every field other than `id` and `updated_at` matches.
    fn same_content(&self, other: &Self) -> bool;

    /// Parse one sheet row.
    fn from_cells(cells: &Cells<'_>) -> Result<Self>;

    /// Render the row in sheet column order.
    fn to_cells(&self) -> Vec<String>;

    /// Whether the row is live. Only words can be tombstoned.
    fn is_active(&self) -> bool {
        true
    }
}

fn render_id(id: Option<RowId>) -> String {
    id.map(|id| id.to_string()).unwrap_or_default()
}

fn render_updated_at(ts: Option<Timestamp>) -> String {
    ts.map(render_timestamp).unwrap_or_default()
}

/// A word category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Option<RowId>,
    pub name: String,
    pub updated_at: Option<Timestamp>,
}

impl Category {
    pub const COLUMNS: &'static [&'static str] = &["id", "name", "updated_at"];

    /// A category that exists only on the sheet so far.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            updated_at: None,
        }
    }

    /// A category as stored in the database.
    pub fn stored(id: RowId, name: impl Into<String>, updated_at: Timestamp) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
            updated_at: Some(updated_at),
        }
    }
}

impl Entity for Category {
    const KIND: EntityKind = EntityKind::Categories;

    fn id(&self) -> Option<RowId> {
        self.id
    }

    fn updated_at(&self) -> Option<Timestamp> {
        self.updated_at
    }

    fn with_identity(&self, id: RowId, updated_at: Timestamp) -> Self {
        Self {
            id: Some(id),
            updated_at: Some(updated_at),
            ..self.clone()
        }
    }

    fn same_content(&self, other: &Self) -> bool {
        self.name == other.name
    }

    fn from_cells(cells: &Cells<'_>) -> Result<Self> {
        Ok(Self {
            id: cells.id()?,
            name: cells.text("name")?.to_string(),
            updated_at: cells.updated_at()?,
        })
    }

    fn to_cells(&self) -> Vec<String> {
        vec![
            render_id(self.id),
            self.name.clone(),
            render_updated_at(self.updated_at),
        ]
    }
}

/// A word with its clue, belonging to one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub id: Option<RowId>,
    pub category_id: RowId,
    pub word: String,
    pub clue: String,
    pub updated_at: Option<Timestamp>,
    /// Soft delete flag (tombstone)
    pub deleted: bool,
}

impl Word {
    pub const COLUMNS: &'static [&'static str] =
        &["id", "category_id", "word", "clue", "deleted", "updated_at"];

    /// A word that exists only on the sheet so far.
    pub fn new(category_id: RowId, word: impl Into<String>, clue: impl Into<String>) -> Self {
        Self {
            id: None,
            category_id,
            word: word.into(),
            clue: clue.into(),
            updated_at: None,
            deleted: false,
        }
    }

    /// A live word as stored in the database.
    pub fn stored(
        id: RowId,
        category_id: RowId,
        word: impl Into<String>,
        clue: impl Into<String>,
        updated_at: Timestamp,
    ) -> Self {
        Self {
            id: Some(id),
            updated_at: Some(updated_at),
            ..Self::new(category_id, word, clue)
        }
    }

    /// Mark the word deleted (tombstone) at the given time.
    pub fn mark_deleted(&mut self, at: Timestamp) {
        self.deleted = true;
        self.updated_at = Some(at);
    }
}

impl Entity for Word {
    const KIND: EntityKind = EntityKind::Words;

    fn id(&self) -> Option<RowId> {
        self.id
    }

    fn updated_at(&self) -> Option<Timestamp> {
        self.updated_at
    }

    fn with_identity(&self, id: RowId, updated_at: Timestamp) -> Self {
        Self {
            id: Some(id),
            updated_at: Some(updated_at),
            ..self.clone()
        }
    }

    fn same_content(&self, other: &Self) -> bool {
        self.category_id == other.category_id
            && self.word == other.word
            && self.clue == other.clue
            && self.deleted == other.deleted
    }

    fn from_cells(cells: &Cells<'_>) -> Result<Self> {
        Ok(Self {
            id: cells.id()?,
            category_id: cells.integer("category_id")?,
            word: cells.text("word")?.to_string(),
            clue: cells.optional_text("clue").to_string(),
            updated_at: cells.updated_at()?,
            deleted: cells.flag("deleted")?,
        })
    }

    fn to_cells(&self) -> Vec<String> {
        vec![
            render_id(self.id),
            self.category_id.to_string(),
            self.word.clone(),
            self.clue.clone(),
            if self.deleted { "TRUE" } else { "FALSE" }.to_string(),
            render_updated_at(self.updated_at),
        ]
    }

    fn is_active(&self) -> bool {
        !self.deleted
    }
}

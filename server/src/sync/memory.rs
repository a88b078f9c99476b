//! In-memory stores for exercising sync runs without PostgreSQL or Google.

use super::store::{DatabaseStore, DatabaseTable, SheetStore};
use super::SyncError;
use chrono::{SubsecRound, Utc};
use sheetsync_engine::{
    Category, Entity, EntityKind, RawTable, RowId, Snapshot, Timestamp, Word,
};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct DatabaseState {
    categories: BTreeMap<RowId, Category>,
    words: BTreeMap<RowId, Word>,
    next_id: BTreeMap<EntityKind, RowId>,
    now: Timestamp,
    writes: usize,
    offline: bool,
}

/// Database double with serial ids and a settable clock.
#[derive(Debug)]
pub struct MemoryDatabase {
    state: Mutex<DatabaseState>,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self {
            state: Mutex::new(DatabaseState {
                categories: BTreeMap::new(),
                words: BTreeMap::new(),
                next_id: BTreeMap::new(),
                now: Utc::now().trunc_subsecs(6),
                writes: 0,
                offline: false,
            }),
        }
    }
}

impl MemoryDatabase {
    fn state(&self) -> MutexGuard<'_, DatabaseState> {
        self.state.lock().unwrap()
    }

    /// Value `NOW()` returns for inserts.
    pub fn set_now(&self, now: Timestamp) {
        self.state().now = now;
    }

    pub fn seed_category(&self, category: Category) {
        let mut state = self.state();
        let id = category.id.unwrap();
        bump(&mut state.next_id, EntityKind::Categories, id);
        state.categories.insert(id, category);
    }

    pub fn seed_word(&self, word: Word) {
        let mut state = self.state();
        let id = word.id.unwrap();
        bump(&mut state.next_id, EntityKind::Words, id);
        state.words.insert(id, word);
    }

    pub fn categories(&self) -> Vec<Category> {
        self.state().categories.values().cloned().collect()
    }

    pub fn words(&self) -> Vec<Word> {
        self.state().words.values().cloned().collect()
    }

    pub fn word(&self, id: RowId) -> Option<Word> {
        self.state().words.get(&id).cloned()
    }

    pub fn category(&self, id: RowId) -> Option<Category> {
        self.state().categories.get(&id).cloned()
    }

    /// Number of writes made through the store traits.
    pub fn writes(&self) -> usize {
        self.state().writes
    }

    /// Make every call fail, as if the connection were lost.
    pub fn go_offline(&self) {
        self.state().offline = true;
    }

    fn online(&self) -> Result<MutexGuard<'_, DatabaseState>, SyncError> {
        let state = self.state();
        if state.offline {
            Err(SyncError::database("connection refused"))
        } else {
            Ok(state)
        }
    }
}

fn bump(next_id: &mut BTreeMap<EntityKind, RowId>, kind: EntityKind, id: RowId) {
    let next = next_id.entry(kind).or_insert(1);
    *next = (*next).max(id + 1);
}

fn take_id(next_id: &mut BTreeMap<EntityKind, RowId>, kind: EntityKind) -> RowId {
    let next = next_id.entry(kind).or_insert(1);
    let id = *next;
    *next += 1;
    id
}

macro_rules! memory_table {
    ($entity:ty, $field:ident) => {
        impl DatabaseTable<$entity> for MemoryDatabase {
            async fn fetch(&self) -> Result<Snapshot<$entity>, SyncError> {
                let state = self.online()?;
                Ok(Snapshot::from_database(
                    state.now,
                    state.$field.values().cloned(),
                ))
            }

            async fn insert(&self, record: &$entity) -> Result<$entity, SyncError> {
                let mut state = self.online()?;
                let id = take_id(&mut state.next_id, <$entity>::KIND);
                let stored = record.with_identity(id, state.now);
                state.$field.insert(id, stored.clone());
                state.writes += 1;
                Ok(stored)
            }

            async fn upsert(&self, record: &$entity, at: Timestamp) -> Result<$entity, SyncError> {
                let mut state = self.online()?;
                let id = record.id().unwrap();
                bump(&mut state.next_id, <$entity>::KIND, id);
                let stored = record.with_identity(id, at);
                state.$field.insert(id, stored.clone());
                state.writes += 1;
                Ok(stored)
            }
        }
    };
}

memory_table!(Category, categories);
memory_table!(Word, words);

impl DatabaseStore for MemoryDatabase {
    async fn soft_delete_word(&self, id: RowId, at: Timestamp) -> Result<(), SyncError> {
        let mut state = self.online()?;
        if let Some(word) = state.words.get_mut(&id) {
            word.mark_deleted(at);
        }
        state.writes += 1;
        Ok(())
    }

    async fn hard_delete_category(&self, id: RowId) -> Result<(), SyncError> {
        let mut state = self.online()?;
        state.categories.remove(&id);
        state.writes += 1;
        Ok(())
    }

    async fn count_active_words(&self, category_id: RowId) -> Result<u64, SyncError> {
        let state = self.online()?;
        Ok(state
            .words
            .values()
            .filter(|w| !w.deleted && w.category_id == category_id)
            .count() as u64)
    }
}

#[derive(Debug, Default)]
struct SheetState {
    /// Tab contents, header row first
    tabs: BTreeMap<EntityKind, Vec<Vec<String>>>,
    writes: usize,
    offline: bool,
    /// Writes left before every further write fails
    write_budget: Option<usize>,
}

/// Spreadsheet double. Row numbers are 1-indexed, row 1 is the header.
#[derive(Debug, Default)]
pub struct MemorySheet {
    state: Mutex<SheetState>,
}

impl MemorySheet {
    /// A sheet with an empty tab per collection.
    pub fn with_tabs() -> Self {
        let sheet = Self::default();
        for kind in [EntityKind::Categories, EntityKind::Words] {
            sheet.set_header(kind, kind.columns());
        }
        sheet
    }

    fn state(&self) -> MutexGuard<'_, SheetState> {
        self.state.lock().unwrap()
    }

    pub fn set_header(&self, kind: EntityKind, header: &[&str]) {
        let header = header.iter().map(|c| c.to_string()).collect();
        self.state().tabs.insert(kind, vec![header]);
    }

    pub fn push_row(&self, kind: EntityKind, cells: &[&str]) {
        let row = cells.iter().map(|c| c.to_string()).collect();
        self.state().tabs.entry(kind).or_default().push(row);
    }

    pub fn push_record<T: Entity>(&self, record: &T) {
        self.state()
            .tabs
            .entry(T::KIND)
            .or_default()
            .push(record.to_cells());
    }

    /// Delete a data row, shifting the rows below it up.
    pub fn remove_row(&self, kind: EntityKind, row_number: usize) {
        if let Some(tab) = self.state().tabs.get_mut(&kind) {
            tab.remove(row_number - 1);
        }
    }

    /// Data rows of a tab, header excluded.
    pub fn rows(&self, kind: EntityKind) -> Vec<Vec<String>> {
        self.state()
            .tabs
            .get(&kind)
            .map(|tab| tab.iter().skip(1).cloned().collect())
            .unwrap_or_default()
    }

    pub fn cell(&self, kind: EntityKind, row_number: usize, column: usize) -> String {
        self.state()
            .tabs
            .get(&kind)
            .and_then(|tab| tab.get(row_number - 1))
            .and_then(|row| row.get(column - 1))
            .cloned()
            .unwrap_or_default()
    }

    /// Number of write calls made through the store trait.
    pub fn writes(&self) -> usize {
        self.state().writes
    }

    pub fn go_offline(&self) {
        self.state().offline = true;
    }

    /// Accept `writes` more writes, then fail every write while reads
    /// keep working.
    pub fn fail_writes_after(&self, writes: usize) {
        self.state().write_budget = Some(writes);
    }

    /// Undo [`go_offline`](Self::go_offline) and
    /// [`fail_writes_after`](Self::fail_writes_after).
    pub fn restore(&self) {
        let mut state = self.state();
        state.offline = false;
        state.write_budget = None;
    }

    fn spend_write(state: &mut SheetState) -> Result<(), SyncError> {
        match &mut state.write_budget {
            Some(0) => Err(SyncError::sheet("write rejected")),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn tab(
        state: &mut SheetState,
        kind: EntityKind,
    ) -> Result<&mut Vec<Vec<String>>, SyncError> {
        if state.offline {
            return Err(SyncError::sheet("quota exceeded"));
        }
        state.tabs.get_mut(&kind).ok_or(SyncError::TabNotFound(kind))
    }
}

fn row_at(tab: &mut Vec<Vec<String>>, row_number: usize) -> &mut Vec<String> {
    if tab.len() < row_number {
        tab.resize(row_number, Vec::new());
    }
    &mut tab[row_number - 1]
}

impl SheetStore for MemorySheet {
    async fn fetch_table(&self, kind: EntityKind) -> Result<RawTable, SyncError> {
        let mut state = self.state();
        let tab = Self::tab(&mut state, kind)?;
        let mut rows = tab.iter().cloned();
        let header = rows.next().unwrap_or_default();
        Ok(RawTable::new(header, rows.collect()))
    }

    async fn write_cell(
        &self,
        kind: EntityKind,
        row_number: usize,
        column: usize,
        value: &str,
    ) -> Result<(), SyncError> {
        let mut state = self.state();
        Self::spend_write(&mut state)?;
        let row = row_at(Self::tab(&mut state, kind)?, row_number);
        if row.len() < column {
            row.resize(column, String::new());
        }
        row[column - 1] = value.to_string();
        state.writes += 1;
        Ok(())
    }

    async fn write_row(
        &self,
        kind: EntityKind,
        row_number: usize,
        cells: Vec<String>,
    ) -> Result<(), SyncError> {
        let mut state = self.state();
        Self::spend_write(&mut state)?;
        let row = row_at(Self::tab(&mut state, kind)?, row_number);
        if row.len() < cells.len() {
            row.resize(cells.len(), String::new());
        }
        for (i, value) in cells.into_iter().enumerate() {
            row[i] = value;
        }
        state.writes += 1;
        Ok(())
    }

    async fn append_rows(&self, kind: EntityKind, rows: Vec<Vec<String>>) -> Result<(), SyncError> {
        let mut state = self.state();
        Self::spend_write(&mut state)?;
        Self::tab(&mut state, kind)?.extend(rows);
        state.writes += 1;
        Ok(())
    }
}

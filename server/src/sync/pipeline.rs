//! One sync run, as a sequence of phases.
//!
//! `FETCH → INSERT_NEW → RESOLVE → APPLY → PROPAGATE_DELETIONS → MERGE_BACK →
//! WRITE_SHEET`. Every phase takes the snapshots it needs as arguments and
//! returns the snapshots later phases must see. A phase that writes to the
//! database re-reads the affected table before handing it on.
//!
//! Categories are inserted, resolved and applied before words are touched,
//! so a word can rely on any category the run creates. Deletions run the
//! other way round so the orphan check for a category sees this run's word
//! deletions.

use super::store::{DatabaseStore, DatabaseTable, SheetStore};
use super::SyncError;
use sheetsync_engine::{
    check_category, merge_back, missing_categories, normalize_table, plan_category_deletions,
    plan_inserts, plan_word_deletions, resolve, Category, Entity, Resolution, RowId, RowRef,
    SheetWritePlan, Snapshot, SyncSummary, Timestamp, Word,
};
use std::collections::{BTreeMap, BTreeSet};

type Check<'c, T> = &'c (dyn Fn(&T, RowRef) -> sheetsync_engine::error::Result<()> + Send + Sync);

/// The sheet side of one collection during a run.
struct SheetSide<T> {
    snapshot: Snapshot<T>,
    /// Every id on the sheet, rejected rows included
    seen: BTreeSet<RowId>,
    /// Ids of rows that failed to normalize
    rejected: BTreeSet<RowId>,
    /// Ids whose sheet row must be left as the user wrote it
    held: BTreeSet<RowId>,
    /// Ids deleted on the sheet whose deletion could not happen yet
    deferred: BTreeSet<RowId>,
}

impl<T: Entity> SheetSide<T> {
    /// Rows that may be compared against the database.
    fn comparable(&self) -> Snapshot<T> {
        self.snapshot.without_ids(&self.rejected)
    }

    /// Rows merge-back may overwrite.
    fn writable(&self) -> Snapshot<T> {
        self.snapshot.without_ids(&self.held)
    }

    /// Ids merge-back must not append: rows already on the sheet and rows
    /// the user removed whose deletion is still pending.
    fn not_appendable(&self) -> BTreeSet<RowId> {
        self.seen.union(&self.deferred).copied().collect()
    }
}

/// A single sync run over one database and one spreadsheet.
pub struct Pipeline<'a, D, S> {
    database: &'a D,
    sheet: &'a S,
    run_at: Timestamp,
    summary: SyncSummary,
}

impl<'a, D: DatabaseStore, S: SheetStore> Pipeline<'a, D, S> {
    /// `run_at` stamps every `updated_at` this run writes.
    pub fn new(database: &'a D, sheet: &'a S, run_at: Timestamp) -> Self {
        Self {
            database,
            sheet,
            run_at,
            summary: SyncSummary::new(run_at),
        }
    }

    /// Drive the run to completion.
    ///
    /// Returns the summary on success, including rows that were skipped.
    /// Fails only when a store cannot be reached or a tab cannot be read
    /// safely; writes made before the failure stay in place.
    pub async fn run(mut self) -> Result<SyncSummary, SyncError> {
        tracing::info!(run_at = %self.run_at, "sync: fetch");
        let mut categories = self.fetch_sheet::<Category>().await?;
        let mut words = self.fetch_sheet::<Word>().await?;
        let db_categories = <D as DatabaseTable<Category>>::fetch(self.database).await?;
        let db_words = <D as DatabaseTable<Word>>::fetch(self.database).await?;

        // Categories settle first, so words see every category this run
        // creates, including sheet rows carrying an id the database lacks.
        tracing::info!(kind = "categories", "sync: insert new rows");
        let db_categories = self
            .insert_new(&mut categories, db_categories, &|_, _| Ok(()))
            .await?;
        tracing::info!(kind = "categories", "sync: resolve");
        let resolution = self.resolve(&categories, &db_categories);
        tracing::info!(kind = "categories", "sync: apply");
        let db_categories = self
            .apply(&mut categories, resolution, db_categories, &|_, _| Ok(()))
            .await?;

        let known = db_categories.ids();
        let check_word: Check<'_, Word> = &|word, row| check_category(word, &known, row);
        tracing::info!(kind = "words", "sync: insert new rows");
        let db_words = self.insert_new(&mut words, db_words, check_word).await?;
        tracing::info!(kind = "words", "sync: resolve");
        let resolution = self.resolve(&words, &db_words.visible_from(&words.seen));
        tracing::info!(kind = "words", "sync: apply");
        let db_words = self
            .apply(&mut words, resolution, db_words, check_word)
            .await?;

        tracing::info!("sync: propagate deletions");
        let db_words = self.delete_words(&words, db_words).await?;
        let db_categories = self.delete_categories(&mut categories, db_categories).await?;

        tracing::info!("sync: merge back");
        let category_plan = merge_back(
            &categories.writable(),
            &db_categories,
            &categories.not_appendable(),
        );
        let word_plan = merge_back(
            &words.writable(),
            &db_words.visible_from(&words.seen),
            &words.not_appendable(),
        );

        tracing::info!("sync: write sheet");
        self.write_sheet(category_plan).await?;
        self.write_sheet(word_plan).await?;

        tracing::info!(
            writes = self.summary.writes(),
            skipped = self.summary.categories.skipped + self.summary.words.skipped,
            "sync: done"
        );
        Ok(self.summary)
    }

    async fn fetch_sheet<T: Entity>(&mut self) -> Result<SheetSide<T>, SyncError> {
        let raw = self.sheet.fetch_table(T::KIND).await?;
        let normalized = normalize_table::<T>(&raw, self.run_at)?;

        let collection = self.summary.collection_mut(T::KIND);
        for rejected in &normalized.rejected {
            tracing::warn!(
                kind = %T::KIND,
                row = rejected.row_number,
                "Rejected sheet row: {}",
                rejected.error
            );
            collection.skip(&rejected.error);
        }
        tracing::debug!(
            kind = %T::KIND,
            rows = normalized.snapshot.len(),
            rejected = normalized.rejected.len(),
            "Sheet tab read"
        );

        let rejected = normalized.rejected_ids();
        Ok(SheetSide {
            seen: normalized.seen_ids(),
            held: rejected.clone(),
            rejected,
            deferred: BTreeSet::new(),
            snapshot: normalized.snapshot,
        })
    }

    /// Create sheet-only rows in the database and write their ids back.
    async fn insert_new<T: Entity>(
        &mut self,
        side: &mut SheetSide<T>,
        database: Snapshot<T>,
        check: Check<'_, T>,
    ) -> Result<Snapshot<T>, SyncError>
    where
        D: DatabaseTable<T>,
    {
        let pending = plan_inserts(&side.snapshot);
        if pending.is_empty() {
            return Ok(database);
        }

        for insert in pending {
            if let Err(error) = check(&insert.record, insert.row_ref()) {
                tracing::warn!(kind = %T::KIND, "Skipping new row: {}", error);
                self.summary.collection_mut(T::KIND).skip(&error);
                continue;
            }

            let stored = <D as DatabaseTable<T>>::insert(self.database, &insert.record).await?;
            self.summary.collection_mut(T::KIND).inserted += 1;

            // A failure here leaves the row in the database but still new on
            // the sheet; the next run inserts it again.
            for cell in insert.write_back(&stored) {
                self.sheet
                    .write_cell(T::KIND, cell.row_number, cell.column, &cell.value)
                    .await?;
            }
            tracing::debug!(
                kind = %T::KIND,
                row = insert.row_number,
                id = ?stored.id(),
                "Inserted new row"
            );

            if let Some(id) = stored.id() {
                side.seen.insert(id);
            }
            side.snapshot.replace_at(insert.position, stored);
        }

        <D as DatabaseTable<T>>::fetch(self.database).await
    }

    fn resolve<T: Entity>(&mut self, side: &SheetSide<T>, database: &Snapshot<T>) -> Resolution<T> {
        let resolution = resolve(&side.comparable(), &database.without_ids(&side.rejected));

        let collection = self.summary.collection_mut(T::KIND);
        for id in &resolution.diverged {
            tracing::warn!(kind = %T::KIND, id, "Rows differ but share updated_at; left as is");
            collection.warn(format!(
                "{} {} differs between stores with the same updated_at",
                T::KIND,
                id
            ));
        }
        tracing::debug!(
            kind = %T::KIND,
            to_database = resolution.to_database.len(),
            to_sheet = resolution.to_sheet.len(),
            unchanged = resolution.unchanged.len(),
            "Resolved"
        );
        resolution
    }

    /// Write sheet winners into the database.
    ///
    /// Database winners are not written here; merge-back carries them to
    /// the sheet together with the rows this phase bumps.
    async fn apply<T: Entity>(
        &mut self,
        side: &mut SheetSide<T>,
        resolution: Resolution<T>,
        database: Snapshot<T>,
        check: Check<'_, T>,
    ) -> Result<Snapshot<T>, SyncError>
    where
        D: DatabaseTable<T>,
    {
        if resolution.to_database.is_empty() {
            return Ok(database);
        }

        for record in resolution.to_database {
            let Some(id) = record.id() else { continue };
            if let Err(error) = check(&record, RowRef::Id(id)) {
                tracing::warn!(kind = %T::KIND, id, "Skipping sheet edit: {}", error);
                self.summary.collection_mut(T::KIND).skip(&error);
                side.held.insert(id);
                continue;
            }

            <D as DatabaseTable<T>>::upsert(self.database, &record, self.run_at).await?;

            let collection = self.summary.collection_mut(T::KIND);
            if database.get(id).is_some() {
                collection.updated_in_database += 1;
                tracing::debug!(kind = %T::KIND, id, "Database row updated from sheet");
            } else {
                collection.inserted += 1;
                tracing::debug!(kind = %T::KIND, id, "Database row created from sheet");
            }
        }

        <D as DatabaseTable<T>>::fetch(self.database).await
    }

    async fn delete_words(
        &mut self,
        side: &SheetSide<Word>,
        database: Snapshot<Word>,
    ) -> Result<Snapshot<Word>, SyncError> {
        let doomed = plan_word_deletions(&database, &side.seen);
        if doomed.is_empty() {
            return Ok(database);
        }

        for id in doomed {
            self.database.soft_delete_word(id, self.run_at).await?;
            self.summary.words.deleted += 1;
            tracing::debug!(id, "Word soft-deleted");
        }

        <D as DatabaseTable<Word>>::fetch(self.database).await
    }

    /// Hard-delete orphaned categories the sheet dropped.
    ///
    /// A category still referenced by live words stays in the database and
    /// off the sheet; a later run deletes it once its words are gone.
    async fn delete_categories(
        &mut self,
        side: &mut SheetSide<Category>,
        database: Snapshot<Category>,
    ) -> Result<Snapshot<Category>, SyncError> {
        let missing = missing_categories(&database, &side.seen);
        if missing.is_empty() {
            return Ok(database);
        }

        let mut references = BTreeMap::new();
        for id in missing {
            references.insert(id, self.database.count_active_words(id).await?);
        }
        let plan = plan_category_deletions(&database, &side.seen, |id| {
            references.get(&id).copied().unwrap_or_default()
        });

        side.deferred.extend(plan.deferred_ids());
        for conflict in &plan.deferred {
            tracing::warn!("{}", conflict);
            self.summary.categories.warn(conflict.to_string());
        }
        for &id in &plan.hard_delete {
            self.database.hard_delete_category(id).await?;
            self.summary.categories.deleted += 1;
            tracing::debug!(id, "Orphaned category deleted");
        }

        if plan.hard_delete.is_empty() {
            Ok(database)
        } else {
            <D as DatabaseTable<Category>>::fetch(self.database).await
        }
    }

    async fn write_sheet<T: Entity>(&mut self, plan: SheetWritePlan<T>) -> Result<(), SyncError> {
        if plan.is_empty() {
            tracing::debug!(kind = %T::KIND, "Sheet already up to date");
            return Ok(());
        }

        for update in plan.updates {
            self.sheet
                .write_row(T::KIND, update.row_number, update.record.to_cells())
                .await?;
            self.summary.collection_mut(T::KIND).updated_in_sheet += 1;
        }

        if !plan.appends.is_empty() {
            let rows: Vec<_> = plan.appends.iter().map(Entity::to_cells).collect();
            let count = rows.len();
            self.sheet.append_rows(T::KIND, rows).await?;
            self.summary.collection_mut(T::KIND).appended_to_sheet += count;
        }

        Ok(())
    }
}

//! Database module for PostgreSQL persistence.

mod categories;
mod pool;
mod words;

pub use categories::*;
pub use pool::*;
pub use words::*;

use crate::sync::{DatabaseStore, DatabaseTable, SyncError};
use chrono::Utc;
use sheetsync_engine::{Category, Entity, RowId, Snapshot, Timestamp, Word};

/// Move a table's id sequence past `id` so later inserts never reuse it.
///
/// The sequence only moves forward. Ids freed by a hard delete stay used up.
async fn advance_sequence(
    conn: &mut sqlx::PgConnection,
    table: &str,
    id: RowId,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        SELECT setval(seq, $2)
        FROM (SELECT pg_get_serial_sequence($1, 'id')::regclass AS seq) AS serial
        WHERE $2 > COALESCE(pg_sequence_last_value(seq), 0)
        "#,
    )
    .bind(table)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(())
}

/// The database side of a sync, backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct Database {
    pool: Pool,
}

impl Database {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

impl DatabaseTable<Category> for Database {
    async fn fetch(&self) -> Result<Snapshot<Category>, SyncError> {
        let rows = get_categories(&self.pool).await?;
        Ok(Snapshot::from_database(
            Utc::now(),
            rows.into_iter().map(Category::from),
        ))
    }

    async fn insert(&self, record: &Category) -> Result<Category, SyncError> {
        Ok(insert_category(&self.pool, record).await?.into())
    }

    async fn upsert(&self, record: &Category, at: Timestamp) -> Result<Category, SyncError> {
        match record.id() {
            Some(id) => Ok(upsert_category(&self.pool, id, record, at).await?.into()),
            None => <Self as DatabaseTable<_>>::insert(self, record).await,
        }
    }
}

impl DatabaseTable<Word> for Database {
    async fn fetch(&self) -> Result<Snapshot<Word>, SyncError> {
        let rows = get_words(&self.pool).await?;
        Ok(Snapshot::from_database(
            Utc::now(),
            rows.into_iter().map(Word::from),
        ))
    }

    async fn insert(&self, record: &Word) -> Result<Word, SyncError> {
        Ok(insert_word(&self.pool, record).await?.into())
    }

    async fn upsert(&self, record: &Word, at: Timestamp) -> Result<Word, SyncError> {
        match record.id() {
            Some(id) => Ok(upsert_word(&self.pool, id, record, at).await?.into()),
            None => <Self as DatabaseTable<_>>::insert(self, record).await,
        }
    }
}

impl DatabaseStore for Database {
    async fn soft_delete_word(&self, id: RowId, at: Timestamp) -> Result<(), SyncError> {
        Ok(soft_delete_word(&self.pool, id, at).await?)
    }

    async fn hard_delete_category(&self, id: RowId) -> Result<(), SyncError> {
        Ok(delete_category(&self.pool, id).await?)
    }

    async fn count_active_words(&self, category_id: RowId) -> Result<u64, SyncError> {
        let count = count_active_words(&self.pool, category_id).await?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn scratch_database() -> Pool {
        let url = std::env::var("DATABASE_URL").unwrap();
        let pool = create_pool(&url, 1).await.unwrap();
        run_migrations(&pool).await.unwrap();
        sqlx::query("TRUNCATE categories, words RESTART IDENTITY")
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    #[tokio::test]
    #[ignore = "empties the tables of the PostgreSQL database in DATABASE_URL"]
    async fn upsert_never_rewinds_id_sequence() {
        let pool = scratch_database().await;
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        upsert_category(&pool, 10, &Category::new("Tools"), at).await.unwrap();
        delete_category(&pool, 10).await.unwrap();
        upsert_category(&pool, 3, &Category::new("Animals"), at).await.unwrap();

        let database = Database::new(pool);
        let food = <Database as DatabaseTable<Category>>::insert(&database, &Category::new("Food"))
            .await
            .unwrap();
        assert_eq!(food.id(), Some(11));
    }

    #[tokio::test]
    #[ignore = "empties the tables of the PostgreSQL database in DATABASE_URL"]
    async fn upsert_past_sequence_moves_it_forward() {
        let pool = scratch_database().await;
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        upsert_word(&pool, 40, &Word::new(1, "axe", "chops"), at).await.unwrap();

        let database = Database::new(pool);
        let saw = <Database as DatabaseTable<Word>>::insert(&database, &Word::new(1, "saw", "cuts"))
            .await
            .unwrap();
        assert_eq!(saw.id(), Some(41));
    }
}

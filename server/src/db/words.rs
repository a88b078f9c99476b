//! Queries for the words table.

use sheetsync_engine::{RowId, Timestamp, Word};
use sqlx::{PgPool, Row};

/// A stored word row from the database.
#[derive(Debug)]
pub struct StoredWord {
    pub id: i64,
    pub category_id: i64,
    pub word: String,
    pub clue: Option<String>,
    pub deleted: bool,
    pub updated_at: Timestamp,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredWord {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredWord {
            id: row.try_get("id")?,
            category_id: row.try_get("category_id")?,
            word: row.try_get("word")?,
            clue: row.try_get("clue")?,
            deleted: row.try_get("deleted")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<StoredWord> for Word {
    fn from(row: StoredWord) -> Self {
        Word {
            id: Some(row.id),
            category_id: row.category_id,
            word: row.word,
            clue: row.clue.unwrap_or_default(),
            updated_at: Some(row.updated_at),
            deleted: row.deleted,
        }
    }
}

/// Get all words, tombstones included.
pub async fn get_words(pool: &PgPool) -> Result<Vec<StoredWord>, sqlx::Error> {
    sqlx::query_as::<_, StoredWord>(
        r#"
        SELECT id, category_id, word, clue, deleted, updated_at
        FROM words
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Insert a new word, letting the database pick id and timestamp.
pub async fn insert_word(pool: &PgPool, word: &Word) -> Result<StoredWord, sqlx::Error> {
    sqlx::query_as::<_, StoredWord>(
        r#"
        INSERT INTO words (category_id, word, clue, deleted, updated_at)
        VALUES ($1, $2, $3, $4, NOW())
        RETURNING id, category_id, word, clue, deleted, updated_at
        "#,
    )
    .bind(word.category_id)
    .bind(&word.word)
    .bind(&word.clue)
    .bind(word.deleted)
    .fetch_one(pool)
    .await
}

/// Write a word under an explicit id, moving the serial sequence past it.
pub async fn upsert_word(
    pool: &PgPool,
    id: RowId,
    word: &Word,
    at: Timestamp,
) -> Result<StoredWord, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let stored = sqlx::query_as::<_, StoredWord>(
        r#"
        INSERT INTO words (id, category_id, word, clue, deleted, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (id) DO UPDATE SET
            category_id = EXCLUDED.category_id,
            word = EXCLUDED.word,
            clue = EXCLUDED.clue,
            deleted = EXCLUDED.deleted,
            updated_at = EXCLUDED.updated_at
        RETURNING id, category_id, word, clue, deleted, updated_at
        "#,
    )
    .bind(id)
    .bind(word.category_id)
    .bind(&word.word)
    .bind(&word.clue)
    .bind(word.deleted)
    .bind(at)
    .fetch_one(&mut *tx)
    .await?;

    super::advance_sequence(&mut tx, "words", id).await?;

    tx.commit().await?;
    Ok(stored)
}

/// Mark a word deleted. The row and its id stay.
pub async fn soft_delete_word(pool: &PgPool, id: RowId, at: Timestamp) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE words
        SET deleted = TRUE, updated_at = $2
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Count live words in a category.
pub async fn count_active_words(pool: &PgPool, category_id: RowId) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM words
        WHERE category_id = $1 AND deleted = FALSE
        "#,
    )
    .bind(category_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

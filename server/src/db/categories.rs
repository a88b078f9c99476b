//! Queries for the categories table.

use sheetsync_engine::{Category, RowId, Timestamp};
use sqlx::{PgPool, Row};

/// A stored category row from the database.
#[derive(Debug)]
pub struct StoredCategory {
    pub id: i64,
    pub name: String,
    pub updated_at: Timestamp,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredCategory {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredCategory {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<StoredCategory> for Category {
    fn from(row: StoredCategory) -> Self {
        Category::stored(row.id, row.name, row.updated_at)
    }
}

/// Get all categories.
pub async fn get_categories(pool: &PgPool) -> Result<Vec<StoredCategory>, sqlx::Error> {
    sqlx::query_as::<_, StoredCategory>(
        r#"
        SELECT id, name, updated_at
        FROM categories
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Insert a new category, letting the database pick id and timestamp.
pub async fn insert_category(pool: &PgPool, category: &Category) -> Result<StoredCategory, sqlx::Error> {
    sqlx::query_as::<_, StoredCategory>(
        r#"
        INSERT INTO categories (name, updated_at)
        VALUES ($1, NOW())
        RETURNING id, name, updated_at
        "#,
    )
    .bind(&category.name)
    .fetch_one(pool)
    .await
}

/// Write a category under an explicit id.
///
/// The serial sequence is moved past the id so later inserts cannot
/// collide with it.
pub async fn upsert_category(
    pool: &PgPool,
    id: RowId,
    category: &Category,
    at: Timestamp,
) -> Result<StoredCategory, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let stored = sqlx::query_as::<_, StoredCategory>(
        r#"
        INSERT INTO categories (id, name, updated_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO UPDATE SET
            name = EXCLUDED.name,
            updated_at = EXCLUDED.updated_at
        RETURNING id, name, updated_at
        "#,
    )
    .bind(id)
    .bind(&category.name)
    .bind(at)
    .fetch_one(&mut *tx)
    .await?;

    super::advance_sequence(&mut tx, "categories", id).await?;

    tx.commit().await?;
    Ok(stored)
}

/// Remove a category row.
pub async fn delete_category(pool: &PgPool, id: RowId) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

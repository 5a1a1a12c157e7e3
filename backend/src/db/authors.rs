//! Authors repository
//!
//! Authors are created implicitly by [AuthorRepository::find_or_create] the first
//! time a book names them. `book_count` is never stored; it is counted from the
//! books table on every read.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool as Pool;

use super::sqlite_helpers::{new_id, now_iso8601};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuthorRecord {
    pub id: String,
    pub name: String,
    pub born: Option<i32>,
}

/// An author joined with the number of books referencing it
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuthorWithBookCount {
    pub id: String,
    pub name: String,
    pub born: Option<i32>,
    pub book_count: i64,
}

/// Result of [AuthorRepository::find_or_create]
#[derive(Debug, Clone)]
pub struct FoundOrCreated {
    pub author: AuthorRecord,
    pub created: bool,
}

pub struct AuthorRepository {
    pool: Pool,
}

impl AuthorRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Look up an author by exact name, inserting one with `born` unset if absent.
    ///
    /// The insert is conflict-tolerant on the UNIQUE name column, so concurrent
    /// callers with the same new name all end up with the same row.
    pub async fn find_or_create(&self, name: &str) -> Result<FoundOrCreated> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO authors (id, name, born, created_at)
            VALUES (?, ?, NULL, ?)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(new_id())
        .bind(name)
        .bind(now_iso8601())
        .execute(&self.pool)
        .await?;

        let author = self
            .get_by_name(name)
            .await?
            .ok_or_else(|| anyhow!("Author '{}' missing after find-or-create", name))?;

        Ok(FoundOrCreated {
            author,
            created: inserted.rows_affected() == 1,
        })
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<AuthorRecord>> {
        let record =
            sqlx::query_as::<_, AuthorRecord>("SELECT id, name, born FROM authors WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(record)
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<AuthorRecord>> {
        let record =
            sqlx::query_as::<_, AuthorRecord>("SELECT id, name, born FROM authors WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(record)
    }

    /// Overwrite the birth year of an author, returning the updated record
    pub async fn update_born(&self, id: &str, born: i32) -> Result<Option<AuthorRecord>> {
        let result = sqlx::query("UPDATE authors SET born = ? WHERE id = ?")
            .bind(born)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM authors")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Number of books referencing an author
    pub async fn book_count(&self, id: &str) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM books WHERE author_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// All authors in insertion order, each with its current book count
    pub async fn list_with_book_counts(&self) -> Result<Vec<AuthorWithBookCount>> {
        let records = sqlx::query_as::<_, AuthorWithBookCount>(
            r#"
            SELECT a.id, a.name, a.born, COUNT(b.id) AS book_count
            FROM authors a
            LEFT JOIN books b ON b.author_id = a.id
            GROUP BY a.id
            ORDER BY a.rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}

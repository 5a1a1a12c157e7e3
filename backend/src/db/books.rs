//! Books repository
//!
//! Books always come back joined with their author so callers never see a bare
//! author identifier.

use anyhow::Result;
use sqlx::{QueryBuilder, Sqlite, SqlitePool as Pool};

use super::authors::AuthorRecord;
use super::sqlite_helpers::{json_to_vec, new_id, now_iso8601, vec_to_json};

/// A book with its author resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRecord {
    pub id: String,
    pub title: String,
    pub published: i32,
    pub genres: Vec<String>,
    pub author: AuthorRecord,
}

#[derive(Debug, Clone)]
pub struct CreateBook {
    pub title: String,
    pub published: i32,
    pub author_id: String,
    pub genres: Vec<String>,
}

/// Filter for [BookRepository::list]; all set fields must match
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    pub author_id: Option<String>,
    pub genre: Option<String>,
}

#[derive(sqlx::FromRow)]
struct BookRow {
    id: String,
    title: String,
    published: i32,
    genres: String,
    author_id: String,
    author_name: String,
    author_born: Option<i32>,
}

impl From<BookRow> for BookRecord {
    fn from(row: BookRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            published: row.published,
            genres: json_to_vec(&row.genres),
            author: AuthorRecord {
                id: row.author_id,
                name: row.author_name,
                born: row.author_born,
            },
        }
    }
}

const SELECT_BOOKS: &str = r#"
    SELECT b.id, b.title, b.published, b.genres,
           a.id AS author_id, a.name AS author_name, a.born AS author_born
    FROM books b
    JOIN authors a ON a.id = b.author_id
"#;

pub struct BookRepository {
    pool: Pool,
}

impl BookRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Insert a book and return it with the author resolved
    pub async fn create(&self, book: CreateBook) -> Result<BookRecord> {
        let id = new_id();

        sqlx::query(
            r#"
            INSERT INTO books (id, title, published, author_id, genres, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&book.title)
        .bind(book.published)
        .bind(&book.author_id)
        .bind(vec_to_json(&book.genres))
        .bind(now_iso8601())
        .execute(&self.pool)
        .await?;

        self.get_by_id(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to create book"))
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<BookRecord>> {
        let row = sqlx::query_as::<_, BookRow>(&format!("{} WHERE b.id = ?", SELECT_BOOKS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(BookRecord::from))
    }

    /// List books in insertion order, narrowed by `filter`
    pub async fn list(&self, filter: &BookFilter) -> Result<Vec<BookRecord>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_BOOKS);
        query.push(" WHERE 1 = 1");

        if let Some(author_id) = &filter.author_id {
            query.push(" AND b.author_id = ").push_bind(author_id.clone());
        }
        if let Some(genre) = &filter.genre {
            query
                .push(" AND EXISTS (SELECT 1 FROM json_each(b.genres) g WHERE g.value = ")
                .push_bind(genre.clone())
                .push(")");
        }
        query.push(" ORDER BY b.rowid");

        let rows = query
            .build_query_as::<BookRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(BookRecord::from).collect())
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

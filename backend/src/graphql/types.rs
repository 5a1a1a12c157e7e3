//! GraphQL type definitions
//!
//! These types mirror the store records but are decorated with async-graphql
//! attributes. Field names follow the public schema exactly.

use async_graphql::{Context, ID, Object, Result, SimpleObject};
use serde::{Deserialize, Serialize};

use crate::db::{AuthorRecord, AuthorWithBookCount, BookRecord, Database, UserRecord};
use crate::services::EventBus;

use super::errors::{count_to_int, internal};

/// Event bus carrying newly added books
pub type BookEvents = EventBus<Book>;

/// A registered user
#[derive(Debug, Clone, PartialEq, Eq, SimpleObject, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub favorite_genre: String,
    pub id: ID,
}

impl From<UserRecord> for User {
    fn from(r: UserRecord) -> Self {
        Self {
            username: r.username,
            favorite_genre: r.favorite_genre,
            id: ID(r.id),
        }
    }
}

/// A book author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub born: Option<i32>,
    /// Count captured when this author was produced; counted at read time otherwise
    #[serde(skip)]
    pub book_count: Option<i64>,
}

#[Object]
impl Author {
    async fn name(&self) -> &str {
        &self.name
    }

    async fn id(&self) -> ID {
        ID(self.id.clone())
    }

    async fn born(&self) -> Option<i32> {
        self.born
    }

    /// Number of books referencing this author, counted at read time
    async fn book_count(&self, ctx: &Context<'_>) -> Result<Option<i32>> {
        let count = match self.book_count {
            Some(count) => count,
            None => ctx
                .data_unchecked::<Database>()
                .authors()
                .book_count(&self.id)
                .await
                .map_err(internal)?,
        };
        count_to_int(count).map(Some)
    }
}

impl From<AuthorRecord> for Author {
    fn from(r: AuthorRecord) -> Self {
        Self {
            id: r.id,
            name: r.name,
            born: r.born,
            book_count: None,
        }
    }
}

impl From<AuthorWithBookCount> for Author {
    fn from(r: AuthorWithBookCount) -> Self {
        Self {
            id: r.id,
            name: r.name,
            born: r.born,
            book_count: Some(r.book_count),
        }
    }
}

/// A catalogued book with its author resolved
#[derive(Debug, Clone, PartialEq, Eq, SimpleObject, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
    pub published: i32,
    pub author: Author,
    pub genres: Vec<String>,
    pub id: ID,
}

impl From<BookRecord> for Book {
    fn from(r: BookRecord) -> Self {
        Self {
            title: r.title,
            published: r.published,
            author: r.author.into(),
            genres: r.genres,
            id: ID(r.id),
        }
    }
}

/// A signed bearer credential
#[derive(Debug, Clone, SimpleObject, Serialize, Deserialize)]
pub struct Token {
    pub value: String,
}

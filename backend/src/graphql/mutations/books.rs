use super::prelude::*;

#[derive(Default)]
pub struct BookMutations;

#[Object]
impl BookMutations {
    /// Add a book, creating its author on first mention.
    ///
    /// Requires authentication. Subscribers of `bookAdded` receive the
    /// returned book.
    #[graphql(guard = "AuthGuard")]
    async fn add_book(
        &self,
        ctx: &Context<'_>,
        title: String,
        author: String,
        published: i32,
        genres: Vec<String>,
    ) -> Result<Option<Book>> {
        let user = ctx.current_user()?;
        let db = ctx.data_unchecked::<Database>();
        let events = ctx.data_unchecked::<BookEvents>();

        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(CatalogError::validation("title", "Book title must not be empty").extend());
        }
        let author_name = author.trim().to_string();
        if author_name.is_empty() {
            return Err(
                CatalogError::validation("author", "Author name must not be empty").extend(),
            );
        }
        let genres = normalize_genres(genres);

        let found = db
            .authors()
            .find_or_create(&author_name)
            .await
            .map_err(internal)?;
        if found.created {
            tracing::info!(
                author_id = %found.author.id,
                name = %found.author.name,
                "Author created"
            );
        }

        let record = db
            .books()
            .create(CreateBook {
                title,
                published,
                author_id: found.author.id,
                genres,
            })
            .await
            .map_err(internal)?;

        tracing::info!(
            book_id = %record.id,
            author_id = %record.author.id,
            username = %user.0.username,
            "Book added"
        );

        // Freeze the count so every subscriber sees what this call returns
        let book_count = db
            .authors()
            .book_count(&record.author.id)
            .await
            .map_err(internal)?;
        let mut book = Book::from(record);
        book.author.book_count = Some(book_count);

        let delivered = events.publish(Topic::BookAdded, book.clone());
        tracing::debug!(book_id = %book.id.as_str(), delivered, "bookAdded published");

        Ok(Some(book))
    }
}

/// Trim genres, drop blanks and repeated entries while keeping first-seen order
fn normalize_genres(genres: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(genres.len());
    for genre in genres {
        let genre = genre.trim();
        if !genre.is_empty() && !normalized.iter().any(|g| g == genre) {
            normalized.push(genre.to_string());
        }
    }
    normalized
}

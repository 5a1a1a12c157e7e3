use super::prelude::*;

#[derive(Default)]
pub struct BookQueries;

#[Object]
impl BookQueries {
    /// Total number of books
    async fn book_count(&self, ctx: &Context<'_>) -> Result<i32> {
        let db = ctx.data_unchecked::<Database>();
        let count = db.books().count().await.map_err(internal)?;
        count_to_int(count)
    }

    /// Books, optionally narrowed to one author's name and/or one genre
    async fn all_books(
        &self,
        ctx: &Context<'_>,
        author: Option<String>,
        genre: Option<String>,
    ) -> Result<Vec<Book>> {
        let db = ctx.data_unchecked::<Database>();

        let author_id = match author {
            Some(name) => match db.authors().get_by_name(name.trim()).await.map_err(internal)? {
                Some(record) => Some(record.id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };

        let records = db
            .books()
            .list(&BookFilter {
                author_id,
                genre: genre.map(|g| g.trim().to_string()),
            })
            .await
            .map_err(internal)?;

        Ok(records.into_iter().map(Book::from).collect())
    }
}

use super::prelude::*;

#[derive(Default)]
pub struct AuthorQueries;

#[Object]
impl AuthorQueries {
    /// Total number of authors
    async fn author_count(&self, ctx: &Context<'_>) -> Result<i32> {
        let db = ctx.data_unchecked::<Database>();
        let count = db.authors().count().await.map_err(internal)?;
        count_to_int(count)
    }

    /// Every author with its current book count
    async fn all_authors(&self, ctx: &Context<'_>) -> Result<Vec<Author>> {
        let db = ctx.data_unchecked::<Database>();
        let records = db
            .authors()
            .list_with_book_counts()
            .await
            .map_err(internal)?;
        Ok(records.into_iter().map(Author::from).collect())
    }
}

use super::prelude::*;

#[derive(Default)]
pub struct AuthorMutations;

#[Object]
impl AuthorMutations {
    /// Set an author's birth year. Returns null for an unknown name.
    ///
    /// Requires authentication.
    #[graphql(guard = "AuthGuard")]
    async fn edit_author(
        &self,
        ctx: &Context<'_>,
        name: String,
        set_born_to: i32,
    ) -> Result<Option<Author>> {
        let db = ctx.data_unchecked::<Database>();
        let authors = db.authors();

        let name = name.trim();
        let Some(existing) = authors.get_by_name(name).await.map_err(internal)? else {
            tracing::debug!(name = %name, "editAuthor on unknown author");
            return Ok(None);
        };

        let updated = authors
            .update_born(&existing.id, set_born_to)
            .await
            .map_err(internal)?;

        if let Some(author) = &updated {
            tracing::info!(author_id = %author.id, born = set_born_to, "Author updated");
        }
        Ok(updated.map(Author::from))
    }
}

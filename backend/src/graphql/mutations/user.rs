use super::prelude::*;

const MIN_USERNAME_LEN: usize = 3;

#[derive(Default)]
pub struct UserMutations;

#[Object]
impl UserMutations {
    /// Register a new user
    ///
    /// No authentication required.
    async fn create_user(
        &self,
        ctx: &Context<'_>,
        username: String,
        favorite_genre: String,
    ) -> Result<Option<User>> {
        let auth = ctx.data_unchecked::<AuthService>();

        let username = username.trim().to_string();
        if username.chars().count() < MIN_USERNAME_LEN {
            return Err(CatalogError::validation(
                "username",
                format!("Username must be at least {} characters", MIN_USERNAME_LEN),
            )
            .extend());
        }
        let favorite_genre = favorite_genre.trim().to_string();
        if favorite_genre.is_empty() {
            return Err(CatalogError::validation(
                "favoriteGenre",
                "Favorite genre must not be empty",
            )
            .extend());
        }

        match auth
            .register(username.clone(), favorite_genre)
            .await
            .map_err(|e| CatalogError::from(e).extend())?
        {
            CreateUserOutcome::Created(record) => {
                tracing::info!(user_id = %record.id, username = %record.username, "User registered");
                Ok(Some(User::from(record)))
            }
            CreateUserOutcome::UsernameTaken => {
                tracing::warn!(username = %username, "Registration rejected, username taken");
                Err(CatalogError::validation("username", "Username must be unique").extend())
            }
        }
    }

    /// Exchange username and password for a bearer token
    ///
    /// No authentication required.
    async fn login(
        &self,
        ctx: &Context<'_>,
        username: String,
        password: String,
    ) -> Result<Option<Token>> {
        let auth = ctx.data_unchecked::<AuthService>();
        let username = username.trim();

        match auth.login(username, &password).await {
            Ok(value) => {
                tracing::info!(username = %username, "User logged in");
                Ok(Some(Token { value }))
            }
            Err(e) => {
                tracing::warn!(username = %username, error = %e, "Login failed");
                Err(CatalogError::from(e).extend())
            }
        }
    }
}

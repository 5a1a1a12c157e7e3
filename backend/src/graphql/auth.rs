//! GraphQL authentication context
//!
//! The transport resolves the bearer credential once per request (or per
//! WebSocket connection) and inserts a [CurrentUser] into the context. Resolvers
//! read it through [AuthExt].
//!
//! ## Guards
//!
//! Use `AuthGuard` to require a current user:
//!
//! ```ignore
//! #[graphql(guard = "AuthGuard")]
//! async fn add_book(&self, ctx: &Context<'_>, ...) -> Result<Option<Book>> { ... }
//! ```

use async_graphql::{Context, ErrorExtensions, Result};

use crate::db::UserRecord;

use super::errors::CatalogError;

/// The user resolved from the caller's credential
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRecord);

/// Extension trait to get the current user from GraphQL context
pub trait AuthExt {
    /// Get the current user, or an `UNAUTHENTICATED` error
    fn current_user(&self) -> Result<&CurrentUser>;

    /// Get the current user if there is one
    fn try_current_user(&self) -> Option<&CurrentUser>;
}

impl<'a> AuthExt for Context<'a> {
    fn current_user(&self) -> Result<&CurrentUser> {
        self.data_opt::<CurrentUser>()
            .ok_or_else(|| CatalogError::Unauthenticated.extend())
    }

    fn try_current_user(&self) -> Option<&CurrentUser> {
        self.data_opt::<CurrentUser>()
    }
}

/// Guard that requires a current user.
///
/// Runs before the resolver, so a rejected call never touches the store.
pub struct AuthGuard;

impl async_graphql::Guard for AuthGuard {
    fn check(&self, ctx: &Context<'_>) -> impl std::future::Future<Output = Result<()>> + Send {
        let result = ctx.current_user().map(|_| ());
        async move { result }
    }
}

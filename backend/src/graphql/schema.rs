//! GraphQL schema definition with queries, mutations, and subscriptions
//!
//! This is the single API surface for the catalog. Reads and registration are
//! public; `addBook` and `editAuthor` require a current user.

use async_graphql::{MergedObject, Schema};
use async_graphql::extensions::Tracing;

use crate::db::Database;
use crate::services::AuthService;

use super::mutations::{AuthorMutations, BookMutations, UserMutations};
use super::queries::{AuthorQueries, BookQueries, UserQueries};
use super::subscriptions::SubscriptionRoot;
use super::types::BookEvents;

/// The GraphQL schema type
pub type CatalogSchema = Schema<QueryRoot, MutationRoot, SubscriptionRoot>;

#[derive(MergedObject, Default)]
pub struct QueryRoot(UserQueries, BookQueries, AuthorQueries);

#[derive(MergedObject, Default)]
pub struct MutationRoot(BookMutations, AuthorMutations, UserMutations);

/// Build the GraphQL schema with all resolvers
pub fn build_schema(db: Database, auth: AuthService, events: BookEvents) -> CatalogSchema {
    Schema::build(QueryRoot::default(), MutationRoot::default(), SubscriptionRoot)
        .data(db)
        .data(auth)
        .data(events)
        .extension(Tracing)
        .finish()
}

//! GraphQL API with subscriptions for real-time updates
//!
//! This module provides the catalog's GraphQL API using async-graphql, with
//! queries and mutations over HTTP and the `bookAdded` subscription over
//! WebSocket.
//!
//! Resolvers are split by domain under `queries/` and `mutations/`, each a
//! `#[derive(Default)]` struct with an `#[Object]` impl, and combined with
//! `#[derive(MergedObject)]` in `schema.rs`.

pub mod auth;
pub mod errors;
pub mod mutations;
pub mod queries;
mod schema;
mod subscriptions;
pub mod types;


pub use auth::CurrentUser;
pub use errors::CatalogError;
pub use schema::{CatalogSchema, build_schema};
pub use types::BookEvents;

//! HTTP route definitions
//!
//! The catalog API is GraphQL at /graphql, with subscriptions at /graphql/ws.
//! Health checks live beside it.

pub mod graphql;
pub mod health;

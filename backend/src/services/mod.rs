//! Business logic services

pub mod auth;
pub mod events;

pub use auth::{AuthConfig, AuthError, AuthService};
pub use events::{EventBus, Topic};

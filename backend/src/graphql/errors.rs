//! Client-facing error taxonomy
//!
//! Every error leaving the API carries an `extensions.code` so clients can
//! branch without parsing messages.

use async_graphql::{ErrorExtensions, Value};
use thiserror::Error;

use crate::services::AuthError;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// An operation that needs a current user was called without one
    #[error("not authenticated")]
    Unauthenticated,

    /// Login failed; the message never says which half was wrong
    #[error("wrong credentials")]
    WrongCredentials,

    /// Input rejected before anything was written
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// A presented bearer token failed verification
    #[error("invalid token")]
    InvalidToken,

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl CatalogError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::Unauthenticated => "UNAUTHENTICATED",
            CatalogError::WrongCredentials | CatalogError::Validation { .. } => "BAD_USER_INPUT",
            CatalogError::InvalidToken => "INVALID_TOKEN",
            CatalogError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl From<AuthError> for CatalogError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::WrongCredentials => CatalogError::WrongCredentials,
            AuthError::InvalidToken(_) => CatalogError::InvalidToken,
            AuthError::Internal(e) => CatalogError::Internal(e),
        }
    }
}

impl ErrorExtensions for CatalogError {
    fn extend(&self) -> async_graphql::Error {
        if let CatalogError::Internal(e) = self {
            tracing::error!(error = ?e, "Request failed");
        }

        async_graphql::Error::new(self.to_string()).extend_with(|_, ext| {
            ext.set("code", self.code());
            if let CatalogError::Validation { field, .. } = self {
                ext.set("invalidArgs", Value::List(vec![Value::from(*field)]));
            }
        })
    }
}

/// Map a store failure to an opaque internal error
pub(crate) fn internal(err: anyhow::Error) -> async_graphql::Error {
    CatalogError::Internal(err).extend()
}

/// Narrow a store count to a GraphQL `Int`
pub(crate) fn count_to_int(count: i64) -> async_graphql::Result<i32> {
    i32::try_from(count)
        .map_err(|e| internal(anyhow::anyhow!("Count {} does not fit an Int: {}", count, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_of(err: &async_graphql::Error) -> Option<Value> {
        err.extensions.as_ref().and_then(|ext| ext.get("code").cloned())
    }

    #[test]
    fn test_codes() {
        assert_eq!(
            code_of(&CatalogError::Unauthenticated.extend()),
            Some(Value::from("UNAUTHENTICATED"))
        );
        assert_eq!(
            code_of(&CatalogError::WrongCredentials.extend()),
            Some(Value::from("BAD_USER_INPUT"))
        );
        assert_eq!(
            code_of(&CatalogError::InvalidToken.extend()),
            Some(Value::from("INVALID_TOKEN"))
        );
    }

    #[test]
    fn test_validation_names_argument() {
        let err = CatalogError::validation("username", "too short").extend();
        assert_eq!(err.message, "too short");
        let ext = err.extensions.unwrap();
        assert_eq!(
            ext.get("invalidArgs"),
            Some(&Value::List(vec![Value::from("username")]))
        );
    }

    #[test]
    fn test_internal_hides_details() {
        let err = internal(anyhow::anyhow!("disk on fire"));
        assert_eq!(err.message, "internal server error");
    }

    #[test]
    fn test_count_to_int_rejects_overflow() {
        assert_eq!(count_to_int(42).unwrap(), 42);
        let err = count_to_int(i64::from(i32::MAX) + 1).unwrap_err();
        assert_eq!(code_of(&err), Some(Value::from("INTERNAL_SERVER_ERROR")));
    }

    #[test]
    fn test_auth_errors_map_one_to_one() {
        assert_eq!(
            CatalogError::from(AuthError::InvalidToken("expired".into())).code(),
            "INVALID_TOKEN"
        );
        assert_eq!(
            CatalogError::from(AuthError::WrongCredentials).code(),
            "BAD_USER_INPUT"
        );
    }
}

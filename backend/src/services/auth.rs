//! Authentication service for registration, login and bearer tokens
//!
//! Provides:
//! - User registration with a bcrypt-hashed reference credential
//! - Login with an answer that does not reveal whether the username exists
//! - HS256 token issuing and verification
//! - Resolution of a bearer token to the current user

use anyhow::anyhow;
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::db::{CreateUser, CreateUserOutcome, Database, UserRecord};

// ============================================================================
// JWT Claims
// ============================================================================

/// Claims embedded in every issued token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Username at issue time
    pub username: String,
    /// User ID
    pub id: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown username or wrong password; deliberately indistinguishable
    #[error("wrong credentials")]
    WrongCredentials,

    /// Bad signature, malformed or expired token
    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

// ============================================================================
// Configuration
// ============================================================================

/// Auth service configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// JWT signing secret
    pub jwt_secret: String,
    /// Token lifetime in seconds
    pub token_lifetime_secs: i64,
    /// Password every registered user is issued
    pub default_password: String,
    /// Bcrypt cost factor
    pub bcrypt_cost: u32,
}

impl From<&Config> for AuthConfig {
    fn from(config: &Config) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            token_lifetime_secs: config.token_lifetime_secs,
            default_password: config.default_user_password.clone(),
            bcrypt_cost: config.bcrypt_cost,
        }
    }
}

// ============================================================================
// Auth Service
// ============================================================================

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: Database,
    config: AuthConfig,
}

impl AuthService {
    /// Create a new auth service
    pub fn new(db: Database, config: AuthConfig) -> Self {
        Self { db, config }
    }

    /// Register a user holding the reference credential
    pub async fn register(
        &self,
        username: String,
        favorite_genre: String,
    ) -> Result<CreateUserOutcome, AuthError> {
        let password_hash = self.hash_password(&self.config.default_password)?;

        let outcome = self
            .db
            .users()
            .create(CreateUser {
                username,
                favorite_genre,
                password_hash,
            })
            .await?;

        Ok(outcome)
    }

    /// Check a username/password pair and issue a signed token on success
    pub async fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let user = self
            .db
            .users()
            .get_by_username(username)
            .await?
            .ok_or(AuthError::WrongCredentials)?;

        if !self.verify_password(password, &user.password_hash)? {
            return Err(AuthError::WrongCredentials);
        }

        self.issue_token(&user)
    }

    /// Sign a token embedding `{username, id}`
    pub fn issue_token(&self, user: &UserRecord) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = TokenClaims {
            username: user.username.clone(),
            id: user.id.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.config.token_lifetime_secs)).timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::Internal(anyhow!("Failed to sign token: {}", e)))
    }

    /// Check signature and expiry, returning the embedded claims
    pub fn verify_token(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = false;

        let token_data = decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            tracing::debug!(error = %e, "Token verification failed");
            AuthError::InvalidToken(e.to_string())
        })?;

        Ok(token_data.claims)
    }

    /// Resolve a bearer token to its user.
    ///
    /// Verification failure is an error; a valid token for a user that no
    /// longer exists resolves to `None`.
    pub async fn resolve_current_user(
        &self,
        token: &str,
    ) -> Result<Option<UserRecord>, AuthError> {
        let claims = self.verify_token(token)?;
        let user = self.db.users().get_by_id(&claims.id).await?;
        if user.is_none() {
            tracing::debug!(user_id = %claims.id, "Token subject no longer exists");
        }
        Ok(user)
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    /// Hash a password with bcrypt
    fn hash_password(&self, password: &str) -> anyhow::Result<String> {
        hash(password, self.config.bcrypt_cost)
            .map_err(|e| anyhow!("Failed to hash password: {}", e))
    }

    /// Verify a password against a hash
    fn verify_password(&self, password: &str, hash: &str) -> anyhow::Result<bool> {
        verify(password, hash).map_err(|e| anyhow!("Failed to verify password: {}", e))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use assert_matches::assert_matches;

    use super::*;

    pub(crate) fn test_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            token_lifetime_secs: 3600,
            default_password: "secret".to_string(),
            bcrypt_cost: 4,
        }
    }

    async fn service() -> AuthService {
        let db = Database::connect_in_memory().await.unwrap();
        AuthService::new(db, test_config())
    }

    async fn register(auth: &AuthService, username: &str) -> UserRecord {
        assert_matches!(
            auth.register(username.to_string(), "design".to_string()).await.unwrap(),
            CreateUserOutcome::Created(user) => user
        )
    }

    #[tokio::test]
    async fn test_login_issues_token_for_stored_user() {
        let auth = service().await;
        let user = register(&auth, "mluukkai").await;

        let token = auth.login("mluukkai", "secret").await.unwrap();
        let claims = auth.verify_token(&token).unwrap();
        assert_eq!(claims.id, user.id);
        assert_eq!(claims.username, "mluukkai");
        assert!(claims.exp > claims.iat);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let auth = service().await;
        register(&auth, "mluukkai").await;

        let wrong_password = auth.login("mluukkai", "hunter2").await.unwrap_err();
        let unknown_user = auth.login("nobody", "secret").await.unwrap_err();

        assert_matches!(wrong_password, AuthError::WrongCredentials);
        assert_matches!(unknown_user, AuthError::WrongCredentials);
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[tokio::test]
    async fn test_password_is_stored_hashed() {
        let auth = service().await;
        let user = register(&auth, "root").await;
        assert_ne!(user.password_hash, "secret");
        assert!(user.password_hash.starts_with("$2"));
    }

    #[tokio::test]
    async fn test_tampered_and_foreign_tokens_are_rejected() {
        let auth = service().await;
        let user = register(&auth, "root").await;
        let token = auth.issue_token(&user).unwrap();

        let mut tampered = token.clone();
        tampered.push('x');
        assert_matches!(auth.verify_token(&tampered), Err(AuthError::InvalidToken(_)));

        let other = AuthService::new(
            Database::connect_in_memory().await.unwrap(),
            AuthConfig {
                jwt_secret: "another-secret".to_string(),
                ..test_config()
            },
        );
        assert_matches!(other.verify_token(&token), Err(AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let auth = service().await;
        let past = Utc::now() - Duration::hours(2);
        let claims = TokenClaims {
            username: "root".to_string(),
            id: "some-id".to_string(),
            iat: past.timestamp(),
            exp: (past + Duration::minutes(5)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert_matches!(auth.verify_token(&token), Err(AuthError::InvalidToken(_)));
        assert_matches!(
            auth.resolve_current_user(&token).await,
            Err(AuthError::InvalidToken(_))
        );
    }

    #[tokio::test]
    async fn test_valid_token_for_missing_user_resolves_to_none() {
        let auth = service().await;
        let ghost = UserRecord {
            id: "0b7d7c1e-0000-4000-8000-000000000000".to_string(),
            username: "ghost".to_string(),
            favorite_genre: "horror".to_string(),
            password_hash: String::new(),
            created_at: String::new(),
        };
        let token = auth.issue_token(&ghost).unwrap();

        assert!(auth.resolve_current_user(&token).await.unwrap().is_none());

        let user = register(&auth, "root").await;
        let token = auth.issue_token(&user).unwrap();
        let resolved = auth.resolve_current_user(&token).await.unwrap().unwrap();
        assert_eq!(resolved.id, user.id);
    }
}

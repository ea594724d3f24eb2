//! Password hashing, session tokens and the request extractors that turn a
//! bearer token into a user id.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::Deserialize;
use tracing::warn;

use truekland_shared::session::{issue_token, verify_token, SessionClaims};
use truekland_shared::{SessionError, UserId};
use truekland_store::User;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::error::ServerError;

/// Hash a password with Argon2id on the blocking pool. Returns a PHC string.
pub async fn hash_password(password: String) -> Result<String, ServerError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ServerError::Internal(format!("Failed to hash password: {e}")))
    })
    .await
    .map_err(|e| ServerError::Internal(format!("Hashing task failed: {e}")))?
}

/// Check `password` against a stored PHC string on the blocking pool.
pub async fn verify_password(password: String, hash: String) -> Result<bool, ServerError> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&hash)
            .map_err(|e| ServerError::Internal(format!("Invalid password hash: {e}")))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| ServerError::Internal(format!("Verification task failed: {e}")))?
}

/// Server-side half of the stateless session scheme.
pub struct SessionKeys {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(signing_key: SigningKey, ttl: Duration) -> Self {
        Self {
            verifying_key: signing_key.verifying_key(),
            signing_key,
            ttl,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        let signing_key = match config.session_signing_key {
            Some(seed) => SigningKey::from_bytes(&seed),
            None => {
                warn!("SESSION_SIGNING_KEY not set, sessions will not survive a restart");
                SigningKey::generate(&mut rand::rngs::OsRng)
            }
        };
        Self::new(signing_key, Duration::hours(config.session_ttl_hours))
    }

    /// Issue a token for `user`. Returns the token and its expiry.
    pub fn issue(&self, user: UserId) -> (String, DateTime<Utc>) {
        let claims = SessionClaims::new(user, self.ttl);
        (issue_token(&claims, &self.signing_key), claims.expires_at)
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        verify_token(token, &self.verifying_key)
    }
}

/// The authenticated caller.
///
/// Reads `Authorization: Bearer <token>`, falling back to a `?token=` query
/// parameter for clients that cannot set headers (`EventSource`).
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: UserId,
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string());

    header.or_else(|| {
        Query::<TokenQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(q)| q.token)
    })
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ServerError::Unauthorized)?;
        let claims = state.sessions.verify(&token)?;
        Ok(AuthUser { id: claims.user_id })
    }
}

/// An authenticated caller whose account carries the admin flag.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        let user = state
            .with_db(|db| db.get_user(auth.id))
            .map_err(|_| ServerError::Unauthorized)?;

        if !user.is_admin {
            return Err(ServerError::Forbidden("Administrator access required".into()));
        }
        Ok(AdminUser(user))
    }
}

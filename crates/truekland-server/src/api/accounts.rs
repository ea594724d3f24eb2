use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use truekland_shared::validation::{LoginInput, ProfileUpdateInput, RegistrationInput};
use truekland_shared::UserId;
use truekland_store::{Post, PostFilter, PublicProfile, StoreError, User};

use super::AppState;
use crate::auth::{hash_password, verify_password, AuthUser};
use crate::error::ServerError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    token: String,
    expires_at: DateTime<Utc>,
    user: User,
}

#[derive(Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    limit: u32,
    #[serde(default)]
    offset: u32,
}

pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegistrationInput>,
) -> Result<(StatusCode, Json<AuthResponse>), ServerError> {
    if !state.config.registration_open {
        return Err(ServerError::Forbidden("Registration is closed".into()));
    }

    let registration = input.validate()?;
    let is_admin = state.config.is_admin_email(&registration.email);
    let hash = hash_password(registration.password).await?;

    let user = state.with_db(|db| {
        db.create_user(&registration.email, &hash, &registration.display_name, is_admin)
    })?;
    let (token, expires_at) = state.sessions.issue(user.id);

    info!(user = %user.id, admin = is_admin, "Account registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            expires_at,
            user,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> Result<Json<AuthResponse>, ServerError> {
    let login = input.validate()?;

    if !state.limiters.logins.check(&login.email).await {
        return Err(ServerError::TooManyRequests);
    }

    let credentials = match state.with_db(|db| db.get_credentials(&login.email)) {
        Ok(credentials) => credentials,
        Err(ServerError::NotFound(_)) => return Err(ServerError::Unauthorized),
        Err(e) => return Err(e),
    };

    if !verify_password(login.password, credentials.password_hash).await? {
        return Err(ServerError::Unauthorized);
    }

    let mut user = credentials.user;
    if !user.is_admin && state.config.is_admin_email(&user.email) {
        state.with_db(|db| db.set_admin(user.id, true))?;
        user.is_admin = true;
        info!(user = %user.id, "Granted admin flag from ADMIN_EMAILS");
    }

    let (token, expires_at) = state.sessions.issue(user.id);
    Ok(Json(AuthResponse {
        token,
        expires_at,
        user,
    }))
}

pub async fn me(auth: AuthUser, State(state): State<AppState>) -> Result<Json<User>, ServerError> {
    // A valid token for a deleted account is no longer a session.
    match state.with_db(|db| db.get_user(auth.id)) {
        Ok(user) => Ok(Json(user)),
        Err(ServerError::NotFound(_)) => Err(ServerError::Unauthorized),
        Err(e) => Err(e),
    }
}

pub async fn update_me(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<ProfileUpdateInput>,
) -> Result<Json<User>, ServerError> {
    let changes = input.validate()?;
    let user = state.with_db(|db| db.update_profile(auth.id, &changes))?;
    Ok(Json(user))
}

pub async fn public_profile(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<PublicProfile>, ServerError> {
    let user = state.with_db(|db| db.get_user(id))?;
    Ok(Json(user.into()))
}

pub async fn user_posts(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<Post>>, ServerError> {
    let posts = state.with_db(|db| -> Result<_, StoreError> {
        db.get_user(id)?;
        db.list_posts(&PostFilter {
            owner: Some(id),
            limit: page.limit,
            offset: page.offset,
            ..PostFilter::default()
        })
    })?;
    Ok(Json(posts))
}

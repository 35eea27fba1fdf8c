use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use secrecy::{ExposeSecret, SecretBox};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::app_state::AppState;
use crate::auth::{
    clear_session_cookie, hash_password, session_cookie, session_token, verify_password,
    CurrentUser,
};
use crate::db::repositories::{AuthSessionRepository, UserRepository};
use crate::db::{NewUser, NewUserRecord, User, UserLogin, UserRole};
use crate::error::{AppError, AppResult};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: User,
    pub token: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<NewUser>,
) -> AppResult<impl IntoResponse> {
    payload.validate()?;
    if payload.password.expose_secret().chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    if UserRepository::get_user_by_username(&state.db, &payload.username)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("Username already taken".to_string()));
    }

    let NewUser {
        username,
        password,
        name,
        email,
        role,
    } = payload;

    let password_hash = hash_blocking(password).await?;
    let record = NewUserRecord {
        username,
        password_hash,
        name,
        email,
        // Self-registration never grants admin; only the first account is promoted
        role: role.filter(|r| *r != UserRole::Admin).unwrap_or_default(),
    };

    let mut tx = state.db.begin().await?;
    let user = UserRepository::create_user(&mut tx, &record).await?;
    tx.commit().await?;

    info!(user_id = user.id, role = ?user.role, "User registered");
    let (headers, body) = start_session(&state, user).await?;
    Ok((StatusCode::CREATED, headers, Json(body)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<UserLogin>,
) -> AppResult<impl IntoResponse> {
    let user = UserRepository::get_user_by_username(&state.db, payload.username.trim()).await?;
    let Some(user) = user else {
        warn!(username = %payload.username, "Login for unknown user");
        return Err(invalid_credentials());
    };

    let stored = user.password_hash.clone();
    let password = payload.password;
    let verified = tokio::task::spawn_blocking(move || {
        verify_password(password.expose_secret(), &stored)
    })
    .await
    .map_err(|e| AppError::InternalServerError(format!("password check panicked: {e}")))?;

    match verified {
        Ok(true) => {}
        Ok(false) => {
            warn!(user_id = user.id, "Login with wrong password");
            return Err(invalid_credentials());
        }
        Err(e) => {
            return Err(AppError::InternalServerError(format!(
                "stored hash for user {} unusable: {e}",
                user.id
            )))
        }
    }

    info!(user_id = user.id, "User logged in");
    let (headers, body) = start_session(&state, user).await?;
    Ok((headers, Json(body)))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<impl IntoResponse> {
    if let Some(token) = session_token(&headers) {
        AuthSessionRepository::delete_session(&state.db, token).await?;
    }

    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(state.env.is_production()).parse() {
        response_headers.insert(SET_COOKIE, cookie);
    }
    Ok((StatusCode::NO_CONTENT, response_headers))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

async fn hash_blocking(password: SecretBox<String>) -> AppResult<String> {
    tokio::task::spawn_blocking(move || hash_password(password.expose_secret()))
        .await
        .map_err(|e| AppError::InternalServerError(format!("password hashing panicked: {e}")))
}

async fn start_session(state: &AppState, user: User) -> AppResult<(HeaderMap, AuthResponse)> {
    let ttl = state.env.session_ttl();
    let expires_at = OffsetDateTime::now_utc() + ttl;
    let session = AuthSessionRepository::create_session(&state.db, user.id, expires_at).await?;

    let cookie = session_cookie(
        session.token,
        ttl.whole_seconds(),
        state.env.is_production(),
    );
    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        cookie
            .parse()
            .map_err(|_| AppError::InternalServerError("invalid session cookie".to_string()))?,
    );

    Ok((
        headers,
        AuthResponse {
            user,
            token: session.token,
            expires_at: session.expires_at,
        },
    ))
}

fn invalid_credentials() -> AppError {
    AppError::Authentication("Invalid username or password".to_string())
}

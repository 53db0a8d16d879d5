use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{MessageResponse, PublicUser, SigninRequest, SignupRequest},
        error::AuthError,
        extractors::{AuthUser, RefreshAuth},
        jwt::TokenPair,
        service::AuthService,
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/signin", post(signin))
        .route("/auth/refresh-token", post(refresh_token))
        .route("/auth/logout", put(logout))
}

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/user/me", get(get_me))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn validate_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    if !is_valid_email(email) {
        warn!(email = %email, "invalid email");
        return Err(AuthError::Validation("Invalid email".into()));
    }
    if password.len() < 8 {
        warn!("password too short");
        return Err(AuthError::Validation("Password too short".into()));
    }
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AuthError> {
    payload.email = payload.email.trim().to_lowercase();
    validate_credentials(&payload.email, &payload.password)?;
    if payload.first_name.trim().is_empty() {
        return Err(AuthError::Validation("First name must not be empty".into()));
    }

    let svc = AuthService::from_ref(&state);
    svc.signup(
        &payload.email,
        &payload.password,
        Some(payload.first_name.trim().to_string()),
        payload.last_name,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User created".into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn signin(
    State(state): State<AppState>,
    Json(mut payload): Json<SigninRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    payload.email = payload.email.trim().to_lowercase();
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AuthError::Validation("Invalid email".into()));
    }

    let svc = AuthService::from_ref(&state);
    let pair = svc.signin(&payload.email, &payload.password).await?;
    Ok(Json(pair))
}

#[instrument(skip(state, refresh))]
pub async fn refresh_token(
    State(state): State<AppState>,
    refresh: RefreshAuth,
) -> Result<Json<TokenPair>, AuthError> {
    let svc = AuthService::from_ref(&state);
    let pair = svc.refresh_tokens(refresh.user_id, &refresh.token).await?;
    Ok(Json(pair))
}

#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MessageResponse>, AuthError> {
    let svc = AuthService::from_ref(&state);
    svc.logout(user_id).await?;
    Ok(Json(MessageResponse {
        message: "Logged out".into(),
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AuthError> {
    let svc = AuthService::from_ref(&state);
    let user = svc.get_user(user_id).await?;
    Ok(Json(PublicUser::from(user)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
        assert!(!is_valid_email("user"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("spaces in@example.com"));
    }
}

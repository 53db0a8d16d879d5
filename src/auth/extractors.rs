use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
};
use tracing::warn;
use uuid::Uuid;

use crate::auth::jwt::JwtKeys;

fn bearer_token(parts: &Parts) -> Result<&str, (StatusCode, String)> {
    let auth_header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or((
            StatusCode::UNAUTHORIZED,
            "Missing Authorization header".to_string(),
        ))?;

    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .ok_or((
            StatusCode::UNAUTHORIZED,
            "Invalid Authorization header".to_string(),
        ))
}

/// Extracts and validates an access-token bearer credential,
/// yielding the authenticated user ID.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let token = bearer_token(parts)?;

        let claims = keys.verify_access(token).map_err(|_| {
            warn!("invalid or expired access token");
            (
                StatusCode::UNAUTHORIZED,
                "Invalid or expired token".to_string(),
            )
        })?;

        Ok(AuthUser(claims.sub))
    }
}

/// Extracts a refresh-token bearer credential. Keeps the raw token
/// alongside the verified claims: the service still has to match it
/// against the stored hash before rotating.
pub struct RefreshAuth {
    pub user_id: Uuid,
    pub token: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for RefreshAuth
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let token = bearer_token(parts)?;

        let claims = keys.verify_refresh(token).map_err(|_| {
            warn!("invalid or expired refresh token");
            (
                StatusCode::UNAUTHORIZED,
                "Invalid or expired refresh token".to_string(),
            )
        })?;

        Ok(RefreshAuth {
            user_id: claims.sub,
            token: token.to_string(),
        })
    }
}

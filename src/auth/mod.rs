use crate::state::AppState;
use axum::Router;

pub mod dto;
mod error;
pub(crate) mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod service;
pub mod store;

pub use error::AuthError;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::user_routes())
}

use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::error::AuthError;
use crate::auth::jwt::{JwtKeys, TokenPair};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::store::{CredentialStore, NewUser, PgStore, StoreError, User};
use crate::state::AppState;

/// Orchestrates signup, signin, token rotation and logout over the
/// credential store, the password hasher and the token issuer. All
/// collaborators are passed in explicitly.
///
/// A user's session state is observable only through
/// `refresh_token_hash`: `NULL` means logged out, a non-null hash means
/// the user holds exactly one live refresh token.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    keys: JwtKeys,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            Arc::new(PgStore::new(state.db.clone())),
            JwtKeys::from_ref(state),
        )
    }
}

impl AuthService {
    pub fn new(store: Arc<dyn CredentialStore>, keys: JwtKeys) -> Self {
        Self { store, keys }
    }

    /// Create a user. Signup does not authenticate: no tokens are issued.
    ///
    /// The database unique index decides the duplicate-email race; any
    /// store failure other than a duplicate propagates as internal.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<User, AuthError> {
        let password_hash = hash_password(password)?;
        let user = self
            .store
            .create(NewUser {
                email: email.to_string(),
                first_name,
                last_name,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                StoreError::Duplicate => {
                    warn!(email = %email, "signup duplicate email");
                    AuthError::UserAlreadyExists
                }
                StoreError::Other(err) => AuthError::Internal(err),
            })?;
        info!(user_id = %user.id, email = %user.email, "user signed up");
        Ok(user)
    }

    /// Verify credentials and issue a token pair, persisting the hash of
    /// the new refresh token. Unknown email and wrong password are the
    /// same failure.
    pub async fn signin(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        let user = self
            .store
            .find_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = %user.id, "signin wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let pair = self.keys.sign_pair(user.id, &user.email)?;
        let refresh_hash = hash_password(&pair.refresh_token)?;
        self.store
            .set_refresh_hash(user.id, Some(&refresh_hash))
            .await?;

        info!(user_id = %user.id, "user signed in");
        Ok(pair)
    }

    /// Exchange a still-valid refresh token for a fresh pair.
    ///
    /// Rotation is one-time-use: the stored hash is replaced with a
    /// compare-and-swap, so the presented token is dead the moment the
    /// exchange succeeds and a concurrent replay loses the race.
    pub async fn refresh_tokens(
        &self,
        user_id: Uuid,
        presented_refresh_token: &str,
    ) -> Result<TokenPair, AuthError> {
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        // NULL hash means logged out; a rotated-away token no longer
        // matches. Both are the same denial.
        let stored_hash = user.refresh_token_hash.ok_or(AuthError::AccessDenied)?;
        if !verify_password(presented_refresh_token, &stored_hash)? {
            warn!(user_id = %user.id, "refresh token mismatch");
            return Err(AuthError::AccessDenied);
        }

        let pair = self.keys.sign_pair(user.id, &user.email)?;
        let next_hash = hash_password(&pair.refresh_token)?;
        let rotated = self
            .store
            .swap_refresh_hash(user.id, &stored_hash, &next_hash)
            .await?;
        if !rotated {
            warn!(user_id = %user.id, "refresh rotation lost race");
            return Err(AuthError::AccessDenied);
        }

        info!(user_id = %user.id, "refresh tokens rotated");
        Ok(pair)
    }

    /// Clear the stored refresh hash. Idempotent: logging out an already
    /// logged-out user is a zero-row update and still succeeds.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.store.set_refresh_hash(user_id, None).await?;
        info!(user_id = %user_id, "user logged out");
        Ok(())
    }

    /// Load the profile for an authenticated user id.
    pub async fn get_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

//! Session orchestration over the four flows: register, login, OAuth
//! sign-in, refresh. Transport (cookies, redirects, status codes) stays in
//! the handlers; this layer decides outcomes.

use std::sync::Arc;

use tracing::{info, warn};

use super::credentials;
use super::linker::{AccountLinker, GoogleProfile};
use super::models::{PublicUser, RegisterRequest, TokenPair, User};
use super::password::hash_password;
use super::tokens::{SecretKind, TokenService};
use crate::common::{safe_email_log, ApiError};
use crate::users::{NewUser, StoreError, UserStore};

/// Billing-owned defaults stamped onto new identities, passed through
/// untouched everywhere else
pub const DEFAULT_TIER: &str = "Free";
pub const DEFAULT_CREDITS: &str = "10";

/// A successful flow always yields a fresh pair plus the sanitized identity
#[derive(Debug)]
pub struct AuthOutcome {
    pub pair: TokenPair,
    pub user: PublicUser,
}

pub struct SessionManager {
    store: Arc<dyn UserStore>,
    tokens: TokenService,
    linker: AccountLinker,
}

impl SessionManager {
    pub fn new(store: Arc<dyn UserStore>, tokens: TokenService) -> Self {
        let linker = AccountLinker::new(Arc::clone(&store));
        Self {
            store,
            tokens,
            linker,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    fn outcome(&self, user: &User) -> Result<AuthOutcome, ApiError> {
        let pair = self.tokens.issue(user).map_err(|e| {
            warn!(error = %e, user_id = %user.id, "Token signing failed");
            ApiError::InternalServer("Failed to issue session tokens".to_string())
        })?;
        Ok(AuthOutcome {
            pair,
            user: PublicUser::from(user),
        })
    }

    /// Register a local account. Duplicate email is a conflict regardless
    /// of which credential path created the earlier record.
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthOutcome, ApiError> {
        let email = match request.email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() => email.to_string(),
            _ => return Err(ApiError::BadRequest("Email and password are required".to_string())),
        };
        let password = match request.password.as_deref() {
            Some(password) if !password.is_empty() => password.to_string(),
            _ => return Err(ApiError::BadRequest("Email and password are required".to_string())),
        };

        if self.store.find_by_email(&email).await.map_err(store_error)?.is_some() {
            return Err(ApiError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password(&password).map_err(|e| {
            warn!(error = %e, "Password hashing failed");
            ApiError::InternalServer("Failed to register user".to_string())
        })?;

        let created = self
            .store
            .create(NewUser {
                email: email.clone(),
                name: request.name,
                profile_image: request.profile_image,
                password_hash: Some(password_hash),
                google_id: None,
                google_email: None,
                google_refresh_token: None,
                tier: DEFAULT_TIER.to_string(),
                credits: DEFAULT_CREDITS.to_string(),
            })
            .await;

        let user = match created {
            Ok(user) => user,
            // Lost a race with a concurrent registration for the same email;
            // the unique index decides, we report the same conflict.
            Err(StoreError::UniqueViolation(_)) => {
                return Err(ApiError::Conflict("Email already registered".to_string()))
            }
            Err(e) => return Err(store_error(e)),
        };

        info!(
            user_id = %user.id,
            email = %safe_email_log(&user.email),
            "User registered"
        );
        self.outcome(&user)
    }

    /// Local login. The 401 body is identical for unknown email, an
    /// OAuth-only account, and a wrong password.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthOutcome, ApiError> {
        let user = credentials::verify(&self.store, email, password)
            .await
            .map_err(store_error)?
            .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;

        info!(user_id = %user.id, "Login successful");
        self.outcome(&user)
    }

    /// OAuth sign-in with a provider-authenticated profile
    pub async fn oauth_sign_in(&self, profile: &GoogleProfile) -> Result<AuthOutcome, ApiError> {
        let user = self
            .linker
            .link_or_create(profile)
            .await
            .map_err(store_error)?;

        info!(
            user_id = %user.id,
            email = %safe_email_log(&user.email),
            "Google sign-in successful"
        );
        self.outcome(&user)
    }

    /// Rotate a session: validate the refresh token, re-resolve the
    /// identity (a deleted account must not ride an old token), reissue
    /// both tokens.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthOutcome, ApiError> {
        let claims = self
            .tokens
            .validate(refresh_token, SecretKind::Refresh)
            .ok_or_else(|| ApiError::Unauthorized("Invalid or expired refresh token".to_string()))?;

        let user = self
            .store
            .find_by_id(&claims.sub)
            .await
            .map_err(store_error)?
            .ok_or_else(|| ApiError::Unauthorized("Invalid or expired refresh token".to_string()))?;

        info!(user_id = %user.id, "Session refreshed");
        self.outcome(&user)
    }
}

fn store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::Database(inner) => ApiError::DatabaseError(inner),
        other => {
            warn!(error = %other, "User store operation failed");
            ApiError::InternalServer("User store unavailable".to_string())
        }
    }
}

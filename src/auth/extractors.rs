//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use super::cookies::{self, ACCESS_TOKEN_COOKIE};
use super::models::PublicUser;
use super::tokens::SecretKind;
use crate::common::{safe_email_log, ApiError, AppState};
use crate::users::UserStore;

/// Authenticated user extractor
///
/// Guard for protected routes: pulls the access token (cookie first, then
/// bearer header), validates it, and re-resolves the identity so a deleted
/// account cannot ride a still-valid token. Carries only the sanitized
/// view of the user.
#[derive(Debug)]
pub struct AuthedUser {
    pub user: PublicUser,
}

/// Cookie-first token extraction with a bearer-header fallback
pub fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(token) = cookies::read_cookie(headers, cookie_name) {
        return Some(token);
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(|raw| match raw.strip_prefix("Bearer ") {
            Some(rest) => rest.to_string(),
            None => raw.to_string(),
        })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(state_lock): Extension<Arc<RwLock<AppState>>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

        let app_state = state_lock.read().await.clone();

        let token = match extract_token(&parts.headers, ACCESS_TOKEN_COOKIE) {
            Some(token) => token,
            None => {
                warn!("Authentication failed: no access token presented");
                return Err(ApiError::Unauthorized("Authentication required".to_string()));
            }
        };

        let claims = match app_state.sessions.tokens().validate(&token, SecretKind::Access) {
            Some(claims) => claims,
            None => {
                return Err(ApiError::Unauthorized("Authentication required".to_string()));
            }
        };

        let user = app_state
            .store
            .find_by_id(&claims.sub)
            .await
            .map_err(|e| {
                error!(error = %e, user_id = %claims.sub, "User lookup failed during authentication");
                ApiError::InternalServer("Authentication failed".to_string())
            })?;

        match user {
            Some(user) => {
                debug!(
                    user_id = %user.id,
                    email = %safe_email_log(&user.email),
                    "Request authenticated"
                );
                Ok(AuthedUser {
                    user: PublicUser::from(&user),
                })
            }
            None => {
                warn!(user_id = %claims.sub, "Valid token for a missing user");
                Err(ApiError::Unauthorized("Authentication required".to_string()))
            }
        }
    }
}

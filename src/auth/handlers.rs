//! Authentication handlers
//!
//! Transport layer over the session manager: JSON bodies in, cookie trio
//! out. The Google callback is browser navigation, so it answers with
//! redirects instead of JSON.

use axum::extract::{Extension, Json, Query};
use axum::http::header::{HeaderValue, LOCATION, SET_COOKIE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use super::cookies::{self, CookiePolicy, REFRESH_TOKEN_COOKIE};
use super::extractors::{extract_token, AuthedUser};
use super::linker::GoogleProfile;
use super::models::{GoogleCallbackQuery, LoginRequest, RegisterRequest};
use super::session::AuthOutcome;
use crate::common::{ApiError, AppState};

/// POST /auth/login
///
/// Authenticates a local email/password account.
///
/// # Response
/// 200 with the sanitized user and the session cookie trio, 401 with a
/// uniform body for every failure cause.
pub async fn login(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let state = state_lock.read().await.clone();

    let outcome = state.sessions.login(&payload.email, &payload.password).await?;

    Ok(session_response(
        &state,
        StatusCode::OK,
        "Login successful",
        outcome,
    ))
}

/// POST /auth/register
///
/// Creates a local account. 409 when the email is taken by any account,
/// 400 when email or password is missing.
pub async fn register(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    let state = state_lock.read().await.clone();

    let outcome = state.sessions.register(payload).await?;

    Ok(session_response(
        &state,
        StatusCode::CREATED,
        "User registered successfully",
        outcome,
    ))
}

/// GET /auth/google - Start the Google OAuth flow
pub async fn google_start(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
) -> Result<Redirect, ApiError> {
    let state = state_lock.read().await.clone();

    let auth_url = state.google.authorization_url().map_err(|e| {
        warn!(error = %e, "Google sign-in requested but not configured");
        ApiError::ServiceUnavailable("Google sign-in is not available".to_string())
    })?;

    Ok(Redirect::to(&auth_url))
}

/// GET /auth/google/callback - Handle the OAuth callback from Google
///
/// Success sets the cookie trio and sends the browser to the dashboard,
/// with the tokens repeated in the URL fragment for cookie-hostile
/// contexts. Every failure lands on the sign-in page with an error flag.
pub async fn google_callback(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Query(params): Query<GoogleCallbackQuery>,
) -> Response {
    let state = state_lock.read().await.clone();

    match run_google_callback(&state, params).await {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "Google callback failed");
            let sign_in_url = format!("{}/sign-in?error=google_auth_failed", state.config.frontend_url);
            Redirect::to(&sign_in_url).into_response()
        }
    }
}

async fn run_google_callback(
    state: &AppState,
    params: GoogleCallbackQuery,
) -> Result<Response, ApiError> {
    if let Some(error) = params.error {
        warn!(oauth_error = %error, "Google returned an error to the callback");
        return Err(ApiError::Unauthorized("Google authorization denied".to_string()));
    }

    let code = params
        .code
        .ok_or_else(|| ApiError::BadRequest("No authorization code provided".to_string()))?;

    let token_response = state
        .google
        .exchange_code(&code)
        .await
        .map_err(|e| ApiError::Unauthorized(format!("Code exchange failed: {}", e)))?;

    let user_info = state
        .google
        .fetch_user_info(&token_response.access_token)
        .await
        .map_err(|e| ApiError::Unauthorized(format!("Profile fetch failed: {}", e)))?;

    let profile = GoogleProfile {
        id: user_info.id,
        email: user_info.email,
        given_name: user_info.given_name,
        family_name: user_info.family_name,
        picture: user_info.picture,
        refresh_token: token_response.refresh_token,
    };

    let outcome = state.sessions.oauth_sign_in(&profile).await?;

    info!(user_id = %outcome.user.id, "Google OAuth sign-in complete");

    // Fragment fallback keeps the flow working when third-party cookie
    // rules eat the Set-Cookie headers on the cross-site redirect.
    let dashboard_url = format!(
        "{}/dashboard#access_token={}&refresh_token={}&user_id={}",
        state.config.frontend_url,
        outcome.pair.access_token,
        outcome.pair.refresh_token,
        outcome.user.id
    );

    let mut response = (StatusCode::FOUND, ()).into_response();
    response.headers_mut().insert(
        LOCATION,
        HeaderValue::from_str(&dashboard_url)
            .map_err(|_| ApiError::InternalServer("Invalid redirect URL".to_string()))?,
    );
    append_session_cookies(&mut response, state, &outcome);
    Ok(response)
}

/// POST /auth/refresh
///
/// Rotates the session wholesale. The refresh token is read from the
/// cookie first, bearer header second. Any rejection scrubs the cookie
/// trio so the client does not loop on a dead session.
pub async fn refresh(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    headers: axum::http::HeaderMap,
) -> Response {
    let state = state_lock.read().await.clone();

    let token = extract_token(&headers, REFRESH_TOKEN_COOKIE).unwrap_or_default();

    match state.sessions.refresh(&token).await {
        Ok(outcome) => session_response(
            &state,
            StatusCode::OK,
            "Token refreshed successfully",
            outcome,
        ),
        Err(e) => {
            warn!(error = %e, "Refresh rejected, clearing session cookies");
            let mut response = e.into_response();
            let policy = CookiePolicy::from_config(&state.config);
            for cookie in cookies::clear_session_cookies(policy) {
                response.headers_mut().append(SET_COOKIE, cookie);
            }
            response
        }
    }
}

/// GET /auth/logout
///
/// Clears the cookie trio. Idempotent: clearing cookies that were never
/// set still succeeds.
pub async fn logout(Extension(state_lock): Extension<Arc<RwLock<AppState>>>) -> Response {
    let state = state_lock.read().await.clone();

    info!("User logout");

    let body = serde_json::json!({
        "message": "Logged out successfully",
        "statusCode": StatusCode::OK.as_u16(),
    });
    let mut response = (StatusCode::OK, Json(body)).into_response();
    let policy = CookiePolicy::from_config(&state.config);
    for cookie in cookies::clear_session_cookies(policy) {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    response
}

/// GET /auth/profile
///
/// Returns the sanitized identity attached by the [`AuthedUser`] guard.
pub async fn profile(authed: AuthedUser) -> Json<serde_json::Value> {
    Json(serde_json::to_value(&authed.user).unwrap_or_default())
}

// ---- Helper Functions ----

fn session_response(
    state: &AppState,
    status: StatusCode,
    message: &str,
    outcome: AuthOutcome,
) -> Response {
    let body = serde_json::json!({
        "message": message,
        "user": outcome.user,
        "statusCode": status.as_u16(),
    });

    let mut response = (status, Json(body)).into_response();
    append_session_cookies(&mut response, state, &outcome);
    response
}

fn append_session_cookies(response: &mut Response, state: &AppState, outcome: &AuthOutcome) {
    let policy = CookiePolicy::from_config(&state.config);
    for cookie in cookies::session_cookies(&outcome.pair, &outcome.user.id, policy) {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
}

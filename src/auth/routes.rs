//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `POST /auth/login` - Local email/password login
/// - `POST /auth/register` - Local account registration
/// - `GET /auth/google` - Start the Google OAuth flow
/// - `GET /auth/google/callback` - Google OAuth callback
/// - `POST /auth/refresh` - Rotate the session token pair
/// - `GET /auth/logout` - Clear session cookies
/// - `GET /auth/profile` - Current authenticated user
pub fn auth_routes() -> Router {
    Router::new()
        .route("/auth/login", post(handlers::login))
        .route("/auth/register", post(handlers::register))
        .route("/auth/google", get(handlers::google_start))
        .route("/auth/google/callback", get(handlers::google_callback))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/auth/logout", get(handlers::logout))
        .route("/auth/profile", get(handlers::profile))
}

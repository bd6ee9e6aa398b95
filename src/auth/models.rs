//! Authentication data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Signed claim set carried by both access and refresh tokens.
///
/// `jti` is a per-issue nonce; without it two tokens minted for the same
/// subject within one clock second would be byte-identical and rotation
/// would be unobservable.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub iat: usize,
    pub exp: usize,
    pub jti: String,
}

/// Access/refresh token pair representing one session
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// User database model
///
/// Not `Serialize` on purpose: rows carry the password hash and the Google
/// refresh token. Anything that leaves the process goes through
/// [`PublicUser`].
#[derive(FromRow, Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub profile_image: Option<String>,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub google_email: Option<String>,
    pub google_refresh_token: Option<String>,
    pub tier: String,
    pub credits: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Sanitized identity view, safe to return to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub profile_image: Option<String>,
    pub tier: String,
    pub credits: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            profile_image: user.profile_image.clone(),
            tier: user.tier.clone(),
            credits: user.credits.clone(),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "profileImage")]
    pub profile_image: Option<String>,
}

/// Query parameters Google appends to the OAuth callback
#[derive(Deserialize, Debug)]
pub struct GoogleCallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

//! JWT issuing and validation
//!
//! Access and refresh tokens carry the same claim shape but are signed with
//! distinct secrets, so holding one never lets a client forge the other.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::warn;
use uuid::Uuid;

use super::models::{Claims, TokenPair, User};
use crate::common::AuthConfig;

/// Access token lifetime: 15 minutes
pub const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;
/// Refresh token lifetime: 7 days
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Which signing secret a token must verify against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    Access,
    Refresh,
}

#[derive(Clone)]
pub struct TokenService {
    access_secret: String,
    refresh_secret: String,
}

impl TokenService {
    /// Secrets are already validated as present and distinct by
    /// `AuthConfig::from_env`.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access_secret: config.access_token_secret.clone(),
            refresh_secret: config.refresh_token_secret.clone(),
        }
    }

    #[cfg(test)]
    pub fn with_secrets(access_secret: &str, refresh_secret: &str) -> Self {
        Self {
            access_secret: access_secret.to_string(),
            refresh_secret: refresh_secret.to_string(),
        }
    }

    fn secret(&self, kind: SecretKind) -> &str {
        match kind {
            SecretKind::Access => &self.access_secret,
            SecretKind::Refresh => &self.refresh_secret,
        }
    }

    fn sign(
        &self,
        user: &User,
        kind: SecretKind,
        ttl_secs: i64,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            iat: now.timestamp() as usize,
            exp: (now + Duration::seconds(ttl_secs)).timestamp() as usize,
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret(kind).as_bytes()),
        )
    }

    /// Mint a fresh access/refresh pair for an identity
    pub fn issue(&self, user: &User) -> Result<TokenPair, jsonwebtoken::errors::Error> {
        let access_token = self.sign(user, SecretKind::Access, ACCESS_TOKEN_TTL_SECS)?;
        let refresh_token = self.sign(user, SecretKind::Refresh, REFRESH_TOKEN_TTL_SECS)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Verify signature and expiry against the secret for `kind`.
    ///
    /// Expected failure modes (malformed, expired, wrong secret, placeholder
    /// strings a broken client serialized into the cookie) are all `None`.
    pub fn validate(&self, token: &str, kind: SecretKind) -> Option<Claims> {
        // Misbehaving clients have been observed sending the literal strings
        // "undefined" and "null" where a token should be.
        if token.is_empty() || token == "undefined" || token == "null" {
            return None;
        }

        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret(kind).as_bytes()),
            &Validation::new(Algorithm::HS256),
        ) {
            Ok(data) if !data.claims.sub.is_empty() => Some(data.claims),
            Ok(_) => {
                warn!("Token validated but carries an empty subject");
                None
            }
            Err(e) => {
                warn!(error = %e, kind = ?kind, "Token validation failed");
                None
            }
        }
    }
}

// Application configuration, resolved once at startup

use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    MissingSecret(&'static str),

    #[error("JWT_SECRET and JWT_REFRESH_TOKEN_KEY must differ")]
    SecretsNotDistinct,

    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

/// Cookie SameSite attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Lax,
    Strict,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Lax => "Lax",
            SameSite::Strict => "Strict",
            SameSite::None => "None",
        }
    }
}

/// Google OAuth client credentials. Absent when the deployment does not
/// enable the Google sign-in path.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

/// Immutable application configuration.
///
/// Built exactly once in `main`; secrets are validated here so a
/// misconfigured process refuses to start instead of failing per request.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub port: u16,
    pub database_url: String,
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub frontend_url: String,
    pub cors_origins: Vec<String>,
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,
    pub google: Option<GoogleConfig>,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let production = env::var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let access_token_secret = require_secret("JWT_SECRET")?;
        let refresh_token_secret = require_secret("JWT_REFRESH_TOKEN_KEY")?;
        if access_token_secret == refresh_token_secret {
            return Err(ConfigError::SecretsNotDistinct);
        }

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidValue("PORT", raw))?,
            Err(_) => 5005,
        };

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://auth_api.db".to_string());

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        let cors_origins: Vec<String> = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| frontend_url.clone())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Browser frontends on another origin need SameSite=None plus Secure;
        // same-site dev setups stay on Lax over plain http.
        let cookie_secure = match env::var("COOKIE_SECURE") {
            Ok(raw) => raw
                .parse::<bool>()
                .map_err(|_| ConfigError::InvalidValue("COOKIE_SECURE", raw))?,
            Err(_) => production,
        };
        let cookie_same_site = match env::var("COOKIE_SAME_SITE") {
            Ok(raw) => match raw.to_ascii_lowercase().as_str() {
                "lax" => SameSite::Lax,
                "strict" => SameSite::Strict,
                "none" => SameSite::None,
                _ => return Err(ConfigError::InvalidValue("COOKIE_SAME_SITE", raw)),
            },
            Err(_) => {
                if production {
                    SameSite::None
                } else {
                    SameSite::Lax
                }
            }
        };

        let google = match (
            env::var("GOOGLE_CLIENT_ID").ok().filter(|v| !v.is_empty()),
            env::var("GOOGLE_CLIENT_SECRET").ok().filter(|v| !v.is_empty()),
        ) {
            (Some(client_id), Some(client_secret)) => Some(GoogleConfig {
                client_id,
                client_secret,
                redirect_url: env::var("GOOGLE_REDIRECT_URL").unwrap_or_else(|_| {
                    format!("http://localhost:{}/auth/google/callback", port)
                }),
            }),
            _ => None,
        };

        Ok(Self {
            port,
            database_url,
            access_token_secret,
            refresh_token_secret,
            frontend_url,
            cors_origins,
            cookie_secure,
            cookie_same_site,
            google,
        })
    }
}

fn require_secret(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingSecret(name)),
    }
}

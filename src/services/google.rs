// src/services/google.rs
//
// Client for the Google OAuth 2.0 authorization-code flow: consent URL,
// code exchange, and userinfo fetch. Credentials are injected from the
// startup configuration.

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::common::config::GoogleConfig;

#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("Google OAuth not configured")]
    NotConfigured,

    #[error("OAuth flow failed: {0}")]
    OAuthFailed(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Token endpoint response for the authorization-code grant
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub token_type: String,
    pub scope: Option<String>,
}

/// Profile fields from the userinfo endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUserInfo {
    pub id: String,
    pub email: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GoogleOAuthService {
    config: Option<GoogleConfig>,
    client: Client,
}

impl GoogleOAuthService {
    pub fn new(config: Option<GoogleConfig>, client: Client) -> Self {
        Self { config, client }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    fn config(&self) -> Result<&GoogleConfig, GoogleError> {
        self.config.as_ref().ok_or(GoogleError::NotConfigured)
    }

    /// Get authorization URL for the consent screen
    pub fn authorization_url(&self) -> Result<String, GoogleError> {
        let config = self.config()?;

        // Identity-only scopes; access_type=offline + prompt=consent so
        // Google returns a refresh token on every linking.
        let scope_param = "openid email profile";

        let auth_url = format!(
            "https://accounts.google.com/o/oauth2/v2/auth?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            urlencoding::encode(&config.client_id),
            urlencoding::encode(&config.redirect_url),
            urlencoding::encode(scope_param)
        );

        debug!("Generated Google OAuth authorization URL");
        Ok(auth_url)
    }

    /// Exchange authorization code for tokens
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, GoogleError> {
        let config = self.config()?;

        let params = [
            ("code", code),
            ("client_id", &config.client_id),
            ("client_secret", &config.client_secret),
            ("redirect_uri", &config.redirect_url),
            ("grant_type", "authorization_code"),
        ];

        debug!("Exchanging authorization code for tokens");

        let response = self
            .client
            .post("https://oauth2.googleapis.com/token")
            .form(&params)
            .send()
            .await
            .map_err(|e| GoogleError::RequestFailed(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "Token exchange failed");
            return Err(GoogleError::OAuthFailed(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let token_response = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| GoogleError::SerializationError(e.to_string()))?;

        info!("Successfully exchanged authorization code for tokens");
        Ok(token_response)
    }

    /// Get the user's profile from an access token
    pub async fn fetch_user_info(&self, access_token: &str) -> Result<GoogleUserInfo, GoogleError> {
        let response = self
            .client
            .get("https://www.googleapis.com/oauth2/v2/userinfo")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| GoogleError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GoogleError::RequestFailed(
                "Failed to get user info".to_string(),
            ));
        }

        response
            .json::<GoogleUserInfo>()
            .await
            .map_err(|e| GoogleError::SerializationError(e.to_string()))
    }
}

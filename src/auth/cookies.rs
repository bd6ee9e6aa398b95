//! Session cookie contract
//!
//! Three cookies make up the transport state: httpOnly `access_token` and
//! `refresh_token`, plus a client-readable `user_id` the frontend uses for
//! UI branching. All are Path=/; Secure and SameSite come from config.

use axum::http::header::HeaderValue;
use axum::http::HeaderMap;

use super::models::TokenPair;
use super::tokens::{ACCESS_TOKEN_TTL_SECS, REFRESH_TOKEN_TTL_SECS};
use crate::common::{AuthConfig, SameSite};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
pub const USER_ID_COOKIE: &str = "user_id";

/// Cookie attributes resolved from configuration
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub secure: bool,
    pub same_site: SameSite,
}

impl CookiePolicy {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            secure: config.cookie_secure,
            same_site: config.cookie_same_site,
        }
    }
}

fn build(name: &str, value: &str, max_age_secs: i64, http_only: bool, policy: CookiePolicy) -> HeaderValue {
    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; SameSite={}",
        name,
        value,
        max_age_secs,
        policy.same_site.as_str()
    );
    if http_only {
        cookie.push_str("; HttpOnly");
    }
    if policy.secure {
        cookie.push_str("; Secure");
    }
    // Token values are base64url JWTs and ids are uuids, both cookie-safe
    HeaderValue::from_str(&cookie).expect("cookie values are header-safe")
}

fn expire(name: &str, http_only: bool, policy: CookiePolicy) -> HeaderValue {
    let mut cookie = format!(
        "{}=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; SameSite={}",
        name,
        policy.same_site.as_str()
    );
    if http_only {
        cookie.push_str("; HttpOnly");
    }
    if policy.secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).expect("cookie values are header-safe")
}

/// Set-Cookie values for a fresh session
pub fn session_cookies(pair: &TokenPair, user_id: &str, policy: CookiePolicy) -> [HeaderValue; 3] {
    [
        build(
            ACCESS_TOKEN_COOKIE,
            &pair.access_token,
            ACCESS_TOKEN_TTL_SECS,
            true,
            policy,
        ),
        build(
            REFRESH_TOKEN_COOKIE,
            &pair.refresh_token,
            REFRESH_TOKEN_TTL_SECS,
            true,
            policy,
        ),
        // Intentionally readable by the frontend
        build(
            USER_ID_COOKIE,
            user_id,
            REFRESH_TOKEN_TTL_SECS,
            false,
            policy,
        ),
    ]
}

/// Set-Cookie values scrubbing the whole trio. Clearing already-absent
/// cookies is harmless, so logout and rejected refresh both use this.
pub fn clear_session_cookies(policy: CookiePolicy) -> [HeaderValue; 3] {
    [
        expire(ACCESS_TOKEN_COOKIE, true, policy),
        expire(REFRESH_TOKEN_COOKIE, true, policy),
        expire(USER_ID_COOKIE, false, policy),
    ]
}

/// Reads one cookie value out of the request `Cookie` header
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    for part in header.split(';') {
        let mut split = part.trim().splitn(2, '=');
        if split.next() == Some(name) {
            return split.next().map(str::to_string);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CookiePolicy {
        CookiePolicy {
            secure: false,
            same_site: SameSite::Lax,
        }
    }

    fn pair() -> TokenPair {
        TokenPair {
            access_token: "header.payload.sig".to_string(),
            refresh_token: "header.payload2.sig2".to_string(),
        }
    }

    #[test]
    fn token_cookies_are_http_only_but_user_id_is_not() {
        let [access, refresh, user_id] = session_cookies(&pair(), "user-1", policy());

        assert!(access.to_str().unwrap().contains("HttpOnly"));
        assert!(refresh.to_str().unwrap().contains("HttpOnly"));
        assert!(!user_id.to_str().unwrap().contains("HttpOnly"));
    }

    #[test]
    fn lifetimes_match_the_token_ttls() {
        let [access, refresh, user_id] = session_cookies(&pair(), "user-1", policy());

        assert!(access.to_str().unwrap().contains("Max-Age=900"));
        assert!(refresh.to_str().unwrap().contains("Max-Age=604800"));
        assert!(user_id.to_str().unwrap().contains("Max-Age=604800"));
        for cookie in [&access, &refresh, &user_id] {
            assert!(cookie.to_str().unwrap().contains("Path=/"));
            assert!(cookie.to_str().unwrap().contains("SameSite=Lax"));
        }
    }

    #[test]
    fn secure_policy_adds_the_attribute() {
        let secure = CookiePolicy {
            secure: true,
            same_site: SameSite::None,
        };
        let [access, _, _] = session_cookies(&pair(), "user-1", secure);
        let value = access.to_str().unwrap().to_string();
        assert!(value.contains("Secure"));
        assert!(value.contains("SameSite=None"));
    }

    #[test]
    fn clearing_expires_the_trio() {
        let cleared = clear_session_cookies(policy());
        assert_eq!(cleared.len(), 3);
        for cookie in &cleared {
            let value = cookie.to_str().unwrap();
            assert!(value.contains("Max-Age=0"));
            assert!(value.contains("Expires=Thu, 01 Jan 1970"));
        }
    }

    #[test]
    fn reads_cookies_out_of_the_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("a=1; access_token=tok.en.value; user_id=u-1"),
        );

        assert_eq!(
            read_cookie(&headers, ACCESS_TOKEN_COOKIE).as_deref(),
            Some("tok.en.value")
        );
        assert_eq!(read_cookie(&headers, USER_ID_COOKIE).as_deref(), Some("u-1"));
        assert_eq!(read_cookie(&headers, REFRESH_TOKEN_COOKIE), None);
    }
}

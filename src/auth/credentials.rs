//! Credential verification for local email/password accounts

use std::sync::Arc;

use tracing::{debug, warn};

use super::models::User;
use super::password::verify_password;
use crate::common::safe_email_log;
use crate::users::{StoreError, UserStore};

/// Checks an email/password pair against the store.
///
/// `Ok(None)` covers unknown email, an account with no password hash
/// (OAuth-only), and a hash mismatch alike. Callers must not be able to
/// tell those apart, or login becomes an account-enumeration oracle.
pub async fn verify(
    store: &Arc<dyn UserStore>,
    email: &str,
    password: &str,
) -> Result<Option<User>, StoreError> {
    let user = match store.find_by_email(email).await? {
        Some(user) => user,
        None => {
            debug!(email = %safe_email_log(email), "Login attempt for unknown email");
            return Ok(None);
        }
    };

    let hash = match &user.password_hash {
        Some(hash) => hash.clone(),
        None => {
            debug!(user_id = %user.id, "Login attempt against passwordless account");
            return Ok(None);
        }
    };

    match verify_password(password, &hash) {
        Ok(true) => Ok(Some(user)),
        Ok(false) => Ok(None),
        Err(e) => {
            // A hash that does not parse means a corrupt row, not a bad
            // password; still indistinguishable to the caller.
            warn!(user_id = %user.id, error = %e, "Stored password hash failed to parse");
            Ok(None)
        }
    }
}

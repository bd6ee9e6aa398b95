// Application state shared across all modules

use std::sync::Arc;

use crate::auth::session::SessionManager;
use crate::common::config::AuthConfig;
use crate::services::GoogleOAuthService;
use crate::users::UserStore;

/// Application state containing the user store, services, and configuration
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AuthConfig>,
    pub store: Arc<dyn UserStore>,
    pub sessions: Arc<SessionManager>,
    pub google: Arc<GoogleOAuthService>,
}

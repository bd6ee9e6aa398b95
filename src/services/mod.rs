// External service clients

pub mod google;

pub use google::{GoogleError, GoogleOAuthService, GoogleUserInfo};

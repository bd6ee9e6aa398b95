//! # Auth Module
//!
//! This module handles all authentication-related functionality including:
//! - Local email/password login and registration
//! - Google OAuth sign-in and account linking
//! - Dual-secret JWT pair issuing, validation, and rotation
//! - Session cookie transport
//! - AuthedUser extractor for protected routes

pub mod cookies;
pub mod credentials;
pub mod extractors;
pub mod handlers;
pub mod linker;
pub mod models;
pub mod password;
pub mod routes;
pub mod session;
pub mod tokens;


pub use extractors::AuthedUser;
pub use models::User;
pub use routes::auth_routes;

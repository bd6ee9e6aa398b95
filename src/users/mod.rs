//! # Users Module
//!
//! Repository interface to the user store collaborator and its SQLite
//! implementation.

pub mod store;

pub use store::{NewUser, SqliteUserStore, StoreError, UserStore};

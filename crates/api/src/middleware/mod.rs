//! Request extractors shared by handlers.
//!
//! - [`auth::AuthUser`] -- Extracts the verified caller from a JWT Bearer token.

pub mod auth;

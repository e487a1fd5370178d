//! Middleware
//!
//! Tower middleware for request processing.

pub mod auth;
pub mod cors;
pub mod logging;

pub use auth::{auth_middleware, AuthState};
pub use crate::presentation::http::extractors::{AuthUser, BearerToken};

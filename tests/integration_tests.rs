//! Integration Tests Entry Point
//!
//! Tests are organized by module:
//! - `api/` - endpoint tests against the live connection and presence routes
//! - `common/` - Shared test utilities

mod api;
mod common;

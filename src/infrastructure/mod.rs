//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Database repositories (PostgreSQL)
//! - Token store (Redis)
//! - Attachment storage (local filesystem)
//! - Verification code delivery
//! - Prometheus metrics

pub mod cache;
pub mod database;
pub mod metrics;
pub mod repositories;
pub mod sms;
pub mod storage;

//! # Messenger Server Library
//!
//! A 1:1 messenger backend with:
//! - RESTful HTTP API for accounts, chats, messages and attachments
//! - A live websocket endpoint delivering chat events and presence changes
//! - PostgreSQL for persistent storage
//! - Redis for issued tokens and verification codes
//!
//! ## Architecture
//!
//! - **Domain Layer**: entities and repository traits
//! - **Application Layer**: services and DTOs
//! - **Infrastructure Layer**: database, token store, file storage, metrics
//! - **Presentation Layer**: HTTP handlers, middleware and the real-time
//!   delivery core (presence registry, notifier, connection handler)
//!
//! ## Module Structure
//!
//! ```text
//! messenger_server/
//! +-- config/         Configuration management
//! +-- domain/         Entities and repository traits
//! +-- application/    Services and DTOs
//! +-- infrastructure/ Postgres, Redis, storage and metrics
//! +-- presentation/   HTTP routes, middleware and live connections
//! +-- shared/         Errors and validation helpers
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;

//! # Domain Layer
//!
//! Core entities of the messenger and the repository contracts the
//! infrastructure layer implements.
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Repository traits define data access contracts

pub mod entities;

pub use entities::*;

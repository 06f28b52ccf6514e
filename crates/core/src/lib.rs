//! Core domain types and shared logic for Ferry.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Registration records and their lifecycle fields
//! - Identifier validation
//! - Expiry computation
//! - Configuration for every subsystem

pub mod config;
pub mod error;
pub mod registration;

pub use error::{Error, Result};
pub use registration::{AuthMode, NewRegistration, Registration, validate_id};

/// Maximum accepted registration identifier length.
pub const MAX_ID_LEN: usize = 128;

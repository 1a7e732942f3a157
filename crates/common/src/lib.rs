//! Shared utilities, configuration, and error handling for ITC Kids
//!
//! This crate provides common functionality used across the application shell:
//! - Configuration management following 12-factor principles
//! - Error types and handling
//! - Request validation extractors

pub mod config;
pub mod error;
pub mod extractors;

pub use config::Config;
pub use error::{Error, Result};
pub use extractors::ValidatedJson;
